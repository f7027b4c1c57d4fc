//! Quick export: the last N hours of a chat into a generated file, optionally
//! cleaned into a transcript.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::{AppError, ExportSummary, RecentExport, Result};

use super::cleaner::{convert_to_clean_format, CleanOptions, CleanStats};
use super::export_service::{ExportRequest, ExportService};
use super::job_tracker::JobTracker;
use super::scheduler::{ProgressObserver, Sleeper};
use super::stream::HistoryApi;

#[derive(Debug, Clone)]
pub struct QuickExportRequest {
    pub locator: String,
    pub hours: u32,
    /// Produce a cleaned `.txt` transcript and drop the raw log.
    pub clean: bool,
}

#[derive(Debug, Clone)]
pub struct QuickExportOutcome {
    /// Final artifact: the transcript when cleaned, otherwise the raw log.
    pub path: PathBuf,
    pub summary: ExportSummary,
    pub clean_stats: Option<CleanStats>,
}

impl QuickExportOutcome {
    /// One-line description for status displays.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.clean_stats {
            Some(stats) => format!(
                "Exported {} messages (filtered {} bots)",
                stats.kept, stats.filtered_bots
            ),
            None => format!("Exported {} messages", self.summary.written),
        }
    }
}

/// `<dir>/quick_<hours>h_<YYYYmmdd_HHMMSS>.jsonl`
#[must_use]
pub fn quick_export_path(dir: &Path, hours: u32, now: DateTime<Utc>) -> PathBuf {
    dir.join(format!("quick_{hours}h_{}.jsonl", now.format("%Y%m%d_%H%M%S")))
}

/// Start of an `hours`-long window ending at `now`.
///
/// # Errors
/// Returns a config error if the window reaches outside the representable range.
pub fn lookback_cutoff(now: DateTime<Utc>, hours: u32) -> Result<DateTime<Utc>> {
    TimeDelta::try_hours(i64::from(hours))
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| AppError::config(format!("Window of {hours} hours is out of range")))
}

/// Run a quick export into `quick_dir`.
///
/// # Errors
/// Returns error if the window is out of range, the export is cancelled, or
/// the export or clean step fails. The raw log is only removed after the
/// transcript has been written; a cancelled run keeps it.
pub async fn run_quick_export<A: HistoryApi, S: Sleeper>(
    service: &ExportService<A, S>,
    quick_dir: &Path,
    request: &QuickExportRequest,
    progress: &dyn ProgressObserver,
) -> Result<QuickExportOutcome> {
    let now = Utc::now();
    let cutoff = lookback_cutoff(now, request.hours)?;
    let raw_path = quick_export_path(quick_dir, request.hours, now);

    tracing::info!(hours = request.hours, path = %raw_path.display(), "Starting quick export");

    let summary = service
        .run(
            &ExportRequest {
                locator: request.locator.clone(),
                output: raw_path.clone(),
                cutoff: Some(cutoff),
            },
            progress,
        )
        .await?;

    if summary.cancelled {
        return Err(AppError::Cancelled {
            written: summary.written,
        });
    }

    if !request.clean {
        return Ok(QuickExportOutcome {
            path: raw_path,
            summary,
            clean_stats: None,
        });
    }

    let clean_path = raw_path.with_extension("txt");
    let stats = convert_to_clean_format(&raw_path, &clean_path, CleanOptions::default())?;
    std::fs::remove_file(&raw_path)
        .map_err(|e| AppError::io(format!("Failed to remove {}", raw_path.display()), e))?;

    Ok(QuickExportOutcome {
        path: clean_path,
        summary,
        clean_stats: Some(stats),
    })
}

/// Quick export that reports into a [`JobTracker`]. The caller must have
/// called [`JobTracker::try_start`] already.
pub async fn run_tracked_quick_export<A: HistoryApi, S: Sleeper>(
    service: &ExportService<A, S>,
    tracker: &JobTracker,
    quick_dir: &Path,
    request: &QuickExportRequest,
) {
    tracker.set_message(format!("Exporting last {} hours...", request.hours));

    let result = run_quick_export(service, quick_dir, request, tracker).await;
    match result {
        Ok(outcome) => {
            let size = std::fs::metadata(&outcome.path).map_or(0, |m| m.len());
            tracker.finish(
                outcome.describe(),
                RecentExport {
                    timestamp: Utc::now(),
                    hours: request.hours,
                    file: outcome.path.display().to_string(),
                    size,
                },
            );
        }
        Err(AppError::RateLimited { wait }) => {
            tracker.fail(format!("Rate limited. Try again in {} seconds", wait.as_secs()));
        }
        Err(e) => {
            tracing::error!(error = %e, "Quick export failed");
            tracker.fail(e.to_string());
        }
    }
}
