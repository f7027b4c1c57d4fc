//! Console output for export, clean, and inspect results.

use std::path::Path;

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::ExportSummary;

use super::cleaner::CleanStats;
use super::inspect::LogInspection;

/// Output format for `inspect`.
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Bordered table.
    #[default]
    Table,
    /// JSON for programmatic use.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Use: table, json")),
        }
    }
}

/// Bytes as megabytes with two decimals.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Formats the outcome of an export run.
#[must_use]
pub fn format_export_summary(summary: &ExportSummary, path: &Path) -> String {
    let mut out = format!(
        "{} {} messages to {}\n  File size: {}",
        "Exported".bold(),
        summary.written.to_string().cyan(),
        path.display(),
        format_megabytes(summary.file_size).yellow()
    );

    if let Some(id) = summary.resumed_from {
        out.push_str(&format!("\n  Resumed after message {id}"));
    }
    if summary.reached_cutoff {
        out.push_str("\n  Stopped at the time cutoff");
    }
    if summary.retried {
        out.push_str("\n  Retried once after a rate limit");
    }
    if summary.cancelled {
        out.push_str(&format!("\n  {}", "Cancelled before completion".yellow()));
    }

    out
}

/// Formats cleaner statistics.
#[must_use]
pub fn format_clean_stats(stats: &CleanStats, output: &Path) -> String {
    format!(
        "{}\n  Output: {}\n  Read: {}\n  Kept: {}\n  Bots filtered: {}\n  Media-only skipped: {}",
        format!("Exported {} messages (filtered {} bots)", stats.kept, stats.filtered_bots).bold(),
        output.display(),
        stats.total.to_string().cyan(),
        stats.kept.to_string().green(),
        stats.filtered_bots.to_string().yellow(),
        stats.filtered_media_only.to_string().yellow()
    )
}

/// Formats the first lines of a cleaned file as a preview block.
#[must_use]
pub fn format_sample(lines: &[String]) -> String {
    let mut out = format!("{}", "Sample:".bold());
    for line in lines {
        out.push_str("\n  ");
        out.push_str(&truncate(line, 100));
    }
    out
}

/// Formats log statistics as a two-column table.
#[must_use]
pub fn format_inspection_table(path: &Path, inspection: &LogInspection) -> String {
    let id_range = match (inspection.min_id, inspection.max_id) {
        (Some(min), Some(max)) => format!("{min} .. {max}"),
        _ => "-".to_string(),
    };
    let date_range = match (inspection.first_date, inspection.last_date) {
        (Some(first), Some(last)) => format!(
            "{} .. {}",
            first.format("%Y-%m-%d %H:%M"),
            last.format("%Y-%m-%d %H:%M")
        ),
        _ => "-".to_string(),
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["File".to_string(), path.display().to_string()]);
    table.add_row(vec!["Records".to_string(), inspection.records.to_string()]);
    table.add_row(vec!["Message ids".to_string(), id_range]);
    table.add_row(vec!["Dates (UTC)".to_string(), date_range]);
    table.add_row(vec!["Senders".to_string(), inspection.senders.to_string()]);
    table.add_row(vec!["Replies".to_string(), inspection.replies.to_string()]);
    table.add_row(vec![
        "Media".to_string(),
        format!(
            "{} photo / {} video / {} doc",
            inspection.photos, inspection.videos, inspection.documents
        ),
    ]);
    table.add_row(vec![
        "Order".to_string(),
        if inspection.ordered { "ok" } else { "out of order" }.to_string(),
    ]);

    table.to_string()
}

/// Truncates to `max_chars` characters with an ellipsis.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
