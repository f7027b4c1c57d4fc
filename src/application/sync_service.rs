//! Periodic sync: keep an export log up to date by re-running the export on
//! an interval.
//!
//! Each pass resumes from the log's last record, so a pass only appends what
//! arrived since the previous one. Failures are logged and the loop goes on.

use chrono::Utc;

use crate::domain::{ExportSummary, Result};

use super::export_service::{ExportRequest, ExportService};
use super::scheduler::{LogProgress, Sleeper, SyncSchedule};
use super::stream::HistoryApi;

/// Service for periodically syncing one chat into one log.
pub struct SyncService<A, S> {
    export: ExportService<A, S>,
    request: ExportRequest,
    schedule: SyncSchedule,
}

impl<A: HistoryApi, S: Sleeper> SyncService<A, S> {
    #[must_use]
    pub const fn new(export: ExportService<A, S>, request: ExportRequest, schedule: SyncSchedule) -> Self {
        Self {
            export,
            request,
            schedule,
        }
    }

    /// Run one pass, returning its summary or error.
    ///
    /// # Errors
    /// Returns whatever the export pass returned.
    pub async fn sync_once(&self) -> Result<ExportSummary> {
        tracing::info!(
            chat = %self.request.locator,
            out = %self.request.output.display(),
            "Starting sync pass"
        );
        self.export.run(&self.request, &LogProgress).await
    }

    /// Run one pass and swallow its error after logging it.
    ///
    /// Returns the number of records written, zero on failure.
    pub async fn run_once(&self) -> u64 {
        match self.sync_once().await {
            Ok(summary) => {
                tracing::info!(written = summary.written, at = %Utc::now(), "Sync pass completed");
                summary.written
            }
            Err(e) => {
                tracing::error!(error = %e, "Sync pass failed; will retry next interval");
                0
            }
        }
    }

    /// Loop forever: pass, then wait the jittered interval.
    pub async fn run_forever(&self) {
        tracing::info!(
            interval_secs = self.schedule.effective_interval().as_secs(),
            "Periodic sync started"
        );

        loop {
            self.run_passes(1).await;
        }
    }

    /// Run `passes` iterations of pass-then-wait.
    pub async fn run_passes(&self, passes: usize) {
        for _ in 0..passes {
            self.run_once().await;
            let wait = self.schedule.next_wait();
            tracing::info!(wait_secs = wait.as_secs(), "Waiting before next sync pass");
            self.export.sleeper().sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::tempdir;

    use super::*;
    use crate::application::scheduler::testing::RecordingSleeper;
    use crate::application::stream::testing::{message, Failure, FakeHistory};
    use crate::domain::ExportConfig;
    use crate::infrastructure::export_log::read_records;

    fn sync_service(api: FakeHistory, output: std::path::PathBuf) -> SyncService<FakeHistory, RecordingSleeper> {
        let export = ExportService::new(api, RecordingSleeper::default(), ExportConfig::default());
        let request = ExportRequest {
            locator: "@group".into(),
            output,
            cutoff: None,
        };
        let schedule = SyncSchedule::new(
            Duration::from_secs(60),
            Duration::from_secs(300),
            Duration::from_secs(30),
        );
        SyncService::new(export, request, schedule)
    }

    #[tokio::test]
    async fn test_error_is_swallowed_and_loop_continues() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sync.jsonl");

        let api = FakeHistory::new((1..=3).map(message).collect()).fail_on(0, Failure::Fatal);
        let service = sync_service(api, path.clone());

        service.run_passes(2).await;

        // First pass failed, second pass exported everything.
        let ids: Vec<i64> = read_records(&path).unwrap().iter().map(|r| r.msg_id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let waits = service.export.sleeper().recorded();
        assert_eq!(waits.len(), 2);
        assert!(waits
            .iter()
            .all(|w| *w >= Duration::from_secs(300) && *w < Duration::from_secs(330)));
    }

    #[tokio::test]
    async fn test_second_pass_appends_nothing_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sync.jsonl");
        let service = sync_service(FakeHistory::new((1..=3).map(message).collect()), path.clone());

        assert_eq!(service.run_once().await, 3);
        assert_eq!(service.run_once().await, 0);
        assert_eq!(read_records(&path).unwrap().len(), 3);
    }
}
