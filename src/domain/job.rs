//! Volatile export job status.
//!
//! Lives for the process lifetime only. The status surface reads copies of
//! it; only the running job writes it.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Status of the current (or last) export job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    /// Whether a job is currently running.
    pub running: bool,
    /// Records exported so far.
    pub progress: u64,
    /// Human-readable state description.
    pub message: String,
    /// Last error, if the job failed.
    pub error: Option<String>,
    /// Path of the produced file once finished.
    pub result_path: Option<String>,
}

impl JobStatus {
    /// Fresh status for a job that is just starting.
    #[must_use]
    pub fn starting(message: impl Into<String>) -> Self {
        Self {
            running: true,
            message: message.into(),
            ..Self::default()
        }
    }

    /// Mark the job finished with a result file.
    #[must_use]
    pub fn finished(mut self, message: impl Into<String>, result_path: impl Into<String>) -> Self {
        self.running = false;
        self.message = message.into();
        self.result_path = Some(result_path.into());
        self
    }

    /// Mark the job failed.
    #[must_use]
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.running = false;
        self.error = Some(error.into());
        self
    }
}

/// A completed export listed on the status surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentExport {
    pub timestamp: DateTime<Utc>,
    pub hours: u32,
    pub file: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let status = JobStatus::starting("Starting export...");
        assert!(status.running);
        assert_eq!(status.progress, 0);

        let done = status.clone().finished("Exported 3 messages", "exports/quick/a.txt");
        assert!(!done.running);
        assert_eq!(done.result_path.as_deref(), Some("exports/quick/a.txt"));
        assert!(done.error.is_none());

        let failed = status.failed("boom");
        assert!(!failed.running);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }
}
