//! Process-wide export job status.
//!
//! One owner writes, everyone else reads snapshot copies. At most one job can
//! be running at a time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{AppError, JobStatus, RecentExport, Result};

use super::scheduler::ProgressObserver;

/// Number of finished exports kept for the status surface.
pub const RECENT_LIMIT: usize = 10;

#[derive(Debug, Default)]
struct TrackerState {
    status: JobStatus,
    recent: VecDeque<RecentExport>,
}

/// Shared handle over the job status.
#[derive(Debug, Clone, Default)]
pub struct JobTracker {
    inner: Arc<Mutex<TrackerState>>,
}

impl JobTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a job as started, resetting progress and error.
    ///
    /// # Errors
    /// Returns `JobAlreadyRunning` if another job has not finished yet.
    pub fn try_start(&self, message: impl Into<String>) -> Result<()> {
        let mut state = self.lock();
        if state.status.running {
            return Err(AppError::JobAlreadyRunning);
        }
        state.status = JobStatus::starting(message);
        Ok(())
    }

    /// Copy of the current status.
    #[must_use]
    pub fn snapshot(&self) -> JobStatus {
        self.lock().status.clone()
    }

    /// Recent exports, newest first.
    #[must_use]
    pub fn recent(&self) -> Vec<RecentExport> {
        self.lock().recent.iter().cloned().collect()
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.lock().status.message = message.into();
    }

    /// Finish the running job and record it in the recent list.
    pub fn finish(&self, message: impl Into<String>, export: RecentExport) {
        let mut state = self.lock();
        state.status = std::mem::take(&mut state.status).finished(message, export.file.clone());
        state.recent.push_front(export);
        state.recent.truncate(RECENT_LIMIT);
    }

    /// Fail the running job.
    pub fn fail(&self, error: impl Into<String>) {
        let mut state = self.lock();
        state.status = std::mem::take(&mut state.status).failed(error);
    }
}

impl ProgressObserver for JobTracker {
    fn on_progress(&self, exported: u64) {
        self.lock().status.progress = exported;
    }
}
