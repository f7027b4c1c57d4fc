//! Export orchestration.
//!
//! Resolves the chat, looks up the resume point in the existing log, streams
//! messages under the batch scheduler and appends each one as a record.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::domain::{ExportConfig, ExportSummary, ResolvedChat, Result};
use crate::infrastructure::export_log::{resume_point, ExportLog};

use super::resolver::resolve_locator;
use super::scheduler::{BatchScheduler, ProgressObserver, Sleeper};
use super::stream::{HistoryApi, MessageStream, StreamBounds};

/// One export run.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Link or handle of the chat.
    pub locator: String,
    /// Export log path; an existing log is resumed.
    pub output: PathBuf,
    /// Oldest message to include when starting fresh.
    pub cutoff: Option<DateTime<Utc>>,
}

/// Runs export passes against a history API.
pub struct ExportService<A, S> {
    api: A,
    sleeper: S,
    config: ExportConfig,
    cancel: CancellationToken,
}

impl<A: HistoryApi, S: Sleeper> ExportService<A, S> {
    #[must_use]
    pub fn new(api: A, sleeper: S, config: ExportConfig) -> Self {
        Self {
            api,
            sleeper,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between records once the token is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[cfg(test)]
    pub const fn api(&self) -> &A {
        &self.api
    }

    #[must_use]
    pub const fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Export or resume into `request.output`.
    ///
    /// A rate-limit signal is honored once: after waiting, the pass restarts
    /// from the last appended id in the same direction. Any other failure
    /// aborts the run; records already appended stay in the log.
    ///
    /// # Errors
    /// Returns error on an invalid locator, a remote failure, a second rate
    /// limit, an out-of-order id, or a log write failure.
    pub async fn run(
        &self,
        request: &ExportRequest,
        progress: &dyn ProgressObserver,
    ) -> Result<ExportSummary> {
        let locator = resolve_locator(&request.locator)?;
        let chat = self.api.resolve_chat(&locator).await?;
        tracing::info!(
            chat_id = chat.id,
            title = chat.title.as_deref().unwrap_or(""),
            "Resolved chat"
        );

        let resumed_from = resume_point(&request.output);
        let mut log = match resumed_from {
            Some(min_id) => {
                tracing::info!(min_id, path = %request.output.display(), "Resuming export");
                ExportLog::open_append(&request.output)?
            }
            None => ExportLog::create(&request.output)?,
        };

        let mut bounds = StreamBounds::new(resumed_from, request.cutoff);
        let mut scheduler =
            BatchScheduler::new(&self.sleeper, self.config.batch_size, self.config.delay_bounds());
        let mut summary = ExportSummary {
            resumed_from,
            ..ExportSummary::default()
        };
        let mut last_appended = None;

        loop {
            let outcome = self
                .pass(&chat, bounds, &mut log, &mut scheduler, progress, &mut summary, &mut last_appended)
                .await;

            let Err(err) = outcome else { break };

            match err.rate_limit_wait() {
                Some(wait) if !summary.retried => {
                    summary.retried = true;
                    scheduler.wait_after_rate_limit(wait).await;
                    if let Some(last_id) = last_appended {
                        bounds = bounds.continue_after(last_id);
                    }
                    tracing::info!(offset_id = bounds.offset_id, "Retrying export pass");
                }
                _ => {
                    tracing::error!(written = summary.written, error = %err, "Export aborted");
                    return Err(err);
                }
            }
        }

        summary.file_size = log.size()?;
        tracing::info!(
            written = summary.written,
            file_size = summary.file_size,
            path = %log.path().display(),
            "Export finished"
        );

        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    async fn pass(
        &self,
        chat: &ResolvedChat,
        bounds: StreamBounds,
        log: &mut ExportLog,
        scheduler: &mut BatchScheduler<'_, S>,
        progress: &dyn ProgressObserver,
        summary: &mut ExportSummary,
        last_appended: &mut Option<i64>,
    ) -> Result<()> {
        let mut stream = MessageStream::new(&self.api, chat, bounds, self.config.batch_size);

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(written = summary.written, "Export cancelled");
                summary.cancelled = true;
                return Ok(());
            }

            let Some(message) = stream.next().await? else { break };
            let record = message.into_record();
            log.append(&record)?;

            *last_appended = Some(record.msg_id);
            summary.written += 1;
            scheduler.record_emitted(progress).await;
        }

        summary.reached_cutoff |= stream.reached_cutoff();
        Ok(())
    }
}
