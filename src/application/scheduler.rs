//! Pacing for export passes and periodic sync.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// Suspends the current task. Injected so tests can record waits.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Receives the running record count at every batch boundary.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, exported: u64);
}

/// Observer that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, exported: u64) {
        tracing::info!(exported, "Export progress");
    }
}

/// Uniform duration in `[min, max]`; `min` when the range is empty.
fn jitter_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let secs = rand::thread_rng().gen_range(min.as_secs_f64()..=max.as_secs_f64());
    Duration::from_secs_f64(secs)
}

/// Inserts a randomized pause after every full batch of emitted records.
pub struct BatchScheduler<'a, S: Sleeper + ?Sized> {
    sleeper: &'a S,
    batch_size: u64,
    min_delay: Duration,
    max_delay: Duration,
    emitted: u64,
}

impl<'a, S: Sleeper + ?Sized> BatchScheduler<'a, S> {
    #[must_use]
    pub fn new(sleeper: &'a S, batch_size: u32, delay_bounds: (Duration, Duration)) -> Self {
        Self {
            sleeper,
            batch_size: u64::from(batch_size.max(1)),
            min_delay: delay_bounds.0,
            max_delay: delay_bounds.1,
            emitted: 0,
        }
    }

    /// Count one emitted record; at a batch boundary notify and pause.
    pub async fn record_emitted(&mut self, progress: &dyn ProgressObserver) {
        self.emitted += 1;
        if self.emitted % self.batch_size != 0 {
            return;
        }

        progress.on_progress(self.emitted);
        let delay = jitter_between(self.min_delay, self.max_delay);
        tracing::debug!(emitted = self.emitted, delay_ms = delay.as_millis(), "Batch pause");
        self.sleeper.sleep(delay).await;
    }

    /// Waits exactly the duration the remote asked for.
    pub async fn wait_after_rate_limit(&self, wait: Duration) {
        tracing::warn!(wait_secs = wait.as_secs(), "Rate limited, waiting before retry");
        self.sleeper.sleep(wait).await;
    }
}

/// Interval between periodic sync passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSchedule {
    requested: Duration,
    floor: Duration,
    max_jitter: Duration,
}

impl SyncSchedule {
    #[must_use]
    pub const fn new(requested: Duration, floor: Duration, max_jitter: Duration) -> Self {
        Self {
            requested,
            floor,
            max_jitter,
        }
    }

    /// Requested interval raised to the floor.
    #[must_use]
    pub fn effective_interval(&self) -> Duration {
        self.requested.max(self.floor)
    }

    /// Effective interval plus jitter in `[0, max_jitter)`.
    #[must_use]
    pub fn next_wait(&self) -> Duration {
        let jitter = if self.max_jitter.is_zero() {
            Duration::ZERO
        } else {
            let millis = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
            Duration::from_millis(rand::thread_rng().gen_range(0..millis))
        };
        self.effective_interval() + jitter
    }
}
