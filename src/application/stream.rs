//! Remote message stream.
//!
//! [`HistoryApi`] is the seam to the remote service: one call resolves a
//! chat, another returns one page of history. [`MessageStream`] turns that
//! into a lazily evaluated, ordered sequence with at most one page request in
//! flight, and enforces the run's stop conditions.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{AppError, ChatLocator, ResolvedChat, Result};

use super::raw::RawMessage;

/// Iteration order of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Increasing ids, strictly after the offset.
    Forward,
    /// Decreasing ids, strictly before the offset (`0` means "from newest").
    Backward,
}

/// One page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPage {
    pub direction: Direction,
    pub offset_id: i64,
    pub limit: u32,
}

/// Paginated remote history API.
#[async_trait]
pub trait HistoryApi: Send + Sync {
    /// Confirm access to a chat and return its canonical reference.
    async fn resolve_chat(&self, locator: &ChatLocator) -> Result<ResolvedChat>;

    /// Fetch one page. Forward pages are ascending, backward pages descending.
    /// An empty page means the history is exhausted in that direction.
    async fn get_history(&self, chat: &ResolvedChat, page: HistoryPage) -> Result<Vec<RawMessage>>;
}

/// Where a pass starts and when it stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamBounds {
    pub direction: Direction,
    /// Exclusive starting id (`0` with `Backward` starts from the newest message).
    pub offset_id: i64,
    /// Only honored for backward passes.
    pub cutoff: Option<DateTime<Utc>>,
}

impl StreamBounds {
    /// Resume mode when a minimum id is known, otherwise newest-first with an
    /// optional cutoff. A cutoff combined with a resume point is ignored.
    #[must_use]
    pub fn new(min_id: Option<i64>, cutoff: Option<DateTime<Utc>>) -> Self {
        match min_id {
            Some(min_id) => {
                if let Some(cutoff) = cutoff {
                    tracing::warn!(
                        min_id,
                        %cutoff,
                        "Resuming from existing log; time cutoff is ignored"
                    );
                }
                Self {
                    direction: Direction::Forward,
                    offset_id: min_id,
                    cutoff: None,
                }
            }
            None => Self {
                direction: Direction::Backward,
                offset_id: 0,
                cutoff,
            },
        }
    }

    /// Same direction and cutoff, continuing after `last_id`.
    #[must_use]
    pub const fn continue_after(self, last_id: i64) -> Self {
        Self {
            offset_id: last_id,
            ..self
        }
    }
}

/// Lazily paged, order-checked message sequence.
pub struct MessageStream<'a, A: HistoryApi + ?Sized> {
    api: &'a A,
    chat: &'a ResolvedChat,
    bounds: StreamBounds,
    page_size: u32,
    buffer: VecDeque<RawMessage>,
    last_id: Option<i64>,
    exhausted: bool,
    reached_cutoff: bool,
}

impl<'a, A: HistoryApi + ?Sized> MessageStream<'a, A> {
    #[must_use]
    pub fn new(api: &'a A, chat: &'a ResolvedChat, bounds: StreamBounds, page_size: u32) -> Self {
        Self {
            api,
            chat,
            bounds,
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            last_id: None,
            exhausted: false,
            reached_cutoff: false,
        }
    }

    /// Whether iteration stopped because a message was older than the cutoff.
    #[must_use]
    pub const fn reached_cutoff(&self) -> bool {
        self.reached_cutoff
    }

    /// Next message, or `None` when the history or the time window is exhausted.
    ///
    /// # Errors
    /// Propagates remote errors unchanged (`RateLimited` stays distinct) and
    /// returns `NonMonotonicId` if the remote breaks the pass order.
    pub async fn next(&mut self) -> Result<Option<RawMessage>> {
        if self.exhausted {
            return Ok(None);
        }

        if self.buffer.is_empty() {
            self.fetch_page().await?;
        }

        let Some(message) = self.buffer.pop_front() else {
            self.exhausted = true;
            return Ok(None);
        };

        if let Some(cutoff) = self.bounds.cutoff {
            if message.date < cutoff {
                tracing::debug!(msg_id = message.id, %cutoff, "Reached time cutoff");
                self.reached_cutoff = true;
                self.exhausted = true;
                self.buffer.clear();
                return Ok(None);
            }
        }

        self.check_order(message.id)?;
        self.last_id = Some(message.id);

        Ok(Some(message))
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let page = HistoryPage {
            direction: self.bounds.direction,
            offset_id: self.last_id.unwrap_or(self.bounds.offset_id),
            limit: self.page_size,
        };

        let messages = self.api.get_history(self.chat, page).await?;
        tracing::debug!(
            chat_id = self.chat.id,
            offset_id = page.offset_id,
            count = messages.len(),
            "Fetched history page"
        );

        self.buffer.extend(messages);
        Ok(())
    }

    fn check_order(&self, id: i64) -> Result<()> {
        let previous = self.last_id.or(match self.bounds.direction {
            Direction::Forward => Some(self.bounds.offset_id),
            Direction::Backward if self.bounds.offset_id > 0 => Some(self.bounds.offset_id),
            Direction::Backward => None,
        });

        let Some(previous) = previous else {
            return Ok(());
        };

        let in_order = match self.bounds.direction {
            Direction::Forward => id > previous,
            Direction::Backward => id < previous,
        };

        if in_order {
            Ok(())
        } else {
            Err(AppError::NonMonotonicId { previous, got: id })
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory [`HistoryApi`] used across application tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;

    /// Scripted failure for a given `get_history` call index.
    #[derive(Debug, Clone, Copy)]
    pub enum Failure {
        RateLimit(u64),
        Fatal,
    }

    pub struct FakeHistory {
        pub chat: ResolvedChat,
        messages: Vec<RawMessage>,
        failures: Mutex<HashMap<usize, Failure>>,
        calls: AtomicUsize,
        pub pages: Mutex<Vec<HistoryPage>>,
    }

    impl FakeHistory {
        pub fn new(mut messages: Vec<RawMessage>) -> Self {
            messages.sort_by_key(|m| m.id);
            Self {
                chat: ResolvedChat {
                    id: -100_500,
                    title: Some("fake".into()),
                },
                messages,
                failures: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
                pages: Mutex::new(Vec::new()),
            }
        }

        /// Fail the `call`-th (0-based) history request.
        pub fn fail_on(self, call: usize, failure: Failure) -> Self {
            self.failures.lock().unwrap().insert(call, failure);
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    /// Message `id` sent `minutes_ago` before a fixed reference instant.
    pub fn message_at(id: i64, minutes_ago: i64) -> RawMessage {
        let reference = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        RawMessage {
            id,
            peer_id: -100_500,
            date: reference - chrono::Duration::minutes(minutes_ago),
            from_id: Some(1),
            sender: None,
            reply_to: None,
            message: format!("m{id}"),
            entities: Vec::new(),
            media: None,
        }
    }

    pub fn message(id: i64) -> RawMessage {
        message_at(id, 0)
    }

    #[async_trait]
    impl HistoryApi for FakeHistory {
        async fn resolve_chat(&self, _locator: &ChatLocator) -> Result<ResolvedChat> {
            Ok(self.chat.clone())
        }

        async fn get_history(&self, _chat: &ResolvedChat, page: HistoryPage) -> Result<Vec<RawMessage>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages.lock().unwrap().push(page);

            if let Some(failure) = self.failures.lock().unwrap().remove(&call) {
                return Err(match failure {
                    Failure::RateLimit(secs) => AppError::RateLimited {
                        wait: Duration::from_secs(secs),
                    },
                    Failure::Fatal => AppError::remote("connection reset"),
                });
            }

            let limit = page.limit as usize;
            let result = match page.direction {
                Direction::Forward => self
                    .messages
                    .iter()
                    .filter(|m| m.id > page.offset_id)
                    .take(limit)
                    .cloned()
                    .collect(),
                Direction::Backward => self
                    .messages
                    .iter()
                    .rev()
                    .filter(|m| page.offset_id == 0 || m.id < page.offset_id)
                    .take(limit)
                    .cloned()
                    .collect(),
            };
            Ok(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{message, message_at, Failure, FakeHistory};
    use super::*;

    async fn collect<A: HistoryApi>(stream: &mut MessageStream<'_, A>) -> Result<Vec<i64>> {
        let mut ids = Vec::new();
        while let Some(message) = stream.next().await? {
            ids.push(message.id);
        }
        Ok(ids)
    }

    #[tokio::test]
    async fn test_forward_from_min_id() {
        let api = FakeHistory::new((1..=9).map(message).collect());
        let bounds = StreamBounds::new(Some(4), None);
        let mut stream = MessageStream::new(&api, &api.chat, bounds, 2);

        assert_eq!(collect(&mut stream).await.unwrap(), vec![5, 6, 7, 8, 9]);
        // 3 full/partial pages plus the empty page that ends the stream.
        assert_eq!(api.calls(), 4);
    }

    #[tokio::test]
    async fn test_backward_full_history() {
        let api = FakeHistory::new((1..=5).map(message).collect());
        let mut stream = MessageStream::new(&api, &api.chat, StreamBounds::new(None, None), 100);

        assert_eq!(collect(&mut stream).await.unwrap(), vec![5, 4, 3, 2, 1]);
        assert!(!stream.reached_cutoff());
    }

    #[tokio::test]
    async fn test_cutoff_stops_at_first_older_message() {
        // ids 1..=6, id 6 is newest (0 min ago), id 1 is 50 min ago.
        let api = FakeHistory::new((1..=6).map(|id| message_at(id, (6 - id) * 10)).collect());
        let cutoff = message_at(0, 30).date; // keep messages from the last 30 minutes

        let mut stream =
            MessageStream::new(&api, &api.chat, StreamBounds::new(None, Some(cutoff)), 100);

        // id 3 is exactly at the cutoff and is kept; id 2 is older and ends the pass.
        assert_eq!(collect(&mut stream).await.unwrap(), vec![6, 5, 4, 3]);
        assert!(stream.reached_cutoff());
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn test_resume_wins_over_cutoff() {
        let api = FakeHistory::new((1..=4).map(|id| message_at(id, 1000)).collect());
        let cutoff = message_at(0, 0).date;
        let bounds = StreamBounds::new(Some(2), Some(cutoff));

        assert_eq!(bounds.direction, Direction::Forward);
        assert!(bounds.cutoff.is_none());

        let mut stream = MessageStream::new(&api, &api.chat, bounds, 10);
        assert_eq!(collect(&mut stream).await.unwrap(), vec![3, 4]);
    }

    #[tokio::test]
    async fn test_rate_limit_propagates_distinctly() {
        let api = FakeHistory::new((1..=3).map(message).collect()).fail_on(0, Failure::RateLimit(7));
        let mut stream = MessageStream::new(&api, &api.chat, StreamBounds::new(Some(0), None), 10);

        let err = stream.next().await.unwrap_err();
        assert_eq!(err.rate_limit_wait(), Some(std::time::Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn test_non_monotonic_page_rejected() {
        struct Shuffled;

        #[async_trait]
        impl HistoryApi for Shuffled {
            async fn resolve_chat(&self, _locator: &ChatLocator) -> Result<ResolvedChat> {
                unreachable!()
            }

            async fn get_history(&self, _chat: &ResolvedChat, _page: HistoryPage) -> Result<Vec<RawMessage>> {
                Ok(vec![message(5), message(7), message(6)])
            }
        }

        let chat = ResolvedChat { id: 1, title: None };
        let mut stream = MessageStream::new(&Shuffled, &chat, StreamBounds::new(Some(4), None), 10);

        assert_eq!(stream.next().await.unwrap().map(|m| m.id), Some(5));
        assert_eq!(stream.next().await.unwrap().map(|m| m.id), Some(7));
        assert!(matches!(
            stream.next().await,
            Err(AppError::NonMonotonicId { previous: 7, got: 6 })
        ));
    }

    #[tokio::test]
    async fn test_resumed_stream_never_yields_at_or_below_min_id() {
        struct Replaying;

        #[async_trait]
        impl HistoryApi for Replaying {
            async fn resolve_chat(&self, _locator: &ChatLocator) -> Result<ResolvedChat> {
                unreachable!()
            }

            async fn get_history(&self, _chat: &ResolvedChat, _page: HistoryPage) -> Result<Vec<RawMessage>> {
                Ok(vec![message(3)])
            }
        }

        let chat = ResolvedChat { id: 1, title: None };
        let mut stream = MessageStream::new(&Replaying, &chat, StreamBounds::new(Some(3), None), 10);

        assert!(matches!(
            stream.next().await,
            Err(AppError::NonMonotonicId { previous: 3, got: 3 })
        ));
    }
}
