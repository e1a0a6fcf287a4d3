//! Live comment feed for one subreddit.
//!
//! Reddit has no push API for comments, so [`RedditCommentStream`] polls
//! the subreddit's newest-comments listing and turns it into an infinite
//! stream. A bounded window of recently seen ids removes the overlap
//! between consecutive polls, and idle or failed polls back off
//! exponentially until something new shows up.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::reddit::RedditClient;
use super::{CommentStream, PlatformError};
use crate::config::RedditConfig;
use crate::models::Comment;

/// Listing page size requested per poll (the API maximum).
pub const POLL_LIMIT: usize = 100;
/// Number of recent comment ids remembered for de-duplication.
pub const SEEN_WINDOW: usize = 301;
const INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Fixed-capacity set of recently seen ids; the oldest id is evicted first.
#[derive(Debug)]
pub struct SeenSet {
    order: VecDeque<String>,
    ids: HashSet<String>,
    capacity: usize,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Record `id`; returns `false` if it was already in the window.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.ids.insert(id.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Exponential wait between unproductive polls: 1s, 2s, 4s… up to `max`.
#[derive(Debug)]
pub struct PollBackoff {
    current: Duration,
    max: Duration,
}

impl PollBackoff {
    pub fn new(max: Duration) -> Self {
        Self {
            current: INITIAL_DELAY.min(max),
            max,
        }
    }

    /// The delay to wait now; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = INITIAL_DELAY.min(self.max);
    }
}

/// De-duplication and first-batch handling, independent of transport.
#[derive(Debug)]
pub struct StreamState {
    seen: SeenSet,
    skip_existing: bool,
    primed: bool,
}

impl StreamState {
    pub fn new(skip_existing: bool) -> Self {
        Self {
            seen: SeenSet::new(SEEN_WINDOW),
            skip_existing,
            primed: false,
        }
    }

    /// Take one newest-first listing page and return the comments not seen
    /// before, oldest first. With `skip_existing`, the very first page only
    /// primes the window.
    pub fn absorb(&mut self, newest_first: Vec<Comment>) -> Vec<Comment> {
        let fresh: Vec<Comment> = newest_first
            .into_iter()
            .rev()
            .filter(|c| self.seen.insert(&c.id))
            .collect();

        if !self.primed {
            self.primed = true;
            if self.skip_existing {
                debug!(skipped = fresh.len(), "skipping pre-existing comments");
                return Vec::new();
            }
        }
        fresh
    }
}

/// Polling [`CommentStream`] over a subreddit's newest comments.
pub struct RedditCommentStream {
    client: Arc<RedditClient>,
    subreddit: String,
    state: StreamState,
    backoff: PollBackoff,
    buffer: VecDeque<Comment>,
}

impl RedditCommentStream {
    pub fn new(client: Arc<RedditClient>, config: &RedditConfig) -> Self {
        Self {
            client,
            subreddit: config.subreddit.clone(),
            state: StreamState::new(config.skip_existing),
            backoff: PollBackoff::new(Duration::from_secs(config.poll_max_wait_secs)),
            buffer: VecDeque::new(),
        }
    }
}

#[async_trait]
impl CommentStream for RedditCommentStream {
    async fn next_comment(&mut self) -> Option<Comment> {
        loop {
            if let Some(comment) = self.buffer.pop_front() {
                return Some(comment);
            }

            let delay = match self.client.new_comments(&self.subreddit, POLL_LIMIT).await {
                Ok(page) => {
                    let fresh = self.state.absorb(page);
                    if fresh.is_empty() {
                        self.backoff.next_delay()
                    } else {
                        debug!(count = fresh.len(), "new comments");
                        self.backoff.reset();
                        self.buffer.extend(fresh);
                        continue;
                    }
                }
                Err(PlatformError::RateLimited { retry_after }) => {
                    let delay = retry_after.unwrap_or_else(|| self.backoff.next_delay());
                    warn!(
                        subreddit = %self.subreddit,
                        wait_secs = delay.as_secs(),
                        "rate limited while polling"
                    );
                    delay
                }
                Err(err) => {
                    let delay = self.backoff.next_delay();
                    warn!(
                        subreddit = %self.subreddit,
                        error = %err,
                        wait_secs = delay.as_secs(),
                        "comment stream poll failed, reconnecting"
                    );
                    delay
                }
            };
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.to_string(),
            parent_id: "t3_p".to_string(),
            link_id: "t3_p".to_string(),
            ..Default::default()
        }
    }

    fn ids(comments: &[Comment]) -> Vec<&str> {
        comments.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_seen_set_evicts_oldest() {
        let mut seen = SeenSet::new(3);
        assert!(seen.insert("a"));
        assert!(seen.insert("b"));
        assert!(seen.insert("c"));
        assert!(!seen.insert("a"));
        assert!(seen.insert("d"));
        assert_eq!(seen.len(), 3);
        // "a" fell out of the window
        assert!(seen.insert("a"));
        assert!(!seen.insert("d"));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = PollBackoff::new(Duration::from_secs(16));
        let delays: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 16, 16]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_absorb_yields_oldest_first_without_repeats() {
        let mut state = StreamState::new(false);
        let first = state.absorb(vec![comment("c3"), comment("c2"), comment("c1")]);
        assert_eq!(ids(&first), vec!["c1", "c2", "c3"]);

        let second = state.absorb(vec![comment("c5"), comment("c4"), comment("c3")]);
        assert_eq!(ids(&second), vec!["c4", "c5"]);

        assert!(state.absorb(vec![comment("c5")]).is_empty());
    }

    #[test]
    fn test_skip_existing_drops_only_first_page() {
        let mut state = StreamState::new(true);
        assert!(state.absorb(vec![comment("old2"), comment("old1")]).is_empty());

        let next = state.absorb(vec![comment("new1"), comment("old2")]);
        assert_eq!(ids(&next), vec!["new1"]);
    }
}
