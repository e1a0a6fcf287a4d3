//! The stream listener: one sequential worker that turns each new comment
//! into an upsert of its whole thread.
//!
//! For every event the [`Pipeline`] runs, strictly in order:
//!
//! 1. fetch the submission,
//! 2. walk up to the root comment,
//! 3. render the root's thread,
//! 4. build the chunk text and metadata,
//! 5. derive the point id from the root id,
//! 6. embed and upsert.
//!
//! Events authored by `AutoModerator` are dropped before step 1. A failure
//! in any step is logged, counted in [`IngestStats`], and the loop moves
//! on; only the end of the stream stops it.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chunk;
use crate::models::{Chunk, Comment};
use crate::platform::{CommentStream, Platform};
use crate::sink::UpsertSink;
use crate::thread::{build_thread_string, find_root};

/// Author whose events never reach the pipeline.
pub const AUTOMODERATOR: &str = "AutoModerator";

/// Case-insensitive match against [`AUTOMODERATOR`].
pub fn is_automoderator(comment: &Comment) -> bool {
    comment
        .author
        .as_deref()
        .is_some_and(|a| a.eq_ignore_ascii_case(AUTOMODERATOR))
}

/// Counters shared between the listener task and the `/status` endpoint.
#[derive(Debug, Default)]
pub struct IngestStats {
    events_seen: AtomicU64,
    skipped_moderator: AtomicU64,
    upserted: AtomicU64,
    failed: AtomicU64,
    last_upsert_unix: AtomicI64,
    running: AtomicBool,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub events_seen: u64,
    pub skipped_moderator: u64,
    pub upserted: u64,
    pub failed: u64,
    /// RFC 3339 time of the last successful upsert.
    pub last_upsert_at: Option<String>,
    /// `"running"` or `"stopped"`.
    pub listener: &'static str,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let last = self.last_upsert_unix.load(Ordering::Relaxed);
        let last_upsert_at = (last > 0)
            .then(|| chrono::DateTime::from_timestamp(last, 0))
            .flatten()
            .map(|dt| dt.to_rfc3339());

        StatsSnapshot {
            events_seen: self.events_seen.load(Ordering::Relaxed),
            skipped_moderator: self.skipped_moderator.load(Ordering::Relaxed),
            upserted: self.upserted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            last_upsert_at,
            listener: if self.running.load(Ordering::Relaxed) {
                "running"
            } else {
                "stopped"
            },
        }
    }

    fn record(&self, outcome: &Result<Outcome>) {
        match outcome {
            Ok(Outcome::SkippedModerator) => {
                self.skipped_moderator.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Outcome::Upserted { .. }) => {
                self.upserted.fetch_add(1, Ordering::Relaxed);
                self.last_upsert_unix
                    .store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
            }
            Err(_) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Clears the running flag however the listener loop exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    SkippedModerator,
    Upserted { point_id: Uuid, root_id: String },
}

/// Steps 1–5 for one comment: everything up to, not including, the upsert.
pub async fn assemble_chunk(
    platform: &dyn Platform,
    comment: &Comment,
    permalink_base: &str,
) -> Result<Chunk> {
    let submission = platform
        .submission(comment)
        .await
        .with_context(|| format!("fetching submission {}", comment.link_id))?;
    let root = find_root(platform, comment)
        .await
        .with_context(|| format!("finding root of comment {}", comment.id))?;
    let rendered = build_thread_string(platform, &root).await;
    Ok(chunk::assemble(&submission, &root, &rendered, permalink_base))
}

/// Explicit dependencies of the listener.
pub struct Pipeline {
    platform: Arc<dyn Platform>,
    sink: UpsertSink,
    permalink_base: String,
    stats: Arc<IngestStats>,
}

impl Pipeline {
    pub fn new(
        platform: Arc<dyn Platform>,
        sink: UpsertSink,
        permalink_base: impl Into<String>,
        stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            platform,
            sink,
            permalink_base: permalink_base.into(),
            stats,
        }
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Run the full pipeline for one comment.
    pub async fn handle_event(&self, comment: &Comment) -> Result<Outcome> {
        if is_automoderator(comment) {
            debug!(comment_id = %comment.id, "skipping AutoModerator comment");
            return Ok(Outcome::SkippedModerator);
        }

        let chunk = assemble_chunk(self.platform.as_ref(), comment, &self.permalink_base).await?;
        self.sink.upsert(chunk.id, &chunk.text, &chunk.metadata).await?;

        info!(
            comment_id = %comment.id,
            root_id = %chunk.metadata.root_comment_id,
            point_id = %chunk.id,
            "thread upserted"
        );
        Ok(Outcome::Upserted {
            point_id: chunk.id,
            root_id: chunk.metadata.root_comment_id,
        })
    }

    /// Process events until the stream ends. Per-event failures are
    /// logged and counted, never propagated.
    pub async fn run(&self, stream: &mut dyn CommentStream) {
        self.stats.running.store(true, Ordering::Relaxed);
        let _guard = RunningGuard(&self.stats.running);

        while let Some(comment) = stream.next_comment().await {
            self.stats.events_seen.fetch_add(1, Ordering::Relaxed);
            let outcome = self.handle_event(&comment).await;
            if let Err(err) = &outcome {
                error!(
                    comment_id = %comment.id,
                    error = %format!("{:#}", err),
                    "failed to process comment"
                );
            }
            self.stats.record(&outcome);
        }
    }
}

/// Start the listener on its own task.
///
/// The task runs for as long as the stream yields events, which for the
/// live feed is the life of the process. There is no shutdown signal.
pub fn spawn_listener(
    pipeline: Arc<Pipeline>,
    mut stream: Box<dyn CommentStream>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("listener started");
        pipeline.run(stream.as_mut()).await;
        warn!("comment stream ended; listener stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by(author: Option<&str>) -> Comment {
        Comment {
            id: "c".into(),
            author: author.map(str::to_string),
            parent_id: "t3_p".into(),
            link_id: "t3_p".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_automoderator_any_case() {
        assert!(is_automoderator(&by(Some("AutoModerator"))));
        assert!(is_automoderator(&by(Some("automoderator"))));
        assert!(is_automoderator(&by(Some("AUTOMODERATOR"))));
        assert!(!is_automoderator(&by(Some("AutoModerator2"))));
        assert!(!is_automoderator(&by(Some("someone"))));
        assert!(!is_automoderator(&by(None)));
    }

    #[test]
    fn test_snapshot_defaults() {
        let stats = IngestStats::new();
        let snap = stats.snapshot();
        assert_eq!(snap.events_seen, 0);
        assert_eq!(snap.last_upsert_at, None);
        assert_eq!(snap.listener, "stopped");
    }

    #[test]
    fn test_record_outcomes() {
        let stats = IngestStats::new();
        stats.record(&Ok(Outcome::SkippedModerator));
        stats.record(&Ok(Outcome::Upserted {
            point_id: Uuid::nil(),
            root_id: "r".into(),
        }));
        stats.record(&Err(anyhow::anyhow!("boom")));

        let snap = stats.snapshot();
        assert_eq!(snap.skipped_moderator, 1);
        assert_eq!(snap.upserted, 1);
        assert_eq!(snap.failed, 1);
        assert!(snap.last_upsert_at.is_some());
    }

    #[test]
    fn test_running_guard_clears_flag() {
        let flag = AtomicBool::new(true);
        {
            let _guard = RunningGuard(&flag);
        }
        assert!(!flag.load(Ordering::Relaxed));
    }
}
