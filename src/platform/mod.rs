//! Discussion-platform abstraction.
//!
//! The pipeline never talks to Reddit directly. It goes through two traits:
//!
//! - [`Platform`]: point lookups: a comment's submission, its parent, a
//!   fresh copy of it with replies loaded, and its direct replies.
//! - [`CommentStream`]: the live feed of new comments.
//!
//! Every call may fail independently with a [`PlatformError`]. Callers
//! decide how far a failure propagates; the thread walker in
//! [`crate::thread`] contains it at the level of a single node.
//!
//! ```text
//! ┌────────────────┐   next_comment()   ┌────────────┐
//! │ CommentStream  │───────────────────▶│  listener  │
//! └────────────────┘                    └─────┬──────┘
//!                                             │ submission / parent /
//!                                             ▼ refresh / replies
//!                                       ┌────────────┐
//!                                       │  Platform  │
//!                                       └────────────┘
//! ```

pub mod reddit;
pub mod stream;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Comment, Submission};

/// Failures reported by platform calls.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("rate limited by platform")]
    RateLimited { retry_after: Option<Duration> },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode platform response: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for PlatformError {
    fn from(err: serde_json::Error) -> Self {
        PlatformError::Decode(err.to_string())
    }
}

/// Read access to comments and submissions on the configured community.
#[async_trait]
pub trait Platform: Send + Sync {
    /// The submission a comment was posted under.
    async fn submission(&self, comment: &Comment) -> Result<Submission, PlatformError>;

    /// The parent comment. Only meaningful when `!comment.is_root()`.
    async fn parent(&self, comment: &Comment) -> Result<Comment, PlatformError>;

    /// Re-fetch a comment together with its current reply tree.
    async fn refresh(&self, comment: &Comment) -> Result<Comment, PlatformError>;

    /// Direct replies of a comment, in platform order, loading any replies
    /// the comment only references.
    async fn replies(&self, comment: &Comment) -> Result<Vec<Comment>, PlatformError>;
}

/// A live, conceptually infinite feed of new comments.
///
/// Transport hiccups are the stream's own business: implementations retry
/// internally and only return `None` when the feed has truly ended.
#[async_trait]
pub trait CommentStream: Send {
    async fn next_comment(&mut self) -> Option<Comment>;
}
