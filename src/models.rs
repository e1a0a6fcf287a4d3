//! Core data models used throughout threadsync.
//!
//! These types represent the comments, submissions, and chunks that flow
//! through the ingestion pipeline. Comments and submissions are transient
//! snapshots of platform state; only [`Chunk`]s ever leave the process.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fullname prefix the platform uses for comments.
pub const COMMENT_PREFIX: &str = "t1_";
/// Fullname prefix the platform uses for submissions.
pub const SUBMISSION_PREFIX: &str = "t3_";

/// A single comment as seen by the platform client.
///
/// `replies` holds whatever the platform has loaded so far. Replies that are
/// known to exist but were not returned inline are listed in
/// `more_replies`, and `replies_truncated` marks a comment whose subtree was
/// cut off by the platform's depth limit. Both are resolved by
/// [`Platform::replies`](crate::platform::Platform::replies).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comment {
    /// Native id, without the `t1_` prefix (e.g. `"abc123"`).
    pub id: String,
    pub body: String,
    /// Author handle; `None` for deleted accounts.
    pub author: Option<String>,
    /// Fullname of the parent: `t1_…` for a comment, `t3_…` for a submission.
    pub parent_id: String,
    /// Fullname of the submission this comment belongs to.
    pub link_id: String,
    pub replies: Vec<Comment>,
    /// Ids of direct or nested replies not yet loaded.
    pub more_replies: Vec<String>,
    pub replies_truncated: bool,
}

impl Comment {
    /// The comment's fullname (`t1_<id>`).
    pub fn fullname(&self) -> String {
        format!("{}{}", COMMENT_PREFIX, self.id)
    }

    /// A comment is a root when it hangs directly off a submission.
    pub fn is_root(&self) -> bool {
        self.parent_id.starts_with(SUBMISSION_PREFIX)
    }

    /// Native id of the owning submission.
    pub fn submission_id(&self) -> &str {
        self.link_id
            .strip_prefix(SUBMISSION_PREFIX)
            .unwrap_or(&self.link_id)
    }
}

/// Snapshot of a submission taken at processing time.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: String,
    pub title: String,
    /// Self-post body; empty for link posts.
    pub selftext: String,
    pub author: Option<String>,
    pub url: String,
    /// Site-relative permalink (e.g. `/r/PESU/comments/…`).
    pub permalink: String,
    pub score: i64,
    pub upvote_ratio: f64,
    /// Creation time in epoch seconds.
    pub created_utc: f64,
    pub link_flair_text: Option<String>,
    pub over_18: bool,
}

/// Metadata stored next to each chunk for retrieval-time filtering.
///
/// The field set is fixed; nothing else is written to the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub root_comment_id: String,
    pub post_id: String,
    pub author: Option<String>,
    pub url: String,
    pub permalink: String,
    pub score: i64,
    pub upvote_ratio: f64,
    pub created_utc: f64,
    pub flair: Option<String>,
    pub nsfw: bool,
}

/// The unit of storage: one per distinct thread root.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: Uuid,
    pub text: String,
    pub metadata: ChunkMetadata,
}
