//! Thread reconstruction.
//!
//! Two walks over a remote, partially failing comment graph:
//!
//! - **Upward**: [`find_root`] follows parent links until it reaches the
//!   comment that hangs directly off the submission.
//! - **Downward**: [`build_thread_string`] refreshes that root, fetches
//!   replies depth-first, and renders the result as an indented tree.
//!
//! Failures on the way down are contained per node: a reply whose own
//! replies cannot be fetched is logged and rendered as a leaf, and its
//! siblings are still rendered. Only a failure at the root itself degrades the whole output
//! to [`TREE_UNAVAILABLE`].
//!
//! # Output
//!
//! ```text
//!
//! Root comment
//! ├── First reply
//! │   └── Nested reply
//! └── Second reply
//! ```
//!
//! The string starts with a newline, the root line carries no prefix, and
//! continuation lines of multi-line bodies repeat the node's fill.

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use crate::models::Comment;
use crate::platform::{Platform, PlatformError};

/// Rendered in place of the tree when the root cannot be fetched.
pub const TREE_UNAVAILABLE: &str = "COMMENT TREE UNAVAILABLE";

const BRANCH: &str = "├── ";
const LAST_BRANCH: &str = "└── ";
const PIPE_FILL: &str = "│   ";
const SPACE_FILL: &str = "    ";

/// Walk parent links until reaching a root comment.
pub async fn find_root(
    platform: &dyn Platform,
    comment: &Comment,
) -> Result<Comment, PlatformError> {
    let mut current = comment.clone();
    while !current.is_root() {
        current = platform.parent(&current).await?;
    }
    Ok(current)
}

/// One comment body and its rendered replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadNode {
    pub body: String,
    pub children: Vec<ThreadNode>,
}

impl ThreadNode {
    pub fn leaf(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            children: Vec::new(),
        }
    }

    /// Render this node and its descendants, one line per body line.
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        push_body(&mut lines, "", "", &self.body);
        self.render_children("", &mut lines);
        lines.join("\n")
    }

    fn render_children(&self, fill: &str, lines: &mut Vec<String>) {
        let last = self.children.len().saturating_sub(1);
        for (i, child) in self.children.iter().enumerate() {
            let (connector, own_fill) = if i == last {
                (LAST_BRANCH, SPACE_FILL)
            } else {
                (BRANCH, PIPE_FILL)
            };
            let child_fill = format!("{fill}{own_fill}");
            push_body(lines, &format!("{fill}{connector}"), &child_fill, &child.body);
            child.render_children(&child_fill, lines);
        }
    }
}

fn push_body(lines: &mut Vec<String>, first_prefix: &str, rest_prefix: &str, body: &str) {
    let mut parts = body.split('\n');
    lines.push(format!("{first_prefix}{}", parts.next().unwrap_or_default()));
    for part in parts {
        lines.push(format!("{rest_prefix}{part}"));
    }
}

type NodeFuture<'a> = Pin<Box<dyn Future<Output = Result<ThreadNode, PlatformError>> + Send + 'a>>;

/// Build the render tree under `comment`.
///
/// An error fetching `comment`'s own replies is returned. Below it, a reply
/// whose replies cannot be fetched is kept as a leaf and its unfetched
/// descendants are dropped.
pub fn build_node<'a>(platform: &'a dyn Platform, comment: &'a Comment) -> NodeFuture<'a> {
    Box::pin(async move {
        let replies = platform.replies(comment).await?;
        let mut children = Vec::with_capacity(replies.len());
        for reply in &replies {
            match build_node(platform, reply).await {
                Ok(node) => children.push(node),
                Err(err) => {
                    warn!(
                        comment_id = %reply.id,
                        error = %err,
                        "dropping replies below comment"
                    );
                    children.push(ThreadNode::leaf(&reply.body));
                }
            }
        }
        Ok(ThreadNode {
            body: comment.body.clone(),
            children,
        })
    })
}

/// Refresh `root` and render its whole current thread.
///
/// Never fails: an unreachable root yields [`TREE_UNAVAILABLE`].
pub async fn build_thread_string(platform: &dyn Platform, root: &Comment) -> String {
    let fresh = match platform.refresh(root).await {
        Ok(comment) => comment,
        Err(err) => {
            warn!(root_id = %root.id, error = %err, "could not refresh thread root");
            return TREE_UNAVAILABLE.to_string();
        }
    };

    match build_node(platform, &fresh).await {
        Ok(node) => format!("\n{}", node.render()),
        Err(err) => {
            warn!(root_id = %root.id, error = %err, "could not fetch root replies");
            TREE_UNAVAILABLE.to_string()
        }
    }
}
