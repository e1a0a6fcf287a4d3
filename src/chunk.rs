//! Thread chunk assembly.
//!
//! Combines a submission snapshot with a rendered comment tree into the
//! text that gets embedded, plus the flat metadata record stored beside
//! it. Pure: no I/O, no clock.

use crate::ids::derive_point_id;
use crate::models::{Chunk, ChunkMetadata, Comment, Submission};

/// Build the chunk text and metadata for one thread.
///
/// `rendered_thread` is the output of
/// [`build_thread_string`](crate::thread::build_thread_string), sentinel
/// included. `permalink_base` is prepended to the submission's
/// site-relative permalink.
pub fn build_chunk(
    submission: &Submission,
    root: &Comment,
    rendered_thread: &str,
    permalink_base: &str,
) -> (String, ChunkMetadata) {
    let text = format!(
        "TITLE: {}\nCONTENT: {}\nCOMMENT TREE: {}",
        submission.title, submission.selftext, rendered_thread
    );

    let metadata = ChunkMetadata {
        root_comment_id: root.id.clone(),
        post_id: submission.id.clone(),
        author: submission.author.clone(),
        url: submission.url.clone(),
        permalink: format!(
            "{}{}",
            permalink_base.trim_end_matches('/'),
            submission.permalink
        ),
        score: submission.score,
        upvote_ratio: submission.upvote_ratio,
        created_utc: submission.created_utc,
        flair: submission.link_flair_text.clone(),
        nsfw: submission.over_18,
    };

    (text, metadata)
}

/// [`build_chunk`] plus the point id derived from the root comment.
pub fn assemble(
    submission: &Submission,
    root: &Comment,
    rendered_thread: &str,
    permalink_base: &str,
) -> Chunk {
    let (text, metadata) = build_chunk(submission, root, rendered_thread, permalink_base);
    Chunk {
        id: derive_point_id(&root.id),
        text,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::TREE_UNAVAILABLE;

    fn submission() -> Submission {
        Submission {
            id: "post1".into(),
            title: "Help with finals".into(),
            selftext: "Any tips?".into(),
            author: Some("asker".into()),
            url: "https://www.reddit.com/r/PESU/comments/post1/help/".into(),
            permalink: "/r/PESU/comments/post1/help/".into(),
            score: 12,
            upvote_ratio: 0.9,
            created_utc: 1_700_000_000.0,
            link_flair_text: Some("Academics".into()),
            over_18: false,
        }
    }

    fn root() -> Comment {
        Comment {
            id: "abc123".into(),
            body: "Root".into(),
            parent_id: "t3_post1".into(),
            link_id: "t3_post1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_text_layout() {
        let (text, _) = build_chunk(
            &submission(),
            &root(),
            "\nRoot\n└── Reply",
            "https://reddit.com",
        );
        assert_eq!(
            text,
            "TITLE: Help with finals\nCONTENT: Any tips?\nCOMMENT TREE: \nRoot\n└── Reply"
        );
    }

    #[test]
    fn test_metadata_fields() {
        let (_, meta) = build_chunk(&submission(), &root(), "", "https://reddit.com");
        assert_eq!(meta.root_comment_id, "abc123");
        assert_eq!(meta.post_id, "post1");
        assert_eq!(meta.author.as_deref(), Some("asker"));
        assert_eq!(
            meta.permalink,
            "https://reddit.com/r/PESU/comments/post1/help/"
        );
        assert_eq!(meta.score, 12);
        assert_eq!(meta.flair.as_deref(), Some("Academics"));
        assert!(!meta.nsfw);
    }

    #[test]
    fn test_metadata_serializes_nulls() {
        let mut sub = submission();
        sub.author = None;
        sub.link_flair_text = None;
        let (_, meta) = build_chunk(&sub, &root(), "", "https://reddit.com/");
        let value = serde_json::to_value(&meta).unwrap();
        assert!(value["author"].is_null());
        assert!(value["flair"].is_null());
        assert_eq!(value.as_object().unwrap().len(), 10);
        assert_eq!(
            value["permalink"],
            "https://reddit.com/r/PESU/comments/post1/help/"
        );
    }

    #[test]
    fn test_sentinel_is_plain_content() {
        let chunk = assemble(&submission(), &root(), TREE_UNAVAILABLE, "https://reddit.com");
        assert!(chunk.text.ends_with("COMMENT TREE: COMMENT TREE UNAVAILABLE"));
        assert_eq!(chunk.id.to_string(), "696647a0-9c12-5a5e-9299-c6bc6ee9cd55");
    }
}
