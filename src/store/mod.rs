//! Vector-store abstraction.
//!
//! The [`VectorStore`] trait covers the two operations the pipeline needs:
//! provisioning the target collection and writing a single point. Writes
//! are keyed by point id and overwrite whatever was stored under it.
//!
//! Backends:
//! - [`qdrant::QdrantStore`]: Qdrant over its REST API.
//! - [`memory::InMemoryStore`]: process-local map, for tests and dry runs.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod qdrant;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::config::StoreConfig;

/// Payload key holding the embedded text.
pub const PAYLOAD_TEXT_KEY: &str = "page_content";
/// Payload key holding the metadata object.
pub const PAYLOAD_METADATA_KEY: &str = "metadata";

/// Outcome of [`VectorStore::ensure_collection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    Created,
    AlreadyExists,
}

/// One stored record: vector plus `{page_content, metadata}` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: serde_json::Value,
}

impl VectorPoint {
    /// The payload object as written to the store.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::json!({
            PAYLOAD_TEXT_KEY: self.text,
            PAYLOAD_METADATA_KEY: self.metadata,
        })
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Name of the target collection.
    fn collection(&self) -> &str;

    /// Create the collection if it does not exist yet.
    async fn ensure_collection(&self) -> Result<CollectionStatus>;

    /// Insert or overwrite the point with `point.id`.
    async fn upsert(&self, point: &VectorPoint) -> Result<()>;
}

/// Build the backend named by `config.backend`.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    match config.backend.as_str() {
        "qdrant" => Ok(Arc::new(qdrant::QdrantStore::from_config(config)?)),
        "memory" => Ok(Arc::new(memory::InMemoryStore::new(
            &config.collection,
            config.dims,
        ))),
        other => bail!("Unknown store backend: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_layout() {
        let point = VectorPoint {
            id: Uuid::nil(),
            vector: vec![0.0],
            text: "TITLE: x".into(),
            metadata: serde_json::json!({ "post_id": "p" }),
        };
        let payload = point.payload();
        assert_eq!(payload["page_content"], "TITLE: x");
        assert_eq!(payload["metadata"]["post_id"], "p");
        assert_eq!(payload.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_create_memory_store() {
        let config = StoreConfig {
            backend: "memory".into(),
            ..Default::default()
        };
        let store = create_store(&config).unwrap();
        assert_eq!(store.collection(), "ask-pesu-v2");
    }

    #[test]
    fn test_unknown_backend() {
        let config = StoreConfig {
            backend: "pinecone".into(),
            ..Default::default()
        };
        assert!(create_store(&config).is_err());
    }
}
