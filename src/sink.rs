//! Embed-and-write step at the end of the pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::embedding::{embed_one, EmbeddingProvider};
use crate::models::ChunkMetadata;
use crate::store::{VectorPoint, VectorStore};

/// Writes one chunk as one point, replacing any earlier point with the same id.
///
/// No retries happen here: an embedding or store failure is returned to
/// the caller as-is.
#[derive(Clone)]
pub struct UpsertSink {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl UpsertSink {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    pub async fn upsert(&self, id: Uuid, text: &str, metadata: &ChunkMetadata) -> Result<()> {
        let vector = embed_one(self.embedder.as_ref(), text)
            .await
            .with_context(|| format!("embedding failed for point {}", id))?;

        let point = VectorPoint {
            id,
            vector,
            text: text.to_string(),
            metadata: serde_json::to_value(metadata)?,
        };
        self.store
            .upsert(&point)
            .await
            .with_context(|| {
                format!(
                    "upsert into '{}' failed for point {}",
                    self.store.collection(),
                    id
                )
            })
    }
}
