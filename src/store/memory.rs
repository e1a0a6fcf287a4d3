//! In-memory [`VectorStore`] implementation for testing and dry runs.
//!
//! Points live in a `HashMap` behind `std::sync::RwLock`, keyed by point
//! id, so repeated upserts of one id leave a single entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use super::{CollectionStatus, VectorPoint, VectorStore};

pub struct InMemoryStore {
    collection: String,
    dims: usize,
    created: AtomicBool,
    points: RwLock<HashMap<Uuid, VectorPoint>>,
}

impl InMemoryStore {
    pub fn new(collection: &str, dims: usize) -> Self {
        Self {
            collection: collection.to_string(),
            dims,
            created: AtomicBool::new(false),
            points: RwLock::new(HashMap::new()),
        }
    }

    /// Stored point for `id`, if any.
    pub fn get(&self, id: &Uuid) -> Result<Option<VectorPoint>> {
        let points = self
            .points
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        Ok(points.get(id).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        let points = self
            .points
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        Ok(points.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn ensure_collection(&self) -> Result<CollectionStatus> {
        if self.created.swap(true, Ordering::SeqCst) {
            Ok(CollectionStatus::AlreadyExists)
        } else {
            Ok(CollectionStatus::Created)
        }
    }

    async fn upsert(&self, point: &VectorPoint) -> Result<()> {
        if point.vector.len() != self.dims {
            bail!(
                "vector dimension mismatch for collection '{}': got {}, expected {}",
                self.collection,
                point.vector.len(),
                self.dims
            );
        }
        let mut points = self
            .points
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory store lock poisoned"))?;
        points.insert(point.id, point.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: Uuid, text: &str) -> VectorPoint {
        VectorPoint {
            id,
            vector: vec![0.1, 0.2, 0.3],
            text: text.into(),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_ensure_collection_reports_existing() {
        let store = InMemoryStore::new("c", 3);
        assert_eq!(store.ensure_collection().await.unwrap(), CollectionStatus::Created);
        assert_eq!(
            store.ensure_collection().await.unwrap(),
            CollectionStatus::AlreadyExists
        );
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let store = InMemoryStore::new("c", 3);
        let id = Uuid::new_v4();
        store.upsert(&point(id, "first")).await.unwrap();
        store.upsert(&point(id, "second")).await.unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get(&id).unwrap().unwrap().text, "second");
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dims() {
        let store = InMemoryStore::new("c", 4);
        assert!(store.upsert(&point(Uuid::new_v4(), "x")).await.is_err());
        assert!(store.is_empty().unwrap());
    }
}
