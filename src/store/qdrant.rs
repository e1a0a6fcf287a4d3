//! Qdrant backend over the REST API.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | ensure collection | `PUT /collections/{name}` with `{"vectors": {"size", "distance"}}` |
//! | check existing collection | `GET /collections/{name}` |
//! | upsert | `PUT /collections/{name}/points?wait=true` |
//!
//! When `QDRANT_API_KEY` is set it is sent as the `api-key` header on
//! every request. Every call carries the configured timeout.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{CollectionStatus, VectorPoint, VectorStore};
use crate::config::StoreConfig;

#[derive(Debug, Deserialize)]
struct CollectionInfoResponse {
    result: CollectionInfo,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Debug, Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Debug, Deserialize)]
struct CollectionParams {
    vectors: serde_json::Value,
}

pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    dims: usize,
    distance: String,
}

impl QdrantStore {
    /// Build a store for `config`, resolving the URL and API key from the
    /// environment.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let url = config.resolved_url()?;
        let api_key = std::env::var("QDRANT_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self::new(
            &url,
            api_key.as_deref(),
            &config.collection,
            config.dims,
            &config.distance,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(
        url: &str,
        api_key: Option<&str>,
        collection: &str,
        dims: usize,
        distance: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert(
                "api-key",
                HeaderValue::from_str(key).context("QDRANT_API_KEY is not a valid header value")?,
            );
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("failed to build Qdrant HTTP client")?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            dims,
            distance: distance.to_string(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    /// Fail unless the existing collection stores single unnamed vectors
    /// of this store's size and distance.
    async fn check_existing(&self) -> Result<()> {
        let resp = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .with_context(|| format!("failed to reach Qdrant at {}", self.base_url))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!(
                "could not read collection '{}' ({}): {}",
                self.collection,
                status,
                text
            );
        }
        let info: CollectionInfoResponse = resp.json().await.with_context(|| {
            format!("unexpected info response for collection '{}'", self.collection)
        })?;
        let vectors = &info.result.config.params.vectors;

        let Some(size) = vectors.get("size").and_then(|v| v.as_u64()) else {
            bail!(
                "collection '{}' does not hold a single unnamed vector: {}",
                self.collection,
                vectors
            );
        };
        if size != self.dims as u64 {
            bail!(
                "collection '{}' stores {}-dimensional vectors but the embedder produces {}",
                self.collection,
                size,
                self.dims
            );
        }
        if let Some(distance) = vectors.get("distance").and_then(|v| v.as_str()) {
            if !distance.eq_ignore_ascii_case(&self.distance) {
                bail!(
                    "collection '{}' uses {} distance, configured {}",
                    self.collection,
                    distance,
                    self.distance
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn ensure_collection(&self) -> Result<CollectionStatus> {
        let body = json!({
            "vectors": {
                "size": self.dims,
                "distance": self.distance,
            }
        });
        let resp = self
            .client
            .put(self.collection_url())
            .json(&body)
            .send()
            .await
            .with_context(|| format!("failed to reach Qdrant at {}", self.base_url))?;

        let status = resp.status();
        if status.is_success() {
            info!(
                collection = %self.collection,
                dims = self.dims,
                distance = %self.distance,
                "created collection"
            );
            return Ok(CollectionStatus::Created);
        }

        let text = resp.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT
            || (status == StatusCode::BAD_REQUEST && text.contains("already exists"))
        {
            self.check_existing().await?;
            info!(collection = %self.collection, "collection already exists");
            return Ok(CollectionStatus::AlreadyExists);
        }
        bail!(
            "Qdrant rejected collection '{}' ({}): {}",
            self.collection,
            status,
            text
        );
    }

    async fn upsert(&self, point: &VectorPoint) -> Result<()> {
        let body = json!({
            "points": [{
                "id": point.id.to_string(),
                "vector": point.vector,
                "payload": point.payload(),
            }]
        });
        let resp = self
            .client
            .put(format!("{}/points", self.collection_url()))
            .query(&[("wait", "true")])
            .json(&body)
            .send()
            .await
            .context("Qdrant upsert request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("Qdrant upsert failed ({}): {}", status, text);
        }
        debug!(point_id = %point.id, collection = %self.collection, "point upserted");
        Ok(())
    }
}
