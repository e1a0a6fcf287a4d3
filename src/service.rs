//! Startup and wiring.
//!
//! [`run`] performs the startup sequence in order and treats every failure
//! as fatal: embedding provider, collection provisioning, Reddit
//! authentication. Only after all three succeed does the listener start and
//! the HTTP server bind.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::{Config, RedditCredentials};
use crate::embedding::create_provider;
use crate::listener::{assemble_chunk, is_automoderator, spawn_listener, IngestStats, Pipeline};
use crate::models::Chunk;
use crate::platform::reddit::RedditClient;
use crate::platform::stream::RedditCommentStream;
use crate::platform::Platform;
use crate::server::run_server;
use crate::sink::UpsertSink;
use crate::store::{create_store, CollectionStatus, VectorStore};

/// Create the configured collection if it does not exist.
pub async fn provision(config: &Config) -> Result<CollectionStatus> {
    let store = create_store(&config.store)?;
    ensure_collection(store.as_ref()).await
}

async fn ensure_collection(store: &dyn VectorStore) -> Result<CollectionStatus> {
    store
        .ensure_collection()
        .await
        .with_context(|| format!("failed to provision collection '{}'", store.collection()))
}

/// Embedding provider plus provisioned store.
async fn build_sink(config: &Config) -> Result<UpsertSink> {
    let dims = config.embedding.resolved_dims(&config.store);
    let embedder = create_provider(&config.embedding, dims)
        .context("failed to initialise embedding provider")?;
    info!(
        provider = %config.embedding.provider,
        model = embedder.model_name(),
        dims = embedder.dims(),
        "embedding provider ready"
    );

    let store = create_store(&config.store)?;
    ensure_collection(store.as_ref()).await?;
    Ok(UpsertSink::new(store, embedder))
}

/// Run the service: listener task plus HTTP server. Returns only on a
/// startup failure or when the server stops.
pub async fn run(config: &Config) -> Result<()> {
    let sink = build_sink(config).await?;

    let credentials = RedditCredentials::from_env()?;
    let client = Arc::new(RedditClient::connect(&config.reddit, credentials).await?);
    let platform: Arc<dyn Platform> = client.clone();

    let stats = Arc::new(IngestStats::new());
    let pipeline = Arc::new(Pipeline::new(
        platform,
        sink,
        config.reddit.permalink_base.clone(),
        Arc::clone(&stats),
    ));
    let stream = RedditCommentStream::new(client, &config.reddit);

    info!(subreddit = %config.reddit.subreddit, "starting listener");
    // Detached: the listener lives until the process exits.
    let _listener = spawn_listener(pipeline, Box::new(stream));

    run_server(&config.server, stats).await
}

/// Run the pipeline once for a single comment id.
///
/// With `dry_run`, nothing is embedded or written; the assembled chunk is
/// returned for inspection.
pub async fn ingest_comment(config: &Config, comment_id: &str, dry_run: bool) -> Result<Chunk> {
    let credentials = RedditCredentials::from_env()?;
    let client = RedditClient::connect(&config.reddit, credentials).await?;
    let comment = client
        .comment(comment_id)
        .await
        .with_context(|| format!("failed to fetch comment {}", comment_id))?;
    if is_automoderator(&comment) {
        bail!("comment {} was posted by AutoModerator and is never ingested", comment_id);
    }

    let chunk = assemble_chunk(&client, &comment, &config.reddit.permalink_base).await?;
    if dry_run {
        return Ok(chunk);
    }

    let sink = build_sink(config).await?;
    sink.upsert(chunk.id, &chunk.text, &chunk.metadata).await?;
    info!(point_id = %chunk.id, root_id = %chunk.metadata.root_comment_id, "thread upserted");
    Ok(chunk)
}
