//! Configuration loading.
//!
//! Non-secret settings come from an optional TOML file; every section has
//! defaults so the service can start from environment variables alone.
//! Secrets (platform credentials, store URL and key, OpenAI key) are only
//! ever read from the environment.
//!
//! ```toml
//! [reddit]
//! subreddit = "PESU"
//! skip_existing = true
//!
//! [store]
//! collection = "ask-pesu-v2"
//! dims = 768
//! distance = "Cosine"
//!
//! [embedding]
//! provider = "local"
//! model = "bge-base-en-v1.5"
//!
//! [server]
//! bind = "0.0.0.0:7860"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Default config location used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/threadsync.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedditConfig {
    #[serde(default = "default_subreddit")]
    pub subreddit: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// OAuth API host all authenticated reads go to.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Token endpoint for the client-credentials grant.
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Prefix joined with a submission's relative permalink in metadata.
    #[serde(default = "default_permalink_base")]
    pub permalink_base: String,
    /// Drop whatever the first poll returns and only emit newer comments.
    #[serde(default = "default_true")]
    pub skip_existing: bool,
    #[serde(default = "default_poll_max_wait_secs")]
    pub poll_max_wait_secs: u64,
    /// Per-request timeout; unset leaves the transport default (none).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            subreddit: default_subreddit(),
            user_agent: default_user_agent(),
            api_url: default_api_url(),
            auth_url: default_auth_url(),
            permalink_base: default_permalink_base(),
            skip_existing: true,
            poll_max_wait_secs: default_poll_max_wait_secs(),
            timeout_secs: None,
        }
    }
}

fn default_subreddit() -> String {
    "PESU".to_string()
}
fn default_user_agent() -> String {
    format!("threadsync/{}", env!("CARGO_PKG_VERSION"))
}
fn default_api_url() -> String {
    "https://oauth.reddit.com".to_string()
}
fn default_auth_url() -> String {
    "https://www.reddit.com/api/v1/access_token".to_string()
}
fn default_permalink_base() -> String {
    "https://reddit.com".to_string()
}
fn default_true() -> bool {
    true
}
fn default_poll_max_wait_secs() -> u64 {
    16
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `qdrant` or `memory`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Qdrant base URL; `QDRANT_URL` overrides it.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// `Cosine`, `Dot`, `Euclid` or `Manhattan`.
    #[serde(default = "default_distance")]
    pub distance: String,
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            collection: default_collection(),
            dims: default_dims(),
            distance: default_distance(),
            timeout_secs: default_store_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "qdrant".to_string()
}
fn default_collection() -> String {
    "ask-pesu-v2".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_distance() -> String {
    "Cosine".to_string()
}
fn default_store_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `local`, `openai` or `ollama`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Defaults to `store.dims` when unset.
    #[serde(default)]
    pub dims: Option<usize>,
    /// Ollama base URL.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    16
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:7860".to_string()
}

/// Platform credentials for the application-only OAuth flow.
#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl RedditCredentials {
    /// Load credentials from `REDDIT_CLIENT_ID` and `REDDIT_CLIENT_SECRET`.
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("REDDIT_CLIENT_ID")
            .context("REDDIT_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("REDDIT_CLIENT_SECRET")
            .context("REDDIT_CLIENT_SECRET environment variable not set")?;
        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

impl std::fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl EmbeddingConfig {
    /// Vector size the provider must produce.
    pub fn resolved_dims(&self, store: &StoreConfig) -> usize {
        self.dims.unwrap_or(store.dims)
    }
}

impl StoreConfig {
    /// Qdrant URL from `QDRANT_URL`, falling back to `store.url`.
    pub fn resolved_url(&self) -> Result<String> {
        std::env::var("QDRANT_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| self.url.clone())
            .context("QDRANT_URL environment variable not set and store.url is empty")
    }
}

/// Load configuration from `path`, or defaults when `path` is `None` and
/// [`DEFAULT_CONFIG_PATH`] does not exist.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => parse_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                parse_file(default_path)?
            } else {
                Config::default()
            }
        }
    };
    validate(&config)?;
    Ok(config)
}

fn parse_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

pub fn validate(config: &Config) -> Result<()> {
    if config.reddit.subreddit.trim().is_empty() {
        bail!("reddit.subreddit must not be empty");
    }
    if config.reddit.poll_max_wait_secs == 0 {
        bail!("reddit.poll_max_wait_secs must be > 0");
    }

    match config.store.backend.as_str() {
        "qdrant" | "memory" => {}
        other => bail!(
            "Unknown store backend: '{}'. Must be qdrant or memory.",
            other
        ),
    }
    if config.store.collection.trim().is_empty() {
        bail!("store.collection must not be empty");
    }
    if config.store.dims == 0 {
        bail!("store.dims must be > 0");
    }
    match config.store.distance.as_str() {
        "Cosine" | "Dot" | "Euclid" | "Manhattan" => {}
        other => bail!(
            "Unknown store distance: '{}'. Must be Cosine, Dot, Euclid, or Manhattan.",
            other
        ),
    }

    match config.embedding.provider.as_str() {
        "local" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, or ollama.",
            other
        ),
    }
    if let Some(dims) = config.embedding.dims {
        if dims != config.store.dims {
            bail!(
                "embedding.dims ({}) must match store.dims ({})",
                dims,
                config.store.dims
            );
        }
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    Ok(())
}
