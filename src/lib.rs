//! # threadsync
//!
//! Keeps a vector index of whole subreddit comment threads up to date.
//!
//! Every new comment in the watched subreddit triggers a rebuild of the
//! thread it belongs to: the pipeline walks up to the thread's root comment,
//! fetches the root's entire current reply tree, renders it together with
//! the submission's title and body, embeds the text, and upserts it under an
//! id derived from the root comment. A thread therefore always occupies
//! exactly one point, holding its latest full state.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────────────┐   ┌──────────┐
//! │ Reddit feed  │──▶│ Listener                      │──▶│  Qdrant  │
//! │ (polling)    │   │ root → thread → chunk → embed │   │ (upsert) │
//! └──────────────┘   └──────────────┬───────────────┘   └──────────┘
//!                                   │ counters
//!                                   ▼
//!                            ┌─────────────┐
//!                            │ HTTP        │
//!                            │ /health     │
//!                            │ /status     │
//!                            └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! threadsync init               # create the collection
//! threadsync id abc123          # show the point id for a comment
//! threadsync ingest abc123 --dry-run
//! threadsync serve              # listen and serve on :7860
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment secrets |
//! | [`models`] | Core data types |
//! | [`ids`] | Root id → point id derivation |
//! | [`platform`] | Reddit client and comment stream |
//! | [`thread`] | Root finding and thread rendering |
//! | [`chunk`] | Chunk text and metadata |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector-store abstraction (Qdrant, in-memory) |
//! | [`sink`] | Embed-and-upsert step |
//! | [`listener`] | Per-event pipeline and listener task |
//! | [`server`] | HTTP surface |
//! | [`service`] | Startup sequence |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod ids;
pub mod listener;
pub mod models;
pub mod platform;
pub mod server;
pub mod service;
pub mod sink;
pub mod store;
pub mod thread;
