//! lexicon-server: HTTP API server for the Lexicon knowledge base
//!
//! This crate provides:
//! - REST endpoints to create, edit, read and search entries
//! - The background link worker wiring (one worker per process)
//! - Server-Sent Events (SSE) for user notifications and link reports
//!
//! # Architecture
//!
//! The server is built on Axum with a middleware stack for:
//! - Request tracing and logging
//! - CORS handling
//! - Request ID generation
//! - JSON error responses
//!
//! Handlers format incoming text, store it and enqueue a link job; the
//! corpus-wide cross-linking pass runs later on the link worker.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lexicon_server::{config::ServerConfig, routes, state::AppState};
//!
//! let config = ServerConfig::from_env()?;
//! let store = Arc::new(Store::connect(StoreConfig::from_env()?).await?);
//! let state = AppState::new(store, config, LinkQueue::new());
//! let app = routes::build_router(state);
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod middleware;
pub mod routes;
pub mod state;

// Re-exports for convenience
pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use events::{EventBroadcaster, Notification};
pub use state::AppState;

// Re-export dependent crates
pub use lexicon_core;
pub use lexicon_linker;
pub use lexicon_store;
