//! lexicon-store: PostgreSQL storage for the Lexicon knowledge base
//!
//! This crate provides:
//! - A single `entries` table with case-insensitively unique titles
//! - Embedded, idempotent migrations run on connect
//! - The `CorpusRepository` implementation used by the cross-linking pass
//!
//! # Usage
//!
//! ```rust,ignore
//! use lexicon_store::{Store, StoreConfig};
//!
//! let config = StoreConfig::from_env()?;
//! let store = Store::connect(config).await?;
//!
//! let entry = store.insert_entry(&Entry::new("Docker", body)?).await?;
//! let hits = store.list_entries(Some("container")).await?;
//! ```

pub mod error;
pub mod models;
pub mod schema;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use models::EntryRow;
pub use store::{Store, StoreConfig};

// Re-export lexicon-core for downstream crates
pub use lexicon_core;
