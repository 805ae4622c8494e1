//! Error types for the storage layer.

use lexicon_core::{Slug, SlugError};
use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Connection(#[from] sqlx::Error),

    /// Entry not found.
    #[error("entry not found: {0}")]
    EntryNotFound(Slug),

    /// An entry with this slug or title already exists.
    #[error("duplicate entry: {0}")]
    DuplicateEntry(Slug),

    /// A stored row holds a slug that does not parse.
    #[error("corrupt row: {0}")]
    CorruptRow(#[from] SlugError),

    /// Migration error.
    #[error("migration error: {0}")]
    MigrationError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl StoreError {
    /// Maps a unique-constraint violation to `DuplicateEntry`.
    pub(crate) fn from_insert(err: sqlx::Error, slug: &Slug) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::DuplicateEntry(slug.clone())
            }
            _ => Self::Connection(err),
        }
    }
}
