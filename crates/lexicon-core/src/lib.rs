//! lexicon-core: Core types for the Lexicon knowledge base
//!
//! This crate provides:
//! - Core domain types (Entry, Slug, TitleIndex)
//! - Title normalization and slug derivation
//! - The corpus repository contract used by the cross-linking pass

pub mod repository;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use repository::{BodyUpdate, CorpusRepository};
pub use types::{Entry, EntrySummary, Slug, SlugError, TitleIndex, normalize_title};
