//! Core data types for the Lexicon knowledge base.
//!
//! This module defines the fundamental types shared by every crate:
//!
//! - `Slug`: the URL-safe identifier derived from an entry's title
//! - `Entry`: a stored article with a title, slug and HTML body
//! - `TitleIndex`: a read-only snapshot of `(title, slug)` pairs used by the
//!   cross-linking pass
//!
//! All types derive `Debug`, `Clone`, `Serialize`, and `Deserialize` for
//! inspection, copying, and JSON serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Slug
// ============================================================================

/// URL-safe, lowercase identifier of an entry.
///
/// A slug is derived once from the title when the entry is created and is
/// never recomputed afterwards, so renaming an entry keeps its links valid.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    /// Derives a slug from a title.
    ///
    /// Characters other than ASCII alphanumerics, `_`, `-` and whitespace are
    /// dropped, the rest is lowercased, runs of whitespace and hyphens become
    /// a single `-`, and leading/trailing `-`/`_` are stripped.
    pub fn from_title(title: &str) -> Result<Self, SlugError> {
        let mut slug = String::with_capacity(title.len());
        let mut pending_dash = false;

        for c in title.chars() {
            if c.is_ascii_alphanumeric() || c == '_' {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(c.to_ascii_lowercase());
            } else if c == '-' || c.is_whitespace() {
                pending_dash = true;
            }
        }

        let trimmed = slug.trim_matches(|c| c == '-' || c == '_');
        if trimmed.is_empty() {
            return Err(SlugError::Empty(title.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Validates an existing identifier without transforming it.
    pub fn parse(value: &str) -> Result<Self, SlugError> {
        if value.is_empty() {
            return Err(SlugError::Empty(value.to_string()));
        }
        let valid_chars = value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !valid_chars || value.starts_with('-') || value.ends_with('-') {
            return Err(SlugError::Invalid(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Slug {
    type Err = SlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Error type for slug derivation and parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlugError {
    /// Nothing URL-safe was left after normalization.
    #[error("no identifier can be derived from {0:?}")]
    Empty(String),

    /// The string contains characters a slug may not contain.
    #[error("invalid slug: {0:?}")]
    Invalid(String),
}

// ============================================================================
// Titles
// ============================================================================

/// Normalizes a title for storage.
///
/// Surrounding whitespace is trimmed, inner whitespace collapsed to single
/// spaces, and every alphabetic run starts with an uppercase letter followed
/// by lowercase letters ("3d printing" becomes "3D Printing").
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut out = String::with_capacity(collapsed.len());
    let mut previous_cased = false;
    for c in collapsed.chars() {
        if c.is_alphabetic() {
            if previous_cased {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_cased = true;
        } else {
            out.push(c);
            previous_cased = false;
        }
    }
    out
}

// ============================================================================
// Entries
// ============================================================================

/// A knowledge-base article.
///
/// The body is HTML and grows monotonically as the cross-linking pass wraps
/// title occurrences in anchors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Identifier derived from the title at creation time.
    pub slug: Slug,

    /// Display title.
    pub title: String,

    /// HTML body.
    pub body: String,

    /// When the entry was created.
    pub created: DateTime<Utc>,

    /// When the entry was last modified.
    pub updated: DateTime<Utc>,
}

impl Entry {
    /// Creates an entry from a raw title and an already formatted body.
    ///
    /// The title is normalized and the slug derived from the normalized
    /// title.
    pub fn new(title: &str, body: impl Into<String>) -> Result<Self, SlugError> {
        let title = normalize_title(title);
        let slug = Slug::from_title(&title)?;
        let now = Utc::now();
        Ok(Self {
            slug,
            title,
            body: body.into(),
            created: now,
            updated: now,
        })
    }

    /// Returns the `(title, slug)` summary of this entry.
    #[must_use]
    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            title: self.title.clone(),
            slug: self.slug.clone(),
        }
    }
}

/// Title and slug of an entry, as listed by the entries endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub title: String,
    pub slug: Slug,
}

// ============================================================================
// Title Index
// ============================================================================

/// Snapshot of every `(title, slug)` pair at the start of a linking pass.
///
/// Titles are expected to be unique case-insensitively. The index does not
/// enforce this; [`TitleIndex::duplicates`] reports violations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleIndex {
    titles: Vec<EntrySummary>,
}

impl TitleIndex {
    /// Builds an index from entries.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> Self {
        Self {
            titles: entries.into_iter().map(Entry::summary).collect(),
        }
    }

    /// Adds a title to the index.
    pub fn push(&mut self, title: impl Into<String>, slug: Slug) {
        self.titles.push(EntrySummary {
            title: title.into(),
            slug,
        });
    }

    /// Iterates over the indexed titles in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &EntrySummary> {
        self.titles.iter()
    }

    /// Number of indexed titles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.titles.len()
    }

    /// Returns true if the index holds no titles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Looks up the entry registered under a slug.
    #[must_use]
    pub fn get(&self, slug: &Slug) -> Option<&EntrySummary> {
        self.titles.iter().find(|t| &t.slug == slug)
    }

    /// Returns titles that are shared (case-insensitively) by more than one
    /// slug, together with the slugs sharing them.
    #[must_use]
    pub fn duplicates(&self) -> Vec<(String, Vec<Slug>)> {
        let mut by_title: BTreeMap<String, Vec<Slug>> = BTreeMap::new();
        for summary in &self.titles {
            by_title
                .entry(summary.title.to_lowercase())
                .or_default()
                .push(summary.slug.clone());
        }
        by_title
            .into_iter()
            .filter(|(_, slugs)| slugs.len() > 1)
            .collect()
    }
}

impl FromIterator<EntrySummary> for TitleIndex {
    fn from_iter<I: IntoIterator<Item = EntrySummary>>(iter: I) -> Self {
        Self {
            titles: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn slug(s: &str) -> Slug {
        Slug::parse(s).unwrap()
    }

    #[test]
    fn slug_from_simple_title() {
        assert_eq!(Slug::from_title("Docker").unwrap().as_str(), "docker");
    }

    #[test]
    fn slug_collapses_whitespace_and_hyphens() {
        assert_eq!(
            Slug::from_title("  Docker   Compose -- v2 ").unwrap().as_str(),
            "docker-compose-v2"
        );
    }

    #[test]
    fn slug_drops_punctuation_without_separator() {
        assert_eq!(Slug::from_title("Node.js").unwrap().as_str(), "nodejs");
        assert_eq!(Slug::from_title("C++").unwrap().as_str(), "c");
    }

    #[test]
    fn slug_strips_edge_underscores() {
        assert_eq!(Slug::from_title("_private_ api_").unwrap().as_str(), "private_-api");
    }

    #[test]
    fn slug_drops_non_ascii_letters() {
        assert_eq!(Slug::from_title("Café Crème").unwrap().as_str(), "caf-crme");
    }

    #[test]
    fn slug_empty_is_error() {
        assert!(matches!(Slug::from_title("!!!"), Err(SlugError::Empty(_))));
        assert!(matches!(Slug::from_title("   "), Err(SlugError::Empty(_))));
    }

    #[test]
    fn slug_parse_validates() {
        assert!(Slug::parse("docker-compose").is_ok());
        assert!(Slug::parse("snake_case_1").is_ok());
        assert!(matches!(Slug::parse("Docker"), Err(SlugError::Invalid(_))));
        assert!(matches!(Slug::parse("-docker"), Err(SlugError::Invalid(_))));
        assert!(matches!(Slug::parse("a b"), Err(SlugError::Invalid(_))));
        assert!(matches!(Slug::parse(""), Err(SlugError::Empty(_))));
    }

    #[test]
    fn slug_serde_is_transparent_and_validated() {
        let json = serde_json::to_string(&slug("docker")).unwrap();
        assert_eq!(json, "\"docker\"");

        let parsed: Slug = serde_json::from_str("\"docker\"").unwrap();
        assert_eq!(parsed, slug("docker"));

        let bad: Result<Slug, _> = serde_json::from_str("\"Not A Slug\"");
        assert!(bad.is_err());
    }

    #[test]
    fn normalize_title_title_cases_words() {
        assert_eq!(normalize_title("docker compose"), "Docker Compose");
        assert_eq!(normalize_title("  rest   API "), "Rest Api");
        assert_eq!(normalize_title("3d printing"), "3D Printing");
    }

    #[test]
    fn entry_new_derives_slug_from_normalized_title() {
        let entry = Entry::new("kubernetes  operators", "<p>body</p>").unwrap();
        assert_eq!(entry.title, "Kubernetes Operators");
        assert_eq!(entry.slug.as_str(), "kubernetes-operators");
        assert_eq!(entry.created, entry.updated);
    }

    #[test]
    fn entry_new_rejects_unsluggable_title() {
        assert!(Entry::new("???", "").is_err());
    }

    #[test]
    fn entry_roundtrip() {
        let entry = Entry::new("Docker", "<p>Containers</p>").unwrap();
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(entry, parsed);
    }

    #[test]
    fn title_index_from_entries() {
        let a = Entry::new("Docker", "").unwrap();
        let b = Entry::new("Kubernetes", "").unwrap();
        let index = TitleIndex::from_entries([&a, &b]);

        assert_eq!(index.len(), 2);
        assert!(!index.is_empty());
        assert_eq!(index.get(&slug("kubernetes")).unwrap().title, "Kubernetes");
        assert!(index.get(&slug("missing")).is_none());
    }

    #[test]
    fn title_index_reports_case_insensitive_duplicates() {
        let mut index = TitleIndex::default();
        index.push("Docker", slug("docker"));
        index.push("DOCKER", slug("docker-2"));
        index.push("Kubernetes", slug("kubernetes"));

        let duplicates = index.duplicates();
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].0, "docker");
        assert_eq!(duplicates[0].1, vec![slug("docker"), slug("docker-2")]);
    }
}
