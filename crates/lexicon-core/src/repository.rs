//! Corpus repository contract.
//!
//! The cross-linking pass reads the whole corpus once and writes back the
//! bodies it changed. Storage backends implement [`CorpusRepository`] so the
//! pass can run against PostgreSQL in production and an in-memory corpus in
//! tests.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::types::{Entry, Slug};

/// A new body for an existing entry.
///
/// An update carrying an `expected` body is conditional: it applies only
/// while the stored body still equals that value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyUpdate {
    /// Entry to update.
    pub slug: Slug,
    /// Replacement HTML body.
    pub body: String,
    /// Body the replacement was computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

impl BodyUpdate {
    /// Creates an unconditional body update.
    pub fn new(slug: Slug, body: impl Into<String>) -> Self {
        Self {
            slug,
            body: body.into(),
            expected: None,
        }
    }

    /// Makes the update conditional on the stored body being `expected`.
    pub fn expecting(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Returns true if the update may replace `current`.
    pub fn applies_to(&self, current: &str) -> bool {
        self.expected.as_deref().is_none_or(|e| e == current)
    }
}

/// Storage operations used by the cross-linking pass.
///
/// Writes are conditional per [`BodyUpdate::expected`]: an update whose
/// entry changed since it was read is skipped, not applied. A missing entry
/// is an error, and `save_bodies` is a single batch that then writes
/// nothing.
pub trait CorpusRepository: Send + Sync {
    /// Backend error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns every entry in the corpus.
    fn load_corpus(&self) -> impl Future<Output = Result<Vec<Entry>, Self::Error>> + Send;

    /// Replaces the body of a single entry.
    ///
    /// Returns false if the update was skipped as stale.
    fn save_body(
        &self,
        update: &BodyUpdate,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Replaces the bodies of several entries in one batch.
    ///
    /// Returns the number of entries updated, stale updates excluded.
    fn save_bodies(
        &self,
        updates: &[BodyUpdate],
    ) -> impl Future<Output = Result<usize, Self::Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slug(s: &str) -> Slug {
        Slug::parse(s).unwrap()
    }

    #[test]
    fn unconditional_update_always_applies() {
        let update = BodyUpdate::new(slug("ada"), "<p>new</p>");
        assert!(update.applies_to("<p>old</p>"));
        assert!(update.applies_to(""));
    }

    #[test]
    fn conditional_update_applies_to_expected_body_only() {
        let update = BodyUpdate::new(slug("ada"), "<p>new</p>").expecting("<p>old</p>");
        assert!(update.applies_to("<p>old</p>"));
        assert!(!update.applies_to("<p>edited</p>"));
    }

    #[test]
    fn expected_body_is_omitted_when_unset() {
        let json = serde_json::to_value(BodyUpdate::new(slug("ada"), "b")).unwrap();
        assert_eq!(json, serde_json::json!({"slug": "ada", "body": "b"}));

        let back: BodyUpdate =
            serde_json::from_value(serde_json::json!({"slug": "ada", "body": "b"})).unwrap();
        assert_eq!(back.expected, None);
    }
}
