//! In-memory corpus.
//!
//! Implements [`CorpusRepository`] over a map guarded by an async lock.
//! Used by tests and benchmarks, and anywhere a pass should run without a
//! database. Write calls are counted so callers can check batching.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::Utc;
use lexicon_core::{BodyUpdate, CorpusRepository, Entry, Slug};
use tokio::sync::RwLock;

/// Error types for the in-memory corpus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryCorpusError {
    #[error("entry not found: {0}")]
    NotFound(Slug),

    #[error("writes are disabled")]
    WritesDisabled,
}

/// Corpus held in memory.
#[derive(Debug, Default)]
pub struct MemoryCorpus {
    entries: RwLock<BTreeMap<Slug, Entry>>,
    save_body_calls: AtomicUsize,
    save_bodies_calls: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryCorpus {
    /// Creates an empty corpus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a corpus holding `entries`.
    pub fn with_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let map = entries.into_iter().map(|e| (e.slug.clone(), e)).collect();
        Self {
            entries: RwLock::new(map),
            ..Self::default()
        }
    }

    /// Inserts or replaces an entry, returning the previous one.
    pub async fn insert(&self, entry: Entry) -> Option<Entry> {
        self.entries.write().await.insert(entry.slug.clone(), entry)
    }

    /// Returns a copy of an entry.
    pub async fn get(&self, slug: &Slug) -> Option<Entry> {
        self.entries.read().await.get(slug).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Number of `save_body` calls so far, failed ones included.
    pub fn save_body_calls(&self) -> usize {
        self.save_body_calls.load(Ordering::Relaxed)
    }

    /// Number of `save_bodies` calls so far, failed ones included.
    pub fn save_bodies_calls(&self) -> usize {
        self.save_bodies_calls.load(Ordering::Relaxed)
    }

    /// Makes every subsequent write fail with [`MemoryCorpusError::WritesDisabled`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    fn check_writable(&self) -> Result<(), MemoryCorpusError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            Err(MemoryCorpusError::WritesDisabled)
        } else {
            Ok(())
        }
    }
}

impl CorpusRepository for MemoryCorpus {
    type Error = MemoryCorpusError;

    async fn load_corpus(&self) -> Result<Vec<Entry>, Self::Error> {
        Ok(self.entries.read().await.values().cloned().collect())
    }

    async fn save_body(&self, update: &BodyUpdate) -> Result<bool, Self::Error> {
        self.save_body_calls.fetch_add(1, Ordering::Relaxed);
        self.check_writable()?;

        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&update.slug)
            .ok_or_else(|| MemoryCorpusError::NotFound(update.slug.clone()))?;
        if !update.applies_to(&entry.body) {
            return Ok(false);
        }
        entry.body = update.body.clone();
        entry.updated = Utc::now();
        Ok(true)
    }

    async fn save_bodies(&self, updates: &[BodyUpdate]) -> Result<usize, Self::Error> {
        self.save_bodies_calls.fetch_add(1, Ordering::Relaxed);
        self.check_writable()?;

        let mut entries = self.entries.write().await;
        if let Some(missing) = updates.iter().find(|u| !entries.contains_key(&u.slug)) {
            return Err(MemoryCorpusError::NotFound(missing.slug.clone()));
        }

        let now = Utc::now();
        let mut applied = 0;
        for update in updates {
            let Some(entry) = entries.get_mut(&update.slug) else {
                continue;
            };
            if update.applies_to(&entry.body) {
                entry.body = update.body.clone();
                entry.updated = now;
                applied += 1;
            }
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, body: &str) -> Entry {
        Entry::new(title, body).unwrap()
    }

    fn slug(s: &str) -> Slug {
        Slug::parse(s).unwrap()
    }

    #[tokio::test]
    async fn load_returns_entries_in_slug_order() {
        let corpus = MemoryCorpus::with_entries([entry("Zig", ""), entry("Ada", "")]);
        let titles: Vec<_> = corpus
            .load_corpus()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["Ada", "Zig"]);
        assert_eq!(corpus.len().await, 2);
    }

    #[tokio::test]
    async fn save_body_updates_entry() {
        let corpus = MemoryCorpus::new();
        assert!(corpus.is_empty().await);
        corpus.insert(entry("Ada", "<p>old</p>")).await;

        assert!(
            corpus
                .save_body(&BodyUpdate::new(slug("ada"), "<p>new</p>"))
                .await
                .unwrap()
        );
        let ada = corpus.get(&slug("ada")).await.unwrap();
        assert_eq!(ada.body, "<p>new</p>");
        assert!(ada.updated >= ada.created);
        assert_eq!(corpus.save_body_calls(), 1);
    }

    #[tokio::test]
    async fn save_body_missing_entry() {
        let corpus = MemoryCorpus::new();
        let err = corpus
            .save_body(&BodyUpdate::new(slug("ghost"), "x"))
            .await
            .unwrap_err();
        assert_eq!(err, MemoryCorpusError::NotFound(slug("ghost")));
    }

    #[tokio::test]
    async fn save_bodies_is_all_or_nothing() {
        let corpus = MemoryCorpus::with_entries([entry("Ada", "a"), entry("Zig", "z")]);

        let err = corpus
            .save_bodies(&[
                BodyUpdate::new(slug("ada"), "A"),
                BodyUpdate::new(slug("ghost"), "G"),
            ])
            .await
            .unwrap_err();
        assert_eq!(err, MemoryCorpusError::NotFound(slug("ghost")));
        assert_eq!(corpus.get(&slug("ada")).await.unwrap().body, "a");

        let count = corpus
            .save_bodies(&[
                BodyUpdate::new(slug("ada"), "A"),
                BodyUpdate::new(slug("zig"), "Z"),
            ])
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(corpus.get(&slug("zig")).await.unwrap().body, "Z");
        assert_eq!(corpus.save_bodies_calls(), 2);
    }

    #[tokio::test]
    async fn failing_writes() {
        let corpus = MemoryCorpus::with_entries([entry("Ada", "a")]);
        corpus.set_fail_writes(true);
        assert_eq!(
            corpus
                .save_body(&BodyUpdate::new(slug("ada"), "b"))
                .await
                .unwrap_err(),
            MemoryCorpusError::WritesDisabled
        );

        corpus.set_fail_writes(false);
        corpus
            .save_body(&BodyUpdate::new(slug("ada"), "b"))
            .await
            .unwrap();
        assert_eq!(corpus.get(&slug("ada")).await.unwrap().body, "b");
    }

    #[tokio::test]
    async fn stale_updates_are_skipped() {
        let corpus = MemoryCorpus::with_entries([entry("Ada", "a"), entry("Zig", "z")]);

        let stale = BodyUpdate::new(slug("ada"), "A").expecting("old a");
        assert!(!corpus.save_body(&stale).await.unwrap());
        assert_eq!(corpus.get(&slug("ada")).await.unwrap().body, "a");

        let count = corpus
            .save_bodies(&[stale, BodyUpdate::new(slug("zig"), "Z").expecting("z")])
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(corpus.get(&slug("ada")).await.unwrap().body, "a");
        assert_eq!(corpus.get(&slug("zig")).await.unwrap().body, "Z");
    }
}
