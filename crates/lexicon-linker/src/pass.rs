//! The corpus-wide cross-linking pass.
//!
//! When an entry is created or its body replaced, two things happen:
//!
//! 1. the entry's own body is linked against every other title, and
//! 2. every other body is linked against the entry's title.
//!
//! [`cross_link_corpus`] computes both from an explicit [`CorpusSnapshot`]
//! without touching storage. [`run_pass`] loads the snapshot from a
//! [`CorpusRepository`], runs the computation on the blocking pool and
//! writes the changed bodies back. Every write is conditional on the body
//! the pass read, so an entry replaced while the pass ran keeps its new
//! body; the replacement schedules a pass of its own.

use std::time::Instant;

use lexicon_core::{BodyUpdate, CorpusRepository, Entry, Slug, TitleIndex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::linker::CrossLinker;

/// Error types for pass operations.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// The entry to link is not in the corpus.
    #[error("entry not found: {0}")]
    EntryNotFound(Slug),

    /// Loading or saving failed.
    #[error("repository error: {0}")]
    Repository(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The linking task panicked or was cancelled.
    #[error("linking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl PassError {
    fn repository<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Repository(Box::new(err))
    }
}

/// Read-only view of the corpus taken when a pass begins.
#[derive(Debug, Clone, Default)]
pub struct CorpusSnapshot {
    entries: Vec<Entry>,
    index: TitleIndex,
}

impl CorpusSnapshot {
    /// Builds a snapshot and its title index.
    pub fn new(entries: Vec<Entry>) -> Self {
        let index = TitleIndex::from_entries(&entries);
        Self { entries, index }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn index(&self) -> &TitleIndex {
        &self.index
    }

    /// Looks up an entry by slug.
    pub fn get(&self, slug: &Slug) -> Option<&Entry> {
        self.entries.iter().find(|e| &e.slug == slug)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bodies changed by a pass, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossLinkOutcome {
    /// Entry the pass ran for.
    pub slug: Slug,
    /// New body of that entry, if linking changed it.
    pub new_body: Option<String>,
    /// Other entries whose bodies changed.
    pub updated: Vec<BodyUpdate>,
    /// Entries left alone because their markup could not be parsed.
    pub skipped: Vec<Slug>,
    /// Total anchors inserted.
    pub links_added: usize,
}

impl CrossLinkOutcome {
    /// Returns true if nothing needs to be written.
    pub fn is_unchanged(&self) -> bool {
        self.new_body.is_none() && self.updated.is_empty()
    }
}

/// Computes the links a pass for `entry` would add.
///
/// `entry` is taken as given even if the snapshot holds an older copy of
/// it; snapshot entries with the same slug are never relinked.
pub fn cross_link_corpus(entry: &Entry, snapshot: &CorpusSnapshot) -> CrossLinkOutcome {
    let mut outcome = CrossLinkOutcome {
        slug: entry.slug.clone(),
        new_body: None,
        updated: Vec::new(),
        skipped: Vec::new(),
        links_added: 0,
    };

    let outward = CrossLinker::for_index(snapshot.index(), &entry.slug);
    match outward.link(&entry.body) {
        Ok(linked) if linked.links_added > 0 => {
            debug!(slug = %entry.slug, links = linked.links_added, "linked titles into entry");
            outcome.links_added += linked.links_added;
            outcome.new_body = Some(linked.body);
        }
        Ok(_) => {}
        Err(err) => {
            warn!(slug = %entry.slug, error = %err, "skipping entry with unparseable body");
            outcome.skipped.push(entry.slug.clone());
        }
    }

    let inward = CrossLinker::for_new_title(&entry.title, &entry.slug, snapshot.index());
    if !inward.has_targets() {
        return outcome;
    }

    for other in snapshot.entries().iter().filter(|e| e.slug != entry.slug) {
        match inward.link(&other.body) {
            Ok(linked) if linked.links_added > 0 => {
                debug!(
                    slug = %other.slug,
                    target = %entry.slug,
                    links = linked.links_added,
                    "linked entry title into body"
                );
                outcome.links_added += linked.links_added;
                outcome.updated.push(
                    BodyUpdate::new(other.slug.clone(), linked.body).expecting(other.body.as_str()),
                );
            }
            Ok(_) => {}
            Err(err) => {
                warn!(slug = %other.slug, error = %err, "skipping entry with unparseable body");
                outcome.skipped.push(other.slug.clone());
            }
        }
    }

    outcome
}

/// Summary of a persisted pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// Entry the pass ran for.
    pub slug: Slug,
    /// Whether that entry's own body was rewritten.
    pub new_entry_updated: bool,
    /// Number of other entries rewritten.
    pub entries_updated: usize,
    /// Total anchors inserted.
    pub links_added: usize,
    /// Entries skipped because of malformed markup.
    pub skipped: Vec<Slug>,
    /// Writes dropped because the entry changed after the pass read it.
    #[serde(default)]
    pub stale: usize,
}

impl From<&CrossLinkOutcome> for PassReport {
    fn from(outcome: &CrossLinkOutcome) -> Self {
        Self {
            slug: outcome.slug.clone(),
            new_entry_updated: outcome.new_body.is_some(),
            entries_updated: outcome.updated.len(),
            links_added: outcome.links_added,
            skipped: outcome.skipped.clone(),
            stale: 0,
        }
    }
}

/// Runs a full pass for `slug` against a repository.
///
/// The entry's own body is saved individually, the other changed bodies in
/// a single `save_bodies` call. Writes for entries that changed since the
/// corpus was loaded are dropped and counted in [`PassReport::stale`].
pub async fn run_pass<R>(repo: &R, slug: &Slug) -> Result<PassReport, PassError>
where
    R: CorpusRepository,
{
    let start = Instant::now();

    let entries = repo.load_corpus().await.map_err(PassError::repository)?;
    let snapshot = CorpusSnapshot::new(entries);

    for (title, slugs) in snapshot.index().duplicates() {
        warn!(title = %title, count = slugs.len(), "title shared by several entries");
    }

    let entry = snapshot
        .get(slug)
        .cloned()
        .ok_or_else(|| PassError::EntryNotFound(slug.clone()))?;

    info!(slug = %slug, corpus = snapshot.len(), "starting cross-link pass");

    let read_body = entry.body.clone();
    let outcome =
        tokio::task::spawn_blocking(move || cross_link_corpus(&entry, &snapshot)).await?;
    let mut report = PassReport::from(&outcome);

    if let Some(body) = &outcome.new_body {
        let update = BodyUpdate::new(outcome.slug.clone(), body.as_str()).expecting(read_body);
        report.new_entry_updated = repo
            .save_body(&update)
            .await
            .map_err(PassError::repository)?;
        if !report.new_entry_updated {
            report.stale += 1;
        }
    }
    if !outcome.updated.is_empty() {
        report.entries_updated = repo
            .save_bodies(&outcome.updated)
            .await
            .map_err(PassError::repository)?;
        report.stale += outcome.updated.len() - report.entries_updated;
    }

    if report.stale > 0 {
        warn!(slug = %slug, stale = report.stale, "entries changed during the pass were left as is");
    }
    info!(
        slug = %slug,
        entries_updated = report.entries_updated,
        links_added = report.links_added,
        skipped = report.skipped.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "cross-link pass finished"
    );
    Ok(report)
}
