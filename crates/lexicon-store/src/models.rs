//! Database models for the storage layer.
//!
//! These types map directly to database rows and are converted into the
//! domain types of lexicon-core at the crate boundary.

use chrono::{DateTime, Utc};
use lexicon_core::{Entry, EntrySummary, Slug};
use sqlx::FromRow;

use crate::error::StoreError;

/// Database row for the `entries` table.
#[derive(Debug, Clone, FromRow)]
pub struct EntryRow {
    pub slug: String,
    pub title: String,
    pub body: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl TryFrom<EntryRow> for Entry {
    type Error = StoreError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(Entry {
            slug: Slug::parse(&row.slug)?,
            title: row.title,
            body: row.body,
            created: row.created,
            updated: row.updated,
        })
    }
}

/// Title and slug columns only.
#[derive(Debug, Clone, FromRow)]
pub struct SummaryRow {
    pub title: String,
    pub slug: String,
}

impl TryFrom<SummaryRow> for EntrySummary {
    type Error = StoreError;

    fn try_from(row: SummaryRow) -> Result<Self, Self::Error> {
        Ok(EntrySummary {
            title: row.title,
            slug: Slug::parse(&row.slug)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_row_converts() {
        let now = Utc::now();
        let row = EntryRow {
            slug: "docker".to_string(),
            title: "Docker".to_string(),
            body: "<p>x</p>".to_string(),
            created: now,
            updated: now,
        };
        let entry = Entry::try_from(row).unwrap();
        assert_eq!(entry.slug.as_str(), "docker");
        assert_eq!(entry.body, "<p>x</p>");
    }

    #[test]
    fn corrupt_slug_is_reported() {
        let row = SummaryRow {
            title: "Docker".to_string(),
            slug: "Not A Slug".to_string(),
        };
        assert!(matches!(
            EntrySummary::try_from(row),
            Err(StoreError::CorruptRow(_))
        ));
    }
}
