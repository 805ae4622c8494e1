//! Cross-linking of entry bodies.
//!
//! A [`CrossLinker`] wraps occurrences of known titles in anchors pointing
//! at their entries. Only text outside existing anchors is touched, matches
//! are whole-word and case-insensitive, and the matched text keeps its
//! original casing.

use lexicon_core::{Slug, TitleIndex};
use tracing::{debug, warn};

use crate::markup::{Fragment, MarkupError, Node};
use crate::matcher::TitleMatcher;

/// Path prefix of entry pages; links point at `{prefix}{slug}`.
pub const ENTRY_PATH_PREFIX: &str = "/entries/";

/// Error types for linking operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LinkError {
    /// The body could not be split into markup nodes.
    #[error("malformed markup: {0}")]
    Markup(#[from] MarkupError),

    /// A title was empty after trimming.
    #[error("title is empty")]
    EmptyTitle,

    /// A title could not be compiled into a pattern.
    #[error("title pattern rejected: {0}")]
    Pattern(#[from] regex::Error),
}

/// Returns the link target of an entry.
pub fn entry_href(slug: &Slug) -> String {
    format!("{ENTRY_PATH_PREFIX}{slug}")
}

/// Result of linking a body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedBody {
    /// Rendered markup. Equal to the input when no links were added.
    pub body: String,
    /// Number of anchors inserted.
    pub links_added: usize,
}

/// Links occurrences of a set of titles.
#[derive(Debug, Clone, Default)]
pub struct CrossLinker {
    matcher: TitleMatcher,
}

impl CrossLinker {
    /// Creates a linker with no titles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a title whose occurrences link to `slug`.
    pub fn add_target(&mut self, title: &str, slug: Slug) -> Result<(), LinkError> {
        self.matcher.add(title, Some(slug))
    }

    /// Adds a title whose occurrences are left unlinked and block shorter
    /// titles from linking inside them.
    pub fn add_shadow(&mut self, title: &str) -> Result<(), LinkError> {
        self.matcher.add(title, None)
    }

    /// Linker for the body of the entry `exclude`: every other title in the
    /// index is a target, and the entry's own title is a shadow.
    pub fn for_index(index: &TitleIndex, exclude: &Slug) -> Self {
        let mut linker = Self::new();

        if let Some(own) = index.get(exclude) {
            linker.add_or_skip(&own.title, None);
        }
        for summary in index.iter().filter(|s| &s.slug != exclude) {
            linker.add_or_skip(&summary.title, Some(summary.slug.clone()));
        }
        linker
    }

    /// Linker that links a single new title into other bodies.
    ///
    /// Every other title in the index that contains `title` and is longer is
    /// added as a shadow, so "Docker" never links inside "Docker Compose".
    pub fn for_new_title(title: &str, slug: &Slug, index: &TitleIndex) -> Self {
        let mut linker = Self::new();
        linker.add_or_skip(title, Some(slug.clone()));

        let needle = title.trim().to_lowercase();
        if needle.is_empty() {
            return linker;
        }
        for summary in index.iter().filter(|s| &s.slug != slug) {
            let other = summary.title.trim().to_lowercase();
            if other.len() > needle.len() && other.contains(&needle) {
                linker.add_or_skip(&summary.title, None);
            }
        }
        linker
    }

    fn add_or_skip(&mut self, title: &str, target: Option<Slug>) {
        if let Err(err) = self.matcher.add(title, target) {
            warn!(title = %title, error = %err, "skipping unusable title");
        }
    }

    /// Number of registered titles, shadows included.
    pub fn len(&self) -> usize {
        self.matcher.len()
    }

    /// Returns true if no titles are registered.
    pub fn is_empty(&self) -> bool {
        self.matcher.is_empty()
    }

    /// Returns true if linking can insert any anchor at all.
    pub fn has_targets(&self) -> bool {
        self.matcher.has_targets()
    }

    /// Links titles into an already parsed fragment.
    ///
    /// Returns the number of anchors inserted.
    pub fn link_fragment(&self, fragment: &mut Fragment) -> usize {
        if !self.has_targets() {
            return 0;
        }

        let mut links_added = 0;
        fragment.rewrite_text(|text| {
            let matches = self.matcher.find_all(text);
            if matches.iter().all(|m| m.target.is_none()) {
                return None;
            }

            let mut nodes = Vec::with_capacity(matches.len() * 4 + 1);
            let mut last = 0;
            for m in matches {
                let Some(slug) = m.target else {
                    continue;
                };
                if m.start > last {
                    nodes.push(Node::text(&text[last..m.start]));
                }
                nodes.push(Node::anchor_start(&entry_href(slug)));
                nodes.push(Node::text(&text[m.start..m.end]));
                nodes.push(Node::anchor_end());
                last = m.end;
                links_added += 1;
                debug!(slug = %slug, "linked title");
            }
            if last < text.len() {
                nodes.push(Node::text(&text[last..]));
            }
            Some(nodes)
        });
        links_added
    }

    /// Parses `body`, links titles and renders the result.
    pub fn link(&self, body: &str) -> Result<LinkedBody, LinkError> {
        let mut fragment = Fragment::parse(body)?;
        let links_added = self.link_fragment(&mut fragment);
        let body = if links_added == 0 {
            body.to_string()
        } else {
            fragment.render()
        };
        Ok(LinkedBody { body, links_added })
    }
}

/// Links every occurrence of `title` in `body` to the entry `slug`.
///
/// ```
/// use lexicon_core::Slug;
/// use lexicon_linker::linkify;
///
/// let slug = Slug::parse("docker").unwrap();
/// let html = linkify("<p>Docker runs containers.</p>", "docker", &slug).unwrap();
/// assert_eq!(html, "<p><a href=\"/entries/docker\">Docker</a> runs containers.</p>");
/// ```
pub fn linkify(body: &str, title: &str, slug: &Slug) -> Result<String, LinkError> {
    let mut linker = CrossLinker::new();
    linker.add_target(title, slug.clone())?;
    Ok(linker.link(body)?.body)
}
