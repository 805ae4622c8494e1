//! Whole-word, case-insensitive title matching.
//!
//! A [`TitleMatcher`] holds one pattern per title. Matching runs against raw
//! text, where `&`, `<` and `>` may appear either literally or as character
//! references, so a title holding them matches both spellings and the
//! matched slice can be copied into markup as is.
//!
//! All candidate matches of all patterns are collected and then reduced to a
//! non-overlapping set: leftmost first, and among matches starting at the
//! same position the longest wins. A longer title therefore always beats a
//! shorter title it contains.

use std::cmp::Reverse;

use lexicon_core::Slug;
use regex::{Regex, RegexBuilder};

use crate::linker::LinkError;
use crate::markup::{CHARACTER_REFERENCE, escape_text};

/// Upper bound on the compiled size of a single title pattern.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone)]
struct TitlePattern {
    title: String,
    target: Option<Slug>,
    regex: Regex,
}

/// One selected match within a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleMatch<'a> {
    /// Byte offset of the match start.
    pub start: usize,
    /// Byte offset one past the match end.
    pub end: usize,
    /// Title that matched, as registered.
    pub title: &'a str,
    /// Entry to link to, or `None` when the title only shadows shorter ones.
    pub target: Option<&'a Slug>,
}

impl TitleMatch<'_> {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

/// Set of title patterns matched together.
#[derive(Debug, Clone, Default)]
pub struct TitleMatcher {
    patterns: Vec<TitlePattern>,
}

impl TitleMatcher {
    /// Creates an empty matcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a title.
    ///
    /// With a target, matches of `title` are linked to that entry. Without
    /// one the title is a shadow: its matches are claimed so no shorter title
    /// links inside them, but they are left as plain text.
    pub fn add(&mut self, title: &str, target: Option<Slug>) -> Result<(), LinkError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LinkError::EmptyTitle);
        }

        // Bodies may spell `&`, `<` and `>` raw or as character references.
        let escaped = escape_text(title);
        let mut pattern = regex::escape(&escaped);
        if escaped != title {
            pattern = format!("{pattern}|{}", regex::escape(title));
        }

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()?;

        self.patterns.push(TitlePattern {
            title: title.to_string(),
            target,
            regex,
        });
        Ok(())
    }

    /// Number of registered titles.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true if no titles are registered.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns true if at least one registered title links somewhere.
    pub fn has_targets(&self) -> bool {
        self.patterns.iter().any(|p| p.target.is_some())
    }

    /// Finds the selected, non-overlapping matches in `text`, in order.
    pub fn find_all(&self, text: &str) -> Vec<TitleMatch<'_>> {
        let entities: Vec<(usize, usize)> = if text.contains('&') {
            CHARACTER_REFERENCE.find_iter(text).map(|m| (m.start(), m.end())).collect()
        } else {
            Vec::new()
        };

        let mut candidates: Vec<(usize, TitleMatch<'_>)> = Vec::new();
        for (order, pattern) in self.patterns.iter().enumerate() {
            let mut at = 0;
            while let Some(m) = pattern.regex.find_at(text, at) {
                if is_whole_word(text, m.start(), m.end())
                    && !splits_entity(&entities, m.start(), m.end())
                {
                    candidates.push((
                        order,
                        TitleMatch {
                            start: m.start(),
                            end: m.end(),
                            title: &pattern.title,
                            target: pattern.target.as_ref(),
                        },
                    ));
                    at = m.end();
                } else {
                    at = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
                }
                if at >= text.len() {
                    break;
                }
            }
        }

        candidates.sort_by_key(|(order, m)| (m.start, Reverse(m.len()), *order));

        let mut selected = Vec::new();
        let mut last_end = 0;
        for (_, candidate) in candidates {
            if candidate.start >= last_end {
                last_end = candidate.end;
                selected.push(candidate);
            }
        }
        selected
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// A match is a whole word when it is neither preceded nor followed by a
/// word character.
fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
}

/// True if either end of the match falls inside a character reference.
fn splits_entity(entities: &[(usize, usize)], start: usize, end: usize) -> bool {
    let inside = |pos: usize| entities.iter().any(|&(s, e)| s < pos && pos < e);
    inside(start) || inside(end)
}
