//! Formatting of loosely structured text into HTML.
//!
//! Generated articles arrive as something close to Markdown: `##` headers,
//! `**bold**`, `[label](url)` links and dash lists, often with a chatty
//! preamble before the first header. [`format`] turns that into compact HTML
//! built from `<h3>`, `<p>`, `<strong>`, `<a>` and `<br>` only.
//!
//! Formatting is pure, infallible and idempotent. Tokens that do not match
//! (an unmatched `**`, a `[label](` with no closing parenthesis) are left as
//! they are. Any other markup in the input is escaped into text, and links
//! keep only `http`, `https`, `mailto` or relative targets.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::markup::CHARACTER_REFERENCE;

/// Block-level tag names, as a regex alternation.
const BLOCK_TAGS: &str = "p|ul|ol|li|div|table|pre|blockquote|h[1-6]";

/// Tags that survive formatting.
const ALLOWED_TAGS: [&str; 5] = ["a", "br", "h3", "p", "strong"];

/// URL schemes a link may use.
const ALLOWED_SCHEMES: [&str; 3] = ["http:", "https:", "mailto:"];

/// Upper bound on formatting rounds before the output is taken as final.
const MAX_ROUNDS: usize = 4;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(/?)([A-Za-z][A-Za-z0-9]*)((?:[^<>"']|"[^"]*"|'[^']*')*)>"#)
        .expect("static regex: tag")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("static regex: attribute")
});

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[([^\]\n]*)\]\(([^)\s"'<>]*)\)"#).expect("static regex: markdown link")
});

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:- )?\*\*(.+?)\*\*").expect("static regex: bold"));

/// Line boundaries bold may not cross, before and after newlines become tags.
static LINE_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\n|<br\s*/?>|</?(?:{BLOCK_TAGS})\b[^>]*>"))
        .expect("static regex: line boundary")
});

static LINE_ENDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r\n?").expect("static regex: line ending"));

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n)+").expect("static regex: blank lines"));

static HEADER_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*#{2,6}|<h3").expect("static regex: header marker")
});

static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*#{2,6}[ \t]*(?:\d+[.)])?[ \t]*(.*?)[ \t]*(?:\n|$)")
        .expect("static regex: header line")
});

static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)</?(?:{BLOCK_TAGS})\b")).expect("static regex: block tag")
});

static BLOCK_TAG_PADDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\s*(</?(?:{BLOCK_TAGS})\b[^>]*>)\s*"))
        .expect("static regex: block tag padding")
});

static NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n+(?:- )?").expect("static regex: newlines"));

static DASH_BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*-\s*<").expect("static regex: dash between tags"));

static LEADING_DASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(<(?:p|br\s*/?|li)>)[ \t]*(?:-[ \t]+)+").expect("static regex: leading dash")
});

static REPEATED_BREAKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:<br\s*/?>\s*){2,}").expect("static regex: repeated breaks")
});

static EMPTY_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<p>\s*(?:<br\s*/?>)?\s*</p>").expect("static regex: empty paragraph")
});

/// Formats raw text into HTML.
///
/// ```
/// use lexicon_linker::formatter::format;
///
/// assert_eq!(
///     format("## 1. Overview\nThis is **bold** text.\n"),
///     "<h3>Overview</h3><p>This is <strong>bold</strong> text.</p>"
/// );
/// ```
pub fn format(text: &str) -> String {
    // Cleanup steps can expose new work for earlier ones; stop once stable.
    let mut current = format_round(text);
    for _ in 1..MAX_ROUNDS {
        let next = format_round(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn format_round(text: &str) -> String {
    let text = sanitize(text);
    let text = MARKDOWN_LINK.replace_all(&text, markdown_link);
    let text = bold(&text);

    let text = LINE_ENDING.replace_all(&text, "\n");
    let text = BLANK_LINES.replace_all(&text, "\n");
    let text = EMPTY_PARAGRAPH.replace_all(&text, "");

    let text = drop_preamble(text.trim());
    let text = HEADER_LINE.replace_all(text, "<h3>${1}</h3>");
    let text = wrap_paragraphs(&text);

    let text = BLOCK_TAG_PADDING.replace_all(&text, "${1}");
    let text = NEWLINES.replace_all(&text, "<br>");

    let text = DASH_BETWEEN_TAGS.replace_all(&text, "><");
    let text = LEADING_DASH.replace_all(&text, "${1}");

    let text = REPEATED_BREAKS.replace_all(&text, "<br>");
    EMPTY_PARAGRAPH.replace_all(&text, "").into_owned()
}

// ============================================================================
// Sanitizing
// ============================================================================

/// Keeps allowed tags in canonical form and escapes everything else.
fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in TAG.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&escape_loose(&text[last..whole.start()]));
        match canonical_tag(&caps) {
            Some(tag) => out.push_str(&tag),
            None => out.push_str(&escape_loose(whole.as_str())),
        }
        last = whole.end();
    }
    out.push_str(&escape_loose(&text[last..]));
    out
}

/// Rebuilds an allowed tag without attributes other than a safe link target.
fn canonical_tag(caps: &Captures<'_>) -> Option<String> {
    let closing = !caps[1].is_empty();
    let name = caps[2].to_ascii_lowercase();
    if !ALLOWED_TAGS.contains(&name.as_str()) {
        return None;
    }

    if closing {
        return (name != "br").then(|| format!("</{name}>"));
    }
    if name != "a" {
        return Some(format!("<{name}>"));
    }

    let mut href = None;
    let mut new_tab = false;
    for attr in ATTRIBUTE.captures_iter(&caps[3]) {
        let value = attr
            .get(2)
            .or_else(|| attr.get(3))
            .or_else(|| attr.get(4))
            .map_or("", |m| m.as_str());
        match attr[1].to_ascii_lowercase().as_str() {
            "href" => href = Some(value.to_string()),
            "target" => new_tab = true,
            _ => {}
        }
    }

    let mut tag = String::from("<a");
    if let Some(href) = href.filter(|h| is_safe_href(h)) {
        tag.push_str(" href=\"");
        tag.push_str(&escape_loose(&href).replace('"', "&quot;"));
        tag.push('"');
    }
    if new_tab {
        tag.push_str(" target=\"_blank\" rel=\"noopener\"");
    }
    tag.push('>');
    Some(tag)
}

/// Escapes `<`, `>` and any `&` that does not start a character reference.
fn escape_loose(text: &str) -> Cow<'_, str> {
    if !text.contains(['<', '>', '&']) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for (i, c) in text.char_indices() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' if !starts_reference(text, i) => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn starts_reference(text: &str, at: usize) -> bool {
    CHARACTER_REFERENCE
        .find_at(text, at)
        .is_some_and(|m| m.start() == at)
}

/// A link target is safe when it is relative or uses an allowed scheme.
///
/// Anything that could spell a scheme before the first `/`, `?` or `#`
/// (a colon, or a character reference hiding one) is rejected.
fn is_safe_href(href: &str) -> bool {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();
    if ALLOWED_SCHEMES.iter().any(|s| lower.starts_with(s)) {
        return true;
    }
    let head = href.split(['/', '?', '#']).next().unwrap_or("");
    !head.contains([':', '&']) && !head.chars().any(char::is_control)
}

// ============================================================================
// Markdown
// ============================================================================

fn markdown_link(caps: &Captures<'_>) -> String {
    let (label, url) = (&caps[1], &caps[2]);
    if is_safe_href(url) {
        format!(r#"<a href="{url}" target="_blank" rel="noopener">{label}</a>"#)
    } else {
        label.to_string()
    }
}

/// Applies bold markers within single lines.
///
/// Lines end at a newline, a `<br>` or a block tag, so a marker pair split
/// across lines stays literal whether or not the break is already markup.
fn bold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for boundary in LINE_BOUNDARY.find_iter(text) {
        out.push_str(&BOLD.replace_all(&text[last..boundary.start()], "<strong>${1}</strong>"));
        out.push_str(boundary.as_str());
        last = boundary.end();
    }
    out.push_str(&BOLD.replace_all(&text[last..], "<strong>${1}</strong>"));
    out
}

// ============================================================================
// Structure
// ============================================================================

/// Drops everything before the first header marker, if there is one.
fn drop_preamble(text: &str) -> &str {
    match HEADER_MARKER.find(text) {
        Some(m) => &text[m.start()..],
        None => text,
    }
}

/// Wraps the text run after each `</h3>` in a paragraph.
///
/// Runs that are empty after trimming are dropped; runs that already contain
/// block-level markup are kept unwrapped.
fn wrap_paragraphs(text: &str) -> String {
    const CLOSE: &str = "</h3>";

    let mut out = String::with_capacity(text.len() + 16);
    let mut rest = text;

    while let Some(close) = rest.find(CLOSE) {
        let after = close + CLOSE.len();
        out.push_str(&rest[..after]);
        rest = &rest[after..];

        let run_end = rest.find("<h3").unwrap_or(rest.len());
        let run = rest[..run_end].trim();
        if !run.is_empty() {
            if BLOCK_TAG.is_match(run) {
                out.push_str(run);
            } else {
                out.push_str("<p>");
                out.push_str(run);
                out.push_str("</p>");
            }
        }
        rest = &rest[run_end..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_bold() {
        assert_eq!(
            format("## 1. Overview\nThis is **bold** text.\n"),
            "<h3>Overview</h3><p>This is <strong>bold</strong> text.</p>"
        );
    }

    #[test]
    fn header_variants() {
        assert_eq!(format("### 2) Usage"), "<h3>Usage</h3>");
        assert_eq!(format("##History  "), "<h3>History</h3>");
        assert_eq!(format("## 2024 Roadmap"), "<h3>2024 Roadmap</h3>");
    }

    #[test]
    fn single_hash_is_not_a_header() {
        assert_eq!(format("# Title\nbody"), "# Title<br>body");
    }

    #[test]
    fn preamble_before_first_header_is_dropped() {
        let text = "Sure! Here is your article.\n\n## Intro\nDocker runs containers.";
        assert_eq!(
            format(text),
            "<h3>Intro</h3><p>Docker runs containers.</p>"
        );
    }

    #[test]
    fn text_without_headers_keeps_everything() {
        assert_eq!(format("  first line\nsecond line  "), "first line<br>second line");
    }

    #[test]
    fn markdown_links_become_anchors() {
        assert_eq!(
            format("See [the docs](https://example.com/docs) now"),
            "See <a href=\"https://example.com/docs\" target=\"_blank\" rel=\"noopener\">the docs</a> now"
        );
    }

    #[test]
    fn malformed_tokens_pass_through() {
        assert_eq!(format("a **b c"), "a **b c");
        assert_eq!(format("[label](no close"), "[label](no close");
    }

    #[test]
    fn bold_does_not_span_lines() {
        assert_eq!(format("**a\nb**"), "**a<br>b**");
    }

    #[test]
    fn list_dashes_become_breaks() {
        let text = "## Features\nIt has:\n- speed\n- safety\n\n- **Bold item**: yes";
        assert_eq!(
            format(text),
            "<h3>Features</h3><p>It has:<br>speed<br>safety<br><strong>Bold item</strong>: yes</p>"
        );
    }

    #[test]
    fn leading_list_dash_in_paragraph_is_dropped() {
        assert_eq!(
            format("## Items\n- one\n- two"),
            "<h3>Items</h3><p>one<br>two</p>"
        );
    }

    #[test]
    fn crlf_and_blank_lines_are_normalized() {
        assert_eq!(
            format("## A\r\none\r\n\r\n  \r\ntwo"),
            "<h3>A</h3><p>one<br>two</p>"
        );
    }

    #[test]
    fn paragraph_markup_is_not_wrapped() {
        assert_eq!(
            format("## A\n<p>one</p>\n<p>two</p>"),
            "<h3>A</h3><p>one</p><p>two</p>"
        );
    }

    #[test]
    fn unsupported_markup_is_escaped() {
        assert_eq!(
            format("## A\n<script>alert(1)</script>"),
            "<h3>A</h3><p>&lt;script&gt;alert(1)&lt;/script&gt;</p>"
        );
        assert_eq!(
            format("<img src=x onerror=alert(1)>"),
            "&lt;img src=x onerror=alert(1)&gt;"
        );
        assert_eq!(format("<P CLASS=\"x\">hi</P>"), "<p>hi</p>");
    }

    #[test]
    fn bare_ampersands_are_escaped_once() {
        assert_eq!(format("AT&T &amp; 1 < 2"), "AT&amp;T &amp; 1 &lt; 2");
    }

    #[test]
    fn unsafe_link_targets_are_dropped() {
        assert_eq!(format("[x](javascript:void)"), "x");
        assert_eq!(
            format("<a href=\"javascript:alert(1)\" onclick=\"y()\">x</a>"),
            "<a>x</a>"
        );
        assert_eq!(
            format("[x](a\"onmouseover=alert(1))"),
            "[x](a\"onmouseover=alert(1))"
        );
        assert_eq!(format("[x](&#106;avascript:void)"), "x");
    }

    #[test]
    fn anchor_attributes_are_normalized() {
        assert_eq!(
            format("<a HREF='https://a.b/?x=1&y=2' target=_blank style=\"c\">k</a>"),
            "<a href=\"https://a.b/?x=1&amp;y=2\" target=\"_blank\" rel=\"noopener\">k</a>"
        );
        assert_eq!(
            format("<a href=\"/entries/docker\">Docker</a>"),
            "<a href=\"/entries/docker\">Docker</a>"
        );
    }

    #[test]
    fn bold_ignores_markers_split_by_breaks() {
        assert_eq!(
            format("## A\nfoo **bar\nbaz** qux"),
            "<h3>A</h3><p>foo **bar<br>baz** qux</p>"
        );
        assert_eq!(format("**a<br>b**"), "**a<br>b**");
    }

    #[test]
    fn stacked_list_dashes_are_dropped() {
        assert_eq!(format("## A\n- - b"), "<h3>A</h3><p>b</p>");
    }

    #[test]
    fn inline_empty_paragraph_is_removed_before_wrapping() {
        assert_eq!(format("## A\nx <p></p> y"), "<h3>A</h3><p>x  y</p>");
    }

    #[test]
    fn empty_sections_produce_no_paragraphs() {
        assert_eq!(format("## A\n## B\ntext"), "<h3>A</h3><h3>B</h3><p>text</p>");
    }

    #[test]
    fn empty_paragraphs_are_removed() {
        assert_eq!(format("<p> </p>x<p><br></p>"), "x");
    }

    #[test]
    fn repeated_breaks_collapse() {
        assert_eq!(format("a<br><br/> <br>b"), "a<br>b");
    }

    #[test]
    fn dash_between_tags_is_removed() {
        assert_eq!(
            format("<strong>A</strong> - <strong>B</strong>"),
            "<strong>A</strong><strong>B</strong>"
        );
    }

    #[test]
    fn negative_numbers_keep_their_sign() {
        assert_eq!(format("## Temp\n-5 degrees"), "<h3>Temp</h3><p>-5 degrees</p>");
    }

    #[test]
    fn empty_input() {
        assert_eq!(format(""), "");
        assert_eq!(format(" \n\n "), "");
    }

    #[test]
    fn format_is_idempotent() {
        let samples = [
            "## 1. Overview\nThis is **bold** text.\n",
            "Intro text\n## Setup\n- install\n- run **it**\n\n## Links\nSee [docs](https://x.y).",
            "plain\nlines\n\n\nhere",
            "## A\n<ul>\n<li>x</li>\n</ul>\n## B\n- **k**: v\n- w",
            "## A\nfoo **bar\nbaz** qux",
            "## A\nx <p></p> y",
            "## A\n- - b",
            "<a href=javascript:x>k</a> & <b>b</b>",
            "a **b c [d](e",
            "<h3>Done</h3><p>Already <strong>formatted</strong>.</p>",
        ];
        for sample in samples {
            let once = format(sample);
            assert_eq!(format(&once), once, "not idempotent for {sample:?}");
        }
    }
}
