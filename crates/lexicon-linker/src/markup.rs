//! HTML-aware text walker.
//!
//! Entry bodies are HTML fragments. The linker must only touch plain text
//! that is not already part of a hyperlink, so bodies are split into a flat
//! list of nodes (text runs, tags, comments, raw `script`/`style` content)
//! and walked while tracking anchor nesting depth.
//!
//! The tokenizer is lenient: a `<` that cannot start a tag is plain text.
//! It only fails on constructs it cannot delimit, such as a tag, comment or
//! `script` element that never ends. An unmodified fragment renders back to
//! exactly the input it was parsed from.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// A named, decimal or hexadecimal character reference such as `&amp;`.
pub(crate) static CHARACTER_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);")
        .expect("static regex: character reference")
});

/// Elements whose content is raw text rather than markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Elements that never have an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Kind of markup construct, used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construct {
    Tag,
    Comment,
    Declaration,
    RawText,
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tag => "tag",
            Self::Comment => "comment",
            Self::Declaration => "declaration",
            Self::RawText => "raw text element",
        })
    }
}

/// Errors produced while splitting markup into nodes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkupError {
    /// A construct was opened but never closed.
    #[error("unterminated {construct} at byte {offset}")]
    Unterminated { construct: Construct, offset: usize },
}

/// One node of a parsed fragment.
///
/// Every variant keeps its raw source so rendering is lossless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A run of text, still entity-escaped as it appears in the source.
    Text(String),
    /// An opening tag. `name` is lowercased.
    StartTag {
        name: String,
        raw: String,
        self_closing: bool,
    },
    /// A closing tag. `name` is lowercased.
    EndTag { name: String, raw: String },
    /// Comments, doctypes and processing instructions.
    Other(String),
    /// Content of a `script` or `style` element.
    RawText(String),
}

impl Node {
    /// Creates a text node from already escaped text.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Creates an `<a href="...">` start tag. The href is attribute-escaped.
    pub fn anchor_start(href: &str) -> Self {
        Self::StartTag {
            name: "a".to_string(),
            raw: format!("<a href=\"{}\">", escape_attr(href)),
            self_closing: false,
        }
    }

    /// Creates an `</a>` end tag.
    pub fn anchor_end() -> Self {
        Self::EndTag {
            name: "a".to_string(),
            raw: "</a>".to_string(),
        }
    }

    /// Raw source of this node.
    pub fn raw(&self) -> &str {
        match self {
            Self::Text(raw) | Self::Other(raw) | Self::RawText(raw) => raw,
            Self::StartTag { raw, .. } | Self::EndTag { raw, .. } => raw,
        }
    }
}

/// A text node as seen by the linker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextNode<'a> {
    /// Position of the node within the fragment.
    pub index: usize,
    /// Raw (entity-escaped) text.
    pub text: &'a str,
    /// Whether the node is a descendant of an `<a>` element.
    pub in_anchor: bool,
}

/// A parsed HTML fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    nodes: Vec<Node>,
}

impl Fragment {
    /// Splits markup into nodes.
    pub fn parse(input: &str) -> Result<Self, MarkupError> {
        let bytes = input.as_bytes();
        let mut nodes = Vec::new();
        let mut text_start = 0;
        let mut pos = 0;

        while let Some(rel) = input[pos..].find('<') {
            let lt = pos + rel;
            let Some(construct) = classify(bytes, lt) else {
                pos = lt + 1;
                continue;
            };

            let end = match construct {
                Construct::Comment => find_from(input, lt + 4, "-->").map(|i| i + 3),
                Construct::Declaration => find_from(input, lt + 2, ">").map(|i| i + 1),
                Construct::Tag | Construct::RawText => scan_tag_end(bytes, lt),
            }
            .ok_or(MarkupError::Unterminated {
                construct,
                offset: lt,
            })?;

            if text_start < lt {
                nodes.push(Node::Text(input[text_start..lt].to_string()));
            }
            let raw = &input[lt..end];
            pos = end;
            text_start = end;

            if construct != Construct::Tag {
                nodes.push(Node::Other(raw.to_string()));
                continue;
            }

            let node = tag_node(raw);
            let raw_text_element = match &node {
                Node::StartTag {
                    name,
                    self_closing: false,
                    ..
                } if RAW_TEXT_ELEMENTS.contains(&name.as_str()) => Some(name.clone()),
                _ => None,
            };
            nodes.push(node);

            if let Some(name) = raw_text_element {
                let close = find_closing_tag(bytes, end, &name).ok_or(
                    MarkupError::Unterminated {
                        construct: Construct::RawText,
                        offset: lt,
                    },
                )?;
                if close > end {
                    nodes.push(Node::RawText(input[end..close].to_string()));
                }
                pos = close;
                text_start = close;
            }
        }

        if text_start < input.len() {
            nodes.push(Node::Text(input[text_start..].to_string()));
        }

        Ok(Self { nodes })
    }

    /// All nodes in document order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Text nodes with their anchor flag.
    pub fn text_nodes(&self) -> Vec<TextNode<'_>> {
        let mut depth = 0usize;
        let mut out = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            step_anchor_depth(&mut depth, node);
            if let Node::Text(text) = node {
                out.push(TextNode {
                    index,
                    text,
                    in_anchor: depth > 0,
                });
            }
        }
        out
    }

    /// Offers every text node outside an anchor to `rewrite`.
    ///
    /// When `rewrite` returns replacement nodes they are spliced in place of
    /// the text node, so anchors it inserts are treated as anchors by any
    /// later walk over this fragment. Replacements must keep anchors
    /// balanced. Returns the number of text nodes replaced.
    pub fn rewrite_text<F>(&mut self, mut rewrite: F) -> usize
    where
        F: FnMut(&str) -> Option<Vec<Node>>,
    {
        let nodes = std::mem::take(&mut self.nodes);
        let mut out = Vec::with_capacity(nodes.len());
        let mut depth = 0usize;
        let mut replaced = 0;

        for node in nodes {
            step_anchor_depth(&mut depth, &node);
            let replacement = match &node {
                Node::Text(text) if depth == 0 => rewrite(text),
                _ => None,
            };
            match replacement {
                Some(new_nodes) => {
                    replaced += 1;
                    out.extend(new_nodes);
                }
                None => out.push(node),
            }
        }

        self.nodes = out;
        replaced
    }

    /// Renders the fragment back to markup.
    pub fn render(&self) -> String {
        let len = self.nodes.iter().map(|n| n.raw().len()).sum();
        let mut out = String::with_capacity(len);
        for node in &self.nodes {
            out.push_str(node.raw());
        }
        out
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            f.write_str(node.raw())?;
        }
        Ok(())
    }
}

fn step_anchor_depth(depth: &mut usize, node: &Node) {
    match node {
        Node::StartTag {
            name,
            self_closing: false,
            ..
        } if name == "a" => *depth += 1,
        Node::EndTag { name, .. } if name == "a" => *depth = depth.saturating_sub(1),
        _ => {}
    }
}

/// Decides what kind of construct starts at `lt`, if any.
fn classify(bytes: &[u8], lt: usize) -> Option<Construct> {
    match bytes.get(lt + 1)? {
        b'!' if bytes[lt..].starts_with(b"<!--") => Some(Construct::Comment),
        b'!' | b'?' => Some(Construct::Declaration),
        b'/' => match bytes.get(lt + 2) {
            Some(c) if c.is_ascii_alphabetic() => Some(Construct::Tag),
            _ => None,
        },
        c if c.is_ascii_alphabetic() => Some(Construct::Tag),
        _ => None,
    }
}

fn find_from(input: &str, from: usize, needle: &str) -> Option<usize> {
    input.get(from..)?.find(needle).map(|i| from + i)
}

/// Finds the end (exclusive) of the tag starting at `lt`.
///
/// Quotes only delimit attribute values when they directly follow `=`.
fn scan_tag_end(bytes: &[u8], lt: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut after_eq = false;
    let mut i = lt + 1;

    while i < bytes.len() {
        let b = bytes[i];
        i += 1;
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
            continue;
        }
        match b {
            b'>' => return Some(i),
            b'=' => {
                after_eq = true;
                continue;
            }
            b'"' | b'\'' if after_eq => quote = Some(b),
            b' ' | b'\t' | b'\n' | b'\r' if after_eq => continue,
            _ => {}
        }
        after_eq = false;
    }
    None
}

fn tag_node(raw: &str) -> Node {
    let is_end = raw.as_bytes().get(1) == Some(&b'/');
    let name_start = if is_end { 2 } else { 1 };
    let name: String = raw[name_start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == ':')
        .collect::<String>()
        .to_ascii_lowercase();

    if is_end {
        Node::EndTag {
            name,
            raw: raw.to_string(),
        }
    } else {
        let self_closing = raw.ends_with("/>") || VOID_ELEMENTS.contains(&name.as_str());
        Node::StartTag {
            name,
            raw: raw.to_string(),
            self_closing,
        }
    }
}

/// Finds the start of `</name` (case-insensitive) at or after `from`.
fn find_closing_tag(bytes: &[u8], from: usize, name: &str) -> Option<usize> {
    let name = name.as_bytes();
    let mut i = from;
    while i + 2 + name.len() <= bytes.len() {
        if bytes[i] == b'<'
            && bytes[i + 1] == b'/'
            && bytes[i + 2..i + 2 + name.len()].eq_ignore_ascii_case(name)
        {
            match bytes.get(i + 2 + name.len()) {
                Some(b'>' | b'/' | b' ' | b'\t' | b'\n' | b'\r') | None => return Some(i),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Escapes text for use as HTML character data.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    escape(text, false)
}

/// Escapes text for use inside a double- or single-quoted attribute value.
pub fn escape_attr(value: &str) -> Cow<'_, str> {
    escape(value, true)
}

fn escape(input: &str, quotes: bool) -> Cow<'_, str> {
    let needs_escape = |c: char| matches!(c, '&' | '<' | '>') || (quotes && matches!(c, '"' | '\''));
    if !input.chars().any(needs_escape) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + 8);
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if quotes => out.push_str("&quot;"),
            '\'' if quotes => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(fragment: &Fragment) -> Vec<(&str, bool)> {
        fragment
            .text_nodes()
            .into_iter()
            .map(|n| (n.text, n.in_anchor))
            .collect()
    }

    #[test]
    fn render_is_lossless() {
        let inputs = [
            "",
            "plain text",
            "<h3>Intro</h3><p>Uses <strong>Docker</strong> &amp; more.</p>",
            "<p class='x' data-a=\"1 > 0\">quoted &gt; attr</p>",
            "<!DOCTYPE html><!-- note --><br/><img src=x.png>",
            "a < b and c > d",
            "<ul>\n <li>Café</li>\n</ul>",
            "<script>if (a < b) { x = '</p>'; }</script>after",
        ];
        for input in inputs {
            let fragment = Fragment::parse(input).unwrap();
            assert_eq!(fragment.render(), input);
            assert_eq!(fragment.to_string(), input);
        }
    }

    #[test]
    fn text_nodes_flag_anchor_descendants() {
        let fragment =
            Fragment::parse("Docker <a href=\"/x\">Docker <strong>Docker</strong></a> Docker")
                .unwrap();
        assert_eq!(
            texts(&fragment),
            vec![
                ("Docker ", false),
                ("Docker ", true),
                ("Docker", true),
                (" Docker", false),
            ]
        );
    }

    #[test]
    fn uppercase_anchor_tags_are_recognized() {
        let fragment = Fragment::parse("<A HREF=\"/x\">Go</A> Go").unwrap();
        assert_eq!(texts(&fragment), vec![("Go", true), (" Go", false)]);
    }

    #[test]
    fn stray_closing_anchor_does_not_underflow() {
        let fragment = Fragment::parse("</a>Go<a>Rust</a>").unwrap();
        assert_eq!(texts(&fragment), vec![("Go", false), ("Rust", true)]);
    }

    #[test]
    fn bare_less_than_is_text() {
        let fragment = Fragment::parse("1 < 2 <3 </ 4").unwrap();
        assert_eq!(fragment.nodes().len(), 1);
        assert_eq!(texts(&fragment), vec![("1 < 2 <3 </ 4", false)]);
    }

    #[test]
    fn script_and_comment_content_is_not_text() {
        let fragment =
            Fragment::parse("<script>var docker = 1;</script><!-- Docker -->Docker").unwrap();
        assert_eq!(texts(&fragment), vec![("Docker", false)]);
        assert!(matches!(fragment.nodes()[1], Node::RawText(_)));
    }

    #[test]
    fn unterminated_tag_is_an_error() {
        let err = Fragment::parse("text <a href=\"/x").unwrap_err();
        assert_eq!(
            err,
            MarkupError::Unterminated {
                construct: Construct::Tag,
                offset: 5
            }
        );
    }

    #[test]
    fn unterminated_comment_and_script_are_errors() {
        assert!(matches!(
            Fragment::parse("<!-- never closed"),
            Err(MarkupError::Unterminated {
                construct: Construct::Comment,
                ..
            })
        ));
        assert!(matches!(
            Fragment::parse("<style>p { color: red }"),
            Err(MarkupError::Unterminated {
                construct: Construct::RawText,
                ..
            })
        ));
    }

    #[test]
    fn void_and_self_closing_tags_do_not_nest() {
        let fragment = Fragment::parse("<a/>Go<br>Rust").unwrap();
        assert_eq!(texts(&fragment), vec![("Go", false), ("Rust", false)]);
    }

    #[test]
    fn rewrite_text_splices_and_protects_new_anchors() {
        let mut fragment = Fragment::parse("<p>Go and Rust</p>").unwrap();

        let replaced = fragment.rewrite_text(|text| {
            let at = text.find("Go")?;
            Some(vec![
                Node::text(&text[..at]),
                Node::anchor_start("/entries/go"),
                Node::text("Go"),
                Node::anchor_end(),
                Node::text(&text[at + 2..]),
            ])
        });
        assert_eq!(replaced, 1);
        assert_eq!(
            fragment.render(),
            "<p><a href=\"/entries/go\">Go</a> and Rust</p>"
        );

        let mut seen = Vec::new();
        fragment.rewrite_text(|text| {
            seen.push(text.to_string());
            None
        });
        assert_eq!(seen, vec!["", " and Rust"]);
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_text("AT&T <b>"), "AT&amp;T &lt;b&gt;");
        assert_eq!(escape_text("plain"), "plain");
        assert!(matches!(escape_text("plain"), Cow::Borrowed(_)));
        assert_eq!(escape_attr("a\"b'c"), "a&quot;b&#x27;c");
        assert_eq!(escape_text("a\"b"), "a\"b");
    }

    #[test]
    fn anchor_start_escapes_href() {
        let node = Node::anchor_start("/entries/a\"b");
        assert_eq!(node.raw(), "<a href=\"/entries/a&quot;b\">");
    }
}
