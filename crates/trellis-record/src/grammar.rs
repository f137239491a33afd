//! Line-level grammar for ticket documents.
//!
//! The codec only needs a handful of markdown constructs: level-1 headings,
//! fenced code blocks (so headings and links inside them are ignored),
//! reference-style link definitions, and inline links. Everything else is
//! opaque text.

use crate::error::{Error, Result};
use crate::kinds::RelationshipKind;
use crate::record::TicketNumber;
use regex::Regex;
use std::sync::LazyLock;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[ \t]+(\S.*?)[ \t]*$").expect("heading pattern is valid"));

static DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^ {0,3}\[([^\]]+)\]:[ \t]*(<[^>]*>|\S+)(?:[ \t]+("[^"]*"|'[^']*'|\([^)]*\)))?[ \t]*$"#,
    )
    .expect("definition pattern is valid")
});

static INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\[([^\]]*)\]\([ \t]*(<[^>]*>|[^\s()]+)(?:[ \t]+("[^"]*"|'[^']*'|\([^)]*\)))?[ \t]*\)"#,
    )
    .expect("inline link pattern is valid")
});

/// The name of the reserved section that holds relationship definitions.
pub const RELATIONSHIPS_SECTION: &str = "Relationships";

/// A relationship link found in the document, before its kind is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LinkClaim {
    /// Label of a definition, or display text of an inline link
    pub label: String,
    pub target: TicketNumber,
    /// The kind text without its quotes or parentheses
    pub kind: Option<String>,
    /// 1-based line number
    pub line: usize,
}

/// Classification of one line of a ticket document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineKind {
    /// A level-1 heading outside any code fence, with its trimmed text
    Heading(String),
    /// A reference definition that declares a relationship
    Definition(LinkClaim),
    /// Anything else, kept verbatim
    Text,
}

/// One classified line.
#[derive(Debug, Clone)]
pub(crate) struct ScannedLine<'a> {
    pub number: usize,
    pub text: &'a str,
    pub kind: LineKind,
    /// Relationship links written inline on this line
    pub inline: Vec<LinkClaim>,
}

/// Splits a link title into its inner text and whether it was parenthesized.
fn unwrap_title(raw: &str) -> (&str, bool) {
    let parenthesized = raw.starts_with('(') && raw.ends_with(')');
    let inner = if raw.len() >= 2 { &raw[1..raw.len() - 1] } else { "" };
    (inner.trim(), parenthesized)
}

fn unwrap_destination(raw: &str) -> &str {
    raw.strip_prefix('<')
        .and_then(|d| d.strip_suffix('>'))
        .unwrap_or(raw)
        .trim()
}

fn parse_number(destination: &str) -> Option<TicketNumber> {
    if destination.is_empty() || !destination.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    destination.parse().ok().map(TicketNumber)
}

/// Decides whether a link declares a relationship.
///
/// A numeric destination always does. A non-numeric destination whose title
/// looks like a relationship type (parenthesized, or naming a known kind) is
/// an error. Anything else is an ordinary markdown link.
fn classify_link(
    label: &str,
    destination: &str,
    title: Option<&str>,
    line: usize,
) -> Result<Option<LinkClaim>> {
    let destination = unwrap_destination(destination);
    let title = title.map(unwrap_title);

    if let Some(target) = parse_number(destination) {
        return Ok(Some(LinkClaim {
            label: label.trim().to_string(),
            target,
            kind: title
                .map(|(inner, _)| inner.to_string())
                .filter(|inner| !inner.is_empty()),
            line,
        }));
    }

    let claims_relationship = title.is_some_and(|(inner, parenthesized)| {
        parenthesized || RelationshipKind::known(inner).is_some()
    });
    if claims_relationship {
        return Err(Error::BadDestination {
            label: label.trim().to_string(),
            destination: destination.to_string(),
            line,
        });
    }
    Ok(None)
}

fn heading_text(line: &str) -> Option<String> {
    HEADING
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn fence_marker(line: &str) -> Option<&str> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    if rest.starts_with("```") {
        Some("```")
    } else if rest.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

fn inline_claims(text: &str, line: usize) -> Result<Vec<LinkClaim>> {
    let mut claims = Vec::new();
    for caps in INLINE.captures_iter(text) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        // Images are not links.
        if text[..whole.start].ends_with('!') {
            continue;
        }
        let label = caps.get(1).map_or("", |m| m.as_str());
        let destination = caps.get(2).map_or("", |m| m.as_str());
        let title = caps.get(3).map(|m| m.as_str());
        if let Some(claim) = classify_link(label, destination, title, line)? {
            claims.push(claim);
        }
    }
    Ok(claims)
}

/// Classifies every line of `text`.
///
/// # Errors
///
/// Returns [`Error::BadDestination`] for the first relationship link whose
/// destination is not a ticket number.
pub(crate) fn scan(text: &str) -> Result<Vec<ScannedLine<'_>>> {
    let mut open_fence: Option<&str> = None;
    let mut scanned = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let number = index + 1;

        if let Some(marker) = open_fence {
            if fence_marker(line) == Some(marker) {
                open_fence = None;
            }
            scanned.push(ScannedLine {
                number,
                text: line,
                kind: LineKind::Text,
                inline: Vec::new(),
            });
            continue;
        }

        if let Some(marker) = fence_marker(line) {
            open_fence = Some(marker);
            scanned.push(ScannedLine {
                number,
                text: line,
                kind: LineKind::Text,
                inline: Vec::new(),
            });
            continue;
        }

        if let Some(heading) = heading_text(line) {
            scanned.push(ScannedLine {
                number,
                text: line,
                kind: LineKind::Heading(heading),
                inline: inline_claims(line, number)?,
            });
            continue;
        }

        if let Some(caps) = DEFINITION.captures(line) {
            let label = caps.get(1).map_or("", |m| m.as_str());
            let destination = caps.get(2).map_or("", |m| m.as_str());
            let title = caps.get(3).map(|m| m.as_str());
            if let Some(claim) = classify_link(label, destination, title, number)? {
                scanned.push(ScannedLine {
                    number,
                    text: line,
                    kind: LineKind::Definition(claim),
                    inline: Vec::new(),
                });
                continue;
            }
        }

        scanned.push(ScannedLine {
            number,
            text: line,
            kind: LineKind::Text,
            inline: inline_claims(line, number)?,
        });
    }

    Ok(scanned)
}

/// Returns `true` if the fenced code blocks in `text` are all closed.
pub(crate) fn fences_balanced(text: &str) -> bool {
    let mut open_fence: Option<&str> = None;
    for line in text.lines() {
        match (open_fence, fence_marker(line)) {
            (Some(open), Some(marker)) if open == marker => open_fence = None,
            (None, Some(marker)) => open_fence = Some(marker),
            _ => {}
        }
    }
    open_fence.is_none()
}

/// Removes leading and trailing blank lines and joins the rest with `\n`.
///
/// This is the canonical shape of descriptions and section bodies.
pub fn normalize_block(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines
        .iter()
        .position(|line| !line.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(start, |last| last + 1);
    lines[start..end].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn kinds(text: &str) -> Vec<LineKind> {
        scan(text).unwrap().into_iter().map(|line| line.kind).collect()
    }

    #[test]
    fn test_headings_inside_fences_are_text() {
        let text = "# Title\n```\n# not a heading\n```\n# Section";
        assert_eq!(
            kinds(text),
            vec![
                LineKind::Heading("Title".to_string()),
                LineKind::Text,
                LineKind::Text,
                LineKind::Text,
                LineKind::Heading("Section".to_string()),
            ]
        );
    }

    #[test]
    fn test_deeper_headings_are_text() {
        assert_eq!(kinds("## Notes"), vec![LineKind::Text]);
        assert_eq!(kinds("#hashtag"), vec![LineKind::Text]);
    }

    #[rstest]
    #[case::parenthesized("[parent]: 3 (BLOCKS)", Some("BLOCKS"))]
    #[case::quoted("[parent]: <3> \"blocks\"", Some("blocks"))]
    #[case::untitled("[parent]: 3", None)]
    fn test_numeric_definitions_declare_relationships(
        #[case] line: &str,
        #[case] kind: Option<&str>,
    ) {
        let scanned = scan(line).unwrap();
        match &scanned[0].kind {
            LineKind::Definition(claim) => {
                assert_eq!(claim.label, "parent");
                assert_eq!(claim.target, TicketNumber(3));
                assert_eq!(claim.kind.as_deref(), kind);
            }
            other => panic!("Expected definition, got {other:?}"),
        }
    }

    #[test]
    fn test_ordinary_definition_is_text() {
        assert_eq!(
            kinds("[rust]: https://www.rust-lang.org \"Rust\""),
            vec![LineKind::Text]
        );
    }

    #[test]
    fn test_non_numeric_relationship_destination_is_an_error() {
        let err = scan("# T\n\n[parent]: abc (BLOCKS)").unwrap_err();
        assert_eq!(
            err,
            Error::BadDestination {
                label: "parent".to_string(),
                destination: "abc".to_string(),
                line: 3,
            }
        );
    }

    #[test]
    fn test_inline_links_are_collected() {
        let scanned = scan("See [the login bug](1 \"CAUSED_BY\") and [docs](https://x.y).").unwrap();
        assert_eq!(scanned[0].kind, LineKind::Text);
        assert_eq!(scanned[0].inline.len(), 1);
        let claim = &scanned[0].inline[0];
        assert_eq!(claim.label, "the login bug");
        assert_eq!(claim.target, TicketNumber(1));
        assert_eq!(claim.kind.as_deref(), Some("CAUSED_BY"));
    }

    #[test]
    fn test_images_are_not_links() {
        let scanned = scan("![diagram](2)").unwrap();
        assert!(scanned[0].inline.is_empty());
    }

    #[rstest]
    #[case::already_normal("a\n\nb", "a\n\nb")]
    #[case::surrounding_blanks("\n\n  \na\nb\n\n", "a\nb")]
    #[case::empty("\n \n", "")]
    fn test_normalize_block(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_block(input), expected);
    }

    #[test]
    fn test_fences_balanced() {
        assert!(fences_balanced("```\ncode\n```"));
        assert!(!fences_balanced("```\ncode"));
        assert!(fences_balanced("~~~\n```\n~~~"));
    }
}
