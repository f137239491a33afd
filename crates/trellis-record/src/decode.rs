//! Plaintext to [`TicketRecord`].

use crate::error::{Error, Result};
use crate::grammar::{self, LineKind, LinkClaim, RELATIONSHIPS_SECTION, ScannedLine};
use crate::kinds::{RelationshipKind, TicketStatus, WorkType, is_kind_token, is_marker_token};
use crate::record::{Relationship, Relationships, Section, TicketRecord, default_label};
use crate::warning::DecodeWarning;
use tracing::{debug, warn};

/// Options controlling how strictly a document is decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Reject relationship kinds outside the known set instead of keeping them
    pub strict: bool,
}

impl DecodeOptions {
    /// Lenient decoding: unknown kinds are kept and reported as warnings.
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    /// Strict decoding: unknown kinds are errors.
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

/// A decoded record together with everything the decoder had to work around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// The structured record
    pub record: TicketRecord,

    /// Non-fatal findings, in document order
    pub warnings: Vec<DecodeWarning>,
}

/// Decodes a ticket document leniently.
///
/// # Errors
///
/// See [`decode_with`].
pub fn decode(text: &str) -> Result<Decoded> {
    decode_with(text, &DecodeOptions::default())
}

/// Decodes a ticket document.
///
/// # Errors
///
/// - [`Error::MissingTitle`] if the document has no level-1 heading
/// - [`Error::BadDestination`] if a relationship link does not point at a number
/// - [`Error::UnknownRelationshipKind`] for an unknown kind in strict mode
pub fn decode_with(text: &str, options: &DecodeOptions) -> Result<Decoded> {
    let scanned = grammar::scan(text)?;

    let title_index = scanned
        .iter()
        .position(|line| matches!(line.kind, LineKind::Heading(_)))
        .ok_or_else(|| Error::MissingTitle {
            raw: text.to_string(),
        })?;

    let mut warnings = Vec::new();
    let relationships = collect_relationships(&scanned, options, &mut warnings)?;

    let (status, work_type, preamble) = split_header(&scanned[..title_index])?;

    // Split the rest into (heading, lines) blocks at every level-1 heading.
    let mut blocks: Vec<(String, Vec<&ScannedLine<'_>>)> = Vec::new();
    for line in &scanned[title_index..] {
        match &line.kind {
            LineKind::Heading(heading) => blocks.push((heading.clone(), Vec::new())),
            _ => {
                if let Some((_, lines)) = blocks.last_mut() {
                    lines.push(line);
                }
            }
        }
    }

    let mut blocks = blocks.into_iter();
    let (title, description_lines) = blocks.next().ok_or_else(|| Error::MissingTitle {
        raw: text.to_string(),
    })?;

    let description = join_paragraphs(&preamble, &block_text(&description_lines));

    let mut sections = Vec::new();
    for (heading, lines) in blocks {
        if heading.eq_ignore_ascii_case(RELATIONSHIPS_SECTION) {
            for line in lines {
                if matches!(line.kind, LineKind::Text) && !line.text.trim().is_empty() {
                    warnings.push(DecodeWarning::DiscardedText {
                        text: line.text.to_string(),
                        line: line.number,
                    });
                }
            }
            continue;
        }
        sections.push(Section::new(heading, block_text(&lines)));
    }

    debug!(
        title = %title,
        sections = sections.len(),
        relationships = relationships.len(),
        warnings = warnings.len(),
        "Decoded ticket"
    );

    Ok(Decoded {
        record: TicketRecord {
            title,
            status,
            work_type,
            description,
            sections,
            relationships,
        },
        warnings,
    })
}

/// Reads the optional status marker and returns any other header text.
fn split_header(
    header: &[ScannedLine<'_>],
) -> Result<(TicketStatus, Option<WorkType>, String)> {
    let lines: Vec<&str> = header
        .iter()
        .filter(|line| !matches!(line.kind, LineKind::Definition(_)))
        .map(|line| line.text)
        .collect();

    let Some(first) = lines.iter().position(|line| !line.trim().is_empty()) else {
        return Ok((TicketStatus::default(), None, String::new()));
    };
    let single_line_paragraph = lines
        .get(first + 1)
        .is_none_or(|next| next.trim().is_empty());
    let tokens: Vec<&str> = lines[first].split_whitespace().collect();

    let is_marker = single_line_paragraph
        && (1..=2).contains(&tokens.len())
        && tokens.iter().all(|token| is_marker_token(token));
    if !is_marker {
        return Ok((TicketStatus::default(), None, grammar::normalize_block(&lines.join("\n"))));
    }

    let status = tokens[0].parse()?;
    let work_type = tokens.get(1).map(|token| token.parse()).transpose()?;
    let rest = grammar::normalize_block(&lines[first + 1..].join("\n"));
    Ok((status, work_type, rest))
}

/// The text of a block with relationship definitions removed.
fn block_text(lines: &[&ScannedLine<'_>]) -> String {
    let kept: Vec<&str> = lines
        .iter()
        .filter(|line| !matches!(line.kind, LineKind::Definition(_)))
        .map(|line| line.text)
        .collect();
    grammar::normalize_block(&kept.join("\n"))
}

fn join_paragraphs(first: &str, second: &str) -> String {
    match (first.is_empty(), second.is_empty()) {
        (true, _) => second.to_string(),
        (false, true) => first.to_string(),
        (false, false) => format!("{first}\n\n{second}"),
    }
}

/// Gathers relationships: definitions first, then inline links, each in
/// document order.
fn collect_relationships(
    scanned: &[ScannedLine<'_>],
    options: &DecodeOptions,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Relationships> {
    let mut relationships = Relationships::new();

    for line in scanned {
        if let LineKind::Definition(claim) = &line.kind {
            let relationship = resolve_claim(claim, options, warnings)?;
            if !relationships.insert(relationship) {
                warnings.push(DecodeWarning::DuplicateRelationship {
                    label: claim.label.clone(),
                    line: claim.line,
                });
            }
        }
    }

    for claim in scanned.iter().flat_map(|line| &line.inline) {
        let relationship = resolve_claim(claim, options, warnings)?;
        relationships.insert(relationship);
    }

    Ok(relationships)
}

fn resolve_claim(
    claim: &LinkClaim,
    options: &DecodeOptions,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Relationship> {
    let kind = match claim.kind.as_deref() {
        None => RelationshipKind::default(),
        Some(raw) => match RelationshipKind::known(raw) {
            Some(kind) => kind,
            None if options.strict => {
                return Err(Error::UnknownRelationshipKind {
                    label: claim.label.clone(),
                    kind: raw.to_string(),
                    line: claim.line,
                });
            }
            None => {
                warn!(
                    label = %claim.label,
                    kind = raw,
                    line = claim.line,
                    "Unknown relationship type"
                );
                warnings.push(DecodeWarning::UnknownRelationshipKind {
                    label: claim.label.clone(),
                    kind: raw.to_string(),
                    line: claim.line,
                });
                if is_kind_token(raw) {
                    RelationshipKind::Other(raw.to_string())
                } else {
                    RelationshipKind::default()
                }
            }
        },
    };

    let label = if claim.label.is_empty() || claim.label.contains(['[', ']']) {
        default_label(claim.target, &kind)
    } else {
        claim.label.clone()
    };

    Ok(Relationship {
        target: claim.target,
        kind,
        label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TicketNumber;
    use rstest::rstest;

    const FULL: &str = "STARTED BUG

# Fix login bug

The login form rejects valid passwords.

## Steps

1. Open the form

# Notes

Seen on staging.

[parent]: 3 (BLOCKS)
[see-7]: 7 (RELATES_TO)
";

    #[test]
    fn test_decode_full_document() {
        let decoded = decode(FULL).unwrap();
        let record = decoded.record;

        assert_eq!(record.title, "Fix login bug");
        assert_eq!(record.status, TicketStatus::Started);
        assert_eq!(record.work_type, Some(WorkType::Bug));
        assert_eq!(
            record.description,
            "The login form rejects valid passwords.\n\n## Steps\n\n1. Open the form"
        );
        assert_eq!(record.sections, vec![Section::new("Notes", "Seen on staging.")]);
        assert_eq!(record.relationships.len(), 2);
        assert_eq!(
            record.relationships.get(TicketNumber(3), &RelationshipKind::Blocks).map(|r| r.label.as_str()),
            Some("parent")
        );
        assert!(decoded.warnings.is_empty());
    }

    #[test]
    fn test_missing_marker_defaults_to_todo() {
        let record = decode("# Just a title\n").unwrap().record;
        assert_eq!(record.status, TicketStatus::Todo);
        assert_eq!(record.work_type, None);
        assert_eq!(record.description, "");
    }

    #[test]
    fn test_non_marker_header_joins_description() {
        let record = decode("Some preamble here\n\n# Title\n\nBody").unwrap().record;
        assert_eq!(record.status, TicketStatus::Todo);
        assert_eq!(record.description, "Some preamble here\n\nBody");
    }

    #[test]
    fn test_missing_title_carries_raw_text() {
        let err = decode("TODO\n\nno heading here").unwrap_err();
        assert_eq!(
            err,
            Error::MissingTitle {
                raw: "TODO\n\nno heading here".to_string()
            }
        );
    }

    #[test]
    fn test_bad_destination_is_an_error() {
        let err = decode("# Title\n\n[parent]: login-bug (BLOCKS)\n").unwrap_err();
        assert!(matches!(err, Error::BadDestination { ref destination, .. } if destination == "login-bug"));
    }

    #[test]
    fn test_ordinary_links_stay_in_text() {
        let text = "# Title\n\nSee [the docs][rust].\n\n[rust]: https://www.rust-lang.org\n";
        let record = decode(text).unwrap().record;
        assert!(record.relationships.is_empty());
        assert!(record.description.ends_with("[rust]: https://www.rust-lang.org"));
    }

    #[test]
    fn test_inline_links_add_relationships_and_stay_in_text() {
        let text = "# Title\n\nCaused by [the crash](4 \"CAUSED_BY\").\n";
        let record = decode(text).unwrap().record;
        assert_eq!(record.description, "Caused by [the crash](4 \"CAUSED_BY\").");
        let relationship = record
            .relationships
            .get(TicketNumber(4), &RelationshipKind::CausedBy)
            .unwrap();
        assert_eq!(relationship.label, "the crash");
    }

    #[rstest]
    #[case::word("SUPERSEDES", RelationshipKind::Other("SUPERSEDES".to_string()))]
    #[case::sentence("not a kind", RelationshipKind::RelatesTo)]
    fn test_unknown_kind_is_kept_with_warning(#[case] raw: &str, #[case] expected: RelationshipKind) {
        let text = format!("# Title\n\n[old]: 2 ({raw})\n");
        let decoded = decode(&text).unwrap();
        assert!(decoded.record.relationships.contains(TicketNumber(2), &expected));
        assert_eq!(decoded.warnings.len(), 1);
        assert_eq!(decoded.warnings[0].kind(), "unknown_relationship_kind");
    }

    #[test]
    fn test_unknown_kind_fails_in_strict_mode() {
        let err = decode_with("# Title\n\n[old]: 2 (SUPERSEDES)\n", &DecodeOptions::strict())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownRelationshipKind { line: 3, .. }));
    }

    #[test]
    fn test_missing_kind_defaults_to_relates_to() {
        let record = decode("# Title\n\n[other]: 5\n").unwrap().record;
        assert!(record.relationships.contains(TicketNumber(5), &RelationshipKind::RelatesTo));
    }

    #[test]
    fn test_relationships_section_is_not_retained() {
        let text = "# Title\n\n# Relationships\n\nBlocked by these:\n\n[b]: 2 (BLOCKED_BY)\n";
        let decoded = decode(text).unwrap();
        assert!(decoded.record.sections.is_empty());
        assert!(decoded.record.relationships.contains(TicketNumber(2), &RelationshipKind::BlockedBy));
        assert_eq!(
            decoded.warnings,
            vec![DecodeWarning::DiscardedText {
                text: "Blocked by these:".to_string(),
                line: 5,
            }]
        );
    }

    #[test]
    fn test_duplicate_definitions_warn() {
        let text = "# Title\n\n[a]: 2 (BLOCKS)\n[b]: 2 (BLOCKS)\n";
        let decoded = decode(text).unwrap();
        assert_eq!(decoded.record.relationships.len(), 1);
        assert_eq!(decoded.warnings[0].kind(), "duplicate_relationship");
        assert_eq!(decoded.warnings[0].line_number(), 4);
    }

    #[test]
    fn test_fenced_heading_is_description() {
        let text = "# Title\n\n```sh\n# install\ncargo build\n```\n";
        let record = decode(text).unwrap().record;
        assert!(record.sections.is_empty());
        assert_eq!(record.description, "```sh\n# install\ncargo build\n```");
    }

    #[test]
    fn test_crlf_input() {
        let record = decode("TODO\r\n\r\n# Title\r\n\r\nBody\r\n").unwrap().record;
        assert_eq!(record.title, "Title");
        assert_eq!(record.description, "Body");
    }
}
