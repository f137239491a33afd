//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time, providing immediate feedback for invalid values.

use crate::domain::{GroupPath, RelationshipKind, TicketNumber};
use crate::placement;

/// Maximum title length accepted on the command line
pub const MAX_TITLE_LENGTH: usize = 200;

/// Validate a ticket title.
pub fn validate_title(s: &str) -> Result<String, String> {
    let title = s.trim();
    if title.is_empty() {
        return Err("Title cannot be empty".to_string());
    }
    if title.contains('\n') || title.contains('\r') {
        return Err("Title must be a single line".to_string());
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(format!("Title cannot exceed {MAX_TITLE_LENGTH} characters"));
    }
    Ok(title.to_string())
}

/// Parse a ticket number, with or without a leading `#`.
pub fn parse_ticket_number(s: &str) -> Result<TicketNumber, String> {
    let number: TicketNumber = s.parse().map_err(|_| {
        format!("Invalid ticket number: '{s}'. Expected a number such as 12 or #12")
    })?;
    if number.get() == 0 {
        return Err("Ticket numbers start at 1".to_string());
    }
    Ok(number)
}

/// Parse a group path such as `mvp/auth`.
pub fn parse_group(s: &str) -> Result<GroupPath, String> {
    GroupPath::parse(s).map_err(|e| e.to_string())
}

/// Validate an explicit slug.
pub fn validate_slug(s: &str) -> Result<String, String> {
    let slug = s.trim();
    if !placement::is_valid_slug(slug) {
        return Err(format!(
            "Invalid slug: '{slug}'. Use lowercase letters, digits and single dashes"
        ));
    }
    if slug.len() > placement::MAX_SLUG_LENGTH {
        return Err(format!(
            "Slug cannot exceed {} characters",
            placement::MAX_SLUG_LENGTH
        ));
    }
    Ok(slug.to_string())
}

/// Parse a link given as `N` or `KIND:N`, e.g. `blocks:3`.
///
/// A bare number relates to the ticket.
pub fn parse_link(s: &str) -> Result<(RelationshipKind, TicketNumber), String> {
    match s.split_once(':') {
        Some((kind, number)) => {
            let normalized = kind.trim().replace('-', "_");
            let kind = RelationshipKind::known(&normalized).ok_or_else(|| {
                let known: Vec<String> = RelationshipKind::KNOWN
                    .iter()
                    .map(|k| k.as_str().to_ascii_lowercase().replace('_', "-"))
                    .collect();
                format!(
                    "Unknown relationship type '{}'. Expected one of: {}",
                    kind.trim(),
                    known.join(", ")
                )
            })?;
            Ok((kind, parse_ticket_number(number)?))
        }
        None => Ok((RelationshipKind::default(), parse_ticket_number(s)?)),
    }
}

/// Validate the ticket directory given to `init`.
pub fn validate_tickets_dir(s: &str) -> Result<String, String> {
    use crate::config::TrellisConfig;

    let config = TrellisConfig {
        tickets_dir: s.trim().to_string(),
        ..TrellisConfig::default()
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config.tickets_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // ========== Title Tests ==========

    #[rstest]
    #[case::simple("Fix login bug", "Fix login bug")]
    #[case::trimmed("  padded  ", "padded")]
    fn test_validate_title_valid(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate_title(input), Ok(expected.to_string()));
    }

    #[rstest]
    #[case::empty("")]
    #[case::whitespace("   ")]
    #[case::multiline("one\ntwo")]
    fn test_validate_title_invalid(#[case] input: &str) {
        assert!(validate_title(input).is_err());
    }

    #[test]
    fn test_validate_title_too_long() {
        let title = "x".repeat(MAX_TITLE_LENGTH + 1);
        assert!(validate_title(&title).unwrap_err().contains("200"));
    }

    // ========== Number Tests ==========

    #[rstest]
    #[case::plain("12", 12)]
    #[case::hash("#7", 7)]
    #[case::padded(" 3 ", 3)]
    fn test_parse_ticket_number_valid(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(parse_ticket_number(input), Ok(TicketNumber(expected)));
    }

    #[rstest]
    #[case::zero("0")]
    #[case::word("abc")]
    #[case::negative("-1")]
    fn test_parse_ticket_number_invalid(#[case] input: &str) {
        assert!(parse_ticket_number(input).is_err());
    }

    // ========== Link Tests ==========

    #[rstest]
    #[case::bare("4", RelationshipKind::RelatesTo, 4)]
    #[case::kind("blocks:2", RelationshipKind::Blocks, 2)]
    #[case::dashed("blocked-by:#9", RelationshipKind::BlockedBy, 9)]
    #[case::upper("CAUSED_BY:1", RelationshipKind::CausedBy, 1)]
    fn test_parse_link_valid(#[case] input: &str, #[case] kind: RelationshipKind, #[case] number: u64) {
        assert_eq!(parse_link(input), Ok((kind, TicketNumber(number))));
    }

    #[test]
    fn test_parse_link_unknown_kind_lists_known() {
        let err = parse_link("supersedes:2").unwrap_err();
        assert!(err.contains("supersedes"));
        assert!(err.contains("blocked-by"));
    }

    // ========== Path Tests ==========

    #[rstest]
    #[case::valid("fix-login", true)]
    #[case::uppercase("Fix", false)]
    #[case::double_dash("a--b", false)]
    fn test_validate_slug(#[case] input: &str, #[case] valid: bool) {
        assert_eq!(validate_slug(input).is_ok(), valid);
    }

    #[test]
    fn test_parse_group() {
        assert_eq!(parse_group("mvp/auth").unwrap().depth(), 2);
        assert!(parse_group("My Group").is_err());
    }

    #[test]
    fn test_validate_tickets_dir() {
        assert_eq!(validate_tickets_dir(" tickets ").unwrap(), "tickets");
        assert!(validate_tickets_dir("../out").is_err());
    }
}
