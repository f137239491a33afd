//! Non-fatal findings reported while decoding a ticket.
//!
//! Decoding is permissive: anything that can be kept is kept, and anything
//! ambiguous is reported through a [`DecodeWarning`] instead of failing the
//! whole document.

/// A non-fatal problem found while decoding a ticket document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// A relationship link uses a kind outside the known set.
    ///
    /// The relationship is kept as [`RelationshipKind::Other`](crate::RelationshipKind::Other).
    UnknownRelationshipKind {
        /// Label (or display text) of the link
        label: String,
        /// The kind as written
        kind: String,
        /// 1-based line number of the link
        line: usize,
    },

    /// Text inside the reserved relationships section that is not a link definition.
    ///
    /// The line is dropped; only link definitions are meaningful there.
    DiscardedText {
        /// The dropped line
        text: String,
        /// 1-based line number
        line: usize,
    },

    /// The same `(target, kind)` pair was declared more than once.
    ///
    /// Only the first declaration is kept.
    DuplicateRelationship {
        /// Label (or display text) of the repeated link
        label: String,
        /// 1-based line number of the repeat
        line: usize,
    },
}

impl DecodeWarning {
    /// Returns the line number associated with this warning.
    #[must_use]
    pub fn line_number(&self) -> usize {
        match self {
            Self::UnknownRelationshipKind { line, .. }
            | Self::DiscardedText { line, .. }
            | Self::DuplicateRelationship { line, .. } => *line,
        }
    }

    /// Returns a human-readable description of the warning.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::UnknownRelationshipKind { label, kind, line } => {
                format!("line {line}: link [{label}] uses unknown relationship type '{kind}'")
            }
            Self::DiscardedText { text, line } => {
                format!("line {line}: ignored text in relationships section: {text}")
            }
            Self::DuplicateRelationship { label, line } => {
                format!("line {line}: link [{label}] repeats an earlier relationship")
            }
        }
    }

    /// Returns a static string identifying the warning kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownRelationshipKind { .. } => "unknown_relationship_kind",
            Self::DiscardedText { .. } => "discarded_text",
            Self::DuplicateRelationship { .. } => "duplicate_relationship",
        }
    }
}

impl std::fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::error::Error for DecodeWarning {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_mentions_line_and_kind() {
        let warning = DecodeWarning::UnknownRelationshipKind {
            label: "parent".to_string(),
            kind: "SUPERSEDES".to_string(),
            line: 12,
        };
        let desc = warning.description();
        assert!(desc.contains("line 12"));
        assert!(desc.contains("SUPERSEDES"));
        assert_eq!(warning.line_number(), 12);
        assert_eq!(warning.kind(), "unknown_relationship_kind");
    }

    #[test]
    fn test_display_matches_description() {
        let warning = DecodeWarning::DiscardedText {
            text: "stray".to_string(),
            line: 3,
        };
        assert_eq!(warning.to_string(), warning.description());
    }
}
