//! Error types for trellis-record operations.

use thiserror::Error;

/// The error type for decoding and validating ticket records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The document has no level-1 heading to use as the title.
    #[error("ticket has no title heading")]
    MissingTitle {
        /// The full text that failed to parse
        raw: String,
    },

    /// A relationship link points at something that is not a ticket number.
    #[error("link [{label}] on line {line} points at '{destination}', which is not a ticket number")]
    BadDestination {
        /// Label (or display text) of the offending link
        label: String,
        /// The destination as written
        destination: String,
        /// 1-based line number of the link
        line: usize,
    },

    /// A relationship kind outside the known set, rejected in strict mode.
    #[error("link [{label}] on line {line} uses unknown relationship type '{kind}'")]
    UnknownRelationshipKind {
        /// Label (or display text) of the offending link
        label: String,
        /// The kind as written
        kind: String,
        /// 1-based line number of the link
        line: usize,
    },

    /// A field value that cannot be encoded losslessly.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl Error {
    /// The 1-based line number associated with this error, if any.
    #[must_use]
    pub fn line_number(&self) -> Option<usize> {
        match self {
            Self::BadDestination { line, .. } | Self::UnknownRelationshipKind { line, .. } => {
                Some(*line)
            }
            Self::MissingTitle { .. } | Self::Invalid { .. } => None,
        }
    }
}

/// A specialized Result type for trellis-record operations.
pub type Result<T> = std::result::Result<T, Error>;
