//! Open enumerations stored in ticket records.
//!
//! Statuses, work types and relationship kinds each have a small known set
//! plus an `Other` variant that carries unrecognized text, so values written
//! by newer tools (or by hand) survive a decode/encode cycle.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Returns `true` for an upper-case marker token such as `TODO` or `IN_REVIEW`.
pub(crate) fn is_marker_token(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Returns `true` for a kind token such as `BLOCKS` or `supersedes`.
pub(crate) fn is_kind_token(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Status of a ticket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TicketStatus {
    /// Not started yet
    #[default]
    Todo,
    /// Being worked on
    Started,
    /// Work has been paused
    Stopped,
    /// Finished
    Done,
    /// A status this version does not know, kept verbatim (upper case)
    Other(String),
}

impl TicketStatus {
    /// The statuses with dedicated variants.
    pub const KNOWN: [TicketStatus; 4] = [Self::Todo, Self::Started, Self::Stopped, Self::Done];

    /// The marker text written to ticket files.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Todo => "TODO",
            Self::Started => "STARTED",
            Self::Stopped => "STOPPED",
            Self::Done => "DONE",
            Self::Other(raw) => raw,
        }
    }

    /// Whether this value would be read back unchanged from a marker line.
    pub fn is_canonical(&self) -> bool {
        match self {
            Self::Other(raw) => matches!(raw.parse::<Self>(), Ok(Self::Other(ref back)) if back == raw),
            _ => true,
        }
    }
}

impl FromStr for TicketStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "TODO" => Ok(Self::Todo),
            "STARTED" | "DOING" | "IN_PROGRESS" => Ok(Self::Started),
            "STOPPED" | "PAUSED" => Ok(Self::Stopped),
            "DONE" => Ok(Self::Done),
            other if is_marker_token(other) => Ok(Self::Other(upper)),
            _ => Err(Error::Invalid {
                field: "status",
                reason: format!("'{s}' is not a single word"),
            }),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TicketStatus> for String {
    fn from(status: TicketStatus) -> Self {
        status.as_str().to_string()
    }
}

impl TryFrom<String> for TicketStatus {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Kind of work a ticket describes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum WorkType {
    /// New functionality
    Feature,
    /// Non-feature work
    Task,
    /// A defect fix
    Bug,
    /// A work type this version does not know, kept verbatim (upper case)
    Other(String),
}

impl WorkType {
    /// The work types with dedicated variants.
    pub const KNOWN: [WorkType; 3] = [Self::Feature, Self::Task, Self::Bug];

    /// The marker text written to ticket files.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Feature => "FEATURE",
            Self::Task => "TASK",
            Self::Bug => "BUG",
            Self::Other(raw) => raw,
        }
    }

    /// Whether this value would be read back unchanged from a marker line.
    pub fn is_canonical(&self) -> bool {
        match self {
            Self::Other(raw) => matches!(raw.parse::<Self>(), Ok(Self::Other(ref back)) if back == raw),
            _ => true,
        }
    }
}

impl FromStr for WorkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "FEATURE" => Ok(Self::Feature),
            "TASK" => Ok(Self::Task),
            "BUG" => Ok(Self::Bug),
            other if is_marker_token(other) => Ok(Self::Other(upper)),
            _ => Err(Error::Invalid {
                field: "type",
                reason: format!("'{s}' is not a single word"),
            }),
        }
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<WorkType> for String {
    fn from(work_type: WorkType) -> Self {
        work_type.as_str().to_string()
    }
}

impl TryFrom<String> for WorkType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// How an ordering relationship constrains its two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    /// The source must come before the target (`2 BLOCKS 1`)
    SourceFirst,
    /// The target must come before the source (`1 BLOCKED_BY 2`)
    TargetFirst,
}

/// Type of a relationship between two tickets.
///
/// Relationships are directional: the ticket holding the relationship
/// "verbs" the target (`A BLOCKS B`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RelationshipKind {
    /// One ticket mentions another
    References,
    /// Informational link
    #[default]
    RelatesTo,
    /// The source prevents work on the target
    Blocks,
    /// The source cannot proceed until the target is done
    BlockedBy,
    /// The source results in the target being needed
    Causes,
    /// The source was made necessary by the target
    CausedBy,
    /// The source makes the target unnecessary
    Fixes,
    /// The source is made unnecessary by the target
    FixedBy,
    /// A kind this version does not know, kept as written
    Other(String),
}

impl RelationshipKind {
    /// The kinds with dedicated variants.
    pub const KNOWN: [RelationshipKind; 8] = [
        Self::References,
        Self::RelatesTo,
        Self::Blocks,
        Self::BlockedBy,
        Self::Causes,
        Self::CausedBy,
        Self::Fixes,
        Self::FixedBy,
    ];

    /// The text written inside the parentheses of a link definition.
    pub fn as_str(&self) -> &str {
        match self {
            Self::References => "REFERENCES",
            Self::RelatesTo => "RELATES_TO",
            Self::Blocks => "BLOCKS",
            Self::BlockedBy => "BLOCKED_BY",
            Self::Causes => "CAUSES",
            Self::CausedBy => "CAUSED_BY",
            Self::Fixes => "FIXES",
            Self::FixedBy => "FIXED_BY",
            Self::Other(raw) => raw,
        }
    }

    /// Parses a known kind name, ignoring case. Returns `None` for anything else.
    pub fn known(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REFERENCES" => Some(Self::References),
            "RELATES_TO" | "RELATES" => Some(Self::RelatesTo),
            "BLOCKS" => Some(Self::Blocks),
            "BLOCKED_BY" => Some(Self::BlockedBy),
            "CAUSES" => Some(Self::Causes),
            "CAUSED_BY" => Some(Self::CausedBy),
            "FIXES" => Some(Self::Fixes),
            "FIXED_BY" => Some(Self::FixedBy),
            _ => None,
        }
    }

    /// Parses a kind the way a lenient decoder reads it: known names, then any
    /// single word verbatim, falling back to the default kind.
    pub fn lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    /// The kind recorded on the target when a link is made in both directions.
    pub fn complement(&self) -> Self {
        match self {
            Self::Blocks => Self::BlockedBy,
            Self::BlockedBy => Self::Blocks,
            Self::Causes => Self::CausedBy,
            Self::CausedBy => Self::Causes,
            Self::Fixes => Self::FixedBy,
            Self::FixedBy => Self::Fixes,
            other => other.clone(),
        }
    }

    /// The ordering this kind imposes, or `None` for informational kinds.
    ///
    /// Only ordering kinds take part in the acyclicity check.
    pub fn ordering(&self) -> Option<ArcDirection> {
        match self {
            Self::Blocks | Self::Causes => Some(ArcDirection::SourceFirst),
            Self::BlockedBy | Self::CausedBy => Some(ArcDirection::TargetFirst),
            _ => None,
        }
    }

    /// Whether edges of this kind must stay acyclic.
    pub fn is_hierarchical(&self) -> bool {
        self.ordering().is_some()
    }

    /// Whether this value would be read back unchanged from a link definition.
    pub fn is_canonical(&self) -> bool {
        match self {
            Self::Other(raw) => is_kind_token(raw) && Self::known(raw).is_none(),
            _ => true,
        }
    }
}

impl FromStr for RelationshipKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(kind) = Self::known(trimmed) {
            return Ok(kind);
        }
        if is_kind_token(trimmed) {
            Ok(Self::Other(trimmed.to_string()))
        } else {
            Err(Error::Invalid {
                field: "relationship",
                reason: format!("'{s}' is not a single word"),
            })
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RelationshipKind> for String {
    fn from(kind: RelationshipKind) -> Self {
        kind.as_str().to_string()
    }
}

impl TryFrom<String> for RelationshipKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
