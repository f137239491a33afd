//! CLI value enums and domain type conversions.

use clap::ValueEnum;

use crate::domain::{RelationshipKind, TicketStatus, WorkType};
use crate::query::{SortOrder, TextField};

// ============================================================================
// Value Enums
// ============================================================================

/// Ticket status for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusArg {
    /// Not started yet
    Todo,
    /// Being worked on
    #[value(alias = "doing")]
    Started,
    /// Paused
    Stopped,
    /// Finished
    Done,
}

impl std::fmt::Display for StatusArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl From<StatusArg> for TicketStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Todo => TicketStatus::Todo,
            StatusArg::Started => TicketStatus::Started,
            StatusArg::Stopped => TicketStatus::Stopped,
            StatusArg::Done => TicketStatus::Done,
        }
    }
}

/// Work type for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkTypeArg {
    /// New functionality
    Feature,
    /// General task
    Task,
    /// Bug fix
    Bug,
}

impl std::fmt::Display for WorkTypeArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Feature => write!(f, "feature"),
            Self::Task => write!(f, "task"),
            Self::Bug => write!(f, "bug"),
        }
    }
}

impl From<WorkTypeArg> for WorkType {
    fn from(arg: WorkTypeArg) -> Self {
        match arg {
            WorkTypeArg::Feature => WorkType::Feature,
            WorkTypeArg::Task => WorkType::Task,
            WorkTypeArg::Bug => WorkType::Bug,
        }
    }
}

/// Relationship type for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelationshipKindArg {
    /// Mentions the other ticket
    References,
    /// Loosely related
    #[default]
    #[value(name = "relates-to", alias = "relates")]
    RelatesTo,
    /// Must be done before the other ticket
    Blocks,
    /// Waits for the other ticket
    #[value(name = "blocked-by")]
    BlockedBy,
    /// Leads to the other ticket
    Causes,
    /// Follows from the other ticket
    #[value(name = "caused-by")]
    CausedBy,
    /// Resolves the other ticket
    Fixes,
    /// Resolved by the other ticket
    #[value(name = "fixed-by")]
    FixedBy,
}

impl std::fmt::Display for RelationshipKindArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::References => write!(f, "references"),
            Self::RelatesTo => write!(f, "relates-to"),
            Self::Blocks => write!(f, "blocks"),
            Self::BlockedBy => write!(f, "blocked-by"),
            Self::Causes => write!(f, "causes"),
            Self::CausedBy => write!(f, "caused-by"),
            Self::Fixes => write!(f, "fixes"),
            Self::FixedBy => write!(f, "fixed-by"),
        }
    }
}

impl From<RelationshipKindArg> for RelationshipKind {
    fn from(arg: RelationshipKindArg) -> Self {
        match arg {
            RelationshipKindArg::References => RelationshipKind::References,
            RelationshipKindArg::RelatesTo => RelationshipKind::RelatesTo,
            RelationshipKindArg::Blocks => RelationshipKind::Blocks,
            RelationshipKindArg::BlockedBy => RelationshipKind::BlockedBy,
            RelationshipKindArg::Causes => RelationshipKind::Causes,
            RelationshipKindArg::CausedBy => RelationshipKind::CausedBy,
            RelationshipKindArg::Fixes => RelationshipKind::Fixes,
            RelationshipKindArg::FixedBy => RelationshipKind::FixedBy,
        }
    }
}

/// Sort order for the list command
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrderArg {
    /// Lowest number first
    #[default]
    Number,
    /// Highest number first
    #[value(name = "number-desc")]
    NumberDesc,
    /// Alphabetical by title
    Title,
}

impl std::fmt::Display for SortOrderArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number => write!(f, "number"),
            Self::NumberDesc => write!(f, "number-desc"),
            Self::Title => write!(f, "title"),
        }
    }
}

impl From<SortOrderArg> for SortOrder {
    fn from(arg: SortOrderArg) -> Self {
        match arg {
            SortOrderArg::Number => SortOrder::NumberAsc,
            SortOrderArg::NumberDesc => SortOrder::NumberDesc,
            SortOrderArg::Title => SortOrder::Title,
        }
    }
}

/// Where text searches look
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFieldArg {
    /// The title only
    Title,
    /// The description only
    Description,
    /// The file name slug only
    Slug,
    /// Everywhere
    #[default]
    Any,
}

impl std::fmt::Display for TextFieldArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title => write!(f, "title"),
            Self::Description => write!(f, "description"),
            Self::Slug => write!(f, "slug"),
            Self::Any => write!(f, "any"),
        }
    }
}

impl From<TextFieldArg> for TextField {
    fn from(arg: TextFieldArg) -> Self {
        match arg {
            TextFieldArg::Title => TextField::Title,
            TextFieldArg::Description => TextField::Description,
            TextFieldArg::Slug => TextField::Slug,
            TextFieldArg::Any => TextField::Any,
        }
    }
}
