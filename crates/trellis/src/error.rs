//! Error types for trellis operations.

use crate::domain::{GroupPath, TicketNumber};
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The error type for trellis operations.
///
/// Every failure a caller might want to branch on has its own variant.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A ticket file could not be decoded.
    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        /// File that failed to parse
        path: PathBuf,
        /// What went wrong
        #[source]
        source: trellis_record::Error,
    },

    /// A file name or location does not fit the identity scheme.
    #[error(transparent)]
    Placement(#[from] PlacementError),

    /// A ticket number is claimed more than once.
    #[error("Ticket number {number} is already in use{}", format_paths(.paths))]
    DuplicateNumber {
        /// The contested number
        number: TicketNumber,
        /// Files claiming it
        paths: Vec<PathBuf>,
    },

    /// A relationship or move refers to something that does not exist.
    #[error("Unknown {0}")]
    UnknownTarget(Target),

    /// The ticket an operation was invoked on does not exist.
    #[error("Ticket not found: #{0}")]
    TicketNotFound(TicketNumber),

    /// The change would create a circular ordering.
    #[error("Circular relationship: {}", format_cycle(.path))]
    CycleDetected {
        /// The cycle, starting and ending with the same ticket
        path: Vec<TicketNumber>,
    },

    /// The ticket contents cannot be written losslessly.
    #[error("Invalid ticket: {0}")]
    InvalidTicket(#[source] trellis_record::Error),

    /// A single-result query matched more than one ticket.
    #[error("Expected one ticket, found {}: {}", .numbers.len(), format_numbers(.numbers))]
    AmbiguousResult {
        /// The matching tickets
        numbers: Vec<TicketNumber>,
    },

    /// A single-result query matched nothing.
    #[error("No ticket matches the query")]
    NoResult,

    /// The on-disk state changed underneath an operation.
    ///
    /// Reload and retry once.
    #[error("Ticket #{number} already exists on disk at {}", .path.display())]
    Conflict {
        /// The number that was being claimed
        number: TicketNumber,
        /// The file that was already present
        path: PathBuf,
    },

    /// Every ticket number up to the largest representable one is taken.
    #[error("No ticket numbers left after #{0}")]
    NumbersExhausted(TicketNumber),

    /// Version control command failed.
    #[error("Version control error: {0}")]
    Vcs(String),

    /// A search pattern is not a valid regular expression.
    #[error("Invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl Error {
    /// Whether reloading and repeating the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// The thing an [`Error::UnknownTarget`] could not find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A ticket number
    Ticket(TicketNumber),
    /// A group
    Group(GroupPath),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ticket(number) => write!(f, "ticket #{number}"),
            Self::Group(group) => write!(f, "group '{group}'"),
        }
    }
}

/// Errors about where a ticket or group lives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// File name does not match `<number>-<slug>.md`.
    #[error("'{}' does not match the ticket file name pattern <number>-<slug>.md", .path.display())]
    BadFileName {
        /// The offending file
        path: PathBuf,
    },

    /// Path is not under the ticket root.
    #[error("'{}' is outside the ticket directory", .path.display())]
    OutsideRoot {
        /// The offending path
        path: PathBuf,
    },

    /// A group name is not a valid slug.
    #[error("'{name}' is not a valid group name (lowercase letters, digits and single dashes)")]
    InvalidGroupName {
        /// The offending name
        name: String,
    },

    /// A ticket slug is not valid.
    #[error("'{slug}' is not a valid slug (lowercase letters, digits and single dashes)")]
    InvalidSlug {
        /// The offending slug
        slug: String,
    },

    /// A group cannot be moved inside itself.
    #[error("Cannot move group '{group}' into '{destination}'")]
    MoveIntoSelf {
        /// The group being moved
        group: GroupPath,
        /// Where it was asked to go
        destination: GroupPath,
    },

    /// A ticket would land in the group it is named after and turn into
    /// that group's ticket.
    #[error("Moving '{}' into '{group}' would make it the group's ticket; rename it first", .path.display())]
    WouldRepresentGroup {
        /// The ticket file being moved
        path: PathBuf,
        /// The destination group
        group: GroupPath,
    },

    /// Something already occupies the destination.
    #[error("'{}' already exists", .path.display())]
    DestinationExists {
        /// The occupied path
        path: PathBuf,
    },
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No `.trellis` directory in this directory or any parent.
    #[error("Not a trellis repository (or any parent up to the filesystem root). Run 'trellis init' first")]
    NotInitialized,

    /// `trellis init` ran in an initialized directory.
    #[error("Trellis is already initialized in {}", .0.display())]
    AlreadyInitialized(PathBuf),

    /// The configuration file is not valid YAML.
    #[error("Invalid configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn format_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return String::new();
    }
    let listed: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    format!(" by {}", listed.join(", "))
}

fn format_cycle(path: &[TicketNumber]) -> String {
    path.iter()
        .map(|n| format!("#{n}"))
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn format_numbers(numbers: &[TicketNumber]) -> String {
    numbers
        .iter()
        .map(|n| format!("#{n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A specialized Result type for trellis operations.
pub type Result<T> = std::result::Result<T, Error>;
