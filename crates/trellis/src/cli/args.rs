//! CLI argument structs for all commands.
//!
//! Each command has its own argument struct with clap derive attributes
//! for parsing and validation.

use clap::{Args, Parser};

use super::types::{RelationshipKindArg, SortOrderArg, StatusArg, TextFieldArg, WorkTypeArg};
use super::validators::{
    parse_group, parse_link, parse_ticket_number, validate_slug, validate_tickets_dir,
    validate_title,
};
use crate::domain::{GroupPath, RelationshipKind, TicketNumber};

/// Arguments for the `init` command
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Ticket directory, relative to the current directory
    ///
    /// Defaults to `.trellis/tickets`.
    #[arg(long, value_parser = validate_tickets_dir)]
    pub tickets_dir: Option<String>,

    /// Suppress output messages
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {}

/// Filters shared by commands that search for tickets
#[derive(Args, Debug, Clone, Default)]
pub struct SearchArgs {
    /// Only tickets with one of these statuses (comma-separated)
    #[arg(short, long, value_enum, value_delimiter = ',')]
    pub status: Vec<StatusArg>,

    /// Leave out tickets with these statuses (comma-separated)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub not_status: Vec<StatusArg>,

    /// Only tickets of this type
    #[arg(short = 't', long = "type", value_enum)]
    pub work_type: Option<WorkTypeArg>,

    /// Only tickets in this group (e.g. `mvp/auth`)
    #[arg(short, long, value_parser = parse_group)]
    pub group: Option<GroupPath>,

    /// With --group, leave out tickets in nested groups
    #[arg(long, requires = "group")]
    pub immediate: bool,

    /// Only tickets containing this text
    #[arg(long)]
    pub grep: Option<String>,

    /// Treat --grep as a regular expression
    #[arg(long, requires = "grep")]
    pub regex: bool,

    /// Where --grep looks
    #[arg(long, value_enum, default_value_t = TextFieldArg::Any)]
    pub field: TextFieldArg,

    /// Only tickets with a relationship to or from this ticket
    #[arg(long, value_parser = parse_ticket_number)]
    pub linked_to: Option<TicketNumber>,

    /// Only tickets with a relationship of this type
    #[arg(long, value_enum)]
    pub kind: Option<RelationshipKindArg>,
}

/// Arguments for the `new` command
#[derive(Parser, Debug, Clone)]
pub struct NewArgs {
    /// Ticket title
    #[arg(value_parser = validate_title)]
    pub title: String,

    /// Description
    #[arg(short = 'D', long)]
    pub description: Option<String>,

    /// Initial status
    #[arg(short, long, value_enum, default_value_t = StatusArg::Todo)]
    pub status: StatusArg,

    /// Work type
    #[arg(short = 't', long = "type", value_enum)]
    pub work_type: Option<WorkTypeArg>,

    /// Group to create the ticket in
    #[arg(short, long, value_parser = parse_group)]
    pub group: Option<GroupPath>,

    /// File name slug (derived from the title by default)
    #[arg(long, value_parser = validate_slug)]
    pub slug: Option<String>,

    /// Relationships, as `N` or `KIND:N` (comma-separated, e.g. `blocks:3`)
    #[arg(short, long, value_parser = parse_link, value_delimiter = ',')]
    pub link: Vec<(RelationshipKind, TicketNumber)>,

    /// Also record each relationship on the linked ticket
    #[arg(long, requires = "link")]
    pub both: bool,
}

/// Arguments for the `list` command
#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    /// Search filters
    #[command(flatten)]
    pub search: SearchArgs,

    /// Maximum number of tickets to display
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Sort order
    #[arg(long, value_enum, default_value_t = SortOrderArg::Number)]
    pub sort: SortOrderArg,
}

/// Arguments for the `show` command
#[derive(Parser, Debug, Clone)]
pub struct ShowArgs {
    /// Ticket number, or text identifying exactly one ticket
    pub ticket: String,
}

/// Arguments for the `edit` command
#[derive(Parser, Debug, Clone)]
pub struct EditArgs {
    /// Ticket number, or text identifying exactly one ticket
    pub ticket: String,

    /// New title
    #[arg(long, value_parser = validate_title)]
    pub title: Option<String>,

    /// New status
    #[arg(short, long, value_enum)]
    pub status: Option<StatusArg>,

    /// New work type
    #[arg(short = 't', long = "type", value_enum, conflicts_with = "clear_type")]
    pub work_type: Option<WorkTypeArg>,

    /// Remove the work type
    #[arg(long)]
    pub clear_type: bool,

    /// New description
    #[arg(short = 'D', long)]
    pub description: Option<String>,
}

/// Arguments for the `link` and `unlink` commands
#[derive(Parser, Debug, Clone)]
pub struct LinkArgs {
    /// Ticket holding the relationship
    #[arg(value_parser = parse_ticket_number)]
    pub source: TicketNumber,

    /// Relationship type
    #[arg(value_enum)]
    pub kind: RelationshipKindArg,

    /// Ticket the relationship points at
    #[arg(value_parser = parse_ticket_number)]
    pub target: TicketNumber,

    /// Also add (or remove) the complementary relationship on the target
    #[arg(short, long)]
    pub both: bool,
}

/// Arguments for the `move` command
#[derive(Parser, Debug, Clone)]
pub struct MoveArgs {
    /// Ticket number, or text identifying exactly one ticket
    pub ticket: String,

    /// Destination group (`/` for the top level)
    #[arg(value_parser = parse_group)]
    pub group: GroupPath,
}

/// Arguments for the `group` command
#[derive(Parser, Debug, Clone)]
pub struct GroupArgs {
    /// Group to create (e.g. `mvp/auth`); lists groups when omitted
    #[arg(value_parser = parse_group)]
    pub path: Option<GroupPath>,
}

/// Arguments for the `start` command
#[derive(Parser, Debug, Clone)]
pub struct StartArgs {
    /// Ticket number, or text identifying exactly one ticket
    pub ticket: String,
}
