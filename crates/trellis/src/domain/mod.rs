//! Domain types for ticket tracking.
//!
//! The record types (title, status, relationships, ...) live in
//! `trellis-record`; this module adds what a ticket's position in the tree
//! gives it: number, slug and group path.

use crate::error::{PlacementError, Result};
use crate::placement;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub use trellis_record::{
    Relationship, RelationshipKind, Relationships, Section, TicketNumber, TicketRecord,
    TicketStatus, WorkType,
};

/// Ordered chain of group names from the ticket root down to a directory.
///
/// The empty path is the root itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupPath(Vec<String>);

impl GroupPath {
    /// The ticket root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Builds a group path from segments that are already known to be valid.
    pub(crate) fn from_segments(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Parses `a/b/c`. An empty string, `/` or `.` is the root.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::InvalidGroupName`] if a segment is not a
    /// valid slug.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_matches('/');
        if trimmed.is_empty() || trimmed == "." {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if !placement::is_valid_slug(segment) {
                return Err(PlacementError::InvalidGroupName {
                    name: segment.to_string(),
                }
                .into());
            }
            segments.push(segment.to_string());
        }
        Ok(Self(segments))
    }

    /// The group names, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether this is the ticket root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Name of the innermost group, or `None` at the root.
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The enclosing group path, or `None` at the root.
    pub fn parent(&self) -> Option<GroupPath> {
        let (_, parent) = self.0.split_last()?;
        Some(Self(parent.to_vec()))
    }

    /// A child group of this one.
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> GroupPath {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    /// Whether `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &GroupPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// The directory for this group under `root`.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        self.0.iter().fold(root.to_path_buf(), |path, segment| path.join(segment))
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0.join("/"))
        }
    }
}

/// A loaded ticket: its record plus the identity derived from its file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique ticket number
    pub number: TicketNumber,

    /// Slug from the file name, if it has one
    pub slug: Option<String>,

    /// Groups enclosing this ticket, outermost first
    pub group_path: GroupPath,

    /// For a group ticket, the group it stands for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub represents: Option<GroupPath>,

    /// File location relative to the ticket root
    pub path: PathBuf,

    /// Contents of the file
    #[serde(flatten)]
    pub record: TicketRecord,
}

impl Ticket {
    /// Whether this ticket stands for a group.
    pub fn is_group_ticket(&self) -> bool {
        self.represents.is_some()
    }

    /// The name of the version-control branch for work on this ticket.
    pub fn branch_name(&self) -> String {
        match &self.slug {
            Some(slug) => format!("{}-{}", self.number, slug),
            None => self.number.to_string(),
        }
    }

    /// The ticket title.
    pub fn title(&self) -> &str {
        &self.record.title
    }

    /// The ticket status.
    pub fn status(&self) -> &TicketStatus {
        &self.record.status
    }
}

/// A requested relationship on a new ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    /// The ticket to link to
    pub target: TicketNumber,

    /// Relationship type
    pub kind: RelationshipKind,

    /// Also record the complementary relationship on the target
    pub reciprocal: bool,
}

impl NewLink {
    /// A one-way link.
    pub fn new(target: TicketNumber, kind: RelationshipKind) -> Self {
        Self {
            target,
            kind,
            reciprocal: false,
        }
    }

    /// A link recorded on both tickets.
    pub fn reciprocal(target: TicketNumber, kind: RelationshipKind) -> Self {
        Self {
            target,
            kind,
            reciprocal: true,
        }
    }
}

/// Data for creating a new ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTicket {
    /// Ticket title (required)
    pub title: String,

    /// Explicit slug; derived from the title when `None`
    pub slug: Option<String>,

    /// Description markdown
    pub description: String,

    /// Initial status
    pub status: TicketStatus,

    /// Work type
    pub work_type: Option<WorkType>,

    /// Auxiliary sections
    pub sections: Vec<Section>,

    /// Group to create the ticket in (root by default)
    pub group: GroupPath,

    /// Relationships to create along with the ticket
    pub links: Vec<NewLink>,

    /// Explicit number; the next free number when `None`
    pub number: Option<TicketNumber>,
}

impl NewTicket {
    /// A ticket with just a title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Changes to apply to an existing ticket. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketUpdate {
    /// New title
    pub title: Option<String>,

    /// New status
    pub status: Option<TicketStatus>,

    /// New work type (`Some(None)` clears it)
    pub work_type: Option<Option<WorkType>>,

    /// New description
    pub description: Option<String>,

    /// Replacement sections
    pub sections: Option<Vec<Section>>,

    /// Replacement relationship set
    pub relationships: Option<Relationships>,
}

impl TicketUpdate {
    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub(crate) fn apply(&self, record: &mut TicketRecord) {
        if let Some(title) = &self.title {
            record.title = title.trim().to_string();
        }
        if let Some(status) = &self.status {
            record.status = status.clone();
        }
        if let Some(work_type) = &self.work_type {
            record.work_type = work_type.clone();
        }
        if let Some(description) = &self.description {
            record.description = trellis_record::normalize_block(description);
        }
        if let Some(sections) = &self.sections {
            record.sections = sections.clone();
        }
        if let Some(relationships) = &self.relationships {
            record.relationships = relationships.clone();
        }
    }
}

/// Which end of an edge a ticket sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkDirection {
    /// The ticket holds the relationship
    Outgoing,
    /// Another ticket points at this one
    Incoming,
}

/// One relationship as seen from a particular ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedTicket {
    /// The ticket at the other end
    pub number: TicketNumber,

    /// Relationship type, as recorded by the holding ticket
    pub kind: RelationshipKind,

    /// Whether the relationship is held by this ticket or the other one
    pub direction: LinkDirection,
}
