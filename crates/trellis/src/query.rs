//! Ticket search.
//!
//! A [`Query`] is a conjunction of [`Predicate`]s plus an ordering and an
//! optional limit. Regex patterns are compiled once per run, before any
//! ticket is looked at.

use crate::domain::{
    GroupPath, LinkDirection, RelationshipKind, Ticket, TicketNumber, TicketStatus, WorkType,
};
use crate::error::Result;
use crate::graph::RelationshipGraph;
use crate::store::TicketStore;
use regex::{Regex, RegexBuilder};

/// Text to look for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Case-insensitive substring
    Literal(String),
    /// Regular expression, matched as written
    Regex(String),
}

/// Which part of a ticket a text predicate looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextField {
    /// The title
    Title,
    /// The description
    Description,
    /// The slug from the file name
    Slug,
    /// Title, description, slug and section bodies
    #[default]
    Any,
}

/// How a group predicate treats nested groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GroupScope {
    /// Only tickets directly in the group
    Immediate,
    /// Tickets in the group or any group nested in it
    #[default]
    Recursive,
}

/// One condition on a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Has this number
    Number(TicketNumber),
    /// Has this status
    Status(TicketStatus),
    /// Has one of these statuses
    StatusIn(Vec<TicketStatus>),
    /// Has this work type
    WorkType(WorkType),
    /// Lives in a group
    Group {
        /// The group
        path: GroupPath,
        /// Whether nested groups count
        scope: GroupScope,
    },
    /// Contains some text
    Text {
        /// Where to look
        field: TextField,
        /// What to look for
        pattern: Pattern,
    },
    /// Has a relationship edge; `None` fields match anything
    Relationship {
        /// Relationship type
        kind: Option<RelationshipKind>,
        /// Ticket at the other end
        other: Option<TicketNumber>,
        /// Which end the ticket is on
        direction: Option<LinkDirection>,
    },
    /// The inner predicate does not hold
    Not(Box<Predicate>),
    /// At least one of the inner predicates holds
    AnyOf(Vec<Predicate>),
}

/// Result ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Lowest number first
    #[default]
    NumberAsc,
    /// Highest number first
    NumberDesc,
    /// Alphabetical by title, then by number
    Title,
}

/// A ticket search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// Conditions that must all hold
    pub predicates: Vec<Predicate>,
    /// Result order
    pub order: SortOrder,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl Query {
    /// A query matching every ticket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition.
    #[must_use]
    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Matches a single ticket number.
    #[must_use]
    pub fn number(self, number: TicketNumber) -> Self {
        self.with(Predicate::Number(number))
    }

    /// Matches one status.
    #[must_use]
    pub fn status(self, status: TicketStatus) -> Self {
        self.with(Predicate::Status(status))
    }

    /// Matches tickets in `path`.
    #[must_use]
    pub fn in_group(self, path: GroupPath, scope: GroupScope) -> Self {
        self.with(Predicate::Group { path, scope })
    }

    /// Matches text in `field`.
    #[must_use]
    pub fn text(self, field: TextField, pattern: Pattern) -> Self {
        self.with(Predicate::Text { field, pattern })
    }

    /// Sets the result order.
    #[must_use]
    pub fn order_by(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Caps the number of results.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Runs the query against a store.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidPattern`] if a regex does not compile.
    pub fn run<'a>(&self, store: &'a TicketStore) -> Result<Vec<&'a Ticket>> {
        let matchers = self
            .predicates
            .iter()
            .map(Matcher::compile)
            .collect::<Result<Vec<_>>>()?;
        let graph = store.graph();

        let mut found: Vec<&Ticket> = store
            .tickets()
            .filter(|ticket| matchers.iter().all(|m| m.matches(ticket, graph)))
            .collect();

        match self.order {
            SortOrder::NumberAsc => {}
            SortOrder::NumberDesc => found.reverse(),
            SortOrder::Title => found.sort_by(|a, b| {
                a.title()
                    .to_lowercase()
                    .cmp(&b.title().to_lowercase())
                    .then(a.number.cmp(&b.number))
            }),
        }
        if let Some(limit) = self.limit {
            found.truncate(limit);
        }
        Ok(found)
    }
}

enum TextMatcher {
    Literal(String),
    Regex(Regex),
}

impl TextMatcher {
    fn is_match(&self, haystack: &str) -> bool {
        match self {
            Self::Literal(needle) => haystack.to_lowercase().contains(needle),
            Self::Regex(regex) => regex.is_match(haystack),
        }
    }
}

/// A predicate with its patterns compiled.
enum Matcher<'q> {
    Plain(&'q Predicate),
    Text(TextField, TextMatcher),
    Not(Box<Matcher<'q>>),
    AnyOf(Vec<Matcher<'q>>),
}

impl<'q> Matcher<'q> {
    fn compile(predicate: &'q Predicate) -> Result<Self> {
        Ok(match predicate {
            Predicate::Text { field, pattern } => {
                let text = match pattern {
                    Pattern::Literal(s) => TextMatcher::Literal(s.to_lowercase()),
                    Pattern::Regex(s) => TextMatcher::Regex(RegexBuilder::new(s).multi_line(true).build()?),
                };
                Self::Text(*field, text)
            }
            Predicate::Not(inner) => Self::Not(Box::new(Self::compile(inner)?)),
            Predicate::AnyOf(inner) => {
                Self::AnyOf(inner.iter().map(Self::compile).collect::<Result<_>>()?)
            }
            other => Self::Plain(other),
        })
    }

    fn matches(&self, ticket: &Ticket, graph: &RelationshipGraph) -> bool {
        match self {
            Self::Text(field, text) => text_fields(ticket, *field).any(|s| text.is_match(s)),
            Self::Not(inner) => !inner.matches(ticket, graph),
            Self::AnyOf(inner) => inner.iter().any(|m| m.matches(ticket, graph)),
            Self::Plain(predicate) => plain_matches(predicate, ticket, graph),
        }
    }
}

fn text_fields(ticket: &Ticket, field: TextField) -> Box<dyn Iterator<Item = &str> + '_> {
    let title = std::iter::once(ticket.title());
    let description = std::iter::once(ticket.record.description.as_str());
    let slug = ticket.slug.as_deref().into_iter();
    match field {
        TextField::Title => Box::new(title),
        TextField::Description => Box::new(description),
        TextField::Slug => Box::new(slug),
        TextField::Any => Box::new(
            title
                .chain(description)
                .chain(slug)
                .chain(ticket.record.sections.iter().map(|s| s.body.as_str())),
        ),
    }
}

fn plain_matches(predicate: &Predicate, ticket: &Ticket, graph: &RelationshipGraph) -> bool {
    match predicate {
        Predicate::Number(number) => ticket.number == *number,
        Predicate::Status(status) => ticket.status() == status,
        Predicate::StatusIn(statuses) => statuses.contains(ticket.status()),
        Predicate::WorkType(work_type) => ticket.record.work_type.as_ref() == Some(work_type),
        Predicate::Group { path, scope } => match scope {
            GroupScope::Immediate => &ticket.group_path == path,
            GroupScope::Recursive => ticket.group_path.starts_with(path),
        },
        Predicate::Relationship {
            kind,
            other,
            direction,
        } => {
            let outgoing = graph
                .edges_from(ticket.number)
                .into_iter()
                .map(|edge| (edge.target, edge.kind, LinkDirection::Outgoing));
            let incoming = graph
                .edges_to(ticket.number)
                .into_iter()
                .map(|edge| (edge.source, edge.kind, LinkDirection::Incoming));
            outgoing.chain(incoming).any(|(number, edge_kind, edge_direction)| {
                kind.as_ref().is_none_or(|k| *k == edge_kind)
                    && other.is_none_or(|o| o == number)
                    && direction.is_none_or(|d| d == edge_direction)
            })
        }
        // Compiled into their own matchers.
        Predicate::Text { .. } | Predicate::Not(_) | Predicate::AnyOf(_) => false,
    }
}
