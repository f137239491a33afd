//! The structured form of a ticket document.

use crate::error::{Error, Result};
use crate::grammar::{self, LineKind, RELATIONSHIPS_SECTION};
use crate::kinds::{RelationshipKind, TicketStatus, WorkType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number identifying a ticket
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TicketNumber(pub u64);

impl TicketNumber {
    /// The number given to the first ticket in an empty tree.
    pub const FIRST: TicketNumber = TicketNumber(1);

    /// The raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// The number after this one, or `None` at the top of the range.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TicketNumber {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl FromStr for TicketNumber {
    type Err = Error;

    /// Accepts `12` and `#12`.
    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim().trim_start_matches('#');
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| Error::Invalid {
                field: "ticket number",
                reason: format!("'{s}' is not a number"),
            })
    }
}

/// A typed, directed link from one ticket to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    /// The ticket this one points at
    pub target: TicketNumber,

    /// What the link means
    pub kind: RelationshipKind,

    /// Label written in the link definition
    pub label: String,
}

impl Relationship {
    /// Creates a relationship with the default label (`blocks-3`).
    pub fn new(target: TicketNumber, kind: RelationshipKind) -> Self {
        let label = default_label(target, &kind);
        Self {
            target,
            kind,
            label,
        }
    }

    /// Replaces the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Whether this relationship has the given identity.
    pub fn is(&self, target: TicketNumber, kind: &RelationshipKind) -> bool {
        self.target == target && &self.kind == kind
    }
}

/// The label used when none is given: the lower-cased kind and the target.
pub fn default_label(target: TicketNumber, kind: &RelationshipKind) -> String {
    format!("{}-{}", kind.as_str().to_ascii_lowercase(), target)
}

/// An ordered set of relationships, unique by `(target, kind)`.
///
/// Iteration follows insertion order, which is also the order relationships
/// are written to disk. Equality ignores order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Relationship>", into = "Vec<Relationship>")]
pub struct Relationships(Vec<Relationship>);

impl Relationships {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a relationship. Returns `false` (and changes nothing) if one with
    /// the same target and kind is already present.
    pub fn insert(&mut self, relationship: Relationship) -> bool {
        if self.contains(relationship.target, &relationship.kind) {
            return false;
        }
        self.0.push(relationship);
        true
    }

    /// Removes the relationship with this identity, returning it.
    pub fn remove(&mut self, target: TicketNumber, kind: &RelationshipKind) -> Option<Relationship> {
        let index = self.0.iter().position(|r| r.is(target, kind))?;
        Some(self.0.remove(index))
    }

    /// Whether a relationship with this identity exists.
    pub fn contains(&self, target: TicketNumber, kind: &RelationshipKind) -> bool {
        self.0.iter().any(|r| r.is(target, kind))
    }

    /// Looks up the relationship with this identity.
    pub fn get(&self, target: TicketNumber, kind: &RelationshipKind) -> Option<&Relationship> {
        self.0.iter().find(|r| r.is(target, kind))
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Relationship> {
        self.0.iter()
    }

    /// Number of relationships.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The distinct target numbers, in first-seen order.
    pub fn targets(&self) -> Vec<TicketNumber> {
        let mut targets = Vec::new();
        for r in &self.0 {
            if !targets.contains(&r.target) {
                targets.push(r.target);
            }
        }
        targets
    }
}

impl PartialEq for Relationships {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.0.iter().all(|r| other.0.contains(r))
    }
}

impl Eq for Relationships {}

impl From<Vec<Relationship>> for Relationships {
    fn from(relationships: Vec<Relationship>) -> Self {
        relationships.into_iter().collect()
    }
}

impl From<Relationships> for Vec<Relationship> {
    fn from(relationships: Relationships) -> Self {
        relationships.0
    }
}

impl FromIterator<Relationship> for Relationships {
    fn from_iter<I: IntoIterator<Item = Relationship>>(iter: I) -> Self {
        let mut set = Self::new();
        for relationship in iter {
            set.insert(relationship);
        }
        set
    }
}

impl<'a> IntoIterator for &'a Relationships {
    type Item = &'a Relationship;
    type IntoIter = std::slice::Iter<'a, Relationship>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A named auxiliary section following the description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Heading text
    pub heading: String,

    /// Body text, kept verbatim
    pub body: String,
}

impl Section {
    /// Creates a section.
    pub fn new(heading: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            body: body.into(),
        }
    }
}

/// Everything stored inside a ticket file.
///
/// Identity and placement (number, slug, group) come from the file's path,
/// not its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRecord {
    /// Ticket title
    pub title: String,

    /// Current status
    pub status: TicketStatus,

    /// Work classification (optional)
    #[serde(rename = "type")]
    pub work_type: Option<WorkType>,

    /// Free-form markdown following the title
    pub description: String,

    /// Auxiliary sections, in document order
    pub sections: Vec<Section>,

    /// Relationships to other tickets
    pub relationships: Relationships,
}

impl TicketRecord {
    /// Creates a record with just a title and the default status.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: TicketStatus::default(),
            work_type: None,
            description: String::new(),
            sections: Vec::new(),
            relationships: Relationships::new(),
        }
    }

    /// Checks that the record survives an encode/decode cycle unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invalid`] naming the first field that cannot be
    /// written losslessly.
    pub fn validate(&self) -> Result<()> {
        validate_title(&self.title)?;

        if !self.status.is_canonical() {
            return Err(invalid("status", format!("'{}' is not an upper-case word", self.status)));
        }
        if let Some(work_type) = &self.work_type {
            if !work_type.is_canonical() {
                return Err(invalid("type", format!("'{work_type}' is not an upper-case word")));
            }
        }

        for relationship in &self.relationships {
            validate_relationship(relationship)?;
        }

        let title_links = grammar::scan(&self.title)?;
        self.validate_inline_links(&title_links, "title")?;
        self.validate_block("description", &self.description)?;

        for section in &self.sections {
            validate_heading(&section.heading)?;
            self.validate_inline_links(&grammar::scan(&section.heading)?, "section")?;
            self.validate_block("section", &section.body)?;
        }

        Ok(())
    }

    fn validate_block(&self, field: &'static str, text: &str) -> Result<()> {
        if text.contains('\r') {
            return Err(invalid(field, "carriage returns are not preserved".to_string()));
        }
        if grammar::normalize_block(text) != text {
            return Err(invalid(
                field,
                "leading or trailing blank lines are not preserved".to_string(),
            ));
        }
        if !grammar::fences_balanced(text) {
            return Err(invalid(field, "unclosed code fence".to_string()));
        }

        let scanned = grammar::scan(text)?;
        for line in &scanned {
            match &line.kind {
                LineKind::Heading(heading) => {
                    return Err(invalid(
                        field,
                        format!("line {} is a top-level heading '{heading}'", line.number),
                    ));
                }
                LineKind::Definition(claim) => {
                    return Err(invalid(
                        field,
                        format!(
                            "line {} defines a relationship to #{}; add it to the relationships instead",
                            line.number, claim.target
                        ),
                    ));
                }
                LineKind::Text => {}
            }
        }
        self.validate_inline_links(&scanned, field)
    }

    fn validate_inline_links(
        &self,
        scanned: &[grammar::ScannedLine<'_>],
        field: &'static str,
    ) -> Result<()> {
        for claim in scanned.iter().flat_map(|line| &line.inline) {
            let kind = claim
                .kind
                .as_deref()
                .map_or_else(RelationshipKind::default, RelationshipKind::lenient);
            if !self.relationships.contains(claim.target, &kind) {
                return Err(invalid(
                    field,
                    format!(
                        "inline link to #{} ({kind}) is missing from the relationships",
                        claim.target
                    ),
                ));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> Error {
    Error::Invalid { field, reason }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(invalid("title", "must not be empty".to_string()));
    }
    if title.trim() != title {
        return Err(invalid("title", "must not start or end with whitespace".to_string()));
    }
    if title.contains(['\n', '\r']) {
        return Err(invalid("title", "must be a single line".to_string()));
    }
    Ok(())
}

fn validate_heading(heading: &str) -> Result<()> {
    if heading.trim().is_empty() || heading.trim() != heading || heading.contains(['\n', '\r'])
    {
        return Err(invalid(
            "section",
            format!("heading '{heading}' must be a single trimmed line"),
        ));
    }
    if heading.eq_ignore_ascii_case(RELATIONSHIPS_SECTION) {
        return Err(invalid(
            "section",
            format!("'{heading}' is reserved for relationship definitions"),
        ));
    }
    Ok(())
}

fn validate_relationship(relationship: &Relationship) -> Result<()> {
    let label = &relationship.label;
    if label.is_empty() || label.trim() != label || label.contains(['[', ']', '\n', '\r']) {
        return Err(invalid(
            "relationship",
            format!("label '{label}' must be non-empty, trimmed and free of brackets"),
        ));
    }
    if !relationship.kind.is_canonical() {
        return Err(invalid(
            "relationship",
            format!("type '{}' is not a single word", relationship.kind),
        ));
    }
    Ok(())
}
