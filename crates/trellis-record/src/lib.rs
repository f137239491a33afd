//! Plaintext ticket records.
//!
//! This library converts ticket documents (markdown with a status marker,
//! a title heading, free-form sections and reference-style relationship
//! links) to and from structured [`TicketRecord`] values. It performs no I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod decode;
pub mod encode;
pub mod error;
mod grammar;
pub mod kinds;
pub mod record;
pub mod warning;

pub use decode::{DecodeOptions, Decoded, decode, decode_with};
pub use encode::encode;
pub use error::{Error, Result};
pub use grammar::{RELATIONSHIPS_SECTION, normalize_block};
pub use kinds::{ArcDirection, RelationshipKind, TicketStatus, WorkType};
pub use record::{Relationship, Relationships, Section, TicketNumber, TicketRecord, default_label};
pub use warning::DecodeWarning;
