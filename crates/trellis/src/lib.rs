//! Trellis - plaintext tickets in a version-controlled directory tree.
//!
//! Tickets are markdown files named `<number>-<slug>.md` under a ticket
//! root. Directories are groups, and reference-style links between
//! tickets are typed relationships. [`store::TicketStore`] loads the tree,
//! keeps the relationship graph free of ordering cycles and performs every
//! mutation; [`query::Query`] searches it.
//!
//! The record format itself lives in the `trellis-record` crate.

#![forbid(unsafe_code)]

pub mod domain;
pub mod error;
pub mod fs;
pub mod graph;
pub mod placement;
pub mod query;
pub mod store;
pub mod vcs;

// Public CLI module (needed by binary)
pub mod cli;

// Command implementations
pub mod commands;

pub mod app;
pub mod config;
pub mod output;

pub use error::{Error, Result};
