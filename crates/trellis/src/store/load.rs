//! Best-effort loading of a ticket tree.
//!
//! Loading never stops at a broken ticket. Everything that can be loaded is
//! loaded; everything else is reported as a [`LoadWarning`].

use super::StoreOptions;
use crate::domain::{GroupPath, RelationshipKind, Ticket, TicketNumber};
use crate::error::{Error, PlacementError, Result};
use crate::fs::FileSystem;
use crate::graph::RelationshipGraph;
use crate::placement::{self, Placement};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use trellis_record::{DecodeOptions, DecodeWarning};

/// Non-fatal problems found while loading the ticket tree.
///
/// Each variant says what was skipped; the rest of the tree is still loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// A ticket file could not be decoded.
    ///
    /// **Effect**: The ticket is not loaded. Its number stays claimed.
    Parse {
        /// File relative to the ticket root
        path: PathBuf,
        /// Decoder error
        error: trellis_record::Error,
    },

    /// A `.md` file whose name or location does not fit the identity scheme.
    ///
    /// **Effect**: The file is ignored.
    Placement {
        /// What is wrong with it
        error: PlacementError,
    },

    /// More than one file claims the same number.
    ///
    /// **Effect**: None of them are loaded. The number stays claimed.
    DuplicateNumber {
        /// The contested number
        number: TicketNumber,
        /// Every file claiming it
        paths: Vec<PathBuf>,
    },

    /// A relationship points at a ticket that is not loaded.
    ///
    /// **Effect**: No edge is created; the relationship stays in the file.
    UnknownTarget {
        /// Ticket holding the relationship
        source: TicketNumber,
        /// Missing ticket
        target: TicketNumber,
        /// Relationship type
        kind: RelationshipKind,
    },

    /// A relationship would close an ordering cycle.
    ///
    /// **Effect**: No edge is created; the relationship stays in the file.
    CycleDetected {
        /// Ticket holding the relationship
        source: TicketNumber,
        /// Target of the relationship
        target: TicketNumber,
        /// Relationship type
        kind: RelationshipKind,
        /// The cycle the edge would have closed
        path: Vec<TicketNumber>,
    },

    /// A group directory is named after a ticket that lives somewhere else.
    ///
    /// **Effect**: Reported only. Usually the group ticket was moved by hand.
    Misplaced {
        /// The ticket the directory is named after
        number: TicketNumber,
        /// Where the ticket actually is
        path: PathBuf,
        /// The group named after it
        group: GroupPath,
    },

    /// More than one ticket claims to be the same group's group ticket.
    ///
    /// **Effect**: All are loaded; the lowest number represents the group.
    ConflictingGroupTicket {
        /// The group
        group: GroupPath,
        /// The competing tickets
        numbers: Vec<TicketNumber>,
    },

    /// The decoder had to guess.
    ///
    /// **Effect**: The ticket is loaded as decoded.
    Ambiguity {
        /// File relative to the ticket root
        path: PathBuf,
        /// What the decoder reported
        warning: DecodeWarning,
    },

    /// A file or directory could not be read.
    ///
    /// **Effect**: It is skipped. A file's number stays claimed if its name has one.
    Unreadable {
        /// Path relative to the ticket root
        path: PathBuf,
        /// The IO error
        error: String,
    },
}

impl LoadWarning {
    /// Returns a static string identifying the warning kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            Self::Placement { .. } => "placement",
            Self::DuplicateNumber { .. } => "duplicate_number",
            Self::UnknownTarget { .. } => "unknown_target",
            Self::CycleDetected { .. } => "cycle_detected",
            Self::Misplaced { .. } => "misplaced",
            Self::ConflictingGroupTicket { .. } => "conflicting_group_ticket",
            Self::Ambiguity { .. } => "ambiguity",
            Self::Unreadable { .. } => "unreadable",
        }
    }
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { path, error } => write!(f, "{}: {error}", path.display()),
            Self::Placement { error } => write!(f, "{error}"),
            Self::DuplicateNumber { number, paths } => {
                let paths: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
                write!(f, "ticket #{number} is claimed by {}", paths.join(", "))
            }
            Self::UnknownTarget {
                source,
                target,
                kind,
            } => write!(f, "ticket #{source} {kind} unknown ticket #{target}"),
            Self::CycleDetected {
                source,
                target,
                kind,
                path,
            } => {
                let path: Vec<String> = path.iter().map(|n| format!("#{n}")).collect();
                write!(
                    f,
                    "ignored #{source} {kind} #{target}: circular ({})",
                    path.join(" -> ")
                )
            }
            Self::Misplaced {
                number,
                path,
                group,
            } => write!(
                f,
                "group '{group}' is named after ticket #{number}, which is at {}",
                path.display()
            ),
            Self::ConflictingGroupTicket { group, numbers } => {
                let numbers: Vec<String> = numbers.iter().map(|n| format!("#{n}")).collect();
                write!(f, "group '{group}' has several group tickets: {}", numbers.join(", "))
            }
            Self::Ambiguity { path, warning } => write!(f, "{}: {warning}", path.display()),
            Self::Unreadable { path, error } => {
                write!(f, "cannot read {}: {error}", path.display())
            }
        }
    }
}

/// Everything read from a ticket tree.
#[derive(Debug, Default)]
pub(super) struct LoadedTree {
    pub tickets: BTreeMap<TicketNumber, Ticket>,
    pub groups: BTreeSet<GroupPath>,
    pub graph: RelationshipGraph,
    /// Every number claimed by a file name, loaded or not
    pub claimed: BTreeSet<TicketNumber>,
    pub warnings: Vec<LoadWarning>,
}

fn relative(path: &Path, root: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

/// Walks the tree, descending only into valid group directories, and returns
/// every candidate ticket file with its placement.
async fn read_tree(
    fs: &dyn FileSystem,
    root: &Path,
    tree: &mut LoadedTree,
) -> Result<Vec<Placement>> {
    if !fs.is_dir(root).await {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("ticket directory {} does not exist", root.display()),
        )));
    }

    let mut files = Vec::new();
    let mut pending = vec![(root.to_path_buf(), GroupPath::root())];

    while let Some((dir, group)) = pending.pop() {
        let entries = match fs.list_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if dir == root => return Err(e.into()),
            Err(e) => {
                tree.warnings.push(LoadWarning::Unreadable {
                    path: relative(&dir, root),
                    error: e.to_string(),
                });
                continue;
            }
        };

        for entry in entries {
            let path = dir.join(&entry.name);
            if entry.is_dir {
                if placement::is_valid_slug(&entry.name) {
                    let child = group.child(entry.name);
                    tree.groups.insert(child.clone());
                    pending.push((path, child));
                } else {
                    tracing::debug!(path = %path.display(), "Skipping directory that is not a group");
                }
                continue;
            }
            if !placement::is_ticket_candidate(&path) {
                continue;
            }
            match placement::resolve_identity(&path, root) {
                Ok(found) => files.push(found),
                Err(error) => tree.warnings.push(LoadWarning::Placement { error }),
            }
        }
    }

    files.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.path.cmp(&b.path)));
    Ok(files)
}

/// Files under `root` whose names claim `number`, relative to `root`.
pub(super) async fn claimants(
    fs: &dyn FileSystem,
    root: &Path,
    number: TicketNumber,
) -> Result<Vec<PathBuf>> {
    let mut scratch = LoadedTree::default();
    let files = read_tree(fs, root, &mut scratch).await?;
    Ok(files
        .into_iter()
        .filter(|found| found.number == number)
        .map(|found| found.path)
        .collect())
}

/// Loads every ticket under `root` and builds the relationship graph.
///
/// # Errors
///
/// Only fails if the root itself cannot be listed. Problems with individual
/// tickets become warnings.
pub(super) async fn load_tree(
    fs: &dyn FileSystem,
    root: &Path,
    options: &StoreOptions,
) -> Result<LoadedTree> {
    let mut tree = LoadedTree::default();
    let files = read_tree(fs, root, &mut tree).await?;

    // Group candidates by number so duplicates can be rejected together.
    let mut by_number: BTreeMap<TicketNumber, Vec<Placement>> = BTreeMap::new();
    for found in files {
        tree.claimed.insert(found.number);
        by_number.entry(found.number).or_default().push(found);
    }

    let decode_options = DecodeOptions {
        strict: options.strict_links,
    };

    for (number, mut candidates) in by_number {
        if candidates.len() > 1 {
            let paths: Vec<PathBuf> = candidates.iter().map(|c| c.path.clone()).collect();
            tracing::warn!(%number, ?paths, "Duplicate ticket number");
            tree.warnings.push(LoadWarning::DuplicateNumber { number, paths });
            continue;
        }
        let Some(found) = candidates.pop() else {
            continue;
        };

        let text = match fs.read_file(&root.join(&found.path)).await {
            Ok(text) => text,
            Err(e) => {
                tree.warnings.push(LoadWarning::Unreadable {
                    path: found.path,
                    error: e.to_string(),
                });
                continue;
            }
        };

        let decoded = match trellis_record::decode_with(&text, &decode_options) {
            Ok(decoded) => decoded,
            Err(error) => {
                tracing::warn!(path = %found.path.display(), %error, "Failed to parse ticket");
                tree.warnings.push(LoadWarning::Parse {
                    path: found.path,
                    error,
                });
                continue;
            }
        };

        for warning in decoded.warnings {
            tree.warnings.push(LoadWarning::Ambiguity {
                path: found.path.clone(),
                warning,
            });
        }

        tree.tickets.insert(
            number,
            Ticket {
                number,
                slug: found.slug,
                group_path: found.group_path,
                represents: found.represents,
                path: found.path,
                record: decoded.record,
            },
        );
    }

    check_group_tickets(&mut tree);
    build_graph(&mut tree);

    tracing::debug!(
        tickets = tree.tickets.len(),
        groups = tree.groups.len(),
        edges = tree.graph.edge_count(),
        warnings = tree.warnings.len(),
        "Loaded ticket tree"
    );
    Ok(tree)
}

fn check_group_tickets(tree: &mut LoadedTree) {
    let mut representatives: BTreeMap<&GroupPath, Vec<TicketNumber>> = BTreeMap::new();
    for ticket in tree.tickets.values() {
        if let Some(group) = &ticket.represents {
            representatives.entry(group).or_default().push(ticket.number);
        }
    }
    for (group, numbers) in &representatives {
        if numbers.len() > 1 {
            tree.warnings.push(LoadWarning::ConflictingGroupTicket {
                group: (*group).clone(),
                numbers: numbers.clone(),
            });
        }
    }

    // A group directory named `<number>-<slug>` should hold that ticket.
    for group in &tree.groups {
        let Some(name) = group.name() else {
            continue;
        };
        let Some((number, _)) = placement::parse_file_name(&format!("{name}.{}", placement::TICKET_EXTENSION))
        else {
            continue;
        };
        if let Some(ticket) = tree.tickets.get(&number) {
            if ticket.represents.as_ref() != Some(group) {
                tree.warnings.push(LoadWarning::Misplaced {
                    number,
                    path: ticket.path.clone(),
                    group: group.clone(),
                });
            }
        }
    }
}

fn build_graph(tree: &mut LoadedTree) {
    for &number in tree.tickets.keys() {
        tree.graph.add_node(number);
    }

    for ticket in tree.tickets.values() {
        for relationship in &ticket.record.relationships {
            match tree
                .graph
                .add_edge(ticket.number, relationship.target, relationship.kind.clone())
            {
                Ok(_) => {}
                Err(Error::UnknownTarget(_)) => {
                    tracing::warn!(
                        source = %ticket.number,
                        target = %relationship.target,
                        "Relationship to unknown ticket"
                    );
                    tree.warnings.push(LoadWarning::UnknownTarget {
                        source: ticket.number,
                        target: relationship.target,
                        kind: relationship.kind.clone(),
                    });
                }
                Err(Error::CycleDetected { path }) => {
                    tracing::warn!(
                        source = %ticket.number,
                        target = %relationship.target,
                        "Skipping circular relationship"
                    );
                    tree.warnings.push(LoadWarning::CycleDetected {
                        source: ticket.number,
                        target: relationship.target,
                        kind: relationship.kind.clone(),
                        path,
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Unexpected graph error while loading");
                }
            }
        }
    }
}
