//! The ticket store.
//!
//! [`TicketStore`] owns every loaded ticket plus the relationship graph built
//! from them. It is loaded once from a ticket root and reloaded before every
//! mutation, so changes made by other processes (or by hand) are picked up
//! before anything is written.
//!
//! Mutations validate fully before the first write. A rejected operation
//! leaves both the files and the in-memory state untouched.

mod load;
mod ops;

pub use load::LoadWarning;

use crate::domain::{GroupPath, LinkDirection, RelatedTicket, Ticket, TicketNumber};
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::graph::RelationshipGraph;
use crate::placement;
use crate::query::Query;
use crate::vcs::VersionControl;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Behaviour switches for a [`TicketStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Reject unknown relationship types instead of keeping them with a warning
    pub strict_links: bool,

    /// Commit every mutation through the version-control collaborator
    pub auto_commit: bool,

    /// Prepended to ticket branch names by [`TicketStore::start`]
    pub branch_prefix: String,
}

/// In-memory view of a ticket tree.
pub struct TicketStore {
    root: PathBuf,
    fs: Arc<dyn FileSystem>,
    vcs: Arc<dyn VersionControl>,
    options: StoreOptions,
    tickets: BTreeMap<TicketNumber, Ticket>,
    groups: BTreeSet<GroupPath>,
    graph: RelationshipGraph,
    /// Numbers taken by files on disk, including ones that failed to load
    claimed: BTreeSet<TicketNumber>,
    /// Highest number ever handed out or seen by this process
    high_water: Option<TicketNumber>,
    warnings: Vec<LoadWarning>,
}

impl fmt::Debug for TicketStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TicketStore")
            .field("root", &self.root)
            .field("options", &self.options)
            .field("tickets", &self.tickets.len())
            .field("groups", &self.groups.len())
            .field("edges", &self.graph.edge_count())
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}

impl TicketStore {
    /// Loads every ticket under `root`.
    ///
    /// Broken tickets do not stop the load; see [`TicketStore::warnings`].
    ///
    /// # Errors
    ///
    /// Fails only if `root` itself cannot be listed.
    pub async fn load(
        root: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        vcs: Arc<dyn VersionControl>,
        options: StoreOptions,
    ) -> Result<Self> {
        let mut store = Self {
            root: root.into(),
            fs,
            vcs,
            options,
            tickets: BTreeMap::new(),
            groups: BTreeSet::new(),
            graph: RelationshipGraph::new(),
            claimed: BTreeSet::new(),
            high_water: None,
            warnings: Vec::new(),
        };
        store.refresh().await?;
        Ok(store)
    }

    /// Reloads the tree from disk, replacing all in-memory state.
    ///
    /// The high-water mark survives, so numbers are not reused even if the
    /// tickets that held them have disappeared.
    ///
    /// # Errors
    ///
    /// Fails only if the ticket root cannot be listed.
    pub async fn refresh(&mut self) -> Result<()> {
        let tree = load::load_tree(self.fs.as_ref(), &self.root, &self.options).await?;
        for warning in &tree.warnings {
            tracing::debug!(kind = warning.kind(), "{warning}");
        }

        self.high_water = self.high_water.max(tree.claimed.last().copied());
        self.tickets = tree.tickets;
        self.groups = tree.groups;
        self.graph = tree.graph;
        self.claimed = tree.claimed;
        self.warnings = tree.warnings;
        Ok(())
    }

    /// The ticket root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The options the store was loaded with.
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Problems found by the last load.
    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }

    /// Looks up a ticket.
    pub fn get(&self, number: TicketNumber) -> Option<&Ticket> {
        self.tickets.get(&number)
    }

    /// Looks up a ticket that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TicketNotFound`] if there is no such ticket.
    pub fn ticket(&self, number: TicketNumber) -> Result<&Ticket> {
        self.get(number).ok_or(Error::TicketNotFound(number))
    }

    /// Every loaded ticket, by number.
    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.tickets.values()
    }

    /// Number of loaded tickets.
    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    /// Whether no ticket is loaded.
    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Every group directory, outermost first.
    pub fn groups(&self) -> impl Iterator<Item = &GroupPath> {
        self.groups.iter()
    }

    /// Whether `group` exists. The root always does.
    pub fn has_group(&self, group: &GroupPath) -> bool {
        group.is_root() || self.groups.contains(group)
    }

    /// The relationship graph.
    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    /// The ticket standing for `group`, if it has one.
    ///
    /// When several tickets claim the group, the lowest number wins.
    pub fn group_ticket(&self, group: &GroupPath) -> Option<&Ticket> {
        self.tickets
            .values()
            .find(|ticket| ticket.represents.as_ref() == Some(group))
    }

    /// The number the next created ticket would get.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NumbersExhausted`] once the largest number is taken.
    pub fn next_number(&self) -> Result<TicketNumber> {
        placement::next_number(self.claimed.iter().copied(), self.high_water)
            .ok_or(Error::NumbersExhausted(TicketNumber(u64::MAX)))
    }

    /// Relationships a ticket holds, followed by the ones pointing at it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TicketNotFound`] if there is no such ticket.
    pub fn relationships_of(&self, number: TicketNumber) -> Result<Vec<RelatedTicket>> {
        self.ticket(number)?;

        let outgoing = self.graph.edges_from(number).into_iter().map(|edge| RelatedTicket {
            number: edge.target,
            kind: edge.kind,
            direction: LinkDirection::Outgoing,
        });
        let incoming = self.graph.edges_to(number).into_iter().map(|edge| RelatedTicket {
            number: edge.source,
            kind: edge.kind,
            direction: LinkDirection::Incoming,
        });
        Ok(outgoing.chain(incoming).collect())
    }

    /// Every ticket that must be done before `number`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TicketNotFound`] if there is no such ticket.
    pub fn blockers(&self, number: TicketNumber) -> Result<Vec<TicketNumber>> {
        self.ticket(number)?;
        Ok(self.graph.before(number))
    }

    /// Every ticket waiting on `number`, nearest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TicketNotFound`] if there is no such ticket.
    pub fn dependents(&self, number: TicketNumber) -> Result<Vec<TicketNumber>> {
        self.ticket(number)?;
        Ok(self.graph.after(number))
    }

    /// Tickets matching `query`, in the query's order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if a regex predicate does not compile.
    pub fn search(&self, query: &Query) -> Result<Vec<&Ticket>> {
        query.run(self)
    }

    /// The single ticket matching `query`.
    ///
    /// # Errors
    ///
    /// - [`Error::NoResult`] if nothing matches
    /// - [`Error::AmbiguousResult`] if more than one ticket matches
    pub fn search_one(&self, query: &Query) -> Result<&Ticket> {
        let mut found = self.search(query)?;
        match found.len() {
            0 => Err(Error::NoResult),
            1 => Ok(found.remove(0)),
            _ => Err(Error::AmbiguousResult {
                numbers: found.iter().map(|ticket| ticket.number).collect(),
            }),
        }
    }

    fn absolute(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RelationshipKind;
    use crate::fs::MemoryFs;
    use crate::vcs::NoVcs;

    pub(super) const ROOT: &str = "/repo/.trellis/tickets";

    pub(super) async fn store_with(files: &[(&str, &str)]) -> (Arc<MemoryFs>, TicketStore) {
        let fs = Arc::new(MemoryFs::new());
        fs.create_dir(Path::new(ROOT)).await.unwrap();
        for (path, text) in files {
            fs.insert(Path::new(ROOT).join(path), *text).await;
        }
        let store = TicketStore::load(ROOT, fs.clone(), Arc::new(NoVcs), StoreOptions::default())
            .await
            .unwrap();
        (fs, store)
    }

    #[tokio::test]
    async fn test_relationships_of_lists_both_directions() {
        let (_, store) = store_with(&[
            ("1-a.md", "# A\n"),
            ("2-b.md", "# B\n\n[a]: 1 (BLOCKS)\n"),
            ("3-c.md", "# C\n\n[b]: 2 (REFERENCES)\n"),
        ])
        .await;

        let related = store.relationships_of(TicketNumber(2)).unwrap();
        assert_eq!(
            related,
            vec![
                RelatedTicket {
                    number: TicketNumber(1),
                    kind: RelationshipKind::Blocks,
                    direction: LinkDirection::Outgoing,
                },
                RelatedTicket {
                    number: TicketNumber(3),
                    kind: RelationshipKind::References,
                    direction: LinkDirection::Incoming,
                },
            ]
        );
        assert!(matches!(
            store.relationships_of(TicketNumber(9)),
            Err(Error::TicketNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_blockers_and_dependents_are_transitive() {
        let (_, store) = store_with(&[
            ("1-a.md", "# A\n"),
            ("2-b.md", "# B\n\n[a]: 1 (BLOCKS)\n"),
            ("3-c.md", "# C\n\n[b]: 2 (BLOCKED_BY)\n"),
        ])
        .await;

        // 2 comes before both 1 and 3.
        assert_eq!(store.blockers(TicketNumber(1)).unwrap(), vec![TicketNumber(2)]);
        assert_eq!(
            store.dependents(TicketNumber(2)).unwrap(),
            vec![TicketNumber(1), TicketNumber(3)]
        );
        assert!(store.blockers(TicketNumber(2)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_group_ticket_lookup() {
        let (_, store) = store_with(&[("8-foo/8-foo.md", "# Foo\n"), ("8-foo/9-bar.md", "# Bar\n")]).await;
        let group = GroupPath::parse("8-foo").unwrap();
        assert_eq!(store.group_ticket(&group).map(|t| t.number), Some(TicketNumber(8)));
        assert!(store.has_group(&group));
        assert!(store.has_group(&GroupPath::root()));
        assert!(!store.has_group(&GroupPath::parse("other").unwrap()));
    }

    #[tokio::test]
    async fn test_next_number_counts_broken_tickets() {
        let (_, store) = store_with(&[("1-a.md", "# A\n"), ("5-broken.md", "no title here\n")]).await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.next_number().unwrap(), TicketNumber(6));
    }

    #[tokio::test]
    async fn test_refresh_keeps_high_water_mark() {
        let (fs, mut store) = store_with(&[("4-a.md", "# A\n")]).await;
        assert_eq!(store.next_number().unwrap(), TicketNumber(5));

        fs.move_path(
            &Path::new(ROOT).join("4-a.md"),
            Path::new("/repo/elsewhere.md"),
        )
        .await
        .unwrap();
        store.refresh().await.unwrap();

        assert!(store.is_empty());
        assert_eq!(store.next_number().unwrap(), TicketNumber(5));
    }
}
