//! Relationship graph over ticket numbers, using petgraph.
//!
//! Edges point from the ticket that holds a relationship to its target, and
//! carry the relationship kind. Ordering kinds (`BLOCKS`, `BLOCKED_BY`,
//! `CAUSES`, `CAUSED_BY`) each imply an arc "this must happen before that";
//! the graph keeps those arcs acyclic.
//!
//! # Edge Direction Reminder
//!
//! - `2 BLOCKS 1` is the edge `2 -> 1` and the arc `2 before 1`
//! - `1 BLOCKED_BY 2` is the edge `1 -> 2` and the same arc `2 before 1`

use crate::domain::{RelationshipKind, TicketNumber};
use crate::error::{Error, Result, Target};
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use trellis_record::ArcDirection;

/// A directed, typed edge between two tickets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    /// Ticket holding the relationship
    pub source: TicketNumber,
    /// Ticket it points at
    pub target: TicketNumber,
    /// Relationship type
    pub kind: RelationshipKind,
}

impl Edge {
    /// Creates an edge.
    pub fn new(source: TicketNumber, target: TicketNumber, kind: RelationshipKind) -> Self {
        Self {
            source,
            target,
            kind,
        }
    }

    /// The `(before, after)` arc this edge implies, if it is an ordering edge.
    pub fn arc(&self) -> Option<(TicketNumber, TicketNumber)> {
        match self.kind.ordering()? {
            ArcDirection::SourceFirst => Some((self.source, self.target)),
            ArcDirection::TargetFirst => Some((self.target, self.source)),
        }
    }
}

#[derive(Debug, Clone)]
struct EdgeData {
    kind: RelationshipKind,
    /// Insertion sequence, used to make traversal order deterministic
    seq: u64,
}

/// Which edges a traversal may follow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EdgeFilter {
    /// Every edge
    #[default]
    All,
    /// Only ordering edges
    Ordering,
    /// Only edges of these kinds
    Kinds(Vec<RelationshipKind>),
}

impl EdgeFilter {
    fn matches(&self, kind: &RelationshipKind) -> bool {
        match self {
            Self::All => true,
            Self::Ordering => kind.is_hierarchical(),
            Self::Kinds(kinds) => kinds.contains(kind),
        }
    }
}

/// Directed multigraph of relationships keyed by ticket number.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    graph: StableDiGraph<TicketNumber, EdgeData>,
    node_map: HashMap<TicketNumber, NodeIndex>,
    next_seq: u64,
}

impl RelationshipGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a ticket. Returns `false` if it was already present.
    pub fn add_node(&mut self, number: TicketNumber) -> bool {
        if self.node_map.contains_key(&number) {
            return false;
        }
        let node = self.graph.add_node(number);
        self.node_map.insert(number, node);
        true
    }

    /// Whether the ticket is in the graph.
    pub fn contains(&self, number: TicketNumber) -> bool {
        self.node_map.contains_key(&number)
    }

    /// Number of tickets.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn node(&self, number: TicketNumber) -> Option<NodeIndex> {
        self.node_map.get(&number).copied()
    }

    fn find_edge(
        &self,
        source: TicketNumber,
        target: TicketNumber,
        kind: &RelationshipKind,
    ) -> Option<EdgeIndex> {
        let (from, to) = (self.node(source)?, self.node(target)?);
        self.graph
            .edges_directed(from, Direction::Outgoing)
            .find(|edge| edge.target() == to && &edge.weight().kind == kind)
            .map(|edge| edge.id())
    }

    /// Whether this exact edge exists.
    pub fn has_edge(&self, source: TicketNumber, target: TicketNumber, kind: &RelationshipKind) -> bool {
        self.find_edge(source, target, kind).is_some()
    }

    /// Adds an edge. Returns `false` if the identical edge already exists.
    ///
    /// Ordering edges are checked first: if the arc they imply would close a
    /// cycle, nothing changes.
    ///
    /// # Errors
    ///
    /// - [`Error::TicketNotFound`] if `source` is not in the graph
    /// - [`Error::UnknownTarget`] if `target` is not in the graph
    /// - [`Error::CycleDetected`] with the cycle, first ticket repeated at the end
    pub fn add_edge(
        &mut self,
        source: TicketNumber,
        target: TicketNumber,
        kind: RelationshipKind,
    ) -> Result<bool> {
        let from = self.node(source).ok_or(Error::TicketNotFound(source))?;
        let to = self
            .node(target)
            .ok_or(Error::UnknownTarget(Target::Ticket(target)))?;

        if self.has_edge(source, target, &kind) {
            return Ok(false);
        }

        let edge = Edge::new(source, target, kind);
        if let Some((before, after)) = edge.arc() {
            if let Some(mut path) = self.ordering_path(after, before) {
                // `after` already reaches `before`; the new arc closes the loop.
                path.insert(0, before);
                tracing::debug!(?path, "Rejected circular relationship");
                return Err(Error::CycleDetected { path });
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.graph.add_edge(from, to, EdgeData { kind: edge.kind, seq });
        Ok(true)
    }

    /// Removes an edge. Returns `false` if it did not exist.
    pub fn remove_edge(
        &mut self,
        source: TicketNumber,
        target: TicketNumber,
        kind: &RelationshipKind,
    ) -> bool {
        match self.find_edge(source, target, kind) {
            Some(edge) => self.graph.remove_edge(edge).is_some(),
            None => false,
        }
    }

    fn sorted_edges(&self, number: TicketNumber, direction: Direction) -> Vec<(u64, Edge)> {
        let Some(node) = self.node(number) else {
            return Vec::new();
        };
        let mut edges: Vec<(u64, Edge)> = self
            .graph
            .edges_directed(node, direction)
            .map(|edge| {
                (
                    edge.weight().seq,
                    Edge::new(
                        self.graph[edge.source()],
                        self.graph[edge.target()],
                        edge.weight().kind.clone(),
                    ),
                )
            })
            .collect();
        edges.sort_by_key(|(seq, _)| *seq);
        edges
    }

    /// Edges held by `number`, in insertion order.
    pub fn edges_from(&self, number: TicketNumber) -> Vec<Edge> {
        self.sorted_edges(number, Direction::Outgoing)
            .into_iter()
            .map(|(_, edge)| edge)
            .collect()
    }

    /// Edges pointing at `number`, in insertion order.
    pub fn edges_to(&self, number: TicketNumber) -> Vec<Edge> {
        self.sorted_edges(number, Direction::Incoming)
            .into_iter()
            .map(|(_, edge)| edge)
            .collect()
    }

    /// Every edge, in insertion order.
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<(u64, Edge)> = self
            .graph
            .edge_indices()
            .filter_map(|index| {
                let (source, target) = self.graph.edge_endpoints(index)?;
                let data = self.graph.edge_weight(index)?;
                Some((
                    data.seq,
                    Edge::new(self.graph[source], self.graph[target], data.kind.clone()),
                ))
            })
            .collect();
        edges.sort_by_key(|(seq, _)| *seq);
        edges.into_iter().map(|(_, edge)| edge).collect()
    }

    /// Tickets reachable from `from` along edges accepted by `filter`.
    ///
    /// `Direction::Outgoing` follows edges source to target, `Incoming`
    /// follows them backwards. Breadth-first; ties are broken by edge
    /// insertion order. The start ticket is not included.
    pub fn reachable(
        &self,
        from: TicketNumber,
        filter: &EdgeFilter,
        direction: Direction,
    ) -> Vec<TicketNumber> {
        self.bfs(from, |number| {
            self.sorted_edges(number, direction)
                .into_iter()
                .filter(|(_, edge)| filter.matches(&edge.kind))
                .map(|(_, edge)| match direction {
                    Direction::Outgoing => edge.target,
                    Direction::Incoming => edge.source,
                })
                .collect()
        })
    }

    /// Tickets that must come after `number`: everything it transitively
    /// blocks or causes.
    pub fn after(&self, number: TicketNumber) -> Vec<TicketNumber> {
        self.bfs(number, |n| self.arc_neighbors(n, true))
    }

    /// Tickets that must come before `number`: everything transitively
    /// blocking or causing it.
    pub fn before(&self, number: TicketNumber) -> Vec<TicketNumber> {
        self.bfs(number, |n| self.arc_neighbors(n, false))
    }

    /// Neighbours of `number` along ordering arcs, in edge insertion order.
    ///
    /// With `forward`, returns tickets that `number` comes before.
    fn arc_neighbors(&self, number: TicketNumber, forward: bool) -> Vec<TicketNumber> {
        let mut edges = self.sorted_edges(number, Direction::Outgoing);
        edges.extend(self.sorted_edges(number, Direction::Incoming));
        edges.sort_by_key(|(seq, _)| *seq);

        edges
            .into_iter()
            .filter_map(|(_, edge)| edge.arc())
            .filter_map(|(before, after)| {
                if forward && before == number {
                    Some(after)
                } else if !forward && after == number {
                    Some(before)
                } else {
                    None
                }
            })
            .collect()
    }

    fn bfs<F>(&self, start: TicketNumber, neighbors: F) -> Vec<TicketNumber>
    where
        F: Fn(TicketNumber) -> Vec<TicketNumber>,
    {
        let mut visited = HashSet::from([start]);
        let mut order = Vec::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for next in neighbors(current) {
                if visited.insert(next) {
                    order.push(next);
                    queue.push_back(next);
                }
            }
        }
        order
    }

    /// Shortest chain of ordering arcs from `from` to `to`, both included.
    ///
    /// Only explores what is reachable from `from`.
    fn ordering_path(&self, from: TicketNumber, to: TicketNumber) -> Option<Vec<TicketNumber>> {
        if from == to {
            return Some(vec![from]);
        }

        let mut parents: HashMap<TicketNumber, TicketNumber> = HashMap::new();
        let mut queue = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            for next in self.arc_neighbors(current, true) {
                if next == from || parents.contains_key(&next) {
                    continue;
                }
                parents.insert(next, current);
                if next == to {
                    let mut path = vec![to];
                    let mut step = to;
                    while let Some(&parent) = parents.get(&step) {
                        path.push(parent);
                        step = parent;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Removes a ticket and all its edges.
    ///
    /// Returns the edges other tickets held towards it; those relationships
    /// now dangle and the caller decides what to do with them.
    pub fn remove_ticket(&mut self, number: TicketNumber) -> Vec<Edge> {
        let dangling: Vec<Edge> = self
            .edges_to(number)
            .into_iter()
            .filter(|edge| edge.source != number)
            .collect();
        if let Some(node) = self.node_map.remove(&number) {
            self.graph.remove_node(node);
        }
        dangling
    }

    /// Gives a ticket a new number, keeping every edge attached.
    ///
    /// # Errors
    ///
    /// - [`Error::TicketNotFound`] if `old` is not in the graph
    /// - [`Error::DuplicateNumber`] if `new` is already taken
    pub fn renumber(&mut self, old: TicketNumber, new: TicketNumber) -> Result<()> {
        if old == new {
            return Ok(());
        }
        if self.contains(new) {
            return Err(Error::DuplicateNumber {
                number: new,
                paths: Vec::new(),
            });
        }
        let node = self.node_map.remove(&old).ok_or(Error::TicketNotFound(old))?;
        self.graph[node] = new;
        self.node_map.insert(new, node);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn n(value: u64) -> TicketNumber {
        TicketNumber(value)
    }

    fn graph_with(numbers: &[u64]) -> RelationshipGraph {
        let mut graph = RelationshipGraph::new();
        for &number in numbers {
            graph.add_node(n(number));
        }
        graph
    }

    #[test]
    fn test_add_edge_and_duplicate() {
        let mut graph = graph_with(&[1, 2]);
        assert!(graph.add_edge(n(2), n(1), RelationshipKind::Blocks).unwrap());
        assert!(!graph.add_edge(n(2), n(1), RelationshipKind::Blocks).unwrap());
        assert!(graph.add_edge(n(2), n(1), RelationshipKind::References).unwrap());
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_unknown_endpoints() {
        let mut graph = graph_with(&[1]);
        assert!(matches!(
            graph.add_edge(n(1), n(5), RelationshipKind::Blocks),
            Err(Error::UnknownTarget(Target::Ticket(t))) if t == n(5)
        ));
        assert!(matches!(
            graph.add_edge(n(5), n(1), RelationshipKind::Blocks),
            Err(Error::TicketNotFound(t)) if t == n(5)
        ));
    }

    #[test]
    fn test_reverse_blocks_is_a_cycle_and_graph_is_unchanged() {
        let mut graph = graph_with(&[1, 2]);
        graph.add_edge(n(2), n(1), RelationshipKind::Blocks).unwrap();

        let err = graph.add_edge(n(1), n(2), RelationshipKind::Blocks).unwrap_err();
        match err {
            Error::CycleDetected { path } => assert_eq!(path, vec![n(1), n(2), n(1)]),
            other => panic!("Expected CycleDetected, got {other:?}"),
        }
        assert_eq!(graph.edges(), vec![Edge::new(n(2), n(1), RelationshipKind::Blocks)]);
    }

    #[test]
    fn test_reciprocal_edge_is_not_a_cycle() {
        let mut graph = graph_with(&[1, 2]);
        graph.add_edge(n(2), n(1), RelationshipKind::Blocks).unwrap();
        assert!(graph.add_edge(n(1), n(2), RelationshipKind::BlockedBy).unwrap());
    }

    #[test]
    fn test_mixed_kinds_form_a_cycle() {
        // 1 before 2 (BLOCKS), 2 before 3 (3 CAUSED_BY 2), then 1 BLOCKED_BY 3 means 3 before 1.
        let mut graph = graph_with(&[1, 2, 3]);
        graph.add_edge(n(1), n(2), RelationshipKind::Blocks).unwrap();
        graph.add_edge(n(3), n(2), RelationshipKind::CausedBy).unwrap();
        let err = graph.add_edge(n(1), n(3), RelationshipKind::BlockedBy).unwrap_err();
        match err {
            Error::CycleDetected { path } => assert_eq!(path, vec![n(3), n(1), n(2), n(3)]),
            other => panic!("Expected CycleDetected, got {other:?}"),
        }
    }

    #[test]
    fn test_informational_kinds_may_cycle() {
        let mut graph = graph_with(&[1, 2]);
        graph.add_edge(n(1), n(2), RelationshipKind::RelatesTo).unwrap();
        graph.add_edge(n(2), n(1), RelationshipKind::RelatesTo).unwrap();
        graph.add_edge(n(1), n(1), RelationshipKind::References).unwrap();
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_ordering_self_edge_is_a_cycle() {
        let mut graph = graph_with(&[4]);
        let err = graph.add_edge(n(4), n(4), RelationshipKind::Blocks).unwrap_err();
        assert!(matches!(err, Error::CycleDetected { ref path } if path == &vec![n(4), n(4)]));
    }

    #[test]
    fn test_before_and_after() {
        // 3 blocks 2 blocks 1; 4 relates to 1
        let mut graph = graph_with(&[1, 2, 3, 4]);
        graph.add_edge(n(3), n(2), RelationshipKind::Blocks).unwrap();
        graph.add_edge(n(1), n(2), RelationshipKind::BlockedBy).unwrap();
        graph.add_edge(n(4), n(1), RelationshipKind::RelatesTo).unwrap();

        assert_eq!(graph.before(n(1)), vec![n(2), n(3)]);
        assert_eq!(graph.after(n(3)), vec![n(2), n(1)]);
        assert!(graph.before(n(4)).is_empty());
    }

    #[test]
    fn test_reachable_respects_filter_and_direction() {
        let mut graph = graph_with(&[1, 2, 3]);
        graph.add_edge(n(1), n(2), RelationshipKind::References).unwrap();
        graph.add_edge(n(2), n(3), RelationshipKind::Blocks).unwrap();

        assert_eq!(graph.reachable(n(1), &EdgeFilter::All, Direction::Outgoing), vec![n(2), n(3)]);
        assert!(graph.reachable(n(1), &EdgeFilter::Ordering, Direction::Outgoing).is_empty());
        assert_eq!(graph.reachable(n(3), &EdgeFilter::All, Direction::Incoming), vec![n(2), n(1)]);
        assert_eq!(
            graph.reachable(n(2), &EdgeFilter::Kinds(vec![RelationshipKind::Blocks]), Direction::Outgoing),
            vec![n(3)]
        );
    }

    #[test]
    fn test_remove_ticket_reports_dangling_edges() {
        let mut graph = graph_with(&[1, 2, 3]);
        graph.add_edge(n(2), n(1), RelationshipKind::Blocks).unwrap();
        graph.add_edge(n(3), n(1), RelationshipKind::References).unwrap();
        graph.add_edge(n(1), n(3), RelationshipKind::RelatesTo).unwrap();

        let dangling = graph.remove_ticket(n(1));
        assert_eq!(
            dangling,
            vec![
                Edge::new(n(2), n(1), RelationshipKind::Blocks),
                Edge::new(n(3), n(1), RelationshipKind::References),
            ]
        );
        assert!(!graph.contains(n(1)));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_renumber_keeps_edges() {
        let mut graph = graph_with(&[1, 2]);
        graph.add_edge(n(2), n(1), RelationshipKind::Blocks).unwrap();
        graph.renumber(n(1), n(10)).unwrap();

        assert_eq!(graph.edges(), vec![Edge::new(n(2), n(10), RelationshipKind::Blocks)]);
        assert!(matches!(graph.renumber(n(2), n(10)), Err(Error::DuplicateNumber { .. })));
    }

    fn ordering_kind() -> impl Strategy<Value = RelationshipKind> {
        prop_oneof![
            Just(RelationshipKind::Blocks),
            Just(RelationshipKind::BlockedBy),
            Just(RelationshipKind::Causes),
            Just(RelationshipKind::CausedBy),
        ]
    }

    /// Kahn's algorithm over the ordering arcs.
    fn arcs_are_acyclic(graph: &RelationshipGraph, nodes: u64) -> bool {
        let arcs: Vec<(TicketNumber, TicketNumber)> =
            graph.edges().iter().filter_map(Edge::arc).collect();
        let mut indegree: HashMap<TicketNumber, usize> = (1..=nodes).map(|i| (n(i), 0)).collect();
        for (_, after) in &arcs {
            *indegree.entry(*after).or_default() += 1;
        }
        let mut ready: Vec<TicketNumber> =
            indegree.iter().filter(|(_, d)| **d == 0).map(|(k, _)| *k).collect();
        let mut seen = 0;
        while let Some(node) = ready.pop() {
            seen += 1;
            for (before, after) in &arcs {
                if *before == node {
                    let degree = indegree.entry(*after).or_default();
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(*after);
                    }
                }
            }
        }
        seen == indegree.len()
    }

    proptest! {
        #[test]
        fn prop_ordering_arcs_stay_acyclic(
            edges in prop::collection::vec((1u64..8, 1u64..8, ordering_kind()), 0..40)
        ) {
            let mut graph = graph_with(&[1, 2, 3, 4, 5, 6, 7]);
            for (source, target, kind) in edges {
                let before = graph.edges();
                match graph.add_edge(n(source), n(target), kind) {
                    Ok(_) => {}
                    Err(Error::CycleDetected { path }) => {
                        prop_assert_eq!(path.first(), path.last());
                        prop_assert_eq!(graph.edges(), before);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {other}"),
                }
                prop_assert!(arcs_are_acyclic(&graph, 7));
            }
        }
    }
}
