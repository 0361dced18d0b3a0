use fnv::FnvHashMap;

use crate::basic_types::Timestamp;
use crate::model::Edge;
use crate::model::EventId;
use crate::weft_assert_moderate;

const NO_NEIGHBOURS: &[EventId] = &[];

/// The materialisation of one relation: a timestamped edge set with
/// adjacency lists and an insertion trail.
///
/// Undo is trail-based: [`RelationGraph::backtrack_to`] pops the trail suffix
/// stamped at or after the cutoff. The search discipline guarantees trail
/// stamps are nondecreasing (a frame backtracks every newer stamp before
/// committing at its own), so the suffix is exactly the set of edges to
/// remove and the graph is restored bit for bit.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct RelationGraph {
    edges: FnvHashMap<Edge, Timestamp>,
    successors: FnvHashMap<EventId, Vec<EventId>>,
    predecessors: FnvHashMap<EventId, Vec<EventId>>,
    trail: Vec<(Edge, Timestamp)>,
}

impl RelationGraph {
    pub(crate) fn contains(&self, edge: Edge) -> bool {
        self.edges.contains_key(&edge)
    }

    pub(crate) fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub(crate) fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edges.keys().copied()
    }

    /// Every event with at least one outgoing or incoming edge, in id order.
    pub(crate) fn nodes(&self) -> Vec<EventId> {
        let mut nodes: Vec<EventId> = self
            .successors
            .keys()
            .chain(self.predecessors.keys())
            .copied()
            .collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }

    pub(crate) fn successors(&self, event: EventId) -> &[EventId] {
        self.successors
            .get(&event)
            .map_or(NO_NEIGHBOURS, Vec::as_slice)
    }

    pub(crate) fn predecessors(&self, event: EventId) -> &[EventId] {
        self.predecessors
            .get(&event)
            .map_or(NO_NEIGHBOURS, Vec::as_slice)
    }

    /// Insert `edge` stamped with `time`. Returns false if the edge is
    /// already present (the existing, necessarily older, stamp is kept).
    pub(crate) fn try_insert(&mut self, edge: Edge, time: Timestamp) -> bool {
        if self.contains(edge) {
            return false;
        }
        let _ = self.edges.insert(edge, time);
        self.successors.entry(edge.first).or_default().push(edge.second);
        self.predecessors.entry(edge.second).or_default().push(edge.first);
        self.trail.push((edge, time));
        true
    }

    /// Remove every edge stamped at `cutoff` or later.
    pub(crate) fn backtrack_to(&mut self, cutoff: Timestamp) {
        while let Some(&(edge, time)) = self.trail.last() {
            if time < cutoff {
                break;
            }
            let _ = self.trail.pop();
            let _ = self.edges.remove(&edge);
            Self::remove_neighbour(&mut self.successors, edge.first, edge.second);
            Self::remove_neighbour(&mut self.predecessors, edge.second, edge.first);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.edges.clear();
        self.successors.clear();
        self.predecessors.clear();
        self.trail.clear();
    }

    fn remove_neighbour(
        adjacency: &mut FnvHashMap<EventId, Vec<EventId>>,
        from: EventId,
        to: EventId,
    ) {
        let neighbours = adjacency
            .get_mut(&from)
            .expect("trail entry without adjacency entry");
        // The trail unwinds in reverse insertion order, so the entry to drop
        // sits at the tail of its adjacency list.
        weft_assert_moderate!(neighbours.last() == Some(&to));
        let _ = neighbours.pop();
        if neighbours.is_empty() {
            let _ = adjacency.remove(&from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RelationGraph;
    use crate::basic_types::Timestamp;
    use crate::model::Edge;
    use crate::model::EventId;

    fn edge(first: u32, second: u32) -> Edge {
        Edge::new(EventId::new(first), EventId::new(second))
    }

    #[test]
    fn insert_is_idempotent() {
        let mut graph = RelationGraph::default();

        assert!(graph.try_insert(edge(0, 1), Timestamp::ZERO));
        assert!(!graph.try_insert(edge(0, 1), Timestamp::ZERO.next()));
        assert_eq!(graph.num_edges(), 1);
    }

    #[test]
    fn backtrack_restores_previous_state_exactly() {
        let mut graph = RelationGraph::default();
        let t1 = Timestamp::ZERO.next();
        assert!(graph.try_insert(edge(0, 1), Timestamp::ZERO));
        assert!(graph.try_insert(edge(1, 2), Timestamp::ZERO));

        let snapshot = graph.clone();

        assert!(graph.try_insert(edge(0, 2), t1));
        assert!(graph.try_insert(edge(1, 3), t1.next()));
        graph.backtrack_to(t1);

        assert_eq!(graph, snapshot);
    }

    #[test]
    fn backtrack_keeps_older_stamps() {
        let mut graph = RelationGraph::default();
        let t1 = Timestamp::ZERO.next();
        assert!(graph.try_insert(edge(0, 1), Timestamp::ZERO));
        assert!(graph.try_insert(edge(1, 2), t1));

        graph.backtrack_to(t1.next());

        assert!(graph.contains(edge(0, 1)));
        assert!(graph.contains(edge(1, 2)));
    }

    #[test]
    fn adjacency_tracks_insertions_and_removals() {
        let mut graph = RelationGraph::default();
        let t1 = Timestamp::ZERO.next();
        assert!(graph.try_insert(edge(0, 1), Timestamp::ZERO));
        assert!(graph.try_insert(edge(0, 2), t1));

        assert_eq!(
            graph.successors(EventId::new(0)),
            &[EventId::new(1), EventId::new(2)]
        );

        graph.backtrack_to(t1);
        assert_eq!(graph.successors(EventId::new(0)), &[EventId::new(1)]);
        assert!(graph.predecessors(EventId::new(2)).is_empty());
    }
}
