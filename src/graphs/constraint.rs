use std::collections::VecDeque;

use fnv::FnvHashMap;
use fnv::FnvHashSet;

use super::relation_graph::RelationGraph;
use crate::memory_model::AxiomKind;
use crate::memory_model::RelationId;
use crate::model::Edge;
use crate::model::EventId;

/// One memory-model axiom bound to its relation, able to detect violations
/// against the current graph state.
#[derive(Clone, Debug)]
pub(crate) struct Constraint {
    pub(crate) kind: AxiomKind,
    pub(crate) relation: RelationId,
    pub(crate) name: String,
}

/// The edges of the constrained relation whose joint presence constitutes a
/// single violation: a cycle, a self-loop, or a lone member of a relation
/// required to be empty.
#[derive(Clone, Debug)]
pub(crate) struct ViolationWitness {
    pub(crate) edges: Vec<Edge>,
}

impl Constraint {
    pub(crate) fn new(kind: AxiomKind, relation: RelationId, name: String) -> Constraint {
        Constraint {
            kind,
            relation,
            name,
        }
    }

    pub(crate) fn check_for_violations(&self, graph: &RelationGraph) -> bool {
        match self.kind {
            AxiomKind::Emptiness => !graph.is_empty(),
            AxiomKind::Irreflexivity => graph.edges().any(Edge::is_loop),
            AxiomKind::Acyclicity => has_cycle(graph),
        }
    }

    /// Extract one witness per distinct minimal cause. Only called when
    /// [`Constraint::check_for_violations`] reported a violation.
    pub(crate) fn find_witnesses(&self, graph: &RelationGraph) -> Vec<ViolationWitness> {
        match self.kind {
            AxiomKind::Emptiness => {
                let mut edges: Vec<Edge> = graph.edges().collect();
                edges.sort();
                edges
                    .into_iter()
                    .map(|edge| ViolationWitness { edges: vec![edge] })
                    .collect()
            }
            AxiomKind::Irreflexivity => self_loop_witnesses(graph),
            AxiomKind::Acyclicity => {
                let mut witnesses = self_loop_witnesses(graph);
                for component in strongly_connected_components(graph) {
                    if component.len() < 2 {
                        continue;
                    }
                    let cycle = shortest_cycle(graph, &component);
                    witnesses.push(ViolationWitness { edges: cycle });
                }
                witnesses
            }
        }
    }
}

fn self_loop_witnesses(graph: &RelationGraph) -> Vec<ViolationWitness> {
    let mut loops: Vec<Edge> = graph.edges().filter(|edge| edge.is_loop()).collect();
    loops.sort();
    loops
        .into_iter()
        .map(|edge| ViolationWitness { edges: vec![edge] })
        .collect()
}

fn has_cycle(graph: &RelationGraph) -> bool {
    graph.edges().any(|edge| edge.is_loop())
        || strongly_connected_components(graph)
            .iter()
            .any(|component| component.len() > 1)
}

/// Tarjan's algorithm with an explicit stack: recursion depth would otherwise
/// scale with the longest path in the relation.
fn strongly_connected_components(graph: &RelationGraph) -> Vec<Vec<EventId>> {
    struct Frame {
        node: EventId,
        next_successor: usize,
    }

    let mut components = Vec::new();
    let mut index: FnvHashMap<EventId, usize> = FnvHashMap::default();
    let mut low: FnvHashMap<EventId, usize> = FnvHashMap::default();
    let mut on_stack: FnvHashSet<EventId> = FnvHashSet::default();
    let mut stack: Vec<EventId> = Vec::new();
    let mut next_index = 0_usize;

    for root in graph.nodes() {
        if index.contains_key(&root) {
            continue;
        }

        let mut frames = vec![Frame {
            node: root,
            next_successor: 0,
        }];
        let _ = index.insert(root, next_index);
        let _ = low.insert(root, next_index);
        next_index += 1;
        stack.push(root);
        let _ = on_stack.insert(root);

        while let Some(frame) = frames.last_mut() {
            let node = frame.node;
            let successors = graph.successors(node);

            if frame.next_successor < successors.len() {
                let successor = successors[frame.next_successor];
                frame.next_successor += 1;

                if !index.contains_key(&successor) {
                    let _ = index.insert(successor, next_index);
                    let _ = low.insert(successor, next_index);
                    next_index += 1;
                    stack.push(successor);
                    let _ = on_stack.insert(successor);
                    frames.push(Frame {
                        node: successor,
                        next_successor: 0,
                    });
                } else if on_stack.contains(&successor) {
                    let bound = index[&successor].min(low[&node]);
                    let _ = low.insert(node, bound);
                }
                continue;
            }

            let _ = frames.pop();
            if low[&node] == index[&node] {
                let mut component = Vec::new();
                loop {
                    let member = stack.pop().expect("scc stack exhausted early");
                    let _ = on_stack.remove(&member);
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                component.sort();
                components.push(component);
            }
            if let Some(parent) = frames.last() {
                let bound = low[&node].min(low[&parent.node]);
                let _ = low.insert(parent.node, bound);
            }
        }
    }

    components
}

/// A shortest cycle within the given strongly connected component, found by
/// breadth-first search from each member in id order.
fn shortest_cycle(graph: &RelationGraph, component: &[EventId]) -> Vec<Edge> {
    let members: FnvHashSet<EventId> = component.iter().copied().collect();
    let mut best: Option<Vec<Edge>> = None;

    for &start in component {
        if let Some(cycle) = bfs_cycle_through(graph, &members, start) {
            if best.as_ref().map_or(true, |b| cycle.len() < b.len()) {
                best = Some(cycle);
            }
        }
    }

    best.expect("nontrivial scc without a cycle")
}

fn bfs_cycle_through(
    graph: &RelationGraph,
    members: &FnvHashSet<EventId>,
    start: EventId,
) -> Option<Vec<Edge>> {
    let mut parent: FnvHashMap<EventId, EventId> = FnvHashMap::default();
    let mut queue: VecDeque<EventId> = VecDeque::new();
    queue.push_back(start);

    while let Some(node) = queue.pop_front() {
        for &successor in graph.successors(node) {
            if !members.contains(&successor) {
                continue;
            }
            if successor == start {
                let mut edges = vec![Edge::new(node, start)];
                let mut current = node;
                while current != start {
                    let previous = parent[&current];
                    edges.push(Edge::new(previous, current));
                    current = previous;
                }
                edges.reverse();
                return Some(edges);
            }
            if !parent.contains_key(&successor) {
                let _ = parent.insert(successor, node);
                queue.push_back(successor);
            }
        }
    }

    None
}
