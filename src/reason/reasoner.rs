use std::collections::VecDeque;

use fnv::FnvHashMap;
use fnv::FnvHashSet;

use super::CoreLiteral;
use crate::graphs::Constraint;
use crate::graphs::ExecutionGraph;
use crate::graphs::RelationGraph;
use crate::logic::Conjunction;
use crate::logic::Dnf;
use crate::memory_model::BaseRelation;
use crate::memory_model::Derivation;
use crate::memory_model::RelationId;
use crate::model::Edge;
use crate::model::EventId;

/// Computes, for a violated axiom, the minimal literal conjunctions that
/// explain the violation in terms of solver-level facts.
///
/// An edge of a derived relation is explained by recursing through the
/// derivation that currently justifies it, bottoming out at coherence and
/// read-from literals; program order and same-location edges are facts of
/// the candidate execution and reduce to the executedness of their
/// endpoints.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Reasoner;

impl Reasoner {
    /// One cube per violation witness, deduplicated and domination-reduced.
    /// Only called when the constraint reported a violation.
    pub(crate) fn compute_violation_reasons(
        &self,
        graph: &ExecutionGraph,
        constraint: &Constraint,
    ) -> Dnf<CoreLiteral> {
        let relation_graph = graph.relation(constraint.relation);
        let cubes: Vec<Conjunction<CoreLiteral>> = constraint
            .find_witnesses(relation_graph)
            .into_iter()
            .map(|witness| {
                witness.edges.iter().fold(Conjunction::top(), |cube, &edge| {
                    cube.and(&self.compute_edge_reason(graph, constraint.relation, edge))
                })
            })
            .collect();
        Dnf::from_cubes(cubes)
    }

    /// Why `edge` is currently present in `relation`.
    pub(crate) fn compute_edge_reason(
        &self,
        graph: &ExecutionGraph,
        relation: RelationId,
        edge: Edge,
    ) -> Conjunction<CoreLiteral> {
        match graph.derivation(relation) {
            Derivation::Base(BaseRelation::Coherence) => {
                Conjunction::singleton(CoreLiteral::Coherence(edge))
            }
            Derivation::Base(BaseRelation::ReadFrom) => {
                Conjunction::singleton(CoreLiteral::ReadFrom(edge))
            }
            Derivation::Base(BaseRelation::ProgramOrder)
            | Derivation::Base(BaseRelation::SameLocation) => Conjunction::from_literals([
                CoreLiteral::Executed(edge.first),
                CoreLiteral::Executed(edge.second),
            ]),
            Derivation::Union(children) => {
                let child = children
                    .iter()
                    .find(|child| graph.relation(**child).contains(edge))
                    .expect("union edge not present in any child");
                self.compute_edge_reason(graph, *child, edge)
            }
            Derivation::Intersection(children) => children
                .iter()
                .fold(Conjunction::top(), |cube, &child| {
                    cube.and(&self.compute_edge_reason(graph, child, edge))
                }),
            Derivation::Composition(left, right) => {
                let left_graph = graph.relation(*left);
                let right_graph = graph.relation(*right);
                let intermediate = left_graph
                    .successors(edge.first)
                    .iter()
                    .copied()
                    .find(|&mid| right_graph.contains(Edge::new(mid, edge.second)))
                    .expect("composed edge without an intermediate");
                self.compute_edge_reason(graph, *left, Edge::new(edge.first, intermediate))
                    .and(&self.compute_edge_reason(
                        graph,
                        *right,
                        Edge::new(intermediate, edge.second),
                    ))
            }
            Derivation::Inverse(child) => self.compute_edge_reason(graph, *child, edge.inverse()),
            Derivation::TransitiveClosure(child) => {
                let path = shortest_path(graph.relation(*child), edge.first, edge.second);
                path.iter().fold(Conjunction::top(), |cube, &step| {
                    cube.and(&self.compute_edge_reason(graph, *child, step))
                })
            }
        }
    }

    /// Drop literals that hold in every execution the refutation targets:
    /// executedness of initial writes, and executedness of events already
    /// implied by an edge literal in the same cube.
    pub(crate) fn simplify_reason(
        &self,
        graph: &ExecutionGraph,
        cube: &Conjunction<CoreLiteral>,
    ) -> Conjunction<CoreLiteral> {
        let mut implied: FnvHashSet<EventId> = FnvHashSet::default();
        for literal in cube.literals() {
            if let CoreLiteral::Coherence(edge) | CoreLiteral::ReadFrom(edge) = literal {
                let _ = implied.insert(edge.first);
                let _ = implied.insert(edge.second);
            }
        }

        Conjunction::from_literals(cube.literals().iter().copied().filter(|literal| {
            match literal {
                CoreLiteral::Executed(event) => {
                    !graph.is_init(*event) && !implied.contains(event)
                }
                CoreLiteral::Coherence(_) | CoreLiteral::ReadFrom(_) => true,
            }
        }))
    }
}

/// Shortest path from `from` to `to` in `graph`; for `from == to` this is a
/// shortest nonempty cycle. The path must exist: a closure edge is always
/// justified by child edges.
fn shortest_path(graph: &RelationGraph, from: EventId, to: EventId) -> Vec<Edge> {
    let mut parent: FnvHashMap<EventId, EventId> = FnvHashMap::default();
    let mut queue: VecDeque<EventId> = VecDeque::new();
    queue.push_back(from);

    while let Some(node) = queue.pop_front() {
        for &successor in graph.successors(node) {
            if successor == to {
                let mut edges = vec![Edge::new(node, to)];
                let mut current = node;
                while current != from {
                    let previous = parent[&current];
                    edges.push(Edge::new(previous, current));
                    current = previous;
                }
                edges.reverse();
                return edges;
            }
            if successor != from && !parent.contains_key(&successor) {
                let _ = parent.insert(successor, node);
                queue.push_back(successor);
            }
        }
    }

    panic!("closure edge ({from}, {to}) has no justifying path");
}
