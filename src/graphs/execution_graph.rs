use fnv::FnvHashMap;
use fnv::FnvHashSet;

use super::constraint::Constraint;
use super::relation_graph::RelationGraph;
use crate::basic_types::Timestamp;
use crate::memory_model::Derivation;
use crate::memory_model::MemoryModel;
use crate::memory_model::RelationId;
use crate::model::Address;
use crate::model::Edge;
use crate::model::EventId;
use crate::model::ExecutionModel;

/// Materialises a candidate execution as one graph per memory-model relation
/// and keeps the derived graphs consistent as coherence edges are
/// hypothesised.
///
/// All mutation goes through [`ExecutionGraph::add_coherence_edges`] and
/// [`ExecutionGraph::backtrack_to`]; the relation table itself is fixed at
/// construction. Derived graphs are updated by propagation waves: relations
/// are processed in declaration order, which is topological because derived
/// relations may only reference earlier ids.
#[derive(Clone, Debug)]
pub struct ExecutionGraph {
    graphs: Vec<RelationGraph>,
    derivations: Vec<Derivation>,
    constraints: Vec<Constraint>,
    coherence_dependent: Vec<bool>,
    init_events: FnvHashSet<EventId>,
}

impl ExecutionGraph {
    pub(crate) fn new(model: &MemoryModel) -> ExecutionGraph {
        let derivations: Vec<Derivation> = (0..model.num_relations())
            .map(|index| model.derivation(RelationId::from_index(index)).clone())
            .collect();
        let constraints = model
            .axioms()
            .iter()
            .map(|axiom| Constraint::new(axiom.kind(), axiom.relation(), axiom.name().to_owned()))
            .collect();

        ExecutionGraph {
            graphs: vec![RelationGraph::default(); model.num_relations()],
            derivations,
            constraints,
            coherence_dependent: model.coherence_dependent(),
            init_events: FnvHashSet::default(),
        }
    }

    /// Populate the base relations from the model's solver-determined facts
    /// and derive everything else. Any previous content is discarded.
    pub(crate) fn initialize_from_model(&mut self, model: &ExecutionModel) {
        for graph in &mut self.graphs {
            graph.clear();
        }
        self.init_events = model
            .events()
            .iter()
            .filter(|event| event.kind.is_init())
            .map(|event| event.id)
            .collect();

        let mut po_edges = Vec::new();
        for thread in model.threads() {
            for (position, &earlier) in thread.iter().enumerate() {
                for &later in &thread[position + 1..] {
                    po_edges.push(Edge::new(earlier, later));
                }
            }
        }

        let mut by_address: FnvHashMap<Address, Vec<EventId>> = FnvHashMap::default();
        for event in model.events() {
            by_address.entry(event.address).or_default().push(event.id);
        }
        let mut loc_edges = Vec::new();
        for events in by_address.values() {
            for &e1 in events {
                for &e2 in events {
                    if e1 != e2 {
                        loc_edges.push(Edge::new(e1, e2));
                    }
                }
            }
        }

        self.propagate(
            vec![
                (MemoryModel::PO.index(), po_edges),
                (MemoryModel::RF.index(), model.read_from().to_vec()),
                (MemoryModel::LOC.index(), loc_edges),
            ],
            Timestamp::ZERO,
        );
    }

    /// Insert coherence edges stamped with `time` and propagate the change
    /// through every derived relation. Edges already present are skipped.
    pub(crate) fn add_coherence_edges(&mut self, edges: &[Edge], time: Timestamp) {
        self.propagate(vec![(MemoryModel::CO.index(), edges.to_vec())], time);
    }

    /// Remove every edge, in every relation, stamped at `time` or later.
    pub(crate) fn backtrack_to(&mut self, time: Timestamp) {
        for graph in &mut self.graphs {
            graph.backtrack_to(time);
        }
    }

    pub(crate) fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub(crate) fn check_any_violation(&self) -> bool {
        self.constraints
            .iter()
            .any(|constraint| constraint.check_for_violations(self.relation(constraint.relation)))
    }

    /// Whether any constrained relation can change when coherence grows.
    pub(crate) fn coherence_affects_constraints(&self) -> bool {
        self.constraints
            .iter()
            .any(|constraint| self.coherence_dependent[constraint.relation.index()])
    }

    pub(crate) fn relation(&self, id: RelationId) -> &RelationGraph {
        &self.graphs[id.index()]
    }

    pub(crate) fn derivation(&self, id: RelationId) -> &Derivation {
        &self.derivations[id.index()]
    }

    pub(crate) fn coherence_graph(&self) -> &RelationGraph {
        &self.graphs[MemoryModel::CO.index()]
    }

    pub(crate) fn is_init(&self, event: EventId) -> bool {
        self.init_events.contains(&event)
    }

    /// Whether the coherence graph orders the pair in either direction.
    pub fn coherence_contains(&self, edge: Edge) -> bool {
        self.coherence_graph().contains(edge)
    }

    /// The coherence edges currently present, in unspecified order.
    pub fn coherence_edges(&self) -> Vec<Edge> {
        self.coherence_graph().edges().collect()
    }

    #[cfg(test)]
    pub(crate) fn graphs(&self) -> &[RelationGraph] {
        &self.graphs
    }

    /// One propagation wave: insert the seed deltas, then walk the relation
    /// table in (topological) declaration order, feeding each derived
    /// relation the edges actually inserted into its children this wave.
    fn propagate(&mut self, seeds: Vec<(usize, Vec<Edge>)>, time: Timestamp) {
        let mut deltas: Vec<Vec<Edge>> = vec![Vec::new(); self.graphs.len()];

        for (relation, edges) in seeds {
            for edge in edges {
                if self.graphs[relation].try_insert(edge, time) {
                    deltas[relation].push(edge);
                }
            }
        }

        for relation in 0..self.graphs.len() {
            let derivation = self.derivations[relation].clone();
            let candidates: Vec<Edge> = match derivation {
                Derivation::Base(_) => continue,
                Derivation::Union(children) => children
                    .iter()
                    .flat_map(|child| deltas[child.index()].iter().copied())
                    .collect(),
                Derivation::Intersection(children) => {
                    let mut candidates = Vec::new();
                    for (position, child) in children.iter().enumerate() {
                        for &edge in &deltas[child.index()] {
                            let in_all_others =
                                children.iter().enumerate().all(|(other_position, other)| {
                                    other_position == position
                                        || self.graphs[other.index()].contains(edge)
                                });
                            if in_all_others {
                                candidates.push(edge);
                            }
                        }
                    }
                    candidates
                }
                Derivation::Composition(left, right) => {
                    let mut candidates = Vec::new();
                    for &edge in &deltas[left.index()] {
                        for &successor in self.graphs[right.index()].successors(edge.second) {
                            candidates.push(Edge::new(edge.first, successor));
                        }
                    }
                    for &edge in &deltas[right.index()] {
                        for &predecessor in self.graphs[left.index()].predecessors(edge.first) {
                            candidates.push(Edge::new(predecessor, edge.second));
                        }
                    }
                    candidates
                }
                Derivation::Inverse(child) => deltas[child.index()]
                    .iter()
                    .map(|edge| edge.inverse())
                    .collect(),
                Derivation::TransitiveClosure(child) => {
                    // The closure grows per child edge so that later products
                    // see the edges added for earlier ones.
                    let child_delta = deltas[child.index()].clone();
                    for edge in child_delta {
                        let products = {
                            let closure = &self.graphs[relation];
                            let mut froms = vec![edge.first];
                            froms.extend_from_slice(closure.predecessors(edge.first));
                            let mut tos = vec![edge.second];
                            tos.extend_from_slice(closure.successors(edge.second));

                            let mut products = Vec::with_capacity(froms.len() * tos.len());
                            for &from in &froms {
                                for &to in &tos {
                                    products.push(Edge::new(from, to));
                                }
                            }
                            products
                        };
                        for product in products {
                            if self.graphs[relation].try_insert(product, time) {
                                deltas[relation].push(product);
                            }
                        }
                    }
                    continue;
                }
            };

            for candidate in candidates {
                if self.graphs[relation].try_insert(candidate, time) {
                    deltas[relation].push(candidate);
                }
            }
        }
    }
}
