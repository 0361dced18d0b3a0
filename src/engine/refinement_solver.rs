//! Houses the driver which decides whether some completion of a candidate
//! execution's coherence order satisfies the memory model, by iteratively
//! deepened saturation over speculative coherence guesses.

use std::time::Duration;
use std::time::Instant;

use log::debug;
use log::trace;

use super::search_tree::NodeId;
use super::search_tree::SearchTree;
use super::termination::TerminationCondition;
use super::tree_resolution::TreeResolution;
use crate::basic_types::statistic_logging::log_statistic;
use crate::basic_types::Timestamp;
use crate::graphs::ExecutionGraph;
use crate::logic::Conjunction;
use crate::logic::Dnf;
use crate::memory_model::MemoryModel;
use crate::model::Edge;
use crate::model::ExecutionModel;
use crate::reason::CoreLiteral;
use crate::reason::Reasoner;
use crate::weft_assert_extreme;
use crate::weft_assert_simple;

/// The verdict of a refinement search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefinementStatus {
    /// Some coherence completion satisfies every axiom; the violation the
    /// solver reported is real.
    Verified,
    /// Every coherence completion violates an axiom; the candidate execution
    /// is spurious and the refutation clauses exclude it.
    Refuted,
    /// The depth bound was exhausted without a verdict. A legitimate result:
    /// the caller may raise the bound or fall back to another procedure.
    Inconclusive,
}

/// Statistics of the last search. Purely observational; never consulted by
/// control flow.
#[derive(Clone, Debug, Default)]
pub struct RefinementStats {
    pub model_size: usize,
    pub num_guessed_coherences: u64,
    pub num_computed_violations: u64,
    pub saturation_depth: u32,
    pub model_construction_time: Duration,
    pub search_time: Duration,
    pub violation_computation_time: Duration,
    pub resolution_time: Duration,
}

impl RefinementStats {
    pub fn log_statistics(&self) {
        log_statistic("modelSize", self.model_size);
        log_statistic("numberOfGuessedCoherences", self.num_guessed_coherences);
        log_statistic("numberOfComputedViolations", self.num_computed_violations);
        log_statistic("saturationDepth", self.saturation_depth);
        log_statistic(
            "modelConstructionTimeInMilliseconds",
            self.model_construction_time.as_millis(),
        );
        log_statistic("searchTimeInMilliseconds", self.search_time.as_millis());
        log_statistic(
            "violationComputationTimeInMilliseconds",
            self.violation_computation_time.as_millis(),
        );
        log_statistic(
            "resolutionTimeInMilliseconds",
            self.resolution_time.as_millis(),
        );
    }
}

/// The outcome handed back to the caller.
#[derive(Clone, Debug)]
pub struct RefinementResult {
    pub status: RefinementStatus,
    /// Refutation clauses; present exactly when the status is
    /// [`RefinementStatus::Refuted`]. Each cube can serve as a blocking
    /// constraint excluding this candidate (and related ones) from future
    /// solver models.
    pub violations: Option<Dnf<CoreLiteral>>,
    pub stats: RefinementStats,
}

/// Decides consistency of a candidate execution by k-saturation: up to `k`
/// simultaneous coherence guesses are explored before falling back to a flat
/// consistency check, with `k` increasing per round until a verdict or the
/// configured maximum.
#[derive(Debug)]
pub struct RefinementSolver {
    memory_model: MemoryModel,
    execution_graph: ExecutionGraph,
    reasoner: Reasoner,
    search_tree: SearchTree,
    stats: RefinementStats,
}

impl RefinementSolver {
    pub fn new(memory_model: MemoryModel) -> RefinementSolver {
        let execution_graph = ExecutionGraph::new(&memory_model);
        RefinementSolver {
            memory_model,
            execution_graph,
            reasoner: Reasoner,
            search_tree: SearchTree::new(),
            stats: RefinementStats::default(),
        }
    }

    pub fn memory_model(&self) -> &MemoryModel {
        &self.memory_model
    }

    /// The graph state of the last search. Must not be inspected while a
    /// search is in flight and never modified from the outside.
    pub fn execution_graph(&self) -> &ExecutionGraph {
        &self.execution_graph
    }

    /// Run saturation rounds of increasing depth, up to
    /// `max_saturation_depth`, against the given candidate execution.
    ///
    /// The termination condition is consulted between rounds only; a started
    /// round always runs to completion.
    pub fn k_search(
        &mut self,
        model: &ExecutionModel,
        max_saturation_depth: u32,
        termination: &mut impl TerminationCondition,
    ) -> RefinementResult {
        self.stats = RefinementStats::default();

        let construction_start = Instant::now();
        self.execution_graph.initialize_from_model(model);
        self.search_tree = SearchTree::new();
        let mut search_list = self.create_coherence_search_list(model);
        Self::sort_search_list(model, &mut search_list);
        self.stats.model_construction_time = construction_start.elapsed();
        self.stats.model_size = model.num_events();

        debug!(
            "starting refinement: {} events, {} undetermined coherence pairs",
            model.num_events(),
            search_list.len()
        );

        let search_start = Instant::now();
        let mut status = RefinementStatus::Inconclusive;
        let mut violations = None;
        let mut verified_by_search = false;

        if !self.execution_graph.coherence_affects_constraints()
            && !self.execution_graph.check_any_violation()
        {
            // No completion can change any constrained relation, so the
            // violation-free initial state settles the question.
            debug!("no constraint depends on coherence; verified without search");
            status = RefinementStatus::Verified;
        } else {
            for k in 0..=max_saturation_depth {
                self.stats.saturation_depth = k;
                debug!("saturation round k={k}");

                let empties = self.search_tree.reachable_empty_nodes();
                weft_assert_simple!(
                    empties.len() == 1,
                    "the search tree must hold exactly one unexplored node between rounds"
                );
                let round = self.k_saturation(empties[0], Timestamp::ZERO, k, &search_list);

                if round != RefinementStatus::Inconclusive {
                    status = round;
                    verified_by_search = round == RefinementStatus::Verified;
                    if round == RefinementStatus::Refuted {
                        let resolution_start = Instant::now();
                        violations = Some(self.compute_resolvents_from_tree());
                        self.stats.resolution_time = resolution_start.elapsed();
                    }
                    break;
                }

                if k > 0 {
                    // Depth 0 performs no search, so nothing can have settled.
                    search_list.retain(|&edge| !self.coherence_settled(edge));
                }
                if termination.should_stop() {
                    debug!("termination requested between saturation rounds");
                    break;
                }
            }
        }

        self.stats.search_time = search_start.elapsed();

        if verified_by_search {
            weft_assert_extreme!(
                self.coherence_is_total(model),
                "a verified search must leave a total per-address coherence order"
            );
        }

        RefinementResult {
            status,
            violations,
            stats: self.stats.clone(),
        }
    }

    /// One saturation pass at depth `k` under the node `node` of the search
    /// tree. `search_list` holds exactly one direction per undetermined
    /// write pair; the search probes both directions of each entry.
    fn k_saturation(
        &mut self,
        node: NodeId,
        cur_time: Timestamp,
        k: u32,
        search_list: &[Edge],
    ) -> RefinementStatus {
        if k == 0 || search_list.is_empty() {
            // Depth 0 amounts to a plain consistency check.
            if self.execution_graph.check_any_violation() {
                let computation_start = Instant::now();
                let reasons = self.compute_violation_list();
                self.search_tree.make_leaf(node, reasons);
                self.stats.violation_computation_time += computation_start.elapsed();
                return RefinementStatus::Refuted;
            }
            if self.all_settled(search_list) {
                // Transitivity settled the remaining pairs on its own.
                return RefinementStatus::Verified;
            }
            return RefinementStatus::Inconclusive;
        }

        let mut search_list: Vec<Edge> = search_list.to_vec();
        let mut cur_node = node;
        loop {
            let mut progress = false;

            for position in 0..search_list.len() {
                let co_edge = search_list[position];
                if self.coherence_settled(co_edge) {
                    continue;
                }

                let pending = self.search_tree.prepare_decision(co_edge);

                let next_time = cur_time.next();
                self.execution_graph.add_coherence_edges(&[co_edge], next_time);
                self.stats.num_guessed_coherences += 1;
                trace!("guessing co{co_edge} at {next_time}, k={k}");
                let status = self.k_saturation(
                    pending.positive,
                    next_time,
                    k - 1,
                    &search_list[position + 1..],
                );
                if status == RefinementStatus::Verified && self.all_settled(&search_list) {
                    // The graph keeps the witness completion.
                    return RefinementStatus::Verified;
                }
                // The guess is undone on every other path: a violating edge
                // must go, and a benign one makes way for the inverse probe.
                self.execution_graph.backtrack_to(next_time);

                if status == RefinementStatus::Refuted {
                    self.search_tree.attach(cur_node, pending);
                    cur_node = pending.negative;
                    // The inverse is now permanent with respect to this
                    // depth: it carries the outer timestamp and survives
                    // sibling backtracks.
                    self.execution_graph
                        .add_coherence_edges(&[co_edge.inverse()], cur_time);
                    let status = self.k_saturation(
                        pending.negative,
                        cur_time,
                        k - 1,
                        &search_list[position + 1..],
                    );
                    match status {
                        // Both directions are inconsistent: the inconsistency
                        // does not depend on this pair.
                        RefinementStatus::Refuted => return RefinementStatus::Refuted,
                        RefinementStatus::Verified if self.all_settled(&search_list) => {
                            return RefinementStatus::Verified;
                        }
                        _ => progress = true,
                    }
                } else {
                    let next_time = cur_time.next();
                    self.execution_graph
                        .add_coherence_edges(&[co_edge.inverse()], next_time);
                    self.stats.num_guessed_coherences += 1;
                    trace!("guessing co{} at {next_time}, k={k}", co_edge.inverse());
                    let status = self.k_saturation(
                        pending.negative,
                        next_time,
                        k - 1,
                        &search_list[position + 1..],
                    );
                    if status == RefinementStatus::Verified && self.all_settled(&search_list) {
                        return RefinementStatus::Verified;
                    }
                    self.execution_graph.backtrack_to(next_time);

                    if status == RefinementStatus::Refuted {
                        // The inverse is inconsistent but the original is
                        // not: fix the original permanently.
                        self.search_tree.attach(cur_node, pending);
                        cur_node = pending.positive;
                        self.execution_graph.add_coherence_edges(&[co_edge], cur_time);
                        progress = true;
                    }
                }
            }

            // Pairs settled by transitivity need not be revisited.
            search_list.retain(|&edge| !self.coherence_settled(edge));
            if !progress {
                return RefinementStatus::Inconclusive;
            }
        }
    }

    /// For every address and every unordered pair of its non-initial writes,
    /// produce one directed candidate edge; pairs forced by the model's
    /// may/must hints or by an initial write are committed permanently up
    /// front, which shrinks the list before the exponential part runs.
    fn create_coherence_search_list(&mut self, model: &ExecutionModel) -> Vec<Edge> {
        let mut init_coherences: Vec<Edge> = Vec::new();
        let mut search_list: Vec<Edge> = Vec::new();

        for (_, writes) in model.address_writes() {
            for &e1 in writes {
                for &e2 in writes {
                    if e1 == e2 {
                        continue;
                    }
                    let edge = Edge::new(e1, e2);

                    if !model.coherence_possible(edge) {
                        // co(e1, e2) can occur in no execution, so the
                        // inverse must be present instead.
                        init_coherences.push(edge.inverse());
                        continue;
                    }
                    if model.coherence_required(edge) {
                        init_coherences.push(edge);
                        continue;
                    }
                    if model.is_init(e1) {
                        // The initial write precedes every other write to
                        // its address.
                        init_coherences.push(edge);
                        continue;
                    }

                    // One direction per pair; the search probes both anyway.
                    if e2 >= e1 || model.is_init(e2) {
                        continue;
                    }
                    search_list.push(edge);
                }
            }
        }

        self.execution_graph
            .add_coherence_edges(&init_coherences, Timestamp::ZERO);
        search_list
    }

    /// Pairs with many read-from edges first: a coherence decision between
    /// frequently observed writes is more likely to trigger a violation.
    fn sort_search_list(model: &ExecutionModel, search_list: &mut [Edge]) {
        search_list.sort_by_key(|edge| {
            std::cmp::Reverse(
                model.event(edge.first).importance + model.event(edge.second).importance,
            )
        });
    }

    fn coherence_settled(&self, edge: Edge) -> bool {
        let coherence = self.execution_graph.coherence_graph();
        coherence.contains(edge) || coherence.contains(edge.inverse())
    }

    fn all_settled(&self, search_list: &[Edge]) -> bool {
        search_list.iter().all(|&edge| self.coherence_settled(edge))
    }

    /// Reasons for the current violations, with only the structurally
    /// simplest retained: resolution cost grows steeply with the number of
    /// opposable literals per cube.
    fn compute_violation_list(&mut self) -> Vec<Conjunction<CoreLiteral>> {
        let mut violations: Vec<Conjunction<CoreLiteral>> = Vec::new();
        for constraint in self.execution_graph.constraints() {
            if !constraint.check_for_violations(self.execution_graph.relation(constraint.relation))
            {
                continue;
            }
            trace!("axiom '{}' is violated", constraint.name);
            let reasons = self
                .reasoner
                .compute_violation_reasons(&self.execution_graph, constraint);
            violations.extend(reasons.into_cubes());
        }

        let min_complexity = violations
            .iter()
            .map(Conjunction::resolution_complexity)
            .min()
            .expect("a violation was detected but no reason was computed");
        violations.retain(|cube| cube.resolution_complexity() <= min_complexity);

        // The detour through a DNF removes duplicates and dominated cubes.
        let violations = Dnf::from_cubes(violations).into_cubes();
        self.stats.num_computed_violations += violations.len() as u64;
        violations
    }

    fn compute_resolvents_from_tree(&mut self) -> Dnf<CoreLiteral> {
        let resolved = TreeResolution::new(&self.search_tree).compute();
        let simplified: Vec<Conjunction<CoreLiteral>> = resolved
            .cubes()
            .iter()
            .map(|cube| self.reasoner.simplify_reason(&self.execution_graph, cube))
            .collect();
        Dnf::from_cubes(simplified)
    }

    /// Whether every pair of same-address writes is ordered by the coherence
    /// graph in exactly one direction.
    fn coherence_is_total(&self, model: &ExecutionModel) -> bool {
        model.address_writes().iter().all(|(_, writes)| {
            writes.iter().enumerate().all(|(position, &w1)| {
                writes[position + 1..].iter().all(|&w2| {
                    let edge = Edge::new(w1, w2);
                    self.coherence_settled(edge)
                        && !(self.execution_graph.coherence_contains(edge)
                            && self.execution_graph.coherence_contains(edge.inverse()))
                })
            })
        })
    }
}
