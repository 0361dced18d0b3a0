#![cfg(test)]
//! Cross-cutting properties of search results: soundness of refutations and
//! cleanliness of the speculative state.

use super::sequential_consistency;
use crate::basic_types::Timestamp;
use crate::engine::Indefinite;
use crate::engine::RefinementSolver;
use crate::engine::RefinementStatus;
use crate::graphs::ExecutionGraph;
use crate::model::Address;
use crate::model::Edge;
use crate::model::ExecutionModel;
use crate::reason::CoreLiteral;

fn store_buffering() -> ExecutionModel {
    let x = Address::new(0);
    let y = Address::new(1);

    let mut builder = ExecutionModel::builder();
    let t0 = builder.new_thread();
    let t1 = builder.new_thread();
    let init_x = builder.add_init(x).unwrap();
    let init_y = builder.add_init(y).unwrap();
    let _write_x = builder.add_write(t0, x).unwrap();
    let read_y = builder.add_read(t0, y).unwrap();
    let _write_y = builder.add_write(t1, y).unwrap();
    let read_x = builder.add_read(t1, x).unwrap();
    builder.add_read_from(init_y, read_y).unwrap();
    builder.add_read_from(init_x, read_x).unwrap();
    builder.build()
}

/// Forcing the coherence literals of every refutation cube must reproduce a
/// genuine axiom violation in a fresh graph.
#[test]
fn refutation_cubes_reproduce_violations_when_forced() {
    let model = store_buffering();
    let memory = sequential_consistency();
    let mut solver = RefinementSolver::new(memory.clone());

    let result = solver.k_search(&model, 2, &mut Indefinite);
    assert_eq!(result.status, RefinementStatus::Refuted);

    for cube in result.violations.unwrap().cubes() {
        let forced: Vec<Edge> = cube
            .literals()
            .iter()
            .filter_map(|literal| match literal {
                CoreLiteral::Coherence(edge) => Some(*edge),
                CoreLiteral::ReadFrom(_) | CoreLiteral::Executed(_) => None,
            })
            .collect();
        assert!(!forced.is_empty());

        let mut graph = ExecutionGraph::new(&memory);
        graph.initialize_from_model(&model);
        assert!(!graph.check_any_violation());

        graph.add_coherence_edges(&forced, Timestamp::ZERO);
        assert!(graph.check_any_violation());
    }
}

fn opposing_readers() -> ExecutionModel {
    let address = Address::new(0);
    let mut builder = ExecutionModel::builder();
    let t0 = builder.new_thread();
    let t1 = builder.new_thread();
    let t2 = builder.new_thread();
    let t3 = builder.new_thread();
    let _init = builder.add_init(address).unwrap();
    let w1 = builder.add_write(t0, address).unwrap();
    let w2 = builder.add_write(t1, address).unwrap();
    let ra = builder.add_read(t2, address).unwrap();
    let rb = builder.add_read(t2, address).unwrap();
    let rc = builder.add_read(t3, address).unwrap();
    let rd = builder.add_read(t3, address).unwrap();
    builder.add_read_from(w1, ra).unwrap();
    builder.add_read_from(w2, rb).unwrap();
    builder.add_read_from(w2, rc).unwrap();
    builder.add_read_from(w1, rd).unwrap();
    builder.build()
}

/// When a refutation holds no coherence literal, the inconsistency must be
/// independent of the write order: both orders violate.
#[test]
fn either_write_order_reproduces_a_violation() {
    let model = opposing_readers();
    let memory = sequential_consistency();

    let writes: Vec<_> = model
        .events()
        .iter()
        .filter(|event| event.kind == crate::model::EventKind::Write)
        .map(|event| event.id)
        .collect();
    assert_eq!(writes.len(), 2);

    for edge in [
        Edge::new(writes[0], writes[1]),
        Edge::new(writes[1], writes[0]),
    ] {
        let mut graph = ExecutionGraph::new(&memory);
        graph.initialize_from_model(&model);
        assert!(!graph.check_any_violation());

        graph.add_coherence_edges(&[edge], Timestamp::ZERO);
        assert!(graph.check_any_violation());
    }
}

/// After a refuted search, every speculative edge has been backtracked: the
/// coherence graph holds only the pre-committed and depth-permanent edges.
#[test]
fn refuted_search_leaves_no_speculative_edges() {
    let model = opposing_readers();
    let mut solver = RefinementSolver::new(sequential_consistency());

    let result = solver.k_search(&model, 2, &mut Indefinite);
    assert_eq!(result.status, RefinementStatus::Refuted);

    let coherence = solver.execution_graph().coherence_edges();
    // Two initial-write edges plus the single committed inverse direction of
    // the refuted first guess.
    assert_eq!(coherence.len(), 3);
    let loops = coherence.iter().filter(|edge| edge.is_loop()).count();
    assert_eq!(loops, 0);
}
