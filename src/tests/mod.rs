#![cfg(test)]

mod properties;

use crate::memory_model::AxiomKind;
use crate::memory_model::Derivation;
use crate::memory_model::MemoryModel;

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Sequential consistency: acyclic(po | rf | co | fr).
pub(crate) fn sequential_consistency() -> MemoryModel {
    let mut model = MemoryModel::new();
    let rf_inv = model.add_relation("rf-inv", Derivation::Inverse(MemoryModel::RF));
    let fr = model.add_relation("fr", Derivation::Composition(rf_inv, MemoryModel::CO));
    let hb = model.add_relation(
        "hb",
        Derivation::Union(vec![MemoryModel::PO, MemoryModel::RF, MemoryModel::CO, fr]),
    );
    model.add_axiom(AxiomKind::Acyclicity, hb, "sequential-consistency");
    model
}

/// A relaxed model with no ordering between same-thread accesses: only the
/// observation order acyclic(rf | co | fr) is required.
pub(crate) fn relaxed_observation_order() -> MemoryModel {
    let mut model = MemoryModel::new();
    let rf_inv = model.add_relation("rf-inv", Derivation::Inverse(MemoryModel::RF));
    let fr = model.add_relation("fr", Derivation::Composition(rf_inv, MemoryModel::CO));
    let obs = model.add_relation(
        "obs",
        Derivation::Union(vec![MemoryModel::RF, MemoryModel::CO, fr]),
    );
    model.add_axiom(AxiomKind::Acyclicity, obs, "observation-order");
    model
}
