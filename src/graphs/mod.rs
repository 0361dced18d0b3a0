//! Relation graphs over program events and their propagation machinery.

mod constraint;
mod execution_graph;
mod relation_graph;

pub(crate) use constraint::Constraint;
pub use execution_graph::ExecutionGraph;
pub(crate) use relation_graph::RelationGraph;
