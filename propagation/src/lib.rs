pub mod builder;
pub mod convergence;
pub mod engine;
pub mod graph;

pub use builder::GraphBuilder;
pub use convergence::{ConvergenceMonitor, Verdict};
pub use engine::{
    LabelAssignment, LabelPropagationEngine, PropagationError, PropagationOutcome,
    PropagationState,
};
pub use graph::{Edge, NodeIndex, Relation, WeightedGraph};
