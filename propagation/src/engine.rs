use crate::convergence::{ConvergenceMonitor, Verdict};
use crate::graph::{NodeIndex, WeightedGraph};
use newsrank_core::config::{ConfigLoadError, PropagationConfig};
use newsrank_core::error::{ErrorCode, NewsrankError};
use newsrank_core::metrics::RunMetricsCollector;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum PropagationError {
    #[error("invalid propagation config: {0}")]
    InvalidConfig(#[from] ConfigLoadError),
}

impl NewsrankError for PropagationError {
    fn error_code(&self) -> ErrorCode {
        match self {
            PropagationError::InvalidConfig(_) => ErrorCode::InvalidArgument,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropagationState {
    Initializing,
    Iterating,
    Converged,
    MaxIterationsReached,
}

impl PropagationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropagationState::Initializing => "initializing",
            PropagationState::Iterating => "iterating",
            PropagationState::Converged => "converged",
            PropagationState::MaxIterationsReached => "max_iterations_reached",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PropagationState::Converged | PropagationState::MaxIterationsReached
        )
    }
}

/// Per-node distribution over seed labels. Rows are sorted by label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelAssignment {
    rows: Vec<Vec<(NodeIndex, f64)>>,
}

impl LabelAssignment {
    /// Every seed holds full belief in itself; every other node is empty.
    pub fn seeded(graph: &WeightedGraph) -> Self {
        let mut rows = vec![Vec::new(); graph.node_count()];
        for &seed in graph.seeds() {
            rows[seed as usize] = vec![(seed, 1.0)];
        }
        Self { rows }
    }

    pub fn from_rows(mut rows: Vec<Vec<(NodeIndex, f64)>>) -> Self {
        for row in &mut rows {
            row.sort_by_key(|(label, _)| *label);
        }
        Self { rows }
    }

    pub fn node_count(&self) -> usize {
        self.rows.len()
    }

    pub fn labels(&self, node: NodeIndex) -> &[(NodeIndex, f64)] {
        self.rows
            .get(node as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get(&self, node: NodeIndex, label: NodeIndex) -> Option<f64> {
        let row = self.labels(node);
        row.binary_search_by_key(&label, |(l, _)| *l)
            .ok()
            .map(|idx| row[idx].1)
    }

    /// Nodes holding at least one label.
    pub fn labeled_nodes(&self) -> impl Iterator<Item = (NodeIndex, &[(NodeIndex, f64)])> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !row.is_empty())
            .map(|(node, row)| (node as NodeIndex, row.as_slice()))
    }

    pub fn pair_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }
}

#[derive(Debug, Clone)]
pub struct PropagationOutcome {
    pub assignment: LabelAssignment,
    pub state: PropagationState,
    pub iterations: usize,
    pub last_delta: Option<f64>,
}

/// Adsorption-style label propagation over a [`WeightedGraph`].
///
/// Each iteration is a pure function of the previous assignment and the
/// static edge set. Every target node gathers `weight * value` from its
/// inbound edges independently, so rows are computed in parallel with no
/// shared accumulator; `collect` is the barrier between iterations.
pub struct LabelPropagationEngine {
    monitor: ConvergenceMonitor,
    metrics: Option<RunMetricsCollector>,
}

impl LabelPropagationEngine {
    pub fn new(config: PropagationConfig) -> Result<Self, PropagationError> {
        config.validate()?;
        Ok(Self {
            monitor: ConvergenceMonitor::new(&config),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: RunMetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn run(&self, graph: &WeightedGraph) -> PropagationOutcome {
        let mut state = PropagationState::Initializing;
        let mut current = LabelAssignment::seeded(graph);

        if graph.seeds().is_empty() {
            warn!("No seed users with interests; skipping propagation");
            state = PropagationState::Converged;
            self.record_terminal(state);
            return PropagationOutcome {
                assignment: current,
                state,
                iterations: 0,
                last_delta: None,
            };
        }

        info!(
            "Propagating {} seed labels over {} nodes / {} edges",
            graph.seeds().len(),
            graph.node_count(),
            graph.edge_count()
        );

        let incoming = graph.incoming();
        let mut iteration = 0;
        let mut last_delta = None;

        while !state.is_terminal() {
            state = PropagationState::Iterating;
            iteration += 1;

            let next = Self::step(graph, &incoming, &current);
            let (delta, verdict) = self.monitor.observe(iteration, &current, &next);
            debug!(
                "Iteration {}: {} label pairs, max delta {:?}",
                iteration,
                next.pair_count(),
                delta
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_iteration(delta);
            }

            current = next;
            if delta.is_some() {
                last_delta = delta;
            }

            match verdict {
                Verdict::Continue => {}
                Verdict::Converged => state = PropagationState::Converged,
                Verdict::MaxIterationsReached => {
                    warn!(
                        "No convergence after {} iterations (last max delta {:?}); keeping last assignment",
                        iteration, last_delta
                    );
                    state = PropagationState::MaxIterationsReached;
                }
            }
        }

        info!(
            "Propagation finished: {} after {} iterations",
            state.as_str(),
            iteration
        );
        self.record_terminal(state);

        PropagationOutcome {
            assignment: current,
            state,
            iterations: iteration,
            last_delta,
        }
    }

    /// One full transition: accumulate, self-reinforce, normalize.
    pub fn step(
        graph: &WeightedGraph,
        incoming: &[Vec<(NodeIndex, f64)>],
        previous: &LabelAssignment,
    ) -> LabelAssignment {
        let rows = (0..graph.node_count())
            .into_par_iter()
            .map(|node| {
                let row = Self::accumulate(graph, incoming, previous, node as NodeIndex);
                normalize(row)
            })
            .collect();
        LabelAssignment { rows }
    }

    /// Unnormalized row for `node`: summed inbound mass per label, with a
    /// seed's own label pinned to exactly 1.0.
    pub fn accumulate(
        graph: &WeightedGraph,
        incoming: &[Vec<(NodeIndex, f64)>],
        previous: &LabelAssignment,
        node: NodeIndex,
    ) -> Vec<(NodeIndex, f64)> {
        let mut acc: HashMap<NodeIndex, f64> = HashMap::new();
        if let Some(inbound) = incoming.get(node as usize) {
            for &(source, weight) in inbound {
                for &(label, value) in previous.labels(source) {
                    *acc.entry(label).or_insert(0.0) += weight * value;
                }
            }
        }

        if graph.is_seed(node) {
            acc.insert(node, 1.0);
        }

        let mut row: Vec<(NodeIndex, f64)> = acc.into_iter().collect();
        row.sort_by_key(|(label, _)| *label);
        row
    }

    fn record_terminal(&self, state: PropagationState) {
        if let Some(metrics) = &self.metrics {
            metrics.record_terminal_state(state.as_str());
        }
    }
}

fn normalize(row: Vec<(NodeIndex, f64)>) -> Vec<(NodeIndex, f64)> {
    let sum: f64 = row.iter().map(|(_, value)| value).sum();
    if sum <= 0.0 || !sum.is_finite() {
        return Vec::new();
    }
    row.into_iter()
        .filter(|(_, value)| *value > 0.0)
        .map(|(label, value)| (label, value / sum))
        .collect()
}
