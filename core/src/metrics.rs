use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct GraphMetrics {
    pub nodes: usize,
    pub edges: usize,
    pub seeds: usize,
    pub dropped_references: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PropagationMetrics {
    pub iterations: usize,
    pub deltas: VecDeque<f64>,
    pub terminal_state: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SamplingMetrics {
    pub rankings: u64,
    pub candidates: u64,
    pub recommendations: u64,
    pub degenerate_users: u64,
}

/// Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct RunMetricsCollector {
    state: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    graph: GraphMetrics,
    propagation: PropagationMetrics,
    sampling: SamplingMetrics,
    max_history: usize,
}

impl RunMetricsCollector {
    pub fn new(max_history: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MetricsState {
                graph: GraphMetrics::default(),
                propagation: PropagationMetrics::default(),
                sampling: SamplingMetrics::default(),
                max_history,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record_graph(&self, nodes: usize, edges: usize, seeds: usize) {
        let mut state = self.lock();
        state.graph.nodes = nodes;
        state.graph.edges = edges;
        state.graph.seeds = seeds;
    }

    pub fn record_dropped_reference(&self) {
        self.lock().graph.dropped_references += 1;
    }

    pub fn record_iteration(&self, delta: Option<f64>) {
        let mut state = self.lock();
        state.propagation.iterations += 1;
        if let Some(delta) = delta {
            state.propagation.deltas.push_back(delta);
            if state.propagation.deltas.len() > state.max_history {
                state.propagation.deltas.pop_front();
            }
        }
    }

    pub fn record_terminal_state(&self, state_name: impl Into<String>) {
        self.lock().propagation.terminal_state = Some(state_name.into());
    }

    pub fn record_rankings(&self, count: usize) {
        self.lock().sampling.rankings += count as u64;
    }

    pub fn record_candidates(&self, count: usize) {
        self.lock().sampling.candidates += count as u64;
    }

    pub fn record_recommendations(&self, count: usize) {
        self.lock().sampling.recommendations += count as u64;
    }

    pub fn record_degenerate_user(&self) {
        self.lock().sampling.degenerate_users += 1;
    }

    pub fn snapshot(&self) -> RunMetricsSnapshot {
        let state = self.lock();
        let g = &state.graph;
        let p = &state.propagation;
        let s = &state.sampling;

        RunMetricsSnapshot {
            nodes: g.nodes,
            edges: g.edges,
            seeds: g.seeds,
            dropped_references: g.dropped_references,
            iterations: p.iterations,
            last_delta: p.deltas.back().copied(),
            delta_history: p.deltas.iter().copied().collect(),
            terminal_state: p.terminal_state.clone(),
            rankings: s.rankings,
            candidates: s.candidates,
            recommendations: s.recommendations,
            degenerate_users: s.degenerate_users,
        }
    }
}

impl Default for RunMetricsCollector {
    fn default() -> Self {
        Self::new(64)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunMetricsSnapshot {
    pub nodes: usize,
    pub edges: usize,
    pub seeds: usize,
    pub dropped_references: u64,
    pub iterations: usize,
    pub last_delta: Option<f64>,
    pub delta_history: Vec<f64>,
    pub terminal_state: Option<String>,
    pub rankings: u64,
    pub candidates: u64,
    pub recommendations: u64,
    pub degenerate_users: u64,
}
