use crate::engine::LabelAssignment;
use newsrank_core::config::PropagationConfig;
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Continue,
    Converged,
    MaxIterationsReached,
}

/// Decides when the propagation loop stops.
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    min_iterations: usize,
    max_iterations: usize,
    threshold: f64,
}

impl ConvergenceMonitor {
    pub fn new(config: &PropagationConfig) -> Self {
        Self {
            // At least one iteration has always run when the monitor is asked.
            min_iterations: config.min_iterations.max(1),
            max_iterations: config.max_iterations,
            threshold: config.convergence_threshold,
        }
    }

    /// Largest `|old - new|` over `(node, label)` pairs present in both
    /// assignments. Pairs present on only one side are not counted as change.
    /// `None` when the assignments share no pair.
    pub fn max_delta(previous: &LabelAssignment, next: &LabelAssignment) -> Option<f64> {
        let nodes = previous.node_count().min(next.node_count());
        (0..nodes)
            .into_par_iter()
            .filter_map(|node| row_delta(previous.labels(node as u32), next.labels(node as u32)))
            .reduce_with(f64::max)
    }

    /// Judge the assignment produced by iteration `iteration` (1-based).
    /// Returns the delta when it was computed.
    pub fn observe(
        &self,
        iteration: usize,
        previous: &LabelAssignment,
        next: &LabelAssignment,
    ) -> (Option<f64>, Verdict) {
        let mut delta = None;
        if iteration >= self.min_iterations {
            let max_delta = Self::max_delta(previous, next);
            delta = Some(max_delta.unwrap_or(0.0));
            if max_delta.unwrap_or(0.0) < self.threshold {
                return (delta, Verdict::Converged);
            }
        }

        if iteration >= self.max_iterations {
            (delta, Verdict::MaxIterationsReached)
        } else {
            (delta, Verdict::Continue)
        }
    }
}

/// Merge-join two label rows sorted by label.
fn row_delta(old: &[(u32, f64)], new: &[(u32, f64)]) -> Option<f64> {
    let (mut i, mut j) = (0, 0);
    let mut max: Option<f64> = None;
    while i < old.len() && j < new.len() {
        let (old_label, old_value) = old[i];
        let (new_label, new_value) = new[j];
        match old_label.cmp(&new_label) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                let diff = (old_value - new_value).abs();
                max = Some(max.map_or(diff, |m| m.max(diff)));
                i += 1;
                j += 1;
            }
        }
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: usize, max: usize) -> PropagationConfig {
        PropagationConfig {
            min_iterations: min,
            max_iterations: max,
            convergence_threshold: 0.05,
        }
    }

    #[test]
    fn test_row_delta_ignores_unmatched_labels() {
        let old = [(1, 0.5), (3, 0.5)];
        let new = [(1, 0.2), (2, 0.8)];
        let delta = row_delta(&old, &new).unwrap();
        assert!((delta - 0.3).abs() < 1e-12);
        assert_eq!(row_delta(&[(4, 1.0)], &[(5, 1.0)]), None);
    }

    #[test]
    fn test_max_delta_over_shared_pairs_only() {
        let previous = LabelAssignment::from_rows(vec![vec![(0, 1.0)], vec![(0, 0.6), (2, 0.4)], vec![]]);
        let next = LabelAssignment::from_rows(vec![vec![(0, 1.0)], vec![(0, 0.5), (2, 0.5)], vec![(0, 1.0)]]);

        let delta = ConvergenceMonitor::max_delta(&previous, &next).unwrap();
        assert!((delta - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_floor_suppresses_early_convergence() {
        let monitor = ConvergenceMonitor::new(&config(3, 10));
        let same = LabelAssignment::from_rows(vec![vec![(0, 1.0)]]);

        assert_eq!(monitor.observe(1, &same, &same), (None, Verdict::Continue));
        assert_eq!(monitor.observe(2, &same, &same), (None, Verdict::Continue));
        assert_eq!(monitor.observe(3, &same, &same), (Some(0.0), Verdict::Converged));
    }

    #[test]
    fn test_ceiling_stops_unstable_runs() {
        let monitor = ConvergenceMonitor::new(&config(1, 2));
        let a = LabelAssignment::from_rows(vec![vec![(0, 1.0)]]);
        let b = LabelAssignment::from_rows(vec![vec![(0, 0.5)]]);

        assert_eq!(monitor.observe(1, &a, &b), (Some(0.5), Verdict::Continue));
        assert_eq!(monitor.observe(2, &b, &a), (Some(0.5), Verdict::MaxIterationsReached));
    }
}
