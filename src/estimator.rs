//! Expected-duration model for action nodes.
//!
//! The estimate is the arithmetic mean of the node's full completion
//! history. A deliberate simplicity choice over exponential or windowed
//! averages: history is small, and the mean is stable and explainable.
//! Nodes start from a fixed default until their first completion.

use crate::graph::{ActionNode, WorkflowGraph};
use crate::types::NodeId;

/// Estimate assigned to freshly created action nodes (ms).
pub const DEFAULT_EXPECTED_DURATION_MS: f64 = 5_000.0;

/// Maintains `expected_duration_ms` for action nodes.
///
/// The estimate serves two consumers: the runner uses it as the progress
/// denominator, and the session offers it as the default duration for newly
/// inserted sibling nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct DurationEstimator {
    default_ms: f64,
}

impl Default for DurationEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_EXPECTED_DURATION_MS)
    }
}

impl DurationEstimator {
    #[must_use]
    pub fn new(default_ms: f64) -> Self {
        Self {
            default_ms: default_ms.max(1.0),
        }
    }

    /// The estimate used before any completion has been observed.
    #[must_use]
    pub fn default_estimate(&self) -> f64 {
        self.default_ms
    }

    /// Mean of a completion history, if any observations exist.
    #[must_use]
    pub fn mean(history: &[i64]) -> Option<f64> {
        if history.is_empty() {
            return None;
        }
        let sum: i64 = history.iter().sum();
        Some(sum as f64 / history.len() as f64)
    }

    /// Record one observed completion and refresh the node's estimate.
    ///
    /// Appends `elapsed_ms` to the node's history and recomputes the
    /// expected duration as the mean of the full history. Returns the new
    /// estimate.
    pub fn record_completion(&self, action: &mut ActionNode, elapsed_ms: i64) -> f64 {
        action.duration_history.push(elapsed_ms.max(0));
        let estimate =
            Self::mean(&action.duration_history).unwrap_or(self.default_ms);
        action.expected_duration_ms = estimate;
        estimate
    }

    /// Duration to offer a node being inserted under `parent_id`.
    ///
    /// Prefers the estimate of an existing action sibling (most recently
    /// added first) so related steps inherit learned timings; otherwise the
    /// fixed default.
    #[must_use]
    pub fn offer_for_new_child(&self, graph: &WorkflowGraph, parent_id: NodeId) -> f64 {
        let Some(parent) = graph.get(parent_id) else {
            return self.default_ms;
        };
        parent
            .children()
            .iter()
            .rev()
            .filter_map(|child| graph.get(*child))
            .filter_map(|node| node.as_action())
            .map(|action| action.expected_duration_ms)
            .next()
            .unwrap_or(self.default_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeDraft, WorkflowGraph};

    fn action_node(graph: &mut WorkflowGraph, parent: NodeId, title: &str) -> NodeId {
        graph.add_child(parent, NodeDraft::action(title)).unwrap()
    }

    #[test]
    fn default_until_first_completion() {
        let graph = WorkflowGraph::new(NodeDraft::action("root"));
        let root = graph.get(graph.root_id()).unwrap().as_action().unwrap();
        assert_eq!(root.expected_duration_ms, DEFAULT_EXPECTED_DURATION_MS);
        assert!(root.duration_history.is_empty());
    }

    #[test]
    fn estimate_is_mean_of_full_history() {
        let mut graph = WorkflowGraph::new(NodeDraft::action("root"));
        let root_id = graph.root_id();
        let estimator = DurationEstimator::default();

        let observations = [1_000, 2_000, 6_000];
        for elapsed in observations {
            let action = graph.get_mut(root_id).unwrap().as_action_mut().unwrap();
            estimator.record_completion(action, elapsed);
        }

        let action = graph.get(root_id).unwrap().as_action().unwrap();
        assert_eq!(action.duration_history, observations.to_vec());
        assert!((action.expected_duration_ms - 3_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sibling_estimate_offered_to_new_children() {
        let mut graph = WorkflowGraph::new(NodeDraft::decision("branch"));
        let root = graph.root_id();
        let estimator = DurationEstimator::default();

        // No siblings yet: fixed default.
        assert_eq!(
            estimator.offer_for_new_child(&graph, root),
            DEFAULT_EXPECTED_DURATION_MS
        );

        let first = action_node(&mut graph, root, "first");
        let action = graph.get_mut(first).unwrap().as_action_mut().unwrap();
        estimator.record_completion(action, 800);

        assert!((estimator.offer_for_new_child(&graph, root) - 800.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_parent_falls_back_to_default() {
        let graph = WorkflowGraph::new(NodeDraft::action("root"));
        let estimator = DurationEstimator::new(1_234.0);
        assert_eq!(
            estimator.offer_for_new_child(&graph, NodeId::new()),
            1_234.0
        );
    }
}
