use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::GraphNode;
use crate::runner::RunnerState;
use crate::types::NodeId;

/// A state-change notification fanned out to observers.
///
/// Every state-changing operation (graph edits, estimator refreshes,
/// runner transitions) produces one of these. `NodeChanged` carries a deep
/// snapshot of the mutated node so observers (layout, persistence mirrors)
/// never need to reach back into the live graph.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// A node's fields changed; `snapshot` is its full new state.
    #[serde(rename_all = "camelCase")]
    NodeChanged { id: NodeId, snapshot: GraphNode },

    /// The runner session moved to a new state.
    #[serde(rename_all = "camelCase")]
    SessionChanged {
        state: RunnerState,
        current: Option<NodeId>,
    },

    /// An action node reached 100% and was marked completed.
    #[serde(rename_all = "camelCase")]
    ActionCompleted {
        id: NodeId,
        elapsed_ms: i64,
        expected_ms: f64,
    },

    /// A decision node was resolved (externally or auto-resolved).
    #[serde(rename_all = "camelCase")]
    DecisionResolved { id: NodeId, chosen: NodeId },

    /// The runner hit an action node with more than one child and halted.
    #[serde(rename_all = "camelCase")]
    MalformedGraph { id: NodeId, children: usize },
}

impl EngineEvent {
    pub fn node_changed(node: &GraphNode) -> Self {
        Self::NodeChanged {
            id: node.id(),
            snapshot: node.clone(),
        }
    }

    pub fn session_changed(state: RunnerState, current: Option<NodeId>) -> Self {
        Self::SessionChanged { state, current }
    }

    /// The id of the entity this event is about, if it concerns one node.
    #[must_use]
    pub fn entity_id(&self) -> Option<NodeId> {
        match self {
            Self::NodeChanged { id, .. }
            | Self::ActionCompleted { id, .. }
            | Self::DecisionResolved { id, .. }
            | Self::MalformedGraph { id, .. } => Some(*id),
            Self::SessionChanged { current, .. } => *current,
        }
    }
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeChanged { id, snapshot } => {
                write!(f, "[{id}] {} changed", snapshot.kind())
            }
            Self::SessionChanged { state, current } => match current {
                Some(current) => write!(f, "session {state} at {current}"),
                None => write!(f, "session {state}"),
            },
            Self::ActionCompleted {
                id,
                elapsed_ms,
                expected_ms,
            } => write!(
                f,
                "[{id}] completed in {elapsed_ms}ms (expected now {expected_ms:.0}ms)"
            ),
            Self::DecisionResolved { id, chosen } => {
                write!(f, "[{id}] resolved -> {chosen}")
            }
            Self::MalformedGraph { id, children } => {
                write!(f, "[{id}] malformed: action with {children} children")
            }
        }
    }
}
