//! Node shapes for the workflow tree.
//!
//! Nodes are a tagged union over the two step kinds: timed [`ActionNode`]s
//! and branching [`DecisionNode`]s. Shared identity and linkage live in
//! [`NodeCore`]; every call site that branches on kind matches exhaustively
//! on [`GraphNode`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ActionStatus, DecisionStatus, NodeId, NodeKind};

/// Identity and linkage fields common to both node kinds.
///
/// `parent_id` is a non-owning back-reference used only for lookup;
/// ownership flows strictly forward through `children`, whose order is
/// meaningful (first-registered connection, or decision-option order).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeCore {
    pub id: NodeId,
    pub title: String,
    pub parent_id: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub created_at: DateTime<Utc>,
}

impl NodeCore {
    pub(crate) fn new(title: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Self {
            id: NodeId::new(),
            title: title.into(),
            parent_id,
            children: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// One labeled successor of a decision node.
///
/// The decision's `options` list and its core `children` list are kept in
/// lockstep: same length, pairwise id-aligned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionOption {
    pub child_id: NodeId,
    pub label: String,
}

/// A timed workflow step with a single successor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionNode {
    pub core: NodeCore,
    pub status: ActionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// 0–100; non-decreasing while the node is running.
    pub progress: f64,
    /// Observed elapsed times (ms) from past completions, oldest first.
    pub duration_history: Vec<i64>,
    /// Current estimate: progress denominator and default for new siblings.
    pub expected_duration_ms: f64,
}

impl ActionNode {
    pub(crate) fn new(core: NodeCore, expected_duration_ms: f64) -> Self {
        Self {
            core,
            status: ActionStatus::Pending,
            started_at: None,
            finished_at: None,
            progress: 0.0,
            duration_history: Vec::new(),
            expected_duration_ms,
        }
    }

    /// Restore transient execution fields for replay. Duration history is
    /// durable and survives.
    pub(crate) fn clear_transient(&mut self) {
        self.status = ActionStatus::Pending;
        self.started_at = None;
        self.finished_at = None;
        self.progress = 0.0;
    }
}

/// A branching workflow step resolved by an external actor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionNode {
    pub core: NodeCore,
    pub status: DecisionStatus,
    pub options: Vec<DecisionOption>,
    /// Append-only record of previously chosen children. Analytics only,
    /// never ownership.
    pub chosen_history: Vec<NodeId>,
}

impl DecisionNode {
    pub(crate) fn new(core: NodeCore) -> Self {
        Self {
            core,
            status: DecisionStatus::Pending,
            options: Vec::new(),
            chosen_history: Vec::new(),
        }
    }

    /// Restore transient execution fields for replay. `chosen_history` is
    /// durable and survives.
    pub(crate) fn clear_transient(&mut self) {
        self.status = DecisionStatus::Pending;
    }
}

/// A node in the workflow tree: either a timed action or a decision point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GraphNode {
    Action(ActionNode),
    Decision(DecisionNode),
}

impl GraphNode {
    /// Shared identity/linkage fields.
    #[must_use]
    pub fn core(&self) -> &NodeCore {
        match self {
            GraphNode::Action(a) => &a.core,
            GraphNode::Decision(d) => &d.core,
        }
    }

    pub(crate) fn core_mut(&mut self) -> &mut NodeCore {
        match self {
            GraphNode::Action(a) => &mut a.core,
            GraphNode::Decision(d) => &mut d.core,
        }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.core().id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.core().title
    }

    #[must_use]
    pub fn parent_id(&self) -> Option<NodeId> {
        self.core().parent_id
    }

    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.core().children
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.core().created_at
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            GraphNode::Action(_) => NodeKind::Action,
            GraphNode::Decision(_) => NodeKind::Decision,
        }
    }

    #[must_use]
    pub fn as_action(&self) -> Option<&ActionNode> {
        match self {
            GraphNode::Action(a) => Some(a),
            GraphNode::Decision(_) => None,
        }
    }

    pub(crate) fn as_action_mut(&mut self) -> Option<&mut ActionNode> {
        match self {
            GraphNode::Action(a) => Some(a),
            GraphNode::Decision(_) => None,
        }
    }

    #[must_use]
    pub fn as_decision(&self) -> Option<&DecisionNode> {
        match self {
            GraphNode::Action(_) => None,
            GraphNode::Decision(d) => Some(d),
        }
    }

    pub(crate) fn as_decision_mut(&mut self) -> Option<&mut DecisionNode> {
        match self {
            GraphNode::Action(_) => None,
            GraphNode::Decision(d) => Some(d),
        }
    }

    pub(crate) fn clear_transient(&mut self) {
        match self {
            GraphNode::Action(a) => a.clear_transient(),
            GraphNode::Decision(d) => d.clear_transient(),
        }
    }
}
