/*!
Persistence codec for workflow graphs.

Translates between the in-memory [`WorkflowGraph`] and a flattened,
serde-friendly [`GraphDocument`]: one camelCase record per node plus the
root id and last-edited timestamp. Documents carry only durable fields
(titles, linkage, durations, histories), never transient execution state,
so an imported graph is always replay-ready.

Import treats documents as untrusted: the reconstructed graph is validated
against the full structural invariant set and rejected with
`CorruptDocument` (naming the violated invariant) on any failure. The one
deliberate exception is an action node with multiple children, which is
allowed through so the runner can surface it as `MalformedGraph` at
evaluation time.

This module performs no I/O; it is pure data transformation plus JSON glue.
*/

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, InvariantViolation};
use crate::estimator::DEFAULT_EXPECTED_DURATION_MS;
use crate::graph::{ActionNode, DecisionNode, DecisionOption, GraphNode, NodeCore, WorkflowGraph};
use crate::types::{ActionStatus, DecisionStatus, NodeId, NodeKind};

/// Flattened persisted form of one node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: NodeId,
    pub kind: NodeKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub child_ids: Vec<NodeId>,
    pub created_at: DateTime<Utc>,
    /// Action only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_duration: Option<f64>,
    /// Action only: observed elapsed times (ms), oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duration_history: Vec<i64>,
    /// Decision only: labeled successors, in child order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<DecisionOption>,
    /// Decision only: previously chosen children, append-only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chosen_history: Vec<NodeId>,
}

impl NodeRecord {
    /// Snapshot the durable fields of a live node.
    #[must_use]
    pub fn from_node(node: &GraphNode) -> Self {
        let core = node.core();
        let mut record = Self {
            id: core.id,
            kind: node.kind(),
            title: core.title.clone(),
            parent_id: core.parent_id,
            child_ids: core.children.clone(),
            created_at: core.created_at,
            expected_duration: None,
            duration_history: Vec::new(),
            options: Vec::new(),
            chosen_history: Vec::new(),
        };
        match node {
            GraphNode::Action(action) => {
                record.expected_duration = Some(action.expected_duration_ms);
                record.duration_history = action.duration_history.clone();
            }
            GraphNode::Decision(decision) => {
                record.options = decision.options.clone();
                record.chosen_history = decision.chosen_history.clone();
            }
        }
        record
    }

    fn into_node(self) -> GraphNode {
        let core = NodeCore {
            id: self.id,
            title: self.title,
            parent_id: self.parent_id,
            children: self.child_ids,
            created_at: self.created_at,
        };
        match self.kind {
            NodeKind::Action => GraphNode::Action(ActionNode {
                core,
                status: ActionStatus::Pending,
                started_at: None,
                finished_at: None,
                progress: 0.0,
                duration_history: self.duration_history,
                expected_duration_ms: self
                    .expected_duration
                    .unwrap_or(DEFAULT_EXPECTED_DURATION_MS),
            }),
            NodeKind::Decision => GraphNode::Decision(DecisionNode {
                core,
                status: DecisionStatus::Pending,
                options: self.options,
                chosen_history: self.chosen_history,
            }),
        }
    }
}

/// Complete persisted form of a workflow graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    pub root_id: NodeId,
    pub last_edited_at: DateTime<Utc>,
    pub nodes: Vec<NodeRecord>,
}

impl GraphDocument {
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Flatten a graph into its persisted document.
///
/// Node records are emitted in depth-first preorder from the root, so
/// exports of the same graph are byte-stable.
#[must_use]
pub fn export(graph: &WorkflowGraph) -> GraphDocument {
    let mut nodes = Vec::with_capacity(graph.len());
    let mut stack = vec![graph.root_id()];
    while let Some(id) = stack.pop() {
        if let Some(node) = graph.get(id) {
            nodes.push(NodeRecord::from_node(node));
            stack.extend(node.children().iter().rev().copied());
        }
    }
    GraphDocument {
        root_id: graph.root_id(),
        last_edited_at: graph.last_edited_at(),
        nodes,
    }
}

/// Reconstruct a graph from a persisted document, validating every
/// structural invariant.
///
/// Fails with [`EngineError::CorruptDocument`] naming the violated
/// invariant. `import(export(g))` is deep-equal to `g` for any graph whose
/// transient execution fields are at rest.
pub fn import(doc: GraphDocument) -> Result<WorkflowGraph, EngineError> {
    let mut nodes: FxHashMap<NodeId, GraphNode> = FxHashMap::default();
    for record in doc.nodes {
        let id = record.id;
        if nodes.insert(id, record.into_node()).is_some() {
            return Err(InvariantViolation::DuplicateNode(id).into());
        }
    }
    let graph = WorkflowGraph::from_parts(nodes, doc.root_id, doc.last_edited_at);
    graph.validate()?;
    tracing::debug!(nodes = graph.len(), root = %graph.root_id(), "document imported");
    Ok(graph)
}
