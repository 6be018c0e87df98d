//! The workflow tree: an arena of nodes keyed by id, plus structural
//! invariants.
//!
//! [`WorkflowGraph`] owns every node in an id→node map and maintains the
//! tree shape by construction: edits can only append leaves or delete whole
//! subtrees, so no edit can introduce a cycle or orphan. [`validate`]
//! (used by the codec on import, where documents are untrusted) checks the
//! full invariant set by traversal.
//!
//! Locking against a running session is enforced one level up by
//! [`TimelineSession`](crate::session::TimelineSession); the graph itself
//! has no knowledge of runners.
//!
//! [`validate`]: WorkflowGraph::validate

pub mod node;


use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;

use crate::error::{EngineError, InvariantViolation};
use crate::estimator::DEFAULT_EXPECTED_DURATION_MS;
use crate::types::{NodeId, NodeKind};

pub use node::{ActionNode, DecisionNode, DecisionOption, GraphNode, NodeCore};

/// Blueprint for a node about to be added to the graph.
///
/// # Examples
///
/// ```rust
/// use chronoflow::graph::{NodeDraft, WorkflowGraph};
///
/// let mut graph = WorkflowGraph::new(NodeDraft::action("warm up"));
/// let root = graph.root_id();
/// let next = graph
///     .add_child(root, NodeDraft::action("stretch").with_expected_duration_ms(2_000.0))
///     .unwrap();
/// assert_eq!(graph.get(next).unwrap().parent_id(), Some(root));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDraft {
    pub kind: NodeKind,
    pub title: String,
    /// Expected duration for action drafts; `None` means "let the caller's
    /// estimator decide" and ultimately falls back to the fixed default.
    pub expected_duration_ms: Option<f64>,
}

impl NodeDraft {
    #[must_use]
    pub fn action(title: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Action,
            title: title.into(),
            expected_duration_ms: None,
        }
    }

    #[must_use]
    pub fn decision(title: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Decision,
            title: title.into(),
            expected_duration_ms: None,
        }
    }

    #[must_use]
    pub fn with_expected_duration_ms(mut self, ms: f64) -> Self {
        self.expected_duration_ms = Some(ms);
        self
    }
}

/// A rooted tree of workflow nodes stored in an arena keyed by [`NodeId`].
#[derive(Clone, Debug, PartialEq)]
pub struct WorkflowGraph {
    nodes: FxHashMap<NodeId, GraphNode>,
    root_id: NodeId,
    last_edited_at: DateTime<Utc>,
}

impl WorkflowGraph {
    /// Create a graph containing only the root node described by `root`.
    #[must_use]
    pub fn new(root: NodeDraft) -> Self {
        let core = NodeCore::new(root.title, None);
        let root_id = core.id;
        let node = match root.kind {
            NodeKind::Action => GraphNode::Action(ActionNode::new(
                core,
                root.expected_duration_ms
                    .unwrap_or(DEFAULT_EXPECTED_DURATION_MS),
            )),
            NodeKind::Decision => GraphNode::Decision(DecisionNode::new(core)),
        };
        let mut nodes = FxHashMap::default();
        nodes.insert(root_id, node);
        Self {
            nodes,
            root_id,
            last_edited_at: Utc::now(),
        }
    }

    /// Reassemble a graph from already-built parts (codec import path).
    /// The caller is responsible for running [`validate`](Self::validate).
    pub(crate) fn from_parts(
        nodes: FxHashMap<NodeId, GraphNode>,
        root_id: NodeId,
        last_edited_at: DateTime<Utc>,
    ) -> Self {
        Self {
            nodes,
            root_id,
            last_edited_at,
        }
    }

    #[must_use]
    pub fn root_id(&self) -> NodeId {
        self.root_id
    }

    #[must_use]
    pub fn last_edited_at(&self) -> DateTime<Utc> {
        self.last_edited_at
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Look up a node. No side effects.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        self.nodes.get_mut(&id)
    }

    /// Iterate all nodes in arbitrary arena order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Append a new leaf under `parent_id`.
    ///
    /// Fails with [`EngineError::NotFound`] if the parent is absent, and
    /// with [`EngineError::InvalidOperation`] if the parent is an action
    /// that already has a child (actions have a single successor; branching
    /// requires a decision node). Adding under a decision also appends a
    /// lockstep option labeled with the child's title; relabel it with
    /// [`add_option`](Self::add_option).
    pub fn add_child(&mut self, parent_id: NodeId, draft: NodeDraft) -> Result<NodeId, EngineError> {
        let parent = self
            .nodes
            .get(&parent_id)
            .ok_or(EngineError::NotFound { id: parent_id })?;
        if parent.kind().is_action() && !parent.children().is_empty() {
            return Err(EngineError::invalid(format!(
                "action node {parent_id} already has a successor; add a decision node to branch"
            )));
        }

        let core = NodeCore::new(draft.title.clone(), Some(parent_id));
        let child_id = core.id;
        let node = match draft.kind {
            NodeKind::Action => GraphNode::Action(ActionNode::new(
                core,
                draft
                    .expected_duration_ms
                    .unwrap_or(DEFAULT_EXPECTED_DURATION_MS),
            )),
            NodeKind::Decision => GraphNode::Decision(DecisionNode::new(core)),
        };
        self.nodes.insert(child_id, node);

        let parent = self
            .nodes
            .get_mut(&parent_id)
            .expect("parent present; checked above");
        parent.core_mut().children.push(child_id);
        if let Some(decision) = parent.as_decision_mut() {
            decision.options.push(DecisionOption {
                child_id,
                label: draft.title,
            });
        }
        self.touch();
        tracing::debug!(parent = %parent_id, child = %child_id, kind = %draft.kind, "child added");
        Ok(child_id)
    }

    /// Change a node's display title.
    pub fn rename(&mut self, id: NodeId, title: impl Into<String>) -> Result<(), EngineError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(EngineError::NotFound { id })?;
        node.core_mut().title = title.into();
        self.touch();
        Ok(())
    }

    /// Set the label of the option addressing `child_id` on a decision node.
    ///
    /// The children/options lists stay in lockstep, so this only relabels an
    /// existing pair; it never attaches a new child.
    pub fn add_option(
        &mut self,
        decision_id: NodeId,
        child_id: NodeId,
        label: impl Into<String>,
    ) -> Result<(), EngineError> {
        let node = self
            .nodes
            .get_mut(&decision_id)
            .ok_or(EngineError::NotFound { id: decision_id })?;
        let decision = node.as_decision_mut().ok_or_else(|| {
            EngineError::invalid(format!("node {decision_id} is not a decision"))
        })?;
        let option = decision
            .options
            .iter_mut()
            .find(|o| o.child_id == child_id)
            .ok_or(EngineError::NotFound { id: child_id })?;
        option.label = label.into();
        self.touch();
        Ok(())
    }

    /// Ids of `id` and all its descendants, parents before children.
    #[must_use]
    pub fn subtree_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                out.push(current);
                stack.extend(node.children().iter().rev().copied());
            }
        }
        out
    }

    /// Delete `id` and every descendant, stripping the id from its parent's
    /// children (and option, for decision parents).
    ///
    /// Returns the removed ids so persistence mirrors can issue deletes.
    /// Fails with [`EngineError::InvalidOperation`] for the root.
    pub fn delete_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>, EngineError> {
        if id == self.root_id {
            return Err(EngineError::invalid("cannot delete the root node"));
        }
        let node = self.nodes.get(&id).ok_or(EngineError::NotFound { id })?;
        let parent_id = node.parent_id();

        let removed = self.subtree_ids(id);
        for gone in &removed {
            self.nodes.remove(gone);
        }
        if let Some(parent_id) = parent_id
            && let Some(parent) = self.nodes.get_mut(&parent_id)
        {
            parent.core_mut().children.retain(|c| *c != id);
            if let Some(decision) = parent.as_decision_mut() {
                decision.options.retain(|o| o.child_id != id);
            }
        }
        self.touch();
        tracing::debug!(subtree = %id, removed = removed.len(), "subtree deleted");
        Ok(removed)
    }

    /// Restore every node's transient execution fields (status, progress,
    /// timestamps) for replay. Duration and chosen histories are kept.
    pub(crate) fn clear_transient(&mut self) {
        for node in self.nodes.values_mut() {
            node.clear_transient();
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_edited_at = Utc::now();
    }

    /// Check the full structural invariant set by traversal.
    ///
    /// Used on untrusted data (codec import) and in tests. Note that an
    /// action node with more than one child is deliberately *not* a
    /// violation here: it is user-data damage the runner surfaces at
    /// evaluation time as `MalformedGraph`.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let root = self
            .nodes
            .get(&self.root_id)
            .ok_or(InvariantViolation::RootMissing(self.root_id))?;
        if root.parent_id().is_some() {
            return Err(InvariantViolation::RootHasParent(self.root_id));
        }

        for node in self.nodes.values() {
            let id = node.id();
            if id != self.root_id {
                let parent_id = node
                    .parent_id()
                    .ok_or(InvariantViolation::Detached(id))?;
                let parent = self.nodes.get(&parent_id).ok_or(
                    InvariantViolation::ParentMissing {
                        child: id,
                        parent: parent_id,
                    },
                )?;
                let listed = parent.children().iter().filter(|c| **c == id).count();
                if listed != 1 {
                    return Err(InvariantViolation::ParentLinkBroken {
                        child: id,
                        parent: parent_id,
                    });
                }
            }
            for child in node.children() {
                if !self.nodes.contains_key(child) {
                    return Err(InvariantViolation::ChildMissing {
                        parent: id,
                        child: *child,
                    });
                }
            }
            if let Some(decision) = node.as_decision() {
                let lockstep = decision.options.len() == decision.core.children.len()
                    && decision
                        .options
                        .iter()
                        .zip(decision.core.children.iter())
                        .all(|(option, child)| option.child_id == *child);
                if !lockstep {
                    return Err(InvariantViolation::OptionsMismatch(id));
                }
            }
        }

        // Reachability sweep: every node exactly once from the root.
        let mut seen: FxHashMap<NodeId, ()> = FxHashMap::default();
        let mut stack = vec![self.root_id];
        while let Some(current) = stack.pop() {
            if seen.insert(current, ()).is_some() {
                return Err(InvariantViolation::NotATree(current));
            }
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children().iter().copied());
            }
        }
        if seen.len() != self.nodes.len() {
            let unreachable = self
                .nodes
                .keys()
                .find(|id| !seen.contains_key(id))
                .copied()
                .expect("count mismatch implies an unvisited node");
            return Err(InvariantViolation::Unreachable(unreachable));
        }
        Ok(())
    }
}
