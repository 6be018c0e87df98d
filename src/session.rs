//! Session facade: one graph, one runner, one undo history, one hub.
//!
//! [`TimelineSession`] owns the pieces and mediates between them, which is
//! where the single-owner discipline lives: the graph is mutated either by
//! history-wrapped edits or by the runner, never both at once. Edits and
//! undo are rejected with `Locked` while the runner is engaged
//! (playing, paused, or awaiting a decision).
//!
//! When a [`NodeStore`] is attached, every edit and every runtime mutation
//! of durable fields is mirrored to it. The in-memory mutation is applied
//! first; a store failure surfaces as `StoreUnavailable` with in-memory
//! state intact, so the caller can retry persistence without re-deriving
//! anything.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::codec::{self, GraphDocument, NodeRecord};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::estimator::DurationEstimator;
use crate::graph::{GraphNode, NodeDraft, WorkflowGraph};
use crate::history::EditHistory;
use crate::observer::{EngineEvent, ObserverHub};
use crate::runner::{ExecutionRunner, RunnerState, TickReport};
use crate::store::{NodePatch, NodeStore};
use crate::types::NodeId;

/// Owns a workflow graph together with its runner, undo history, observer
/// hub, and optional persistence mirror.
///
/// # Examples
///
/// ```rust
/// use chrono::Utc;
/// use chronoflow::config::EngineConfig;
/// use chronoflow::graph::NodeDraft;
/// use chronoflow::runner::RunnerState;
/// use chronoflow::session::TimelineSession;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), chronoflow::error::EngineError> {
/// let mut session = TimelineSession::new(
///     NodeDraft::action("warm up"),
///     EngineConfig::default().with_step_grace_ms(0),
/// );
/// let root = session.graph().root_id();
/// session.add_child(root, NodeDraft::action("stretch")).await?;
///
/// session.start(root, Utc::now())?;
/// assert_eq!(session.runner_state(), RunnerState::Playing);
/// # Ok(())
/// # }
/// ```
pub struct TimelineSession {
    graph: WorkflowGraph,
    runner: ExecutionRunner,
    history: EditHistory,
    hub: ObserverHub,
    estimator: DurationEstimator,
    config: EngineConfig,
    store: Option<Arc<dyn NodeStore>>,
}

impl TimelineSession {
    /// Create a session around a fresh graph containing only `root`.
    #[must_use]
    pub fn new(root: NodeDraft, config: EngineConfig) -> Self {
        Self::from_graph(WorkflowGraph::new(root), config)
    }

    /// Create a session around an existing graph (e.g. test fixtures).
    #[must_use]
    pub fn from_graph(graph: WorkflowGraph, config: EngineConfig) -> Self {
        Self {
            graph,
            runner: ExecutionRunner::new(&config),
            history: EditHistory::new(config.undo_depth),
            hub: ObserverHub::new(),
            estimator: DurationEstimator::new(config.default_expected_duration_ms),
            config,
            store: None,
        }
    }

    /// Restore a session from a persisted document.
    pub fn from_document(doc: GraphDocument, config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Self::from_graph(codec::import(doc)?, config))
    }

    /// Attach a persistence mirror.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn NodeStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    #[must_use]
    pub fn hub(&self) -> &ObserverHub {
        &self.hub
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn runner_state(&self) -> RunnerState {
        self.runner.state()
    }

    /// Ordered node ids visited by the current runner session.
    #[must_use]
    pub fn path(&self) -> &[NodeId] {
        self.runner.path()
    }

    #[must_use]
    pub fn undo_depth_used(&self) -> usize {
        self.history.len()
    }

    /// Flatten the graph into its persisted document form.
    #[must_use]
    pub fn export(&self) -> GraphDocument {
        codec::export(&self.graph)
    }

    /// Push a record for every current node to the store.
    ///
    /// Intended for the initial save of a graph the backend has not seen;
    /// subsequent edits and runs mirror themselves incrementally.
    pub async fn sync_store(&self) -> Result<(), EngineError> {
        let Some(store) = self.store.clone() else {
            return Ok(());
        };
        for id in self.graph.subtree_ids(self.graph.root_id()) {
            if let Some(node) = self.graph.get(id) {
                store.create_node(NodeRecord::from_node(node)).await?;
            }
        }
        Ok(())
    }

    fn ensure_unlocked(&self) -> Result<(), EngineError> {
        let state = self.runner.state();
        if state.is_engaged() {
            return Err(EngineError::Locked { state });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // History-wrapped edits
    // ------------------------------------------------------------------

    /// Append a new leaf under `parent_id`.
    ///
    /// Drafts without an explicit expected duration inherit the estimate of
    /// an action sibling, falling back to the configured default.
    #[tracing::instrument(skip(self, draft), err)]
    pub async fn add_child(
        &mut self,
        parent_id: NodeId,
        mut draft: NodeDraft,
    ) -> Result<NodeId, EngineError> {
        self.ensure_unlocked()?;
        if draft.expected_duration_ms.is_none() {
            draft.expected_duration_ms =
                Some(self.estimator.offer_for_new_child(&self.graph, parent_id));
        }

        self.history.record(&self.graph);
        let child_id = match self.graph.add_child(parent_id, draft) {
            Ok(id) => id,
            Err(err) => {
                self.history.discard_last();
                return Err(err);
            }
        };
        self.emit_node(child_id);
        self.emit_node(parent_id);

        if let Some(store) = self.store.clone() {
            let record = NodeRecord::from_node(self.graph.get(child_id).expect("child present"));
            store.create_node(record).await?;
            let parent = self.graph.get(parent_id).expect("parent present");
            store
                .update_node(parent_id, NodePatch::linkage(parent))
                .await?;
        }
        Ok(child_id)
    }

    /// Change a node's display title.
    #[tracing::instrument(skip(self, title), err)]
    pub async fn rename(
        &mut self,
        id: NodeId,
        title: impl Into<String>,
    ) -> Result<(), EngineError> {
        self.ensure_unlocked()?;
        let title = title.into();

        self.history.record(&self.graph);
        if let Err(err) = self.graph.rename(id, title.clone()) {
            self.history.discard_last();
            return Err(err);
        }
        self.emit_node(id);

        if let Some(store) = self.store.clone() {
            store
                .update_node(
                    id,
                    NodePatch {
                        title: Some(title),
                        ..NodePatch::default()
                    },
                )
                .await?;
        }
        Ok(())
    }

    /// Relabel the option addressing `child_id` on a decision node.
    #[tracing::instrument(skip(self, label), err)]
    pub async fn add_option(
        &mut self,
        decision_id: NodeId,
        child_id: NodeId,
        label: impl Into<String>,
    ) -> Result<(), EngineError> {
        self.ensure_unlocked()?;

        self.history.record(&self.graph);
        if let Err(err) = self.graph.add_option(decision_id, child_id, label) {
            self.history.discard_last();
            return Err(err);
        }
        self.emit_node(decision_id);

        if let Some(store) = self.store.clone() {
            let decision = self.graph.get(decision_id).expect("decision present");
            store
                .update_node(decision_id, NodePatch::linkage(decision))
                .await?;
        }
        Ok(())
    }

    /// Delete `id` and its whole subtree.
    #[tracing::instrument(skip(self), err)]
    pub async fn delete_subtree(&mut self, id: NodeId) -> Result<(), EngineError> {
        self.ensure_unlocked()?;
        let parent_id = self.graph.get(id).and_then(GraphNode::parent_id);

        self.history.record(&self.graph);
        let removed = match self.graph.delete_subtree(id) {
            Ok(removed) => removed,
            Err(err) => {
                self.history.discard_last();
                return Err(err);
            }
        };
        if let Some(parent_id) = parent_id {
            self.emit_node(parent_id);
        }

        if let Some(store) = self.store.clone() {
            for gone in removed {
                store.delete_node(gone).await?;
            }
            if let Some(parent_id) = parent_id {
                let parent = self.graph.get(parent_id).expect("parent present");
                store
                    .update_node(parent_id, NodePatch::linkage(parent))
                    .await?;
            }
        }
        Ok(())
    }

    /// Replace the live graph with the most recent snapshot.
    ///
    /// Returns `Ok(false)` when there is nothing to undo. Fails with
    /// `Locked` while the runner is engaged.
    #[tracing::instrument(skip(self), err)]
    pub fn undo(&mut self) -> Result<bool, EngineError> {
        self.ensure_unlocked()?;
        let Some(snapshot) = self.history.undo() else {
            return Ok(false);
        };
        self.graph = snapshot;
        for node in self.graph.nodes() {
            self.hub.emit(&EngineEvent::node_changed(node));
        }
        tracing::debug!(remaining = self.history.len(), "undo applied");
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Runner control
    // ------------------------------------------------------------------

    /// Begin a runner session at `start_id` and evaluate it immediately.
    pub fn start(&mut self, start_id: NodeId, now: DateTime<Utc>) -> Result<TickReport, EngineError> {
        self.runner.start(&mut self.graph, &self.hub, start_id, now)
    }

    /// Evaluate the current position against `now`, mirroring any durable
    /// changes (completions, resolutions) to the attached store.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickReport, EngineError> {
        let report = self.runner.tick(&mut self.graph, &self.hub, now)?;
        self.mirror_report(&report).await?;
        Ok(report)
    }

    /// Resolve the decision the session is suspended on.
    pub async fn resolve(
        &mut self,
        decision_id: NodeId,
        chosen_child_id: NodeId,
        now: DateTime<Utc>,
    ) -> Result<TickReport, EngineError> {
        let report =
            self.runner
                .resolve(&mut self.graph, &self.hub, decision_id, chosen_child_id, now)?;
        self.mirror_report(&report).await?;
        Ok(report)
    }

    /// Freeze tick evaluation; elapsed time on the current action is banked.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        self.runner.pause(&mut self.graph, &self.hub, now)
    }

    /// Unfreeze a paused session.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        self.runner.resume(&mut self.graph, &self.hub, now)
    }

    /// Stop the session unconditionally.
    pub fn stop(&mut self) {
        self.runner.stop(&self.hub);
    }

    /// Stop and restore every node's transient fields for replay.
    pub fn reset(&mut self) {
        self.runner.reset(&mut self.graph, &self.hub);
    }

    fn emit_node(&self, id: NodeId) {
        if let Some(node) = self.graph.get(id) {
            self.hub.emit(&EngineEvent::node_changed(node));
        }
    }

    /// Push durable runtime mutations described by `report` to the store.
    async fn mirror_report(&self, report: &TickReport) -> Result<(), EngineError> {
        let Some(store) = self.store.clone() else {
            return Ok(());
        };
        if let Some(completed) = report.completed
            && let Some(node) = self.graph.get(completed)
        {
            store.update_node(completed, NodePatch::timing(node)).await?;
        }
        if let Some(resolved) = report.resolved
            && let Some(decision) = self.graph.get(resolved).and_then(GraphNode::as_decision)
        {
            store
                .update_node(
                    resolved,
                    NodePatch {
                        chosen_history: Some(decision.chosen_history.clone()),
                        ..NodePatch::default()
                    },
                )
                .await?;
        }
        Ok(())
    }
}
