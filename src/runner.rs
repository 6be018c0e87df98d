//! The execution runner: a tick-driven state machine that walks the
//! workflow tree one node at a time.
//!
//! The runner owns no clock and performs no I/O. An external driver calls
//! [`ExecutionRunner::tick`] with the current time (conceptually every
//! 100 ms; correctness only needs eventual evaluation), which makes the
//! whole engine deterministic and testable with synthetic timestamps.
//!
//! Session states:
//!
//! ```text
//! Idle → Playing ⇄ Paused
//!        Playing → AwaitingDecision → Playing
//!        Playing | Paused | AwaitingDecision → Stopped
//! ```
//!
//! `Stopped` is terminal; a session is reusable only via a fresh
//! [`start`](ExecutionRunner::start). At most one runner session is active
//! on a given graph at a time; the owning
//! [`TimelineSession`](crate::session::TimelineSession) rejects edits while
//! the runner is engaged.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::estimator::DurationEstimator;
use crate::graph::{GraphNode, WorkflowGraph};
use crate::observer::{EngineEvent, ObserverHub};
use crate::types::{ActionStatus, DecisionStatus, NodeId, NodeKind};

/// Session state of a runner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunnerState {
    /// No session has been started.
    #[default]
    Idle,
    /// Ticks advance the current node.
    Playing,
    /// Tick evaluation is frozen; path and position are unchanged.
    Paused,
    /// Forward progress is blocked until an external `resolve` call.
    AwaitingDecision,
    /// Terminal. Reusable only via a fresh `start`.
    Stopped,
}

impl RunnerState {
    /// Whether the runner currently owns the graph (edits are rejected).
    #[must_use]
    pub fn is_engaged(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused | Self::AwaitingDecision)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
            Self::AwaitingDecision => write!(f, "awaiting-decision"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Work deferred until the inter-step grace delay elapses, giving observers
/// time to render the transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PendingStep {
    /// Append `child` to the path, advance, then evaluate it.
    Enter { child: NodeId, due: DateTime<Utc> },
    /// The path was already advanced (decision resolution); just evaluate
    /// the current node once `due` passes.
    Evaluate { due: DateTime<Utc> },
}

impl PendingStep {
    fn due(&self) -> DateTime<Utc> {
        match self {
            Self::Enter { due, .. } | Self::Evaluate { due } => *due,
        }
    }
}

/// Outcome of one tick (or start/resolve, which evaluate immediately).
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    pub state: RunnerState,
    /// The node the session is positioned on, if any.
    pub current: Option<NodeId>,
    /// Progress of the current action after this evaluation, if it is one.
    pub progress: Option<f64>,
    /// Action that completed during this evaluation.
    pub completed: Option<NodeId>,
    /// Decision that was resolved (externally or automatically) during this
    /// evaluation.
    pub resolved: Option<NodeId>,
    /// Decision the session is now suspended on.
    pub awaiting: Option<NodeId>,
}

/// The tick-driven state machine that walks a workflow graph.
///
/// The runner borrows the graph per call rather than owning it, so the
/// session facade can hand the same graph to edits once the runner
/// disengages.
#[derive(Clone, Debug)]
pub struct ExecutionRunner {
    state: RunnerState,
    /// Ordered ids actually visited during this session.
    path: Vec<NodeId>,
    path_index: usize,
    /// Elapsed ms credited to the current action before its latest resume;
    /// keeps pause/resume from losing or double-counting time.
    accrued_ms: i64,
    pending: Option<PendingStep>,
    estimator: DurationEstimator,
    grace_ms: i64,
}

impl ExecutionRunner {
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            state: RunnerState::Idle,
            path: Vec::new(),
            path_index: 0,
            accrued_ms: 0,
            pending: None,
            estimator: DurationEstimator::new(config.default_expected_duration_ms),
            grace_ms: config.step_grace_ms.max(0),
        }
    }

    #[must_use]
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// The ordered ids visited during this session.
    #[must_use]
    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    /// The node the session is positioned on.
    #[must_use]
    pub fn current(&self) -> Option<NodeId> {
        self.path.get(self.path_index).copied()
    }

    #[must_use]
    pub fn estimator(&self) -> &DurationEstimator {
        &self.estimator
    }

    /// Begin a session at `start_id`.
    ///
    /// Fails with [`EngineError::NotFound`] (leaving the graph and the
    /// session untouched) if the node is absent. Otherwise the session
    /// enters `Playing` and the start node is evaluated immediately.
    #[tracing::instrument(skip(self, graph, hub), err)]
    pub fn start(
        &mut self,
        graph: &mut WorkflowGraph,
        hub: &ObserverHub,
        start_id: NodeId,
        now: DateTime<Utc>,
    ) -> Result<TickReport, EngineError> {
        if !graph.contains(start_id) {
            return Err(EngineError::NotFound { id: start_id });
        }
        self.state = RunnerState::Playing;
        self.path = vec![start_id];
        self.path_index = 0;
        self.accrued_ms = 0;
        self.pending = None;
        tracing::debug!(start = %start_id, "session started");
        hub.emit(&EngineEvent::session_changed(self.state, Some(start_id)));
        self.evaluate_current(graph, hub, now)
    }

    /// Evaluate the current position against `now`.
    ///
    /// Safe to call repeatedly: when the session is not `Playing`, or a
    /// grace delay has not yet elapsed, the call is a no-op.
    pub fn tick(
        &mut self,
        graph: &mut WorkflowGraph,
        hub: &ObserverHub,
        now: DateTime<Utc>,
    ) -> Result<TickReport, EngineError> {
        if self.state != RunnerState::Playing {
            return Ok(self.idle_report(None));
        }
        if let Some(pending) = self.pending {
            if now < pending.due() {
                return Ok(self.idle_report(None));
            }
            self.pending = None;
            if let PendingStep::Enter { child, .. } = pending {
                self.path.push(child);
                self.path_index += 1;
                self.accrued_ms = 0;
            }
        }
        self.evaluate_current(graph, hub, now)
    }

    /// Resolve the decision the session is suspended on.
    ///
    /// Fails with [`EngineError::InvalidOperation`] if the session is not
    /// awaiting a decision or `decision_id` is not the current node, and
    /// with [`EngineError::NotFound`] if `chosen_child_id` is not among the
    /// decision's children (the session stays suspended).
    #[tracing::instrument(skip(self, graph, hub), err)]
    pub fn resolve(
        &mut self,
        graph: &mut WorkflowGraph,
        hub: &ObserverHub,
        decision_id: NodeId,
        chosen_child_id: NodeId,
        now: DateTime<Utc>,
    ) -> Result<TickReport, EngineError> {
        if self.state != RunnerState::AwaitingDecision {
            return Err(EngineError::invalid(format!(
                "resolve requires an awaiting session (state is {})",
                self.state
            )));
        }
        if self.current() != Some(decision_id) {
            return Err(EngineError::invalid(format!(
                "decision {decision_id} is not the current node"
            )));
        }
        let node = graph
            .get_mut(decision_id)
            .ok_or(EngineError::NotFound { id: decision_id })?;
        let decision = node
            .as_decision_mut()
            .ok_or_else(|| EngineError::invalid(format!("node {decision_id} is not a decision")))?;
        if !decision.core.children.contains(&chosen_child_id) {
            return Err(EngineError::NotFound {
                id: chosen_child_id,
            });
        }

        decision.chosen_history.push(chosen_child_id);
        decision.status = DecisionStatus::Resolved;
        let snapshot = EngineEvent::node_changed(graph.get(decision_id).expect("decision present"));
        hub.emit(&snapshot);
        hub.emit(&EngineEvent::DecisionResolved {
            id: decision_id,
            chosen: chosen_child_id,
        });

        self.path.push(chosen_child_id);
        self.path_index += 1;
        self.accrued_ms = 0;
        self.state = RunnerState::Playing;
        self.pending = Some(PendingStep::Evaluate {
            due: now + Duration::milliseconds(self.grace_ms),
        });
        tracing::debug!(decision = %decision_id, chosen = %chosen_child_id, "decision resolved");
        hub.emit(&EngineEvent::session_changed(
            self.state,
            Some(chosen_child_id),
        ));
        let mut report = self.idle_report(None);
        report.resolved = Some(decision_id);
        Ok(report)
    }

    /// Freeze tick evaluation without altering the path or position.
    ///
    /// The current action's elapsed time is banked so resumption neither
    /// loses nor double-counts progress.
    pub fn pause(
        &mut self,
        graph: &mut WorkflowGraph,
        hub: &ObserverHub,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if self.state != RunnerState::Playing {
            return Err(EngineError::invalid(format!(
                "pause requires a playing session (state is {})",
                self.state
            )));
        }
        if let Some(id) = self.current()
            && let Some(action) = graph.get_mut(id).and_then(GraphNode::as_action_mut)
            && action.status == ActionStatus::Running
        {
            if let Some(started) = action.started_at.take() {
                self.accrued_ms += (now - started).num_milliseconds().max(0);
            }
            action.status = ActionStatus::Paused;
            let snapshot = EngineEvent::node_changed(graph.get(id).expect("node present"));
            hub.emit(&snapshot);
        }
        self.state = RunnerState::Paused;
        tracing::debug!(current = ?self.current(), "session paused");
        hub.emit(&EngineEvent::session_changed(self.state, self.current()));
        Ok(())
    }

    /// Unfreeze a paused session.
    pub fn resume(
        &mut self,
        graph: &mut WorkflowGraph,
        hub: &ObserverHub,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if self.state != RunnerState::Paused {
            return Err(EngineError::invalid(format!(
                "resume requires a paused session (state is {})",
                self.state
            )));
        }
        if let Some(id) = self.current()
            && let Some(action) = graph.get_mut(id).and_then(GraphNode::as_action_mut)
            && action.status == ActionStatus::Paused
        {
            action.status = ActionStatus::Running;
            action.started_at = Some(now);
            let snapshot = EngineEvent::node_changed(graph.get(id).expect("node present"));
            hub.emit(&snapshot);
        }
        self.state = RunnerState::Playing;
        tracing::debug!(current = ?self.current(), "session resumed");
        hub.emit(&EngineEvent::session_changed(self.state, self.current()));
        Ok(())
    }

    /// Transition to `Stopped` from any state, clearing deferred work so no
    /// further tick advances the session. Node histories already recorded
    /// are untouched.
    pub fn stop(&mut self, hub: &ObserverHub) {
        if self.state == RunnerState::Stopped {
            return;
        }
        self.state = RunnerState::Stopped;
        self.pending = None;
        tracing::debug!(path_len = self.path.len(), "session stopped");
        hub.emit(&EngineEvent::session_changed(self.state, self.current()));
    }

    /// Stop, then restore every node's transient fields for replay.
    ///
    /// Statuses return to pending, progress to zero, run timestamps are
    /// cleared; duration and chosen histories survive. The session returns
    /// to `Idle`, ready for a fresh `start`.
    pub fn reset(&mut self, graph: &mut WorkflowGraph, hub: &ObserverHub) {
        self.stop(hub);
        graph.clear_transient();
        for node in graph.nodes() {
            hub.emit(&EngineEvent::node_changed(node));
        }
        self.state = RunnerState::Idle;
        self.path.clear();
        self.path_index = 0;
        self.accrued_ms = 0;
        tracing::debug!("session reset for replay");
        hub.emit(&EngineEvent::session_changed(self.state, None));
    }

    fn idle_report(&self, completed: Option<NodeId>) -> TickReport {
        TickReport {
            state: self.state,
            current: self.current(),
            progress: None,
            completed,
            resolved: None,
            awaiting: match self.state {
                RunnerState::AwaitingDecision => self.current(),
                _ => None,
            },
        }
    }

    /// Evaluate the node the session is positioned on.
    fn evaluate_current(
        &mut self,
        graph: &mut WorkflowGraph,
        hub: &ObserverHub,
        now: DateTime<Utc>,
    ) -> Result<TickReport, EngineError> {
        let Some(id) = self.current() else {
            return Ok(self.idle_report(None));
        };
        let kind = graph
            .get(id)
            .map(GraphNode::kind)
            .ok_or(EngineError::NotFound { id })?;
        match kind {
            NodeKind::Action => self.evaluate_action(graph, hub, id, now),
            NodeKind::Decision => self.evaluate_decision(graph, hub, id, now),
        }
    }

    fn evaluate_action(
        &mut self,
        graph: &mut WorkflowGraph,
        hub: &ObserverHub,
        id: NodeId,
        now: DateTime<Utc>,
    ) -> Result<TickReport, EngineError> {
        let action = graph
            .get_mut(id)
            .and_then(GraphNode::as_action_mut)
            .ok_or(EngineError::NotFound { id })?;

        match action.status {
            ActionStatus::Running => {}
            ActionStatus::Pending => {
                action.status = ActionStatus::Running;
                action.started_at = Some(now);
                self.accrued_ms = 0;
                let snapshot = EngineEvent::node_changed(graph.get(id).expect("node present"));
                hub.emit(&snapshot);
            }
            // Replaying a node finished (or frozen) by an earlier session:
            // start it over from a clean slate.
            ActionStatus::Completed | ActionStatus::Paused => {
                let action = graph
                    .get_mut(id)
                    .and_then(GraphNode::as_action_mut)
                    .expect("action present");
                action.clear_transient();
                action.status = ActionStatus::Running;
                action.started_at = Some(now);
                self.accrued_ms = 0;
                let snapshot = EngineEvent::node_changed(graph.get(id).expect("node present"));
                hub.emit(&snapshot);
            }
        }

        let action = graph
            .get_mut(id)
            .and_then(GraphNode::as_action_mut)
            .expect("action present");
        let started = match action.started_at {
            Some(started) => started,
            None => {
                action.started_at = Some(now);
                now
            }
        };
        let elapsed_ms = self.accrued_ms + (now - started).num_milliseconds().max(0);
        let expected = action.expected_duration_ms.max(1.0);
        let pct = ((elapsed_ms as f64 / expected) * 100.0).min(100.0);
        if pct > action.progress {
            action.progress = pct;
            let snapshot = EngineEvent::node_changed(graph.get(id).expect("node present"));
            hub.emit(&snapshot);
        }

        let action = graph
            .get_mut(id)
            .and_then(GraphNode::as_action_mut)
            .expect("action present");
        if action.progress < 100.0 {
            let progress = action.progress;
            return Ok(TickReport {
                state: self.state,
                current: Some(id),
                progress: Some(progress),
                completed: None,
                resolved: None,
                awaiting: None,
            });
        }

        // Completion fires exactly once: the node leaves Running here and
        // the session immediately advances, stops, or errors.
        action.status = ActionStatus::Completed;
        action.finished_at = Some(now);
        let expected_ms = self.estimator.record_completion(action, elapsed_ms);
        let children = action.core.children.clone();
        let snapshot = EngineEvent::node_changed(graph.get(id).expect("node present"));
        hub.emit(&snapshot);
        hub.emit(&EngineEvent::ActionCompleted {
            id,
            elapsed_ms,
            expected_ms,
        });
        tracing::debug!(action = %id, elapsed_ms, expected_ms, "action completed");

        match children.len() {
            0 => {
                // Successful end of path.
                self.state = RunnerState::Stopped;
                self.pending = None;
                hub.emit(&EngineEvent::session_changed(self.state, Some(id)));
                Ok(self.idle_report(Some(id)))
            }
            1 => {
                self.pending = Some(PendingStep::Enter {
                    child: children[0],
                    due: now + Duration::milliseconds(self.grace_ms),
                });
                Ok(TickReport {
                    state: self.state,
                    current: Some(id),
                    progress: Some(100.0),
                    completed: Some(id),
                    resolved: None,
                    awaiting: None,
                })
            }
            n => {
                // User-authored data defect: an action cannot choose among
                // successors. Halt without touching the children.
                self.state = RunnerState::Stopped;
                self.pending = None;
                hub.emit(&EngineEvent::MalformedGraph { id, children: n });
                hub.emit(&EngineEvent::session_changed(self.state, Some(id)));
                tracing::warn!(action = %id, children = n, "malformed graph halted session");
                Err(EngineError::MalformedGraph { id, children: n })
            }
        }
    }

    fn evaluate_decision(
        &mut self,
        graph: &mut WorkflowGraph,
        hub: &ObserverHub,
        id: NodeId,
        now: DateTime<Utc>,
    ) -> Result<TickReport, EngineError> {
        let decision = graph
            .get_mut(id)
            .and_then(GraphNode::as_decision_mut)
            .ok_or(EngineError::NotFound { id })?;

        if decision.status != DecisionStatus::Active {
            decision.status = DecisionStatus::Active;
            let snapshot = EngineEvent::node_changed(graph.get(id).expect("node present"));
            hub.emit(&snapshot);
        }

        let decision = graph
            .get_mut(id)
            .and_then(GraphNode::as_decision_mut)
            .expect("decision present");
        match decision.options.len() {
            0 => {
                // No successors to offer: terminate like a leaf action.
                self.state = RunnerState::Stopped;
                self.pending = None;
                hub.emit(&EngineEvent::session_changed(self.state, Some(id)));
                Ok(self.idle_report(None))
            }
            1 => {
                // A single option needs no external input.
                let chosen = decision.options[0].child_id;
                decision.chosen_history.push(chosen);
                decision.status = DecisionStatus::Resolved;
                let snapshot = EngineEvent::node_changed(graph.get(id).expect("node present"));
                hub.emit(&snapshot);
                hub.emit(&EngineEvent::DecisionResolved { id, chosen });
                tracing::debug!(decision = %id, %chosen, "decision auto-resolved");

                self.path.push(chosen);
                self.path_index += 1;
                self.accrued_ms = 0;
                self.pending = Some(PendingStep::Evaluate {
                    due: now + Duration::milliseconds(self.grace_ms),
                });
                let mut report = self.idle_report(None);
                report.resolved = Some(id);
                Ok(report)
            }
            _ => {
                self.state = RunnerState::AwaitingDecision;
                hub.emit(&EngineEvent::session_changed(self.state, Some(id)));
                tracing::debug!(decision = %id, "awaiting external resolution");
                Ok(self.idle_report(None))
            }
        }
    }
}
