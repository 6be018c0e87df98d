//! Core identifier and status types for the chronoflow timeline engine.
//!
//! This module defines the vocabulary shared by every other module: node
//! identity, the action/decision kind tag, and the per-node status enums the
//! runner drives through their lifecycles.
//!
//! For session-level runtime state, see [`crate::runner::RunnerState`].

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque unique identifier for a node in a workflow graph.
///
/// Backed by a v4 UUID and immutable once created. Serialized as the UUID's
/// canonical string form so persisted documents stay human-inspectable.
///
/// # Examples
///
/// ```rust
/// use chronoflow::types::NodeId;
///
/// let a = NodeId::new();
/// let b = NodeId::new();
/// assert_ne!(a, b);
///
/// // Round-trips through its string form.
/// let parsed: NodeId = a.to_string().parse().unwrap();
/// assert_eq!(a, parsed);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID (used when reconstructing from a document).
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Discriminates the two node shapes a workflow tree is built from.
///
/// Persisted documents carry this tag as `"action"` / `"decision"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A timed step with at most one successor.
    Action,
    /// A branching step offering labeled successors, resolved externally.
    Decision,
}

impl NodeKind {
    /// Returns `true` for [`Action`](Self::Action).
    #[must_use]
    pub fn is_action(&self) -> bool {
        matches!(self, Self::Action)
    }

    /// Returns `true` for [`Decision`](Self::Decision).
    #[must_use]
    pub fn is_decision(&self) -> bool {
        matches!(self, Self::Decision)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action => write!(f, "action"),
            Self::Decision => write!(f, "decision"),
        }
    }
}

/// Lifecycle of an action node while a runner walks the graph.
///
/// `Pending → Running → Completed`, with `Paused` reachable from `Running`
/// while the session itself is paused. Transitions are driven exclusively by
/// the runner; edits never touch status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    #[default]
    Pending,
    Running,
    Paused,
    Completed,
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Lifecycle of a decision node.
///
/// `Pending → Active → Resolved`; `Active` is the visible counterpart of the
/// session's `AwaitingDecision` state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    #[default]
    Pending,
    Active,
    Resolved,
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}
