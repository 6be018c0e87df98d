//! Persistence collaborator interface.
//!
//! The engine issues per-node create/update/delete calls against a
//! [`NodeStore`] but does not implement the transport; hosts plug in a
//! backend (the bundled [`InMemoryNodeStore`] is the reference
//! implementation and the test double). Store failures surface to the
//! caller as [`EngineError::StoreUnavailable`](crate::error::EngineError)
//! and never corrupt in-memory state: the session applies its mutation
//! first and the caller may simply retry the persistence call.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::codec::NodeRecord;
use crate::graph::{DecisionOption, GraphNode};
use crate::types::NodeId;

/// Errors reported by a persistence backend.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// The backend could not be reached or refused the call.
    #[error("store unavailable: {0}")]
    #[diagnostic(code(chronoflow::store::unavailable))]
    Unavailable(String),

    /// The backend has no record for the referenced node.
    #[error("store has no record for node {id}")]
    #[diagnostic(code(chronoflow::store::missing_record))]
    MissingRecord { id: NodeId },

    /// The backend could not serialize or deserialize a record.
    #[error(transparent)]
    #[diagnostic(code(chronoflow::store::serde))]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }
}

/// Partial update applied to a stored node record.
///
/// Only the populated fields change; everything else is left as stored.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodePatch {
    pub title: Option<String>,
    pub child_ids: Option<Vec<NodeId>>,
    pub expected_duration: Option<f64>,
    pub duration_history: Option<Vec<i64>>,
    pub options: Option<Vec<DecisionOption>>,
    pub chosen_history: Option<Vec<NodeId>>,
}

impl NodePatch {
    /// Patch capturing a node's current linkage (children and options).
    #[must_use]
    pub fn linkage(node: &GraphNode) -> Self {
        Self {
            child_ids: Some(node.children().to_vec()),
            options: node
                .as_decision()
                .map(|decision| decision.options.clone()),
            ..Self::default()
        }
    }

    /// Patch capturing a node's learned timing after a completion.
    #[must_use]
    pub fn timing(node: &GraphNode) -> Self {
        match node.as_action() {
            Some(action) => Self {
                expected_duration: Some(action.expected_duration_ms),
                duration_history: Some(action.duration_history.clone()),
                ..Self::default()
            },
            None => Self::default(),
        }
    }

    /// Apply this patch on top of a stored record.
    pub fn apply(&self, record: &mut NodeRecord) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(child_ids) = &self.child_ids {
            record.child_ids = child_ids.clone();
        }
        if let Some(expected) = self.expected_duration {
            record.expected_duration = Some(expected);
        }
        if let Some(history) = &self.duration_history {
            record.duration_history = history.clone();
        }
        if let Some(options) = &self.options {
            record.options = options.clone();
        }
        if let Some(history) = &self.chosen_history {
            record.chosen_history = history.clone();
        }
    }
}

/// Pluggable persistence backend consuming flattened node records.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Persist a new node record, returning its id.
    async fn create_node(&self, record: NodeRecord) -> Result<NodeId, StoreError>;

    /// Apply a partial update to an existing record.
    async fn update_node(&self, id: NodeId, patch: NodePatch) -> Result<(), StoreError>;

    /// Remove a record.
    async fn delete_node(&self, id: NodeId) -> Result<(), StoreError>;
}

/// Reference store keeping records in a process-local map.
#[derive(Debug, Default)]
pub struct InMemoryNodeStore {
    records: Mutex<FxHashMap<NodeId, NodeRecord>>,
}

impl InMemoryNodeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<NodeRecord> {
        self.records.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl NodeStore for InMemoryNodeStore {
    async fn create_node(&self, record: NodeRecord) -> Result<NodeId, StoreError> {
        let id = record.id;
        self.records.lock().unwrap().insert(id, record);
        Ok(id)
    }

    async fn update_node(&self, id: NodeId, patch: NodePatch) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or(StoreError::MissingRecord { id })?;
        patch.apply(record);
        Ok(())
    }

    async fn delete_node(&self, id: NodeId) -> Result<(), StoreError> {
        self.records.lock().unwrap().remove(&id);
        Ok(())
    }
}
