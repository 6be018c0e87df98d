//! Store doubles for persistence tests.

use async_trait::async_trait;

use chronoflow::codec::NodeRecord;
use chronoflow::store::{NodePatch, NodeStore, StoreError};
use chronoflow::types::NodeId;

/// Store that refuses every call, simulating an unreachable backend.
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl NodeStore for FailingStore {
    async fn create_node(&self, _record: NodeRecord) -> Result<NodeId, StoreError> {
        Err(StoreError::unavailable("backend offline"))
    }

    async fn update_node(&self, _id: NodeId, _patch: NodePatch) -> Result<(), StoreError> {
        Err(StoreError::unavailable("backend offline"))
    }

    async fn delete_node(&self, _id: NodeId) -> Result<(), StoreError> {
        Err(StoreError::unavailable("backend offline"))
    }
}
