//! Bounded undo over the workflow graph.
//!
//! Before any mutating edit, the session pushes a deep snapshot of the
//! graph onto this stack. The stack is capped: the oldest snapshot is
//! discarded on overflow. There is no redo stack.

use std::collections::VecDeque;

use crate::graph::WorkflowGraph;

/// Snapshots retained by default.
pub const DEFAULT_UNDO_DEPTH: usize = 50;

/// A capped stack of graph snapshots.
#[derive(Clone, Debug, Default)]
pub struct EditHistory {
    snapshots: VecDeque<WorkflowGraph>,
    depth: usize,
}

impl EditHistory {
    /// Create a history retaining at most `depth` snapshots (minimum 1).
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            depth: depth.max(1),
        }
    }

    /// Push a deep snapshot, evicting the oldest one if at capacity.
    pub fn record(&mut self, graph: &WorkflowGraph) {
        if self.snapshots.len() == self.depth {
            self.snapshots.pop_front();
        }
        self.snapshots.push_back(graph.clone());
    }

    /// Pop and return the most recent snapshot.
    #[must_use]
    pub fn undo(&mut self) -> Option<WorkflowGraph> {
        self.snapshots.pop_back()
    }

    /// Drop the most recent snapshot without returning it. Used when an
    /// edit fails after its snapshot was taken, so undo never replays a
    /// no-op.
    pub(crate) fn discard_last(&mut self) {
        self.snapshots.pop_back();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
