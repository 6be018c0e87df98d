//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the engine reports through [`EngineError`].
//! Structural errors (`NotFound`, `InvalidOperation`, `Locked`,
//! `CorruptDocument`) are returned synchronously and never swallowed.
//! `MalformedGraph` halts the runner but preserves node state, and is
//! mirrored to observers as an event. `StoreUnavailable` is recoverable:
//! in-memory state stays authoritative and the persistence call may be
//! retried.

use miette::Diagnostic;
use thiserror::Error;

use crate::runner::RunnerState;
use crate::store::StoreError;
use crate::types::NodeId;

/// A structural invariant of the workflow tree that a document or graph
/// failed to uphold. Carried by [`EngineError::CorruptDocument`] so callers
/// see exactly which invariant was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("root node {0} is missing from the node set")]
    RootMissing(NodeId),

    #[error("root node {0} must not have a parent")]
    RootHasParent(NodeId),

    #[error("node {0} appears more than once in the document")]
    DuplicateNode(NodeId),

    #[error("node {child} references parent {parent}, which does not exist")]
    ParentMissing { child: NodeId, parent: NodeId },

    #[error("node {child} is not listed exactly once in the children of {parent}")]
    ParentLinkBroken { child: NodeId, parent: NodeId },

    #[error("node {parent} lists child {child}, which does not exist")]
    ChildMissing { parent: NodeId, child: NodeId },

    #[error("non-root node {0} has no parent")]
    Detached(NodeId),

    #[error("node {0} is not reachable from the root")]
    Unreachable(NodeId),

    #[error("node {0} is reachable through more than one path")]
    NotATree(NodeId),

    #[error("decision {0} has options out of lockstep with its children")]
    OptionsMismatch(NodeId),
}

/// Errors produced by graph edits, runner transitions, and codec import.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    /// A referenced node id is absent from the graph.
    #[error("node not found: {id}")]
    #[diagnostic(
        code(chronoflow::not_found),
        help("Check that the id refers to a node in this graph.")
    )]
    NotFound { id: NodeId },

    /// The operation is not valid in the current session or node state.
    #[error("invalid operation: {reason}")]
    #[diagnostic(code(chronoflow::invalid_operation))]
    InvalidOperation { reason: String },

    /// A graph mutation was attempted while a runner owns the graph.
    #[error("graph is locked by an active runner session ({state})")]
    #[diagnostic(
        code(chronoflow::locked),
        help("Stop the running session before editing or undoing.")
    )]
    Locked { state: RunnerState },

    /// The runner reached an action node with more than one child.
    ///
    /// This can only arise from imported data; the edit API refuses to
    /// attach a second child to an action node.
    #[error("malformed graph: action node {id} has {children} children")]
    #[diagnostic(
        code(chronoflow::malformed_graph),
        help("Wrap branching steps in a decision node.")
    )]
    MalformedGraph { id: NodeId, children: usize },

    /// An imported document violates a structural invariant.
    #[error("corrupt document: {violation}")]
    #[diagnostic(code(chronoflow::corrupt_document))]
    CorruptDocument {
        #[source]
        violation: InvariantViolation,
    },

    /// The persistence collaborator failed; in-memory state is intact.
    #[error("persistence store unavailable")]
    #[diagnostic(
        code(chronoflow::store_unavailable),
        help("In-memory state is still authoritative; retry the persistence call.")
    )]
    StoreUnavailable {
        #[source]
        source: StoreError,
    },
}

impl EngineError {
    /// Shorthand for [`EngineError::InvalidOperation`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }
}

impl From<InvariantViolation> for EngineError {
    fn from(violation: InvariantViolation) -> Self {
        Self::CorruptDocument { violation }
    }
}

impl From<StoreError> for EngineError {
    fn from(source: StoreError) -> Self {
        Self::StoreUnavailable { source }
    }
}
