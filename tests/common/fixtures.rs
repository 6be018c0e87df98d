//! Graph and clock fixtures shared by the integration tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use chronoflow::config::EngineConfig;
use chronoflow::graph::{NodeDraft, WorkflowGraph};
use chronoflow::types::NodeId;

/// Fixed origin for synthetic timelines; tests never read a real clock.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// `t0` shifted forward by `offset` milliseconds.
pub fn at(offset_ms: i64) -> DateTime<Utc> {
    t0() + Duration::milliseconds(offset_ms)
}

/// Config with the inter-step grace delay disabled, so ticks advance
/// immediately and tests only reason about action durations.
pub fn no_grace_config() -> EngineConfig {
    EngineConfig::default().with_step_grace_ms(0)
}

/// Node ids of the branching fixture graph.
pub struct DecisionFlow {
    pub root: NodeId,
    pub decision: NodeId,
    pub left: NodeId,
    pub right: NodeId,
}

/// The branching graph used throughout the runner tests:
///
/// ```text
/// root (action, 2000 ms)
/// └── decision
///     ├── left  (action, 1000 ms)
///     └── right (action, 1000 ms)
/// ```
pub fn decision_flow() -> (WorkflowGraph, DecisionFlow) {
    let mut graph =
        WorkflowGraph::new(NodeDraft::action("prepare").with_expected_duration_ms(2_000.0));
    let root = graph.root_id();
    let decision = graph
        .add_child(root, NodeDraft::decision("pick a path"))
        .unwrap();
    let left = graph
        .add_child(
            decision,
            NodeDraft::action("left").with_expected_duration_ms(1_000.0),
        )
        .unwrap();
    let right = graph
        .add_child(
            decision,
            NodeDraft::action("right").with_expected_duration_ms(1_000.0),
        )
        .unwrap();
    (
        graph,
        DecisionFlow {
            root,
            decision,
            left,
            right,
        },
    )
}

/// A straight two-action chain: root (1000 ms) → next (1000 ms).
pub fn two_step_chain() -> (WorkflowGraph, NodeId, NodeId) {
    let mut graph =
        WorkflowGraph::new(NodeDraft::action("first").with_expected_duration_ms(1_000.0));
    let root = graph.root_id();
    let next = graph
        .add_child(
            root,
            NodeDraft::action("second").with_expected_duration_ms(1_000.0),
        )
        .unwrap();
    (graph, root, next)
}
