//! Session lifecycle tests driving the runner with synthetic timestamps.

mod common;
use common::*;

use chronoflow::codec;
use chronoflow::error::EngineError;
use chronoflow::graph::{NodeDraft, WorkflowGraph};
use chronoflow::observer::ObserverHub;
use chronoflow::runner::{ExecutionRunner, RunnerState};
use chronoflow::types::{ActionStatus, DecisionStatus, NodeId};

fn runner() -> (ExecutionRunner, ObserverHub) {
    (ExecutionRunner::new(&no_grace_config()), ObserverHub::new())
}

#[test]
fn scenario_full_decision_flow() {
    let (mut graph, ids) = decision_flow();
    let (mut runner, hub) = runner();

    runner.start(&mut graph, &hub, ids.root, t0()).unwrap();
    assert_eq!(runner.state(), RunnerState::Playing);

    // Root runs for its expected 2000 ms, then the decision suspends us.
    runner.tick(&mut graph, &hub, at(1_000)).unwrap();
    assert_eq!(
        graph.get(ids.root).unwrap().as_action().unwrap().status,
        ActionStatus::Running
    );
    runner.tick(&mut graph, &hub, at(2_000)).unwrap();
    assert_eq!(
        graph.get(ids.root).unwrap().as_action().unwrap().status,
        ActionStatus::Completed
    );
    let report = runner.tick(&mut graph, &hub, at(2_000)).unwrap();
    assert_eq!(report.state, RunnerState::AwaitingDecision);
    assert_eq!(report.awaiting, Some(ids.decision));
    assert_eq!(
        graph
            .get(ids.decision)
            .unwrap()
            .as_decision()
            .unwrap()
            .status,
        DecisionStatus::Active
    );

    // Resolving resumes playback on the chosen branch.
    let report = runner
        .resolve(&mut graph, &hub, ids.decision, ids.left, at(2_100))
        .unwrap();
    assert_eq!(report.state, RunnerState::Playing);
    assert_eq!(runner.path(), &[ids.root, ids.decision, ids.left]);
    let decision = graph.get(ids.decision).unwrap().as_decision().unwrap();
    assert_eq!(decision.status, DecisionStatus::Resolved);
    assert_eq!(decision.chosen_history, vec![ids.left]);

    // The chosen leaf runs out its 1000 ms and the session terminates.
    runner.tick(&mut graph, &hub, at(2_200)).unwrap();
    let report = runner.tick(&mut graph, &hub, at(3_200)).unwrap();
    assert_eq!(report.state, RunnerState::Stopped);
    assert_eq!(
        graph.get(ids.left).unwrap().as_action().unwrap().status,
        ActionStatus::Completed
    );
    // The untaken branch was never touched.
    assert_eq!(
        graph.get(ids.right).unwrap().as_action().unwrap().status,
        ActionStatus::Pending
    );
}

#[test]
fn resolving_with_a_stranger_keeps_the_session_suspended() {
    let (mut graph, ids) = decision_flow();
    let (mut runner, hub) = runner();

    runner.start(&mut graph, &hub, ids.root, t0()).unwrap();
    runner.tick(&mut graph, &hub, at(2_000)).unwrap();
    runner.tick(&mut graph, &hub, at(2_000)).unwrap();
    assert_eq!(runner.state(), RunnerState::AwaitingDecision);

    let err = runner
        .resolve(&mut graph, &hub, ids.decision, NodeId::new(), at(2_100))
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    assert_eq!(runner.state(), RunnerState::AwaitingDecision);
    assert_eq!(runner.path(), &[ids.root, ids.decision]);
    assert!(
        graph
            .get(ids.decision)
            .unwrap()
            .as_decision()
            .unwrap()
            .chosen_history
            .is_empty()
    );
}

#[test]
fn resolve_outside_awaiting_is_invalid() {
    let (mut graph, ids) = decision_flow();
    let (mut runner, hub) = runner();

    let err = runner
        .resolve(&mut graph, &hub, ids.decision, ids.left, t0())
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidOperation { .. }));
}

#[test]
fn action_with_two_children_halts_with_malformed_graph() {
    // `add_child` refuses this shape, so it can only arrive via a persisted
    // document; build one by hand.
    let mut graph = WorkflowGraph::new(NodeDraft::action("a").with_expected_duration_ms(500.0));
    let a = graph.root_id();
    let b = graph
        .add_child(a, NodeDraft::action("b").with_expected_duration_ms(500.0))
        .unwrap();
    let mut doc = codec::export(&graph);
    let mut c_record = doc.nodes.iter().find(|r| r.id == b).unwrap().clone();
    let c = NodeId::new();
    c_record.id = c;
    c_record.title = "c".into();
    doc.nodes.push(c_record);
    doc.nodes
        .iter_mut()
        .find(|r| r.id == a)
        .unwrap()
        .child_ids
        .push(c);
    let mut graph = codec::import(doc).unwrap();

    let (mut runner, hub) = runner();
    runner.start(&mut graph, &hub, a, t0()).unwrap();
    let err = runner.tick(&mut graph, &hub, at(500)).unwrap_err();
    assert!(matches!(
        err,
        EngineError::MalformedGraph { children: 2, .. }
    ));
    assert_eq!(runner.state(), RunnerState::Stopped);
    // Children are untouched.
    assert_eq!(
        graph.get(b).unwrap().as_action().unwrap().status,
        ActionStatus::Pending
    );
    assert_eq!(
        graph.get(c).unwrap().as_action().unwrap().status,
        ActionStatus::Pending
    );
}

#[test]
fn starting_at_a_missing_node_leaves_everything_untouched() {
    let (mut graph, _) = decision_flow();
    let before = graph.clone();
    let (mut runner, hub) = runner();

    let err = runner
        .start(&mut graph, &hub, NodeId::new(), t0())
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    assert_eq!(runner.state(), RunnerState::Idle);
    assert!(runner.path().is_empty());
    assert_eq!(graph, before);
}

#[test]
fn single_option_decision_auto_resolves() {
    let mut graph = WorkflowGraph::new(NodeDraft::decision("only one way"));
    let root = graph.root_id();
    let only = graph
        .add_child(root, NodeDraft::action("go").with_expected_duration_ms(500.0))
        .unwrap();

    let (mut runner, hub) = runner();
    let report = runner.start(&mut graph, &hub, root, t0()).unwrap();
    assert_ne!(report.state, RunnerState::AwaitingDecision);
    assert_eq!(report.resolved, Some(root));
    assert_eq!(runner.path(), &[root, only]);
    assert_eq!(
        graph.get(root).unwrap().as_decision().unwrap().chosen_history,
        vec![only]
    );
}

#[test]
fn optionless_decision_ends_the_session() {
    let mut graph = WorkflowGraph::new(NodeDraft::decision("dead end"));
    let root = graph.root_id();

    let (mut runner, hub) = runner();
    let report = runner.start(&mut graph, &hub, root, t0()).unwrap();
    assert_eq!(report.state, RunnerState::Stopped);
}

#[test]
fn grace_delay_defers_the_next_step() {
    let (mut graph, root, next) = two_step_chain();
    let config = no_grace_config().with_step_grace_ms(1_000);
    let mut runner = ExecutionRunner::new(&config);
    let hub = ObserverHub::new();

    runner.start(&mut graph, &hub, root, t0()).unwrap();
    let report = runner.tick(&mut graph, &hub, at(1_000)).unwrap();
    assert_eq!(report.completed, Some(root));

    // Within the grace window the session idles on the finished step.
    let report = runner.tick(&mut graph, &hub, at(1_500)).unwrap();
    assert_eq!(report.current, Some(root));
    assert_eq!(runner.path(), &[root]);

    // Once the window passes the next step is entered and starts timing
    // from the entering tick.
    let report = runner.tick(&mut graph, &hub, at(2_100)).unwrap();
    assert_eq!(report.current, Some(next));
    assert_eq!(runner.path(), &[root, next]);
    assert_eq!(
        graph.get(next).unwrap().as_action().unwrap().status,
        ActionStatus::Running
    );
}

#[test]
fn pause_banks_elapsed_time() {
    let (mut graph, ids) = decision_flow();
    let (mut runner, hub) = runner();

    runner.start(&mut graph, &hub, ids.root, t0()).unwrap();
    let report = runner.tick(&mut graph, &hub, at(500)).unwrap();
    assert_eq!(report.progress, Some(25.0));

    runner.pause(&mut graph, &hub, at(1_000)).unwrap();
    assert_eq!(runner.state(), RunnerState::Paused);
    assert_eq!(
        graph.get(ids.root).unwrap().as_action().unwrap().status,
        ActionStatus::Paused
    );

    // Ticks while paused change nothing.
    let report = runner.tick(&mut graph, &hub, at(60_000)).unwrap();
    assert_eq!(report.progress, None);
    assert_eq!(
        graph.get(ids.root).unwrap().as_action().unwrap().progress,
        25.0
    );

    // Resuming much later neither loses nor double-counts: 1000 ms were
    // banked, so 500 ms after resume we sit at 75% of the 2000 ms estimate.
    runner.resume(&mut graph, &hub, at(60_000)).unwrap();
    let report = runner.tick(&mut graph, &hub, at(60_500)).unwrap();
    assert_eq!(report.progress, Some(75.0));
    let report = runner.tick(&mut graph, &hub, at(61_000)).unwrap();
    assert_eq!(report.completed, Some(ids.root));
}

#[test]
fn pause_and_resume_outside_their_states_are_invalid() {
    let (mut graph, ids) = decision_flow();
    let (mut runner, hub) = runner();

    assert!(matches!(
        runner.pause(&mut graph, &hub, t0()).unwrap_err(),
        EngineError::InvalidOperation { .. }
    ));
    runner.start(&mut graph, &hub, ids.root, t0()).unwrap();
    assert!(matches!(
        runner.resume(&mut graph, &hub, t0()).unwrap_err(),
        EngineError::InvalidOperation { .. }
    ));
}

#[test]
fn stop_is_idempotent_and_final() {
    let (mut graph, ids) = decision_flow();
    let (mut runner, hub) = runner();

    runner.start(&mut graph, &hub, ids.root, t0()).unwrap();
    runner.stop(&hub);
    assert_eq!(runner.state(), RunnerState::Stopped);
    runner.stop(&hub);
    assert_eq!(runner.state(), RunnerState::Stopped);

    // A stopped session never advances again.
    let report = runner.tick(&mut graph, &hub, at(10_000)).unwrap();
    assert_eq!(report.state, RunnerState::Stopped);
    assert_eq!(
        graph.get(ids.root).unwrap().as_action().unwrap().status,
        ActionStatus::Running
    );
}

#[test]
fn reset_restores_transient_state_and_allows_replay() {
    let (mut graph, root, next) = two_step_chain();
    let (mut runner, hub) = runner();

    runner.start(&mut graph, &hub, root, t0()).unwrap();
    runner.tick(&mut graph, &hub, at(1_000)).unwrap();
    runner.tick(&mut graph, &hub, at(1_000)).unwrap();
    runner.tick(&mut graph, &hub, at(2_000)).unwrap();
    assert_eq!(runner.state(), RunnerState::Stopped);
    let history_len = graph
        .get(root)
        .unwrap()
        .as_action()
        .unwrap()
        .duration_history
        .len();
    assert_eq!(history_len, 1);

    runner.reset(&mut graph, &hub);
    assert_eq!(runner.state(), RunnerState::Idle);
    assert!(runner.path().is_empty());
    let action = graph.get(root).unwrap().as_action().unwrap();
    assert_eq!(action.status, ActionStatus::Pending);
    assert_eq!(action.progress, 0.0);
    assert!(action.started_at.is_none());
    // Learned durations survive the reset.
    assert_eq!(action.duration_history.len(), 1);
    assert_eq!(
        graph.get(next).unwrap().as_action().unwrap().status,
        ActionStatus::Pending
    );

    // The same graph replays cleanly.
    runner.start(&mut graph, &hub, root, at(10_000)).unwrap();
    assert_eq!(runner.state(), RunnerState::Playing);
    assert_eq!(runner.path(), &[root]);
}
