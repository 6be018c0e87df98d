//! Progress, completion, and duration-learning properties.

mod common;
use common::*;

use proptest::prelude::*;

use chronoflow::graph::{NodeDraft, WorkflowGraph};
use chronoflow::observer::{EngineEvent, MemoryObserver, ObserverHub};
use chronoflow::runner::{ExecutionRunner, RunnerState};

fn leaf(expected_ms: f64) -> WorkflowGraph {
    WorkflowGraph::new(NodeDraft::action("step").with_expected_duration_ms(expected_ms))
}

#[test]
fn progress_is_capped_at_one_hundred() {
    let mut graph = leaf(1_000.0);
    let root = graph.root_id();
    let hub = ObserverHub::new();
    let mut runner = ExecutionRunner::new(&no_grace_config());

    runner.start(&mut graph, &hub, root, t0()).unwrap();
    runner.tick(&mut graph, &hub, at(10_000)).unwrap();
    assert_eq!(
        graph.get(root).unwrap().as_action().unwrap().progress,
        100.0
    );
}

#[test]
fn completion_fires_exactly_one_event_per_action() {
    let (mut graph, root, next) = two_step_chain();
    let hub = ObserverHub::new();
    let memory = MemoryObserver::new();
    hub.subscribe(memory.clone());
    let mut runner = ExecutionRunner::new(&no_grace_config());

    runner.start(&mut graph, &hub, root, t0()).unwrap();
    // Tick well past both completions, including redundant late ticks.
    for offset in [500, 1_000, 1_000, 1_200, 2_200, 3_000, 9_000] {
        runner.tick(&mut graph, &hub, at(offset)).unwrap();
    }
    assert_eq!(runner.state(), RunnerState::Stopped);

    let completions: Vec<_> = memory
        .snapshot()
        .into_iter()
        .filter_map(|event| match event {
            EngineEvent::ActionCompleted { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(completions, vec![root, next]);
}

#[test]
fn expected_duration_is_the_mean_of_observed_runs() {
    let mut graph = leaf(1_000.0);
    let root = graph.root_id();
    let hub = ObserverHub::new();
    let mut runner = ExecutionRunner::new(&no_grace_config());

    // Three replays observed at 1000, 1400, and 3000 ms. Each run must
    // outlast the current estimate for the completion tick to land.
    let mut base = 0;
    for duration in [1_000, 1_400, 3_000] {
        runner.start(&mut graph, &hub, root, at(base)).unwrap();
        runner.tick(&mut graph, &hub, at(base + duration)).unwrap();
        assert_eq!(runner.state(), RunnerState::Stopped);
        runner.reset(&mut graph, &hub);
        base += 10_000;
    }

    let action = graph.get(root).unwrap().as_action().unwrap();
    assert_eq!(action.duration_history, vec![1_000, 1_400, 3_000]);
    let mean = (1_000.0 + 1_400.0 + 3_000.0) / 3.0;
    assert!((action.expected_duration_ms - mean).abs() < 1e-9);
}

proptest! {
    // Whatever the tick cadence, a running action's reported progress never
    // decreases.
    #[test]
    fn progress_is_monotonic_across_arbitrary_ticks(
        deltas in prop::collection::vec(1i64..400, 1..40)
    ) {
        let mut graph = leaf(1_000.0);
        let root = graph.root_id();
        let hub = ObserverHub::new();
        let mut runner = ExecutionRunner::new(&no_grace_config());

        runner.start(&mut graph, &hub, root, t0()).unwrap();
        let mut elapsed = 0;
        let mut last = 0.0f64;
        for delta in deltas {
            elapsed += delta;
            let report = runner.tick(&mut graph, &hub, at(elapsed)).unwrap();
            if let Some(progress) = report.progress {
                prop_assert!(progress >= last);
                prop_assert!(progress <= 100.0);
                last = progress;
            }
            if report.state == RunnerState::Stopped {
                break;
            }
        }
    }
}
