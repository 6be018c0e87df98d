//! # Chronoflow: Tick-driven Timeline Execution Engine
//!
//! Chronoflow executes rooted trees of timed steps. Two node kinds exist:
//! **actions**, which run for an expected duration and report percentage
//! progress, and **decisions**, which suspend the session until a branch is
//! chosen (externally, or automatically when only one option exists).
//!
//! ## Core Concepts
//!
//! - **Graph**: A rooted tree of action and decision nodes with validated
//!   structural invariants
//! - **Runner**: A clockless state machine advanced by explicit `tick`
//!   calls carrying the current time
//! - **Session**: The owning facade that serialises edits against runs and
//!   keeps undo history
//! - **Observers**: Synchronous fan-out of node and session change events
//! - **Codec / Store**: Flattened camelCase documents for export/import and
//!   a pluggable per-node persistence seam
//!
//! ## Quick Start
//!
//! ```
//! use chrono::{Duration, Utc};
//! use chronoflow::config::EngineConfig;
//! use chronoflow::graph::NodeDraft;
//! use chronoflow::runner::RunnerState;
//! use chronoflow::session::TimelineSession;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), chronoflow::error::EngineError> {
//! let config = EngineConfig::default()
//!     .with_default_expected_duration_ms(1_000.0)
//!     .with_step_grace_ms(0);
//! let mut session = TimelineSession::new(NodeDraft::action("brew"), config);
//! let root = session.graph().root_id();
//! session.add_child(root, NodeDraft::action("pour")).await?;
//!
//! let t0 = Utc::now();
//! session.start(root, t0)?;
//!
//! // Halfway through the expected duration the root reports 50%.
//! let report = session.tick(t0 + Duration::milliseconds(500)).await?;
//! assert_eq!(report.progress, Some(50.0));
//!
//! // Past the expected duration it completes and the session advances.
//! let report = session.tick(t0 + Duration::milliseconds(1_000)).await?;
//! assert_eq!(report.completed, Some(root));
//! assert_eq!(session.runner_state(), RunnerState::Playing);
//! # Ok(())
//! # }
//! ```
//!
//! ## Determinism
//!
//! Nothing in the engine reads a clock or spawns a timer. Every
//! time-sensitive operation takes `now` as a parameter, so a driver looping
//! on wall time and a test feeding synthetic timestamps exercise identical
//! code paths.
//!
//! ## Module Guide
//!
//! - [`graph`] - Node types, tree edits, and structural validation
//! - [`runner`] - The tick-driven execution state machine
//! - [`session`] - Facade tying graph, runner, history, hub, and store
//! - [`estimator`] - Expected-duration learning from observed runs
//! - [`history`] - Bounded snapshot-based undo
//! - [`observer`] - Change event fan-out and bundled observers
//! - [`codec`] - Persisted document export/import
//! - [`store`] - Pluggable per-node persistence backend
//! - [`config`] - Engine tunables, loadable from the environment
//! - [`error`] - Diagnostic error taxonomy
//! - [`telemetry`] - Tracing subscriber helpers for hosts

pub mod codec;
pub mod config;
pub mod error;
pub mod estimator;
pub mod graph;
pub mod history;
pub mod observer;
pub mod runner;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod types;
