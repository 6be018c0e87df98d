//! Engine configuration.
//!
//! Tunables for the runner and its collaborators, resolvable from the
//! environment (`.env` files are honored via `dotenvy`). All durations are
//! milliseconds.

use crate::estimator::DEFAULT_EXPECTED_DURATION_MS;
use crate::history::DEFAULT_UNDO_DEPTH;

/// Runtime tunables shared by a [`TimelineSession`](crate::session::TimelineSession).
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Expected duration assigned to action nodes before their first
    /// completion.
    pub default_expected_duration_ms: f64,
    /// Delay between a step finishing and the next step being evaluated,
    /// giving observers time to render the transition.
    pub step_grace_ms: i64,
    /// Advisory cadence for the host's tick driver. Correctness does not
    /// depend on it; the runner only needs eventual evaluation.
    pub tick_interval_ms: u64,
    /// Maximum number of undo snapshots retained.
    pub undo_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_expected_duration_ms: DEFAULT_EXPECTED_DURATION_MS,
            step_grace_ms: 1_000,
            tick_interval_ms: 100,
            undo_depth: DEFAULT_UNDO_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// Recognized variables: `CHRONOFLOW_DEFAULT_DURATION_MS`,
    /// `CHRONOFLOW_STEP_GRACE_MS`, `CHRONOFLOW_TICK_INTERVAL_MS`,
    /// `CHRONOFLOW_UNDO_DEPTH`.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            default_expected_duration_ms: env_parse("CHRONOFLOW_DEFAULT_DURATION_MS")
                .unwrap_or(defaults.default_expected_duration_ms),
            step_grace_ms: env_parse("CHRONOFLOW_STEP_GRACE_MS")
                .unwrap_or(defaults.step_grace_ms),
            tick_interval_ms: env_parse("CHRONOFLOW_TICK_INTERVAL_MS")
                .unwrap_or(defaults.tick_interval_ms),
            undo_depth: env_parse("CHRONOFLOW_UNDO_DEPTH").unwrap_or(defaults.undo_depth),
        }
    }

    #[must_use]
    pub fn with_default_expected_duration_ms(mut self, ms: f64) -> Self {
        self.default_expected_duration_ms = ms;
        self
    }

    #[must_use]
    pub fn with_step_grace_ms(mut self, ms: i64) -> Self {
        self.step_grace_ms = ms;
        self
    }

    #[must_use]
    pub fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms;
        self
    }

    #[must_use]
    pub fn with_undo_depth(mut self, depth: usize) -> Self {
        self.undo_depth = depth;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
