//! Tracing setup helpers for hosts embedding the engine.
//!
//! The engine itself only emits `tracing` events and spans; installing a
//! subscriber is the host's call. These helpers cover the common case of a
//! filtered fmt subscriber writing to stderr.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter applied when `RUST_LOG` is unset: engine events at
/// `debug`, everything else at `info`.
pub const DEFAULT_FILTER: &str = "info,chronoflow=debug";

/// Install a global fmt subscriber filtered by `RUST_LOG` (falling back to
/// [`DEFAULT_FILTER`]).
///
/// Panics if a global subscriber is already set; call once at startup.
pub fn init() {
    init_with_filter(DEFAULT_FILTER);
}

/// Install a global fmt subscriber with an explicit fallback filter.
pub fn init_with_filter(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
