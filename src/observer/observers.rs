use std::io;
use std::sync::{Arc, Mutex};

use super::event::EngineEvent;

/// Abstraction over a consumer of engine change events.
///
/// Implementors decide how to render or forward the event. Returning an
/// error marks this delivery as failed; the hub logs it and continues with
/// the remaining observers.
pub trait ChangeObserver: Send {
    fn on_change(&mut self, event: &EngineEvent) -> io::Result<()>;
}

/// Observer that logs every event through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl ChangeObserver for TracingObserver {
    fn on_change(&mut self, event: &EngineEvent) -> io::Result<()> {
        tracing::info!(entity = ?event.entity_id(), "{event}");
        Ok(())
    }
}

/// In-memory observer for tests and snapshots.
///
/// Clones share the same backing store, so a handle kept by the test still
/// sees events after the original is moved into the hub.
#[derive(Clone, Default)]
pub struct MemoryObserver {
    entries: Arc<Mutex<Vec<EngineEvent>>>,
}

impl MemoryObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events captured so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EngineEvent> {
        self.entries.lock().unwrap().clone()
    }

    /// Discard captured events.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl ChangeObserver for MemoryObserver {
    fn on_change(&mut self, event: &EngineEvent) -> io::Result<()> {
        self.entries.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Observer that forwards events into a `flume` channel without blocking.
///
/// Useful for streaming changes to an async consumer (a layout engine, a
/// live dashboard) while the engine itself stays synchronous.
pub struct ChannelObserver {
    tx: flume::Sender<EngineEvent>,
}

impl ChannelObserver {
    /// Create a channel observer.
    ///
    /// # Example
    /// ```no_run
    /// use chronoflow::observer::{ChannelObserver, ObserverHub};
    ///
    /// let hub = ObserverHub::new();
    /// let (tx, rx) = flume::unbounded();
    /// hub.subscribe(ChannelObserver::new(tx));
    ///
    /// // Elsewhere, drain events as they arrive:
    /// while let Ok(event) = rx.try_recv() {
    ///     println!("{event}");
    /// }
    /// ```
    #[must_use]
    pub fn new(tx: flume::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ChangeObserver for ChannelObserver {
    fn on_change(&mut self, event: &EngineEvent) -> io::Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel receiver dropped"))
    }
}
