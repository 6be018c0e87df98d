//! Observer fan-out for engine state changes.
//!
//! The module is organised around [`ObserverHub`], which delivers
//! [`EngineEvent`]s synchronously and in registration order to every
//! registered [`ChangeObserver`], isolating per-observer faults.

pub mod event;
pub mod hub;
pub mod observers;

pub use event::EngineEvent;
pub use hub::{ObserverHub, ObserverId};
pub use observers::{ChangeObserver, ChannelObserver, MemoryObserver, TracingObserver};
