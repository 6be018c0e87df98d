use std::mem;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::event::EngineEvent;
use super::observers::ChangeObserver;

/// Handle returned by [`ObserverHub::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Bookkeeping for an in-flight delivery: which observers were taken out
/// of the registry for the loop, and which of them unsubscribed before the
/// loop finished.
#[derive(Default)]
struct DeliveryState {
    delivering: Vec<ObserverId>,
    retired: Vec<ObserverId>,
}

/// Fan-out point for engine change notifications.
///
/// Observers are notified synchronously, in registration order. A faulty
/// observer (one that returns an error or panics) is isolated and logged;
/// it never prevents later observers from seeing the event.
///
/// No lock is held while an observer runs, so observers may call back into
/// the hub: subscribing mid-delivery takes effect from the next event, and
/// an observer may unsubscribe anyone, including itself.
#[derive(Default)]
pub struct ObserverHub {
    observers: Mutex<Vec<(ObserverId, Box<dyn ChangeObserver>)>>,
    delivery: Mutex<DeliveryState>,
    next_id: AtomicU64,
}

impl ObserverHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; notifications arrive in registration order.
    pub fn subscribe<T: ChangeObserver + 'static>(&self, observer: T) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .expect("observer list poisoned")
            .push((id, Box::new(observer)));
        id
    }

    /// Remove a previously registered observer. Returns `false` if the id
    /// was not registered (or was already removed).
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        {
            let mut guard = self.observers.lock().expect("observer list poisoned");
            let before = guard.len();
            guard.retain(|(existing, _)| *existing != id);
            if guard.len() != before {
                return true;
            }
        }
        // Not in the registry: the id may belong to the batch currently
        // being delivered to; retire it so the merge drops it.
        let mut delivery = self.delivery.lock().expect("delivery state poisoned");
        if delivery.delivering.contains(&id) && !delivery.retired.contains(&id) {
            delivery.retired.push(id);
            return true;
        }
        false
    }

    /// Number of currently registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.lock().expect("observer list poisoned").len()
    }

    /// Deliver `event` to every observer, isolating per-observer faults.
    pub fn emit(&self, event: &EngineEvent) {
        // Take the registry out so no lock is held across observer calls.
        let mut batch = mem::take(&mut *self.observers.lock().expect("observer list poisoned"));
        self.delivery
            .lock()
            .expect("delivery state poisoned")
            .delivering
            .extend(batch.iter().map(|(id, _)| *id));

        for (id, observer) in batch.iter_mut() {
            let retired = self
                .delivery
                .lock()
                .expect("delivery state poisoned")
                .retired
                .contains(id);
            if retired {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| observer.on_change(event))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::warn!(observer = id.0, %error, %event, "observer failed");
                }
                Err(_) => {
                    tracing::warn!(observer = id.0, %event, "observer panicked");
                }
            }
        }

        // Merge back: surviving batch members first (registration order),
        // then anyone subscribed while the loop ran.
        let mut guard = self.observers.lock().expect("observer list poisoned");
        let mut delivery = self.delivery.lock().expect("delivery state poisoned");
        batch.retain(|(id, _)| !delivery.retired.contains(id));
        delivery
            .delivering
            .retain(|d| !batch.iter().any(|(id, _)| id == d));
        let delivery = &mut *delivery;
        delivery
            .retired
            .retain(|r| delivery.delivering.contains(r));
        let newcomers = mem::take(&mut *guard);
        *guard = batch;
        guard.extend(newcomers);
    }
}
