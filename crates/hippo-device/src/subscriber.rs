//! Single-slot notification subscriber.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use hippo_types::{Notification, Params};
use serde_json::Value;
use tracing::{debug, warn};

/// Callback invoked for every decoded notification. User data is whatever
/// the closure captures.
pub type Callback<N> = Arc<dyn Fn(&N) + Send + Sync>;

/// Holds at most one callback per device handle.
pub(crate) struct Subscriber<N> {
    slot: Mutex<Option<Callback<N>>>,
    label: String,
}

impl<N: Notification> Subscriber<N> {
    pub(crate) fn new(label: String) -> Self {
        Self {
            slot: Mutex::new(None),
            label,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Callback<N>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `callback`, replacing any previous one.
    pub(crate) fn set(&self, callback: Callback<N>) {
        *self.slot() = Some(callback);
    }

    pub(crate) fn clear(&self) {
        self.slot().take();
    }

    pub(crate) fn is_set(&self) -> bool {
        self.slot().is_some()
    }

    /// Clone of the current callback. Never held under the lock while running.
    fn current(&self) -> Option<Callback<N>> {
        self.slot().clone()
    }

    /// Route a raw push (`<device>.on_<event>`) to the callback.
    ///
    /// Returns whether the callback ran.
    pub(crate) fn deliver(&self, method: &str, params: Option<Value>) -> bool {
        let Some(callback) = self.current() else {
            return false;
        };

        let name = method.split_once('.').map_or(method, |(_, name)| name);
        match N::decode(name, &Params::from_value(params)) {
            Some(Ok(notification)) => {
                callback(&notification);
                true
            }
            Some(Err(e)) => {
                warn!("[{}] dropping {name}: {e}", self.label);
                false
            }
            None => {
                debug!("[{}] ignoring unknown notification {name}", self.label);
                false
            }
        }
    }

    /// Deliver a locally synthesized event such as `on_sohal_disconnected`.
    pub(crate) fn deliver_event(&self, name: &str) -> bool {
        self.deliver(name, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hippo_types::{DeviceEvent, SOHAL_DISCONNECTED, TouchMatNotification, TouchMatState};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording() -> (Callback<TouchMatNotification>, Arc<Mutex<Vec<TouchMatNotification>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: Callback<TouchMatNotification> =
            Arc::new(move |n: &TouchMatNotification| sink.lock().unwrap().push(n.clone()));
        (callback, seen)
    }

    #[test]
    fn test_empty_slot_drops() {
        let subscriber = Subscriber::<TouchMatNotification>::new("touchmat@0".to_string());
        assert!(!subscriber.is_set());
        assert!(!subscriber.deliver("touchmat.on_reset", None));
    }

    #[test]
    fn test_prefix_is_stripped() {
        let subscriber = Subscriber::new("touchmat@0".to_string());
        let (callback, seen) = recording();
        subscriber.set(callback);

        assert!(subscriber.deliver(
            "touchmat.on_state",
            Some(json!([{"touch": true, "active_pen": false}]))
        ));
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[TouchMatNotification::State(TouchMatState {
                touch: true,
                active_pen: false
            })]
        );
    }

    #[test]
    fn test_unknown_and_malformed_are_dropped() {
        let subscriber = Subscriber::new("touchmat@0".to_string());
        let (callback, seen) = recording();
        subscriber.set(callback);

        assert!(!subscriber.deliver("touchmat.on_teleport", None));
        assert!(!subscriber.deliver("touchmat.on_open_count", Some(json!(["two"]))));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_replace_and_clear() {
        let subscriber = Subscriber::<TouchMatNotification>::new("touchmat@0".to_string());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        subscriber.set(Arc::new(move |_: &TouchMatNotification| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = second.clone();
        subscriber.set(Arc::new(move |_: &TouchMatNotification| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        subscriber.deliver("touchmat.on_calibrate", None);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        subscriber.clear();
        assert!(!subscriber.deliver("touchmat.on_calibrate", None));
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_synthesized_event() {
        let subscriber = Subscriber::new("touchmat@0".to_string());
        let (callback, seen) = recording();
        subscriber.set(callback);

        assert!(subscriber.deliver_event(SOHAL_DISCONNECTED));
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[TouchMatNotification::Device(DeviceEvent::SohalDisconnected)]
        );
    }

    #[test]
    fn test_callback_may_touch_slot() {
        // The slot lock is released before the callback runs
        let subscriber = Arc::new(Subscriber::<TouchMatNotification>::new("touchmat@0".to_string()));
        let inner = subscriber.clone();
        subscriber.set(Arc::new(move |_: &TouchMatNotification| inner.clear()));

        assert!(subscriber.deliver("touchmat.on_reset", None));
        assert!(!subscriber.is_set());
    }
}
