use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle returned by [`ListenerRegistry::on`], used to remove one listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Mapping from event-type name to an ordered list of listeners.
///
/// Listeners are invoked synchronously in registration order. A panicking
/// listener is isolated: the panic is caught and logged, and the remaining
/// listeners for that event still run. Entries persist across reconnects.
pub struct ListenerRegistry {
    handlers: RwLock<HashMap<String, Vec<(HandlerId, Handler)>>>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener for an event type.
    pub fn on(
        &self,
        event_type: &str,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(event_type.to_owned())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove one listener, or all listeners for the event type when `handler`
    /// is `None`.
    pub fn off(&self, event_type: &str, handler: Option<HandlerId>) {
        let mut handlers = self.handlers.write();
        match handler {
            Some(id) => {
                if let Some(list) = handlers.get_mut(event_type) {
                    list.retain(|(registered, _)| *registered != id);
                }
            }
            None => {
                handlers.remove(event_type);
            }
        }
    }

    /// Invoke all listeners for an event type, in registration order.
    pub fn emit(&self, event_type: &str, payload: &Value) {
        let snapshot: Vec<Handler> = {
            let handlers = self.handlers.read();
            match handlers.get(event_type) {
                Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => return,
            }
        };

        for handler in snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
                tracing::error!(event_type, "listener panicked, continuing dispatch");
            }
        }
    }

    /// Number of registered listeners for an event type.
    pub fn count(&self, event_type: &str) -> usize {
        self.handlers
            .read()
            .get(event_type)
            .map_or(0, Vec::len)
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
