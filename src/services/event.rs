use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::config::roles;
use crate::container::{Service, ServiceHandle, ServiceManager};

pub const TRANSACTION_PENDING: &str = "transaction/pending";
pub const TRANSACTION_MINED: &str = "transaction/mined";
pub const TRANSACTION_FAILED: &str = "transaction/failed";

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub name: String,
    pub payload: Value,
    pub sequence: u64,
}

pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

pub struct EventService {
    manager: ServiceManager,
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
    sequence: AtomicU64,
}

impl EventService {
    pub fn new() -> Self {
        Self {
            manager: ServiceManager::new(roles::EVENT),
            listeners: RwLock::new(HashMap::new()),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn on<F>(&self, event: &str, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.to_string())
            .or_default()
            .push(Arc::new(listener));
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Deliver `payload` to every listener of `event`, in registration order.
    pub fn emit(&self, event: &str, payload: Value) -> Event {
        let emitted = Event {
            name: event.to_string(),
            payload,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
        };
        // Listeners may register further listeners, so call them outside the lock.
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .cloned()
            .unwrap_or_default();
        tracing::trace!(event, listeners = listeners.len(), "emit");
        for listener in listeners {
            listener(&emitted);
        }
        emitted
    }
}

impl Default for EventService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Service for EventService {
    fn manager(&self) -> &ServiceManager {
        &self.manager
    }

    fn into_handle(self: Arc<Self>) -> ServiceHandle {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn test_listeners_receive_events_in_order() {
        let events = EventService::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        events.on(TRANSACTION_MINED, move |e| {
            first.lock().unwrap().push(format!("first:{}", e.sequence))
        });
        let second = Arc::clone(&seen);
        events.on(TRANSACTION_MINED, move |e| {
            second.lock().unwrap().push(format!("second:{}", e.payload["hash"]))
        });

        events.emit(TRANSACTION_PENDING, json!({}));
        let emitted = events.emit(TRANSACTION_MINED, json!({ "hash": "0x01" }));

        assert_eq!(emitted.sequence, 2);
        assert_eq!(events.listener_count(TRANSACTION_MINED), 2);
        assert_eq!(events.listener_count(TRANSACTION_FAILED), 0);
        assert_eq!(*seen.lock().unwrap(), vec!["first:2", "second:\"0x01\""]);
    }
}
