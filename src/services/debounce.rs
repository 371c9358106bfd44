use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Marks one issued request. Only the most recently issued ticket of a
/// [`Generation`] is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

impl Generation {
    pub fn issue(&self) -> Ticket {
        Ticket(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_latest(&self, ticket: Ticket) -> bool {
        self.0.load(Ordering::SeqCst) == ticket.0
    }
}

/// Trailing debounce per field. Every call restarts the field's timer and
/// only the last issued call runs; a result that resolves after a newer
/// call was issued is dropped.
pub struct Debouncer {
    delay: Duration,
    fields: Mutex<HashMap<String, Arc<Generation>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            fields: Mutex::new(HashMap::new()),
        }
    }

    fn field(&self, key: &str) -> Arc<Generation> {
        let mut fields = self.fields.lock().unwrap();
        fields.entry(key.to_string()).or_default().clone()
    }

    /// `None` when a newer call for the same field superseded this one.
    pub async fn run<F, Fut, T>(&self, key: &str, call: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let generation = self.field(key);
        let ticket = generation.issue();

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if !generation.is_latest(ticket) {
            tracing::debug!(field = key, "debounced call superseded before firing");
            return None;
        }

        let out = call().await;

        if !generation.is_latest(ticket) {
            tracing::debug!(field = key, "discarding stale response");
            return None;
        }
        Some(out)
    }

    pub fn forget(&self, key: &str) {
        self.fields.lock().unwrap().remove(key);
    }
}
