use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

/// Per-key minimum spacing between request starts.
///
/// Semantics:
/// - the first `acquire` for a key proceeds immediately
/// - each later `acquire` for the same key waits until `min_interval` after
///   the previous slot; slots are reserved before sleeping so concurrent
///   callers queue up instead of stampeding
/// - distinct keys never wait on each other
#[derive(Debug)]
pub struct HostThrottle {
    min_interval: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Returns once `key` may be hit again.
    pub async fn acquire(&self, key: &str) {
        if self.min_interval.is_zero() {
            return;
        }
        let wait = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots.entry(key.to_string()).or_insert(now);
            let start = (*slot).max(now);
            *slot = start + self.min_interval;
            start - now
        };
        if !wait.is_zero() {
            tracing::trace!(target: "rate", key, waited_ms = wait.as_millis() as u64, "throttle.wait");
            sleep(wait).await;
        }
    }
}

/// Throttle key for a URL: its host, or the raw string when it has none.
pub fn host_key(raw: &str) -> String {
    url::Url::parse(raw.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_else(|| raw.trim().to_string())
}
