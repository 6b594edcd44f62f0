//! Idempotency guard for webhook event replay suppression.
//!
//! Providers that carry a stable event id (Stripe `evt_...`, Paddle
//! `alert_id`) may deliver the same event more than once; the guard records
//! each key so only the first delivery is processed.
//!
//! This is a single-process, in-memory store: it does not survive a restart
//! and does not coordinate across server instances. A deployment with
//! multiple replicas needs a shared store with an atomic set-if-not-exists
//! primitive instead.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default retention window for seen event ids.
pub const DEFAULT_EVENT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Default)]
pub struct IdempotencyGuard {
    seen: Mutex<HashMap<String, Instant>>,
}

impl IdempotencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically record that `key` has been seen.
    ///
    /// Returns `true` only on the first call for that key within the TTL
    /// window; every subsequent call within the window returns `false`.
    /// Concurrent callers racing on the same key serialize on the lock, so
    /// exactly one of them observes `true`.
    pub fn try_set_once(&self, key: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock().expect("idempotency lock poisoned");

        // Lazy pruning keeps the map bounded without a background task.
        seen.retain(|_, expires_at| *expires_at > now);

        match seen.get(key) {
            Some(_) => false,
            None => {
                seen.insert(key.to_string(), now + ttl);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_call_wins_repeats_lose() {
        let guard = IdempotencyGuard::new();
        assert!(guard.try_set_once("evt_1", Duration::from_secs(60)));
        assert!(!guard.try_set_once("evt_1", Duration::from_secs(60)));
        assert!(!guard.try_set_once("evt_1", Duration::from_secs(60)));
        // Distinct keys are independent.
        assert!(guard.try_set_once("evt_2", Duration::from_secs(60)));
    }

    #[test]
    fn key_expires_after_ttl() {
        let guard = IdempotencyGuard::new();
        assert!(guard.try_set_once("evt_1", Duration::from_millis(10)));
        std::thread::sleep(Duration::from_millis(20));
        assert!(guard.try_set_once("evt_1", Duration::from_millis(10)));
    }

    #[test]
    fn concurrent_callers_only_one_wins() {
        let guard = Arc::new(IdempotencyGuard::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guard = Arc::clone(&guard);
                std::thread::spawn(move || guard.try_set_once("evt_race", Duration::from_secs(60)))
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1, "exactly one concurrent caller should observe true");
    }
}
