use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe aggregation state for one reporting window.
///
/// Request middleware and business code call the `record_*` methods; the
/// reporter is the only caller of [`CounterStore::snapshot_and_reset`].
/// Active users follow the until-reset policy: every distinct id seen since
/// the last report counts, and the set is cleared with the rest of the window.
#[derive(Default)]
pub struct CounterStore {
    window: Mutex<CounterSnapshot>,
    /// Requests since process start. Never reset.
    lifetime_requests: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AuthAttempts {
    pub successful: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Purchases {
    pub successful: u64,
    pub failed: u64,
    pub revenue: f64,
}

/// Everything accumulated during one window.
#[derive(Debug, Clone, Default)]
pub struct CounterSnapshot {
    /// Keyed by method name exactly as received, unknown methods included.
    pub requests_by_method: HashMap<String, u64>,
    pub auth_attempts: AuthAttempts,
    pub purchases: Purchases,
    /// Purchase latencies in milliseconds, in arrival order.
    pub purchase_latencies: Vec<f64>,
    /// `"METHOD path"` → latencies in milliseconds.
    pub endpoint_latencies: HashMap<String, Vec<f64>>,
    pub active_users: HashSet<String>,
}

// ─── CounterStore impl ───────────────────────────────────────────

impl CounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, method: &str) {
        self.lifetime_requests.fetch_add(1, Ordering::Relaxed);
        let mut window = self.window.lock();
        match window.requests_by_method.get_mut(method) {
            Some(count) => *count += 1,
            None => {
                window.requests_by_method.insert(method.to_owned(), 1);
            }
        }
    }

    pub fn record_auth_attempt(&self, successful: bool) {
        let mut window = self.window.lock();
        if successful {
            window.auth_attempts.successful += 1;
        } else {
            window.auth_attempts.failed += 1;
        }
    }

    /// Revenue is only added for successful purchases; the latency is kept
    /// either way, unvalidated.
    pub fn record_purchase(&self, successful: bool, latency_ms: f64, price: f64) {
        let mut window = self.window.lock();
        if successful {
            window.purchases.successful += 1;
            window.purchases.revenue += price;
        } else {
            window.purchases.failed += 1;
        }
        window.purchase_latencies.push(latency_ms);
    }

    pub fn record_endpoint_latency(&self, endpoint: &str, latency_ms: f64) {
        let mut window = self.window.lock();
        match window.endpoint_latencies.get_mut(endpoint) {
            Some(samples) => samples.push(latency_ms),
            None => {
                window
                    .endpoint_latencies
                    .insert(endpoint.to_owned(), vec![latency_ms]);
            }
        }
    }

    pub fn mark_user_active(&self, user_id: &str) {
        let mut window = self.window.lock();
        if !window.active_users.contains(user_id) {
            window.active_users.insert(user_id.to_owned());
        }
    }

    pub fn active_user_count(&self) -> usize {
        self.window.lock().active_users.len()
    }

    pub fn lifetime_requests(&self) -> u64 {
        self.lifetime_requests.load(Ordering::Relaxed)
    }

    /// Hands back the current window and installs an empty one.
    ///
    /// The swap happens under the lock, so every increment lands in exactly
    /// one snapshot. The lock is held only for the swap.
    pub fn snapshot_and_reset(&self) -> CounterSnapshot {
        std::mem::take(&mut *self.window.lock())
    }

    /// Starts timing one request; the latency is recorded when the returned
    /// guard is dropped.
    pub fn start_endpoint_timer(self: &Arc<Self>, endpoint: String) -> EndpointTimer {
        EndpointTimer {
            store: Arc::clone(self),
            endpoint,
            started: Instant::now(),
        }
    }
}

// ─── Completion hook ─────────────────────────────────────────────

/// Drop guard recording `now - start` for one endpoint.
///
/// Fires whether the request completed normally or its future was dropped.
pub struct EndpointTimer {
    store: Arc<CounterStore>,
    endpoint: String,
    started: Instant,
}

impl Drop for EndpointTimer {
    fn drop(&mut self) {
        let latency_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.store.record_endpoint_latency(&self.endpoint, latency_ms);
    }
}

// ─── CounterSnapshot helpers ─────────────────────────────────────

impl CounterSnapshot {
    pub fn requests(&self, method: &str) -> u64 {
        self.requests_by_method.get(method).copied().unwrap_or(0)
    }

    pub fn mean_purchase_latency(&self) -> f64 {
        mean(&self.purchase_latencies).unwrap_or(0.0)
    }
}

pub(crate) fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn concurrent_request_counts_are_exact() {
        let store = Arc::new(CounterStore::new());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    // uneven split across threads
                    for _ in 0..(500 + i * 37) {
                        store.record_request("GET");
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let expected: u64 = (0..8).map(|i| 500 + i * 37).sum();
        let snapshot = store.snapshot_and_reset();
        assert_eq!(snapshot.requests("GET"), expected);
        assert_eq!(store.lifetime_requests(), expected);
    }

    #[test]
    fn snapshot_and_reset_partitions_increments() {
        let store = CounterStore::new();
        for _ in 0..7 {
            store.record_request("POST");
        }
        let first = store.snapshot_and_reset();
        for _ in 0..5 {
            store.record_request("POST");
        }
        let second = store.snapshot_and_reset();
        let third = store.snapshot_and_reset();

        assert_eq!(first.requests("POST"), 7);
        assert_eq!(second.requests("POST"), 5);
        assert_eq!(third.requests("POST"), 0);
        assert!(third.requests_by_method.is_empty());
    }

    #[test]
    fn no_increment_lost_while_resetting_concurrently() {
        const PER_THREAD: u64 = 2_000;
        const THREADS: u64 = 4;

        let store = Arc::new(CounterStore::new());
        let writers: Vec<_> = (0..THREADS)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        store.record_request("PUT");
                    }
                })
            })
            .collect();

        let mut seen = 0;
        while writers.iter().any(|w| !w.is_finished()) {
            seen += store.snapshot_and_reset().requests("PUT");
        }
        for w in writers {
            w.join().unwrap();
        }
        seen += store.snapshot_and_reset().requests("PUT");

        assert_eq!(seen, PER_THREAD * THREADS);
    }

    #[test]
    fn purchases_track_revenue_only_on_success() {
        let store = CounterStore::new();
        store.record_purchase(true, 100.0, 9.99);
        store.record_purchase(false, 50.0, 0.0);

        let snapshot = store.snapshot_and_reset();
        assert_eq!(
            snapshot.purchases,
            Purchases {
                successful: 1,
                failed: 1,
                revenue: 9.99
            }
        );
        assert_eq!(snapshot.purchase_latencies, vec![100.0, 50.0]);
        assert_eq!(snapshot.mean_purchase_latency(), 75.0);
    }

    #[test]
    fn failed_purchase_price_is_ignored() {
        let store = CounterStore::new();
        store.record_purchase(false, 10.0, 42.0);
        assert_eq!(store.snapshot_and_reset().purchases.revenue, 0.0);
    }

    #[test]
    fn zero_and_negative_latencies_are_kept() {
        let store = CounterStore::new();
        store.record_endpoint_latency("GET /api/order", 0.0);
        store.record_endpoint_latency("GET /api/order", -3.0);
        store.record_purchase(true, -1.0, 1.0);

        let snapshot = store.snapshot_and_reset();
        assert_eq!(snapshot.endpoint_latencies["GET /api/order"], vec![0.0, -3.0]);
        assert_eq!(snapshot.purchase_latencies, vec![-1.0]);
    }

    #[test]
    fn auth_attempts_split_by_outcome() {
        let store = CounterStore::new();
        store.record_auth_attempt(true);
        store.record_auth_attempt(true);
        store.record_auth_attempt(false);
        assert_eq!(
            store.snapshot_and_reset().auth_attempts,
            AuthAttempts {
                successful: 2,
                failed: 1
            }
        );
    }

    #[test]
    fn unknown_methods_are_still_counted() {
        let store = CounterStore::new();
        store.record_request("PATCH");
        store.record_request("OPTIONS");
        let snapshot = store.snapshot_and_reset();
        assert_eq!(snapshot.requests("PATCH"), 1);
        assert_eq!(snapshot.requests("OPTIONS"), 1);
    }

    #[test]
    fn active_users_are_distinct_and_cleared_on_report() {
        let store = CounterStore::new();
        store.mark_user_active("1");
        store.mark_user_active("2");
        store.mark_user_active("1");
        assert_eq!(store.active_user_count(), 2);

        let snapshot = store.snapshot_and_reset();
        assert_eq!(snapshot.active_users.len(), 2);

        // until-reset policy: a user seen only in the previous window is gone
        assert_eq!(store.active_user_count(), 0);
        store.mark_user_active("2");
        assert_eq!(store.snapshot_and_reset().active_users.len(), 1);
    }

    #[test]
    fn lifetime_total_survives_reset() {
        let store = CounterStore::new();
        store.record_request("GET");
        store.snapshot_and_reset();
        store.record_request("DELETE");
        store.snapshot_and_reset();
        assert_eq!(store.lifetime_requests(), 2);
    }

    #[test]
    fn timer_records_on_drop() {
        let store = Arc::new(CounterStore::new());
        {
            let _timer = store.start_endpoint_timer("GET /api/order".into());
        }
        let snapshot = store.snapshot_and_reset();
        let samples = &snapshot.endpoint_latencies["GET /api/order"];
        assert_eq!(samples.len(), 1);
        assert!(samples[0] >= 0.0);
    }
}
