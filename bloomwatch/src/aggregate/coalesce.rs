//! Request coalescing for view builds.
//!
//! When several callers ask for the same view while it is being built, only
//! the first (the leader) runs the build; the others subscribe to its result.
//!
//! ```text
//! build_view A ─┐
//!               │                               fan-out
//! build_view B ─┼──► RequestCoalescer ──────►  (leader A)
//!               │        │                        │
//! build_view C ─┘        ▼                        ▼
//!                  [B, C wait on a          [one build]
//!                   broadcast channel]◄──────────┘
//! ```
//!
//! If the leader is cancelled before finishing, its entry is removed and the
//! waiters race to become the next leader.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Counters describing how often builds were shared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoalescerStats {
    /// Total requests received
    pub total_requests: u64,
    /// Requests that waited for another caller's build
    pub coalesced_requests: u64,
    /// Requests that ran the build themselves
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

struct State<K, V> {
    in_flight: HashMap<K, broadcast::Sender<V>>,
    stats: CoalescerStats,
}

/// Tracks in-flight builds by key.
pub struct RequestCoalescer<K, V> {
    state: Mutex<State<K, V>>,
}

enum Registration<V> {
    Leader,
    Follower(broadcast::Receiver<V>),
}

/// Removes the leader's entry if the build future is dropped before completion.
struct LeaderGuard<'a, K: Hash + Eq, V> {
    coalescer: &'a RequestCoalescer<K, V>,
    key: Option<K>,
}

impl<K: Hash + Eq, V> Drop for LeaderGuard<'_, K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.coalescer.lock().in_flight.remove(&key);
        }
    }
}

impl<K: Hash + Eq, V> RequestCoalescer<K, V> {
    fn lock(&self) -> MutexGuard<'_, State<K, V>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<K, V> RequestCoalescer<K, V>
where
    K: Hash + Eq + Clone + Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                in_flight: HashMap::new(),
                stats: CoalescerStats::default(),
            }),
        }
    }

    /// Runs `build` for `key` unless a build for the same key is already in
    /// flight, in which case its result is awaited instead.
    pub async fn run<F, Fut>(&self, key: K, build: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        self.lock().stats.total_requests += 1;

        // Only the first registration is counted; a takeover after an
        // abandoned build stays recorded as coalesced.
        let mut first = true;
        while let Registration::Follower(mut rx) = self.register(&key, first) {
            first = false;
            match rx.recv().await {
                Ok(value) => return value,
                Err(_) => {
                    debug!(key = ?key, "Coalesced build abandoned by its leader, retrying");
                }
            }
        }

        let mut guard = LeaderGuard {
            coalescer: self,
            key: Some(key.clone()),
        };
        let value = build().await;
        guard.key = None;
        self.complete(&key, value.clone());
        value
    }

    fn register(&self, key: &K, count: bool) -> Registration<V> {
        let mut state = self.lock();

        if let Some(tx) = state.in_flight.get(key) {
            let rx = tx.subscribe();
            if count {
                state.stats.coalesced_requests += 1;
            }
            debug!(
                key = ?key,
                coalesced = state.stats.coalesced_requests,
                "Coalescing request - waiting for in-flight build"
            );
            Registration::Follower(rx)
        } else {
            // One message per build; capacity only needs to hold that
            let (tx, _rx) = broadcast::channel(1);
            state.in_flight.insert(key.clone(), tx);
            if count {
                state.stats.new_requests += 1;
            }
            debug!(
                key = ?key,
                in_flight_count = state.in_flight.len(),
                "New request - starting build"
            );
            Registration::Leader
        }
    }

    fn complete(&self, key: &K, value: V) {
        let tx = self.lock().in_flight.remove(key);
        if let Some(tx) = tx {
            let waiters = tx.receiver_count();
            // No receivers is fine: nobody coalesced onto this build
            let _ = tx.send(value);
            if waiters > 0 {
                debug!(key = ?key, waiters = waiters, "Broadcast result to coalesced waiters");
            }
        }
    }

    pub fn stats(&self) -> CoalescerStats {
        self.lock().stats.clone()
    }

    pub fn in_flight_count(&self) -> usize {
        self.lock().in_flight.len()
    }

    pub fn log_stats(&self) {
        let state = self.lock();
        info!(
            total_requests = state.stats.total_requests,
            coalesced = state.stats.coalesced_requests,
            new_requests = state.stats.new_requests,
            in_flight = state.in_flight.len(),
            coalescing_ratio = format!("{:.1}%", state.stats.coalescing_ratio() * 100.0),
            "Request coalescing statistics"
        );
    }
}

impl<K, V> Default for RequestCoalescer<K, V>
where
    K: Hash + Eq + Clone + Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_request_runs_build() {
        let coalescer: RequestCoalescer<u32, String> = RequestCoalescer::new();
        let value = coalescer.run(1, || async { "built".to_string() }).await;

        assert_eq!(value, "built");
        let stats = coalescer.stats();
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.new_requests, 1);
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_build() {
        let coalescer: Arc<RequestCoalescer<&'static str, u32>> = Arc::new(RequestCoalescer::new());
        let builds = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let coalescer = Arc::clone(&coalescer);
                let builds = Arc::clone(&builds);
                tokio::spawn(async move {
                    coalescer
                        .run("view", || async move {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            builds.fetch_add(1, Ordering::SeqCst) + 42
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        let stats = coalescer.stats();
        assert_eq!(stats.total_requests, 5);
        assert_eq!(stats.coalesced_requests, 4);
        assert!((stats.coalescing_ratio() - 0.8).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_different_keys_not_coalesced() {
        let coalescer: RequestCoalescer<u32, u32> = RequestCoalescer::new();
        let (a, b) = tokio::join!(
            coalescer.run(1, || async { 10 }),
            coalescer.run(2, || async { 20 })
        );

        assert_eq!((a, b), (10, 20));
        assert_eq!(coalescer.stats().coalesced_requests, 0);
    }

    #[tokio::test]
    async fn test_cancelled_leader_hands_over() {
        let coalescer: Arc<RequestCoalescer<u32, u32>> = Arc::new(RequestCoalescer::new());

        let leader = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move {
                coalescer
                    .run(7, || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        1
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let follower = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move { coalescer.run(7, || async { 2 }).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();

        assert_eq!(follower.await.unwrap(), 2);
        assert_eq!(coalescer.in_flight_count(), 0);

        let stats = coalescer.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.new_requests, 1);
        assert_eq!(stats.coalesced_requests, 1);
        assert!((stats.coalescing_ratio() - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_dropped_leader_guard_clears_entry() {
        let coalescer: RequestCoalescer<u32, u32> = RequestCoalescer::new();
        assert!(matches!(coalescer.register(&3, true), Registration::Leader));
        assert_eq!(coalescer.in_flight_count(), 1);

        drop(LeaderGuard {
            coalescer: &coalescer,
            key: Some(3),
        });
        assert_eq!(coalescer.in_flight_count(), 0);
    }
}
