//! Per-key single-flight guard for cache misses.
//!
//! Callers that miss on the same key queue on one async mutex; the first
//! resolves and writes the cache, the rest re-read it after acquiring.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of in-flight keys.
#[derive(Debug, Default)]
pub struct SingleFlight {
    locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other caller holds `key`, then hold it until the
    /// returned guard is dropped.
    pub async fn acquire(&self, key: &str) -> FlightGuard<'_> {
        let lock = self.locks.entry(key.to_string()).or_default().value().clone();
        let guard = lock.lock_owned().await;
        FlightGuard {
            owner: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or waited on.
    pub fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

/// Holds one key of a `SingleFlight`. Dropping it releases the key and
/// removes the registry entry once nobody else is waiting on it.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    owner: &'a SingleFlight,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters clone the Arc under the same shard lock, so a count of one
        // means only the registry still references the mutex.
        self.owner
            .locks
            .remove_if(&self.key, |_, l| Arc::strong_count(l) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_releases_entry() {
        let flight = SingleFlight::new();
        {
            let _guard = flight.acquire("journeyId:J1").await;
            assert_eq!(flight.in_flight(), 1);
        }
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let flight = SingleFlight::new();
        let _a = flight.acquire("a").await;
        let _b = flight.acquire("b").await;
        assert_eq!(flight.in_flight(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_is_serialized() {
        let flight = Arc::new(SingleFlight::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let flight = Arc::clone(&flight);
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            handles.push(tokio::spawn(async move {
                let _guard = flight.acquire("k").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }
}
