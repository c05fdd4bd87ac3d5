use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::CounterError;

/// Atomic integer counters keyed by string, with optional expiry.
///
/// Every operation is atomic per key; callers never see a partially applied update.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Adds one to `key` (absent keys start at zero) and returns the new value.
    async fn incr(&self, key: &str) -> Result<i64, CounterError>;
    async fn decr(&self, key: &str) -> Result<i64, CounterError>;
    /// Textual value of `key`, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>, CounterError>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CounterError>;
    async fn delete(&self, key: &str) -> Result<(), CounterError>;
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    value: i64,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

/// In-process counter store.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    // key -> (value, deadline)
    slots: Arc<RwLock<HashMap<String, Slot>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn add(&self, key: &str, delta: i64) -> i64 {
        let mut map = self.slots.write().await;
        let now = Instant::now();

        let slot = map.entry(key.to_string()).or_insert(Slot {
            value: 0,
            expires_at: None,
        });
        if !slot.is_live(now) {
            *slot = Slot {
                value: 0,
                expires_at: None,
            };
        }
        slot.value += delta;
        slot.value
    }

    /// Drops expired keys and keys that decayed to zero or below.
    ///
    /// A key deleted while decays are still pending is recreated by `decr`
    /// with a negative value and no deadline; the sweep reclaims it.
    pub async fn cleanup_expired(&self) -> usize {
        let mut map = self.slots.write().await;
        let now = Instant::now();
        let before = map.len();
        map.retain(|_, slot| slot.is_live(now) && slot.value > 0);
        before - map.len()
    }

    pub async fn len(&self) -> usize {
        let map = self.slots.read().await;
        let now = Instant::now();
        map.values().filter(|slot| slot.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str) -> Result<i64, CounterError> {
        Ok(self.add(key, 1).await)
    }

    async fn decr(&self, key: &str) -> Result<i64, CounterError> {
        Ok(self.add(key, -1).await)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CounterError> {
        let map = self.slots.read().await;
        let now = Instant::now();
        Ok(map
            .get(key)
            .filter(|slot| slot.is_live(now))
            .map(|slot| slot.value.to_string()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CounterError> {
        let mut map = self.slots.write().await;
        let now = Instant::now();
        if let Some(slot) = map.get_mut(key).filter(|slot| slot.is_live(now)) {
            slot.expires_at = Some(now + ttl);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CounterError> {
        self.slots.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Store that is never reachable.
    pub(crate) struct FailingCounterStore;

    #[async_trait]
    impl CounterStore for FailingCounterStore {
        async fn incr(&self, _key: &str) -> Result<i64, CounterError> {
            Err(CounterError::Unavailable("connection refused".into()))
        }

        async fn decr(&self, _key: &str) -> Result<i64, CounterError> {
            Err(CounterError::Unavailable("connection refused".into()))
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, CounterError> {
            Err(CounterError::Unavailable("connection refused".into()))
        }

        async fn expire(&self, _key: &str, _ttl: Duration) -> Result<(), CounterError> {
            Err(CounterError::Unavailable("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CounterError> {
            Err(CounterError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn incr_starts_from_zero_and_decr_goes_below_it() {
        let store = MemoryCounterStore::new();
        assert_eq!(store.incr("login").await.unwrap(), 1);
        assert_eq!(store.incr("login").await.unwrap(), 2);
        assert_eq!(store.get("login").await.unwrap().as_deref(), Some("2"));

        store.delete("login").await.unwrap();
        assert_eq!(store.get("login").await.unwrap(), None);
        assert_eq!(store.decr("login").await.unwrap(), -1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_key_reads_as_absent_and_restarts() {
        let store = MemoryCounterStore::new();
        store.incr("10.0.0.1").await.unwrap();
        store.incr("10.0.0.1").await.unwrap();
        store
            .expire("10.0.0.1", Duration::from_secs(10))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(store.get("10.0.0.1").await.unwrap(), None);
        assert_eq!(store.incr("10.0.0.1").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_drops_expired_and_zero_slots() {
        let store = MemoryCounterStore::new();
        store.incr("a").await.unwrap();
        store.expire("a", Duration::from_secs(1)).await.unwrap();
        store.incr("b").await.unwrap();
        store.decr("b").await.unwrap();
        store.incr("c").await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.cleanup_expired().await, 2);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("c").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn cleanup_reclaims_keys_driven_negative_after_delete() {
        let store = MemoryCounterStore::new();
        store.incr("10.2.0.1").await.unwrap();
        store.incr("10.2.0.1").await.unwrap();
        store.delete("10.2.0.1").await.unwrap();
        // decays of the two deleted increments arrive late
        store.decr("10.2.0.1").await.unwrap();
        store.decr("10.2.0.1").await.unwrap();
        assert_eq!(store.get("10.2.0.1").await.unwrap().as_deref(), Some("-2"));

        assert_eq!(store.cleanup_expired().await, 1);
        assert!(store.is_empty().await);
        assert_eq!(store.incr("10.2.0.1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn expire_on_absent_key_is_a_noop() {
        let store = MemoryCounterStore::new();
        store.expire("ghost", Duration::from_secs(5)).await.unwrap();
        assert!(store.is_empty().await);
    }
}
