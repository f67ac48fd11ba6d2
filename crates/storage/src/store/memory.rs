use crate::error::Result;
use crate::store::{KvStore, NO_EXPIRY, Ttl};
use faststr::FastStr;
use moka::{Expiry, future::Cache};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

const DEFAULT_CAPACITY: u64 = 10_000;

#[derive(Clone)]
struct Stored {
    value: FastStr,
    ttl:   Option<Duration>,
}

impl Stored {
    fn new(value: FastStr, ttl: Ttl) -> Self {
        let ttl = (ttl != NO_EXPIRY).then(|| Duration::from_secs(u64::from(ttl)));
        Self { value, ttl }
    }
}

/// Each write carries its own ttl; overwriting a key resets it.
struct PerEntryTtl;

impl Expiry<FastStr, Stored> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &FastStr,
        value: &Stored,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &FastStr,
        value: &Stored,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// In-process store backed by moka, for tests and for running without a
/// memcached host. Bounded like memcached: least recently used entries are
/// evicted once `capacity` is reached.
#[derive(Clone)]
pub struct MemoryStore(Arc<Cache<FastStr, Stored>>);

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self(Arc::new(
            Cache::builder()
                .max_capacity(capacity)
                .expire_after(PerEntryTtl)
                .build(),
        ))
    }
}

impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<FastStr>> {
        Ok(self.0.get(key).await.map(|s| s.value))
    }

    async fn get_many(&self, keys: &[FastStr]) -> Result<HashMap<FastStr, FastStr>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(stored) = self.0.get(key.as_str()).await {
                found.insert(key.clone(), stored.value);
            }
        }
        Ok(found)
    }

    async fn set(&self, key: &str, value: FastStr, ttl: Ttl) -> Result<()> {
        self.0
            .insert(FastStr::new(key), Stored::new(value, ttl))
            .await;
        Ok(())
    }

    async fn get_or_add(&self, key: &str, value: FastStr, ttl: Ttl) -> Result<FastStr> {
        let entry = self
            .0
            .entry(FastStr::new(key))
            .or_insert(Stored::new(value, ttl))
            .await;
        Ok(entry.into_value().value)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.0.remove(key).await.is_some())
    }

    async fn ping(&self) -> bool {
        true
    }
}
