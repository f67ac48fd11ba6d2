//! Tagged cache handle.
//!
//! Every entry is stored together with the generations its tags had when it
//! was written. A read recomputes those generations and treats any change as
//! a miss, so invalidating a tag never has to find the entries carrying it.
//!
//! Nothing here fails loudly. An unreachable store, an undecodable record and
//! a stale snapshot all read as "not cached", and writes report `false`.

use crate::entry::{Entry, Snapshot, decode_raw, encode_raw};
use crate::error::Result;
use crate::namespace::Namespacer;
use crate::store::{KvStore, Ttl};
use crate::tags::TagTracker;
use common::CacheConfig;
use faststr::FastStr;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use tracing::{debug, warn};

/// For writes that carry no tags.
pub const NO_TAGS: &[&str] = &[];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    #[default]
    Tagged,
    Raw,
    /// Raw copy first, then the tagged entry.
    TaggedAndRaw,
}

impl WriteMode {
    fn tagged(self) -> bool {
        matches!(self, Self::Tagged | Self::TaggedAndRaw)
    }

    fn raw(self) -> bool {
        matches!(self, Self::Raw | Self::TaggedAndRaw)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadMode {
    #[default]
    Tagged,
    Raw,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RemoveMode {
    #[default]
    Tagged,
    Raw,
    TaggedAndRaw,
}

impl RemoveMode {
    fn tagged(self) -> bool {
        matches!(self, Self::Tagged | Self::TaggedAndRaw)
    }

    fn raw(self) -> bool {
        matches!(self, Self::Raw | Self::TaggedAndRaw)
    }
}

#[derive(Clone)]
pub struct TagCache<S> {
    store:   S,
    names:   Namespacer,
    logging: bool,
}

impl<S: KvStore> TagCache<S> {
    pub fn new(store: S, config: &CacheConfig) -> Self {
        Self {
            store,
            names: Namespacer::new(config.namespace.clone(), config.raw_namespace.clone()),
            logging: config.logging,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn namespace(&self) -> Option<&str> {
        self.names.namespace()
    }

    pub fn raw_namespace(&self) -> Option<&str> {
        self.names.raw_namespace()
    }

    pub fn set_namespace(&mut self, namespace: impl Into<FastStr>) -> &mut Self {
        self.names.set_namespace(namespace);
        self
    }

    pub fn set_raw_namespace(&mut self, raw_namespace: impl Into<FastStr>) -> &mut Self {
        self.names.set_raw_namespace(raw_namespace);
        self
    }

    pub fn set_logging(&mut self, logging: bool) -> &mut Self {
        self.logging = logging;
        self
    }

    /// Physical key of a tagged entry.
    pub fn key_name(&self, key: &str) -> FastStr {
        self.names.key_name(key)
    }

    /// Physical key holding a tag's generation.
    pub fn tag_key_name(&self, tag: &str) -> FastStr {
        self.names.tag_key_name(tag)
    }

    pub fn raw_key_name(&self, key: &str) -> FastStr {
        self.names.raw_key_name(key)
    }

    /// Direct access to tag generations under this handle's namespace.
    pub fn tags(&self) -> TagTracker<'_, S> {
        TagTracker::new(&self.store, &self.names)
    }

    pub async fn connected(&self) -> bool {
        self.store.ping().await
    }

    /// Stores `value` under `key`, tagged with `tags`.
    pub async fn set<T, G>(&self, key: &str, value: &T, ttl: Ttl, tags: &[G]) -> bool
    where
        T: Serialize + ?Sized,
        G: AsRef<str>,
    {
        self.set_with(key, value, ttl, tags, WriteMode::Tagged).await
    }

    /// `true` only if every write `mode` asks for went through. `tags` are
    /// ignored for [`WriteMode::Raw`].
    pub async fn set_with<T, G>(
        &self,
        key: &str,
        value: &T,
        ttl: Ttl,
        tags: &[G],
        mode: WriteMode,
    ) -> bool
    where
        T: Serialize + ?Sized,
        G: AsRef<str>,
    {
        let mut ok = true;
        if mode.raw() {
            ok &= self.report_write(key, self.write_raw(key, value, ttl).await);
        }
        if mode.tagged() {
            ok &= self.report_write(key, self.write_tagged(key, value, ttl, tags).await);
        }
        ok
    }

    /// Fresh value under `key`, or `None` on a miss.
    ///
    /// Untagged entries are always fresh. A tagged entry is fresh while every
    /// one of its tags still has the generation it was written against.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_with(key, ReadMode::Tagged).await
    }

    pub async fn get_with<T: DeserializeOwned>(&self, key: &str, mode: ReadMode) -> Option<T> {
        let read = match mode {
            ReadMode::Tagged => self.read_tagged(key).await,
            ReadMode::Raw => self.read_raw(key).await,
        };
        read.unwrap_or_else(|e| {
            warn!(key, "cache read failed: {e}");
            None
        })
    }

    /// Fresh values among `keys`, keyed by the keys as given. Misses are
    /// left out.
    ///
    /// The entries come back in one round trip and the union of their tags
    /// is resolved in another.
    pub async fn get_many<T, K>(&self, keys: &[K]) -> HashMap<FastStr, T>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        self.read_many(keys).await.unwrap_or_else(|e| {
            warn!(keys = keys.len(), "cache batch read failed: {e}");
            HashMap::new()
        })
    }

    /// Deletes `key` from the tagged space.
    pub async fn rm(&self, key: &str) -> bool {
        self.rm_with(key, RemoveMode::Tagged).await
    }

    /// Deletes regardless of tags. `true` only if every delete `mode` asks
    /// for found something to remove.
    pub async fn rm_with(&self, key: &str, mode: RemoveMode) -> bool {
        let mut ok = true;
        if mode.tagged() {
            ok &= self.delete(&self.names.key_name(key)).await;
        }
        if mode.raw() {
            ok &= self.delete(&self.names.raw_key_name(key)).await;
        }
        ok
    }

    /// Invalidates every entry carrying any of `tags`.
    ///
    /// No entry is touched: each one turns into a miss on its next read.
    pub async fn rm_tags<G: AsRef<str>>(&self, tags: &[G]) {
        if let Err(e) = self.tags().bump(tags).await {
            warn!(tags = tags.len(), "tag invalidation failed: {e}");
        }
    }

    async fn write_raw<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Ttl) -> Result<()> {
        let raw = encode_raw(value)?;
        self.store
            .set(&self.names.raw_key_name(key), raw, ttl)
            .await
    }

    async fn write_tagged<T, G>(&self, key: &str, value: &T, ttl: Ttl, tags: &[G]) -> Result<()>
    where
        T: Serialize + ?Sized,
        G: AsRef<str>,
    {
        let state = self.tags().current_state(tags).await?;
        let entry = Entry {
            data: value,
            tags: Snapshot::from(&state),
        };
        self.store
            .set(&self.names.key_name(key), entry.encode()?, ttl)
            .await
    }

    fn report_write(&self, key: &str, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(key, "cache write failed: {e}");
                false
            }
        }
    }

    async fn read_raw<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.get(&self.names.raw_key_name(key)).await? else {
            return Ok(None);
        };
        match decode_raw(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(key, "undecodable raw value: {e}");
                Ok(None)
            }
        }
    }

    async fn read_tagged<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.get(&self.names.key_name(key)).await? else {
            return Ok(None);
        };
        let entry = match Entry::<T>::decode(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key, "malformed entry: {e}");
                return Ok(None);
            }
        };
        if entry.tags.is_empty() {
            return Ok(Some(entry.data));
        }

        let state = self.tags().current_state(&entry.tags.tags()).await?;
        if self.logging {
            debug!(key, snapshot = ?entry.tags, current = ?state, "comparing tag generations");
        }
        if entry.tags.matches(&state) {
            Ok(Some(entry.data))
        } else {
            debug!(key, "stale entry");
            Ok(None)
        }
    }

    async fn read_many<T, K>(&self, keys: &[K]) -> Result<HashMap<FastStr, T>>
    where
        T: DeserializeOwned,
        K: AsRef<str>,
    {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let physical = self.names.key_names(keys);
        let stored = self.store.get_many(&physical).await?;

        let mut entries = Vec::with_capacity(stored.len());
        for (key, name) in keys.iter().zip(&physical) {
            let key = key.as_ref();
            let Some(raw) = stored.get(name) else {
                continue;
            };
            match Entry::<T>::decode(raw) {
                Ok(entry) => entries.push((FastStr::new(key), entry)),
                Err(e) => debug!(key, "malformed entry: {e}"),
            }
        }

        let tags: Vec<FastStr> = entries.iter().flat_map(|(_, e)| e.tags.tags()).collect();
        let state = self.tags().current_state(&tags).await?;
        if self.logging {
            debug!(entries = entries.len(), current = ?state, "comparing tag generations");
        }

        Ok(entries
            .into_iter()
            .filter(|(key, entry)| {
                let fresh = entry.tags.is_current_in(&state);
                if !fresh {
                    debug!(key = %key, "stale entry");
                }
                fresh
            })
            .map(|(key, entry)| (key, entry.data))
            .collect())
    }

    async fn delete(&self, physical: &str) -> bool {
        match self.store.delete(physical).await {
            Ok(found) => found,
            Err(e) => {
                warn!(key = physical, "cache delete failed: {e}");
                false
            }
        }
    }
}
