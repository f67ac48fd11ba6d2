//! Tag generation tracking.
//!
//! A tag exists once something references it: the first write that carries
//! it, or the first invalidation. Until then there is nothing stored for it
//! and nothing to clean up afterwards. Generations are never deleted, only
//! overwritten with a newer one.

use crate::error::Result;
use crate::generation::Generation;
use crate::namespace::Namespacer;
use crate::store::{KvStore, NO_EXPIRY};
use faststr::FastStr;
use futures_util::future::try_join_all;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Current generations keyed by tag name, in the order the names were asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagState(Vec<(FastStr, Generation)>);

impl TagState {
    pub fn get(&self, tag: &str) -> Option<Generation> {
        self.0
            .iter()
            .find(|(name, _)| name.as_str() == tag)
            .map(|(_, g)| *g)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Generation)> {
        self.0.iter().map(|(name, g)| (name.as_str(), *g))
    }
}

impl FromIterator<(FastStr, Generation)> for TagState {
    fn from_iter<I: IntoIterator<Item = (FastStr, Generation)>>(iter: I) -> Self {
        let mut state = Vec::new();
        for (tag, generation) in iter {
            if !state.iter().any(|(t, _): &(FastStr, Generation)| *t == tag) {
                state.push((tag, generation));
            }
        }
        Self(state)
    }
}

/// Resolves and bumps tag generations through a [`KvStore`].
pub struct TagTracker<'a, S> {
    store: &'a S,
    names: &'a Namespacer,
}

struct Resolving {
    name: FastStr,
    key:  FastStr,
}

impl<'a, S: KvStore> TagTracker<'a, S> {
    pub fn new(store: &'a S, names: &'a Namespacer) -> Self {
        Self { store, names }
    }

    /// Current generation of every tag in `tags`, creating the ones that
    /// have never been referenced.
    ///
    /// All tag keys are fetched in a single round trip. Repeated names are
    /// resolved once. An empty `tags` touches nothing.
    pub async fn current_state<T: AsRef<str>>(&self, tags: &[T]) -> Result<TagState> {
        if tags.is_empty() {
            return Ok(TagState::default());
        }

        let mut seen = HashSet::with_capacity(tags.len());
        let unique: Vec<Resolving> = tags
            .iter()
            .map(|t| t.as_ref())
            .filter(|name| seen.insert(*name))
            .map(|name| Resolving {
                name: FastStr::new(name),
                key:  self.names.tag_key_name(name),
            })
            .collect();

        let keys: Vec<FastStr> = unique.iter().map(|r| r.key.clone()).collect();
        let stored = self.store.get_many(&keys).await?;

        let resolved = try_join_all(unique.into_iter().map(|r| {
            let raw = stored.get(&r.key).cloned();
            async move {
                let generation = match raw {
                    Some(raw) => match raw.parse::<Generation>() {
                        Ok(g) => g,
                        Err(e) => {
                            warn!(tag = %r.name, "{e}, replacing");
                            self.overwrite(&r.key).await?
                        }
                    },
                    None => self.create(&r.key).await?,
                };
                Ok::<_, crate::error::Error>((r.name, generation))
            }
        }))
        .await?;

        Ok(TagState(resolved))
    }

    /// Writes one fresh generation to every tag in `tags`, existing or not.
    ///
    /// Every entry written against an older generation of these tags reads
    /// as a miss from now on.
    pub async fn bump<T: AsRef<str>>(&self, tags: &[T]) -> Result<Generation> {
        let generation = Generation::now();
        let mut seen = HashSet::with_capacity(tags.len());
        let keys: Vec<FastStr> = tags
            .iter()
            .map(|t| t.as_ref())
            .filter(|name| seen.insert(*name))
            .map(|name| self.names.tag_key_name(name))
            .collect();

        try_join_all(
            keys.iter()
                .map(|key| self.store.set(key, generation.encode(), NO_EXPIRY)),
        )
        .await?;

        debug!(tags = keys.len(), %generation, "bumped tags");
        Ok(generation)
    }

    // Concurrent first references race here; the store's add decides the winner.
    async fn create(&self, key: &str) -> Result<Generation> {
        let fresh = Generation::now();
        let current = self
            .store
            .get_or_add(key, fresh.encode(), NO_EXPIRY)
            .await?;
        let generation = current.parse::<Generation>()?;
        if generation == fresh {
            debug!(key, %generation, "created tag");
        }
        Ok(generation)
    }

    async fn overwrite(&self, key: &str) -> Result<Generation> {
        let fresh = Generation::now();
        self.store.set(key, fresh.encode(), NO_EXPIRY).await?;
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::testing::CountingStore;
    use std::sync::atomic::Ordering;

    fn names() -> Namespacer {
        Namespacer::new(Some("tags-test".into()), None)
    }

    #[tokio::test]
    async fn test_empty_tags_make_no_calls() {
        let store = CountingStore::new(MemoryStore::new());
        let names = names();
        let tracker = TagTracker::new(&store, &names);

        let state = tracker.current_state::<&str>(&[]).await.unwrap();
        assert!(state.is_empty());
        assert_eq!(store.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_missing_tags_are_created_once() {
        let store = CountingStore::new(MemoryStore::new());
        let names = names();
        let tracker = TagTracker::new(&store, &names);

        let state = tracker.current_state(&["a", "b"]).await.unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(store.calls().get_many.load(Ordering::SeqCst), 1);
        assert_eq!(store.calls().add.load(Ordering::SeqCst), 2);

        let stored = store
            .inner()
            .get(&names.tag_key_name("a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.parse::<Generation>().unwrap(), state.get("a").unwrap());

        // now present: one batch read, no writes
        let again = tracker.current_state(&["a", "b"]).await.unwrap();
        assert_eq!(again, state);
        assert_eq!(store.calls().get_many.load(Ordering::SeqCst), 2);
        assert_eq!(store.calls().add.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_state_follows_input_order_and_dedups() {
        let store = CountingStore::new(MemoryStore::new());
        let names = names();
        let tracker = TagTracker::new(&store, &names);

        let state = tracker.current_state(&["z", "a", "z", "m"]).await.unwrap();
        let order: Vec<&str> = state.iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["z", "a", "m"]);
        assert_eq!(store.calls().add.load(Ordering::SeqCst), 3);
        assert!(state.get("z").is_some());
        assert_eq!(state.get("nope"), None);
    }

    #[tokio::test]
    async fn test_bump_changes_generation() {
        let store = MemoryStore::new();
        let names = names();
        let tracker = TagTracker::new(&store, &names);

        let before = tracker.current_state(&["a", "b"]).await.unwrap();
        let bumped = tracker.bump(&["a"]).await.unwrap();
        let after = tracker.current_state(&["a", "b"]).await.unwrap();

        assert_eq!(after.get("a"), Some(bumped));
        assert!(after.get("a") > before.get("a"));
        assert_eq!(after.get("b"), before.get("b"));
    }

    #[tokio::test]
    async fn test_bump_shares_one_instant() {
        let store = MemoryStore::new();
        let names = names();
        let tracker = TagTracker::new(&store, &names);

        let g = tracker.bump(&["x", "y", "x"]).await.unwrap();
        let state = tracker.current_state(&["x", "y"]).await.unwrap();
        assert_eq!(state.get("x"), Some(g));
        assert_eq!(state.get("y"), Some(g));
    }

    #[tokio::test]
    async fn test_malformed_generation_is_replaced() {
        let store = MemoryStore::new();
        let names = names();
        let key = names.tag_key_name("bad");
        store.set(&key, "not-a-number".into(), NO_EXPIRY).await.unwrap();

        let tracker = TagTracker::new(&store, &names);
        let state = tracker.current_state(&["bad"]).await.unwrap();
        let stored = store.get(&key).await.unwrap().unwrap();
        assert_eq!(stored.parse::<Generation>().unwrap(), state.get("bad").unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_first_reference_agrees() {
        let store = MemoryStore::new();
        let names = names();

        let first = TagTracker::new(&store, &names);
        let second = TagTracker::new(&store, &names);
        let (a, b) = tokio::join!(
            first.current_state(&["shared"]),
            second.current_state(&["shared"]),
        );
        assert_eq!(a.unwrap().get("shared"), b.unwrap().get("shared"));
    }

    #[tokio::test]
    async fn test_namespaces_track_separately() {
        let store = MemoryStore::new();
        let one = Namespacer::new(Some("one".into()), None);
        let two = Namespacer::new(Some("two".into()), None);

        let before = TagTracker::new(&store, &two).current_state(&["t"]).await.unwrap();
        TagTracker::new(&store, &one).bump(&["t"]).await.unwrap();
        let after = TagTracker::new(&store, &two).current_state(&["t"]).await.unwrap();
        assert_eq!(before, after);
    }
}
