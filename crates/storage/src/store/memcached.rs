use crate::error::{Error, Result};
use crate::store::{KvStore, Ttl};
use faststr::FastStr;
use memcache::{Client, MemcacheError};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::time;
use tracing::{debug, warn};

/// memcached over the blocking `memcache` client.
///
/// Each call runs on tokio's blocking pool. Keys are distributed across
/// hosts by the client's hash function. Ttls above 30 days are read by
/// memcached as absolute unix timestamps.
#[derive(Clone)]
pub struct MemcachedStore(Arc<Client>);

impl MemcachedStore {
    /// Connects to every url (`memcache://host:port[?tcp_nodelay=true]`).
    ///
    /// The client opens its connection pools up front, which blocks until the
    /// hosts answer or the pool gives up.
    pub async fn connect(urls: Vec<String>) -> Result<Self> {
        debug!(?urls, "connecting to memcached");
        let client = tokio::task::spawn_blocking(move || Client::connect(urls)).await??;
        Ok(Self(Arc::new(client)))
    }

    /// [`Self::connect`] plus a `version` round trip, bounded by `timeout`.
    pub async fn connect_checked(urls: Vec<String>, timeout: Duration) -> Result<Self> {
        let check = async {
            let store = Self::connect(urls).await?;
            if store.ping().await {
                Ok(store)
            } else {
                Err(Error::MsgError("memcached did not answer".into()))
            }
        };
        time::timeout(timeout, check)
            .await
            .map_err(|_| Error::Timeout(timeout))?
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Client) -> std::result::Result<T, MemcacheError> + Send + 'static,
    {
        let client = self.0.clone();
        Ok(tokio::task::spawn_blocking(move || f(&client)).await??)
    }
}

impl KvStore for MemcachedStore {
    async fn get(&self, key: &str) -> Result<Option<FastStr>> {
        let key = key.to_owned();
        let value: Option<String> = self.blocking(move |c| c.get(&key)).await?;
        Ok(value.map(FastStr::from))
    }

    async fn get_many(&self, keys: &[FastStr]) -> Result<HashMap<FastStr, FastStr>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let keys = keys.to_vec();
        let found = self
            .blocking(move |c| {
                let keys: Vec<&str> = keys.iter().map(FastStr::as_str).collect();
                let found: HashMap<String, String> = c.gets(&keys[..])?;
                Ok(found)
            })
            .await?;
        Ok(found
            .into_iter()
            .map(|(k, v)| (FastStr::from(k), FastStr::from(v)))
            .collect())
    }

    async fn set(&self, key: &str, value: FastStr, ttl: Ttl) -> Result<()> {
        let key = key.to_owned();
        self.blocking(move |c| c.set(&key, value.as_str(), ttl))
            .await
    }

    async fn get_or_add(&self, key: &str, value: FastStr, ttl: Ttl) -> Result<FastStr> {
        let key = key.to_owned();
        let current = self
            .blocking(move |c| {
                match c.add(&key, value.as_str(), ttl) {
                    Ok(()) => return Ok(value),
                    // NOT_STORED / EXISTS: someone else created it first.
                    Err(MemcacheError::CommandError(_)) => {}
                    Err(e) => return Err(e),
                }
                let existing: Option<String> = c.get(&key)?;
                match existing {
                    Some(existing) => Ok(FastStr::from(existing)),
                    // evicted between add and get
                    None => c.set(&key, value.as_str(), ttl).map(|_| value),
                }
            })
            .await?;
        Ok(current)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let key = key.to_owned();
        self.blocking(move |c| c.delete(&key)).await
    }

    async fn ping(&self) -> bool {
        match self.blocking(|c| c.version()).await {
            Ok(versions) => {
                debug!(?versions, "memcached reachable");
                true
            }
            Err(e) => {
                warn!("memcached unreachable: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NO_EXPIRY;
    use std::net::TcpListener;
    use std::time::Instant;

    #[tokio::test]
    async fn test_connect_checked_gives_up_on_silent_host() {
        // accepts connections through the backlog but never replies
        let silent = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("memcache://{}", silent.local_addr().unwrap());

        let start = Instant::now();
        let result = MemcachedStore::connect_checked(vec![url], Duration::from_millis(300)).await;
        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(2));

        // resets the pending connections so the blocked client call returns
        drop(silent);
    }

    // Needs a memcached on localhost; run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn test_memcached_roundtrip() {
        let store = MemcachedStore::connect(vec!["memcache://127.0.0.1:11211".into()])
            .await
            .unwrap();
        assert!(store.ping().await);

        let key = format!("tagcache-test-{}", common::random_string(12));
        store.set(&key, "v".into(), NO_EXPIRY).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("v"));

        let kept = store.get_or_add(&key, "w".into(), NO_EXPIRY).await.unwrap();
        assert_eq!(kept.as_str(), "v");

        let keys = vec![FastStr::from(key.clone()), FastStr::from("tagcache-missing")];
        let found = store.get_many(&keys).await.unwrap();
        assert_eq!(found.len(), 1);

        assert!(store.delete(&key).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), None);
    }
}
