use anyhow::Result;
use common::{CacheConfig, random_namespace};
use dotenvy::dotenv;
use faststr::FastStr;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use storage::{KvStore, MemcachedStore, MemoryStore, NO_EXPIRY, TagCache};
use tracing::{info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize, Deserialize)]
struct Article {
    id:    u32,
    title: FastStr,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let _guard = common::logging_stdout();

    let mut config = CacheConfig::from_env()?;
    if config.namespace.is_none() {
        config.namespace = Some(random_namespace("tagcache-demo-"));
    }

    let connect = MemcachedStore::connect_checked(config.memcache_urls(), CONNECT_TIMEOUT);
    let memcached = match connect.await {
        Ok(store) => Some(store),
        Err(e) => {
            warn!("memcached unavailable: {e}");
            None
        }
    };

    match memcached {
        Some(store) => {
            info!(hosts = ?config.hosts(), "using memcached");
            run(TagCache::new(store, &config)).await;
        }
        None => {
            warn!("falling back to the in-memory store");
            run(TagCache::new(MemoryStore::new(), &config)).await;
        }
    }

    Ok(())
}

async fn run<S: KvStore>(cache: TagCache<S>) {
    let articles = [
        ("article:1", &["news"][..]),
        ("article:2", &["sports"][..]),
        ("article:3", &["news", "sports", "front-page"][..]),
    ];
    for (id, (key, tags)) in (1..).zip(articles) {
        let article = Article {
            id,
            title: format!("article #{id}").into(),
        };
        if !cache.set(key, &article, NO_EXPIRY, tags).await {
            warn!(key, "write failed");
        }
    }

    cache.rm_tags(&["sports"]).await;

    for (key, _) in articles {
        match cache.get::<Article>(key).await {
            Some(article) => info!(key, title = %article.title, "hit"),
            None => info!(key, "miss"),
        }
    }
}
