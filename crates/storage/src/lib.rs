//! Tag-based invalidation over a shared key-value cache.
//!
//! Entries are written together with the generations of their tags and
//! validated against the current generations on read. Invalidating a tag
//! replaces its generation; nothing ever enumerates the keys behind a tag.

mod entry;
mod generation;
mod namespace;
mod tag_cache;
mod tags;

pub mod error;
pub mod store;

pub use entry::{Entry, Snapshot};
pub use generation::Generation;
pub use namespace::Namespacer;
pub use store::memcached::MemcachedStore;
pub use store::memory::MemoryStore;
pub use store::{KvStore, NO_EXPIRY, Ttl};
pub use tag_cache::{NO_TAGS, ReadMode, RemoveMode, TagCache, WriteMode};
pub use tags::{TagState, TagTracker};
