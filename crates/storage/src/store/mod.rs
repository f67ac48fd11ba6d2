//! The key-value capability the tag layer is built on.
//!
//! Values cross this boundary as UTF-8 text. Every backend is shared and
//! externally synchronized; nothing here retries.

pub mod memcached;
pub mod memory;

use crate::error::Result;
use faststr::FastStr;
use std::collections::HashMap;

/// Seconds until expiry. `0` keeps the value until it is evicted.
pub type Ttl = u32;

pub const NO_EXPIRY: Ttl = 0;

pub trait KvStore: Clone + Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<FastStr>>> + Send;

    /// One round trip for several keys. Absent keys are left out of the map.
    fn get_many(
        &self,
        keys: &[FastStr],
    ) -> impl Future<Output = Result<HashMap<FastStr, FastStr>>> + Send;

    fn set(&self, key: &str, value: FastStr, ttl: Ttl)
    -> impl Future<Output = Result<()>> + Send;

    /// Stores `value` only if `key` holds nothing, and returns whatever the
    /// key holds afterwards.
    ///
    /// Backends with an atomic add make concurrent first references to a tag
    /// agree on one generation.
    fn get_or_add(
        &self,
        key: &str,
        value: FastStr,
        ttl: Ttl,
    ) -> impl Future<Output = Result<FastStr>> + Send;

    /// `Ok(false)` when there was nothing to delete.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;

    fn ping(&self) -> impl Future<Output = bool> + Send;
}
