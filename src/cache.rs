//! Verdict cache - volatile hash -> serialized verdict lookups

use async_trait::async_trait;
use moka::future::Cache;

use crate::error::CacheError;

/// Volatile keyed cache in front of the verdict store.
///
/// Entries may be evicted at any time; a miss is always a valid state that
/// the resolution pipeline handles by falling back to the store.
#[async_trait]
pub trait VerdictCache: Send + Sync {
    async fn get(&self, hash: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn set(&self, hash: &str, value: Vec<u8>) -> Result<(), CacheError>;
}

/// In-process cache backed by moka. Never fails; the trait stays fallible
/// for networked implementations.
pub struct MemoryCache {
    inner: Cache<String, Vec<u8>>,
}

impl MemoryCache {
    /// Create cache with an entry capacity
    pub fn new(capacity: u64) -> Self {
        let inner = Cache::builder().max_capacity(capacity).build();
        Self { inner }
    }

    /// Get current entry count
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Drop every entry
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(65_536)
    }
}

#[async_trait]
impl VerdictCache for MemoryCache {
    async fn get(&self, hash: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.inner.get(hash).await)
    }

    async fn set(&self, hash: &str, value: Vec<u8>) -> Result<(), CacheError> {
        self.inner.insert(hash.to_string(), value).await;
        Ok(())
    }
}
