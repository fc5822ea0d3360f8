use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thumb_core::{CasError, CasResult};

/// A key-value cache whose entries may carry an expiry instant.
///
/// `Value` is what `put` accepts and `Hit` is what a lookup yields; for plain
/// in-memory caches they are the same type, for the content cache a value is
/// a byte stream going in and a descriptor plus reader coming out.
///
/// Expired entries are never returned. They may linger until the next lookup
/// of their key or the next [`clean_up`](ExpirableCache::clean_up).
#[async_trait]
pub trait ExpirableCache: Send + Sync {
    type Key: Clone + Send + Sync + 'static;
    type Value: Send + 'static;
    type Hit: Send + 'static;

    /// The live entry for `key`, if any
    async fn get_if_present(&self, key: &Self::Key) -> CasResult<Option<Self::Hit>>;

    /// Insert or replace `key`; `None` never expires
    async fn put(
        &self,
        key: Self::Key,
        value: Self::Value,
        expires_at: Option<DateTime<Utc>>,
    ) -> CasResult<()>;

    /// Insert or replace `key`, expiring `ttl` from now
    async fn put_with_ttl(&self, key: Self::Key, value: Self::Value, ttl: Duration) -> CasResult<()> {
        let expires_at = expires_after(ttl)?;
        self.put(key, value, Some(expires_at)).await
    }

    /// Drop `key`; later lookups miss even if an earlier `put` is still running
    async fn invalidate(&self, key: &Self::Key) -> CasResult<()>;

    async fn invalidate_all(&self, keys: &[Self::Key]) -> CasResult<()> {
        for key in keys {
            self.invalidate(key).await?;
        }
        Ok(())
    }

    /// Remove every expired entry, returning how many were removed
    async fn clean_up(&self) -> CasResult<usize>;
}

/// The instant `ttl` from now
pub fn expires_after(ttl: Duration) -> CasResult<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| CasError::invalid(format!("ttl out of range: {ttl:?}")))
}
