//! Expirable cache of byte content backed by the content-addressable store.
//!
//! Each key holds exactly one CAS reference to the content it maps to. The
//! reference is taken by `put` and given back when the key is replaced,
//! invalidated or found expired, so identical thumbnails cached under many
//! keys share one blob until the last key lets go.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thumb_blob::ByteStream;
use thumb_core::{CasResult, ContentId, Descriptor};
use thumb_store::ContentStore;
use tracing::{debug, warn};

use crate::{expires_after, CacheConfig, CacheEntry, ExpirableCache};

/// A cache hit: the stored descriptor and a reader over the bytes
pub struct CachedContent {
    pub descriptor: Descriptor,
    pub stream: ByteStream,
}

impl std::fmt::Debug for CachedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedContent")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Slot {
    /// Ticket of the most recent put on this key
    latest: u64,
    /// Puts still streaming their content
    in_flight: Vec<u64>,
    entry: Option<CacheEntry<ContentId>>,
}

impl Slot {
    fn is_idle(&self) -> bool {
        self.entry.is_none() && self.in_flight.is_empty()
    }
}

#[derive(Default)]
struct Slots {
    next_ticket: u64,
    by_key: HashMap<String, Slot>,
}

/// Expirable cache mapping string keys to content in a [`ContentStore`]
#[derive(Clone)]
pub struct ContentCache {
    store: ContentStore,
    config: CacheConfig,
    slots: Arc<Mutex<Slots>>,
}

impl ContentCache {
    pub fn new(store: ContentStore) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    pub fn with_config(store: ContentStore, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            slots: Arc::new(Mutex::new(Slots::default())),
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Content id currently published under `key`, expired or not
    pub fn content_id(&self, key: &str) -> Option<ContentId> {
        let slots = self.slots.lock();
        slots
            .by_key
            .get(key)
            .and_then(|slot| slot.entry.as_ref())
            .map(|entry| entry.value().clone())
    }

    /// Put using the configured default ttl; never expires without one
    pub async fn put_default(&self, key: String, value: ByteStream) -> CasResult<()> {
        let expires_at = match self.config.default_ttl {
            Some(ttl) => Some(expires_after(ttl)?),
            None => None,
        };
        self.put(key, value, expires_at).await
    }

    async fn release(&self, id: &ContentId) -> CasResult<()> {
        let outcome = self.store.delete(id).await?;
        debug!(id = %id, refcount = outcome.refcount(), "Released cached content");
        Ok(())
    }

    async fn release_all(&self, ids: Vec<ContentId>) -> CasResult<()> {
        for id in ids {
            self.release(&id).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ExpirableCache for ContentCache {
    type Key = String;
    type Value = ByteStream;
    type Hit = CachedContent;

    async fn get_if_present(&self, key: &String) -> CasResult<Option<CachedContent>> {
        let now = Utc::now();
        let (live, expired) = {
            let mut slots = self.slots.lock();
            match slots.by_key.get_mut(key) {
                Some(slot) => match slot.entry.take() {
                    Some(entry) if entry.is_expired_at(now) => {
                        if slot.is_idle() {
                            slots.by_key.remove(key);
                        }
                        (None, Some(entry.into_value()))
                    }
                    Some(entry) => {
                        let id = entry.value().clone();
                        slot.entry = Some(entry);
                        (Some(id), None)
                    }
                    None => (None, None),
                },
                None => (None, None),
            }
        };

        if let Some(id) = expired {
            debug!(key = %key, "Cache entry expired");
            if let Err(e) = self.release(&id).await {
                warn!(key = %key, error = %e, "Failed to release expired content");
            }
            return Ok(None);
        }

        let Some(id) = live else {
            return Ok(None);
        };
        match self.store.read(&id).await {
            Ok(opened) => Ok(Some(CachedContent {
                descriptor: opened.descriptor,
                stream: opened.stream,
            })),
            // Invalidated between the lookup and the read
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip(self, value))]
    async fn put(
        &self,
        key: String,
        value: ByteStream,
        expires_at: Option<DateTime<Utc>>,
    ) -> CasResult<()> {
        let ticket = {
            let mut slots = self.slots.lock();
            slots.next_ticket += 1;
            let ticket = slots.next_ticket;
            let slot = slots.by_key.entry(key.clone()).or_default();
            slot.latest = ticket;
            slot.in_flight.push(ticket);
            ticket
        };

        let stored = match self.store.create(value).await {
            Ok(stored) => stored,
            Err(e) => {
                let mut slots = self.slots.lock();
                if let Some(slot) = slots.by_key.get_mut(&key) {
                    slot.in_flight.retain(|t| *t != ticket);
                    if slot.is_idle() {
                        slots.by_key.remove(&key);
                    }
                }
                return Err(e);
            }
        };

        let (published, released) = {
            let mut slots = self.slots.lock();
            match slots.by_key.get_mut(&key) {
                Some(slot) if slot.in_flight.contains(&ticket) => {
                    slot.in_flight.retain(|t| *t != ticket);
                    if slot.latest == ticket {
                        let previous = slot
                            .entry
                            .replace(CacheEntry::new(stored.id.clone(), expires_at));
                        (true, previous.map(CacheEntry::into_value))
                    } else {
                        (false, Some(stored.id.clone()))
                    }
                }
                // Invalidated while streaming
                _ => (false, Some(stored.id.clone())),
            }
        };

        if published {
            debug!(id = %stored.id, refcount = stored.refcount, "Published cache entry");
        } else {
            debug!(id = %stored.id, "Cache entry superseded before it was published");
        }
        match released {
            Some(id) => self.release(&id).await,
            None => Ok(()),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn invalidate(&self, key: &String) -> CasResult<()> {
        let removed = self.slots.lock().by_key.remove(key);
        match removed.and_then(|slot| slot.entry) {
            Some(entry) => self.release(entry.value()).await,
            None => Ok(()),
        }
    }

    async fn invalidate_all(&self, keys: &[String]) -> CasResult<()> {
        let released: Vec<ContentId> = {
            let mut slots = self.slots.lock();
            keys.iter()
                .filter_map(|key| slots.by_key.remove(key))
                .filter_map(|slot| slot.entry.map(CacheEntry::into_value))
                .collect()
        };
        self.release_all(released).await
    }

    async fn clean_up(&self) -> CasResult<usize> {
        let now = Utc::now();
        let expired: Vec<ContentId> = {
            let mut slots = self.slots.lock();
            let mut expired = Vec::new();
            slots.by_key.retain(|_, slot| {
                if slot.entry.as_ref().is_some_and(|e| e.is_expired_at(now)) {
                    if let Some(entry) = slot.entry.take() {
                        expired.push(entry.into_value());
                    }
                }
                !slot.is_idle()
            });
            expired
        };

        let count = expired.len();
        for id in &expired {
            if let Err(e) = self.release(id).await {
                warn!(id = %id, error = %e, "Failed to release expired content");
            }
        }
        Ok(count)
    }
}
