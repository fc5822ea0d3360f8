use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thumb_core::{CasError, CasResult, ContentId, DeleteOutcome, Descriptor, DescriptorEntry};

use super::DescriptorStore;

/// In-memory descriptor store for testing and single-process deployments.
///
/// Each read-modify-write runs under the shard lock of its entry, which makes
/// operations on one id atomic without serializing unrelated ids.
#[derive(Clone, Default)]
pub struct MemoryDescriptorStore {
    entries: Arc<DashMap<ContentId, DescriptorEntry>>,
}

impl MemoryDescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current refcount of `id`, if present
    pub fn refcount(&self, id: &ContentId) -> Option<u64> {
        self.entries.get(id).map(|entry| entry.refcount)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DescriptorStore for MemoryDescriptorStore {
    async fn create(&self, id: &ContentId, descriptor: Descriptor) -> CasResult<u64> {
        match self.entries.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                let entry = entry.get_mut();
                entry.refcount += 1;
                Ok(entry.refcount)
            }
            Entry::Vacant(entry) => {
                entry.insert(DescriptorEntry::new(descriptor));
                Ok(1)
            }
        }
    }

    async fn read(&self, id: &ContentId) -> CasResult<Descriptor> {
        self.entries
            .get(id)
            .map(|entry| entry.descriptor.clone())
            .ok_or_else(|| CasError::not_found(id.as_str()))
    }

    async fn exists(&self, id: &ContentId) -> CasResult<bool> {
        Ok(self.entries.contains_key(id))
    }

    async fn duplicate(&self, id: &ContentId) -> CasResult<u64> {
        let mut entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| CasError::not_found(id.as_str()))?;
        entry.refcount += 1;
        Ok(entry.refcount)
    }

    async fn delete(&self, id: &ContentId) -> CasResult<DeleteOutcome> {
        match self.entries.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().refcount <= 1 {
                    entry.remove();
                    Ok(DeleteOutcome::Removed)
                } else {
                    let entry = entry.get_mut();
                    entry.refcount -= 1;
                    Ok(DeleteOutcome::Released {
                        remaining: entry.refcount,
                    })
                }
            }
            Entry::Vacant(_) => Ok(DeleteOutcome::Missing),
        }
    }
}
