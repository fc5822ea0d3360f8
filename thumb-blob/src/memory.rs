use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use thumb_core::{CasError, CasResult};

use crate::{collect_stream, stream_from_bytes, BlobStore, ByteStream, PutResult};

/// In-memory blob store for testing and development
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs, staging blobs included
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Snapshot of every key currently stored
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, stream: ByteStream) -> CasResult<PutResult> {
        let data = collect_stream(stream).await?;
        let size_bytes = data.len() as u64;
        self.blobs.write().insert(key.to_string(), data);
        Ok(PutResult { size_bytes })
    }

    async fn get(&self, key: &str) -> CasResult<ByteStream> {
        let data = self
            .blobs
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| CasError::not_found(key))?;
        Ok(stream_from_bytes(data))
    }

    async fn delete(&self, key: &str) -> CasResult<()> {
        self.blobs
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| CasError::not_found(key))
    }

    async fn exists(&self, key: &str) -> CasResult<bool> {
        Ok(self.blobs.read().contains_key(key))
    }

    async fn rename(&self, from: &str, to: &str) -> CasResult<()> {
        let mut blobs = self.blobs.write();
        let data = blobs.remove(from).ok_or_else(|| CasError::not_found(from))?;
        blobs.insert(to.to_string(), data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemoryBlobStore::new();
        store.put("a", stream_from_bytes("hello")).await.unwrap();

        assert!(store.exists("a").await.unwrap());
        let data = collect_stream(store.get("a").await.unwrap()).await.unwrap();
        assert_eq!(&data[..], b"hello");

        store.delete("a").await.unwrap();
        assert!(!store.exists("a").await.unwrap());
        assert!(store.delete("a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn rename_moves_blob() {
        let store = MemoryBlobStore::new();
        store.put("__staging/x", stream_from_bytes("payload")).await.unwrap();
        store.rename("__staging/x", "ab/cd/abcdef").await.unwrap();

        assert_eq!(store.keys(), vec!["ab/cd/abcdef".to_string()]);
        assert!(store.rename("__staging/x", "elsewhere").await.unwrap_err().is_not_found());
    }
}
