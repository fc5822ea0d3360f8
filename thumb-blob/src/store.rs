use async_trait::async_trait;
use thumb_core::{CasResult, ContentId};

use crate::ByteStream;

/// Blob sink operations - must be implemented by all storage backends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob from a stream, replacing any blob under the same key
    async fn put(&self, key: &str, stream: ByteStream) -> CasResult<PutResult>;

    /// Open a blob for streaming reads; `NotFound` if absent
    async fn get(&self, key: &str) -> CasResult<ByteStream>;

    /// Delete a blob; `NotFound` if absent
    async fn delete(&self, key: &str) -> CasResult<()>;

    /// Check whether a blob exists
    async fn exists(&self, key: &str) -> CasResult<bool>;

    /// Move a blob to a new key, replacing any blob already there.
    ///
    /// The default streams a copy and then deletes the source. Backends with
    /// a native move should override it.
    async fn rename(&self, from: &str, to: &str) -> CasResult<()> {
        let stream = self.get(from).await?;
        self.put(to, stream).await?;
        self.delete(from).await
    }
}

/// Result of a successful put operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
    pub size_bytes: u64,
}

/// Strategy for generating blob keys
pub trait ContentKeyStrategy: Send + Sync {
    /// Key of the canonical blob for a content id
    fn object_key(&self, id: &ContentId) -> String;

    /// Key for bytes whose hash is not known yet
    fn staging_key(&self, token: &str) -> String;
}

/// Default key strategy: `ab/cd/abcdef...` with a `__staging/` area
#[derive(Debug, Clone)]
pub struct DefaultKeyStrategy;

impl ContentKeyStrategy for DefaultKeyStrategy {
    fn object_key(&self, id: &ContentId) -> String {
        let id = id.as_str();
        if id.len() > 4 && id.is_ascii() {
            format!("{}/{}/{}", &id[0..2], &id[2..4], id)
        } else {
            id.to_string()
        }
    }

    fn staging_key(&self, token: &str) -> String {
        format!("__staging/{}", token)
    }
}
