use std::sync::Arc;

use thumb_blob::{BlobStore, ByteStream, ContentKeyStrategy, DefaultKeyStrategy, DigestTee};
use thumb_core::{Attributes, CasError, CasResult, ContentId, DeleteOutcome, Descriptor};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{DescriptorStore, StoreConfig};

/// Result of ingesting content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    pub id: ContentId,
    /// Descriptor as stored; the first writer's when deduplicated
    pub descriptor: Descriptor,
    /// Owners of the content after this create
    pub refcount: u64,
}

/// Content opened for reading
pub struct OpenedContent {
    pub descriptor: Descriptor,
    pub stream: ByteStream,
}

impl std::fmt::Debug for OpenedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedContent")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Content-addressable store: blobs keyed by the SHA-1 of their bytes,
/// shared between owners through descriptor refcounts.
///
/// Incoming bytes go to a staging key while they are hashed. Once the hash
/// is known the staging blob is either dropped (the content already exists)
/// or promoted to the canonical key for its id.
#[derive(Clone)]
pub struct ContentStore {
    blobs: Arc<dyn BlobStore>,
    descriptors: Arc<dyn DescriptorStore>,
    keys: Arc<dyn ContentKeyStrategy>,
    config: StoreConfig,
}

impl ContentStore {
    /// Create a store over a blob sink and a descriptor backend
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        descriptors: Arc<dyn DescriptorStore>,
        config: StoreConfig,
    ) -> Self {
        Self {
            blobs,
            descriptors,
            keys: Arc::new(DefaultKeyStrategy),
            config,
        }
    }

    /// Replace the blob key layout
    pub fn with_key_strategy<K: ContentKeyStrategy + 'static>(mut self, keys: K) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn descriptors(&self) -> &Arc<dyn DescriptorStore> {
        &self.descriptors
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Key of the canonical blob for `id`
    pub fn object_key(&self, id: &ContentId) -> String {
        self.keys.object_key(id)
    }

    /// Ingest a stream, returning its id and the refcount after this owner.
    ///
    /// Identical content is stored once; every create registers one owner.
    #[tracing::instrument(skip(self, stream))]
    pub async fn create(&self, stream: ByteStream) -> CasResult<StoredContent> {
        let staging = self.keys.staging_key(&Uuid::new_v4().to_string());

        let attributes = match DigestTee::new(&self.config.blob)
            .tee(stream, self.blobs.as_ref(), &staging)
            .await
        {
            Ok(attributes) => attributes,
            Err(e) => {
                self.discard_staging(&staging).await;
                return Err(e);
            }
        };

        match self.commit(&staging, attributes).await {
            Ok(stored) => {
                info!(
                    id = %stored.id,
                    size = stored.descriptor.size,
                    refcount = stored.refcount,
                    "Content stored"
                );
                Ok(stored)
            }
            Err(e) => {
                self.discard_staging(&staging).await;
                Err(e)
            }
        }
    }

    async fn commit(&self, staging: &str, attributes: Attributes) -> CasResult<StoredContent> {
        let id = attributes
            .id()
            .ok_or_else(|| CasError::invalid("ingested content has no hash"))?;
        let descriptor = Descriptor::from(attributes);

        if self.descriptors.exists(&id).await? {
            match self.descriptors.duplicate(&id).await {
                Ok(refcount) => {
                    // The canonical blob already holds these bytes.
                    if let Err(e) = self.blobs.delete(staging).await {
                        warn!(key = staging, error = %e, "Failed to drop redundant staging blob");
                    }
                    // The first writer's descriptor is the stored one.
                    let descriptor = match self.descriptors.read(&id).await {
                        Ok(stored) => stored,
                        Err(e) => {
                            warn!(id = %id, error = %e, "Failed to read back deduplicated descriptor");
                            descriptor
                        }
                    };
                    debug!(id = %id, refcount, "Deduplicated content");
                    return Ok(StoredContent {
                        id,
                        descriptor,
                        refcount,
                    });
                }
                // Released by a concurrent delete; store it as new content.
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        let object_key = self.keys.object_key(&id);
        self.blobs.rename(staging, &object_key).await?;
        match self.descriptors.create(&id, descriptor.clone()).await {
            Ok(refcount) => Ok(StoredContent {
                id,
                descriptor,
                refcount,
            }),
            Err(e) => {
                self.discard_orphan(&id, &object_key).await;
                Err(e)
            }
        }
    }

    /// Drop a promoted blob whose descriptor never landed, unless a
    /// concurrent creator registered the same content meanwhile.
    async fn discard_orphan(&self, id: &ContentId, object_key: &str) {
        match self.descriptors.exists(id).await {
            Ok(false) => match self.blobs.delete(object_key).await {
                Ok(()) => debug!(id = %id, "Discarded orphaned content blob"),
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!(id = %id, error = %e, "Failed to discard orphaned content blob"),
            },
            Ok(true) => {}
            Err(e) => warn!(id = %id, error = %e, "Kept content blob; descriptor state unknown"),
        }
    }

    async fn discard_staging(&self, staging: &str) {
        match self.blobs.delete(staging).await {
            Ok(()) => debug!(key = staging, "Discarded staging blob"),
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(key = staging, error = %e, "Failed to discard staging blob"),
        }
    }

    /// Open stored content; `NotFound` if no descriptor exists for `id`
    #[tracing::instrument(skip(self, id), fields(id = %id))]
    pub async fn read(&self, id: &ContentId) -> CasResult<OpenedContent> {
        let descriptor = self.descriptors.read(id).await?;
        let stream = self.blobs.get(&self.keys.object_key(id)).await?;
        Ok(OpenedContent { descriptor, stream })
    }

    pub async fn exists(&self, id: &ContentId) -> CasResult<bool> {
        self.descriptors.exists(id).await
    }

    /// Register another owner of existing content; the blob is untouched
    pub async fn duplicate(&self, id: &ContentId) -> CasResult<u64> {
        self.descriptors.duplicate(id).await
    }

    /// Release one owner, deleting the blob with the last one.
    ///
    /// The refcount change is final once the descriptor store reports it;
    /// a failure to delete the blob afterwards is logged, not returned.
    #[tracing::instrument(skip(self, id), fields(id = %id))]
    pub async fn delete(&self, id: &ContentId) -> CasResult<DeleteOutcome> {
        let outcome = self.descriptors.delete(id).await?;
        if outcome.is_removed() {
            match self.blobs.delete(&self.keys.object_key(id)).await {
                Ok(()) => info!("Content removed"),
                Err(e) if e.is_not_found() => warn!("Content blob was already gone"),
                Err(e) => warn!(error = %e, "Descriptor removed but content blob delete failed"),
            }
        }
        Ok(outcome)
    }
}
