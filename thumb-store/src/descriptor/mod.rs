#[cfg(feature = "memory")]
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thumb_core::{CasResult, ContentId, DeleteOutcome, Descriptor};

/// Reference-counted descriptor storage.
///
/// Every operation on a given id is atomic with respect to concurrent
/// operations on the same id; operations on different ids are independent.
#[async_trait]
pub trait DescriptorStore: Send + Sync {
    /// Register one more owner of `id`, inserting `descriptor` if the id is new.
    ///
    /// Returns the refcount after the operation. An existing descriptor is
    /// retained unchanged (first writer wins).
    async fn create(&self, id: &ContentId, descriptor: Descriptor) -> CasResult<u64>;

    /// The descriptor stored for `id`; `NotFound` if absent
    async fn read(&self, id: &ContentId) -> CasResult<Descriptor>;

    /// Whether a descriptor exists for `id`
    async fn exists(&self, id: &ContentId) -> CasResult<bool>;

    /// Add an owner to an existing descriptor; `NotFound` if absent
    async fn duplicate(&self, id: &ContentId) -> CasResult<u64>;

    /// Release one owner, removing the descriptor when none remain.
    ///
    /// An absent id is reported as [`DeleteOutcome::Missing`], not an error.
    async fn delete(&self, id: &ContentId) -> CasResult<DeleteOutcome>;
}

#[async_trait]
impl<D> DescriptorStore for Arc<D>
where
    D: DescriptorStore + ?Sized,
{
    async fn create(&self, id: &ContentId, descriptor: Descriptor) -> CasResult<u64> {
        (**self).create(id, descriptor).await
    }

    async fn read(&self, id: &ContentId) -> CasResult<Descriptor> {
        (**self).read(id).await
    }

    async fn exists(&self, id: &ContentId) -> CasResult<bool> {
        (**self).exists(id).await
    }

    async fn duplicate(&self, id: &ContentId) -> CasResult<u64> {
        (**self).duplicate(id).await
    }

    async fn delete(&self, id: &ContentId) -> CasResult<DeleteOutcome> {
        (**self).delete(id).await
    }
}
