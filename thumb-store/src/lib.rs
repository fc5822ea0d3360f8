//! # thumb-store: reference-counted content-addressable storage
//!
//! - [`DescriptorStore`]: refcounted metadata records keyed by content id,
//!   with an in-memory ([`MemoryDescriptorStore`]) and a SQLite
//!   ([`SqliteDescriptorStore`]) backend
//! - [`DescriptorBackendRegistry`]: backend selection by name at startup
//! - [`ContentStore`]: ingests streams through a digest tee, deduplicates by
//!   hash and deletes blobs when their last owner goes away
//!
//! ## Quick Start
//!
//! ```rust
//! # #[tokio::main]
//! # async fn main() -> thumb_store::CasResult<()> {
//! use std::sync::Arc;
//! use thumb_blob::{stream_from_bytes, MemoryBlobStore};
//! use thumb_store::{ContentStore, MemoryDescriptorStore, StoreConfig};
//!
//! let store = ContentStore::new(
//!     Arc::new(MemoryBlobStore::new()),
//!     Arc::new(MemoryDescriptorStore::new()),
//!     StoreConfig::default(),
//! );
//!
//! let first = store.create(stream_from_bytes("thumbnail bytes")).await?;
//! let second = store.create(stream_from_bytes("thumbnail bytes")).await?;
//! assert_eq!(first.id, second.id);
//! assert_eq!(second.refcount, 2);
//!
//! assert_eq!(store.delete(&first.id).await?.refcount(), 1);
//! assert_eq!(store.delete(&first.id).await?.refcount(), 0);
//! assert!(!store.exists(&first.id).await?);
//! # Ok(())
//! # }
//! ```

mod config;
pub mod content;
pub mod descriptor;
pub mod registry;

pub use config::StoreConfig;
pub use content::{ContentStore, OpenedContent, StoredContent};
pub use descriptor::DescriptorStore;
#[cfg(feature = "memory")]
pub use descriptor::memory::MemoryDescriptorStore;
#[cfg(feature = "sqlite")]
pub use descriptor::sqlite::SqliteDescriptorStore;
pub use registry::{DescriptorBackendFactory, DescriptorBackendRegistry};

pub use thumb_core::{CasError, CasResult, ContentId, DeleteOutcome, Descriptor};
