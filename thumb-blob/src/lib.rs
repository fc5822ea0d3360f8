//! # thumb-blob: streaming blob sinks and content digests
//!
//! `thumb-blob` is the byte-moving layer of the asset cache:
//!
//! - **Streaming-first**: payloads travel as [`ByteStream`]s and are never
//!   collected in memory by the tee
//! - **Content identity on the fly**: [`DigestTee`] hashes, counts and sniffs
//!   the media type while the sink consumes the stream
//! - **Storage agnostic**: anything implementing [`BlobStore`] can be a sink;
//!   [`MemoryBlobStore`] and [`FsBlobStore`] ship with the crate
//!
//! ## Quick Start
//!
//! ```rust
//! use thumb_blob::prelude::*;
//! use bytes::Bytes;
//!
//! # #[tokio::main]
//! # async fn main() -> CasResult<()> {
//! let store = MemoryBlobStore::new();
//! let body: ByteStream = Box::pin(futures_util::stream::iter(vec![
//!     Ok::<_, std::io::Error>(Bytes::from_static(b"GIF89a")),
//!     Ok(Bytes::from_static(b"...")),
//! ]));
//!
//! let attributes = DigestTee::new(&BlobConfig::default())
//!     .tee(body, &store, "__staging/example")
//!     .await?;
//!
//! assert_eq!(attributes.size, 9);
//! assert_eq!(attributes.content_type.as_deref(), Some("image/gif"));
//! # Ok(())
//! # }
//! ```

mod config;
pub mod digest;
mod fs;
mod memory;
pub mod sniff;
pub mod store;
mod types;

pub use config::BlobConfig;
pub use digest::{DigestStream, DigestTee};
pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
pub use store::{BlobStore, ContentKeyStrategy, DefaultKeyStrategy, PutResult};
pub use types::{collect_stream, stream_from_bytes, ByteStream};

pub use thumb_core::{Attributes, CasError, CasResult, ContentId};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobConfig, BlobStore, ByteStream, CasError, CasResult, DigestTee, FsBlobStore,
        MemoryBlobStore,
    };
}
