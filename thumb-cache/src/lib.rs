//! # thumb-cache: expirable caches over the content-addressable store
//!
//! - [`ExpirableCache`]: the cache contract, with per-entry expiry instants
//! - [`MemoryCache`]: a plain in-memory implementation
//! - [`ContentCache`]: byte content cached by key, deduplicated through a
//!   [`ContentStore`](thumb_store::ContentStore)
//! - [`ForwardHandle`]: a stand-in for a cache or descriptor store whose
//!   construction is still in flight
//! - [`CacheReaper`]: periodic eviction of expired entries
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use thumb_cache::{ExpirableCache, ForwardHandle, MemoryCache};
//!
//! # #[tokio::main]
//! # async fn main() -> thumb_cache::CasResult<()> {
//! let cache = ForwardHandle::new(async {
//!     // e.g. warm the cache from disk
//!     Ok(MemoryCache::<String, u32>::new())
//! });
//!
//! // Queued until the producer finishes, then applied in order
//! cache.put_with_ttl("answer".to_string(), 42, Duration::from_secs(60)).await?;
//! assert_eq!(cache.get_if_present(&"answer".to_string()).await?, Some(42));
//! # Ok(())
//! # }
//! ```

pub mod cache;
mod config;
pub mod content;
mod entry;
pub mod forward;
mod memory;
pub mod reaper;

pub use cache::{expires_after, ExpirableCache};
pub use config::CacheConfig;
pub use content::{CachedContent, ContentCache};
pub use entry::CacheEntry;
pub use forward::{ForwardHandle, ForwardState};
pub use memory::MemoryCache;
pub use reaper::CacheReaper;

pub use thumb_core::{CasError, CasResult};
