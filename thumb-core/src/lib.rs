//! thumb-core: shared data model, errors and configuration for the thumb
//! content-addressable asset cache.
//!
//! The other crates in the workspace build on these types:
//!
//! ```text
//! ┌─────────────────┐
//! │   thumb-cache   │  ← expirable caches, forward handles
//! ├─────────────────┤
//! │   thumb-store   │  ← descriptor stores, content orchestrator
//! ├─────────────────┤
//! │   thumb-blob    │  ← blob sinks, digest tee, sniffing
//! ├─────────────────┤
//! │   thumb-core    │  ← this crate
//! └─────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod types;

pub use config::{CasConfig, CasConfigSnapshot};
pub use error::{CasError, CasResult, ErrorKind};
pub use types::{Attributes, ContentId, DeleteOutcome, Descriptor, DescriptorEntry};
