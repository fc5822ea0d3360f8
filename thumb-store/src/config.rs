use thumb_blob::BlobConfig;
use thumb_core::CasConfigSnapshot;

/// Configuration for the content store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Ingestion limits and sniffing bound
    pub blob: BlobConfig,

    /// Name of the descriptor backend to open from the registry
    pub descriptor_backend: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            blob: BlobConfig::default(),
            descriptor_backend: "memory".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `descriptors.backend` and the `blob.*` settings
    pub fn from_snapshot(snapshot: &CasConfigSnapshot) -> Self {
        let defaults = Self::default();
        Self {
            blob: BlobConfig::from_snapshot(snapshot),
            descriptor_backend: snapshot
                .get_string("descriptors.backend")
                .unwrap_or(defaults.descriptor_backend),
        }
    }

    pub fn with_blob_config(mut self, blob: BlobConfig) -> Self {
        self.blob = blob;
        self
    }

    pub fn with_descriptor_backend(mut self, name: impl Into<String>) -> Self {
        self.descriptor_backend = name.into();
        self
    }
}
