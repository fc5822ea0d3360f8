use thumb_core::CasConfigSnapshot;

/// Configuration for blob ingestion
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Number of leading bytes kept for media type sniffing
    pub sniff_prefix_bytes: usize,

    /// Absolute max size allowed for a single blob (safety guard)
    pub max_blob_bytes: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            sniff_prefix_bytes: 4096,
            max_blob_bytes: 5 * 1024 * 1024 * 1024, // 5GB
        }
    }
}

impl BlobConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `blob.sniff_prefix_bytes` and `blob.max_bytes`, keeping defaults
    /// for anything absent or unparsable.
    pub fn from_snapshot(snapshot: &CasConfigSnapshot) -> Self {
        let defaults = Self::default();
        Self {
            sniff_prefix_bytes: snapshot
                .get_usize("blob.sniff_prefix_bytes")
                .unwrap_or(defaults.sniff_prefix_bytes),
            max_blob_bytes: snapshot
                .get_u64("blob.max_bytes")
                .unwrap_or(defaults.max_blob_bytes),
        }
    }

    /// Set the sniffing prefix bound
    pub fn with_sniff_prefix_bytes(mut self, bytes: usize) -> Self {
        self.sniff_prefix_bytes = bytes;
        self
    }

    /// Set max blob size
    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.max_blob_bytes = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thumb_core::CasConfig;

    #[test]
    fn snapshot_overrides_defaults() {
        let mut config = CasConfig::new();
        config.set("blob.max_bytes", "1024");
        config.set("blob.sniff_prefix_bytes", "not-a-number");

        let blob = BlobConfig::from_snapshot(&config.snapshot());
        assert_eq!(blob.max_blob_bytes, 1024);
        assert_eq!(blob.sniff_prefix_bytes, 4096);
    }
}
