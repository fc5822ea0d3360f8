use std::time::Duration;

use serde::{Deserialize, Serialize};
use thumb_core::CasConfigSnapshot;

/// Cache behaviour options.
///
/// The backend itself is passed in as an instance; this only carries timing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime applied by `put_default`; entries never expire without it
    #[serde(with = "humantime_serde")]
    pub default_ttl: Option<Duration>,

    /// How often the reaper sweeps expired entries
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Option<Duration>,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `cache.ttl` and `cache.cleanup_interval`
    pub fn from_snapshot(snapshot: &CasConfigSnapshot) -> Self {
        Self {
            default_ttl: snapshot.get_duration("cache.ttl"),
            cleanup_interval: snapshot.get_duration("cache.cleanup_interval"),
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }
}
