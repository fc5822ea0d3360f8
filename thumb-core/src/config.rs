//! # Configuration
//!
//! A minimal string key/value store. Applications layer configuration however
//! they like and hand a [`CasConfigSnapshot`] to the constructors that accept
//! one (`BlobConfig::from_snapshot`, `CacheConfig::from_snapshot`, the
//! descriptor backend registry).
//!
//! ```rust
//! use thumb_core::CasConfig;
//! use std::time::Duration;
//!
//! let mut config = CasConfig::new();
//! config.set("cache.ttl", "15m");
//! config.set("blob.sniff_prefix_bytes", "4096");
//!
//! let snapshot = config.snapshot();
//! assert_eq!(snapshot.get_duration("cache.ttl"), Some(Duration::from_secs(900)));
//! assert_eq!(snapshot.get_usize("blob.sniff_prefix_bytes"), Some(4096));
//! ```
//!
//! ## Environment overrides
//!
//! `CasConfig::from_env("THUMB__")` maps `THUMB__CACHE__TTL=1h` to `cache.ttl`.

use std::collections::HashMap;
use std::time::Duration;

use humantime_serde::re::humantime;

#[derive(Debug, Default)]
pub struct CasConfig {
    values: HashMap<String, String>,
}

impl CasConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Load every environment variable starting with `prefix`.
    pub fn from_env(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    fn from_vars<I>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::new();
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                config.set(normalized, value);
            }
        }
        config
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn snapshot(&self) -> CasConfigSnapshot {
        CasConfigSnapshot::new(self.values.clone())
    }
}

/// Immutable view of a [`CasConfig`] with typed getters.
#[derive(Debug, Clone, Default)]
pub struct CasConfigSnapshot {
    map: HashMap<String, String>,
}

impl CasConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse::<usize>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse::<u64>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.parse::<bool>().ok())
    }

    /// Parse a humantime duration such as `30s`, `15m` or `1h 30m`.
    pub fn get_duration(&self, key: &str) -> Option<Duration> {
        self.get(key)
            .and_then(|v| humantime::parse_duration(v.trim()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_are_normalized() {
        let vars = vec![
            ("THUMB__CACHE__TTL".to_string(), "1h".to_string()),
            ("THUMB__SQLITE__PATH".to_string(), "/tmp/d.db".to_string()),
            ("OTHER__CACHE__TTL".to_string(), "5s".to_string()),
        ];
        let config = CasConfig::from_vars("THUMB__", vars);

        assert_eq!(config.get("cache.ttl"), Some("1h"));
        assert_eq!(config.get("sqlite.path"), Some("/tmp/d.db"));
        assert!(!config.has("other.cache.ttl"));
    }

    #[test]
    fn typed_getters() {
        let mut config = CasConfig::new();
        config.set("cache.ttl", "90s");
        config.set("blob.max_bytes", "1048576");
        config.set("cache.enabled", "true");
        config.set("cache.broken", "soon");

        let snapshot = config.snapshot();
        assert_eq!(snapshot.get_duration("cache.ttl"), Some(Duration::from_secs(90)));
        assert_eq!(snapshot.get_u64("blob.max_bytes"), Some(1_048_576));
        assert_eq!(snapshot.get_bool("cache.enabled"), Some(true));
        assert_eq!(snapshot.get_duration("cache.broken"), None);
        assert_eq!(snapshot.get_duration("missing"), None);
    }
}
