use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use thumb_core::{CasConfigSnapshot, CasError, CasResult};

use crate::{DescriptorStore, StoreConfig};

/// Opens a descriptor backend from configuration
pub type DescriptorBackendFactory =
    fn(&CasConfigSnapshot) -> BoxFuture<'static, CasResult<Arc<dyn DescriptorStore>>>;

/// A table mapping backend names to the factories that open them.
///
/// Built once at startup; the name to use usually comes from the
/// `descriptors.backend` setting.
pub struct DescriptorBackendRegistry {
    factories: HashMap<String, DescriptorBackendFactory>,
}

impl DescriptorBackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the backends compiled into this crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "memory")]
        registry.factories.insert("memory".to_string(), open_memory);
        #[cfg(feature = "sqlite")]
        registry.factories.insert("sqlite".to_string(), open_sqlite);
        registry
    }

    /// Register a backend under a given name.
    pub fn register<S>(&mut self, name: S, factory: DescriptorBackendFactory) -> CasResult<()>
    where
        S: Into<String>,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(CasError::invalid(format!(
                "descriptor backend already registered: {name}"
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Open the backend registered under `name`.
    pub async fn open(
        &self,
        name: &str,
        snapshot: &CasConfigSnapshot,
    ) -> CasResult<Arc<dyn DescriptorStore>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| CasError::invalid(format!("unknown descriptor backend: {name}")))?;
        tracing::debug!(backend = name, "Opening descriptor backend");
        factory(snapshot).await
    }

    /// Open the backend named by `descriptors.backend`, defaulting to `memory`.
    pub async fn open_configured(
        &self,
        snapshot: &CasConfigSnapshot,
    ) -> CasResult<Arc<dyn DescriptorStore>> {
        let config = StoreConfig::from_snapshot(snapshot);
        self.open(&config.descriptor_backend, snapshot).await
    }
}

impl Default for DescriptorBackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(feature = "memory")]
fn open_memory(_: &CasConfigSnapshot) -> BoxFuture<'static, CasResult<Arc<dyn DescriptorStore>>> {
    Box::pin(async {
        let store: Arc<dyn DescriptorStore> = Arc::new(crate::MemoryDescriptorStore::new());
        Ok(store)
    })
}

#[cfg(feature = "sqlite")]
fn open_sqlite(
    snapshot: &CasConfigSnapshot,
) -> BoxFuture<'static, CasResult<Arc<dyn DescriptorStore>>> {
    let store = crate::SqliteDescriptorStore::from_snapshot(snapshot);
    Box::pin(async move {
        let store: Arc<dyn DescriptorStore> = Arc::new(store?);
        Ok(store)
    })
}

#[cfg(all(test, feature = "memory", feature = "sqlite"))]
mod tests {
    use super::*;
    use thumb_core::{CasConfig, ContentId, ErrorKind};

    #[tokio::test]
    async fn unknown_backend_is_invalid() {
        let registry = DescriptorBackendRegistry::with_defaults();
        let err = registry
            .open("redis", &CasConfig::new().snapshot())
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = DescriptorBackendRegistry::with_defaults();
        let err = registry.register("memory", open_memory).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert_eq!(registry.names(), vec!["memory", "sqlite"]);
    }

    #[tokio::test]
    async fn configured_backend_defaults_to_memory() {
        let registry = DescriptorBackendRegistry::default();
        let store = registry
            .open_configured(&CasConfig::new().snapshot())
            .await
            .unwrap();

        let id = ContentId::from("abc");
        assert!(!store.exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn sqlite_backend_reads_its_path_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CasConfig::new();
        config.set("descriptors.backend", "sqlite");
        config.set(
            "sqlite.path",
            dir.path().join("descriptors.db").display().to_string(),
        );

        let store = DescriptorBackendRegistry::default()
            .open_configured(&config.snapshot())
            .await
            .unwrap();
        let id = ContentId::from("abc");
        let descriptor = thumb_core::Descriptor::from(thumb_core::Attributes::new("abc", 3, None));
        assert_eq!(store.create(&id, descriptor).await.unwrap(), 1);
        assert!(dir.path().join("descriptors.db").exists());
    }
}
