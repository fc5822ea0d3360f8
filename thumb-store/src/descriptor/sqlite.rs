//! SQLite descriptor backend.
//!
//! One row per content id; the `CHECK (refcount > 0)` constraint means a row
//! only exists while it has owners. The connection pool is opened lazily on
//! first use and shared by every clone of the store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use thumb_core::{CasConfigSnapshot, CasError, CasResult, ContentId, DeleteOutcome, Descriptor};
use tokio::sync::OnceCell;

use super::DescriptorStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS descriptors (
    id               TEXT PRIMARY KEY NOT NULL,
    hash             TEXT,
    size             INTEGER NOT NULL,
    content_type     TEXT,
    chunk_size       INTEGER NOT NULL,
    number_of_chunks INTEGER NOT NULL,
    refcount         INTEGER NOT NULL CHECK (refcount > 0)
)
"#;

/// Pool size used unless `sqlite.max_connections` says otherwise
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Descriptor store backed by a SQLite database file
#[derive(Clone)]
pub struct SqliteDescriptorStore {
    path: PathBuf,
    max_connections: u32,
    pool: Arc<OnceCell<SqlitePool>>,
}

impl SqliteDescriptorStore {
    /// Create a store for the database at `path`; nothing is opened until first use
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            pool: Arc::new(OnceCell::new()),
        }
    }

    /// Build from the `sqlite.path` and `sqlite.max_connections` settings
    pub fn from_snapshot(snapshot: &CasConfigSnapshot) -> CasResult<Self> {
        let path = snapshot
            .get_string("sqlite.path")
            .ok_or_else(|| CasError::invalid("sqlite.path is not configured"))?;
        let store = Self::new(path);
        Ok(match snapshot.get_usize("sqlite.max_connections") {
            Some(n) => store.with_max_connections(n as u32),
            None => store,
        })
    }

    /// Cap the pool; readers on different ids share it concurrently under WAL.
    /// Has no effect once the pool is open.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The shared pool, opening it and creating the schema on first call
    pub async fn pool(&self) -> CasResult<&SqlitePool> {
        self.pool
            .get_or_try_init(|| connect(&self.path, self.max_connections))
            .await
    }
}

#[tracing::instrument]
async fn connect(path: &Path, max_connections: u32) -> CasResult<SqlitePool> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(CasError::backend)?;

    sqlx::query(SCHEMA)
        .execute(&pool)
        .await
        .map_err(CasError::backend)?;

    tracing::info!(path = %path.display(), "Opened SQLite descriptor store");
    Ok(pool)
}

fn descriptor_from_row(row: &SqliteRow) -> Result<Descriptor, sqlx::Error> {
    Ok(Descriptor {
        hash: row.try_get("hash")?,
        size: row.try_get::<i64, _>("size")? as u64,
        content_type: row.try_get("content_type")?,
        chunk_size: row.try_get::<i64, _>("chunk_size")? as u64,
        number_of_chunks: row.try_get::<i64, _>("number_of_chunks")? as u64,
    })
}

#[async_trait]
impl DescriptorStore for SqliteDescriptorStore {
    #[tracing::instrument(skip(self, id, descriptor), fields(id = %id))]
    async fn create(&self, id: &ContentId, descriptor: Descriptor) -> CasResult<u64> {
        let pool = self.pool().await?;
        let refcount: i64 = sqlx::query_scalar(
            "INSERT INTO descriptors \
                 (id, hash, size, content_type, chunk_size, number_of_chunks, refcount) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1) \
             ON CONFLICT(id) DO UPDATE SET refcount = refcount + 1 \
             RETURNING refcount",
        )
        .bind(id.as_str())
        .bind(descriptor.hash)
        .bind(descriptor.size as i64)
        .bind(descriptor.content_type)
        .bind(descriptor.chunk_size as i64)
        .bind(descriptor.number_of_chunks as i64)
        .fetch_one(pool)
        .await
        .map_err(CasError::backend)?;

        tracing::debug!(refcount, "Descriptor created");
        Ok(refcount as u64)
    }

    async fn read(&self, id: &ContentId) -> CasResult<Descriptor> {
        let pool = self.pool().await?;
        let row = sqlx::query(
            "SELECT hash, size, content_type, chunk_size, number_of_chunks \
             FROM descriptors WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(pool)
        .await
        .map_err(CasError::backend)?
        .ok_or_else(|| CasError::not_found(id.as_str()))?;

        descriptor_from_row(&row).map_err(CasError::backend)
    }

    async fn exists(&self, id: &ContentId) -> CasResult<bool> {
        let pool = self.pool().await?;
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM descriptors WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(pool)
            .await
            .map_err(CasError::backend)?;
        Ok(found.is_some())
    }

    #[tracing::instrument(skip(self, id), fields(id = %id))]
    async fn duplicate(&self, id: &ContentId) -> CasResult<u64> {
        let pool = self.pool().await?;
        let refcount: Option<i64> = sqlx::query_scalar(
            "UPDATE descriptors SET refcount = refcount + 1 WHERE id = ?1 RETURNING refcount",
        )
        .bind(id.as_str())
        .fetch_optional(pool)
        .await
        .map_err(CasError::backend)?;

        refcount
            .map(|refcount| refcount as u64)
            .ok_or_else(|| CasError::not_found(id.as_str()))
    }

    #[tracing::instrument(skip(self, id), fields(id = %id))]
    async fn delete(&self, id: &ContentId) -> CasResult<DeleteOutcome> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(CasError::backend)?;

        let remaining: Option<i64> = sqlx::query_scalar(
            "UPDATE descriptors SET refcount = refcount - 1 \
             WHERE id = ?1 AND refcount > 1 RETURNING refcount",
        )
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(CasError::backend)?;

        let outcome = match remaining {
            Some(remaining) => DeleteOutcome::Released {
                remaining: remaining as u64,
            },
            None => {
                let removed = sqlx::query("DELETE FROM descriptors WHERE id = ?1")
                    .bind(id.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(CasError::backend)?
                    .rows_affected();
                if removed > 0 {
                    DeleteOutcome::Removed
                } else {
                    DeleteOutcome::Missing
                }
            }
        };

        tx.commit().await.map_err(CasError::backend)?;
        tracing::debug!(refcount = outcome.refcount(), "Descriptor released");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thumb_core::{Attributes, CasConfig};

    #[test]
    fn from_snapshot_requires_a_path() {
        let err = SqliteDescriptorStore::from_snapshot(&CasConfig::new().snapshot())
            .err()
            .unwrap();
        assert_eq!(err.kind(), thumb_core::ErrorKind::Invalid);

        let mut config = CasConfig::new();
        config.set("sqlite.path", "/tmp/descriptors.db");
        let store = SqliteDescriptorStore::from_snapshot(&config.snapshot()).unwrap();
        assert_eq!(store.path(), Path::new("/tmp/descriptors.db"));
        assert_eq!(store.max_connections(), DEFAULT_MAX_CONNECTIONS);

        config.set("sqlite.max_connections", "8");
        let store = SqliteDescriptorStore::from_snapshot(&config.snapshot()).unwrap();
        assert_eq!(store.max_connections(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn different_ids_use_the_pool_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteDescriptorStore::new(dir.path().join("descriptors.db"));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let id = ContentId::from(format!("id-{}", i % 4));
                    let descriptor = Descriptor::from(Attributes::new(id.as_str(), 1, None));
                    store.create(&id, descriptor).await?;
                    store.read(&id).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let pool = store.pool().await.unwrap();
        assert_eq!(pool.options().get_max_connections(), DEFAULT_MAX_CONNECTIONS);
        for i in 0..4 {
            let id = ContentId::from(format!("id-{i}"));
            assert_eq!(store.delete(&id).await.unwrap().refcount(), 3);
        }
    }

    #[tokio::test]
    async fn pool_is_opened_once_and_shared_by_clones() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteDescriptorStore::new(dir.path().join("nested/descriptors.db"));
        let clone = store.clone();

        let id = ContentId::from("abc");
        let descriptor = Descriptor::from(Attributes::new("abc", 3, None));
        assert_eq!(store.create(&id, descriptor.clone()).await.unwrap(), 1);
        assert_eq!(clone.create(&id, descriptor).await.unwrap(), 2);

        let a = store.pool().await.unwrap() as *const SqlitePool;
        let b = clone.pool().await.unwrap() as *const SqlitePool;
        assert_eq!(a, b);
    }
}
