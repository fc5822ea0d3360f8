use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use thumb_core::{CasError, CasResult};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::{BlobStore, ByteStream, PutResult};

/// Filesystem blob store.
///
/// Keys map to relative paths under `root`, so the `ab/cd/<id>` keys from
/// [`DefaultKeyStrategy`](crate::DefaultKeyStrategy) become two levels of
/// fan-out directories. Writes land in a temp file next to the target and are
/// renamed into place once the stream is complete.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed
    #[tracing::instrument(skip(root))]
    pub async fn open(root: impl Into<PathBuf>) -> CasResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        tracing::info!(path = %root.display(), "Opened filesystem blob store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> CasResult<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !valid {
            return Err(CasError::invalid(format!("invalid blob key: {key:?}")));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(path: &Path) -> CasResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn not_found_as(key: &str, e: io::Error) -> CasError {
        if e.kind() == io::ErrorKind::NotFound {
            CasError::not_found(key)
        } else {
            CasError::from(e)
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    #[tracing::instrument(skip(self, stream))]
    async fn put(&self, key: &str, mut stream: ByteStream) -> CasResult<PutResult> {
        let path = self.path_for(key)?;
        Self::ensure_parent(&path).await?;

        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let written = async {
            let mut file = fs::File::create(&temp_path).await?;
            let mut size_bytes = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                size_bytes += chunk.len() as u64;
            }
            file.sync_all().await?;
            Ok::<_, io::Error>(size_bytes)
        }
        .await;

        let size_bytes = match written {
            Ok(size_bytes) => size_bytes,
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                return Err(e.into());
            }
        };

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::debug!(path = %path.display(), size_bytes, "Stored blob");
        Ok(PutResult { size_bytes })
    }

    async fn get(&self, key: &str) -> CasResult<ByteStream> {
        let path = self.path_for(key)?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| Self::not_found_as(key, e))?;
        Ok(Box::pin(ReaderStream::new(file)))
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, key: &str) -> CasResult<()> {
        let path = self.path_for(key)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| Self::not_found_as(key, e))
    }

    async fn exists(&self, key: &str) -> CasResult<bool> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    #[tracing::instrument(skip(self))]
    async fn rename(&self, from: &str, to: &str) -> CasResult<()> {
        let source = self.path_for(from)?;
        let target = self.path_for(to)?;
        Self::ensure_parent(&target).await?;
        fs::rename(&source, &target)
            .await
            .map_err(|e| Self::not_found_as(from, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_must_stay_under_the_root() {
        let store = FsBlobStore {
            root: PathBuf::from("/var/cache/thumbs"),
        };
        assert!(store.path_for("ab/cd/abcdef").is_ok());
        assert!(store.path_for("").is_err());
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("/etc/passwd").is_err());
        assert!(store.path_for("ab/./cd").is_ok());
    }
}
