use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BlobError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound(_))
    }
}

/// A single logical byte store addressed by filename key.
///
/// Callers must treat `NotFound` from `fetch` as recoverable: a missing
/// historical file is skipped, never a reason to abort a whole batch.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), BlobError>;
    async fn fetch(&self, key: &str) -> Result<Bytes, BlobError>;
    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}

pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), BlobError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(e.into_service_error()))?;
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Bytes, BlobError> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(out) => {
                let data = out
                    .body
                    .collect()
                    .await
                    .map_err(|e| anyhow::anyhow!("failed to read object body: {}", e))?;
                Ok(data.into_bytes())
            }
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    Err(BlobError::NotFound(key.to_string()))
                } else {
                    Err(anyhow::anyhow!(service_error).into())
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(e.into_service_error()))?;
        Ok(())
    }
}

/// Filesystem-backed store used as the fallback tier for files written
/// before the object-store migration (and as the safety net when the
/// primary is unreachable).
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Keys are server-generated filenames; anything resembling a path is
    /// rejected outright.
    fn resolve(&self, key: &str) -> Result<PathBuf, BlobError> {
        if key.is_empty()
            || key.contains("..")
            || key.contains('/')
            || key.contains('\\')
        {
            return Err(anyhow::anyhow!("invalid storage key: {}", key).into());
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), BlobError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow::anyhow!("failed to create {}: {}", parent.display(), e))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| anyhow::anyhow!("failed to write {}: {}", path.display(), e))?;
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Bytes, BlobError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(key.to_string()))
            }
            Err(e) => Err(anyhow::anyhow!("failed to read {}: {}", path.display(), e).into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::anyhow!("failed to delete {}: {}", path.display(), e).into()),
        }
    }
}

/// Two-tier store: a primary remote object store with a local-filesystem
/// fallback for files written under the previous storage backend.
///
/// Reads try the primary first and fall back on any error, so historical
/// files keep being served after the migration. Writes go to the primary
/// and degrade to the fallback rather than failing the upload; callers are
/// not told which tier ultimately held the data.
pub struct TieredBlobStore {
    primary: Arc<dyn BlobStore>,
    fallback: Arc<dyn BlobStore>,
}

impl TieredBlobStore {
    pub fn new(primary: Arc<dyn BlobStore>, fallback: Arc<dyn BlobStore>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl BlobStore for TieredBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), BlobError> {
        match self.primary.put(key, data.clone()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!("Primary store write failed for {}: {}. Using fallback.", key, e);
                self.fallback.put(key, data).await
            }
        }
    }

    async fn fetch(&self, key: &str) -> Result<Bytes, BlobError> {
        match self.primary.fetch(key).await {
            Ok(data) => Ok(data),
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!("Primary store read failed for {}: {}. Trying fallback.", key, e);
                }
                self.fallback.fetch(key).await
            }
        }
    }

    // Best-effort on both tiers; failures are logged, never raised.
    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        if let Err(e) = self.primary.delete(key).await {
            tracing::warn!("Primary store delete failed for {}: {}", key, e);
        }
        if let Err(e) = self.fallback.delete(key).await {
            if !e.is_not_found() {
                tracing::warn!("Fallback store delete failed for {}: {}", key, e);
            }
        }
        Ok(())
    }
}

/// Ensure a local directory exists for the fallback tier.
pub async fn ensure_local_dir(root: &str) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(Path::new(root)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    /// In-memory store used to exercise the tier fallback logic.
    pub struct MemoryBlobStore {
        objects: DashMap<String, Bytes>,
        fail_writes: bool,
    }

    impl MemoryBlobStore {
        fn new() -> Self {
            Self {
                objects: DashMap::new(),
                fail_writes: false,
            }
        }

        fn failing_writes() -> Self {
            Self {
                objects: DashMap::new(),
                fail_writes: true,
            }
        }
    }

    #[async_trait]
    impl BlobStore for MemoryBlobStore {
        async fn put(&self, key: &str, data: Bytes) -> Result<(), BlobError> {
            if self.fail_writes {
                return Err(anyhow::anyhow!("simulated write failure").into());
            }
            self.objects.insert(key.to_string(), data);
            Ok(())
        }

        async fn fetch(&self, key: &str) -> Result<Bytes, BlobError> {
            self.objects
                .get(key)
                .map(|e| e.value().clone())
                .ok_or_else(|| BlobError::NotFound(key.to_string()))
        }

        async fn delete(&self, key: &str) -> Result<(), BlobError> {
            self.objects.remove(key);
            Ok(())
        }
    }

    #[tokio::test]
    async fn fetch_falls_back_when_primary_misses() {
        let primary = Arc::new(MemoryBlobStore::new());
        let fallback = Arc::new(MemoryBlobStore::new());
        fallback
            .put("legacy.png", Bytes::from_static(b"old bytes"))
            .await
            .unwrap();

        let tiered = TieredBlobStore::new(primary, fallback);
        let data = tiered.fetch("legacy.png").await.unwrap();
        assert_eq!(&data[..], b"old bytes");
    }

    #[tokio::test]
    async fn fetch_not_found_on_both_tiers() {
        let tiered = TieredBlobStore::new(
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryBlobStore::new()),
        );
        let err = tiered.fetch("missing.png").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn put_degrades_to_fallback() {
        let primary = Arc::new(MemoryBlobStore::failing_writes());
        let fallback = Arc::new(MemoryBlobStore::new());
        let tiered = TieredBlobStore::new(primary, fallback.clone());

        tiered
            .put("fresh.jpg", Bytes::from_static(b"jpeg"))
            .await
            .unwrap();
        assert_eq!(&fallback.fetch("fresh.jpg").await.unwrap()[..], b"jpeg");
    }

    #[tokio::test]
    async fn local_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store
            .put("photo.jpg", Bytes::from_static(b"bytes"))
            .await
            .unwrap();
        assert_eq!(&store.fetch("photo.jpg").await.unwrap()[..], b"bytes");

        store.delete("photo.jpg").await.unwrap();
        assert!(store.fetch("photo.jpg").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn local_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(store.fetch("../etc/passwd").await.is_err());
        assert!(store.fetch("a/b.png").await.is_err());
    }
}
