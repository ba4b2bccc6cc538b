//! Capability contracts for external integrations.
//!
//! Only blob storage ships an implementation, backed by the local filesystem.
//! Email, cache and messaging are left to the deployment to provide.

use crate::{BackofficeError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Outbound email delivery
#[async_trait]
pub trait EmailClient: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Key-value cache
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a value, `None` on a miss
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, expiring after `ttl` when given
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Callback invoked for every consumed message
pub type MessageHandler = Box<dyn Fn(Vec<u8>) -> Result<()> + Send + Sync>;

/// Message broker producer
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish to a topic, or an exchange/routing key joined as `exchange/key`
    async fn publish(&self, topic: &str, message: &[u8]) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Message broker consumer
#[async_trait]
pub trait MessageConsumer: Send + Sync {
    /// Consume from a topic or queue until closed
    async fn consume(&self, topic: &str, handler: MessageHandler) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Object storage addressed by bucket and key
#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn upload(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()>;

    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool>;
}

/// Blob storage rooted at a local directory; buckets are subdirectories
#[derive(Debug, Clone)]
pub struct FilesystemBlobStorage {
    base_path: PathBuf,
}

impl FilesystemBlobStorage {
    /// Create the storage, creating the base directory if needed
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a bucket/key pair, rejecting anything that escapes the base directory
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(bucket).join(key);
        let is_plain = !bucket.is_empty()
            && !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !is_plain {
            return Err(BackofficeError::validation(format!(
                "Invalid object location: {}/{}",
                bucket, key
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl BlobStorage for FilesystemBlobStorage {
    async fn upload(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                BackofficeError::not_found("object", format!("{}/{}", bucket, key)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                BackofficeError::not_found("object", format!("{}/{}", bucket, key)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let path = self.object_path(bucket, key)?;
        Ok(fs::try_exists(&path).await?)
    }
}
