/*!
Object storage access.

All table artifacts live under a configured base URL; the core addresses
them by paths relative to the store root. [Storage] adapts any
[ObjectStore] implementation to the handful of operations the writer
needs, so S3, the local filesystem and the in-memory store used by tests
are plug-compatible.
*/

use std::sync::Arc;

use futures::TryStreamExt;
use object_store::{path::Path, ObjectStore};

use crate::error::{Error, Result};

/// Storage handle: an object store plus the base URL that absolute
/// artifact locations (snapshot manifest lists, metadata log entries)
/// are rendered against.
#[derive(Clone)]
pub struct Storage {
    store: Arc<dyn ObjectStore>,
    base_url: String,
}

impl Storage {
    /// Wrap an object store rooted at `base_url`.
    pub fn new(store: Arc<dyn ObjectStore>, base_url: impl Into<String>) -> Self {
        Storage {
            store,
            base_url: base_url.into(),
        }
    }

    /// The configured base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Render a store-relative path as an absolute URL.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    /// Upload bytes to a store-relative path, replacing any existing
    /// object.
    pub async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.store.put(&Path::from(path), bytes.into()).await?;
        Ok(())
    }

    /// Download an object. A missing object surfaces as
    /// [Error::NotFound].
    pub async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let result = self
            .store
            .get(&Path::from(path))
            .await
            .map_err(|err| match err {
                object_store::Error::NotFound { .. } => Error::NotFound(path.to_string()),
                other => Error::ObjectStore(other),
            })?;
        Ok(result.bytes().await?.to_vec())
    }

    /// List the objects under a prefix.
    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let paths = self
            .store
            .list(Some(&Path::from(prefix)))
            .await?
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await?;
        Ok(paths)
    }

    /// Delete one object.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.store.delete(&Path::from(path)).await?;
        Ok(())
    }

    /// Whether an object exists at the path.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        match self.store.head(&Path::from(path)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
