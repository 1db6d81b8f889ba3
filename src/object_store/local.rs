use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{key_segments, ObjectStore, ObjectStoreError};

/// Staging area for in-flight writes, renamed into place once complete.
/// Owner directories are numeric, so this name never collides with one.
const STAGING_DIR: &str = ".staging";

/// Local filesystem content store: `{base}/{owner}/{filename}`.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(base_path.join(STAGING_DIR))?;
        Ok(Self { base_path })
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        let mut path = self.base_path.clone();
        for segment in key_segments(key)? {
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staged = self
            .base_path
            .join(STAGING_DIR)
            .join(uuid::Uuid::new_v4().to_string());
        let written = match tokio::fs::write(&staged, &data).await {
            Ok(()) => tokio::fs::rename(&staged, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let path = self.object_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let path = self.object_path(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}
