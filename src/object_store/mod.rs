mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
}

/// Abstraction over content storage.
/// Keys are `/`-separated relative paths (`{owner}/{filename}`); the blobs are
/// meaningless without the metadata DB.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `data` under `key`, replacing any previous object. Either the
    /// whole object becomes visible or nothing does.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), ObjectStoreError>;
    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError>;
    /// Remove `key`. Removing a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;
}

/// Whether `segment` may be used as one path component of a key.
pub fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}

/// Split a key into components, rejecting anything that could escape the
/// store root.
pub fn key_segments(key: &str) -> Result<Vec<&str>, ObjectStoreError> {
    let segments: Vec<&str> = key.split('/').collect();
    if segments.iter().all(|s| is_safe_segment(s)) {
        Ok(segments)
    } else {
        Err(ObjectStoreError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_keys() {
        assert_eq!(key_segments("7/notes.txt").unwrap(), vec!["7", "notes.txt"]);
        assert!(is_safe_segment(".hidden"));
        assert!(is_safe_segment("a..b"));
    }

    #[test]
    fn rejects_traversal() {
        for key in ["7/../8/x", "7/./x", "/etc/passwd", "7//x", "7/a\\b", "7/nul\0"] {
            assert!(key_segments(key).is_err(), "{key:?} should be rejected");
        }
    }
}
