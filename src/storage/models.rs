use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = u64;

/// Where a file record sits in the metadata/content dual-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    /// Row inserted, content not yet confirmed on disk.
    Pending,
    /// Row and content both present. The only state visible to readers.
    Committed,
    /// Tombstone: content removal in progress.
    Deleting,
}

/// A file record stored in redb
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub owner_id: UserId,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub byte_size: u64,
    pub state: FileState,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub share_id: Option<String>,
}

impl FileRecord {
    pub fn pending(owner_id: UserId, filename: &str, byte_size: u64) -> Self {
        Self {
            owner_id,
            filename: filename.to_string(),
            uploaded_at: Utc::now(),
            byte_size,
            state: FileState::Pending,
            public: false,
            share_id: None,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.state == FileState::Committed
    }

    pub fn content_key(&self) -> String {
        content_key(self.owner_id, &self.filename)
    }
}

/// Content locator for a file: `{owner}/{filename}`.
pub fn content_key(owner_id: UserId, filename: &str) -> String {
    format!("{owner_id}/{filename}")
}

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    /// PBKDF2 credential string, see `crate::accounts::password`.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a startup reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileStats {
    pub pending_removed: u64,
    pub deletions_completed: u64,
}
