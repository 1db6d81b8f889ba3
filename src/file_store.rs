//! Per-user file storage across the metadata DB and the content store.
//!
//! The two engines share no transaction, so every content change is bracketed
//! by an intent row in the metadata store:
//!
//! * upload: insert `Pending` row, write content, flip to `Committed`;
//! * delete: flip to `Deleting`, remove content, remove row.
//!
//! Readers only ever see `Committed` rows. If the process dies mid-way,
//! [`FileStore::reconcile`] finishes or undoes the leftover intents at the next
//! startup, which restores "content exists iff a committed row exists".

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use crate::object_store::{is_safe_segment, ObjectStore, ObjectStoreError};
use crate::share::ShareResolver;
use crate::storage::models::{FileRecord, FileState, ReconcileStats, UserId};
use crate::storage::{Database, DatabaseError};

#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("{0}")]
    Validation(String),
    #[error("file already exists")]
    Conflict,
    #[error("file not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<DatabaseError> for FileStoreError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Conflict(_) => FileStoreError::Conflict,
            other => FileStoreError::Storage(other.to_string()),
        }
    }
}

impl From<ObjectStoreError> for FileStoreError {
    fn from(e: ObjectStoreError) -> Self {
        FileStoreError::Storage(e.to_string())
    }
}

/// Filenames are a single flat path component.
pub fn validate_filename(filename: &str) -> Result<(), FileStoreError> {
    if filename.is_empty() {
        return Err(FileStoreError::Validation("filename is empty".to_string()));
    }
    if !is_safe_segment(filename) {
        return Err(FileStoreError::Validation(
            "filename must not contain path separators or be '.' or '..'".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct FileStore {
    db: Database,
    content: Arc<dyn ObjectStore>,
}

impl FileStore {
    pub fn new(db: Database, content: Arc<dyn ObjectStore>) -> Self {
        Self { db, content }
    }

    /// Read-only share lookups over the same metadata store.
    pub fn share_resolver(&self) -> ShareResolver {
        ShareResolver::new(self.db.clone())
    }

    pub async fn upload(
        &self,
        owner_id: UserId,
        filename: &str,
        content: Bytes,
    ) -> Result<(), FileStoreError> {
        validate_filename(filename)?;

        let record = FileRecord::pending(owner_id, filename, content.len() as u64);
        self.db.insert_pending(&record)?;

        let key = record.content_key();
        if let Err(e) = self.content.put(&key, content).await {
            tracing::debug!(owner_id, filename, error = %e, "Content write failed, rolling back");
            self.discard_pending(owner_id, filename);
            return Err(e.into());
        }

        match self.db.commit_file(owner_id, filename) {
            Ok(true) => {
                tracing::debug!(owner_id, filename, "Uploaded file");
                Ok(())
            }
            Ok(false) => {
                // The intent vanished underneath us; the blob must not outlive it.
                if let Err(e) = self.content.delete(&key).await {
                    tracing::error!(
                        owner_id,
                        filename,
                        error = %e,
                        "Content rollback failed; left for reconciliation"
                    );
                }
                Err(FileStoreError::Storage(format!(
                    "pending record for '{filename}' disappeared before commit"
                )))
            }
            Err(e) => {
                tracing::debug!(owner_id, filename, error = %e, "Commit failed, rolling back");
                if let Err(e) = self.content.delete(&key).await {
                    tracing::error!(
                        owner_id,
                        filename,
                        error = %e,
                        "Content rollback failed; left for reconciliation"
                    );
                }
                self.discard_pending(owner_id, filename);
                Err(e.into())
            }
        }
    }

    fn discard_pending(&self, owner_id: UserId, filename: &str) {
        if let Err(e) = self.db.remove_file(owner_id, filename) {
            tracing::error!(
                owner_id,
                filename,
                error = %e,
                "Failed to remove pending record; left for reconciliation"
            );
        }
    }

    pub fn find_files(&self, owner_id: UserId) -> Result<Vec<String>, FileStoreError> {
        Ok(self
            .db
            .list_files(owner_id)?
            .into_iter()
            .map(|f| f.filename)
            .collect())
    }

    /// Filenames and upload times (unix seconds), index-aligned.
    pub fn find_files_with_dates(
        &self,
        owner_id: UserId,
    ) -> Result<(Vec<String>, Vec<i64>), FileStoreError> {
        Ok(self
            .db
            .list_files(owner_id)?
            .into_iter()
            .map(|f| (f.filename, f.uploaded_at.timestamp()))
            .unzip())
    }

    pub async fn download(&self, owner_id: UserId, filename: &str) -> Result<Bytes, FileStoreError> {
        validate_filename(filename)?;

        let record = self
            .db
            .get_file(owner_id, filename)?
            .filter(FileRecord::is_committed)
            .ok_or(FileStoreError::NotFound)?;

        match self.content.get(&record.content_key()).await {
            Ok(data) => Ok(data),
            Err(ObjectStoreError::NotFound(key)) => {
                // A delete may have taken the row between the two reads.
                let still_committed = self
                    .db
                    .get_file(owner_id, filename)?
                    .is_some_and(|f| f.is_committed());
                if !still_committed {
                    return Err(FileStoreError::NotFound);
                }
                Err(FileStoreError::Storage(format!("content missing for {key}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, owner_id: UserId, filename: &str) -> Result<(), FileStoreError> {
        validate_filename(filename)?;

        let record = self
            .db
            .mark_deleting(owner_id, filename)?
            .ok_or(FileStoreError::NotFound)?;

        if let Err(e) = self.content.delete(&record.content_key()).await {
            tracing::debug!(owner_id, filename, error = %e, "Content removal failed");
            return Err(e.into());
        }

        self.db.remove_file(owner_id, filename)?;
        tracing::debug!(owner_id, filename, "Deleted file");
        Ok(())
    }

    /// Make a file public. The first call assigns the share id; later calls
    /// return the same one.
    pub fn share(&self, owner_id: UserId, filename: &str) -> Result<String, FileStoreError> {
        validate_filename(filename)?;

        let candidate = uuid::Uuid::new_v4().to_string();
        let share_id = self
            .db
            .share_file(owner_id, filename, &candidate)?
            .ok_or(FileStoreError::NotFound)?;

        tracing::debug!(owner_id, filename, share_id = %share_id, "Shared file");
        Ok(share_id)
    }

    /// Finish every interrupted upload or delete. Run before serving
    /// requests: a live upload's pending row is indistinguishable from an
    /// abandoned one.
    pub async fn reconcile(&self) -> Result<ReconcileStats, FileStoreError> {
        let mut stats = ReconcileStats::default();

        for intent in self.db.list_intents()? {
            if let Err(e) = self.content.delete(&intent.content_key()).await {
                tracing::warn!(
                    owner_id = intent.owner_id,
                    filename = %intent.filename,
                    error = %e,
                    "Could not remove content during reconciliation"
                );
                continue;
            }
            self.db.remove_file(intent.owner_id, &intent.filename)?;

            match intent.state {
                FileState::Pending => stats.pending_removed += 1,
                FileState::Deleting => stats.deletions_completed += 1,
                FileState::Committed => {}
            }
        }

        Ok(stats)
    }
}
