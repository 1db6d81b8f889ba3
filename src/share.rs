use crate::file_store::FileStoreError;
use crate::storage::models::UserId;
use crate::storage::Database;

/// Owner and filename behind a public share id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFile {
    pub owner_id: UserId,
    pub filename: String,
}

/// Unauthenticated share id lookups. Anything that is not a committed,
/// public record carrying exactly this share id is `NotFound`.
#[derive(Clone)]
pub struct ShareResolver {
    db: Database,
}

impl ShareResolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn resolve(&self, share_id: &str) -> Result<SharedFile, FileStoreError> {
        if uuid::Uuid::parse_str(share_id).is_err() {
            return Err(FileStoreError::NotFound);
        }

        let file = self
            .db
            .get_file_by_share(share_id)?
            .ok_or(FileStoreError::NotFound)?;

        if !(file.is_committed() && file.public && file.share_id.as_deref() == Some(share_id)) {
            return Err(FileStoreError::NotFound);
        }

        Ok(SharedFile {
            owner_id: file.owner_id,
            filename: file.filename,
        })
    }
}
