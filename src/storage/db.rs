use redb::{Database as RedbDatabase, ReadTransaction, WriteTransaction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::tables::*;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    /// A uniqueness constraint rejected the write.
    #[error("Constraint violation: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
}

impl From<redb::CommitError> for DatabaseError {
    fn from(e: redb::CommitError) -> Self {
        DatabaseError::Commit(Box::new(e))
    }
}

impl From<redb::DatabaseError> for DatabaseError {
    fn from(e: redb::DatabaseError) -> Self {
        DatabaseError::RedbDatabase(Box::new(e))
    }
}

impl From<redb::StorageError> for DatabaseError {
    fn from(e: redb::StorageError) -> Self {
        DatabaseError::Storage(Box::new(e))
    }
}

impl From<redb::TableError> for DatabaseError {
    fn from(e: redb::TableError) -> Self {
        DatabaseError::Table(Box::new(e))
    }
}

impl From<redb::TransactionError> for DatabaseError {
    fn from(e: redb::TransactionError) -> Self {
        DatabaseError::Transaction(Box::new(e))
    }
}

/// Metadata store shared by the auth and storage services.
///
/// redb runs one write transaction at a time, so a read-check-write inside a
/// single `begin_write()` is atomic with respect to every other writer. All
/// uniqueness rules (per-owner filenames, user emails) are enforced that way.
pub struct Database {
    db: Arc<RedbDatabase>,
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("filebox.redb");
        let db = Arc::new(RedbDatabase::create(db_path)?);

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(FILES)?;
            let _ = write_txn.open_table(FILE_SHARES)?;
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_EMAILS)?;
            let _ = write_txn.open_table(SEQUENCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }
}
