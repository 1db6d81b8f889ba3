use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{FileRecord, FileState, UserId};
use super::tables::*;

fn load<T>(table: &T, owner_id: UserId, filename: &str) -> Result<Option<FileRecord>, DatabaseError>
where
    T: ReadableTable<(u64, &'static str), &'static [u8]>,
{
    match table.get((owner_id, filename))? {
        Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
        None => Ok(None),
    }
}

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Insert a new pending file record.
    ///
    /// Fails with `DatabaseError::Conflict` when the owner already has a row
    /// with this filename, in any state. This is the only uniqueness check.
    pub fn insert_pending(&self, file: &FileRecord) -> Result<(), DatabaseError> {
        debug_assert!(!file.filename.is_empty(), "filename must not be empty");
        debug_assert_eq!(file.state, FileState::Pending);

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(FILES)?;
            let key = (file.owner_id, file.filename.as_str());
            if table.get(key)?.is_some() {
                return Err(DatabaseError::Conflict(format!(
                    "file '{}' already exists for user {}",
                    file.filename, file.owner_id
                )));
            }
            let data = rmp_serde::to_vec_named(file)?;
            table.insert(key, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Flip a pending record to committed. Returns false if there is no
    /// pending record for the key.
    pub fn commit_file(&self, owner_id: UserId, filename: &str) -> Result<bool, DatabaseError> {
        self.transition(owner_id, filename, &[FileState::Pending], FileState::Committed)
            .map(|file| file.is_some())
    }

    /// Tombstone a committed record ahead of content removal. An existing
    /// tombstone is returned as-is so an interrupted delete can be retried.
    /// Returns None if the record is missing or still pending.
    pub fn mark_deleting(
        &self,
        owner_id: UserId,
        filename: &str,
    ) -> Result<Option<FileRecord>, DatabaseError> {
        self.transition(
            owner_id,
            filename,
            &[FileState::Committed, FileState::Deleting],
            FileState::Deleting,
        )
    }

    fn transition(
        &self,
        owner_id: UserId,
        filename: &str,
        from: &[FileState],
        to: FileState,
    ) -> Result<Option<FileRecord>, DatabaseError> {
        let write_txn = self.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(FILES)?;
            match load(&table, owner_id, filename)? {
                Some(mut file) if from.contains(&file.state) => {
                    file.state = to;
                    let data = rmp_serde::to_vec_named(&file)?;
                    table.insert((owner_id, filename), data.as_slice())?;
                    Some(file)
                }
                _ => None,
            }
        };
        write_txn.commit()?;
        Ok(updated)
    }

    /// Remove a record in any state, along with its share index entry.
    pub fn remove_file(
        &self,
        owner_id: UserId,
        filename: &str,
    ) -> Result<Option<FileRecord>, DatabaseError> {
        let write_txn = self.begin_write()?;
        let removed: Option<FileRecord> = {
            let mut table = write_txn.open_table(FILES)?;
            let result = match table.remove((owner_id, filename))? {
                Some(data) => Some(rmp_serde::from_slice(data.value())?),
                None => None,
            };
            result
        };

        if let Some(share_id) = removed.as_ref().and_then(|f| f.share_id.as_deref()) {
            let mut shares = write_txn.open_table(FILE_SHARES)?;
            shares.remove(share_id)?;
        }

        write_txn.commit()?;
        Ok(removed)
    }

    /// Get a file record in any state
    pub fn get_file(
        &self,
        owner_id: UserId,
        filename: &str,
    ) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;
        load(&table, owner_id, filename)
    }

    /// Committed files of one owner, ordered by filename
    pub fn list_files(&self, owner_id: UserId) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        let mut files = Vec::new();
        for result in table.range((owner_id, "")..)? {
            let (key, value) = result?;
            if key.value().0 != owner_id {
                break;
            }
            let file: FileRecord = rmp_serde::from_slice(value.value())?;
            if file.is_committed() {
                files.push(file);
            }
        }

        Ok(files)
    }

    /// Mark a committed file public, assigning `candidate_share_id` if it has
    /// no share id yet. Returns the effective share id, or None if there is no
    /// committed record for the key.
    pub fn share_file(
        &self,
        owner_id: UserId,
        filename: &str,
        candidate_share_id: &str,
    ) -> Result<Option<String>, DatabaseError> {
        let write_txn = self.begin_write()?;
        let share_id = {
            let mut table = write_txn.open_table(FILES)?;
            match load(&table, owner_id, filename)? {
                Some(file) if file.is_committed() => {
                    if let Some(existing) = file.share_id.clone() {
                        Some(existing)
                    } else {
                        let mut file = file;
                        file.public = true;
                        file.share_id = Some(candidate_share_id.to_string());
                        let data = rmp_serde::to_vec_named(&file)?;
                        table.insert((owner_id, filename), data.as_slice())?;

                        let mut shares = write_txn.open_table(FILE_SHARES)?;
                        shares.insert(candidate_share_id, (owner_id, filename))?;
                        Some(candidate_share_id.to_string())
                    }
                }
                _ => None,
            }
        };
        write_txn.commit()?;
        Ok(share_id)
    }

    /// Look up the record a share id points at, in any state
    pub fn get_file_by_share(&self, share_id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let shares = read_txn.open_table(FILE_SHARES)?;

        let (owner_id, filename) = match shares.get(share_id)? {
            Some(data) => {
                let (owner_id, filename) = data.value();
                (owner_id, filename.to_string())
            }
            None => return Ok(None),
        };

        let files = read_txn.open_table(FILES)?;
        load(&files, owner_id, &filename)
    }

    /// All records stuck in `Pending` or `Deleting`
    pub fn list_intents(&self) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        let mut intents = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let file: FileRecord = rmp_serde::from_slice(value.value())?;
            if !file.is_committed() {
                intents.push(file);
            }
        }

        Ok(intents)
    }
}
