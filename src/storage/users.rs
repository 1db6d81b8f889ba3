use chrono::Utc;
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{User, UserId};
use super::tables::*;

const USER_ID_SEQUENCE: &str = "user_id";

/// Emails are compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Database {
    // ========================================================================
    // User operations
    // ========================================================================

    /// Create a user with the next id. Fails with `DatabaseError::Conflict`
    /// when the email is already registered.
    pub fn create_user(&self, email: &str, password_hash: &str) -> Result<User, DatabaseError> {
        let email = normalize_email(email);

        let write_txn = self.begin_write()?;
        let user = {
            let mut emails = write_txn.open_table(USER_EMAILS)?;
            if emails.get(email.as_str())?.is_some() {
                return Err(DatabaseError::Conflict(format!(
                    "email '{email}' is already registered"
                )));
            }

            let mut sequences = write_txn.open_table(SEQUENCES)?;
            let id: UserId = sequences
                .get(USER_ID_SEQUENCE)?
                .map(|v| v.value())
                .unwrap_or(0)
                + 1;
            sequences.insert(USER_ID_SEQUENCE, id)?;

            let user = User {
                id,
                email: email.clone(),
                password_hash: password_hash.to_string(),
                created_at: Utc::now(),
            };

            let mut users = write_txn.open_table(USERS)?;
            let data = rmp_serde::to_vec_named(&user)?;
            users.insert(id, data.as_slice())?;
            emails.insert(email.as_str(), id)?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }

    /// Get a user by id
    pub fn get_user(&self, id: UserId) -> Result<Option<User>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(USERS)?;

        match table.get(id)? {
            Some(data) => {
                let user: User = rmp_serde::from_slice(data.value())?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Get a user by email (resolves email -> id -> user)
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let email = normalize_email(email);
        let read_txn = self.begin_read()?;
        let emails = read_txn.open_table(USER_EMAILS)?;

        let id = match emails.get(email.as_str())? {
            Some(data) => data.value(),
            None => return Ok(None),
        };

        let users = read_txn.open_table(USERS)?;
        match users.get(id)? {
            Some(data) => {
                let user: User = rmp_serde::from_slice(data.value())?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }
}
