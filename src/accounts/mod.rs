//! Registration and credential checks for the auth service.

pub mod password;

use serde::Deserialize;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::storage::models::{User, UserId};
use crate::storage::{Database, DatabaseError};
use crate::tokens::AuthError;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),
    #[error("email is already registered")]
    Conflict,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("user not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<DatabaseError> for AccountError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Conflict(_) => AccountError::Conflict,
            other => AccountError::Storage(other.to_string()),
        }
    }
}

/// Email/password pair for registration and login.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[serde(default)]
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 6, max = 100, message = "password must be 6 to 100 characters"))]
    pub password: String,
}

#[derive(Clone)]
pub struct UserDirectory {
    db: Database,
}

impl UserDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Validate and store a new account. Hashing is CPU-bound; async
    /// callers should run this on the blocking pool.
    pub fn register(&self, credentials: &Credentials) -> Result<User, AccountError> {
        credentials
            .validate()
            .map_err(|e| AccountError::Validation(validation_message(&e)))?;

        let password_hash = password::hash_password(&credentials.password)
            .map_err(|_| AccountError::Storage("failed to hash password".to_string()))?;
        let user = self.db.create_user(&credentials.email, &password_hash)?;

        tracing::info!(user_id = user.id, "Registered user");
        Ok(user)
    }

    /// Check an email/password pair. Unknown emails and wrong passwords are
    /// reported identically.
    pub fn authenticate(&self, credentials: &Credentials) -> Result<User, AccountError> {
        let user = self
            .db
            .get_user_by_email(&credentials.email)?
            .ok_or(AuthError::InvalidCredentials)?;

        if !password::verify_password(&credentials.password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials.into());
        }
        Ok(user)
    }

    pub fn find(&self, id: UserId) -> Result<User, AccountError> {
        self.db.get_user(id)?.ok_or(AccountError::NotFound)
    }
}

fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .map(|e| {
            e.message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| e.code.to_string())
        })
        .collect();
    messages.sort();
    messages.join("; ")
}
