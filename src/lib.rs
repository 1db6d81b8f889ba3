//! filebox - per-user file storage behind a stateless token-authenticated API
//!
//! One crate, three network roles selected at startup:
//! - auth: registration, login and logout; issues signed session tokens
//! - storage: upload, list, download, delete and share, with file metadata in
//!   redb and content on the local filesystem kept consistent through
//!   write-ahead intent rows
//! - gateway: stateless reverse proxy routing requests to the other two

pub mod accounts;
pub mod api;
pub mod config;
pub mod file_store;
pub mod gateway;
pub mod object_store;
pub mod share;
pub mod storage;
pub mod tokens;
#[cfg(test)]
pub mod testutil;

use config::Config;

/// Shared state of the auth service.
pub struct AuthState {
    pub config: Config,
    pub accounts: accounts::UserDirectory,
    pub tokens: tokens::TokenAuthority,
}

/// Shared state of the storage service.
pub struct StorageState {
    pub config: Config,
    pub files: file_store::FileStore,
    pub shares: share::ShareResolver,
    pub tokens: tokens::TokenAuthority,
}
