mod accounts;
mod files;
mod health;
mod shared;

pub use accounts::{login, logout, register, LoginResponse, RegisterResponse};
pub use files::{
    delete_file, download_file, list_files, share_file, upload_file, FileContentResponse,
    FileEntry, ShareResponse,
};
pub use health::{health, not_found, HealthResponse};
pub use shared::{get_shared_file, serve_shared_file};
