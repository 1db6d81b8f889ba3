use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::api::context::Authenticated;
use crate::api::response::{ApiError, AppJson, StatusBody};
use crate::StorageState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    /// Upload time, unix seconds.
    pub date: i64,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub filename: String,
    /// Standard base64 of the file content.
    #[serde(default)]
    pub file: String,
}

/// Body of download, delete and share.
#[derive(Debug, Deserialize)]
pub struct FilenameRequest {
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileContentResponse {
    pub filename: String,
    pub base64: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShareResponse {
    pub share_id: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_files(
    State(state): State<Arc<StorageState>>,
    Authenticated(user_id): Authenticated,
) -> Result<Response, ApiError> {
    let (names, dates) = state.files.find_files_with_dates(user_id)?;
    if names.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let entries: Vec<FileEntry> = names
        .into_iter()
        .zip(dates)
        .map(|(name, date)| FileEntry { name, date })
        .collect();
    Ok(Json(entries).into_response())
}

pub async fn upload_file(
    State(state): State<Arc<StorageState>>,
    Authenticated(user_id): Authenticated,
    AppJson(req): AppJson<UploadRequest>,
) -> Result<Json<StatusBody>, ApiError> {
    let content = STANDARD
        .decode(req.file.as_bytes())
        .map_err(|e| ApiError::bad_request(format!("file must be base64 encoded: {e}")))?;

    if content.len() as u64 > state.config.max_upload_size {
        return Err(ApiError::payload_too_large(format!(
            "File exceeds maximum upload size of {} bytes",
            state.config.max_upload_size
        )));
    }

    state
        .files
        .upload(user_id, &req.filename, Bytes::from(content))
        .await?;

    Ok(StatusBody::ok())
}

pub async fn download_file(
    State(state): State<Arc<StorageState>>,
    Authenticated(user_id): Authenticated,
    AppJson(req): AppJson<FilenameRequest>,
) -> Result<Json<FileContentResponse>, ApiError> {
    let content = state.files.download(user_id, &req.filename).await?;

    Ok(Json(FileContentResponse {
        filename: req.filename,
        base64: STANDARD.encode(&content),
    }))
}

pub async fn delete_file(
    State(state): State<Arc<StorageState>>,
    Authenticated(user_id): Authenticated,
    AppJson(req): AppJson<FilenameRequest>,
) -> Result<Json<StatusBody>, ApiError> {
    state.files.delete(user_id, &req.filename).await?;
    Ok(StatusBody::ok())
}

pub async fn share_file(
    State(state): State<Arc<StorageState>>,
    Authenticated(user_id): Authenticated,
    AppJson(req): AppJson<FilenameRequest>,
) -> Result<Json<ShareResponse>, ApiError> {
    let share_id = state.files.share(user_id, &req.filename)?;
    Ok(Json(ShareResponse { share_id }))
}
