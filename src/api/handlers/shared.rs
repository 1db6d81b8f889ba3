use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::files::FileContentResponse;
use crate::api::response::ApiError;
use crate::StorageState;

/// Public read of a shared file, base64 in JSON.
/// Route: GET /file/:share_id
pub async fn get_shared_file(
    State(state): State<Arc<StorageState>>,
    Path(share_id): Path<String>,
) -> Result<Json<FileContentResponse>, ApiError> {
    let shared = state.shares.resolve(&share_id)?;
    let content = state.files.download(shared.owner_id, &shared.filename).await?;

    Ok(Json(FileContentResponse {
        filename: shared.filename,
        base64: STANDARD.encode(&content),
    }))
}

/// Public read of a shared file as raw bytes.
/// Route: GET /file/:share_id/raw
pub async fn serve_shared_file(
    State(state): State<Arc<StorageState>>,
    Path(share_id): Path<String>,
) -> Result<Response, ApiError> {
    let shared = state.shares.resolve(&share_id)?;
    let content = state.files.download(shared.owner_id, &shared.filename).await?;
    let byte_size = content.len() as u64;

    let mut response = (StatusCode::OK, content).into_response();
    let headers = response.headers_mut();

    let mime = mime_guess::from_path(&shared.filename).first_or_octet_stream();
    headers.insert(
        header::CONTENT_TYPE,
        mime.as_ref()
            .parse()
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(byte_size));

    if let Ok(value) = format!("inline; filename=\"{}\"", shared.filename.replace('"', "")).parse()
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    // Deleting the file must revoke access immediately.
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok(response)
}
