use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::accounts::AccountError;
use crate::file_store::FileStoreError;
use crate::tokens::AuthError;

// ============================================================================
// Bodies
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

impl StatusBody {
    pub fn ok() -> Json<StatusBody> {
        Json(StatusBody {
            status: "ok".to_string(),
        })
    }
}

// ============================================================================
// Unified error type for handlers
// ============================================================================

/// A handler error. `Fail` is a client error whose message is returned as is;
/// `Error` is a server-side failure whose detail is logged but never sent.
///
/// The response conversion is the single place an error is logged, so it
/// always lands inside the request span.
#[derive(Debug)]
pub enum ApiError {
    Fail(StatusCode, String),
    Error(StatusCode, String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            ApiError::Fail(code, message) => {
                tracing::warn!(status = code.as_u16(), error = %message, "Request failed");
                (code, message)
            }
            ApiError::Error(code, detail) => {
                tracing::error!(status = code.as_u16(), error = %detail, "Request errored");
                (code, public_message(code).to_string())
            }
        };
        (code, Json(ErrorBody { error: message })).into_response()
    }
}

fn public_message(code: StatusCode) -> &'static str {
    match code {
        StatusCode::INTERNAL_SERVER_ERROR => "storage error",
        StatusCode::BAD_GATEWAY => "upstream unavailable",
        StatusCode::GATEWAY_TIMEOUT => "upstream timed out",
        other => other.canonical_reason().unwrap_or("error"),
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::BAD_REQUEST, message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::UNAUTHORIZED, message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::NOT_FOUND, message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::CONFLICT, message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        ApiError::Fail(StatusCode::PAYLOAD_TOO_LARGE, message.into())
    }

    pub fn bad_gateway(detail: impl Into<String>) -> Self {
        ApiError::Error(StatusCode::BAD_GATEWAY, detail.into())
    }

    pub fn gateway_timeout(detail: impl Into<String>) -> Self {
        ApiError::Error(StatusCode::GATEWAY_TIMEOUT, detail.into())
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ApiError::Error(StatusCode::INTERNAL_SERVER_ERROR, detail.into())
    }
}

impl From<FileStoreError> for ApiError {
    fn from(e: FileStoreError) -> Self {
        match e {
            FileStoreError::Validation(message) => ApiError::bad_request(message),
            FileStoreError::Conflict => ApiError::conflict(e.to_string()),
            FileStoreError::NotFound => ApiError::not_found(e.to_string()),
            FileStoreError::Storage(detail) => ApiError::internal(detail),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::unauthorized(e.to_string())
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::Validation(message) => ApiError::bad_request(message),
            AccountError::Conflict => ApiError::conflict(e.to_string()),
            AccountError::Auth(e) => e.into(),
            AccountError::NotFound => ApiError::not_found(e.to_string()),
            AccountError::Storage(detail) => ApiError::internal(detail),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::internal(format!("blocking task failed: {e}"))
    }
}

// ============================================================================
// Custom extractors
// ============================================================================

/// Drop-in replacement for `axum::Json` that rejects with an [`ApiError`].
pub struct AppJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    return Err(ApiError::payload_too_large("request body is too large"));
                }
                let message = match rejection {
                    JsonRejection::JsonDataError(err) => {
                        format!("Invalid request body: {}", err.body_text())
                    }
                    JsonRejection::JsonSyntaxError(_) => "Malformed JSON in request body".into(),
                    JsonRejection::MissingJsonContentType(_) => {
                        "Missing Content-Type: application/json header".into()
                    }
                    _ => "Failed to read request body".into(),
                };
                Err(ApiError::bad_request(message))
            }
        }
    }
}
