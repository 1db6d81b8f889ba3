use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::accounts::Credentials;
use crate::api::context::{Authenticated, AUTH_COOKIE};
use crate::api::response::{ApiError, AppJson, StatusBody};
use crate::storage::models::UserId;
use crate::AuthState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub id: UserId,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: UserId,
    /// Token expiry, unix seconds.
    pub expires_at: i64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn register(
    State(state): State<Arc<AuthState>>,
    AppJson(credentials): AppJson<Credentials>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let accounts = state.accounts.clone();
    let user = tokio::task::spawn_blocking(move || accounts.register(&credentials)).await??;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            email: user.email,
        }),
    ))
}

pub async fn login(
    State(state): State<Arc<AuthState>>,
    jar: CookieJar,
    AppJson(credentials): AppJson<Credentials>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let accounts = state.accounts.clone();
    let user = tokio::task::spawn_blocking(move || accounts.authenticate(&credentials)).await??;

    let issued = state.tokens.issue(user.id);
    let secure = state.config.auth.secure_cookies;
    let cookie = Cookie::build((AUTH_COOKIE, issued.token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(if secure { SameSite::None } else { SameSite::Lax });

    tracing::info!(user_id = user.id, "User logged in");

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            user_id: user.id,
            expires_at: issued.expires_at,
        }),
    ))
}

/// Clear the session cookie. The token itself stays valid until it expires.
pub async fn logout(
    State(state): State<Arc<AuthState>>,
    Authenticated(user_id): Authenticated,
    jar: CookieJar,
) -> Result<(CookieJar, Json<StatusBody>), ApiError> {
    state.accounts.find(user_id)?;

    tracing::info!(user_id, "User logged out");
    Ok((jar.remove(Cookie::build(AUTH_COOKIE).path("/")), StatusBody::ok()))
}
