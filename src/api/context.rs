//! Per-request context and the authentication step for protected routes.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;

use super::response::ApiError;
use crate::storage::models::UserId;
use crate::tokens::{AuthError, TokenAuthority};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Cookie carrying the session token.
pub const AUTH_COOKIE: &str = "Authorization";

/// Typed context stored in request extensions.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub correlation_id: String,
    /// Set only after [`authenticate`] has accepted the session token.
    pub user_id: Option<UserId>,
}

/// Copy the correlation id (assigned earlier in the pipeline) into the
/// request context.
pub async fn attach_context(mut req: Request, next: Next) -> Response {
    let correlation_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    req.extensions_mut().insert(RequestContext {
        correlation_id,
        user_id: None,
    });
    next.run(req).await
}

/// Verify the session cookie, rejecting the request with 401 otherwise.
pub async fn authenticate(
    State(tokens): State<TokenAuthority>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = session_user(&tokens, &jar)?;
    tracing::Span::current().record("user_id", user_id);

    match req.extensions_mut().get_mut::<RequestContext>() {
        Some(ctx) => ctx.user_id = Some(user_id),
        None => {
            req.extensions_mut().insert(RequestContext {
                correlation_id: String::new(),
                user_id: Some(user_id),
            });
        }
    }

    Ok(next.run(req).await)
}

pub fn session_user(tokens: &TokenAuthority, jar: &CookieJar) -> Result<UserId, AuthError> {
    let cookie = jar.get(AUTH_COOKIE).ok_or(AuthError::Missing)?;
    tokens.verify(cookie.value())
}

/// The caller's user id. Only usable behind [`authenticate`].
#[derive(Debug, Clone, Copy)]
pub struct Authenticated(pub UserId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, ApiError> {
        parts
            .extensions
            .get::<RequestContext>()
            .and_then(|ctx| ctx.user_id)
            .map(Authenticated)
            .ok_or_else(|| AuthError::Missing.into())
    }
}
