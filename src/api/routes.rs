use std::sync::Arc;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::context::{attach_context, authenticate, REQUEST_ID_HEADER};
use super::handlers;
use crate::{AuthState, StorageState};

/// Wrap a router in the shared interceptor chain, outermost first: assign a
/// request id if missing, open the request span, echo the id on the
/// response, then expose it to handlers through the request context.
pub fn request_pipeline(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(make_request_span)
                    // Errors are logged once by their response conversion.
                    .on_failure(()),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(middleware::from_fn(attach_context)),
    )
}

fn make_request_span(req: &Request<Body>) -> Span {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    tracing::info_span!(
        "request",
        method = %req.method(),
        uri = %req.uri(),
        request_id,
        user_id = tracing::field::Empty,
    )
}

fn auth_routes(state: Arc<AuthState>) -> Router {
    let protected = Router::new()
        .route("/account/logout", post(handlers::logout))
        .route_layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            authenticate,
        ));

    Router::new()
        .route("/account/register", post(handlers::register))
        .route("/account/login", post(handlers::login))
        .merge(protected)
        .with_state(state)
}

fn storage_routes(state: Arc<StorageState>) -> Router {
    let upload_limit = state.config.upload_body_limit();

    let protected = Router::new()
        .route("/api/files", get(handlers::list_files))
        .route(
            "/api/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/download", post(handlers::download_file))
        .route("/api/delete", delete(handlers::delete_file))
        .route("/api/share", post(handlers::share_file))
        .route_layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            authenticate,
        ));

    Router::new()
        .route("/file/:share_id", get(handlers::get_shared_file))
        .route("/file/:share_id/raw", get(handlers::serve_shared_file))
        .merge(protected)
        .with_state(state)
}

fn finish(router: Router) -> Router {
    request_pipeline(
        router
            .route("/_internal/health", get(handlers::health))
            .fallback(handlers::not_found),
    )
}

pub fn create_auth_router(state: Arc<AuthState>) -> Router {
    finish(auth_routes(state))
}

pub fn create_storage_router(state: Arc<StorageState>) -> Router {
    finish(storage_routes(state))
}

/// Auth and storage routes on one listener.
pub fn create_standalone_router(auth: Arc<AuthState>, storage: Arc<StorageState>) -> Router {
    finish(auth_routes(auth).merge(storage_routes(storage)))
}
