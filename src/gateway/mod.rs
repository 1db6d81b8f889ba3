//! Stateless reverse proxy in front of the auth and storage services.
//!
//! Routing is a pure function of method and path; the gateway never looks at
//! bodies or tokens.

mod proxy;

use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use thiserror::Error;

use crate::api::{handlers, request_pipeline};
use crate::config::{BackendConfig, Config};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to build HTTP client for {backend} backend: {source}")]
    Client {
        backend: &'static str,
        source: reqwest::Error,
    },
}

/// Where a request is forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Auth,
    Storage,
    /// Default for anything that is not an API route.
    Static,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Auth => "auth",
            Backend::Storage => "storage",
            Backend::Static => "static",
        }
    }
}

pub fn select_backend(method: &Method, path: &str) -> Backend {
    let is_storage = match path {
        "/account/register" | "/account/login" | "/account/logout" if *method == Method::POST => {
            return Backend::Auth
        }
        "/api/files" => *method == Method::GET,
        "/api/upload" | "/api/download" | "/api/share" => *method == Method::POST,
        "/api/delete" => *method == Method::DELETE,
        _ => *method == Method::GET && is_share_path(path),
    };

    if is_storage {
        Backend::Storage
    } else {
        Backend::Static
    }
}

/// `/file/{id}` or `/file/{id}/raw`.
pub fn is_share_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix("/file/") else {
        return false;
    };
    let id = rest.strip_suffix("/raw").unwrap_or(rest);
    !id.is_empty() && !id.contains('/')
}

/// One backend: its base URL and a client carrying its timeouts.
pub struct Upstream {
    base_url: String,
    client: reqwest::Client,
}

impl Upstream {
    fn new(backend: Backend, config: &BackendConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .pool_idle_timeout(config.idle_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|source| GatewayError::Client {
                backend: backend.name(),
                source,
            })?;

        Ok(Self {
            base_url: config.base_url(),
            client,
        })
    }

    fn url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(query) => format!("{}{path}?{query}", self.base_url),
            None => format!("{}{path}", self.base_url),
        }
    }
}

pub struct GatewayState {
    auth: Upstream,
    storage: Upstream,
    static_content: Upstream,
    max_body: usize,
}

impl GatewayState {
    pub fn new(config: &Config) -> Result<Self, GatewayError> {
        Ok(Self {
            auth: Upstream::new(Backend::Auth, &config.gateway.auth)?,
            storage: Upstream::new(Backend::Storage, &config.gateway.storage)?,
            static_content: Upstream::new(Backend::Static, &config.gateway.static_content)?,
            max_body: config.upload_body_limit(),
        })
    }

    fn upstream(&self, backend: Backend) -> &Upstream {
        match backend {
            Backend::Auth => &self.auth,
            Backend::Storage => &self.storage,
            Backend::Static => &self.static_content,
        }
    }
}

pub fn create_gateway_router(state: Arc<GatewayState>) -> Router {
    request_pipeline(
        Router::new()
            .route("/_internal/health", get(handlers::health))
            .fallback(proxy::forward)
            .with_state(state),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::api::context::REQUEST_ID_HEADER;

    #[test]
    fn routes_account_calls_to_auth() {
        for path in ["/account/register", "/account/login", "/account/logout"] {
            assert_eq!(select_backend(&Method::POST, path), Backend::Auth);
            assert_eq!(select_backend(&Method::GET, path), Backend::Static);
        }
    }

    #[test]
    fn routes_file_calls_to_storage() {
        assert_eq!(select_backend(&Method::GET, "/api/files"), Backend::Storage);
        assert_eq!(select_backend(&Method::POST, "/api/upload"), Backend::Storage);
        assert_eq!(select_backend(&Method::POST, "/api/download"), Backend::Storage);
        assert_eq!(select_backend(&Method::DELETE, "/api/delete"), Backend::Storage);
        assert_eq!(select_backend(&Method::POST, "/api/share"), Backend::Storage);
        assert_eq!(
            select_backend(&Method::GET, "/file/6f1c2a9e-4c1b-4c55-9d7a-0d2a5d1e7b11"),
            Backend::Storage
        );
        assert_eq!(select_backend(&Method::GET, "/file/abc/raw"), Backend::Storage);
    }

    #[test]
    fn everything_else_goes_to_static() {
        assert_eq!(select_backend(&Method::GET, "/"), Backend::Static);
        assert_eq!(select_backend(&Method::GET, "/index.html"), Backend::Static);
        assert_eq!(select_backend(&Method::POST, "/api/files"), Backend::Static);
        assert_eq!(select_backend(&Method::GET, "/api/upload"), Backend::Static);
        assert_eq!(select_backend(&Method::POST, "/file/abc"), Backend::Static);
        assert_eq!(select_backend(&Method::GET, "/file/"), Backend::Static);
        assert_eq!(select_backend(&Method::GET, "/file/a/b"), Backend::Static);
    }

    fn config_with_backend(port: u16) -> Config {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::testutil::test_config(&dir);
        let backend = BackendConfig::new("127.0.0.1", port);
        config.gateway.auth = backend.clone();
        config.gateway.storage = backend.clone();
        config.gateway.static_content = backend;
        config
    }

    #[tokio::test]
    async fn forwards_path_query_and_request_id() {
        let backend = Router::new().fallback(|req: Request<Body>| async move {
            let request_id = req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            (
                [(header::CONNECTION, "close")],
                format!("{} {} {request_id}", req.method(), req.uri()),
            )
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, backend).await.unwrap();
        });

        let state = GatewayState::new(&config_with_backend(port)).unwrap();
        let app = create_gateway_router(Arc::new(state));

        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/api/delete?x=1")
            .header(REQUEST_ID_HEADER, "gw-1")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "gw-1");
        assert!(response.headers().get(header::CONNECTION).is_none());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"DELETE /api/delete?x=1 gw-1");
    }

    #[tokio::test]
    async fn unreachable_backend_is_bad_gateway() {
        // Grab a free port and release it so nothing is listening there.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let state = GatewayState::new(&config_with_backend(port)).unwrap();
        let app = create_gateway_router(Arc::new(state));

        let request = Request::builder()
            .uri("/api/files")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
