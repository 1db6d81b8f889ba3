use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderName};
use axum::response::Response;

use super::{select_backend, Backend, GatewayState};
use crate::api::response::ApiError;

/// Forward a request to the backend chosen by [`select_backend`] and relay
/// its response. Hop-by-hop headers are dropped in both directions.
pub async fn forward(
    State(state): State<Arc<GatewayState>>,
    req: Request,
) -> Result<Response, ApiError> {
    let (parts, body) = req.into_parts();
    let backend = select_backend(&parts.method, parts.uri.path());
    let upstream = state.upstream(backend);
    let url = upstream.url(parts.uri.path(), parts.uri.query());

    let declared_len = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > state.max_body) {
        return Err(ApiError::payload_too_large("request body is too large"));
    }
    let body = axum::body::to_bytes(body, state.max_body)
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read request body: {e}")))?;

    tracing::debug!(backend = backend.name(), url = %url, "Forwarding request");

    let response = upstream
        .client
        .request(parts.method, &url)
        .headers(end_to_end_headers(&parts.headers))
        .body(body)
        .send()
        .await
        .map_err(|e| upstream_error(backend, e))?;

    let status = response.status();
    let headers = end_to_end_headers(response.headers());
    let body = response
        .bytes()
        .await
        .map_err(|e| upstream_error(backend, e))?;

    let mut relayed = Response::new(Body::from(body));
    *relayed.status_mut() = status;
    *relayed.headers_mut() = headers;
    Ok(relayed)
}

fn upstream_error(backend: Backend, e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::gateway_timeout(format!("{} backend timed out: {e}", backend.name()))
    } else {
        ApiError::bad_gateway(format!("{} backend unreachable: {e}", backend.name()))
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Copy `headers` without hop-by-hop headers (including any listed in
/// `Connection`), `Host` and `Content-Length`; the HTTP stack recomputes the
/// last two.
fn end_to_end_headers(headers: &HeaderMap) -> HeaderMap {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect();

    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name)
            || *name == header::HOST
            || *name == header::CONTENT_LENGTH
            || listed.iter().any(|token| token == name.as_str())
        {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn strips_hop_by_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-private"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-private", HeaderValue::from_static("1"));
        headers.insert(header::HOST, HeaderValue::from_static("gateway:7000"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert(header::COOKIE, HeaderValue::from_static("Authorization=t"));
        headers.insert("x-request-id", HeaderValue::from_static("abc"));

        let forwarded = end_to_end_headers(&headers);

        assert_eq!(forwarded.len(), 2);
        assert_eq!(forwarded[header::COOKIE], "Authorization=t");
        assert_eq!(forwarded["x-request-id"], "abc");
    }
}
