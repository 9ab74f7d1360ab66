//! Request handling: serve cached files, start origin pulls on a miss.

use std::io::ErrorKind;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use pullcache_engine::{CachePath, OriginError, contains_dot_dot, resolve};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, error, warn};

use crate::server::AppState;

pub const INVALID_PATH: &str = "invaild path";
pub const INVALID_METHOD: &str = "invalid method";
pub const NOT_READY: &str = "wait for downloading";
pub const NOT_FOUND: &str = "not found";
pub const UNKNOWN_ERROR: &str = "unknow err";

fn reply(status: StatusCode, body: &'static str) -> Response {
    (status, body).into_response()
}

fn request_host(req: &Request) -> &str {
    req.headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
        .unwrap_or_default()
}

pub async fn handle(State(state): State<Arc<AppState>>, req: Request) -> Response {
    if req.method() != Method::GET {
        return reply(StatusCode::INTERNAL_SERVER_ERROR, INVALID_METHOD);
    }

    let path = req.uri().path();
    if contains_dot_dot(path) {
        return reply(StatusCode::BAD_REQUEST, INVALID_PATH);
    }

    let origin = match resolve(&state.root, request_host(&req), path, req.uri().query()) {
        Ok(origin) => origin,
        Err(OriginError::InvalidHost(host)) => {
            warn!(host = %host, path, "Rejecting request without a usable Host");
            return reply(StatusCode::BAD_REQUEST, INVALID_PATH);
        }
        Err(e) => {
            debug!(error = %e, "Rejecting request path");
            return reply(StatusCode::BAD_REQUEST, INVALID_PATH);
        }
    };
    debug!(url = %origin.key, path = %origin.path, "Resolved request");

    match tokio::fs::metadata(origin.path.as_path()).await {
        Ok(meta) if meta.is_dir() => reply(StatusCode::NOT_FOUND, NOT_FOUND),
        Ok(_) => serve_file(req, &origin.path).await,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            if !state.filters.allows(origin.key.as_str()) {
                debug!(url = %origin.key, "Origin not allowed by filters");
                return reply(StatusCode::NOT_FOUND, NOT_FOUND);
            }
            state.tasks.ensure_task(origin.path, origin.key);
            reply(StatusCode::NOT_FOUND, NOT_READY)
        }
        Err(e) => {
            error!(path = %origin.path, error = %e, "Failed to stat cache file");
            reply(StatusCode::INTERNAL_SERVER_ERROR, UNKNOWN_ERROR)
        }
    }
}

async fn serve_file(req: Request, path: &CachePath) -> Response {
    match ServeFile::new(path.as_path()).oneshot(req).await {
        Ok(res) => res.map(Body::new),
        Err(never) => match never {},
    }
}
