//! Request routing
//!
//! | Method | Path                 | Handler                 |
//! |--------|----------------------|-------------------------|
//! | GET    | `/`                  | `index.html`            |
//! | GET    | `/static/<path>`     | static assets           |
//! | GET    | `/api/health`        | token status            |
//! | GET    | `/api/max-file-size` | upload limit            |
//! | POST   | `/api/upload`        | [`UploadHandler`]       |
//!
//! Anything else gets a JSON 404.
//!
//! [`UploadHandler`]: crate::upload::UploadHandler

use super::AppState;
use crate::upload::UploadResponse;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

const STATIC_PREFIX: &str = "/static/";

/// Body of `GET /api/health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(rename = "botToken")]
    pub bot_token: &'static str,
}

/// Body of `GET /api/max-file-size`
#[derive(Debug, Serialize)]
pub struct MaxFileSizeResponse {
    #[serde(rename = "maxFileSizeMB")]
    pub max_file_size_mb: u64,
    #[serde(rename = "maxFileSizeBytes")]
    pub max_file_size_bytes: u64,
}

/// Dispatch one request
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    tracing::debug!(method = %method, path = %path, "Handling request");

    let response = match (&method, path.as_str()) {
        (&Method::GET, "/") => serve_file(&state.static_dir, Path::new("index.html")).await,
        (&Method::GET, p) if p.starts_with(STATIC_PREFIX) => {
            match sanitize_path(&p[STATIC_PREFIX.len()..]) {
                Some(relative) => serve_file(&state.static_dir, &relative).await,
                None => not_found(),
            }
        }
        (&Method::GET, "/api/health") => json(
            StatusCode::OK,
            &HealthResponse {
                status: "ok",
                bot_token: state.token_status.as_str(),
            },
        ),
        (&Method::GET, "/api/max-file-size") => {
            let limits = state.upload.limits();
            json(
                StatusCode::OK,
                &MaxFileSizeResponse {
                    max_file_size_mb: limits.max_file_size_mb,
                    max_file_size_bytes: limits.max_file_size_bytes,
                },
            )
        }
        (&Method::POST, "/api/upload") => {
            let (status, body) = state.upload.handle(req).await;
            json(status, &body)
        }
        _ => not_found(),
    };

    Ok(response)
}

/// Turn a URL tail into a relative path, rejecting anything that could climb
/// out of the static directory
fn sanitize_path(raw: &str) -> Option<PathBuf> {
    if raw.is_empty() || raw.contains('\\') {
        return None;
    }

    let mut relative = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

async fn serve_file(root: &Path, relative: &Path) -> Response<Full<Bytes>> {
    let path = root.join(relative);
    match tokio::fs::read(&path).await {
        Ok(contents) => {
            let mut response = Response::new(Full::new(Bytes::from(contents)));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static(content_type_for(&path)),
            );
            response
        }
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Static file not served");
            not_found()
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

fn json<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                br#"{"success":false,"error":"Internal Server Error"}"#.to_vec(),
            )
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(bytes)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn not_found() -> Response<Full<Bytes>> {
    json(StatusCode::NOT_FOUND, &UploadResponse::error("Not Found"))
}
