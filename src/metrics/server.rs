//! Prometheus scrape listener
//!
//! Serves `/metrics` and `/health` on their own port, separate from uploads.
//!
//! ```no_run
//! use tg_uploadr::metrics::server::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("127.0.0.1:9090");
//! let addr = server.start().await?;
//! println!("Scrape http://{}/metrics", addr);
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Metrics server error
#[derive(Debug, thiserror::Error)]
pub enum MetricsServerError {
    #[error("Failed to bind metrics listener: {0}")]
    IoError(#[from] std::io::Error),
}

/// Background Prometheus listener
pub struct MetricsServer {
    address: String,
    running: Option<(oneshot::Sender<()>, JoinHandle<()>)>,
}

impl MetricsServer {
    /// `address` is `host:port`; port 0 picks a free one
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            running: None,
        }
    }

    /// Bind and serve in a background task. Returns the bound address.
    pub async fn start(&mut self) -> Result<SocketAddr, MetricsServerError> {
        let listener = TcpListener::bind(&self.address).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(accept_loop(listener, shutdown_rx));
        self.running = Some((shutdown_tx, handle));

        tracing::info!("Metrics server listening on {}", addr);
        Ok(addr)
    }

    /// Stop accepting scrapes and wait for the listener task to end
    pub async fn shutdown(&mut self) {
        if let Some((shutdown_tx, handle)) = self.running.take() {
            let _ = shutdown_tx.send(());
            if let Err(e) = handle.await {
                tracing::warn!("Metrics server task ended abnormally: {}", e);
            }
        }
    }
}

async fn accept_loop(listener: TcpListener, mut shutdown_rx: oneshot::Receiver<()>) {
    loop {
        let (stream, peer_addr) = tokio::select! {
            _ = &mut shutdown_rx => {
                tracing::info!("Shutting down metrics server");
                return;
            }
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Metrics server failed to accept connection: {}", e);
                    continue;
                }
            },
        };

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(route))
                .await
            {
                tracing::debug!("Error serving metrics scrape from {}: {}", peer_addr, e);
            }
        });
    }
}

async fn route(req: Request<hyper::body::Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => scrape(),
        (&Method::GET, "/health") => {
            respond(StatusCode::OK, "application/json", Bytes::from_static(br#"{"status":"ok"}"#))
        }
        _ => respond(StatusCode::NOT_FOUND, "text/plain", Bytes::from_static(b"Not Found")),
    };
    Ok(response)
}

/// Encode the default registry in the Prometheus text format
fn scrape() -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => {
            let mut response = respond(StatusCode::OK, "text/plain", Bytes::from(buffer));
            if let Ok(value) = HeaderValue::from_str(encoder.format_type()) {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            response
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                Bytes::from_static(b"Failed to encode metrics"),
            )
        }
    }
}

fn respond(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
