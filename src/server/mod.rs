//! HTTP server module
//!
//! Accepts connections with `hyper` on top of `tokio` and routes requests to
//! the upload, health and static file handlers.
//!
//! # Example
//!
//! ```no_run
//! use tg_uploadr::{config::Config, server::Server};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let server = Server::new(config).await?;
//! println!("Listening on {}", server.local_addr());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::telegram::{DocumentRelay, TelegramClient, TokenStatus};
use crate::upload::{UploadHandler, UploadLimits};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

pub mod routes;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Failed to create Telegram client: {0}")]
    ClientError(String),
}

/// Shared, read-only state handed to every request
pub struct AppState {
    pub upload: UploadHandler,
    pub token_status: TokenStatus,
    pub static_dir: PathBuf,
}

impl AppState {
    /// Build request state from configuration and a relay
    pub fn new(config: &Config, relay: Arc<dyn DocumentRelay>) -> Self {
        let limits = UploadLimits::from_megabytes(config.upload.max_file_size_mb);
        Self {
            upload: UploadHandler::new(relay, config.telegram.default_chat_id.clone(), limits),
            token_status: config.token_status(),
            static_dir: config.server.static_dir.clone(),
        }
    }
}

/// HTTP Server
pub struct Server {
    state: Arc<AppState>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Create a server relaying through the Telegram Bot API.
    ///
    /// Binds immediately; port 0 lets the OS pick one.
    pub async fn new(config: Config) -> Result<Self, ServerError> {
        let client = TelegramClient::new(config.telegram_client_config())
            .map_err(|e| ServerError::ClientError(e.to_string()))?;
        Self::with_relay(config, Arc::new(client)).await
    }

    /// Create a server with a custom relay
    pub async fn with_relay(
        config: Config,
        relay: Arc<dyn DocumentRelay>,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .bind_address()
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        Ok(Self {
            state: Arc::new(AppState::new(&config, relay)),
            listener,
            local_addr,
        })
    }

    /// The address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the task is dropped
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Serve until `shutdown` completes.
    ///
    /// Each connection runs in its own task; a failing connection is logged
    /// and never stops the accept loop.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future,
    {
        info!("Server starting on http://{}", self.local_addr);
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { routes::handle_request(req, state).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }
    }
}
