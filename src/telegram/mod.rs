//! Telegram Bot API client
//!
//! Relays a document to a chat through `sendDocument`, optionally through a
//! forward proxy.
//!
//! # Example
//!
//! ```no_run
//! use tg_uploadr::destination::Destination;
//! use tg_uploadr::telegram::{TelegramClient, TelegramClientConfig};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TelegramClientConfig {
//!     bot_token: "123456:ABC-DEF1234ghIkl".to_string(),
//!     api_base_url: "https://api.telegram.org".to_string(),
//!     proxy_url: None,
//!     timeout: None,
//! };
//! let client = TelegramClient::new(config)?;
//!
//! let destination = Destination::normalize("@channel")?;
//! let result = client
//!     .send_document(&destination, "report.pdf", Bytes::from("%PDF"), "weekly report")
//!     .await?;
//! println!("{:?}", result);
//! # Ok(())
//! # }
//! ```
//!
//! # Failure model
//!
//! Expected, user-actionable problems (missing token, unreachable API, API
//! rejections) come back as [`RelayResult::Failure`]. Only unexpected
//! transport or parsing problems are returned as [`TelegramError`].

use crate::destination::Destination;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::io::ErrorKind;
use std::time::Duration;
use thiserror::Error;

pub mod response;

/// Default Bot API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Tokens shorter than this are rejected before any request is made
pub const MIN_TOKEN_LENGTH: usize = 10;

pub const TOKEN_MISSING_MESSAGE: &str =
    "Telegram Bot Token not configured. Please set TELEGRAM_BOT_TOKEN in your .env file";

pub const TOKEN_MALFORMED_MESSAGE: &str =
    "Invalid Telegram Bot Token format. Token seems too short";

/// Telegram client errors
#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("failed to send request: {0}")]
    RequestError(String),

    #[error("{0}")]
    ResponseError(String),
}

/// Outcome of a relay attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayResult {
    Success { message_id: i64, file_id: String },
    Failure { message: String },
}

impl RelayResult {
    pub fn failure(message: impl Into<String>) -> Self {
        RelayResult::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RelayResult::Success { .. })
    }
}

/// Token state as reported by the health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Configured,
    TooShort,
    Missing,
}

impl TokenStatus {
    pub fn of(token: &str) -> Self {
        if token.is_empty() {
            TokenStatus::Missing
        } else if token.len() < MIN_TOKEN_LENGTH {
            TokenStatus::TooShort
        } else {
            TokenStatus::Configured
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Configured => "configured",
            TokenStatus::TooShort => "invalid (too short)",
            TokenStatus::Missing => "missing",
        }
    }
}

/// Sends documents to a destination.
///
/// The upload handler depends on this seam rather than on [`TelegramClient`]
/// directly.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentRelay: Send + Sync {
    /// Relay `file` to `destination`. An empty `caption` is omitted.
    async fn send_document(
        &self,
        destination: &Destination,
        filename: &str,
        file: Bytes,
        caption: &str,
    ) -> Result<RelayResult, TelegramError>;
}

/// Telegram client configuration
#[derive(Debug, Clone)]
pub struct TelegramClientConfig {
    pub bot_token: String,
    pub api_base_url: String,
    pub proxy_url: Option<String>,
    pub timeout: Option<Duration>,
}

enum Transport {
    Ready(reqwest::Client),
    /// The proxy URL could not be used; every send reports this message
    Misconfigured(String),
}

/// Telegram Bot API client
pub struct TelegramClient {
    config: TelegramClientConfig,
    transport: Transport,
}

impl TelegramClient {
    /// Create a new Telegram client.
    ///
    /// An unusable proxy URL does not fail construction; it is logged and
    /// surfaced as a failure on each send.
    pub fn new(config: TelegramClientConfig) -> Result<Self, TelegramError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let transport = match config.proxy_url.as_deref() {
            Some(proxy_url) => match reqwest::Proxy::all(proxy_url) {
                Ok(proxy) => {
                    tracing::info!(
                        proxy = %redact_proxy_url(proxy_url),
                        "Using proxy for Telegram API requests"
                    );
                    Transport::Ready(
                        builder
                            .proxy(proxy)
                            .build()
                            .map_err(|e| TelegramError::ConfigError(e.to_string()))?,
                    )
                }
                Err(e) => {
                    let proxy_url = redact_proxy_url(proxy_url);
                    tracing::warn!(proxy = %proxy_url, error = %e, "Invalid proxy URL");
                    Transport::Misconfigured(format!(
                        "Invalid proxy URL: {}. Error: {}",
                        proxy_url, e
                    ))
                }
            },
            None => Transport::Ready(
                builder
                    .no_proxy()
                    .build()
                    .map_err(|e| TelegramError::ConfigError(e.to_string()))?,
            ),
        };

        Ok(Self { config, transport })
    }

    /// Token status without exposing the token itself
    pub fn token_status(&self) -> TokenStatus {
        TokenStatus::of(&self.config.bot_token)
    }

    pub fn api_base_url(&self) -> &str {
        &self.config.api_base_url
    }

    fn send_document_url(&self) -> String {
        format!(
            "{}/bot{}/sendDocument",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    /// Send a document to `destination`.
    ///
    /// Makes exactly one request; there is no retry.
    #[tracing::instrument(
        name = "telegram.send_document",
        skip(self, file, caption),
        fields(
            telegram.chat_id = %destination,
            upload.filename = %filename,
            upload.bytes = file.len(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    pub async fn send_document(
        &self,
        destination: &Destination,
        filename: &str,
        file: Bytes,
        caption: &str,
    ) -> Result<RelayResult, TelegramError> {
        match self.token_status() {
            TokenStatus::Missing => return Ok(RelayResult::failure(TOKEN_MISSING_MESSAGE)),
            TokenStatus::TooShort => return Ok(RelayResult::failure(TOKEN_MALFORMED_MESSAGE)),
            TokenStatus::Configured => {}
        }

        let http_client = match &self.transport {
            Transport::Ready(client) => client,
            Transport::Misconfigured(message) => return Ok(RelayResult::failure(message.clone())),
        };

        let form = build_form(destination, filename, file, caption);

        let response = match http_client
            .post(self.send_document_url())
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => response,
            // The URL carries the bot token, keep it out of messages
            Err(e) if is_connectivity_error(&e) => {
                let e = e.without_url();
                tracing::warn!(error = %e, "Cannot reach Telegram API");
                return Ok(RelayResult::failure(format!(
                    "Cannot connect to Telegram API. This might be because Telegram is blocked \
                     in your country. Error: {}. Try setting HTTP_PROXY in your .env file",
                    e
                )));
            }
            Err(e) => return Err(TelegramError::RequestError(e.without_url().to_string())),
        };

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        let body = response.bytes().await.map_err(|e| {
            TelegramError::ResponseError(format!("failed to read response: {}", e.without_url()))
        })?;

        if status != StatusCode::OK {
            let result = response::translate_error(status, &body);
            tracing::warn!(status = status.as_u16(), "Telegram API rejected document");
            return Ok(result);
        }

        let result = response::translate_success(&body)?;
        if let RelayResult::Success {
            message_id,
            file_id,
        } = &result
        {
            tracing::info!(message_id = message_id, file_id = %file_id, "Document delivered");
        }
        Ok(result)
    }
}

#[async_trait]
impl DocumentRelay for TelegramClient {
    async fn send_document(
        &self,
        destination: &Destination,
        filename: &str,
        file: Bytes,
        caption: &str,
    ) -> Result<RelayResult, TelegramError> {
        TelegramClient::send_document(self, destination, filename, file, caption).await
    }
}

/// Scheme, host and port of a proxy URL, with any `user:pass@` removed
pub fn redact_proxy_url(raw: &str) -> String {
    if let Ok(url) = reqwest::Url::parse(raw) {
        if let Some(host) = url.host_str() {
            return match url.port() {
                Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
                None => format!("{}://{}", url.scheme(), host),
            };
        }
    }

    match (raw.split_once("://"), raw.rsplit_once('@')) {
        (Some((scheme, _)), Some((_, rest))) => format!("{}://{}", scheme, rest),
        (None, Some((_, rest))) => rest.to_string(),
        _ => raw.to_string(),
    }
}

/// Build the `sendDocument` multipart form
fn build_form(destination: &Destination, filename: &str, file: Bytes, caption: &str) -> Form {
    let mut form = Form::new().text("chat_id", destination.as_str().to_string());
    if !caption.is_empty() {
        form = form.text("caption", caption.to_string());
    }
    let length = file.len() as u64;
    let document = Part::stream_with_length(file, length).file_name(filename.to_string());
    form.part("document", document)
}

/// Whether a transport error means the API could not be reached at all
fn is_connectivity_error(err: &reqwest::Error) -> bool {
    if err.is_connect() || err.is_timeout() {
        return true;
    }

    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::UnexpectedEof
                    | ErrorKind::TimedOut
            ) {
                return true;
            }
        }
        if let Some(hyper_err) = inner.downcast_ref::<hyper::Error>() {
            if hyper_err.is_incomplete_message() || hyper_err.is_canceled() {
                return true;
            }
        }
        source = inner.source();
    }

    false
}
