//! tg-uploadr Library
//!
//! Small HTTP service that accepts a file upload from a browser and relays it
//! to a Telegram chat or user as a document through the Telegram Bot API.
//!
//! # Features
//!
//! - **Single Hop**: Files are forwarded once, nothing is kept on disk
//! - **Friendly Destinations**: Numeric chat IDs or `@username`, normalized
//! - **Readable Errors**: Telegram failures are turned into actionable messages
//! - **Proxy Aware**: Outbound calls can go through an HTTP(S) proxy
//!
//! # Example
//!
//! ```no_run
//! use tg_uploadr::{config::Config, server::Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let server = Server::new(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod destination;
pub mod metrics;
pub mod server;
pub mod telegram;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use destination::Destination;
pub use server::Server;
pub use telegram::{DocumentRelay, RelayResult, TelegramClient};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
