//! tg-uploadr - Relay browser uploads to Telegram
//!
//! Serves an upload page and forwards each file to a Telegram chat as a
//! document.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tg_uploadr::config::Config;
use tg_uploadr::metrics::server::MetricsServer;
use tg_uploadr::server::Server;
use tg_uploadr::telegram::{redact_proxy_url, TokenStatus};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// tg-uploadr - Upload files from a browser to Telegram
#[derive(Parser, Debug)]
#[command(name = "tg-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file. Environment variables are used when omitted.
    #[arg(short, long, env = "TG_UPLOADR_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match args.log_format {
        LogFormat::Json => builder.json().with_thread_ids(true).try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    info!("Starting tg-uploadr v{}", tg_uploadr::VERSION);

    // Load configuration
    let config = match &args.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::from_env()?,
    };

    match config.token_status() {
        TokenStatus::Configured => info!("Telegram Bot Token configured"),
        TokenStatus::TooShort => warn!("TELEGRAM_BOT_TOKEN looks too short, uploads will fail"),
        TokenStatus::Missing => warn!("TELEGRAM_BOT_TOKEN not set, uploads will fail"),
    }
    if config
        .telegram
        .default_chat_id
        .as_deref()
        .map_or(true, |id| id.trim().is_empty())
    {
        warn!("DEFAULT_CHAT_ID not set, every upload must name a chat");
    }
    match &config.telegram.proxy_url {
        Some(proxy) => info!("Using proxy: {}", redact_proxy_url(proxy)),
        None => info!("No proxy configured"),
    }
    info!("Maximum file size: {} MB", config.upload.max_file_size_mb);

    let mut metrics_server = if config.metrics.enabled {
        let mut server =
            MetricsServer::new(format!("{}:{}", config.server.address, config.metrics.port));
        server.start().await?;
        Some(server)
    } else {
        None
    };

    // Start server
    let server = Server::new(config).await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    if let Some(metrics) = metrics_server.as_mut() {
        metrics.shutdown().await;
    }

    Ok(())
}
