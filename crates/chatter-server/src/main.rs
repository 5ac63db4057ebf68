//! # Chatter Server
//!
//! Live chat over server-sent events.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! chatter
//!
//! # Run with a config file in the working directory
//! cp chatter.toml.example chatter.toml && chatter
//!
//! # Run with environment variables
//! CHATTER_PORT=8080 CHATTER_HOST=0.0.0.0 chatter
//! ```

mod config;
mod handlers;
mod metrics;
mod render;
mod shutdown;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatter=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Chatter server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    handlers::run_server(config).await?;

    tracing::info!("Chatter server stopped");
    Ok(())
}
