// src/main.rs

//! The main entry point for the PyropeDB server application.

use anyhow::Result;
use pyropedb::config::{Config, DEFAULT_CONFIG_PATH};
use pyropedb::server;
use std::env;
use tracing::error;
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging: RUST_LOG overrides, otherwise `info` for the whole server.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .with_ansi(true)
        .init();

    // One optional positional argument: the config file path.
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    // The server cannot run without a parseable configuration.
    let config = match Config::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server::run(config).await {
        error!("Server runtime error: {}", e);
        return Err(e);
    }
    Ok(())
}
