//! Accessory GW - Rust implementation
//!
//! Gateway bridging a JSON WebSocket controller with HomeKit-style
//! accessories.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use accessory_gw::accessory::BridgeContext;
use accessory_gw::framework::local::LocalFramework;
use accessory_gw::framework::Framework;
use accessory_gw::{AccessoryRegistry, AppConfig, MessageRouter, Outbound};

/// Accessory Gateway - bridge a JSON WebSocket controller with HomeKit-style accessories
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Override the configured WebSocket port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    info!("Starting Accessory GW v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = AppConfig::load(&args.config).await?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let cache_path = config.cache_path();
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create cache directory {}", parent.display()))?;
    }
    let framework = LocalFramework::with_cache(cache_path);

    // Explicit context object shared by every component; no ambient state
    let outbound = Outbound::new();
    let ctx = Arc::new(BridgeContext::new(outbound.clone()));
    let registry = AccessoryRegistry::new(Arc::new(framework.clone()), ctx);

    // Rebind accessories the framework restored from its cache. A name
    // collision here means ambiguous identity: report and exit non-zero
    // instead of continuing (or crashing) with two devices claiming one
    // name.
    for cached in framework.cached_devices() {
        let name = cached.name.clone();
        if let Err(e) = registry.restore(cached) {
            error!("startup restore failed for '{}': {}", name, e);
            anyhow::bail!("startup restore failed: {e}");
        }
    }
    info!("Number of accessories: {}", registry.len());

    let router = Arc::new(MessageRouter::new(registry, outbound.clone()));

    let serve = accessory_gw::server::serve(&config.bind, config.port, router, outbound);
    tokio::select! {
        result = serve => result?,
        _ = shutdown_signal() => {}
    }

    info!("Accessory GW shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
