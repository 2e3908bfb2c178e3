//! Balancer binary.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use balancer::config::{BackendConfig, BalancerConfig};
use balancer::Balancer;

#[derive(Parser)]
#[command(name = "balancer")]
#[command(about = "HTTP/1.1 round-robin reverse proxy", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "balancer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("balancer v0.1.0 starting");

    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => BalancerConfig::from_file(&path)?,
        None => default_config(),
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        probe_interval_secs = config.health_check.interval_secs,
        "Configuration loaded"
    );

    let balancer = Balancer::new(config);
    let handle = balancer.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            handle.shutdown().await;
        }
    });

    balancer.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// The static origin set served when no config file is given.
fn default_config() -> BalancerConfig {
    let mut config = BalancerConfig::default();
    for address in ["127.0.0.1:8081", "127.0.0.1:8082", "127.0.0.1:8083"] {
        config.backends.push(BackendConfig {
            address: address.to_string(),
        });
    }
    config
}
