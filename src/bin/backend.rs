//! Reference origin binary.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use balancer::OriginServer;

#[derive(Parser)]
#[command(name = "backend")]
#[command(about = "Reference origin server for the balancer", long_about = None)]
struct Cli {
    /// Hostname to bind.
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Port to bind.
    #[arg(long, default_value_t = 8081)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "balancer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let origin = OriginServer::new(format!("{}:{}", cli.hostname, cli.port));
    let handle = origin.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            handle.shutdown().await;
        }
    });

    origin.run().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
