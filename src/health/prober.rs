//! Active health probing.
//!
//! # Responsibilities
//! - Periodically probe each origin's health endpoint
//! - Update the per-entry liveness flag from probe outcomes
//!
//! # Design Decisions
//! - A coarse interval bounds the detection window without hammering
//!   origins; probes within one sweep are spaced by a short gap
//! - Probes never retry; every failure degrades to a mark-down
//! - Runs as a background task and terminates on the shutdown signal

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

use crate::config::HealthCheckConfig;
use crate::http::message::{read_message, status_code};
use crate::load_balancer::Registry;

/// Background prober that keeps the registry's liveness flags current.
pub struct HealthProber {
    registry: Arc<Registry>,
    config: HealthCheckConfig,
}

impl HealthProber {
    /// Create a prober over the shared registry.
    pub fn new(registry: Arc<Registry>, config: HealthCheckConfig) -> Self {
        Self { registry, config }
    }

    /// Run the probe loop until the shutdown signal fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let interval = Duration::from_secs(self.config.interval_secs);
        let gap = Duration::from_millis(self.config.probe_gap_ms);

        tracing::info!(
            interval_secs = self.config.interval_secs,
            path = %self.config.path,
            backends = self.registry.len(),
            "Health prober started"
        );

        'probe: loop {
            tokio::select! {
                _ = sleep(interval) => {}
                _ = shutdown.recv() => break 'probe,
            }

            for backend in self.registry.backends() {
                let live = self.probe(&backend.address).await;
                let was_live = backend.set_live(live);
                if live != was_live {
                    tracing::info!(address = %backend.address, live, "Backend liveness changed");
                } else {
                    tracing::debug!(address = %backend.address, live, "Probe completed");
                }

                tokio::select! {
                    _ = sleep(gap) => {}
                    _ = shutdown.recv() => break 'probe,
                }
            }
        }

        tracing::debug!("Health prober stopped");
    }

    /// One probe: dial, send a GET for the health path, read one response,
    /// inspect the status code. Any failure means down.
    async fn probe(&self, address: &str) -> bool {
        let per_step = Duration::from_secs(self.config.timeout_secs);

        let stream = match timeout(per_step, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::debug!(address = %address, error = %e, "Probe dial failed");
                return false;
            }
            Err(_) => {
                tracing::debug!(address = %address, "Probe dial timed out");
                return false;
            }
        };

        let (read_half, mut write_half) = stream.into_split();
        let request = format!("GET {} HTTP/1.1\r\n\r\n", self.config.path);
        if write_half.write_all(request.as_bytes()).await.is_err() {
            return false;
        }

        let mut reader = BufReader::new(read_half);
        match read_message(&mut reader, per_step).await {
            Ok(response) => matches!(status_code(&response), Some("200") | Some("204")),
            Err(e) => {
                tracing::debug!(address = %address, error = %e, "Probe read failed");
                false
            }
        }
    }
}
