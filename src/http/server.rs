//! Balancer assembly and accept loop.
//!
//! # Responsibilities
//! - Bind the listener and accept client connections
//! - Spawn one forwarder task per accepted connection
//! - Spawn the health prober
//! - Coordinate graceful shutdown and drain all spawned tasks

use tokio::sync::{mpsc, watch};

use crate::config::BalancerConfig;
use crate::health::HealthProber;
use crate::lifecycle::Shutdown;
use crate::load_balancer::Registry;
use crate::net::{Forwarder, Listener};
use std::sync::Arc;

/// Fatal failures of the accept path.
#[derive(Debug)]
pub enum ServeError {
    /// The listen endpoint could not be bound.
    Bind(std::io::Error),
    /// The accept loop failed outside of shutdown.
    Accept(std::io::Error),
}

impl std::fmt::Display for ServeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServeError::Bind(e) => write!(f, "could not bind the listen endpoint: {}", e),
            ServeError::Accept(e) => write!(f, "accept loop failed: {}", e),
        }
    }
}

impl std::error::Error for ServeError {}

/// The balancer instance: listener, registry, prober, and lifecycle.
pub struct Balancer {
    config: BalancerConfig,
    registry: Arc<Registry>,
    shutdown: Shutdown,
    stopped_tx: watch::Sender<bool>,
    stopped_rx: watch::Receiver<bool>,
}

/// Cloneable handle for stopping a running balancer from another task.
#[derive(Clone)]
pub struct BalancerHandle {
    shutdown: Shutdown,
    stopped: watch::Receiver<bool>,
}

impl BalancerHandle {
    /// Trigger shutdown and wait until the balancer has drained every
    /// spawned task. Idempotent; safe to call from any task.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();

        let mut stopped = self.stopped.clone();
        while !*stopped.borrow() {
            if stopped.changed().await.is_err() {
                break;
            }
        }
    }
}

impl Balancer {
    /// Create a balancer from configuration. Nothing is bound yet.
    pub fn new(config: BalancerConfig) -> Self {
        let registry = Arc::new(Registry::new(&config.backends));
        let (stopped_tx, stopped_rx) = watch::channel(false);

        Self {
            config,
            registry,
            shutdown: Shutdown::new(),
            stopped_tx,
            stopped_rx,
        }
    }

    /// Handle for triggering shutdown from other tasks.
    pub fn handle(&self) -> BalancerHandle {
        BalancerHandle {
            shutdown: self.shutdown.clone(),
            stopped: self.stopped_rx.clone(),
        }
    }

    /// Bind the listener and serve until shutdown.
    ///
    /// Bind failures and accept failures outside of shutdown are fatal and
    /// returned to the caller. On return every spawned task has completed
    /// and the listener socket is closed.
    pub async fn run(self) -> Result<(), ServeError> {
        let listener = Listener::bind(&self.config.listener)
            .await
            .map_err(ServeError::Bind)?;
        let local_addr = listener.local_addr().map_err(ServeError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_connections = self.config.listener.max_connections,
            "Accepting client connections"
        );

        // Guard channel doubling as the task tracker: every spawned task
        // owns a sender clone, and recv() yields None once all are gone.
        let (task_guard, mut tasks_done) = mpsc::channel::<()>(1);

        if self.config.health_check.enabled {
            let prober =
                HealthProber::new(self.registry.clone(), self.config.health_check.clone());
            let shutdown_rx = self.shutdown.subscribe();
            let guard = task_guard.clone();
            tokio::spawn(async move {
                prober.run(shutdown_rx).await;
                drop(guard);
            });
        }

        let mut shutdown_rx = self.shutdown.subscribe();
        let result = loop {
            if self.shutdown.is_triggered() {
                break Ok(());
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, slot)) => {
                        tracing::debug!(peer = %peer, "Connection accepted");
                        let forwarder = Forwarder::new(
                            self.registry.clone(),
                            self.config.timeouts.clone(),
                            self.config.retries.clone(),
                        );
                        let guard = task_guard.clone();
                        tokio::spawn(async move {
                            forwarder.run(stream, peer).await;
                            drop(slot);
                            drop(guard);
                        });
                    }
                    Err(e) if self.shutdown.is_triggered() => {
                        tracing::debug!(error = %e, "Accept failed during shutdown");
                        break Ok(());
                    }
                    Err(e) => break Err(ServeError::Accept(e)),
                },
            }
        };

        // Stop accepting, then drain: the listener closes here; forwarders
        // and the prober finish on their own deadlines.
        drop(listener);
        drop(task_guard);
        let _ = tasks_done.recv().await;

        tracing::info!("Balancer stopped");
        let _ = self.stopped_tx.send(true);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config_on(bind_address: &str) -> BalancerConfig {
        let mut config = BalancerConfig::default();
        config.listener.bind_address = bind_address.to_string();
        config
    }

    #[tokio::test]
    async fn run_stops_when_handle_shuts_down() {
        let balancer = Balancer::new(config_on("127.0.0.1:0"));
        let handle = balancer.handle();

        let run = tokio::spawn(balancer.run());
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.shutdown().await;
        let result = tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .expect("run did not stop")
            .unwrap();
        assert!(result.is_ok());

        // A second shutdown returns immediately.
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn run_fails_fast_on_occupied_port() {
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = occupied.local_addr().unwrap().to_string();

        let balancer = Balancer::new(config_on(&addr));
        assert!(matches!(balancer.run().await, Err(ServeError::Bind(_))));
    }
}
