//! Per-connection request relay.
//!
//! # Responsibilities
//! - Serve one accepted client connection until it closes or misbehaves
//! - Select a backend, dial it, and relay request/response pairs
//! - Fail over to another backend while the request is still resendable
//!
//! # Design Decisions
//! - One backend connection persists across all requests of a client
//!   connection; failover re-dials within a bounded attempt budget
//! - A request that was already written to a backend is never resent;
//!   the client sees 502 instead
//! - Client-side read failures close the connection silently
//! - Requests are serialized: request, response, next request

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::{RetryConfig, TimeoutConfig};
use crate::http::message::{read_message, ReadError};
use crate::load_balancer::{Backend, Registry};

/// Response written when no backend can serve the client.
const BAD_GATEWAY: &[u8] = b"HTTP/1.1 502 Bad Gateway\r\n\r\n";

/// Relays HTTP messages between one client connection and a backend.
pub struct Forwarder {
    registry: Arc<Registry>,
    timeouts: TimeoutConfig,
    /// Remaining dial failures tolerated on this connection.
    attempts_left: u32,
}

/// The backend side of the relay.
struct Upstream {
    backend: Arc<Backend>,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Forwarder {
    /// Create a forwarder for one client connection.
    pub fn new(registry: Arc<Registry>, timeouts: TimeoutConfig, retries: RetryConfig) -> Self {
        Self {
            registry,
            timeouts,
            attempts_left: retries.max_attempts,
        }
    }

    /// Serve the accepted client socket.
    ///
    /// Failures never escape the task; every exit path releases both
    /// sockets by dropping them.
    pub async fn run(mut self, client: TcpStream, peer: SocketAddr) {
        let (client_read, mut client_write) = client.into_split();
        let mut client_reader = BufReader::new(client_read);

        // A backend connection that lives as long as the client's.
        let mut upstream = match self.select_and_connect().await {
            Some(upstream) => upstream,
            None => {
                let _ = client_write.write_all(BAD_GATEWAY).await;
                return;
            }
        };

        tracing::debug!(peer = %peer, backend = %upstream.backend.address, "Relay established");

        let read_deadline = Duration::from_secs(self.timeouts.read_secs);
        loop {
            // One request from the client. The client-side stream is
            // unrecoverable on failure, so there is no failover here.
            let request = match read_message(&mut client_reader, read_deadline).await {
                Ok(request) => request,
                Err(ReadError::ClosedByPeer) => {
                    tracing::debug!(peer = %peer, "Client closed connection");
                    return;
                }
                Err(e) => {
                    tracing::debug!(peer = %peer, error = %e, "Client read failed");
                    return;
                }
            };

            // Send with failover: a failed write never reached the backend
            // and is safe to redirect at a different origin.
            loop {
                if let Err(e) = upstream.writer.write_all(&request).await {
                    tracing::warn!(
                        backend = %upstream.backend.address,
                        error = %e,
                        "Backend write failed"
                    );
                    upstream.backend.mark_down();
                    upstream = match self.select_and_connect().await {
                        Some(next) => next,
                        None => {
                            let _ = client_write.write_all(BAD_GATEWAY).await;
                            return;
                        }
                    };
                    continue;
                }

                match read_message(&mut upstream.reader, read_deadline).await {
                    Ok(response) => {
                        if let Err(e) = client_write.write_all(&response).await {
                            tracing::debug!(peer = %peer, error = %e, "Client write failed");
                            return;
                        }
                        break;
                    }
                    Err(e) => {
                        // The request may have reached the backend and is
                        // not known to be idempotent, so no resend.
                        tracing::warn!(
                            backend = %upstream.backend.address,
                            error = %e,
                            "Backend read failed"
                        );
                        upstream.backend.mark_down();
                        let _ = client_write.write_all(BAD_GATEWAY).await;
                        return;
                    }
                }
            }
        }
    }

    /// Pick live backends and dial until one answers, the registry reports
    /// all down, or the attempt budget is spent.
    async fn select_and_connect(&mut self) -> Option<Upstream> {
        let connect_deadline = Duration::from_secs(self.timeouts.connect_secs);

        while self.attempts_left > 0 {
            let backend = match self.registry.next_live() {
                Ok(backend) => backend,
                Err(e) => {
                    tracing::warn!(error = %e, "No backend available");
                    return None;
                }
            };

            match timeout(connect_deadline, TcpStream::connect(&backend.address)).await {
                Ok(Ok(stream)) => {
                    let (read_half, writer) = stream.into_split();
                    return Some(Upstream {
                        backend,
                        reader: BufReader::new(read_half),
                        writer,
                    });
                }
                Ok(Err(e)) => {
                    tracing::warn!(backend = %backend.address, error = %e, "Backend dial failed");
                }
                Err(_) => {
                    tracing::warn!(backend = %backend.address, "Backend dial timed out");
                }
            }

            backend.mark_down();
            self.attempts_left -= 1;
        }

        tracing::warn!("Failover budget exhausted");
        None
    }
}
