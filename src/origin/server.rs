//! Reference origin server.
//!
//! # Responsibilities
//! - Serve a fixed route table over HTTP/1.1 with keep-alive
//! - Expose a request counter hook for end-to-end assertions
//!
//! # Design Decisions
//! - Connections stay open across requests until the client closes or the
//!   read deadline expires
//! - Mirrors the balancer's lifecycle discipline (bind, accept loop,
//!   graceful shutdown with task drain), since the integration suite runs
//!   real instances of it

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

use crate::http::message::{read_message, request_path};
use crate::lifecycle::Shutdown;

const READ_DEADLINE: Duration = Duration::from_secs(5);

const ROOT_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Length: 27\r\n\r\nHello From Backend Server\r\n";
const HEALTH_RESPONSE: &[u8] = b"HTTP/1.1 204 No Content\r\n\r\n";
const NOT_FOUND_RESPONSE: &[u8] = b"HTTP/1.1 404 Not Found\r\n\r\n";

/// Counts requests served by an origin. Tests install real counters; the
/// default implementation discards every increment.
pub trait RequestCounter: Send + Sync {
    fn increment(&self);
}

/// Counter that discards every increment.
pub struct NullCounter;

impl RequestCounter for NullCounter {
    fn increment(&self) {}
}

/// A minimal HTTP/1.1 responder with a fixed route table.
pub struct OriginServer {
    bind_address: String,
    counter: Arc<dyn RequestCounter>,
    shutdown: Shutdown,
    stopped_tx: watch::Sender<bool>,
    stopped_rx: watch::Receiver<bool>,
}

/// Cloneable handle for stopping a running origin from another task.
#[derive(Clone)]
pub struct OriginHandle {
    shutdown: Shutdown,
    stopped: watch::Receiver<bool>,
}

impl OriginHandle {
    /// Trigger shutdown and wait until the origin has drained every
    /// connection task. Idempotent; safe to call from any task.
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

impl OriginServer {
    /// Origin without request counting.
    pub fn new(bind_address: impl Into<String>) -> Self {
        Self::with_counter(bind_address, Arc::new(NullCounter))
    }

    /// Origin with a request counter installed.
    pub fn with_counter(
        bind_address: impl Into<String>,
        counter: Arc<dyn RequestCounter>,
    ) -> Self {
        let (stopped_tx, stopped_rx) = watch::channel(false);

        Self {
            bind_address: bind_address.into(),
            counter,
            shutdown: Shutdown::new(),
            stopped_tx,
            stopped_rx,
        }
    }

    /// Handle for triggering shutdown from other tasks.
    pub fn handle(&self) -> OriginHandle {
        OriginHandle {
            shutdown: self.shutdown.clone(),
            stopped: self.stopped_rx.clone(),
        }
    }

    /// Bind and serve until shutdown. Bind and accept failures outside of
    /// shutdown are fatal.
    pub async fn run(self) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(&self.bind_address).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!(address = %local_addr, "Origin listening");

        let (task_guard, mut tasks_done) = mpsc::channel::<()>(1);
        let mut shutdown_rx = self.shutdown.subscribe();

        let result = loop {
            if self.shutdown.is_triggered() {
                break Ok(());
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break Ok(()),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let counter = self.counter.clone();
                        let guard = task_guard.clone();
                        tokio::spawn(async move {
                            serve_connection(stream, peer, counter).await;
                            drop(guard);
                        });
                    }
                    Err(e) if self.shutdown.is_triggered() => {
                        tracing::debug!(error = %e, "Accept failed during shutdown");
                        break Ok(());
                    }
                    Err(e) => break Err(e),
                },
            }
        };

        drop(listener);
        drop(task_guard);
        let _ = tasks_done.recv().await;

        tracing::info!(address = %local_addr, "Origin stopped");
        let _ = self.stopped_tx.send(true);
        result
    }
}

/// Serve one client connection until it closes or times out.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    counter: Arc<dyn RequestCounter>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let request = match read_message(&mut reader, READ_DEADLINE).await {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(peer = %peer, error = %e, "Origin connection done");
                return;
            }
        };
        counter.increment();

        let response = route(request_path(&request).unwrap_or(""));
        if write_half.write_all(response).await.is_err() {
            return;
        }
    }
}

/// The fixed route table.
fn route(path: &str) -> &'static [u8] {
    match path {
        "/" => ROOT_RESPONSE,
        "/health" => HEALTH_RESPONSE,
        _ => NOT_FOUND_RESPONSE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCounter(AtomicUsize);

    impl RequestCounter for CountingCounter {
        fn increment(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn routes_the_fixed_table() {
        assert_eq!(route("/"), ROOT_RESPONSE);
        assert_eq!(route("/health"), HEALTH_RESPONSE);
        assert_eq!(route("/anything-else"), NOT_FOUND_RESPONSE);
        assert_eq!(route(""), NOT_FOUND_RESPONSE);
    }

    #[tokio::test]
    async fn serves_and_counts_requests_over_one_connection() {
        let counter = Arc::new(CountingCounter(AtomicUsize::new(0)));
        let origin = OriginServer::with_counter("127.0.0.1:18051", counter.clone());
        let handle = origin.handle();
        tokio::spawn(origin.run());

        // Wait for the listener to come up.
        let stream = loop {
            match TcpStream::connect("127.0.0.1:18051").await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        };

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_half
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let response = read_message(&mut reader, READ_DEADLINE).await.unwrap();
        assert_eq!(response, ROOT_RESPONSE);

        write_half
            .write_all(b"GET /health HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let response = read_message(&mut reader, READ_DEADLINE).await.unwrap();
        assert_eq!(response, HEALTH_RESPONSE);

        write_half
            .write_all(b"GET /nope HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let response = read_message(&mut reader, READ_DEADLINE).await.unwrap();
        assert_eq!(response, NOT_FOUND_RESPONSE);

        assert_eq!(counter.0.load(Ordering::SeqCst), 3);

        drop(write_half);
        drop(reader);
        handle.shutdown().await;
    }
}
