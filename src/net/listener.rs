//! Client-facing TCP accept path.
//!
//! # Responsibilities
//! - Bind the balancer's listen endpoint
//! - Hand out accepted client sockets together with an RAII slot guard
//! - Cap concurrent clients at `max_connections`

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

/// The balancer's listen socket plus its pool of client slots.
#[derive(Debug)]
pub struct Listener {
    socket: TcpListener,
    slots: Arc<Semaphore>,
}

impl Listener {
    /// Bind the configured endpoint.
    pub async fn bind(config: &ListenerConfig) -> io::Result<Self> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        Ok(Self {
            socket: TcpListener::bind(addr).await?,
            slots: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Wait for a free client slot, then accept one connection.
    ///
    /// Waiting before the accept keeps a saturated balancer from pulling
    /// sockets off the backlog it has no capacity to serve. The returned
    /// slot must stay alive for the connection's lifetime.
    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr, ClientSlot)> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .expect("client slot pool closed");

        let (stream, peer) = self.socket.accept().await?;
        Ok((stream, peer, ClientSlot { _permit: slot }))
    }

    /// The address the socket is actually bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// Holds one unit of the listener's client capacity.
///
/// Dropping the slot returns the capacity, so the cap holds even when a
/// connection task ends early.
#[derive(Debug)]
pub struct ClientSlot {
    _permit: OwnedSemaphorePermit,
}
