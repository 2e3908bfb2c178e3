//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, task spawning)
//!     → net::forwarder (relay)
//!     → message.rs (framing for both the client and backend streams)
//! ```

pub mod message;
pub mod server;

pub use message::{read_message, ReadError};
pub use server::{Balancer, BalancerHandle, ServeError};
