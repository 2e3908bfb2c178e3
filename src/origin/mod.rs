//! Reference origin subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → server.rs (accept loop, one task per connection)
//!     → http::message (read one request)
//!     → fixed route table → response bytes
//! ```
//!
//! The balancer's end-to-end tests run real instances of this server, so
//! it lives in the library rather than in the test tree.

pub mod server;

pub use server::{NullCounter, OriginHandle, OriginServer, RequestCounter};
