//! HTTP/1.1 round-robin reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │                  BALANCER                     │
//!                    │                                               │
//!   Client ──────────┼─▶ net::listener ──▶ net::forwarder ──┐        │
//!                    │                        │             │        │
//!                    │                        ▼             ▼        │
//!                    │                 http::message   load_balancer ┼──▶ Origin
//!                    │                 (framing)       (round-robin) │    Servers
//!                    │                                      ▲        │
//!                    │                                      │        │
//!                    │                 health::prober ──────┘        │
//!                    │                 (liveness flags)              │
//!                    │                                               │
//!                    │   config ── lifecycle (shutdown, task drain)  │
//!                    └──────────────────────────────────────────────┘
//! ```
//!
//! The forwarder relays whole messages: one request from the client, one
//! response from the chosen origin, framed by `Content-Length` only. The
//! prober keeps the liveness flags current on its own schedule, and the
//! selector skips entries whose flag is off.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;

// Reference origin for end-to-end testing
pub mod origin;

pub use config::BalancerConfig;
pub use http::server::{Balancer, BalancerHandle};
pub use lifecycle::Shutdown;
pub use origin::{OriginHandle, OriginServer, RequestCounter};
