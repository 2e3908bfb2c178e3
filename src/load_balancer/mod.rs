//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarder needs a backend
//!     → registry.rs (advance shared cursor, skip dead entries)
//!     → backend.rs (per-entry liveness flag)
//!     → Return backend handle or AllDown
//! ```
//!
//! # Design Decisions
//! - Selection is strict round-robin over the live subset
//! - Liveness flags are independent atomics; the cursor is the only other
//!   shared mutable selection state
//! - Unhealthy backends stay excluded until a probe revives them

pub mod backend;
pub mod registry;

pub use backend::Backend;
pub use registry::{Registry, SelectError};
