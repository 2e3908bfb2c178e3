//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal triggered → Stop accepting → Drain spawned tasks → Exit
//! ```
//!
//! # Design Decisions
//! - The signal is a one-shot broadcast; triggering twice is a no-op
//! - Forwarder tasks are not pre-empted; they drain on their own read
//!   deadlines, which bounds shutdown latency

pub mod shutdown;

pub use shutdown::Shutdown;
