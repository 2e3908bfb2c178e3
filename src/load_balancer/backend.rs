//! Backend entry abstraction.
//!
//! # Responsibilities
//! - Represent a single configured origin
//! - Track its liveness flag for selection

use std::sync::atomic::{AtomicBool, Ordering};

/// A single backend origin.
///
/// The address is immutable after construction. The liveness flag is
/// written by the prober and by forwarders on failure, and read by the
/// selector; no compound invariant spans multiple entries, so one relaxed
/// atomic per entry is enough.
#[derive(Debug)]
pub struct Backend {
    /// Dialable address of the origin (host:port).
    pub address: String,
    /// Whether the origin is currently believed healthy.
    live: AtomicBool,
}

impl Backend {
    /// Create a new backend entry, initially live. The first probe sweep
    /// or dial failure corrects an optimistic start.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            live: AtomicBool::new(true),
        }
    }

    /// Whether the origin is currently believed healthy.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Relaxed)
    }

    /// Mark the origin healthy.
    pub fn mark_live(&self) {
        self.live.store(true, Ordering::Relaxed);
    }

    /// Mark the origin unhealthy, excluding it from selection.
    pub fn mark_down(&self) {
        self.live.store(false, Ordering::Relaxed);
    }

    /// Set the flag from a probe outcome. Returns the previous value so
    /// callers can log transitions.
    pub fn set_live(&self, live: bool) -> bool {
        self.live.swap(live, Ordering::Relaxed)
    }
}
