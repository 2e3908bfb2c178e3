//! Round-robin selection over the backend registry.
//!
//! # Algorithm
//! Advance a shared cursor and return the entry it lands on, skipping
//! entries whose liveness flag is off. A full sweep of dead entries means
//! every origin is down.
//!
//! # Design Decisions
//! - Cursor advancement is a single atomic add, no locks; concurrent
//!   selections consume distinct cursor positions
//! - Work per call is bounded by the registry size
//! - Entry order is fixed at startup

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::BackendConfig;
use crate::load_balancer::backend::Backend;

/// Error type for selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectError {
    /// Every configured backend is marked down, or none are configured.
    AllDown,
}

impl std::fmt::Display for SelectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectError::AllDown => write!(f, "all backends are down"),
        }
    }
}

impl std::error::Error for SelectError {}

/// Ordered backend set with a shared round-robin cursor.
#[derive(Debug)]
pub struct Registry {
    /// Configured entries, in registration order.
    backends: Vec<Arc<Backend>>,
    /// Monotonically advancing selection cursor.
    cursor: AtomicUsize,
}

impl Registry {
    /// Build the registry from configuration, preserving order.
    pub fn new(configs: &[BackendConfig]) -> Self {
        let backends = configs
            .iter()
            .map(|config| Arc::new(Backend::new(config.address.clone())))
            .collect();

        Self {
            backends,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Advance the cursor and return the next live entry.
    ///
    /// Dead entries are skipped; after a full sweep without finding a live
    /// one the call fails with [`SelectError::AllDown`].
    pub fn next_live(&self) -> Result<Arc<Backend>, SelectError> {
        if self.backends.is_empty() {
            return Err(SelectError::AllDown);
        }

        for _ in 0..self.backends.len() {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.backends.len();
            let backend = &self.backends[index];
            if backend.is_live() {
                return Ok(backend.clone());
            }
        }

        Err(SelectError::AllDown)
    }

    /// Number of configured entries.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// All entries in registration order, for the prober.
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }
}
