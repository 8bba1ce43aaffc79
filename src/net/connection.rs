//! In-flight request tracking for connection introspection.
//!
//! # Responsibilities
//! - Count requests currently being handled by one listener
//! - Release the count even if the handler future is dropped mid-flight

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tracks requests in flight on a single server.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    active_count: Arc<AtomicU64>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new in-flight request. Returns a guard that decrements on drop.
    pub fn track(&self) -> RequestGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        RequestGuard {
            active_count: Arc::clone(&self.active_count),
        }
    }

    /// Get current in-flight request count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Guard that tracks one request's lifetime.
#[derive(Debug)]
pub struct RequestGuard {
    active_count: Arc<AtomicU64>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
    }
}
