//! Stress tests for the breaker middleware
//!
//! ## What We Test
//!
//! - **High volume**: Millions of calls through one breaker
//! - **High concurrency**: Thousands of concurrent callers sharing a breaker
//! - **State consistency**: Counts and transitions stay coherent under load
//! - **Thrashing**: Rapid open/half-open/closed cycling


use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Utility: Track peak concurrent operations
pub struct ConcurrencyTracker {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn enter(&self) {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}
