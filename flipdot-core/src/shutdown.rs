//! Shutdown signalling
//!
//! Both workers poll a shared [`Shutdown`] at their safe points: the receiver
//! after every receive (or receive timeout), the renderer after every pixel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation token
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    /// Create an untriggered token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown; every clone observes it
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::Release);
    }

    /// Check whether shutdown was requested
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }
}
