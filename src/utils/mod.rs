pub mod metrics;
pub mod validation;

use crate::error::{RecommenderError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation shared between a controller and its workers.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(RecommenderError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// `value` with `digits` decimals, trailing zeros kept.
pub fn format_score(value: f64, digits: usize) -> String {
    format!("{:.*}", digits, value)
}
