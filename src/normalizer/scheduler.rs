use std::future::Future;
use std::pin::Pin;

use tokio::runtime::Handle;
use tokio::time::Instant;

use crate::app::{Result, ScopeError};

/// A pending wake-up. Dropping it cancels the wake-up.
pub type Timer = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Clock plus timers for the normalizer.
pub trait Scheduler: Send + Sync {
    fn now(&self) -> Instant;

    /// A timer that fires at `deadline`, or at once if that has passed.
    fn timer(&self, deadline: Instant) -> Result<Timer>;
}

/// Scheduler on the ambient tokio runtime. Follows paused test time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn timer(&self, deadline: Instant) -> Result<Timer> {
        Handle::try_current()
            .map_err(|e| ScopeError::Scheduler(format!("cannot schedule drain: {}", e)))?;
        Ok(Box::pin(tokio::time::sleep_until(deadline)))
    }
}
