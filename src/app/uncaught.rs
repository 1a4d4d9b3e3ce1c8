//! Last-resort destination for errors no consumer is able to take.
//!
//! Every [`Scope`](crate::scope::Scope) carries an [`ErrorSink`]. The default
//! sink logs the error and hands it to the process-wide hook, if the host
//! application installed one with [`set_uncaught_hook`].

use std::fmt;
use std::sync::Arc;

use parking_lot::{const_rwlock, RwLock};
use tracing::error;

type Hook = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;

static UNCAUGHT_HOOK: RwLock<Option<Hook>> = const_rwlock(None);

/// Install the process-wide uncaught error hook, replacing any previous one.
pub fn set_uncaught_hook<F>(hook: F)
where
    F: Fn(&anyhow::Error) + Send + Sync + 'static,
{
    *UNCAUGHT_HOOK.write() = Some(Arc::new(hook));
}

/// Remove the process-wide hook. Errors are still logged.
pub fn clear_uncaught_hook() {
    *UNCAUGHT_HOOK.write() = None;
}

#[derive(Clone)]
pub struct ErrorSink {
    inner: Arc<dyn Fn(anyhow::Error) + Send + Sync>,
}

impl ErrorSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(anyhow::Error) + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Log the error, then forward it to the process-wide hook.
    pub fn global() -> Self {
        Self::new(|err| {
            error!("Uncaught error: {:#}", err);
            // Clone the hook out so it never runs under the lock
            let hook = UNCAUGHT_HOOK.read().clone();
            if let Some(hook) = hook {
                hook(&err);
            }
        })
    }

    pub fn report(&self, err: anyhow::Error) {
        (self.inner)(err);
    }
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorSink")
    }
}
