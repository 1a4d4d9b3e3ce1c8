use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("Lifecycle has not started: no event has been emitted yet")]
    LifecycleNotStarted,

    #[error("Lifecycle has already ended (last event: {event})")]
    LifecycleEnded { event: String },

    #[error("Corresponding events table is incomplete: {missing}")]
    IncompleteCorrespondingEvents { missing: String },

    #[error("Error handler failed while handling an error: {original:#} (handler: {handler:#})")]
    Composite {
        original: anyhow::Error,
        handler: anyhow::Error,
    },

    #[error("Unhandled error in {tag}")]
    Unhandled {
        tag: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl ScopeError {
    pub(crate) fn ended<E: std::fmt::Debug>(event: E) -> Self {
        ScopeError::LifecycleEnded {
            event: format!("{:?}", event),
        }
    }

    /// True for the two binding-order mistakes: resolving before the first
    /// event, or after the terminal one.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            ScopeError::LifecycleNotStarted | ScopeError::LifecycleEnded { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ScopeError>;
