use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{CorrespondingEvents, LifecycleEvent, ScreenEvent, ViewEvent};
use crate::app::{Result, ScopeError};

struct SourceState<E> {
    current: Option<E>,
    subscribers: Vec<mpsc::UnboundedSender<E>>,
}

/// Append-only event sequence for one host-component instance.
///
/// Cloning yields another handle to the same sequence.
pub struct LifecycleSource<E: LifecycleEvent> {
    state: Arc<Mutex<SourceState<E>>>,
}

impl<E: LifecycleEvent> Clone for LifecycleSource<E> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<E: LifecycleEvent> Default for LifecycleSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: LifecycleEvent> LifecycleSource<E> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SourceState {
                current: None,
                subscribers: Vec::new(),
            })),
        }
    }

    /// A source that has already observed `initial`.
    pub fn starting_at(initial: E) -> Self {
        let source = Self::new();
        source.state.lock().current = Some(initial);
        source
    }

    /// Append an event and deliver it to every live subscriber.
    ///
    /// Nothing may follow the terminal event; such emissions are rejected.
    pub fn emit(&self, event: E) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(current) = state.current.filter(|c| c.is_terminal()) {
            warn!("Dropping lifecycle event {:?} emitted after {:?}", event, current);
            return Err(ScopeError::ended(current));
        }

        state.current = Some(event);
        state.subscribers.retain(|tx| tx.send(event).is_ok());
        debug!(
            "Lifecycle event {:?} delivered to {} subscribers",
            event,
            state.subscribers.len()
        );
        Ok(())
    }

    /// Most recently emitted event, if any.
    pub fn current(&self) -> Option<E> {
        self.state.lock().current
    }

    /// Sample the current event and subscribe to everything after it, as one
    /// step. No event can slip in between the two.
    pub fn watch(&self) -> LifecycleWatch<E> {
        let mut state = self.state.lock();
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.push(tx);
        LifecycleWatch {
            current: state.current,
            events: LifecycleEvents { rx },
        }
    }

    /// Events emitted after this call.
    pub fn subscribe(&self) -> LifecycleEvents<E> {
        self.watch().events
    }

    /// Number of subscribers still listening.
    pub fn subscriber_count(&self) -> usize {
        self.state
            .lock()
            .subscribers
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }
}

/// Result of [`LifecycleSource::watch`].
pub struct LifecycleWatch<E> {
    pub current: Option<E>,
    pub events: LifecycleEvents<E>,
}

/// Stream of lifecycle events. Ends once every source handle is dropped.
pub struct LifecycleEvents<E> {
    rx: mpsc::UnboundedReceiver<E>,
}

impl<E> LifecycleEvents<E> {
    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }
}

impl<E> Stream for LifecycleEvents<E> {
    type Item = E;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        self.rx.poll_recv(cx)
    }
}

/// Anything that owns a lifecycle and knows how bindings map onto it.
pub trait LifecycleScopeProvider: Send + Sync + 'static {
    type Event: LifecycleEvent;

    fn lifecycle(&self) -> &LifecycleSource<Self::Event>;

    fn corresponding_events(&self) -> &CorrespondingEvents<Self::Event>;

    fn peek_lifecycle(&self) -> Option<Self::Event> {
        self.lifecycle().current()
    }
}

/// Ready-made provider: a lifecycle source plus its event table.
pub struct LifecycleHost<E: LifecycleEvent> {
    source: LifecycleSource<E>,
    events: CorrespondingEvents<E>,
}

impl<E: LifecycleEvent> LifecycleHost<E> {
    pub fn new(events: CorrespondingEvents<E>) -> Self {
        Self {
            source: LifecycleSource::new(),
            events,
        }
    }

    pub fn starting_at(events: CorrespondingEvents<E>, initial: E) -> Self {
        Self {
            source: LifecycleSource::starting_at(initial),
            events,
        }
    }

    pub fn emit(&self, event: E) -> Result<()> {
        self.source.emit(event)
    }
}

impl LifecycleHost<ScreenEvent> {
    /// A screen that has not been created yet.
    pub fn screen() -> Self {
        Self::new(ScreenEvent::corresponding_events().clone())
    }
}

impl LifecycleHost<ViewEvent> {
    /// A sub-view; these exist from construction, so they start at `Create`.
    pub fn view() -> Self {
        Self::starting_at(ViewEvent::corresponding_events().clone(), ViewEvent::Create)
    }
}

impl<E: LifecycleEvent> LifecycleScopeProvider for LifecycleHost<E> {
    type Event = E;

    fn lifecycle(&self) -> &LifecycleSource<E> {
        &self.source
    }

    fn corresponding_events(&self) -> &CorrespondingEvents<E> {
        &self.events
    }
}
