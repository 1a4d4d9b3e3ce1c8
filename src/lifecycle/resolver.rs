use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{self, BoxFuture, FutureExt};
use futures::ready;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{CorrespondingEvents, LifecycleEvent, LifecycleScopeProvider, LifecycleSource, LifecycleWatch};
use crate::app::{Result, ScopeError};

type ArmFn = Box<dyn FnOnce() -> Result<ArmedSignal> + Send>;

/// One-shot "this scope has ended" signal.
///
/// Nothing is evaluated until the signal is armed, either explicitly with
/// [`arm`](Self::arm) or implicitly by the first poll. Arming samples the
/// lifecycle and fails at once when the scope cannot be resolved at all.
/// Awaiting resolves to `Ok(())` when the scope ends.
pub struct TerminalSignal {
    state: SignalState,
}

enum SignalState {
    Unarmed(ArmFn),
    Armed(ArmedSignal),
    Spent,
}

impl TerminalSignal {
    /// A signal whose `arm` step runs `arm` exactly once.
    pub fn new<F>(arm: F) -> Self
    where
        F: FnOnce() -> Result<ArmedSignal> + Send + 'static,
    {
        Self {
            state: SignalState::Unarmed(Box::new(arm)),
        }
    }

    pub fn from_future<F>(fut: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self::new(move || Ok(ArmedSignal::new(fut)))
    }

    /// A scope that never ends on its own.
    pub fn never() -> Self {
        Self::from_future(future::pending())
    }

    /// Ends when `token` is cancelled.
    pub fn from_token(token: CancellationToken) -> Self {
        Self::from_future(async move {
            token.cancelled_owned().await;
            Ok(())
        })
    }

    /// Ends at the first event emitted after the signal is armed, whatever
    /// that event is.
    pub fn next_event<E: LifecycleEvent>(source: LifecycleSource<E>) -> Self {
        Self::new(move || {
            let mut events = source.subscribe();
            Ok(ArmedSignal::new(async move {
                match events.recv().await {
                    Some(_) => Ok(()),
                    None => future::pending().await,
                }
            }))
        })
    }

    /// Sample the lifecycle now and return the wait for its end.
    pub fn arm(self) -> Result<ArmedSignal> {
        match self.state {
            SignalState::Unarmed(arm) => arm(),
            SignalState::Armed(armed) => Ok(armed),
            SignalState::Spent => Ok(ArmedSignal::new(future::pending())),
        }
    }
}

impl Future for TerminalSignal {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        if let SignalState::Unarmed(_) = self.state {
            let SignalState::Unarmed(arm) = std::mem::replace(&mut self.state, SignalState::Spent) else {
                return Poll::Pending;
            };
            match arm() {
                Ok(armed) => self.state = SignalState::Armed(armed),
                Err(err) => return Poll::Ready(Err(err)),
            }
        }

        match &mut self.state {
            SignalState::Armed(armed) => {
                let out = ready!(Pin::new(armed).poll(cx));
                self.state = SignalState::Spent;
                Poll::Ready(out)
            }
            _ => Poll::Pending,
        }
    }
}

impl fmt::Debug for TerminalSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            SignalState::Unarmed(_) => "unarmed",
            SignalState::Armed(_) => "armed",
            SignalState::Spent => "spent",
        };
        f.debug_tuple("TerminalSignal").field(&state).finish()
    }
}

/// A [`TerminalSignal`] that has already sampled its lifecycle.
pub struct ArmedSignal {
    inner: BoxFuture<'static, Result<()>>,
}

impl ArmedSignal {
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self { inner: fut.boxed() }
    }
}

impl Future for ArmedSignal {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for ArmedSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ArmedSignal")
    }
}

/// Resolve the end of a binding made "now" against `source`.
///
/// "Now" is the moment the returned signal is armed, not the moment this
/// function is called.
pub fn resolve_end_signal<E: LifecycleEvent>(
    source: LifecycleSource<E>,
    events: CorrespondingEvents<E>,
) -> TerminalSignal {
    TerminalSignal::new(move || arm_end(source.watch(), &events))
}

/// [`resolve_end_signal`] using the provider's own source and table.
pub fn resolve_provider<P: LifecycleScopeProvider>(provider: Arc<P>) -> TerminalSignal {
    TerminalSignal::new(move || arm_end(provider.lifecycle().watch(), provider.corresponding_events()))
}

fn arm_end<E: LifecycleEvent>(
    watch: LifecycleWatch<E>,
    events: &CorrespondingEvents<E>,
) -> Result<ArmedSignal> {
    let current = watch.current.ok_or(ScopeError::LifecycleNotStarted)?;
    let end = events.end_for(current)?;
    debug!("Scope bound at {:?} ends at {:?}", current, end);

    let mut later = watch.events;
    Ok(ArmedSignal::new(async move {
        while let Some(event) = later.recv().await {
            if event == end {
                debug!("Scope end event {:?} reached", end);
                return Ok(());
            }
        }
        // Every producer is gone, so the end event can no longer arrive
        future::pending().await
    }))
}
