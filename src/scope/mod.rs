//! Scope-bound consumers.
//!
//! A [`Scope`] hands out a fresh [`TerminalSignal`] for every binding made
//! through it. A bound consumer stops observing and cancels its upstream the
//! moment the upstream finishes or the signal fires, whichever comes first.
//!
//! ```ignore
//! let scope = Scope::for_provider(screen.clone());
//! scope
//!     .observer::<Article>()
//!     .on_next(|a| render(a))
//!     .on_error(|e| show_error(e))
//!     .create()
//!     .subscribe(feed.articles());
//! ```

mod binding;
mod builders;
mod live;
mod observers;
mod slot;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::Stream;
use tokio_util::sync::CancellationToken;

pub use binding::{Binding, CallbackResult, Callbacks};
pub use builders::{CompletableBinder, MaybeBinder, ObserverBinder, SingleBinder};
pub use live::LiveScope;
pub use observers::{
    BoundCompletable, BoundMaybe, BoundObserver, BoundSingle, CompletableObserver, MaybeObserver,
    Observer, SingleObserver,
};
pub use slot::{Cancellable, HandleSlot};

use crate::app::ErrorSink;
use crate::lifecycle::{
    resolve_end_signal, resolve_provider, CorrespondingEvents, LifecycleEvent,
    LifecycleScopeProvider, LifecycleSource, TerminalSignal,
};
use binding::BindingCore;

type SignalFactory = Arc<dyn Fn() -> TerminalSignal + Send + Sync>;

/// Factory for bindings that share one notion of "the end".
#[derive(Clone)]
pub struct Scope {
    signals: SignalFactory,
    sink: ErrorSink,
}

impl Scope {
    /// Build from any signal factory. It is called once per binding.
    pub fn from_fn<F>(signals: F) -> Self
    where
        F: Fn() -> TerminalSignal + Send + Sync + 'static,
    {
        Self {
            signals: Arc::new(signals),
            sink: ErrorSink::default(),
        }
    }

    /// Bindings end at the event corresponding to the provider's lifecycle
    /// at the moment each binding starts.
    pub fn for_provider<P: LifecycleScopeProvider>(provider: Arc<P>) -> Self {
        Self::from_fn(move || resolve_provider(provider.clone()))
    }

    pub fn for_lifecycle<E: LifecycleEvent>(
        source: LifecycleSource<E>,
        events: CorrespondingEvents<E>,
    ) -> Self {
        Self::from_fn(move || resolve_end_signal(source.clone(), events.clone()))
    }

    /// Bindings end at the next lifecycle event of any kind.
    pub fn for_events<E: LifecycleEvent>(source: LifecycleSource<E>) -> Self {
        Self::from_fn(move || TerminalSignal::next_event(source.clone()))
    }

    pub fn for_token(token: CancellationToken) -> Self {
        Self::from_fn(move || TerminalSignal::from_token(token.clone()))
    }

    /// Route errors no consumer can take to `sink` instead of the global one.
    pub fn with_sink(mut self, sink: ErrorSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn sink(&self) -> &ErrorSink {
        &self.sink
    }

    /// A fresh end signal, as a new binding would get.
    pub fn signal(&self) -> TerminalSignal {
        (self.signals)()
    }

    pub fn observer<T: Send + 'static>(&self) -> ObserverBinder<T> {
        ObserverBinder::new(self.clone())
    }

    pub fn single<T: Send + 'static>(&self) -> SingleBinder<T> {
        SingleBinder::new(self.clone())
    }

    pub fn maybe<T: Send + 'static>(&self) -> MaybeBinder<T> {
        MaybeBinder::new(self.clone())
    }

    pub fn completable(&self) -> CompletableBinder {
        CompletableBinder::new(self.clone())
    }

    pub(crate) fn core<T: Send + 'static>(&self, callbacks: Callbacks<T>) -> Arc<BindingCore<T>> {
        BindingCore::new(self.signal(), callbacks, self.sink.clone())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("sink", &self.sink).finish()
    }
}

/// Bind `observer` to `stream` for the provider's current lifecycle stage.
pub fn bind_stream<P, T, S, E, O>(provider: Arc<P>, stream: S, observer: O) -> Binding
where
    P: LifecycleScopeProvider,
    T: Send + 'static,
    S: Stream<Item = Result<T, E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
    O: Observer<T>,
{
    Scope::for_provider(provider)
        .observer()
        .around(observer)
        .subscribe(stream)
}

pub fn bind_single<P, T, F, E, O>(provider: Arc<P>, fut: F, observer: O) -> Binding
where
    P: LifecycleScopeProvider,
    T: Send + 'static,
    F: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
    O: SingleObserver<T>,
{
    Scope::for_provider(provider)
        .single()
        .around(observer)
        .subscribe(fut)
}

pub fn bind_maybe<P, T, F, E, O>(provider: Arc<P>, fut: F, observer: O) -> Binding
where
    P: LifecycleScopeProvider,
    T: Send + 'static,
    F: Future<Output = Result<Option<T>, E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
    O: MaybeObserver<T>,
{
    Scope::for_provider(provider)
        .maybe()
        .around(observer)
        .subscribe(fut)
}

pub fn bind_completable<P, F, E, O>(provider: Arc<P>, fut: F, observer: O) -> Binding
where
    P: LifecycleScopeProvider,
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
    O: CompletableObserver,
{
    Scope::for_provider(provider)
        .completable()
        .around(observer)
        .subscribe(fut)
}
