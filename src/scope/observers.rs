//! Consumer traits and the bound consumers built from them.
//!
//! Each shape is a thin façade over the same binding core; only the set of
//! callbacks differs.

use std::future::Future;
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;

use super::binding::{
    drive_completable, drive_maybe, drive_single, drive_stream, subscribe_with, Binding,
    BindingCore, CallbackResult, Callbacks,
};
use super::slot::Cancellable;

/// Consumer of a stream of values.
pub trait Observer<T>: Send + 'static {
    /// Called once, before anything else, with the binding that now owns
    /// this consumer.
    fn on_subscribe(&mut self, _binding: &Binding) {}

    fn on_next(&mut self, value: T) -> CallbackResult;

    fn on_error(&mut self, error: &anyhow::Error) -> CallbackResult;

    fn on_complete(&mut self) -> CallbackResult {
        Ok(())
    }
}

/// Consumer of exactly one value or an error.
pub trait SingleObserver<T>: Send + 'static {
    fn on_subscribe(&mut self, _binding: &Binding) {}
    fn on_success(&mut self, value: T) -> CallbackResult;

    fn on_error(&mut self, error: &anyhow::Error) -> CallbackResult;
}

/// Consumer of at most one value.
pub trait MaybeObserver<T>: Send + 'static {
    fn on_subscribe(&mut self, _binding: &Binding) {}
    fn on_success(&mut self, value: T) -> CallbackResult;

    fn on_error(&mut self, error: &anyhow::Error) -> CallbackResult;

    /// Called when the source finishes without a value.
    fn on_complete(&mut self) -> CallbackResult {
        Ok(())
    }
}

/// Consumer that only cares whether the work finished.
pub trait CompletableObserver: Send + 'static {
    fn on_subscribe(&mut self, _binding: &Binding) {}
    fn on_complete(&mut self) -> CallbackResult;

    fn on_error(&mut self, error: &anyhow::Error) -> CallbackResult;
}

pub(crate) fn observer_callbacks<T: Send + 'static, O: Observer<T>>(observer: O) -> Callbacks<T> {
    let shared = Arc::new(Mutex::new(observer));
    let (subscribed, on_error, on_complete) = (shared.clone(), shared.clone(), shared.clone());
    Callbacks::new()
        .subscribed(move |b| subscribed.lock().on_subscribe(b))
        .value(move |v| shared.lock().on_next(v))
        .error(move |e| on_error.lock().on_error(e))
        .complete(move || on_complete.lock().on_complete())
}

pub(crate) fn single_callbacks<T: Send + 'static, O: SingleObserver<T>>(observer: O) -> Callbacks<T> {
    let shared = Arc::new(Mutex::new(observer));
    let (subscribed, on_error) = (shared.clone(), shared.clone());
    Callbacks::new()
        .subscribed(move |b| subscribed.lock().on_subscribe(b))
        .value(move |v| shared.lock().on_success(v))
        .error(move |e| on_error.lock().on_error(e))
}

pub(crate) fn maybe_callbacks<T: Send + 'static, O: MaybeObserver<T>>(observer: O) -> Callbacks<T> {
    let shared = Arc::new(Mutex::new(observer));
    let (subscribed, on_error, on_complete) = (shared.clone(), shared.clone(), shared.clone());
    Callbacks::new()
        .subscribed(move |b| subscribed.lock().on_subscribe(b))
        .value(move |v| shared.lock().on_success(v))
        .error(move |e| on_error.lock().on_error(e))
        .complete(move || on_complete.lock().on_complete())
}

pub(crate) fn completable_callbacks<O: CompletableObserver>(observer: O) -> Callbacks<()> {
    let shared = Arc::new(Mutex::new(observer));
    let (subscribed, on_error) = (shared.clone(), shared.clone());
    Callbacks::new()
        .subscribed(move |b| subscribed.lock().on_subscribe(b))
        .complete(move || shared.lock().on_complete())
        .error(move |e| on_error.lock().on_error(e))
}

/// A stream consumer bound to a scope.
///
/// Either hand it a stream with [`subscribe`](Self::subscribe), or drive it
/// yourself through the `on_*` methods after calling
/// [`on_subscribe`](Self::on_subscribe) with the producer's cancel handle.
pub struct BoundObserver<T> {
    core: Arc<BindingCore<T>>,
}

impl<T: Send + 'static> BoundObserver<T> {
    pub(crate) fn new(core: Arc<BindingCore<T>>) -> Self {
        Self { core }
    }

    pub fn subscribe<S, E>(self, stream: S) -> Binding
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let drive = drive_stream(self.core.clone(), stream);
        subscribe_with(self.core, drive)
    }

    pub fn on_subscribe(&self, handle: impl Cancellable + 'static) -> bool {
        self.core.on_subscribe(Box::new(handle))
    }

    pub fn on_next(&self, value: T) {
        self.core.next(value);
    }

    pub fn on_error(&self, error: impl Into<anyhow::Error>) {
        self.core.error(error.into());
    }

    pub fn on_complete(&self) {
        self.core.complete();
    }

    pub fn binding(&self) -> Binding {
        Binding::new(self.core.clone())
    }
}

pub struct BoundSingle<T> {
    core: Arc<BindingCore<T>>,
}

impl<T: Send + 'static> BoundSingle<T> {
    pub(crate) fn new(core: Arc<BindingCore<T>>) -> Self {
        Self { core }
    }

    pub fn subscribe<F, E>(self, fut: F) -> Binding
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let drive = drive_single(self.core.clone(), fut);
        subscribe_with(self.core, drive)
    }

    pub fn on_subscribe(&self, handle: impl Cancellable + 'static) -> bool {
        self.core.on_subscribe(Box::new(handle))
    }

    pub fn on_success(&self, value: T) {
        self.core.success(value);
    }

    pub fn on_error(&self, error: impl Into<anyhow::Error>) {
        self.core.error(error.into());
    }

    pub fn binding(&self) -> Binding {
        Binding::new(self.core.clone())
    }
}

pub struct BoundMaybe<T> {
    core: Arc<BindingCore<T>>,
}

impl<T: Send + 'static> BoundMaybe<T> {
    pub(crate) fn new(core: Arc<BindingCore<T>>) -> Self {
        Self { core }
    }

    /// Bind to a source resolving to `Ok(None)` when there is no value.
    pub fn subscribe<F, E>(self, fut: F) -> Binding
    where
        F: Future<Output = Result<Option<T>, E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let drive = drive_maybe(self.core.clone(), fut);
        subscribe_with(self.core, drive)
    }

    pub fn on_subscribe(&self, handle: impl Cancellable + 'static) -> bool {
        self.core.on_subscribe(Box::new(handle))
    }

    pub fn on_success(&self, value: T) {
        self.core.success(value);
    }

    pub fn on_error(&self, error: impl Into<anyhow::Error>) {
        self.core.error(error.into());
    }

    pub fn on_complete(&self) {
        self.core.complete();
    }

    pub fn binding(&self) -> Binding {
        Binding::new(self.core.clone())
    }
}

pub struct BoundCompletable {
    core: Arc<BindingCore<()>>,
}

impl BoundCompletable {
    pub(crate) fn new(core: Arc<BindingCore<()>>) -> Self {
        Self { core }
    }

    pub fn subscribe<F, E>(self, fut: F) -> Binding
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let drive = drive_completable(self.core.clone(), fut);
        subscribe_with(self.core, drive)
    }

    pub fn on_subscribe(&self, handle: impl Cancellable + 'static) -> bool {
        self.core.on_subscribe(Box::new(handle))
    }

    pub fn on_complete(&self) {
        self.core.complete();
    }

    pub fn on_error(&self, error: impl Into<anyhow::Error>) {
        self.core.error(error.into());
    }

    pub fn binding(&self) -> Binding {
        Binding::new(self.core.clone())
    }
}
