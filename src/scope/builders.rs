//! Binders returned by [`Scope`]: one per consumer shape.
//!
//! A binder either wraps an existing consumer (`around`), collects callbacks
//! one at a time and then `create`s, or binds a consumer that only exists to
//! release resources (`empty`).

use std::sync::Arc;

use parking_lot::Mutex;

use super::binding::{CallbackResult, Callbacks};
use super::observers::{
    completable_callbacks, maybe_callbacks, observer_callbacks, single_callbacks,
    BoundCompletable, BoundMaybe, BoundObserver, BoundSingle, CompletableObserver, MaybeObserver,
    Observer, SingleObserver,
};
use super::Scope;

pub struct ObserverBinder<T> {
    scope: Scope,
    callbacks: Callbacks<T>,
}

impl<T: Send + 'static> ObserverBinder<T> {
    pub(crate) fn new(scope: Scope) -> Self {
        Self {
            scope,
            callbacks: Callbacks::new(),
        }
    }

    pub fn on_next<F>(mut self, f: F) -> Self
    where
        F: FnMut(T) -> CallbackResult + Send + 'static,
    {
        self.callbacks = self.callbacks.value(f);
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&anyhow::Error) -> CallbackResult + Send + 'static,
    {
        self.callbacks = self.callbacks.error(f);
        self
    }

    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.callbacks = self.callbacks.complete(f);
        self
    }

    pub fn create(self) -> BoundObserver<T> {
        BoundObserver::new(self.scope.core(self.callbacks))
    }

    pub fn around<O: Observer<T>>(self, observer: O) -> BoundObserver<T> {
        BoundObserver::new(self.scope.core(observer_callbacks(observer)))
    }

    /// Values only. Errors go to the scope's sink.
    pub fn around_fn<F>(self, on_next: F) -> BoundObserver<T>
    where
        F: FnMut(T) -> CallbackResult + Send + 'static,
    {
        self.on_next(on_next).create()
    }

    /// Values only. Errors go to the sink labelled with `tag`.
    pub fn around_tagged<F>(mut self, tag: impl Into<String>, on_next: F) -> BoundObserver<T>
    where
        F: FnMut(T) -> CallbackResult + Send + 'static,
    {
        self.callbacks = self.callbacks.tagged(tag);
        self.around_fn(on_next)
    }

    /// Ignore everything; the binding still cancels upstream when the scope ends.
    pub fn empty(self) -> BoundObserver<T> {
        BoundObserver::new(self.scope.core(Callbacks::new()))
    }
}

pub struct SingleBinder<T> {
    scope: Scope,
    callbacks: Callbacks<T>,
}

impl<T: Send + 'static> SingleBinder<T> {
    pub(crate) fn new(scope: Scope) -> Self {
        Self {
            scope,
            callbacks: Callbacks::new(),
        }
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnMut(T) -> CallbackResult + Send + 'static,
    {
        self.callbacks = self.callbacks.value(f);
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&anyhow::Error) -> CallbackResult + Send + 'static,
    {
        self.callbacks = self.callbacks.error(f);
        self
    }

    pub fn create(self) -> BoundSingle<T> {
        BoundSingle::new(self.scope.core(self.callbacks))
    }

    pub fn around<O: SingleObserver<T>>(self, observer: O) -> BoundSingle<T> {
        BoundSingle::new(self.scope.core(single_callbacks(observer)))
    }

    pub fn around_fn<F>(self, on_success: F) -> BoundSingle<T>
    where
        F: FnMut(T) -> CallbackResult + Send + 'static,
    {
        self.on_success(on_success).create()
    }

    /// One callback for both outcomes.
    pub fn around_result<F>(self, f: F) -> BoundSingle<T>
    where
        F: FnMut(Result<T, &anyhow::Error>) -> CallbackResult + Send + 'static,
    {
        let shared = Arc::new(Mutex::new(f));
        let on_error = shared.clone();
        self.on_success(move |v| (*shared.lock())(Ok(v)))
            .on_error(move |e| (*on_error.lock())(Err(e)))
            .create()
    }

    pub fn around_tagged<F>(mut self, tag: impl Into<String>, on_success: F) -> BoundSingle<T>
    where
        F: FnMut(T) -> CallbackResult + Send + 'static,
    {
        self.callbacks = self.callbacks.tagged(tag);
        self.around_fn(on_success)
    }

    pub fn empty(self) -> BoundSingle<T> {
        BoundSingle::new(self.scope.core(Callbacks::new()))
    }
}

pub struct MaybeBinder<T> {
    scope: Scope,
    callbacks: Callbacks<T>,
}

impl<T: Send + 'static> MaybeBinder<T> {
    pub(crate) fn new(scope: Scope) -> Self {
        Self {
            scope,
            callbacks: Callbacks::new(),
        }
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnMut(T) -> CallbackResult + Send + 'static,
    {
        self.callbacks = self.callbacks.value(f);
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&anyhow::Error) -> CallbackResult + Send + 'static,
    {
        self.callbacks = self.callbacks.error(f);
        self
    }

    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.callbacks = self.callbacks.complete(f);
        self
    }

    pub fn create(self) -> BoundMaybe<T> {
        BoundMaybe::new(self.scope.core(self.callbacks))
    }

    pub fn around<O: MaybeObserver<T>>(self, observer: O) -> BoundMaybe<T> {
        BoundMaybe::new(self.scope.core(maybe_callbacks(observer)))
    }

    pub fn around_fn<F>(self, on_success: F) -> BoundMaybe<T>
    where
        F: FnMut(T) -> CallbackResult + Send + 'static,
    {
        self.on_success(on_success).create()
    }

    pub fn around_tagged<F>(mut self, tag: impl Into<String>, on_success: F) -> BoundMaybe<T>
    where
        F: FnMut(T) -> CallbackResult + Send + 'static,
    {
        self.callbacks = self.callbacks.tagged(tag);
        self.around_fn(on_success)
    }

    pub fn empty(self) -> BoundMaybe<T> {
        BoundMaybe::new(self.scope.core(Callbacks::new()))
    }
}

pub struct CompletableBinder {
    scope: Scope,
    callbacks: Callbacks<()>,
}

impl CompletableBinder {
    pub(crate) fn new(scope: Scope) -> Self {
        Self {
            scope,
            callbacks: Callbacks::new(),
        }
    }

    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.callbacks = self.callbacks.complete(f);
        self
    }

    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&anyhow::Error) -> CallbackResult + Send + 'static,
    {
        self.callbacks = self.callbacks.error(f);
        self
    }

    pub fn create(self) -> BoundCompletable {
        BoundCompletable::new(self.scope.core(self.callbacks))
    }

    pub fn around<O: CompletableObserver>(self, observer: O) -> BoundCompletable {
        BoundCompletable::new(self.scope.core(completable_callbacks(observer)))
    }

    pub fn around_fn<F>(self, on_complete: F) -> BoundCompletable
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.on_complete(on_complete).create()
    }

    pub fn around_tagged<F>(mut self, tag: impl Into<String>, on_complete: F) -> BoundCompletable
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.callbacks = self.callbacks.tagged(tag);
        self.around_fn(on_complete)
    }

    pub fn empty(self) -> BoundCompletable {
        BoundCompletable::new(self.scope.core(Callbacks::new()))
    }
}
