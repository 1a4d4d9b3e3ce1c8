use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::future::{AbortHandle, Abortable};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, error};

use super::slot::{Cancellable, HandleSlot};
use crate::app::{ErrorSink, ScopeError};
use crate::lifecycle::TerminalSignal;

pub type CallbackResult = anyhow::Result<()>;

type ValueFn<T> = Box<dyn FnMut(T) -> CallbackResult + Send>;
type ErrorFn = Box<dyn FnMut(&anyhow::Error) -> CallbackResult + Send>;
type CompleteFn = Box<dyn FnMut() -> CallbackResult + Send>;
type SubscribeFn = Box<dyn FnOnce(&Binding) + Send>;

/// The capabilities a consumer may supply. Every shape of bound consumer is
/// one of these with some fields left empty.
pub struct Callbacks<T> {
    on_value: Option<ValueFn<T>>,
    on_error: Option<ErrorFn>,
    on_complete: Option<CompleteFn>,
    on_subscribe: Option<SubscribeFn>,
    error_tag: Option<String>,
}

impl<T> Callbacks<T> {
    pub fn new() -> Self {
        Self {
            on_value: None,
            on_error: None,
            on_complete: None,
            on_subscribe: None,
            error_tag: None,
        }
    }

    pub fn value<F>(mut self, f: F) -> Self
    where
        F: FnMut(T) -> CallbackResult + Send + 'static,
    {
        self.on_value = Some(Box::new(f));
        self
    }

    pub fn error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&anyhow::Error) -> CallbackResult + Send + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn complete<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> CallbackResult + Send + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Called once with the binding when the consumer is subscribed.
    pub fn subscribed<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&Binding) + Send + 'static,
    {
        self.on_subscribe = Some(Box::new(f));
        self
    }

    /// Errors with no handler reach the sink labelled with `tag`.
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.error_tag = Some(tag.into());
        self
    }

    fn call_value(&mut self, value: T) -> CallbackResult {
        match self.on_value.as_mut() {
            Some(f) => f(value),
            None => Ok(()),
        }
    }
}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self::new()
    }
}

const LIVE: u8 = 0;
// Disposed with nothing left to deliver
const DISPOSED_SILENT: u8 = 1;
// Disposed by a caller that still has to deliver a terminal event
const DISPOSED_TERMINAL: u8 = 2;

/// Shared state behind every bound consumer.
pub(crate) struct BindingCore<T> {
    upstream: HandleSlot,
    lifecycle: HandleSlot,
    state: AtomicU8,
    signal: Mutex<Option<TerminalSignal>>,
    callbacks: Mutex<Option<Callbacks<T>>>,
    sink: ErrorSink,
}

impl<T: Send + 'static> BindingCore<T> {
    pub(crate) fn new(signal: TerminalSignal, callbacks: Callbacks<T>, sink: ErrorSink) -> Arc<Self> {
        Arc::new(Self {
            upstream: HandleSlot::new(),
            lifecycle: HandleSlot::new(),
            state: AtomicU8::new(LIVE),
            signal: Mutex::new(Some(signal)),
            callbacks: Mutex::new(Some(callbacks)),
            sink,
        })
    }

    /// Record the upstream handle, hand the consumer its binding, then arm
    /// the terminal signal.
    ///
    /// The lifecycle is sampled here, before this returns, so an event the
    /// host emits right after binding is judged against the right stage.
    /// Returns false if a handle was already recorded or the binding is
    /// already disposed; in both cases `handle` has been cancelled.
    pub(crate) fn on_subscribe(self: &Arc<Self>, handle: Box<dyn Cancellable>) -> bool {
        if !self.upstream.set_once(handle) {
            return false;
        }
        let subscribed = self.callbacks.lock().as_mut().and_then(|c| c.on_subscribe.take());
        self.release_if_silent();
        if let Some(subscribed) = subscribed {
            subscribed(&Binding::new(self.clone()));
        }
        self.watch_lifecycle();
        true
    }

    fn watch_lifecycle(self: &Arc<Self>) {
        let Some(signal) = self.signal.lock().take() else {
            return;
        };
        let armed = match signal.arm() {
            Ok(armed) => armed,
            Err(err) => return self.signal_failed(err),
        };

        let (abort, registration) = AbortHandle::new_pair();
        if !self.lifecycle.set_once(Box::new(abort)) {
            return;
        }

        let core = Arc::clone(self);
        let watch = Abortable::new(
            async move {
                match armed.await {
                    Ok(()) => {
                        if core.dispose_with(DISPOSED_SILENT) {
                            debug!("Scope ended; binding disposed");
                        }
                    }
                    Err(err) => core.signal_failed(err),
                }
            },
            registration,
        );

        if let Err(err) = spawn(watch) {
            self.error(err.into());
        }
    }

    fn signal_failed(&self, err: ScopeError) {
        if err.is_usage_error() {
            error!("Lifecycle misuse while binding: {}", err);
        }
        self.error(err.into());
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) != LIVE
    }

    /// Dispose both handles. Only the first call has any effect.
    pub(crate) fn dispose(&self) -> bool {
        self.dispose_with(DISPOSED_SILENT)
    }

    fn dispose_with(&self, kind: u8) -> bool {
        if self
            .state
            .compare_exchange(LIVE, kind, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.lifecycle.dispose();
        self.upstream.dispose();
        self.signal.lock().take();

        if kind == DISPOSED_SILENT {
            // A delivery in progress holds the lock and releases the consumer itself
            if let Some(mut callbacks) = self.callbacks.try_lock() {
                callbacks.take();
            }
        }
        true
    }

    pub(crate) fn next(&self, value: T) {
        if self.is_disposed() {
            return;
        }

        let mut guard = self.callbacks.lock();
        // Re-checked under the lock: a terminal signal that got here first wins
        let result = match guard.as_mut() {
            Some(callbacks) if !self.is_disposed() => callbacks.call_value(value),
            _ => Ok(()),
        };
        drop(guard);
        self.release_if_silent();

        if let Err(err) = result {
            self.error(err);
        }
    }

    // A silent dispose that met a held callbacks lock leaves the consumer to
    // whoever held it. Every holder calls this after letting go.
    fn release_if_silent(&self) {
        if self.state.load(Ordering::Acquire) == DISPOSED_SILENT {
            self.callbacks.lock().take();
        }
    }

    /// Deliver the one value of a single/optional source, ending the binding.
    pub(crate) fn success(&self, value: T) {
        let Some(mut callbacks) = self.claim_terminal() else {
            return;
        };
        if let Err(err) = callbacks.call_value(value) {
            self.deliver_error(&mut callbacks, err);
        }
    }

    pub(crate) fn error(&self, err: anyhow::Error) {
        match self.claim_terminal() {
            Some(mut callbacks) => self.deliver_error(&mut callbacks, err),
            None => {
                debug!("Error after binding was disposed: {:#}", err);
                self.sink.report(err);
            }
        }
    }

    pub(crate) fn complete(&self) {
        let Some(mut callbacks) = self.claim_terminal() else {
            return;
        };
        if let Some(on_complete) = callbacks.on_complete.as_mut() {
            if let Err(err) = on_complete() {
                self.sink.report(err);
            }
        }
    }

    fn claim_terminal(&self) -> Option<Callbacks<T>> {
        if !self.dispose_with(DISPOSED_TERMINAL) {
            return None;
        }
        self.callbacks.lock().take()
    }

    fn deliver_error(&self, callbacks: &mut Callbacks<T>, err: anyhow::Error) {
        match callbacks.on_error.as_mut() {
            Some(on_error) => {
                if let Err(handler) = on_error(&err) {
                    self.sink.report(
                        ScopeError::Composite {
                            original: err,
                            handler,
                        }
                        .into(),
                    );
                }
            }
            None => match callbacks.error_tag.take() {
                Some(tag) => self.sink.report(ScopeError::Unhandled { tag, source: err }.into()),
                None => self.sink.report(err),
            },
        }
    }
}

fn spawn<F>(fut: F) -> Result<(), ScopeError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handle = Handle::try_current()
        .map_err(|e| ScopeError::Scheduler(format!("no tokio runtime to run binding: {}", e)))?;
    handle.spawn(fut);
    Ok(())
}

/// Start `core` against a source driven by `drive`, under an abortable
/// upstream handle.
pub(crate) fn subscribe_with<T, F>(core: Arc<BindingCore<T>>, drive: F) -> Binding
where
    T: Send + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let binding = Binding::new(core.clone());
    let (abort, registration) = AbortHandle::new_pair();
    if !core.on_subscribe(Box::new(abort)) {
        return binding;
    }
    if let Err(err) = spawn(Abortable::new(drive, registration)) {
        core.error(err.into());
    }
    binding
}

pub(crate) async fn drive_stream<T, S, E>(core: Arc<BindingCore<T>>, stream: S)
where
    T: Send + 'static,
    S: Stream<Item = Result<T, E>>,
    E: Into<anyhow::Error>,
{
    let mut stream = std::pin::pin!(stream);
    while let Some(item) = stream.next().await {
        if core.is_disposed() {
            return;
        }
        match item {
            Ok(value) => core.next(value),
            Err(err) => {
                core.error(err.into());
                return;
            }
        }
    }
    core.complete();
}

pub(crate) async fn drive_single<T, F, E>(core: Arc<BindingCore<T>>, fut: F)
where
    T: Send + 'static,
    F: Future<Output = Result<T, E>>,
    E: Into<anyhow::Error>,
{
    match fut.await {
        Ok(value) => core.success(value),
        Err(err) => core.error(err.into()),
    }
}

pub(crate) async fn drive_maybe<T, F, E>(core: Arc<BindingCore<T>>, fut: F)
where
    T: Send + 'static,
    F: Future<Output = Result<Option<T>, E>>,
    E: Into<anyhow::Error>,
{
    match fut.await {
        Ok(Some(value)) => core.success(value),
        Ok(None) => core.complete(),
        Err(err) => core.error(err.into()),
    }
}

pub(crate) async fn drive_completable<F, E>(core: Arc<BindingCore<()>>, fut: F)
where
    F: Future<Output = Result<(), E>>,
    E: Into<anyhow::Error>,
{
    match fut.await {
        Ok(()) => core.complete(),
        Err(err) => core.error(err.into()),
    }
}

trait Dispose: Send + Sync {
    fn dispose(&self) -> bool;
    fn is_disposed(&self) -> bool;
}

impl<T: Send + 'static> Dispose for BindingCore<T> {
    fn dispose(&self) -> bool {
        BindingCore::dispose(self)
    }

    fn is_disposed(&self) -> bool {
        BindingCore::is_disposed(self)
    }
}

/// Handle to a live binding. Clones share the binding.
#[derive(Clone)]
pub struct Binding {
    core: Arc<dyn Dispose>,
}

impl Binding {
    pub(crate) fn new<T: Send + 'static>(core: Arc<BindingCore<T>>) -> Self {
        Self { core }
    }

    /// Stop observing and cancel the upstream and lifecycle handles. Safe to
    /// call any number of times from anywhere; returns true only for the
    /// call that actually disposed.
    pub fn dispose(&self) -> bool {
        self.core.dispose()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{drain, recording, Seen};
    use super::*;
    use crate::app::uncaught::testing::RecordingSink;
    use crate::lifecycle::{resolve_provider, LifecycleHost, LifecycleScopeProvider, ScreenEvent};
    use crate::scope::slot::testing::CountingHandle;
    use anyhow::anyhow;
    use proptest::prelude::*;
    use std::sync::Barrier;
    use std::thread;
    use tokio_util::sync::CancellationToken;

    async fn until(mut done: impl FnMut() -> bool) {
        while !done() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_stream_values_then_completion() {
        let (callbacks, mut rx) = recording();
        let core = BindingCore::new(TerminalSignal::never(), callbacks, ErrorSink::default());
        let stream = futures::stream::iter(vec![Ok::<_, anyhow::Error>(1), Ok(2)]);
        let binding = subscribe_with(core.clone(), drive_stream(core, stream));

        assert_eq!(rx.recv().await, Some(Seen::Value(1)));
        assert_eq!(rx.recv().await, Some(Seen::Value(2)));
        assert_eq!(rx.recv().await, Some(Seen::Complete));
        // The consumer is released after its terminal event
        assert_eq!(rx.recv().await, None);
        assert!(binding.is_disposed());
    }

    #[tokio::test]
    async fn test_lifecycle_end_between_values() {
        let host = Arc::new(LifecycleHost::screen());
        host.emit(ScreenEvent::Create).unwrap();

        let (callbacks, mut rx) = recording();
        let core = BindingCore::new(resolve_provider(host.clone()), callbacks, ErrorSink::default());
        let (tx, stream) = futures::channel::mpsc::unbounded::<anyhow::Result<i32>>();
        let binding = subscribe_with(core.clone(), drive_stream(core.clone(), stream));

        tx.unbounded_send(Ok(1)).unwrap();
        assert_eq!(rx.recv().await, Some(Seen::Value(1)));

        host.emit(ScreenEvent::Destroy).unwrap();
        until(|| binding.is_disposed()).await;

        let _ = tx.unbounded_send(Ok(2));
        assert_eq!(rx.recv().await, None);
        assert!(core.upstream.is_disposed());
        assert!(core.lifecycle.is_disposed());
    }

    #[tokio::test]
    async fn test_end_event_right_after_bind_disposes_silently() {
        let host = Arc::new(LifecycleHost::screen());
        host.emit(ScreenEvent::Create).unwrap();

        let (callbacks, mut rx) = recording::<i32>();
        let core = BindingCore::new(resolve_provider(host.clone()), callbacks, ErrorSink::default());
        let upstream = CountingHandle::default();
        assert!(core.on_subscribe(upstream.boxed()));

        // The whole lifecycle runs out before the watch task gets to run
        for event in [
            ScreenEvent::Start,
            ScreenEvent::Resume,
            ScreenEvent::Pause,
            ScreenEvent::Stop,
            ScreenEvent::Destroy,
        ] {
            host.emit(event).unwrap();
        }

        until(|| core.is_disposed()).await;
        assert_eq!(rx.recv().await, None);
        assert_eq!(upstream.count(), 1);
    }

    #[tokio::test]
    async fn test_resume_binding_ends_at_pause_emitted_right_after() {
        let host = Arc::new(LifecycleHost::screen());
        for event in [ScreenEvent::Create, ScreenEvent::Start, ScreenEvent::Resume] {
            host.emit(event).unwrap();
        }

        let (callbacks, mut rx) = recording::<i32>();
        let core = BindingCore::new(resolve_provider(host.clone()), callbacks, ErrorSink::default());
        let upstream = CountingHandle::default();
        assert!(core.on_subscribe(upstream.boxed()));
        host.emit(ScreenEvent::Pause).unwrap();

        until(|| core.is_disposed()).await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(upstream.count(), 1);
    }

    #[tokio::test]
    async fn test_lifecycle_not_started_reaches_error_path() {
        let host = Arc::new(LifecycleHost::screen());
        let (callbacks, mut rx) = recording::<i32>();
        let core = BindingCore::new(resolve_provider(host), callbacks, ErrorSink::default());
        let upstream = CountingHandle::default();
        assert!(core.on_subscribe(upstream.boxed()));

        match rx.recv().await {
            Some(Seen::Error(msg)) => assert!(msg.contains("not started"), "{}", msg),
            other => panic!("expected an error, got {:?}", other),
        }
        assert!(core.is_disposed());
        assert_eq!(upstream.count(), 1);
    }

    #[tokio::test]
    async fn test_no_delivery_after_dispose() {
        let (callbacks, mut rx) = recording();
        let core = BindingCore::new(TerminalSignal::never(), callbacks, ErrorSink::default());
        let upstream = CountingHandle::default();
        core.on_subscribe(upstream.boxed());

        core.next(1);
        let binding = Binding::new(core.clone());
        assert!(binding.dispose());
        assert!(!binding.dispose());
        core.next(2);
        core.complete();

        assert_eq!(drain(&mut rx), vec![Seen::Value(1)]);
        assert_eq!(upstream.count(), 1);
    }

    #[tokio::test]
    async fn test_subscribed_hook_gets_binding_before_values() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let on_value = tx.clone();
        let callbacks = Callbacks::new()
            .subscribed(move |binding: &Binding| {
                let _ = tx.send(format!("subscribed, disposed={}", binding.is_disposed()));
            })
            .value(move |v: i32| {
                let _ = on_value.send(format!("value {}", v));
                Ok(())
            });
        let core = BindingCore::new(TerminalSignal::never(), callbacks, ErrorSink::default());
        core.on_subscribe(CountingHandle::default().boxed());
        core.next(1);

        assert_eq!(rx.recv().await.as_deref(), Some("subscribed, disposed=false"));
        assert_eq!(rx.recv().await.as_deref(), Some("value 1"));
    }

    #[tokio::test]
    async fn test_dispose_inside_value_callback_releases_consumer() {
        let marker = Arc::new(());
        let released = Arc::downgrade(&marker);
        let slot = Arc::new(std::sync::OnceLock::<Binding>::new());
        let (set, get) = (slot.clone(), slot);
        let callbacks = Callbacks::new()
            .subscribed(move |binding: &Binding| {
                let _ = set.set(binding.clone());
            })
            .value(move |_: i32| {
                let _keep = &marker;
                if let Some(binding) = get.get() {
                    binding.dispose();
                }
                Ok(())
            });
        let core = BindingCore::new(TerminalSignal::never(), callbacks, ErrorSink::default());
        core.on_subscribe(CountingHandle::default().boxed());
        assert!(released.upgrade().is_some());

        core.next(1);
        assert!(core.is_disposed());
        assert!(released.upgrade().is_none());
    }

    #[test]
    fn test_dispose_racing_next_always_releases_consumer() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();

        for _ in 0..200 {
            let marker = Arc::new(());
            let released = Arc::downgrade(&marker);
            let callbacks = Callbacks::new().value(move |_: i32| {
                let _keep = &marker;
                Ok(())
            });
            let core = BindingCore::new(TerminalSignal::never(), callbacks, ErrorSink::default());
            core.on_subscribe(CountingHandle::default().boxed());

            let barrier = Arc::new(Barrier::new(2));
            let feeder = {
                let (core, barrier) = (core.clone(), barrier.clone());
                thread::spawn(move || {
                    barrier.wait();
                    for v in 0..50 {
                        core.next(v);
                    }
                })
            };
            barrier.wait();
            core.dispose();
            feeder.join().unwrap();

            assert!(released.upgrade().is_none());
        }
    }

    #[tokio::test]
    async fn test_second_subscribe_rejected() {
        let (callbacks, _rx) = recording::<i32>();
        let core = BindingCore::new(TerminalSignal::never(), callbacks, ErrorSink::default());
        let first = CountingHandle::default();
        let second = CountingHandle::default();
        assert!(core.on_subscribe(first.boxed()));
        assert!(!core.on_subscribe(second.boxed()));
        assert_eq!(second.count(), 1);

        core.dispose();
        assert_eq!(first.count(), 1);
    }

    #[tokio::test]
    async fn test_value_callback_error_becomes_upstream_error() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let callbacks = Callbacks::new()
            .value(|v: i32| if v > 1 { Err(anyhow!("too big: {}", v)) } else { Ok(()) })
            .error(move |e| {
                let _ = tx.send(e.to_string());
                Ok(())
            });
        let core = BindingCore::new(TerminalSignal::never(), callbacks, ErrorSink::default());
        let upstream = CountingHandle::default();
        core.on_subscribe(upstream.boxed());

        core.next(1);
        core.next(2);
        core.next(3);
        assert_eq!(rx.recv().await.as_deref(), Some("too big: 2"));
        assert_eq!(rx.recv().await, None);
        assert_eq!(upstream.count(), 1);
    }

    #[tokio::test]
    async fn test_failing_error_handler_reports_composite() {
        let recorder = RecordingSink::default();
        let callbacks = Callbacks::<i32>::new().error(|_| Err(anyhow!("handler broke")));
        let core = BindingCore::new(TerminalSignal::never(), callbacks, recorder.sink());
        core.on_subscribe(CountingHandle::default().boxed());

        core.error(anyhow!("upstream failed"));
        let errors = recorder.take();
        assert_eq!(errors.len(), 1);
        match errors[0].downcast_ref::<ScopeError>() {
            Some(ScopeError::Composite { original, handler }) => {
                assert_eq!(original.to_string(), "upstream failed");
                assert_eq!(handler.to_string(), "handler broke");
            }
            other => panic!("expected a composite error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_error_path_goes_to_sink() {
        let recorder = RecordingSink::default();
        let core = BindingCore::new(TerminalSignal::never(), Callbacks::<i32>::new(), recorder.sink());
        core.on_subscribe(CountingHandle::default().boxed());
        core.error(anyhow!("nobody listens"));
        assert_eq!(recorder.messages(), vec!["nobody listens"]);
    }

    #[tokio::test]
    async fn test_tagged_error_goes_to_sink_with_tag() {
        let recorder = RecordingSink::default();
        let callbacks = Callbacks::<i32>::new().tagged("refresh feed");
        let core = BindingCore::new(TerminalSignal::never(), callbacks, recorder.sink());
        core.on_subscribe(CountingHandle::default().boxed());
        core.error(anyhow!("timeout"));
        assert_eq!(recorder.messages(), vec!["Unhandled error in refresh feed: timeout"]);
    }

    #[tokio::test]
    async fn test_error_after_dispose_goes_to_sink() {
        let recorder = RecordingSink::default();
        let (callbacks, mut rx) = recording::<i32>();
        let core = BindingCore::new(TerminalSignal::never(), callbacks, recorder.sink());
        core.on_subscribe(CountingHandle::default().boxed());

        core.dispose();
        core.error(anyhow!("late"));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(recorder.messages(), vec!["late"]);
    }

    #[tokio::test]
    async fn test_single_value_ends_binding() {
        let (callbacks, mut rx) = recording();
        let core = BindingCore::new(TerminalSignal::never(), callbacks, ErrorSink::default());
        let binding = subscribe_with(core.clone(), drive_single(core, async { Ok::<_, anyhow::Error>(7) }));
        assert_eq!(rx.recv().await, Some(Seen::Value(7)));
        assert_eq!(rx.recv().await, None);
        assert!(binding.is_disposed());
    }

    #[tokio::test]
    async fn test_maybe_empty_completes() {
        let (callbacks, mut rx) = recording::<i32>();
        let core = BindingCore::new(TerminalSignal::never(), callbacks, ErrorSink::default());
        subscribe_with(core.clone(), drive_maybe(core, async { Ok::<_, anyhow::Error>(None) }));
        assert_eq!(rx.recv().await, Some(Seen::Complete));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_without_runtime_reports_scheduler_error() {
        let (callbacks, mut rx) = recording::<i32>();
        let core = BindingCore::new(TerminalSignal::never(), callbacks, ErrorSink::default());
        let upstream = CountingHandle::default();
        core.on_subscribe(upstream.boxed());

        match drain(&mut rx).as_slice() {
            [Seen::Error(msg)] => assert!(msg.starts_with("Scheduler error"), "{}", msg),
            other => panic!("expected one scheduler error, got {:?}", other),
        }
        assert_eq!(upstream.count(), 1);
    }

    #[derive(Debug, Clone, Copy)]
    enum Trigger {
        Complete,
        Error,
        Signal,
    }

    fn trigger() -> impl Strategy<Value = Trigger> {
        prop_oneof![Just(Trigger::Complete), Just(Trigger::Error), Just(Trigger::Signal)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_racing_triggers_dispose_exactly_once(triggers in proptest::collection::vec(trigger(), 1..6)) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            let guard = runtime.enter();

            let recorder = RecordingSink::default();
            let (callbacks, mut rx) = recording::<i32>();
            let token = CancellationToken::new();
            let core = BindingCore::new(TerminalSignal::from_token(token.clone()), callbacks, recorder.sink());
            let upstream = CountingHandle::default();
            core.on_subscribe(upstream.boxed());

            let barrier = Arc::new(Barrier::new(triggers.len()));
            let threads: Vec<_> = triggers
                .iter()
                .map(|&t| {
                    let (core, barrier, token) = (core.clone(), barrier.clone(), token.clone());
                    thread::spawn(move || {
                        barrier.wait();
                        match t {
                            Trigger::Complete => core.complete(),
                            Trigger::Error => core.error(anyhow!("upstream")),
                            Trigger::Signal => token.cancel(),
                        }
                    })
                })
                .collect();
            for t in threads {
                t.join().unwrap();
            }
            // The signal is delivered by the watch task on the runtime
            drop(guard);
            runtime.block_on(until(|| core.is_disposed()));

            prop_assert_eq!(upstream.count(), 1);
            prop_assert!(core.lifecycle.is_disposed());

            let seen = drain(&mut rx);
            prop_assert!(seen.len() <= 1);
            if !triggers.iter().any(|t| matches!(t, Trigger::Signal)) {
                prop_assert_eq!(seen.len(), 1);
            }
            let errors = triggers.iter().filter(|t| matches!(t, Trigger::Error)).count();
            let delivered = seen.iter().filter(|s| matches!(s, Seen::Error(_))).count();
            prop_assert_eq!(recorder.len(), errors - delivered);
        }
    }
}
