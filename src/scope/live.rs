use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app::{Result, ScopeError};
use crate::lifecycle::{LifecycleEvent, LifecycleScopeProvider};

/// Runs a task for every stretch of a lifecycle between `up` and its
/// corresponding event.
///
/// A screen that resumes and pauses repeatedly gets a fresh task on every
/// resume and has it cancelled on every pause. The loop stops at the
/// terminal event, or when the `LiveScope` is stopped or dropped.
pub struct LiveScope {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl LiveScope {
    /// Start watching `provider`. If its lifecycle is already at `up`, the
    /// first task starts right away.
    pub fn start<P, F, Fut>(provider: Arc<P>, up: P::Event, mut task: F) -> Result<Self>
    where
        P: LifecycleScopeProvider,
        F: FnMut(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let down = provider.corresponding_events().end_for(up)?;
        let runtime = Handle::try_current()
            .map_err(|e| ScopeError::Scheduler(format!("no tokio runtime for live scope: {}", e)))?;

        let stop = CancellationToken::new();
        let watch = provider.lifecycle().watch();
        drop(provider);

        let loop_stop = stop.clone();
        let spawner = runtime.clone();
        let handle = runtime.spawn(async move {
            let mut events = watch.events;
            let mut current: Option<CancellationToken> = None;
            let mut start_run = |current: &mut Option<CancellationToken>| {
                let token = loop_stop.child_token();
                let run_token = token.clone();
                let fut = task(token.clone());
                spawner.spawn(async move {
                    tokio::select! {
                        _ = run_token.cancelled() => {}
                        _ = fut => {}
                    }
                });
                *current = Some(token);
            };

            if watch.current == Some(up) {
                start_run(&mut current);
            }

            loop {
                let event = tokio::select! {
                    _ = loop_stop.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };

                if event == up && current.is_none() {
                    debug!("Live scope up at {:?}", event);
                    start_run(&mut current);
                } else if event == down || event.is_terminal() {
                    if let Some(token) = current.take() {
                        debug!("Live scope down at {:?}", event);
                        token.cancel();
                    }
                }

                if event.is_terminal() {
                    break;
                }
            }

            if let Some(token) = current.take() {
                token.cancel();
            }
            info!("Live scope finished");
        });

        Ok(Self { stop, handle })
    }

    /// Cancel the running task, if any, and stop watching.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for LiveScope {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
