//! Rate normalizer: spaces a bursty stream out to at most one value per window.
//!
//! A value arriving while the stream is idle goes straight through. Values
//! arriving faster than the window are queued and released one per window
//! in arrival order. Completion or an error waits behind queued values.
//! Dropping the stream discards whatever is still queued.
//!
//! This is not backpressure: the queue is unbounded.

mod scheduler;

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tracing::debug;

pub use scheduler::{Scheduler, Timer, TokioScheduler};

use crate::app::ScopeError;
use tokio::time::Instant;

// Values pulled into the queue by one poll before yielding to the runtime
const PULL_BUDGET: usize = 32;

enum Held<E> {
    Complete,
    Error(E),
}

/// Stream returned by [`NormalizeExt::normalize`].
pub struct Normalize<S, T, E, Sch = TokioScheduler> {
    upstream: Option<Pin<Box<S>>>,
    window: Duration,
    scheduler: Sch,
    next_allowed: Option<Instant>,
    queue: VecDeque<T>,
    drain: Option<Timer>,
    drain_at: Option<Instant>,
    held: Option<Held<E>>,
    done: bool,
}

// Nothing is pinned structurally; the upstream lives in its own box.
impl<S, T, E, Sch> Unpin for Normalize<S, T, E, Sch> {}

impl<S, T, E, Sch> Normalize<S, T, E, Sch>
where
    S: Stream<Item = Result<T, E>>,
    E: From<ScopeError>,
    Sch: Scheduler,
{
    pub fn new(stream: S, window: Duration, scheduler: Sch) -> Self {
        Self {
            upstream: Some(Box::pin(stream)),
            window,
            scheduler,
            next_allowed: None,
            queue: VecDeque::new(),
            drain: None,
            drain_at: None,
            held: None,
            done: false,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Values waiting for their slot.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    fn arm(&mut self, deadline: Instant) -> Result<(), ScopeError> {
        self.drain = Some(self.scheduler.timer(deadline)?);
        self.drain_at = Some(deadline);
        Ok(())
    }

    fn drain_due(&mut self, cx: &mut Context<'_>) -> bool {
        let Some(drain) = self.drain.as_mut() else {
            return false;
        };
        let fired = drain.as_mut().poll(cx).is_ready()
            || self.drain_at.is_some_and(|at| self.scheduler.now() >= at);
        if fired {
            self.drain = None;
            self.drain_at = None;
        }
        fired
    }

    fn fail(&mut self, err: ScopeError) -> Poll<Option<Result<T, E>>> {
        debug!("Normalizer stopping with {} queued values: {}", self.queue.len(), err);
        self.done = true;
        self.queue.clear();
        self.drain = None;
        self.drain_at = None;
        self.upstream = None;
        Poll::Ready(Some(Err(E::from(err))))
    }
}

impl<S, T, E, Sch> Stream for Normalize<S, T, E, Sch>
where
    S: Stream<Item = Result<T, E>>,
    E: From<ScopeError>,
    Sch: Scheduler,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let mut pulled = 0;

        loop {
            if this.done {
                return Poll::Ready(None);
            }

            if this.drain_due(cx) {
                if let Some(value) = this.queue.pop_front() {
                    let now = this.scheduler.now();
                    this.next_allowed = Some(now + this.window);
                    if !this.queue.is_empty() {
                        if let Err(err) = this.arm(now + this.window) {
                            return this.fail(err);
                        }
                    }
                    return Poll::Ready(Some(Ok(value)));
                }
            }

            if this.drain.is_none() && this.queue.is_empty() {
                if let Some(held) = this.held.take() {
                    this.done = true;
                    return match held {
                        Held::Complete => Poll::Ready(None),
                        Held::Error(err) => Poll::Ready(Some(Err(err))),
                    };
                }
            }

            let Some(upstream) = this.upstream.as_mut() else {
                return Poll::Pending;
            };

            match upstream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(value))) => {
                    let now = this.scheduler.now();
                    let allowed = this.next_allowed.map_or(true, |at| now >= at);
                    if this.queue.is_empty() && this.drain.is_none() && allowed {
                        this.next_allowed = Some(now + this.window);
                        return Poll::Ready(Some(Ok(value)));
                    }

                    this.queue.push_back(value);
                    if this.drain.is_none() {
                        let deadline = this.next_allowed.map_or(now, |at| at.max(now));
                        if let Err(err) = this.arm(deadline) {
                            return this.fail(err);
                        }
                    }
                    pulled += 1;
                    if pulled >= PULL_BUDGET {
                        // An always-ready upstream must not starve the drain timer
                        cx.waker().wake_by_ref();
                        return Poll::Pending;
                    }
                }
                Poll::Ready(Some(Err(err))) => {
                    this.upstream = None;
                    if !this.queue.is_empty() {
                        debug!("Holding upstream error behind {} queued values", this.queue.len());
                    }
                    this.held = Some(Held::Error(err));
                }
                Poll::Ready(None) => {
                    this.upstream = None;
                    this.held = Some(Held::Complete);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

pub trait NormalizeExt<T, E>: Stream<Item = Result<T, E>> + Sized {
    /// Emit at most one value per `window`, on the tokio clock.
    fn normalize(self, window: Duration) -> Normalize<Self, T, E>
    where
        E: From<ScopeError>,
    {
        Normalize::new(self, window, TokioScheduler)
    }

    fn normalize_with<Sch>(self, window: Duration, scheduler: Sch) -> Normalize<Self, T, E, Sch>
    where
        E: From<ScopeError>,
        Sch: Scheduler,
    {
        Normalize::new(self, window, scheduler)
    }
}

impl<S, T, E> NormalizeExt<T, E> for S where S: Stream<Item = Result<T, E>> {}
