use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Something that can be told to stop.
pub trait Cancellable: Send + Sync {
    fn cancel(&self);
}

impl Cancellable for futures::future::AbortHandle {
    fn cancel(&self) {
        self.abort();
    }
}

impl Cancellable for tokio::task::AbortHandle {
    fn cancel(&self) {
        self.abort();
    }
}

impl Cancellable for CancellationToken {
    fn cancel(&self) {
        CancellationToken::cancel(self);
    }
}

const EMPTY: u8 = 0;
const SET: u8 = 1;
const DISPOSED: u8 = 2;

/// Holds at most one handle and cancels it at most once.
///
/// State moves `EMPTY -> SET -> DISPOSED` or `EMPTY -> DISPOSED`. Whichever
/// side observes the other's transition owns the single `cancel` call.
pub struct HandleSlot {
    handle: OnceLock<Box<dyn Cancellable>>,
    state: AtomicU8,
}

impl HandleSlot {
    pub fn new() -> Self {
        Self {
            handle: OnceLock::new(),
            state: AtomicU8::new(EMPTY),
        }
    }

    /// Store `handle` unless one was stored before.
    ///
    /// Returns false when the slot was already set (the new handle is
    /// cancelled and a warning logged) or already disposed (the new handle is
    /// cancelled at once).
    pub fn set_once(&self, handle: Box<dyn Cancellable>) -> bool {
        if let Err(rejected) = self.handle.set(handle) {
            rejected.cancel();
            if self.state.load(Ordering::Acquire) != DISPOSED {
                warn!("Handle already set; cancelling the duplicate");
            }
            return false;
        }

        match self
            .state
            .compare_exchange(EMPTY, SET, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(_) => {
                // Disposed before the handle landed; dispose saw EMPTY and left it to us
                self.cancel_stored();
                false
            }
        }
    }

    /// Cancel the stored handle, or make sure a later one is cancelled on arrival.
    pub fn dispose(&self) {
        if self.state.swap(DISPOSED, Ordering::AcqRel) == SET {
            self.cancel_stored();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) == DISPOSED
    }

    pub fn is_set(&self) -> bool {
        self.handle.get().is_some()
    }

    fn cancel_stored(&self) {
        if let Some(handle) = self.handle.get() {
            handle.cancel();
        }
    }
}

impl Default for HandleSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.load(Ordering::Acquire) {
            EMPTY => "empty",
            SET => "set",
            _ => "disposed",
        };
        f.debug_struct("HandleSlot").field("state", &state).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::CountingHandle;
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn test_set_then_dispose() {
        let slot = HandleSlot::new();
        let handle = CountingHandle::default();
        assert!(slot.set_once(handle.boxed()));
        assert_eq!(handle.count(), 0);

        slot.dispose();
        slot.dispose();
        assert_eq!(handle.count(), 1);
        assert!(slot.is_disposed());
    }

    #[test]
    fn test_dispose_then_set_cancels_immediately() {
        let slot = HandleSlot::new();
        slot.dispose();

        let handle = CountingHandle::default();
        assert!(!slot.set_once(handle.boxed()));
        assert_eq!(handle.count(), 1);

        slot.dispose();
        assert_eq!(handle.count(), 1);
    }

    #[test]
    fn test_second_set_is_rejected() {
        let slot = HandleSlot::new();
        let first = CountingHandle::default();
        let second = CountingHandle::default();
        assert!(slot.set_once(first.boxed()));
        assert!(!slot.set_once(second.boxed()));
        assert_eq!(first.count(), 0);
        assert_eq!(second.count(), 1);

        slot.dispose();
        assert_eq!(first.count(), 1);
        assert_eq!(second.count(), 1);
    }

    #[test]
    fn test_racing_set_and_dispose_cancels_once() {
        for _ in 0..200 {
            let slot = Arc::new(HandleSlot::new());
            let handle = CountingHandle::default();
            let barrier = Arc::new(Barrier::new(3));

            let setter = {
                let (slot, handle, barrier) = (slot.clone(), handle.clone(), barrier.clone());
                thread::spawn(move || {
                    barrier.wait();
                    slot.set_once(handle.boxed());
                })
            };
            let disposers: Vec<_> = (0..2)
                .map(|_| {
                    let (slot, barrier) = (slot.clone(), barrier.clone());
                    thread::spawn(move || {
                        barrier.wait();
                        slot.dispose();
                    })
                })
                .collect();

            setter.join().unwrap();
            for d in disposers {
                d.join().unwrap();
            }
            assert_eq!(handle.count(), 1);
        }
    }

    #[test]
    fn test_token_handle() {
        let slot = HandleSlot::new();
        let token = CancellationToken::new();
        slot.set_once(Box::new(token.clone()));
        slot.dispose();
        assert!(token.is_cancelled());
    }
}
