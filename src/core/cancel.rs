//! Cooperative cancellation.
//!
//! A [`CancellationToken`] is a shared flag that a canceller sets and the
//! running unit of work polls (or sleeps on). Cancellation is never
//! preemptive: work that ignores its token simply runs to completion.
//!
//! Tokens form a tree. A machine hands each state it activates a child of
//! its own token, so canceling the machine cancels whatever runs beneath it.

use std::future::Future;
use std::pin::pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

/// Shared cancellation flag with a blocking, cancellable sleep.
///
/// Clones share the same flag. A token is never un-canceled; a fresh
/// invocation gets a fresh token.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use waypoint::core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let canceller = token.clone();
///
/// let sleeper = std::thread::spawn(move || token.wait_timeout(Duration::from_secs(30)));
/// canceller.cancel();
///
/// // The sleep ends early and reports the cancellation.
/// assert!(sleeper.join().unwrap());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    inner: tokio_util::sync::CancellationToken,
}

/// Unparks the sleeping thread when the token's future is woken.
struct Unpark(Thread);

impl Wake for Unpark {
    fn wake(self: Arc<Self>) {
        self.0.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.0.unpark();
    }
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token canceled whenever this one is. Canceling the child leaves
    /// this token untouched.
    pub fn child(&self) -> Self {
        Self {
            inner: self.inner.child_token(),
        }
    }

    /// Request cancellation and wake every sleeper. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Sleep for up to `timeout`, returning early on cancellation.
    /// A timeout too large to represent sleeps until canceled.
    ///
    /// Returns `true` if the token was canceled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let waker = Waker::from(Arc::new(Unpark(thread::current())));
        let mut cx = Context::from_waker(&waker);
        let mut canceled = pin!(self.inner.cancelled());

        loop {
            if let Poll::Ready(()) = canceled.as_mut().poll(&mut cx) {
                return true;
            }
            match deadline {
                None => thread::park(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    thread::park_timeout(deadline - now);
                }
            }
        }
    }
}
