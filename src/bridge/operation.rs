//! Per-call bookkeeping shared between the executing thread, the transport's
//! callback threads and whoever calls `cancel`.

use super::transport::{OperationResult, Transport};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// What the executing thread receives from the callbacks.
pub(crate) enum Event<F, O> {
    Feedback(F),
    Done(OperationResult<O>),
}

struct Slot<H> {
    handle: Option<H>,
    cancel_requested: bool,
    completed: bool,
}

/// One in-flight goal. Created by each `execute` call and never reused.
///
/// The handle and both flags live under one lock so that a cancellation
/// requested before the goal is accepted is forwarded by the acceptance
/// callback, and one requested afterwards is forwarded directly. Either way
/// the transport sees at most one cancel per goal.
pub(crate) struct Operation<T: Transport> {
    transport: Arc<T>,
    slot: Mutex<Slot<T::Handle>>,
}

impl<T: Transport> Operation<T> {
    pub(crate) fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            slot: Mutex::new(Slot {
                handle: None,
                cancel_requested: false,
                completed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T::Handle>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Request cancellation. Idempotent, and a no-op once the goal has
    /// completed.
    pub(crate) fn request_cancel(&self) {
        let handle = {
            let mut slot = self.lock();
            if slot.cancel_requested || slot.completed {
                return;
            }
            slot.cancel_requested = true;
            slot.handle.clone()
        };

        match handle {
            Some(handle) => {
                info!(endpoint = %self.transport.endpoint(), "canceling goal");
                self.transport.cancel(&handle);
            }
            None => debug!(
                endpoint = %self.transport.endpoint(),
                "goal not accepted yet, cancel deferred"
            ),
        }
    }

    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.lock().cancel_requested
    }

    fn record_handle(&self, handle: T::Handle) {
        let forward = {
            let mut slot = self.lock();
            if slot.handle.is_some() {
                warn!(endpoint = %self.transport.endpoint(), "goal accepted twice, ignoring");
                return;
            }
            slot.handle = Some(handle.clone());
            slot.cancel_requested && !slot.completed
        };

        if forward {
            info!(endpoint = %self.transport.endpoint(), "forwarding deferred cancel");
            self.transport.cancel(&handle);
        }
    }

    /// Mark the goal completed. Returns `true` for the first caller only.
    pub(crate) fn complete(&self) -> bool {
        let mut slot = self.lock();
        !std::mem::replace(&mut slot.completed, true)
    }

    fn is_completed(&self) -> bool {
        self.lock().completed
    }
}

struct Callbacks<T: Transport> {
    operation: Arc<Operation<T>>,
    events: Sender<Event<T::Feedback, T::Output>>,
}

impl<T: Transport> Callbacks<T> {
    fn finish(&self, result: OperationResult<T::Output>) -> bool {
        if !self.operation.complete() {
            return false;
        }
        // The receiver is gone only if execute already returned.
        let _ = self.events.send(Event::Done(result));
        true
    }
}

impl<T: Transport> Drop for Callbacks<T> {
    fn drop(&mut self) {
        if self.finish(OperationResult::aborted()) {
            warn!(
                endpoint = %self.operation.transport.endpoint(),
                "goal callbacks dropped without a result, aborting"
            );
        }
    }
}

/// Handed to [`Transport::submit`]; the transport reports the goal's
/// progress through it.
///
/// Cloning is cheap and every clone reports to the same goal, so a
/// transport can hand one clone to its feedback path and another to its
/// result path. Only the first terminal call counts.
pub struct GoalCallbacks<T: Transport> {
    inner: Arc<Callbacks<T>>,
}

impl<T: Transport> Clone for GoalCallbacks<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> GoalCallbacks<T> {
    pub(crate) fn new(
        operation: Arc<Operation<T>>,
        events: Sender<Event<T::Feedback, T::Output>>,
    ) -> Self {
        Self {
            inner: Arc::new(Callbacks { operation, events }),
        }
    }

    /// The endpoint accepted the goal and assigned it `handle`.
    ///
    /// If cancellation was requested before this point it is forwarded to
    /// the transport now, from the calling thread.
    pub fn accepted(&self, handle: T::Handle) {
        self.inner.operation.record_handle(handle);
    }

    /// The endpoint refused the goal. Completes it as aborted.
    pub fn rejected(&self) {
        if self.inner.finish(OperationResult::aborted()) {
            info!(endpoint = %self.inner.operation.transport.endpoint(), "goal rejected");
        }
    }

    /// Intermediate progress. Ignored once the goal has completed.
    pub fn feedback(&self, feedback: T::Feedback) {
        if self.inner.operation.is_completed() {
            return;
        }
        let _ = self.inner.events.send(Event::Feedback(feedback));
    }

    /// Terminal result. Only the first terminal call is delivered.
    pub fn finished(&self, result: OperationResult<T::Output>) {
        if !self.inner.finish(result) {
            debug!(
                endpoint = %self.inner.operation.transport.endpoint(),
                "goal already completed, result dropped"
            );
        }
    }

    /// Whether cancellation has been requested for this goal.
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.operation.is_cancel_requested()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::transport::{GoalStatus, TransportError};
    use std::sync::mpsc::{self, Receiver};
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        canceled: Mutex<Vec<u32>>,
    }

    impl Recorder {
        fn canceled(&self) -> Vec<u32> {
            self.canceled.lock().unwrap().clone()
        }
    }

    impl Transport for Recorder {
        type Goal = ();
        type Feedback = u32;
        type Output = String;
        type Handle = u32;

        fn endpoint(&self) -> &str {
            "recorder"
        }

        fn wait_for_availability(&self, _timeout: Option<Duration>) -> bool {
            true
        }

        fn submit(&self, _goal: (), _callbacks: GoalCallbacks<Self>) -> Result<(), TransportError> {
            Ok(())
        }

        fn cancel(&self, handle: &u32) {
            self.canceled.lock().unwrap().push(*handle);
        }
    }

    type Events = Receiver<Event<u32, String>>;

    fn setup() -> (Arc<Recorder>, Arc<Operation<Recorder>>, GoalCallbacks<Recorder>, Events) {
        let transport = Arc::new(Recorder::default());
        let operation = Arc::new(Operation::new(Arc::clone(&transport)));
        let (sender, receiver) = mpsc::channel();
        let callbacks = GoalCallbacks::new(Arc::clone(&operation), sender);
        (transport, operation, callbacks, receiver)
    }

    fn status(event: Event<u32, String>) -> GoalStatus {
        match event {
            Event::Done(result) => result.status,
            Event::Feedback(_) => panic!("Expected a terminal event"),
        }
    }

    #[test]
    fn cancel_after_accept_is_forwarded() {
        let (transport, operation, callbacks, _events) = setup();

        callbacks.accepted(7);
        operation.request_cancel();

        assert_eq!(transport.canceled(), vec![7]);
        assert!(callbacks.is_cancel_requested());
    }

    #[test]
    fn cancel_before_accept_is_forwarded_on_accept() {
        let (transport, operation, callbacks, _events) = setup();

        operation.request_cancel();
        assert!(transport.canceled().is_empty());

        callbacks.accepted(3);
        assert_eq!(transport.canceled(), vec![3]);
    }

    #[test]
    fn repeated_cancel_forwards_once() {
        let (transport, operation, callbacks, _events) = setup();

        operation.request_cancel();
        callbacks.accepted(1);
        operation.request_cancel();
        operation.request_cancel();

        assert_eq!(transport.canceled(), vec![1]);
    }

    #[test]
    fn cancel_after_completion_is_a_no_op() {
        let (transport, operation, callbacks, _events) = setup();

        callbacks.accepted(9);
        callbacks.finished(OperationResult::succeeded("ok".to_string()));
        operation.request_cancel();

        assert!(transport.canceled().is_empty());
    }

    #[test]
    fn only_first_terminal_call_is_delivered() {
        let (_transport, _operation, callbacks, events) = setup();

        callbacks.finished(OperationResult::canceled());
        callbacks.finished(OperationResult::succeeded("late".to_string()));
        callbacks.rejected();
        drop(callbacks);

        assert_eq!(status(events.recv().unwrap()), GoalStatus::Canceled);
        assert!(events.recv().is_err());
    }

    #[test]
    fn dropping_every_clone_aborts() {
        let (_transport, _operation, callbacks, events) = setup();
        let clone = callbacks.clone();

        drop(callbacks);
        assert!(events.try_recv().is_err());

        drop(clone);
        assert_eq!(status(events.recv().unwrap()), GoalStatus::Aborted);
    }

    #[test]
    fn feedback_after_completion_is_ignored() {
        let (_transport, _operation, callbacks, events) = setup();

        callbacks.feedback(1);
        callbacks.rejected();
        callbacks.feedback(2);

        assert!(matches!(events.recv().unwrap(), Event::Feedback(1)));
        assert_eq!(status(events.recv().unwrap()), GoalStatus::Aborted);
        assert!(events.try_recv().is_err());
    }
}
