//! State that blocks on one remote goal.

use super::builder::{BridgeBuilder, BridgeOptions, FeedbackHandler, GoalHandler, ResultHandler};
use super::operation::{Event, GoalCallbacks, Operation};
use super::transport::{GoalStatus, OperationResult, Transport};
use super::{ABORT, CANCEL, SUCCEED, TIMEOUT};
use crate::core::{Blackboard, BoxError, ExecutionError, Outcomes, State, StateFlags};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Adapts a callback-driven [`Transport`] into one blocking
/// [`State::execute`] call.
///
/// `execute` builds a goal from the blackboard, waits for the endpoint
/// (indefinitely unless an availability timeout is set), submits the goal and then blocks the calling thread until the transport
/// reports a terminal result. Feedback handlers run on the executing thread,
/// in arrival order, before the result is mapped.
///
/// Outcomes are [`SUCCEED`], [`ABORT`] and [`CANCEL`], plus [`TIMEOUT`] when
/// a timeout is configured, plus any extra outcomes the result handler may
/// return. Transport failures and handler errors or panics never escape as
/// `Err`; they become [`ABORT`].
///
/// [`cancel`](State::cancel) may be called from any thread at any time:
/// before submission the goal is never sent, before acceptance it is
/// forwarded as soon as the goal is accepted, and after completion it does
/// nothing.
pub struct AsyncOperationBridge<T: Transport> {
    transport: Arc<T>,
    outcomes: Outcomes,
    flags: StateFlags,
    options: BridgeOptions,
    goal: GoalHandler<T>,
    result: Option<ResultHandler<T>>,
    feedback: Option<FeedbackHandler<T>>,
    in_flight: Mutex<Option<Arc<Operation<T>>>>,
}

/// Longest single `wait_for_availability` call between cancellation checks.
const AVAILABILITY_SLICE: Duration = Duration::from_millis(100);

/// How the wait for the endpoint ended.
enum Availability {
    Available,
    Unavailable,
    Canceled,
}

/// How the wait for a terminal result ended.
enum Completion<O> {
    Finished(OperationResult<O>),
    TimedOut,
    FeedbackFailed,
}

struct ClearInFlight<'a, T: Transport>(&'a Mutex<Option<Arc<Operation<T>>>>);

impl<T: Transport> Drop for ClearInFlight<'_, T> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Run a user handler, turning a panic into an error.
fn guarded<R>(handler: impl FnOnce() -> Result<R, BoxError>) -> Result<R, BoxError> {
    panic::catch_unwind(AssertUnwindSafe(handler))
        .unwrap_or_else(|payload| Err(panic_message(payload).into()))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}

impl<T: Transport> AsyncOperationBridge<T> {
    /// Start building a bridge over `transport`.
    pub fn builder(transport: Arc<T>) -> BridgeBuilder<T> {
        BridgeBuilder::new(transport)
    }

    pub(crate) fn from_parts(
        transport: Arc<T>,
        outcomes: Outcomes,
        options: BridgeOptions,
        goal: GoalHandler<T>,
        result: Option<ResultHandler<T>>,
        feedback: Option<FeedbackHandler<T>>,
    ) -> Self {
        Self {
            transport,
            outcomes,
            flags: StateFlags::new(),
            options,
            goal,
            result,
            feedback,
            in_flight: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<Arc<Operation<T>>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for the endpoint in bounded slices, giving up early on cancel.
    fn await_endpoint(&self) -> Availability {
        let deadline = self
            .options
            .availability_timeout
            .and_then(|t| Instant::now().checked_add(t));
        let token = self.flags.token();

        loop {
            if token.is_canceled() {
                return Availability::Canceled;
            }
            let slice = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Availability::Unavailable;
                    }
                    remaining.min(AVAILABILITY_SLICE)
                }
                None => AVAILABILITY_SLICE,
            };

            let started = Instant::now();
            if self.transport.wait_for_availability(Some(slice)) {
                return Availability::Available;
            }
            // transports may report unavailable early; sleep out the slice
            if let Some(rest) = slice.checked_sub(started.elapsed()) {
                token.wait_timeout(rest);
            }
        }
    }

    fn wait(
        &self,
        operation: &Operation<T>,
        events: &Receiver<Event<T::Feedback, T::Output>>,
        blackboard: &mut Blackboard,
    ) -> Completion<T::Output> {
        // a deadline past the end of the clock is no deadline
        let deadline = self
            .options
            .operation_timeout
            .and_then(|t| Instant::now().checked_add(t));
        let mut expired = false;
        let mut timed_out = false;
        let mut feedback_failed = false;

        let result = loop {
            let event = match deadline.filter(|_| !expired) {
                Some(deadline) => {
                    match events.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => {
                            expired = true;
                            if operation.is_cancel_requested() {
                                debug!(endpoint = %self.endpoint(), "goal deadline reached after cancel");
                            } else {
                                warn!(endpoint = %self.endpoint(), "goal deadline reached, canceling");
                                timed_out = true;
                                operation.request_cancel();
                            }
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break OperationResult::aborted(),
                    }
                }
                None => match events.recv() {
                    Ok(event) => event,
                    Err(_) => break OperationResult::aborted(),
                },
            };

            match event {
                Event::Done(result) => break result,
                Event::Feedback(feedback) => {
                    if feedback_failed {
                        continue;
                    }
                    let Some(handler) = &self.feedback else {
                        continue;
                    };
                    if let Err(err) = guarded(|| handler(blackboard, feedback)) {
                        error!(endpoint = %self.endpoint(), error = %err, "feedback handler failed, canceling");
                        feedback_failed = true;
                        operation.request_cancel();
                    }
                }
            }
        };

        if timed_out {
            Completion::TimedOut
        } else if feedback_failed {
            Completion::FeedbackFailed
        } else {
            Completion::Finished(result)
        }
    }

    fn map_result(&self, result: OperationResult<T::Output>, blackboard: &mut Blackboard) -> String {
        info!(endpoint = %self.endpoint(), status = ?result.status, "goal finished");

        match result.status {
            GoalStatus::Canceled => CANCEL.to_string(),
            GoalStatus::Aborted | GoalStatus::Unknown => ABORT.to_string(),
            GoalStatus::Succeeded => {
                let Some(handler) = &self.result else {
                    return SUCCEED.to_string();
                };
                let Some(output) = result.output else {
                    error!(endpoint = %self.endpoint(), "goal succeeded without output");
                    return ABORT.to_string();
                };
                guarded(|| handler(blackboard, output)).unwrap_or_else(|err| {
                    error!(endpoint = %self.endpoint(), error = %err, "result handler failed");
                    ABORT.to_string()
                })
            }
        }
    }
}

impl<T: Transport> State for AsyncOperationBridge<T> {
    fn outcomes(&self) -> &Outcomes {
        &self.outcomes
    }

    fn flags(&self) -> &StateFlags {
        &self.flags
    }

    fn execute(&self, blackboard: &mut Blackboard) -> Result<String, ExecutionError> {
        if self.flags.is_canceled() {
            info!(endpoint = %self.endpoint(), "canceled before building goal");
            return Ok(CANCEL.to_string());
        }

        let goal = match guarded(|| (self.goal)(blackboard)) {
            Ok(goal) => goal,
            Err(err) => {
                error!(endpoint = %self.endpoint(), error = %err, "goal handler failed");
                return Ok(ABORT.to_string());
            }
        };

        info!(endpoint = %self.endpoint(), "waiting for endpoint");
        match self.await_endpoint() {
            Availability::Available => {}
            Availability::Canceled => {
                info!(endpoint = %self.endpoint(), "canceled while waiting for endpoint");
                return Ok(CANCEL.to_string());
            }
            Availability::Unavailable => {
                warn!(
                    endpoint = %self.endpoint(),
                    timeout = ?self.options.availability_timeout,
                    "timeout reached, endpoint is not available"
                );
                return Ok(TIMEOUT.to_string());
            }
        }

        let operation = Arc::new(Operation::new(Arc::clone(&self.transport)));
        {
            let mut in_flight = self.lock_in_flight();
            if self.flags.is_canceled() {
                info!(endpoint = %self.endpoint(), "canceled before sending goal");
                return Ok(CANCEL.to_string());
            }
            *in_flight = Some(Arc::clone(&operation));
        }
        let _clear = ClearInFlight(&self.in_flight);

        let (sender, events) = mpsc::channel();
        info!(endpoint = %self.endpoint(), "sending goal");
        if let Err(err) = self
            .transport
            .submit(goal, GoalCallbacks::new(Arc::clone(&operation), sender))
        {
            operation.complete();
            error!(endpoint = %self.endpoint(), error = %err, "goal submission failed");
            return Ok(ABORT.to_string());
        }

        let outcome = match self.wait(&operation, &events, blackboard) {
            Completion::Finished(result) => self.map_result(result, blackboard),
            Completion::TimedOut => TIMEOUT.to_string(),
            Completion::FeedbackFailed => ABORT.to_string(),
        };
        Ok(outcome)
    }

    fn cancel(&self) {
        self.flags.request_cancel();

        let operation = self.lock_in_flight().clone();
        if let Some(operation) = operation {
            operation.request_cancel();
        }
    }

    fn kind(&self) -> &str {
        "AsyncOperationBridge"
    }
}
