//! The State capability shared by every executable unit.
//!
//! Plain states, asynchronous operation bridges and whole state machines all
//! implement [`State`], so a machine holds a collection of `dyn State` and can
//! itself be nested inside another machine.

use super::blackboard::Blackboard;
use super::cancel::CancellationToken;
use super::error::ExecutionError;
use super::outcome::Outcomes;
use crate::builder::ConfigurationError;
use crate::telemetry::MachineStructure;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Observability and cancellation flags embedded in every state.
///
/// Each invocation runs under its own [`CancellationToken`], installed when
/// the state is entered. Inside a machine that token is a child of the
/// machine's, so canceling the machine also cancels the running state.
#[derive(Debug, Default)]
pub struct StateFlags {
    active: AtomicBool,
    token: Mutex<CancellationToken>,
}

impl StateFlags {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CancellationToken> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Token of the current (or most recent) invocation.
    pub fn token(&self) -> CancellationToken {
        self.lock().clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_canceled(&self) -> bool {
        self.lock().is_canceled()
    }

    pub fn request_cancel(&self) {
        self.lock().cancel();
    }

    /// Mark the state active for one invocation under a fresh token, a child
    /// of `parent` when there is one. The returned guard marks the state
    /// inactive again on drop.
    pub(crate) fn enter(&self, parent: Option<&CancellationToken>) -> ActiveGuard<'_> {
        *self.lock() = parent.map_or_else(CancellationToken::new, CancellationToken::child);
        self.active.store(true, Ordering::SeqCst);
        ActiveGuard { flags: self }
    }
}

pub(crate) struct ActiveGuard<'a> {
    flags: &'a StateFlags,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.flags.active.store(false, Ordering::SeqCst);
    }
}

/// A unit of work with a fixed set of outcomes.
///
/// `execute` runs on the caller's thread and may block for as long as the
/// work takes. `cancel` may be called concurrently from any thread; it must
/// not block, and the running `execute` is expected to notice it (through
/// [`StateFlags::token`]) and return as soon as it safely can.
///
/// Implementors keep any per-instance fields (counters, caches) for the
/// lifetime of the instance, not of a run: executing the same instance twice
/// sees the fields left behind by the first execution unless the state resets
/// them itself.
pub trait State: Send + Sync {
    /// Outcome tokens this state may return. Fixed after construction.
    fn outcomes(&self) -> &Outcomes;

    fn flags(&self) -> &StateFlags;

    /// Run one step against the blackboard and report an outcome.
    ///
    /// Returning a token outside [`State::outcomes`] is a contract violation
    /// reported by the caller.
    fn execute(&self, blackboard: &mut Blackboard) -> Result<String, ExecutionError>;

    /// Best-effort, non-blocking request to stop the current execution.
    fn cancel(&self) {
        self.flags().request_cancel();
    }

    fn is_active(&self) -> bool {
        self.flags().is_active()
    }

    fn is_canceled(&self) -> bool {
        self.flags().is_canceled()
    }

    /// Short description used in logs and telemetry.
    fn kind(&self) -> &str {
        "State"
    }

    /// Structure of a composite state, if this is one.
    fn structure(&self) -> Option<MachineStructure> {
        None
    }
}

impl<T: State + ?Sized> State for Arc<T> {
    fn outcomes(&self) -> &Outcomes {
        (**self).outcomes()
    }

    fn flags(&self) -> &StateFlags {
        (**self).flags()
    }

    fn execute(&self, blackboard: &mut Blackboard) -> Result<String, ExecutionError> {
        (**self).execute(blackboard)
    }

    fn cancel(&self) {
        (**self).cancel()
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }

    fn is_canceled(&self) -> bool {
        (**self).is_canceled()
    }

    fn kind(&self) -> &str {
        (**self).kind()
    }

    fn structure(&self) -> Option<MachineStructure> {
        (**self).structure()
    }
}

/// Reject outcomes a state did not declare.
pub(crate) fn check_outcome<S: State + ?Sized>(
    label: &str,
    state: &S,
    outcome: String,
) -> Result<String, ExecutionError> {
    if state.outcomes().contains(&outcome) {
        Ok(outcome)
    } else {
        Err(ExecutionError::ContractViolation {
            state: label.to_string(),
            outcome,
            declared: state.outcomes().to_vec(),
        })
    }
}

/// Invoke `state` as a top-level unit of work.
///
/// Marks the state active for the duration of the call, clears stale
/// cancellation, and enforces the outcome contract on the result.
///
/// # Example
///
/// ```rust
/// use waypoint::core::{invoke, Blackboard, PlainState};
///
/// let state = PlainState::new(["done"], |blackboard, _token| {
///     blackboard.set("visited", true);
///     Ok("done".to_string())
/// })
/// .unwrap();
///
/// let mut blackboard = Blackboard::new();
/// assert_eq!(invoke(&state, &mut blackboard).unwrap(), "done");
/// assert!(blackboard.contains("visited"));
/// ```
pub fn invoke<S: State + ?Sized>(
    state: &S,
    blackboard: &mut Blackboard,
) -> Result<String, ExecutionError> {
    let outcome = {
        let _active = state.flags().enter(None);
        state.execute(blackboard)?
    };
    check_outcome(state.kind(), state, outcome)
}

/// State whose step is a closure.
///
/// The closure receives the blackboard and the state's cancellation token.
/// Per-instance fields must live inside the closure (for instance behind an
/// atomic) since `execute` takes `&self`.
pub struct PlainState<F> {
    outcomes: Outcomes,
    flags: StateFlags,
    step: F,
}

impl<F> PlainState<F>
where
    F: Fn(&mut Blackboard, &CancellationToken) -> Result<String, ExecutionError> + Send + Sync,
{
    pub fn new<I, S>(outcomes: I, step: F) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            outcomes: Outcomes::new(outcomes)?,
            flags: StateFlags::new(),
            step,
        })
    }
}

impl<F> State for PlainState<F>
where
    F: Fn(&mut Blackboard, &CancellationToken) -> Result<String, ExecutionError> + Send + Sync,
{
    fn outcomes(&self) -> &Outcomes {
        &self.outcomes
    }

    fn flags(&self) -> &StateFlags {
        &self.flags
    }

    fn execute(&self, blackboard: &mut Blackboard) -> Result<String, ExecutionError> {
        (self.step)(blackboard, &self.flags.token())
    }
}
