//! The remote side of a bridge.

use super::operation::GoalCallbacks;
use crate::core::BoxError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Terminal status reported by a transport for one goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Succeeded,
    Aborted,
    Canceled,
    /// Any status the transport could not map to the three above.
    Unknown,
}

/// Terminal report for one goal: a status plus the raw output, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationResult<O> {
    pub status: GoalStatus,
    pub output: Option<O>,
}

impl<O> OperationResult<O> {
    pub fn succeeded(output: O) -> Self {
        Self {
            status: GoalStatus::Succeeded,
            output: Some(output),
        }
    }

    pub fn aborted() -> Self {
        Self {
            status: GoalStatus::Aborted,
            output: None,
        }
    }

    pub fn canceled() -> Self {
        Self {
            status: GoalStatus::Canceled,
            output: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Endpoint '{0}' is not available")]
    Unavailable(String),

    #[error("Goal submission failed: {0}")]
    Submit(#[source] BoxError),
}

/// Callback-driven request/feedback/result protocol a bridge blocks on.
///
/// `submit` must return without waiting for the goal to run. Afterwards the
/// transport drives the [`GoalCallbacks`] from its own threads:
/// [`accepted`](GoalCallbacks::accepted) once a handle exists, any number of
/// [`feedback`](GoalCallbacks::feedback) calls, then exactly one terminal
/// call ([`finished`](GoalCallbacks::finished) or
/// [`rejected`](GoalCallbacks::rejected)). Dropping every clone of the
/// callbacks without a terminal call completes the goal as aborted.
pub trait Transport: Send + Sync + 'static {
    type Goal: Send;
    type Feedback: Send + 'static;
    type Output: Send + 'static;
    /// Opaque reference to one accepted goal.
    type Handle: Clone + Send + Sync + 'static;

    /// Endpoint name, used in logs.
    fn endpoint(&self) -> &str;

    /// Block until the endpoint accepts goals, for at most `timeout`.
    /// `None` waits indefinitely. Returns `false` if the endpoint is still
    /// unavailable at the deadline.
    ///
    /// Bridges always pass a bounded slice and re-check cancellation between
    /// calls, so an implementation must not overrun the timeout it is given.
    fn wait_for_availability(&self, timeout: Option<Duration>) -> bool;

    fn submit(
        &self,
        goal: Self::Goal,
        callbacks: GoalCallbacks<Self>,
    ) -> Result<(), TransportError>
    where
        Self: Sized;

    /// Ask the endpoint to cancel an accepted goal. Must not block on the
    /// goal actually stopping.
    fn cancel(&self, handle: &Self::Handle);
}
