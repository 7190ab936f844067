//! Runtime errors raised while a machine executes.

use super::blackboard::BlackboardError;
use thiserror::Error;

/// Boxed error type accepted from user-supplied state logic and handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that abort an execution and unwind to the top-level caller.
///
/// Recoverable conditions (timeouts, remote aborts, cancellation) are not
/// errors: they surface as outcomes and are routed by the transition table.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A state returned a token outside its declared outcome set.
    #[error("Outcome '{outcome}' is not registered in state '{state}', declared outcomes are {declared:?}")]
    ContractViolation {
        state: String,
        outcome: String,
        declared: Vec<String>,
    },

    #[error(transparent)]
    Blackboard(#[from] BlackboardError),

    /// A state's own logic failed.
    #[error("State '{state}' failed: {source}")]
    StateFailed {
        state: String,
        #[source]
        source: BoxError,
    },

    #[error("Outcome '{outcome}' of state '{state}' has no transition")]
    Unroutable { state: String, outcome: String },
}

impl ExecutionError {
    /// Wrap an arbitrary failure raised by the state named `state`.
    pub fn failed(state: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::StateFailed {
            state: state.into(),
            source: source.into(),
        }
    }
}
