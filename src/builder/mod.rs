//! Builder API for ergonomic state machine construction.
//!
//! This module provides the fluent machine builder, whole-machine
//! validation, and the `transitions!` macro for wiring outcomes with
//! minimal boilerplate.

pub mod error;
pub mod machine;
pub mod macros;
pub(crate) mod validation;

pub use error::ConfigurationError;
pub use machine::StateMachineBuilder;

use crate::core::{Blackboard, CancellationToken, ExecutionError, PlainState};

/// Create a plain state that always returns `outcome`.
///
/// # Example
///
/// ```
/// use waypoint::builder::pass_through;
/// use waypoint::core::{invoke, Blackboard};
///
/// let state = pass_through("done").unwrap();
/// assert_eq!(invoke(&state, &mut Blackboard::new()).unwrap(), "done");
/// ```
pub fn pass_through(
    outcome: impl Into<String>,
) -> Result<
    PlainState<
        impl Fn(&mut Blackboard, &CancellationToken) -> Result<String, ExecutionError> + Send + Sync,
    >,
    ConfigurationError,
> {
    let outcome = outcome.into();
    let returned = outcome.clone();
    PlainState::new([outcome], move |_: &mut Blackboard, _: &CancellationToken| {
        Ok(returned.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{invoke, State};

    #[test]
    fn pass_through_declares_single_outcome() {
        let state = pass_through("next").unwrap();

        assert_eq!(state.outcomes().to_vec(), vec!["next".to_string()]);
        assert_eq!(invoke(&state, &mut Blackboard::new()).unwrap(), "next");
    }

    #[test]
    fn pass_through_rejects_empty_outcome() {
        assert!(matches!(
            pass_through(""),
            Err(ConfigurationError::EmptyOutcome)
        ));
    }
}
