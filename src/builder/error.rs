//! Configuration errors for machine and state construction.

use thiserror::Error;

/// Errors raised while declaring states and wiring machines.
///
/// These are build-time failures: a machine that fails to build never
/// exists, so it can never run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("A state must declare at least one outcome")]
    NoOutcomes,

    #[error("Outcome tokens cannot be empty")]
    EmptyOutcome,

    #[error("State names cannot be empty")]
    EmptyStateName,

    #[error("State '{0}' already registered in the state machine")]
    DuplicateState(String),

    #[error("Transitions with empty source in state '{state}'")]
    EmptyTransitionKey { state: String },

    #[error("Transitions with empty target in state '{state}'")]
    EmptyTarget { state: String },

    #[error("State '{state}' routes outcome '{outcome}' more than once")]
    DuplicateTransition { state: String, outcome: String },

    #[error("State '{state}' references unregistered outcome '{outcome}', available outcomes are {available:?}")]
    UnknownOutcome {
        state: String,
        outcome: String,
        available: Vec<String>,
    },

    #[error("State '{state}' outcome '{outcome}' not registered in transitions")]
    MissingTransition { state: String, outcome: String },

    #[error("State '{state}' routes outcome '{outcome}' to '{target}', which is neither a registered state nor a machine outcome")]
    UnregisteredTarget {
        state: String,
        outcome: String,
        target: String,
    },

    #[error("Machine outcome '{0}' is not the target of any transition")]
    UnreachableOutcome(String),

    #[error("'{0}' is both a state name and a machine outcome")]
    AmbiguousName(String),

    #[error("No states defined. Add at least one state")]
    NoStates,

    #[error("Start state '{0}' is not in the state machine")]
    UnknownStartState(String),

    #[error("Goal handler not specified. Call .goal(handler) before .build()")]
    MissingGoalHandler,

    #[error("State machine '{machine}' failed validation:{}", render(.errors))]
    Invalid {
        machine: String,
        errors: Vec<ConfigurationError>,
    },
}

impl ConfigurationError {
    /// Collapse accumulated violations into one error.
    pub(crate) fn collect(machine: &str, mut errors: Vec<ConfigurationError>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            Self::Invalid {
                machine: machine.to_string(),
                errors,
            }
        }
    }

    /// Every individual violation carried by this error.
    pub fn violations(&self) -> Vec<&ConfigurationError> {
        match self {
            Self::Invalid { errors, .. } => errors.iter().flat_map(|e| e.violations()).collect(),
            other => vec![other],
        }
    }
}

fn render(errors: &[ConfigurationError]) -> String {
    errors.iter().map(|e| format!("\n\t{e}")).collect()
}
