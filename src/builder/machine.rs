//! Builder for constructing state machines.

use crate::builder::error::ConfigurationError;
use crate::builder::validation::{validate, Wiring};
use crate::core::{Outcomes, State, DEFAULT_HISTORY_LIMIT};
use crate::machine::StateMachine;
use crate::telemetry::Publisher;
use std::collections::BTreeMap;
use std::sync::Arc;
use stillwater::validation::Validation;

pub(crate) struct Registration {
    pub name: String,
    pub state: Box<dyn State>,
    pub transitions: BTreeMap<String, String>,
}

/// Builder for constructing state machines with a fluent API.
///
/// States are registered with [`add_state`](Self::add_state), which checks
/// the registration on its own (duplicate names, routes for undeclared
/// outcomes). [`build`](Self::build) then validates the machine as a whole
/// and returns every wiring problem it finds.
///
/// # Example
///
/// ```rust
/// use waypoint::builder::StateMachineBuilder;
/// use waypoint::core::PlainState;
/// use waypoint::transitions;
///
/// let ping = PlainState::new(["pong"], |_, _| Ok("pong".to_string())).unwrap();
///
/// let machine = StateMachineBuilder::new("ping")
///     .outcomes(["finished"])
///     .add_state("PING", ping, transitions! { "pong" => "finished" })
///     .unwrap()
///     .build()
///     .unwrap();
///
/// assert_eq!(machine.start_state(), "PING");
/// ```
pub struct StateMachineBuilder {
    name: String,
    outcomes: Vec<String>,
    states: Vec<Registration>,
    start: Option<String>,
    history_limit: usize,
    publisher: Option<Arc<dyn Publisher>>,
}

impl StateMachineBuilder {
    /// Create a builder for a machine named `name` (used in logs and telemetry).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcomes: Vec::new(),
            states: Vec::new(),
            start: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            publisher: None,
        }
    }

    /// Set the machine's own outcomes (required).
    pub fn outcomes<I, S>(mut self, outcomes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outcomes = outcomes.into_iter().map(Into::into).collect();
        self
    }

    /// Register a state and the routing of each of its outcomes.
    ///
    /// Each transition maps one of the state's outcomes to either another
    /// state name or one of this machine's outcomes. Targets may name states
    /// registered later; they are resolved in [`build`](Self::build).
    pub fn add_state<S, I, K, V>(
        mut self,
        name: impl Into<String>,
        state: S,
        transitions: I,
    ) -> Result<Self, ConfigurationError>
    where
        S: State + 'static,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigurationError::EmptyStateName);
        }
        if self.states.iter().any(|r| r.name == name) {
            return Err(ConfigurationError::DuplicateState(name));
        }

        let mut routes = BTreeMap::new();
        for (outcome, target) in transitions {
            let outcome = outcome.into();
            let target = target.into();

            if outcome.is_empty() {
                return Err(ConfigurationError::EmptyTransitionKey { state: name });
            }
            if target.is_empty() {
                return Err(ConfigurationError::EmptyTarget { state: name });
            }
            if !state.outcomes().contains(&outcome) {
                return Err(ConfigurationError::UnknownOutcome {
                    state: name,
                    outcome,
                    available: state.outcomes().to_vec(),
                });
            }
            if routes.contains_key(&outcome) {
                return Err(ConfigurationError::DuplicateTransition {
                    state: name,
                    outcome,
                });
            }
            routes.insert(outcome, target);
        }

        self.states.push(Registration {
            name,
            state: Box::new(state),
            transitions: routes,
        });
        Ok(self)
    }

    /// Set the entry state. Defaults to the first registered state.
    pub fn start_state(mut self, name: impl Into<String>) -> Self {
        self.start = Some(name.into());
        self
    }

    /// Number of steps each run keeps in its history (default
    /// [`DEFAULT_HISTORY_LIMIT`]). Older steps are dropped first; `0`
    /// disables the step trace.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Attach a telemetry publisher.
    pub fn publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Build the state machine.
    /// Returns an error describing every wiring problem if validation fails.
    pub fn build(self) -> Result<StateMachine, ConfigurationError> {
        let outcomes = Outcomes::new(self.outcomes)?;

        let wiring: Vec<Wiring<'_>> = self
            .states
            .iter()
            .map(|r| Wiring {
                name: &r.name,
                outcomes: r.state.outcomes(),
                transitions: &r.transitions,
            })
            .collect();

        if let Validation::Failure(errors) = validate(&outcomes, &wiring, self.start.as_deref()) {
            return Err(ConfigurationError::collect(
                &self.name,
                errors.iter().cloned().collect(),
            ));
        }
        drop(wiring);

        let start = match self.start {
            Some(start) => start,
            None => self.states[0].name.clone(),
        };

        Ok(StateMachine::from_parts(
            self.name,
            outcomes,
            self.states,
            &start,
            self.history_limit,
            self.publisher,
        ))
    }
}
