//! Whole-machine validation.
//!
//! Every wiring rule is checked in one pass and ALL violations are
//! accumulated with Stillwater's `Validation`, so a misconfigured machine
//! reports every problem at once instead of one per build attempt.

use crate::builder::error::ConfigurationError;
use crate::core::Outcomes;
use std::collections::{BTreeMap, BTreeSet};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

pub(crate) type Checked = Validation<(), NonEmptyVec<ConfigurationError>>;

/// What validation needs to know about one registered state.
pub(crate) struct Wiring<'a> {
    pub name: &'a str,
    pub outcomes: &'a Outcomes,
    pub transitions: &'a BTreeMap<String, String>,
}

fn check(ok: bool, error: impl FnOnce() -> ConfigurationError) -> Checked {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(error())
    }
}

/// Validate the wiring of a machine whose own outcomes are `outcomes`.
pub(crate) fn validate(
    outcomes: &Outcomes,
    states: &[Wiring<'_>],
    start: Option<&str>,
) -> Checked {
    if states.is_empty() {
        return Validation::fail(ConfigurationError::NoStates);
    }

    let names: BTreeSet<&str> = states.iter().map(|s| s.name).collect();
    let mut checks: Vec<Checked> = Vec::new();

    if let Some(start) = start {
        checks.push(check(names.contains(start), || {
            ConfigurationError::UnknownStartState(start.to_string())
        }));
    }

    for state in states {
        checks.push(check(!outcomes.contains(state.name), || {
            ConfigurationError::AmbiguousName(state.name.to_string())
        }));

        // every declared outcome is routed
        for outcome in state.outcomes.iter() {
            checks.push(check(state.transitions.contains_key(outcome), || {
                ConfigurationError::MissingTransition {
                    state: state.name.to_string(),
                    outcome: outcome.to_string(),
                }
            }));
        }

        // every route lands somewhere
        for (outcome, target) in state.transitions {
            let known = names.contains(target.as_str()) || outcomes.contains(target);
            checks.push(check(known, || ConfigurationError::UnregisteredTarget {
                state: state.name.to_string(),
                outcome: outcome.clone(),
                target: target.clone(),
            }));
        }
    }

    let produced: BTreeSet<&str> = states
        .iter()
        .flat_map(|s| s.transitions.values().map(String::as_str))
        .collect();
    for outcome in outcomes.iter() {
        checks.push(check(produced.contains(outcome), || {
            ConfigurationError::UnreachableOutcome(outcome.to_string())
        }));
    }

    Validation::all_vec(checks).map(|_| ())
}
