//! Resolved transition table.

use crate::core::Outcomes;
use std::collections::{BTreeMap, HashMap};

/// Where an outcome routes once the machine is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Target {
    /// Continue with the state at this index.
    State(usize),
    /// Return this outcome from the machine.
    Outcome(String),
}

/// Resolve one state's routes against the registered state names and the
/// machine outcomes. Names that resolve to neither are skipped; validation
/// has already rejected them.
pub(crate) fn resolve(
    transitions: &BTreeMap<String, String>,
    index: &HashMap<String, usize>,
    outcomes: &Outcomes,
) -> HashMap<String, Target> {
    transitions
        .iter()
        .filter_map(|(outcome, target)| {
            let resolved = if outcomes.contains(target) {
                Target::Outcome(target.clone())
            } else {
                Target::State(*index.get(target)?)
            };
            Some((outcome.clone(), resolved))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_resolve_to_states_or_outcomes() {
        let outcomes = Outcomes::new(["outcome4"]).unwrap();
        let index = HashMap::from([("FOO".to_string(), 0), ("BAR".to_string(), 1)]);
        let transitions = BTreeMap::from([
            ("outcome1".to_string(), "BAR".to_string()),
            ("outcome2".to_string(), "outcome4".to_string()),
        ]);

        let routes = resolve(&transitions, &index, &outcomes);

        assert_eq!(routes["outcome1"], Target::State(1));
        assert_eq!(routes["outcome2"], Target::Outcome("outcome4".to_string()));
    }

    #[test]
    fn unknown_targets_are_dropped() {
        let outcomes = Outcomes::new(["done"]).unwrap();
        let transitions = BTreeMap::from([("ok".to_string(), "GHOST".to_string())]);

        let routes = resolve(&transitions, &HashMap::new(), &outcomes);
        assert!(routes.is_empty());
    }
}
