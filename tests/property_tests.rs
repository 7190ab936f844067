//! Property-based tests for machine construction and execution.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated machines and inputs.

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use waypoint::builder::{pass_through, ConfigurationError, StateMachineBuilder};
use waypoint::core::{invoke, Blackboard, ExecutionError, PlainState};
use waypoint::transitions;

fn state_name(i: usize) -> String {
    format!("S{i}")
}

/// A straight chain S0 -> S1 -> ... -> "done".
fn chain(len: usize) -> StateMachineBuilder {
    (0..len).fold(
        StateMachineBuilder::new("chain").outcomes(["done"]),
        |builder, i| {
            let target = if i + 1 == len {
                "done".to_string()
            } else {
                state_name(i + 1)
            };
            builder
                .add_state(state_name(i), pass_through("next").unwrap(), transitions! { "next" => target })
                .unwrap()
        },
    )
}

prop_compose! {
    fn outcome_set()(tokens in prop::collection::btree_set("[a-z]{1,6}", 1..6)) -> Vec<String> {
        tokens.into_iter().collect()
    }
}

prop_compose! {
    fn outcome_set_with_dropped()(tokens in outcome_set())(
        dropped in 0..tokens.len(),
        tokens in Just(tokens),
    ) -> (Vec<String>, usize) {
        (tokens, dropped)
    }
}

proptest! {
    #[test]
    fn chain_visits_every_state_in_order(len in 1usize..12) {
        let machine = chain(len).build().unwrap();

        let (outcome, _) = machine.run().unwrap();
        prop_assert_eq!(outcome, "done");

        let history = machine.last_run().unwrap();
        let expected: Vec<String> = (0..len).map(state_name).collect();
        prop_assert_eq!(history.get_path(), expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn missing_transition_always_fails_build((tokens, dropped) in outcome_set_with_dropped()) {
        let routes: BTreeMap<String, String> = tokens
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != dropped)
            .map(|(_, t)| (t.clone(), "finished".to_string()))
            .collect();

        let first = tokens[0].clone();
        let state = PlainState::new(tokens.clone(), move |_, _| Ok(first.clone())).unwrap();
        let result = StateMachineBuilder::new("partial")
            .outcomes(["finished"])
            .add_state("ONLY", state, routes)
            .unwrap()
            .build();

        let err = result.unwrap_err();
        let missing = &tokens[dropped];
        prop_assert!(err.violations().iter().any(|v| matches!(
            v,
            ConfigurationError::MissingTransition { outcome, .. } if outcome == missing
        )), "expected MissingTransition violation");
    }

    #[test]
    fn writes_are_read_back_unchanged(key in "[a-z_]{1,12}", value in any::<i64>()) {
        let write_key = key.clone();
        let writer = PlainState::new(["written"], move |bb, _| {
            bb.set(write_key.clone(), value);
            Ok("written".to_string())
        })
        .unwrap();

        let read_key = key.clone();
        let reader = PlainState::new(["read"], move |bb, _| {
            let seen: i64 = bb.get_as(&read_key)?;
            bb.set("__seen", seen);
            Ok("read".to_string())
        })
        .unwrap();

        let machine = StateMachineBuilder::new("rw")
            .outcomes(["done"])
            .add_state("WRITE", writer, transitions! { "written" => "READ" })
            .unwrap()
            .add_state("READ", reader, transitions! { "read" => "done" })
            .unwrap()
            .build()
            .unwrap();

        let (_, blackboard) = machine.run().unwrap();
        prop_assert_eq!(blackboard.get_as::<i64>("__seen").unwrap(), value);
    }

    #[test]
    fn loop_runs_until_counter_limit(limit in 0usize..20) {
        let calls = AtomicUsize::new(0);
        let counter = PlainState::new(["again", "enough"], move |_, _| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok(if n < limit { "again" } else { "enough" }.to_string())
        })
        .unwrap();

        let machine = StateMachineBuilder::new("loop")
            .outcomes(["done"])
            .add_state("COUNT", counter, transitions! { "again" => "COUNT", "enough" => "done" })
            .unwrap()
            .build()
            .unwrap();

        machine.run().unwrap();
        prop_assert_eq!(machine.last_run().unwrap().count("COUNT"), limit + 1);

        // the counter lives as long as the state, so a second run stops at once
        machine.run().unwrap();
        prop_assert_eq!(machine.last_run().unwrap().count("COUNT"), 1);
    }

    #[test]
    fn undeclared_outcome_is_always_caught(tokens in outcome_set(), returned in "[a-z]{1,6}") {
        let reply = returned.clone();
        let state = PlainState::new(tokens.clone(), move |_, _| Ok(reply.clone())).unwrap();

        let result = invoke(&state, &mut Blackboard::new());
        if tokens.contains(&returned) {
            prop_assert_eq!(result.unwrap(), returned);
        } else {
            let is_violation = matches!(result, Err(ExecutionError::ContractViolation { .. }));
            prop_assert!(is_violation);
        }
    }
}
