//! Macros for ergonomic state machine construction.

/// Build a transition map from `outcome => target` pairs.
///
/// Expands to a `BTreeMap<String, String>` accepted by
/// [`StateMachineBuilder::add_state`](crate::builder::StateMachineBuilder::add_state).
///
/// # Example
///
/// ```
/// use waypoint::transitions;
///
/// let routes = transitions! {
///     "outcome1" => "BAR",
///     "outcome2" => "outcome4",
/// };
///
/// assert_eq!(routes["outcome1"], "BAR");
/// assert_eq!(routes.len(), 2);
/// ```
#[macro_export]
macro_rules! transitions {
    () => {
        ::std::collections::BTreeMap::<::std::string::String, ::std::string::String>::new()
    };
    ($($outcome:expr => $target:expr),+ $(,)?) => {{
        let mut routes =
            ::std::collections::BTreeMap::<::std::string::String, ::std::string::String>::new();
        $(
            routes.insert(
                ::std::string::String::from($outcome),
                ::std::string::String::from($target),
            );
        )+
        routes
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn transitions_macro_builds_map() {
        let routes = transitions! { "a" => "B", "b" => "done" };

        assert_eq!(routes.len(), 2);
        assert_eq!(routes.get("a").map(String::as_str), Some("B"));
        assert_eq!(routes.get("b").map(String::as_str), Some("done"));
    }

    #[test]
    fn transitions_macro_accepts_trailing_comma_and_owned_strings() {
        let target = String::from("NEXT");
        let routes = transitions! {
            "go" => target,
        };

        assert_eq!(routes["go"], "NEXT");
    }

    #[test]
    fn empty_transitions_macro() {
        let routes = transitions! {};
        assert!(routes.is_empty());
    }
}
