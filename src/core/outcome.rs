//! Declared outcome sets.

use crate::builder::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Non-empty, fixed set of outcome tokens a state may return.
///
/// Tokens are non-empty strings; the set is established at construction and
/// never changes afterwards.
///
/// # Example
///
/// ```rust
/// use waypoint::core::Outcomes;
///
/// let outcomes = Outcomes::new(["outcome1", "outcome2"]).unwrap();
/// assert!(outcomes.contains("outcome1"));
/// assert!(!outcomes.contains("outcome3"));
///
/// assert!(Outcomes::new(Vec::<String>::new()).is_err());
/// assert!(Outcomes::new([""]).is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcomes(BTreeSet<String>);

impl Outcomes {
    pub fn new<I, S>(tokens: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for token in tokens {
            let token = token.into();
            if token.is_empty() {
                return Err(ConfigurationError::EmptyOutcome);
            }
            set.insert(token);
        }

        if set.is_empty() {
            return Err(ConfigurationError::NoOutcomes);
        }

        Ok(Self(set))
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    /// Tokens in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl fmt::Display for Outcomes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tokens: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", tokens.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_collapse() {
        let outcomes = Outcomes::new(["a", "b", "a"]).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn empty_token_is_rejected() {
        let result = Outcomes::new(["ok", ""]);
        assert!(matches!(result, Err(ConfigurationError::EmptyOutcome)));
    }

    #[test]
    fn empty_set_is_rejected() {
        let result = Outcomes::new(Vec::<&str>::new());
        assert!(matches!(result, Err(ConfigurationError::NoOutcomes)));
    }

    #[test]
    fn display_is_bracketed_list() {
        let outcomes = Outcomes::new(["succeeded", "aborted"]).unwrap();
        assert_eq!(outcomes.to_string(), "[aborted, succeeded]");
    }
}
