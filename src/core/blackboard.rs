//! Shared key/value store passed through one machine run.
//!
//! Values are dynamically typed (`serde_json::Value`), so states can exchange
//! anything serde can represent without declaring keys ahead of time. There is
//! no schema: reading a missing key or decoding a value as the wrong type is
//! reported as a [`BlackboardError`] and left to the caller to handle.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors raised by blackboard reads and typed writes.
#[derive(Debug, Error)]
pub enum BlackboardError {
    #[error("Key '{0}' does not exist in the blackboard")]
    MissingKey(String),

    #[error("Value under '{key}' could not be decoded: {source}")]
    TypeMismatch {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Value for '{key}' could not be encoded: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Mutable key/value store shared by every state executed in one run.
///
/// Within a run exactly one state executes at a time, so the blackboard is
/// handed around as `&mut Blackboard` and carries no internal locking.
///
/// # Example
///
/// ```rust
/// use waypoint::core::Blackboard;
///
/// let mut blackboard = Blackboard::new();
/// blackboard.set("attempts", 2);
/// blackboard.set("target", "dock");
///
/// assert_eq!(blackboard.get_as::<u32>("attempts").unwrap(), 2);
/// assert_eq!(blackboard.get("target").unwrap(), "dock");
/// assert!(blackboard.get("missing").is_err());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Blackboard {
    values: BTreeMap<String, Value>,
}

impl Blackboard {
    /// Create an empty blackboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the raw value stored under `key`.
    pub fn get(&self, key: &str) -> Result<&Value, BlackboardError> {
        tracing::trace!(key, "reading blackboard");
        self.values
            .get(key)
            .ok_or_else(|| BlackboardError::MissingKey(key.to_string()))
    }

    /// Get the value stored under `key`, decoded as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, BlackboardError> {
        let value = self.get(key)?;
        T::deserialize(value).map_err(|source| BlackboardError::TypeMismatch {
            key: key.to_string(),
            source,
        })
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        tracing::trace!(key = %key, "writing blackboard");
        self.values.insert(key, value.into());
    }

    /// Encode `value` with serde and store it under `key`.
    pub fn set_as<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), BlackboardError> {
        let key = key.into();
        let encoded = serde_json::to_value(value).map_err(|source| BlackboardError::Encode {
            key: key.clone(),
            source,
        })?;
        self.set(key, encoded);
        Ok(())
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl fmt::Display for Blackboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Blackboard")?;
        for (key, value) in &self.values {
            writeln!(f, "\t{key}: {value}")?;
        }
        Ok(())
    }
}
