//! Serializable views of machine structure and activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Static structure of a state machine: its states and their wiring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineStructure {
    pub name: String,
    pub outcomes: Vec<String>,
    pub start_state: String,
    pub states: Vec<StateNode>,
}

/// One registered state inside a [`MachineStructure`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateNode {
    pub name: String,
    pub kind: String,
    pub outcomes: Vec<String>,
    /// outcome -> next state or machine outcome
    pub transitions: BTreeMap<String, String>,
    /// Present when the state is itself a machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<Box<MachineStructure>>,
}

impl MachineStructure {
    /// Find a state by name, searching nested machines depth-first.
    pub fn find(&self, name: &str) -> Option<&StateNode> {
        self.states.iter().find_map(|node| {
            if node.name == name {
                Some(node)
            } else {
                node.machine.as_ref().and_then(|m| m.find(name))
            }
        })
    }
}

/// Emitted whenever the active state of a machine changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveStateChanged {
    pub run_id: Uuid,
    pub machine: String,
    /// `None` once the machine has returned.
    pub active: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Everything a publisher can receive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Structure {
        run_id: Uuid,
        structure: MachineStructure,
    },
    Active(ActiveStateChanged),
}
