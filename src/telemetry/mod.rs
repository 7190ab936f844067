//! Best-effort telemetry for visualizing machines.
//!
//! A machine with a [`Publisher`] attached announces its structure at the
//! start of every run and emits an [`ActiveStateChanged`] event whenever its
//! active state changes. Publishing failures never affect execution: they
//! are logged at `warn` and dropped.

mod publisher;
mod snapshot;

pub use publisher::{ChannelPublisher, JsonLinesPublisher, PublishError, Publisher};
pub use snapshot::{ActiveStateChanged, MachineStructure, StateNode, TelemetryEvent};
