//! Core types shared by every executable unit.
//!
//! This module contains the pieces a state needs to run:
//! - The `Blackboard` passed through one run
//! - Declared `Outcomes`
//! - The `State` capability trait and its `StateFlags`
//! - Cooperative cancellation via `CancellationToken`
//! - Per-run step history

mod blackboard;
mod cancel;
mod error;
mod history;
mod outcome;
mod state;

pub use blackboard::{Blackboard, BlackboardError};
pub use cancel::CancellationToken;
pub use error::{BoxError, ExecutionError};
pub use history::{RunHistory, StepRecord, DEFAULT_HISTORY_LIMIT};
pub use outcome::Outcomes;
pub use state::{invoke, PlainState, State, StateFlags};

pub(crate) use state::check_outcome;
