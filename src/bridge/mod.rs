//! Blocking bridge over callback-driven remote operations.
//!
//! An [`AsyncOperationBridge`] is a [`State`](crate::core::State) that sends
//! one goal through a [`Transport`] and blocks until the transport reports a
//! terminal result, mapping the result status to an outcome:
//!
//! | status      | outcome                                  |
//! |-------------|------------------------------------------|
//! | succeeded   | result handler's outcome, or [`SUCCEED`] |
//! | aborted     | [`ABORT`]                                |
//! | canceled    | [`CANCEL`]                               |
//! | unknown     | [`ABORT`]                                |
//!
//! The transport is injected through the builder; nothing in this module
//! reaches for a process-wide connection.

mod builder;
mod operation;
mod state;
mod transport;

pub use builder::{BridgeBuilder, BridgeOptions, FeedbackHandler, GoalHandler, ResultHandler};
pub use operation::GoalCallbacks;
pub use state::AsyncOperationBridge;
pub use transport::{GoalStatus, OperationResult, Transport, TransportError};

pub const SUCCEED: &str = "succeeded";
pub const ABORT: &str = "aborted";
pub const CANCEL: &str = "canceled";
/// Only declared by bridges with a timeout configured.
pub const TIMEOUT: &str = "timeout";
