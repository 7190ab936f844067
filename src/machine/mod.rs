//! Hierarchical state machine execution.
//!
//! A [`StateMachine`] is built once through
//! [`StateMachineBuilder`](crate::builder::StateMachineBuilder) and can then
//! be executed any number of times, either on its own with
//! [`StateMachine::run`] or as a state nested inside another machine.

mod state_machine;
mod transition;

pub use state_machine::StateMachine;
