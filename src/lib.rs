//! Waypoint: hierarchical state machines for sequential behaviors
//!
//! A machine is a set of named states wired together by their outcomes.
//! Running it executes one state at a time on the caller's thread, routes
//! each returned outcome through the transition table and stops when an
//! outcome maps to one of the machine's own outcomes. Machines are states
//! themselves, so they nest.
//!
//! # Core Concepts
//!
//! - **Blackboard**: key/value store shared by every state of one run
//! - **State**: capability trait with declared outcomes and cooperative
//!   cancellation
//! - **StateMachine**: composite state, built and validated once
//! - **AsyncOperationBridge**: state that blocks on a callback-driven remote
//!   operation
//!
//! Logging goes through `tracing`; install any subscriber to receive it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use waypoint::builder::StateMachineBuilder;
//! use waypoint::core::PlainState;
//! use waypoint::transitions;
//!
//! let counter = AtomicUsize::new(0);
//! let foo = PlainState::new(["outcome1", "outcome2"], move |blackboard, _| {
//!     let calls = counter.fetch_add(1, Ordering::SeqCst);
//!     if calls < 3 {
//!         blackboard.set("foo_str", format!("Counter: {calls}"));
//!         Ok("outcome1".to_string())
//!     } else {
//!         Ok("outcome2".to_string())
//!     }
//! })
//! .unwrap();
//!
//! let bar = PlainState::new(["outcome3"], |blackboard, _| {
//!     let _message: String = blackboard.get_as("foo_str")?;
//!     Ok("outcome3".to_string())
//! })
//! .unwrap();
//!
//! let machine = StateMachineBuilder::new("demo")
//!     .outcomes(["outcome4"])
//!     .add_state("FOO", foo, transitions! { "outcome1" => "BAR", "outcome2" => "outcome4" })
//!     .unwrap()
//!     .add_state("BAR", bar, transitions! { "outcome3" => "FOO" })
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let (outcome, _blackboard) = machine.run().unwrap();
//! assert_eq!(outcome, "outcome4");
//! assert_eq!(machine.last_run().unwrap().count("FOO"), 4);
//! ```

pub mod bridge;
pub mod builder;
pub mod core;
pub mod machine;
pub mod telemetry;

// Re-export commonly used types
pub use bridge::{AsyncOperationBridge, BridgeBuilder, BridgeOptions, Transport};
pub use builder::{ConfigurationError, StateMachineBuilder};
pub use self::core::{Blackboard, CancellationToken, ExecutionError, Outcomes, PlainState, State};
pub use machine::StateMachine;
