//! Composite state that routes outcomes between registered states.

use crate::builder::machine::Registration;
use crate::builder::StateMachineBuilder;
use crate::core::{
    check_outcome, invoke, Blackboard, ExecutionError, Outcomes, RunHistory, State, StateFlags,
    StepRecord,
};
use crate::machine::transition::{resolve, Target};
use crate::telemetry::{ActiveStateChanged, MachineStructure, PublishError, Publisher, StateNode};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

struct Node {
    name: String,
    state: Box<dyn State>,
    transitions: BTreeMap<String, String>,
    routes: HashMap<String, Target>,
}

/// Hierarchical state machine.
///
/// Owns a registry of named states and their transition tables. Executing
/// the machine runs its start state, routes the returned outcome, and keeps
/// going until an outcome resolves to one of the machine's own outcomes,
/// which is returned to the caller. Because `StateMachine` implements
/// [`State`], a machine can be registered as a state of another machine.
///
/// Cycles are legal; the loop has no iteration bound and relies on the
/// states themselves to eventually route to a machine outcome.
///
/// Machines are built with [`StateMachineBuilder`], which validates the
/// wiring, so an existing `StateMachine` is always runnable.
pub struct StateMachine {
    name: String,
    outcomes: Outcomes,
    flags: StateFlags,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    start: usize,
    current: Mutex<Option<usize>>,
    last_run: Mutex<Option<RunHistory>>,
    history_limit: usize,
    publisher: Option<Arc<dyn Publisher>>,
}

/// Clears the active-state pointer when a run ends, including on error.
struct ClearCurrent<'a>(&'a Mutex<Option<usize>>);

impl Drop for ClearCurrent<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl StateMachine {
    pub(crate) fn from_parts(
        name: String,
        outcomes: Outcomes,
        registrations: Vec<Registration>,
        start: &str,
        history_limit: usize,
        publisher: Option<Arc<dyn Publisher>>,
    ) -> Self {
        let index: HashMap<String, usize> = registrations
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();

        let nodes = registrations
            .into_iter()
            .map(|r| Node {
                routes: resolve(&r.transitions, &index, &outcomes),
                name: r.name,
                state: r.state,
                transitions: r.transitions,
            })
            .collect();

        let start = index.get(start).copied().unwrap_or(0);

        Self {
            name,
            outcomes,
            flags: StateFlags::new(),
            nodes,
            index,
            start,
            current: Mutex::new(None),
            last_run: Mutex::new(None),
            history_limit,
            publisher,
        }
    }

    /// Start building a machine named `name`.
    pub fn builder(name: impl Into<String>) -> StateMachineBuilder {
        StateMachineBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_state(&self) -> &str {
        &self.nodes[self.start].name
    }

    /// Name of the state currently executing, if the machine is running.
    pub fn current_state(&self) -> Option<String> {
        let current = *self.lock_current();
        current.map(|i| self.nodes[i].name.clone())
    }

    /// Registered state names, in registration order.
    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.name.as_str())
    }

    pub fn state(&self, name: &str) -> Option<&dyn State> {
        self.index.get(name).map(|&i| self.nodes[i].state.as_ref())
    }

    /// Transition table of the state named `name`.
    pub fn transitions_of(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.index.get(name).map(|&i| &self.nodes[i].transitions)
    }

    /// Step trace of the most recent run, finished or failed. Only the last
    /// steps up to the configured history limit are kept.
    pub fn last_run(&self) -> Option<RunHistory> {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run the machine from its start state on a fresh blackboard.
    ///
    /// Returns the terminal outcome together with the final blackboard.
    pub fn run(&self) -> Result<(String, Blackboard), ExecutionError> {
        let mut blackboard = Blackboard::new();
        let outcome = invoke(self, &mut blackboard)?;
        Ok((outcome, blackboard))
    }

    /// Structure of this machine and every nested machine.
    pub fn snapshot(&self) -> MachineStructure {
        MachineStructure {
            name: self.name.clone(),
            outcomes: self.outcomes.to_vec(),
            start_state: self.start_state().to_string(),
            states: self
                .nodes
                .iter()
                .map(|node| StateNode {
                    name: node.name.clone(),
                    kind: node.state.kind().to_string(),
                    outcomes: node.state.outcomes().to_vec(),
                    transitions: node.transitions.clone(),
                    machine: node.state.structure().map(Box::new),
                })
                .collect(),
        }
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<usize>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish<F>(&self, publish: F)
    where
        F: FnOnce(&dyn Publisher) -> Result<(), PublishError>,
    {
        let Some(publisher) = &self.publisher else {
            return;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| publish(publisher.as_ref()))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(machine = %self.name, error = %err, "telemetry publish failed"),
            Err(_) => warn!(machine = %self.name, "telemetry publisher panicked"),
        }
    }

    fn publish_active(&self, run_id: Uuid, active: Option<&str>) {
        if self.publisher.is_none() {
            return;
        }
        let event = ActiveStateChanged {
            run_id,
            machine: self.name.clone(),
            active: active.map(str::to_string),
            timestamp: Utc::now(),
        };
        self.publish(|p| p.publish_active(&event));
    }

    fn run_states(
        &self,
        blackboard: &mut Blackboard,
        history: &mut RunHistory,
    ) -> Result<String, ExecutionError> {
        let _clear = ClearCurrent(&self.current);
        let mut index = self.start;

        loop {
            let node = &self.nodes[index];

            let outcome = {
                // A cancellation that lands between two states is forwarded
                // here; one that lands later finds the pointer set.
                let _active = {
                    let mut current = self.lock_current();
                    *current = Some(index);
                    let active = node.state.flags().enter(Some(&self.flags.token()));
                    if self.flags.is_canceled() {
                        node.state.cancel();
                    }
                    active
                };
                self.publish_active(history.run_id(), Some(&node.name));
                node.state.execute(blackboard)?
            };

            let outcome = check_outcome(&node.name, node.state.as_ref(), outcome)?;
            let target = node
                .routes
                .get(&outcome)
                .ok_or_else(|| ExecutionError::Unroutable {
                    state: node.name.clone(),
                    outcome: outcome.clone(),
                })?;

            let label = match target {
                Target::State(next) => &self.nodes[*next].name,
                Target::Outcome(outcome) => outcome,
            };
            info!("{}: {} --> {}", node.name, outcome, label);

            history.record(StepRecord {
                state: node.name.clone(),
                outcome,
                target: label.clone(),
                timestamp: Utc::now(),
            });

            match target {
                Target::Outcome(outcome) => {
                    history.finish(outcome.clone());
                    return Ok(outcome.clone());
                }
                Target::State(next) => index = *next,
            }
        }
    }
}

impl State for StateMachine {
    fn outcomes(&self) -> &Outcomes {
        &self.outcomes
    }

    fn flags(&self) -> &StateFlags {
        &self.flags
    }

    fn execute(&self, blackboard: &mut Blackboard) -> Result<String, ExecutionError> {
        let mut history = RunHistory::with_limit(self.history_limit);
        let run_id = history.run_id();
        let span = info_span!("state_machine", machine = %self.name, %run_id);
        let _span = span.enter();

        if self.publisher.is_some() {
            let structure = self.snapshot();
            self.publish(|p| p.publish_structure(run_id, &structure));
        }

        let result = self.run_states(blackboard, &mut history);
        self.publish_active(run_id, None);

        if let Err(err) = &result {
            error!(error = %err, "state machine execution failed");
        }
        *self.last_run.lock().unwrap_or_else(PoisonError::into_inner) = Some(history);
        result
    }

    /// Flag the machine as canceled and forward the request to the active
    /// state, if any.
    fn cancel(&self) {
        self.flags.request_cancel();

        let current = self.lock_current();
        if let Some(index) = *current {
            let node = &self.nodes[index];
            info!(machine = %self.name, state = %node.name, "canceling active state");
            node.state.cancel();
        }
    }

    fn kind(&self) -> &str {
        "StateMachine"
    }

    fn structure(&self) -> Option<MachineStructure> {
        Some(self.snapshot())
    }
}

impl fmt::Display for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "State Machine '{}'", self.name)?;
        for node in &self.nodes {
            writeln!(f, "{} ({})", node.name, node.state.kind())?;
            for (outcome, target) in &node.transitions {
                writeln!(f, "\t{outcome} --> {target}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("outcomes", &self.outcomes)
            .field("states", &self.state_names().collect::<Vec<_>>())
            .field("start", &self.start_state())
            .finish_non_exhaustive()
    }
}
