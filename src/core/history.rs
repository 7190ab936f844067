//! Step trace of a machine run.
//!
//! Each run of a state machine records which state executed, the outcome it
//! returned, and where that outcome was routed. The trace is kept for
//! diagnostics only; nothing in the engine reads it back.
//!
//! Machines loop without bound, so the trace is a window: only the most
//! recent steps up to a limit are retained, while `total_steps` keeps
//! counting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use uuid::Uuid;

/// One executed state and the routing of its outcome.
///
/// # Example
///
/// ```rust
/// use waypoint::core::StepRecord;
/// use chrono::Utc;
///
/// let step = StepRecord {
///     state: "FOO".to_string(),
///     outcome: "outcome1".to_string(),
///     target: "BAR".to_string(),
///     timestamp: Utc::now(),
/// };
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Registered name of the state that executed
    pub state: String,
    /// Outcome it returned
    pub outcome: String,
    /// Next state name, or the machine outcome it resolved to
    pub target: String,
    /// When the outcome was routed
    pub timestamp: DateTime<Utc>,
}

/// Steps retained per run unless a machine is configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// Ordered steps of one machine run, trimmed to the most recent `limit`.
///
/// # Example
///
/// ```rust
/// use waypoint::core::{RunHistory, StepRecord};
/// use chrono::Utc;
///
/// let mut history = RunHistory::new();
/// history.record(StepRecord {
///     state: "FOO".to_string(),
///     outcome: "outcome1".to_string(),
///     target: "BAR".to_string(),
///     timestamp: Utc::now(),
/// });
/// history.record(StepRecord {
///     state: "BAR".to_string(),
///     outcome: "outcome3".to_string(),
///     target: "done".to_string(),
///     timestamp: Utc::now(),
/// });
/// history.finish("done");
///
/// assert_eq!(history.get_path(), vec!["FOO", "BAR"]);
/// assert_eq!(history.outcome(), Some("done"));
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunHistory {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    steps: VecDeque<StepRecord>,
    limit: usize,
    total_steps: usize,
    outcome: Option<String>,
}

impl Default for RunHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl RunHistory {
    /// Start an empty history with a fresh run id, keeping up to
    /// [`DEFAULT_HISTORY_LIMIT`] steps.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Start an empty history that keeps only the last `limit` steps.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            steps: VecDeque::with_capacity(limit.min(64)),
            limit,
            total_steps: 0,
            outcome: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Append a step, dropping the oldest one once the limit is reached.
    pub fn record(&mut self, step: StepRecord) {
        self.total_steps += 1;
        if self.limit == 0 {
            return;
        }
        if self.steps.len() == self.limit {
            self.steps.pop_front();
        }
        self.steps.push_back(step);
    }

    /// Mark the run as finished with the machine outcome it returned.
    pub fn finish(&mut self, outcome: impl Into<String>) {
        self.outcome = Some(outcome.into());
    }

    /// Terminal outcome, if the run finished normally.
    pub fn outcome(&self) -> Option<&str> {
        self.outcome.as_deref()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Steps routed during the run, including those no longer retained.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Whether older steps have been dropped from the window.
    pub fn is_truncated(&self) -> bool {
        self.total_steps > self.steps.len()
    }

    /// Names of executed states in the retained window, in order.
    pub fn get_path(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.state.as_str()).collect()
    }

    /// Number of times the state named `state` executed within the
    /// retained window.
    pub fn count(&self, state: &str) -> usize {
        self.steps.iter().filter(|step| step.state == state).count()
    }

    /// Time between the start of the run and its last routed step.
    pub fn duration(&self) -> Option<Duration> {
        let last = self.steps.back()?;
        last.timestamp
            .signed_duration_since(self.started_at)
            .to_std()
            .ok()
    }

    /// Retained steps, oldest first.
    pub fn steps(&self) -> &VecDeque<StepRecord> {
        &self.steps
    }
}
