//! Shared test transport driven by the test body.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use waypoint::bridge::{
    AsyncOperationBridge, BridgeBuilder, GoalCallbacks, Transport, TransportError, SUCCEED,
};

/// A goal handed to the transport, waiting for the test to drive it.
pub struct Submitted {
    pub goal: u64,
    pub callbacks: GoalCallbacks<ScriptedTransport>,
}

/// Transport whose goals are accepted, fed back and finished by the test.
///
/// Goal: Fibonacci order. Feedback: length of the partial sequence.
/// Output: the sequence.
pub struct ScriptedTransport {
    available: bool,
    refuse: bool,
    availability_requests: Mutex<Vec<Option<Duration>>>,
    submits: AtomicUsize,
    canceled: Mutex<Vec<u64>>,
    goals: UnboundedSender<Submitted>,
    cancels: UnboundedSender<u64>,
}

/// The test's end of a [`ScriptedTransport`].
pub struct Driver {
    goals: UnboundedReceiver<Submitted>,
    cancels: UnboundedReceiver<u64>,
}

impl Driver {
    pub async fn next_goal(&mut self) -> Submitted {
        tokio::time::timeout(Duration::from_secs(5), self.goals.recv())
            .await
            .expect("no goal submitted")
            .expect("transport dropped")
    }

    pub async fn next_cancel(&mut self) -> u64 {
        tokio::time::timeout(Duration::from_secs(5), self.cancels.recv())
            .await
            .expect("no cancel forwarded")
            .expect("transport dropped")
    }
}

impl ScriptedTransport {
    fn with(available: bool, refuse: bool) -> (Arc<Self>, Driver) {
        let (goals_tx, goals) = mpsc::unbounded_channel();
        let (cancels_tx, cancels) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            available,
            refuse,
            availability_requests: Mutex::new(Vec::new()),
            submits: AtomicUsize::new(0),
            canceled: Mutex::new(Vec::new()),
            goals: goals_tx,
            cancels: cancels_tx,
        });
        (transport, Driver { goals, cancels })
    }

    pub fn new() -> (Arc<Self>, Driver) {
        Self::with(true, false)
    }

    pub fn unavailable() -> (Arc<Self>, Driver) {
        Self::with(false, false)
    }

    /// Available, but every submission fails.
    pub fn refusing() -> (Arc<Self>, Driver) {
        Self::with(true, true)
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn canceled(&self) -> Vec<u64> {
        self.canceled.lock().unwrap().clone()
    }

    pub fn availability_requests(&self) -> Vec<Option<Duration>> {
        self.availability_requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    type Goal = u64;
    type Feedback = u64;
    type Output = Vec<u64>;
    type Handle = u64;

    fn endpoint(&self) -> &str {
        "/fibonacci"
    }

    fn wait_for_availability(&self, timeout: Option<Duration>) -> bool {
        self.availability_requests.lock().unwrap().push(timeout);
        self.available
    }

    fn submit(&self, goal: u64, callbacks: GoalCallbacks<Self>) -> Result<(), TransportError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(TransportError::Unavailable(self.endpoint().to_string()));
        }
        let _ = self.goals.send(Submitted { goal, callbacks });
        Ok(())
    }

    fn cancel(&self, handle: &u64) {
        self.canceled.lock().unwrap().push(*handle);
        let _ = self.cancels.send(*handle);
    }
}

pub fn fibonacci(order: u64) -> Vec<u64> {
    let mut sequence = vec![0, 1];
    while sequence.len() < order as usize {
        let next = sequence[sequence.len() - 1] + sequence[sequence.len() - 2];
        sequence.push(next);
    }
    sequence.truncate(order as usize);
    sequence
}

/// Bridge reading `order`, writing `progress` on feedback and `sequence` on
/// success.
pub fn fibonacci_bridge(transport: &Arc<ScriptedTransport>) -> BridgeBuilder<ScriptedTransport> {
    AsyncOperationBridge::builder(Arc::clone(transport))
        .goal(|bb| Ok(bb.get_as::<u64>("order")?))
        .feedback(|bb, partial| {
            bb.set("progress", partial);
            Ok(())
        })
        .result(|bb, sequence| {
            bb.set_as("sequence", &sequence)?;
            Ok(SUCCEED.to_string())
        })
}
