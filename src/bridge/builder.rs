//! Builder and options for [`AsyncOperationBridge`].

use super::state::AsyncOperationBridge;
use super::transport::Transport;
use super::{ABORT, CANCEL, SUCCEED, TIMEOUT};
use crate::builder::ConfigurationError;
use crate::core::{Blackboard, BoxError, Outcomes};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Builds the goal sent to the transport.
pub type GoalHandler<T> =
    Box<dyn Fn(&mut Blackboard) -> Result<<T as Transport>::Goal, BoxError> + Send + Sync>;

/// Maps the output of a succeeded goal to an outcome.
pub type ResultHandler<T> =
    Box<dyn Fn(&mut Blackboard, <T as Transport>::Output) -> Result<String, BoxError> + Send + Sync>;

/// Consumes one feedback message.
pub type FeedbackHandler<T> =
    Box<dyn Fn(&mut Blackboard, <T as Transport>::Feedback) -> Result<(), BoxError> + Send + Sync>;

/// Timing options for a bridge. Both default to `None`.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use waypoint::bridge::BridgeOptions;
///
/// let options: BridgeOptions =
///     serde_json::from_str(r#"{ "availability_timeout": { "secs": 2, "nanos": 0 } }"#).unwrap();
///
/// assert_eq!(options.availability_timeout, Some(Duration::from_secs(2)));
/// assert_eq!(options.operation_timeout, None);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// How long to wait for the endpoint before returning `TIMEOUT`.
    /// `None` waits indefinitely.
    pub availability_timeout: Option<Duration>,

    /// Deadline for an accepted goal. When it passes the goal is canceled
    /// and the bridge returns `TIMEOUT` once the transport confirms, unless
    /// a cancel was already requested, which still ends in `CANCEL`.
    /// `None`, or a duration too large to add to the clock, waits for the
    /// transport indefinitely.
    pub operation_timeout: Option<Duration>,
}

impl BridgeOptions {
    pub fn has_timeout(&self) -> bool {
        self.availability_timeout.is_some() || self.operation_timeout.is_some()
    }
}

/// Builder for [`AsyncOperationBridge`].
///
/// A goal handler is required; everything else is optional.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use waypoint::bridge::{
///     AsyncOperationBridge, GoalCallbacks, OperationResult, Transport, TransportError, SUCCEED,
/// };
/// use waypoint::core::{invoke, Blackboard};
///
/// /// Answers every goal with its first `n` squares before `submit` returns.
/// struct Squares;
///
/// impl Transport for Squares {
///     type Goal = u32;
///     type Feedback = ();
///     type Output = Vec<u32>;
///     type Handle = ();
///
///     fn endpoint(&self) -> &str {
///         "squares"
///     }
///
///     fn wait_for_availability(&self, _timeout: Option<Duration>) -> bool {
///         true
///     }
///
///     fn submit(&self, n: u32, callbacks: GoalCallbacks<Self>) -> Result<(), TransportError> {
///         callbacks.accepted(());
///         callbacks.finished(OperationResult::succeeded((1..=n).map(|i| i * i).collect()));
///         Ok(())
///     }
///
///     fn cancel(&self, _handle: &()) {}
/// }
///
/// let bridge = AsyncOperationBridge::builder(Arc::new(Squares))
///     .goal(|bb| Ok(bb.get_as::<u32>("order")?))
///     .result(|bb, squares: Vec<u32>| {
///         bb.set_as("squares", &squares)?;
///         Ok(SUCCEED.to_string())
///     })
///     .availability_timeout(Duration::from_secs(2))
///     .build()
///     .unwrap();
///
/// let mut blackboard = Blackboard::new();
/// blackboard.set("order", 3);
/// assert_eq!(invoke(&bridge, &mut blackboard).unwrap(), SUCCEED);
/// assert_eq!(blackboard.get_as::<Vec<u32>>("squares").unwrap(), vec![1, 4, 9]);
/// ```
pub struct BridgeBuilder<T: Transport> {
    transport: Arc<T>,
    goal: Option<GoalHandler<T>>,
    result: Option<ResultHandler<T>>,
    feedback: Option<FeedbackHandler<T>>,
    extra_outcomes: Vec<String>,
    options: BridgeOptions,
}

impl<T: Transport> BridgeBuilder<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            goal: None,
            result: None,
            feedback: None,
            extra_outcomes: Vec::new(),
            options: BridgeOptions::default(),
        }
    }

    pub fn goal<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Blackboard) -> Result<T::Goal, BoxError> + Send + Sync + 'static,
    {
        self.goal = Some(Box::new(handler));
        self
    }

    /// Map a succeeded goal's output to an outcome. Without one, success
    /// maps to `SUCCEED`.
    pub fn result<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Blackboard, T::Output) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        self.result = Some(Box::new(handler));
        self
    }

    pub fn feedback<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Blackboard, T::Feedback) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.feedback = Some(Box::new(handler));
        self
    }

    /// Extra outcomes the result handler may return.
    pub fn outcomes<I, S>(mut self, outcomes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_outcomes.extend(outcomes.into_iter().map(Into::into));
        self
    }

    pub fn availability_timeout(mut self, timeout: Duration) -> Self {
        self.options.availability_timeout = Some(timeout);
        self
    }

    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.options.operation_timeout = Some(timeout);
        self
    }

    /// Replace all timing options at once.
    pub fn options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<AsyncOperationBridge<T>, ConfigurationError> {
        let goal = self.goal.ok_or(ConfigurationError::MissingGoalHandler)?;

        let mut outcomes = vec![SUCCEED.to_string(), ABORT.to_string(), CANCEL.to_string()];
        if self.options.has_timeout() {
            outcomes.push(TIMEOUT.to_string());
        }
        outcomes.extend(self.extra_outcomes);

        Ok(AsyncOperationBridge::from_parts(
            self.transport,
            Outcomes::new(outcomes)?,
            self.options,
            goal,
            self.result,
            self.feedback,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::operation::GoalCallbacks;
    use crate::bridge::transport::TransportError;
    use crate::core::State;

    struct Idle;

    impl Transport for Idle {
        type Goal = ();
        type Feedback = ();
        type Output = ();
        type Handle = ();

        fn endpoint(&self) -> &str {
            "idle"
        }

        fn wait_for_availability(&self, _timeout: Option<Duration>) -> bool {
            false
        }

        fn submit(&self, _goal: (), _callbacks: GoalCallbacks<Self>) -> Result<(), TransportError> {
            Ok(())
        }

        fn cancel(&self, _handle: &()) {}
    }

    #[test]
    fn goal_handler_is_required() {
        let result = BridgeBuilder::new(Arc::new(Idle)).build();
        assert!(matches!(result, Err(ConfigurationError::MissingGoalHandler)));
    }

    #[test]
    fn basic_outcomes_without_timeout() {
        let bridge = BridgeBuilder::new(Arc::new(Idle))
            .goal(|_| Ok(()))
            .build()
            .unwrap();

        assert_eq!(
            bridge.outcomes().to_vec(),
            vec![ABORT.to_string(), CANCEL.to_string(), SUCCEED.to_string()]
        );
    }

    #[test]
    fn timeout_outcome_follows_options() {
        let bridge = BridgeBuilder::new(Arc::new(Idle))
            .goal(|_| Ok(()))
            .operation_timeout(Duration::from_secs(1))
            .outcomes(["partial"])
            .build()
            .unwrap();

        assert!(bridge.outcomes().contains(TIMEOUT));
        assert!(bridge.outcomes().contains("partial"));
        assert_eq!(bridge.outcomes().len(), 5);
    }

    #[test]
    fn empty_extra_outcome_is_rejected() {
        let result = BridgeBuilder::new(Arc::new(Idle))
            .goal(|_| Ok(()))
            .outcomes([""])
            .build();

        assert!(matches!(result, Err(ConfigurationError::EmptyOutcome)));
    }

    #[test]
    fn options_round_trip_through_json() {
        let options = BridgeOptions {
            availability_timeout: Some(Duration::from_millis(250)),
            operation_timeout: None,
        };

        let json = serde_json::to_string(&options).unwrap();
        let back: BridgeOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
        assert!(back.has_timeout());

        let empty: BridgeOptions = serde_json::from_str("{}").unwrap();
        assert!(!empty.has_timeout());
    }
}
