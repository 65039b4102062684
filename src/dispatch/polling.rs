//! Poll loop timing, dispatch states and cancellation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::config::PollingConfig;

/// Lifecycle of one remote computation
///
/// ```text
/// Submitted -> Pending -> Pending ... -> Complete
///                     \-> Failed (poll error, failure status, timeout, cancel)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Submitted,
    Pending,
    Complete,
    Failed,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    pub fn can_transition_to(&self, next: DispatchState) -> bool {
        matches!(
            (self, next),
            (Self::Submitted, Self::Pending)
                | (Self::Pending, Self::Pending)
                | (Self::Pending, Self::Complete)
                | (Self::Pending, Self::Failed)
        )
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::Pending => write!(f, "pending"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Interval, backoff and deadline of a poll loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollingPolicy {
    pub interval: Duration,
    pub max_interval: Duration,
    pub backoff_multiplier: f64,
    pub timeout: Duration,
}

impl PollingPolicy {
    /// Fixed interval, no backoff
    pub fn fixed(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            backoff_multiplier: 1.0,
            timeout,
        }
    }

    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self.max_interval = max_interval.max(self.interval);
        self
    }

    /// Interval to wait after `current` elapsed without completion
    pub fn next_interval(&self, current: Duration) -> Duration {
        if self.backoff_multiplier <= 1.0 {
            return current;
        }
        current
            .mul_f64(self.backoff_multiplier)
            .min(self.max_interval)
    }
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollingPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_interval: config.max_interval().max(config.interval()),
            backoff_multiplier: config.backoff_multiplier.max(1.0),
            timeout: config.timeout(),
        }
    }
}

/// Cooperative cancellation signal for a poll loop
///
/// Clones share state; cancelling any clone wakes every waiter.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_forward_transitions_are_allowed() {
        use DispatchState::*;
        assert!(Submitted.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Complete));
        assert!(Pending.can_transition_to(Failed));

        assert!(!Submitted.can_transition_to(Complete));
        assert!(!Complete.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Pending));
        assert!(Complete.is_terminal() && Failed.is_terminal());
    }

    #[test]
    fn test_default_policy_is_fixed_three_seconds() {
        let policy = PollingPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(3));
        assert_eq!(policy.timeout, Duration::from_secs(600));
        assert_eq!(policy.next_interval(policy.interval), Duration::from_secs(3));
    }

    #[test]
    fn test_backoff_is_bounded() {
        let policy = PollingPolicy::fixed(Duration::from_millis(100), Duration::from_secs(5))
            .with_backoff(2.0, Duration::from_millis(350));

        let second = policy.next_interval(policy.interval);
        let third = policy.next_interval(second);
        let fourth = policy.next_interval(third);

        assert_eq!(second, Duration::from_millis(200));
        assert_eq!(third, Duration::from_millis(350));
        assert_eq!(fourth, Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let handle = CancellationHandle::new();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.cancelled().await })
        };

        tokio::task::yield_now().await;
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_when_already_cancelled() {
        let handle = CancellationHandle::new();
        handle.cancel();
        tokio::time::timeout(Duration::from_millis(100), handle.cancelled())
            .await
            .expect("already cancelled");
    }
}
