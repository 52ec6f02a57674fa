//! Per-stage work queue with delayed retry.
//!
//! Each stage engine consumes one bounded channel of abnormal keys. Producers
//! (the phase router, the engine itself on retry) push through a cloneable
//! [`StageQueue`]. Pushes never block: a saturated or closed channel is an
//! error the caller logs, never a reason to wait.
//!
//! ```text
//!   PhaseRouter ──enqueue──►┐
//!                           ├──► mpsc(capacity) ──► StageEngine
//!   StageEngine ─requeue───►┤
//!        └──enqueue_after──►┘  (timer task, default 30s)
//! ```
//!
//! Queued keys may be duplicated or stale; the engine re-fetches the live
//! object before acting on one.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{trace, warn};

use crate::api::ObjectKey;

/// Default capacity of a stage channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Default delay before a delayed retry is pushed.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Errors returned when a key cannot be queued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("{queue} queue is full, dropping {key}")]
    Full { queue: &'static str, key: ObjectKey },

    #[error("{queue} queue is closed, dropping {key}")]
    Closed { queue: &'static str, key: ObjectKey },
}

/// Producer side of a stage's work queue.
#[derive(Debug, Clone)]
pub struct StageQueue {
    name: &'static str,
    tx: mpsc::Sender<ObjectKey>,
    retry_delay: Duration,
}

impl StageQueue {
    /// Creates a queue and the receiver its engine consumes.
    pub fn new(
        name: &'static str,
        capacity: usize,
        retry_delay: Duration,
    ) -> (Self, mpsc::Receiver<ObjectKey>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Self {
            name,
            tx,
            retry_delay,
        };
        (queue, rx)
    }

    /// Name of the stage the queue feeds.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Delay used by [`requeue_after_delay`](Self::requeue_after_delay).
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Pushes a key now without waiting for capacity.
    pub fn enqueue(&self, key: ObjectKey) -> Result<(), QueueError> {
        match self.tx.try_send(key) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(key)) => Err(QueueError::Full {
                queue: self.name,
                key,
            }),
            Err(TrySendError::Closed(key)) => Err(QueueError::Closed {
                queue: self.name,
                key,
            }),
        }
    }

    /// Pushes a key now, logging a failure instead of returning it.
    pub fn requeue(&self, key: ObjectKey) {
        if let Err(e) = self.enqueue(key) {
            warn!(error = %e, "Failed to requeue abnormal");
        }
    }

    /// Schedules a push of `key` after `delay`.
    ///
    /// The push happens on a spawned timer task; a failure at that point is
    /// only logged.
    pub fn enqueue_after(&self, key: ObjectKey, delay: Duration) {
        let queue = self.clone();
        trace!(queue = self.name, abnormal = %key, delay_secs = delay.as_secs(), "Scheduling retry");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.requeue(key);
        });
    }

    /// Schedules a push of `key` after the configured retry delay.
    pub fn requeue_after_delay(&self, key: ObjectKey) {
        self.enqueue_after(key, self.retry_delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("default", name)
    }

    #[tokio::test]
    async fn test_enqueue_is_fifo() {
        let (queue, mut rx) = StageQueue::new("test", 8, DEFAULT_RETRY_DELAY);

        queue.enqueue(key("a")).unwrap();
        queue.enqueue(key("b")).unwrap();
        queue.enqueue(key("a")).unwrap();

        assert_eq!(rx.recv().await, Some(key("a")));
        assert_eq!(rx.recv().await, Some(key("b")));
        assert_eq!(rx.recv().await, Some(key("a")));
    }

    #[tokio::test]
    async fn test_enqueue_on_full_channel_fails_without_blocking() {
        let (queue, _rx) = StageQueue::new("test", 1, DEFAULT_RETRY_DELAY);
        queue.enqueue(key("a")).unwrap();

        let err = queue.enqueue(key("b")).unwrap_err();
        assert_eq!(
            err,
            QueueError::Full {
                queue: "test",
                key: key("b")
            }
        );
    }

    #[tokio::test]
    async fn test_enqueue_on_closed_channel_fails() {
        let (queue, rx) = StageQueue::new("test", 1, DEFAULT_RETRY_DELAY);
        drop(rx);

        assert!(matches!(
            queue.enqueue(key("a")),
            Err(QueueError::Closed { .. })
        ));
        // Logged only.
        queue.requeue(key("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_after_waits_for_delay() {
        let (queue, mut rx) = StageQueue::new("test", 8, Duration::from_secs(30));

        queue.requeue_after_delay(key("a"));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rx.try_recv().ok(), Some(key("a")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_after_with_explicit_delay() {
        let (queue, mut rx) = StageQueue::new("test", 8, DEFAULT_RETRY_DELAY);

        queue.enqueue_after(key("late"), Duration::from_secs(1));
        queue.enqueue(key("now")).unwrap();

        assert_eq!(rx.recv().await, Some(key("now")));
        assert_eq!(rx.recv().await, Some(key("late")));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (queue, _rx) = StageQueue::new("test", 0, DEFAULT_RETRY_DELAY);
        assert_eq!(queue.name(), "test");
        assert_eq!(queue.retry_delay(), DEFAULT_RETRY_DELAY);
    }
}
