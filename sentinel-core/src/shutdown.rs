//! Process-wide cancellation signal
//!
//! One [`ShutdownTrigger`] is created at startup; every component holds a
//! [`Shutdown`] listener and checks it at each suspension point. Triggering
//! is idempotent and cannot be undone. Dropping every trigger counts as a
//! shutdown, so listeners never wait forever on an orphaned signal.

use std::sync::Arc;
use tokio::sync::watch;

/// Create a linked trigger/listener pair
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx: Arc::new(tx) }, Shutdown { rx })
}

/// Sending half of the shutdown signal
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    /// Signal shutdown to every listener
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Create a new listener
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving half of the shutdown signal
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Non-blocking check, usable from plain threads
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait until shutdown is signalled
    pub async fn triggered(&mut self) {
        // An Err here means every trigger was dropped
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_initial_state() {
        let (trigger, shutdown) = channel();
        assert!(!trigger.is_triggered());
        assert!(!shutdown.is_triggered());
    }

    #[test]
    fn test_trigger_reaches_all_listeners() {
        let (trigger, first) = channel();
        let second = first.clone();
        let third = trigger.subscribe();

        trigger.trigger();

        assert!(first.is_triggered());
        assert!(second.is_triggered());
        assert!(third.is_triggered());
    }

    #[test]
    fn test_trigger_is_idempotent() {
        let (trigger, shutdown) = channel();
        trigger.trigger();
        trigger.trigger();
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_dropped_trigger_counts_as_shutdown() {
        let (trigger, shutdown) = channel();
        drop(trigger);
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_triggered_wakes_waiter() {
        let (trigger, mut shutdown) = channel();

        let waiter = tokio::spawn(async move {
            shutdown.triggered().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_triggered_returns_immediately_when_already_set() {
        let (trigger, mut shutdown) = channel();
        trigger.trigger();
        tokio::time::timeout(Duration::from_millis(100), shutdown.triggered())
            .await
            .unwrap();
    }
}
