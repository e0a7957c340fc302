//! One-shot completion signal for an event's broadcast pass

use std::sync::Arc;
use tokio::sync::watch;

/// Signal set exactly once, after the reactor has visited every registered
/// component for one emission.
///
/// Cloning yields another view of the same signal; every event owns one
/// instance that is torn down with the event. Waiting on a signal whose
/// event is never emitted blocks forever — callers are responsible for only
/// awaiting events that were actually handed to a reactor.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CompletionSignal {
    /// Create a new, unset signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Mark the signal as set. Idempotent; late calls are no-ops.
    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    /// Non-blocking check.
    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal is set.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in this struct, so the channel cannot close while
        // a clone of the signal is being awaited.
        let _ = rx.wait_for(|set| *set).await;
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn starts_unset_and_latches_once_set() {
        let signal = CompletionSignal::new();
        assert!(!signal.is_set());

        signal.set();
        assert!(signal.is_set());
        signal.wait().await;

        // Setting again is a no-op.
        signal.set();
        assert!(signal.is_set());
    }

    #[tokio::test]
    async fn wait_blocks_until_set() {
        let signal = CompletionSignal::new();

        let pending = tokio::time::timeout(Duration::from_millis(20), signal.wait()).await;
        assert!(pending.is_err());

        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.wait().await });
        signal.set();
        task.await.unwrap();
    }
}
