//! Sequential reply aggregation
//!
//! Replies form an insertion-ordered chain: a component observes only the
//! replies recorded strictly before its own position (or the current tail,
//! if it has not replied yet), never later entries and never itself. This
//! keeps the dependency order strictly linear — stage N may depend on
//! stages 1..N-1 and on nothing else. There is deliberately no "all replies
//! so far" view for this protocol.

use crate::component::ComponentId;
use crate::error::{ReactorError, TaskError};
use crate::signal::CompletionSignal;
use crate::task::{TaskHandle, TaskOutcome};
use futures::future::join_all;
use std::sync::Mutex;

#[derive(Clone)]
struct ChainEntry<R> {
    component: ComponentId,
    task: TaskHandle<R>,
}

/// Insertion-ordered reply registry, one per sequential returning event.
///
/// All registry reads and appends go through a single lock owned by the
/// chain; awaiting a predecessor's result happens on a cloned handle outside
/// that lock.
pub struct SequentialChain<R> {
    entries: Mutex<Vec<ChainEntry<R>>>,
    completed: CompletionSignal,
}

impl<R> SequentialChain<R>
where
    R: Clone + Send + Sync + 'static,
{
    /// Create a chain gated by the owning event's completion signal.
    pub fn new(completed: CompletionSignal) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            completed,
        }
    }

    /// Append a reply to the chain.
    ///
    /// Fails with [`ReactorError::ReplyAfterCompletion`] once the event has
    /// finished emitting, and with [`ReactorError::DuplicateReply`] if the
    /// component already holds a position. A late arrival attempts to cancel
    /// a still-running tail entry; cancellation only lands before a task
    /// starts executing, so a tail that is actually running keeps its
    /// result.
    pub fn reply(&self, component: ComponentId, task: TaskHandle<R>) -> Result<(), ReactorError> {
        let mut entries = self.entries.lock().unwrap();
        if self.completed.is_set() {
            return Err(ReactorError::ReplyAfterCompletion(component));
        }
        if entries.iter().any(|entry| entry.component == component) {
            return Err(ReactorError::DuplicateReply(component));
        }
        if let Some(tail) = entries.last() {
            if tail.task.is_running() {
                tail.task.cancel();
            }
        }
        entries.push(ChainEntry { component, task });
        Ok(())
    }

    /// Number of chain entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Resolve the reply of the nearest non-cancelled predecessor of
    /// `caller`, awaiting its task if it is still in flight, or return
    /// `default` if no predecessor exists.
    ///
    /// A caller that has not replied yet — or `None` — is treated as
    /// sitting at the end of the chain. A failed predecessor propagates its
    /// error to the caller.
    pub async fn previous_reply(
        &self,
        caller: Option<ComponentId>,
        default: R,
    ) -> Result<R, TaskError> {
        let predecessor = {
            let entries = self.entries.lock().unwrap();
            let position = caller
                .and_then(|caller| entries.iter().position(|entry| entry.component == caller))
                .unwrap_or(entries.len());
            entries[..position]
                .iter()
                .rev()
                .find(|entry| !entry.task.is_cancelled())
                .map(|entry| entry.task.clone())
        };

        match predecessor {
            Some(task) => task.result().await,
            None => Ok(default),
        }
    }

    /// Wait until the broadcast pass completed and every chain task reached
    /// a terminal state.
    pub async fn wait_for_reply(&self) {
        self.completed.wait().await;
        let handles: Vec<TaskHandle<R>> = {
            let entries = self.entries.lock().unwrap();
            entries.iter().map(|entry| entry.task.clone()).collect()
        };
        join_all(handles.iter().map(|handle| handle.wait())).await;
    }

    /// Non-blocking check over the ordered registry; same semantics as the
    /// parallel protocol.
    pub fn is_replied(&self) -> Result<bool, ReactorError> {
        let mut failures = Vec::new();
        let mut all_done = true;

        for entry in self.entries.lock().unwrap().iter() {
            match entry.task.outcome() {
                Some(TaskOutcome::Failed(e)) => failures.push(e),
                Some(_) => {}
                None => all_done = false,
            }
        }

        if !failures.is_empty() {
            Err(ReactorError::ReplyFailures(failures))
        } else {
            Ok(self.completed.is_set() && all_done)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn chain() -> (SequentialChain<i64>, CompletionSignal) {
        let signal = CompletionSignal::new();
        (SequentialChain::new(signal.clone()), signal)
    }

    #[tokio::test]
    async fn no_predecessor_yields_the_default() {
        let (chain, _signal) = chain();
        assert_eq!(chain.previous_reply(None, 42).await, Ok(42));
        assert!(chain.is_empty());
    }

    #[tokio::test]
    async fn first_entry_sees_the_default() {
        let (chain, _signal) = chain();
        let first = ComponentId::new();
        chain.reply(first, TaskHandle::spawn(async { Ok(10) })).unwrap();
        assert_eq!(chain.previous_reply(Some(first), 1).await, Ok(1));
    }

    #[tokio::test]
    async fn entries_observe_only_strictly_earlier_replies() {
        let (chain, _signal) = chain();
        let first = ComponentId::new();
        let second = ComponentId::new();
        chain.reply(first, TaskHandle::spawn(async { Ok(10) })).unwrap();
        chain.reply(second, TaskHandle::spawn(async { Ok(20) })).unwrap();

        assert_eq!(chain.previous_reply(Some(second), 0).await, Ok(10));
        // An unknown caller is positioned at the end of the chain.
        assert_eq!(chain.previous_reply(Some(ComponentId::new()), 0).await, Ok(20));
        assert_eq!(chain.previous_reply(None, 0).await, Ok(20));
    }

    #[tokio::test]
    async fn cancelled_entries_are_skipped_in_the_backward_scan() {
        let (chain, _signal) = chain();
        let first = ComponentId::new();
        let second = ComponentId::new();
        chain.reply(first, TaskHandle::spawn(async { Ok(10) })).unwrap();
        let cancelled = TaskHandle::spawn(async { Ok(20) });
        cancelled.cancel();
        chain.reply(second, cancelled).unwrap();

        assert_eq!(chain.previous_reply(None, 0).await, Ok(10));
    }

    #[tokio::test]
    async fn duplicate_replies_are_rejected() {
        let (chain, _signal) = chain();
        let component = ComponentId::new();
        chain.reply(component, TaskHandle::spawn(async { Ok(1) })).unwrap();
        let second = chain.reply(component, TaskHandle::spawn(async { Ok(2) }));
        assert!(matches!(second, Err(ReactorError::DuplicateReply(id)) if id == component));
        assert_eq!(chain.len(), 1);
    }

    #[tokio::test]
    async fn replies_after_completion_are_rejected() {
        let (chain, signal) = chain();
        signal.set();
        let late = chain.reply(ComponentId::new(), TaskHandle::spawn(async { Ok(1) }));
        assert!(matches!(late, Err(ReactorError::ReplyAfterCompletion(_))));
    }

    // Documented quirk: a new arrival attempts to cancel the immediately
    // preceding entry's task if it is mid-execution. The cancellation can
    // only land before a task starts, so the running tail survives and its
    // result stays visible to the backward scan.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn a_running_tail_survives_the_preemption_attempt() {
        let (chain, signal) = chain();
        let first = ComponentId::new();

        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let slow = TaskHandle::spawn(async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok(10)
        });
        started_rx.await.unwrap();

        chain.reply(first, slow.clone()).unwrap();
        chain
            .reply(ComponentId::new(), TaskHandle::spawn(async { Ok(20) }))
            .unwrap();

        assert!(!slow.is_cancelled());
        release_tx.send(()).unwrap();
        signal.set();
        chain.wait_for_reply().await;
        assert_eq!(slow.result_timeout(Duration::from_secs(5)).await, Ok(10));
    }
}
