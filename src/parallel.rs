//! Parallel reply aggregation
//!
//! Replies are independent: any number of components may answer one event,
//! each at most once, and the emitter collects the results as an unordered
//! component-to-value mapping once everything has resolved.

use crate::component::ComponentId;
use crate::error::ReactorError;
use crate::signal::CompletionSignal;
use crate::task::{TaskHandle, TaskOutcome};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use std::collections::HashMap;

/// Unordered write-once reply registry, one per parallel returning event.
///
/// Embed one in an event type alongside its [`EventMeta`] and hand it the
/// meta's completion signal:
///
/// ```rust,ignore
/// struct IngredientsEvent {
///     meta: EventMeta,
///     replies: ParallelReplies<String>,
/// }
///
/// impl IngredientsEvent {
///     fn new() -> Self {
///         let meta = EventMeta::new(None);
///         let replies = ParallelReplies::new(meta.completion().clone());
///         Self { meta, replies }
///     }
/// }
/// ```
///
/// [`EventMeta`]: crate::event::EventMeta
pub struct ParallelReplies<R> {
    replies: DashMap<ComponentId, TaskHandle<R>>,
    completed: CompletionSignal,
}

impl<R> ParallelReplies<R>
where
    R: Clone + Send + Sync + 'static,
{
    /// Create a registry gated by the owning event's completion signal.
    pub fn new(completed: CompletionSignal) -> Self {
        Self {
            replies: DashMap::new(),
            completed,
        }
    }

    /// Record a reply. Write-once per component: a second reply from the
    /// same component fails with [`ReactorError::DuplicateReply`].
    ///
    /// Recording after the completion signal fired is allowed — the signal
    /// gates the broadcast pass, not late registration of work submitted
    /// during it.
    pub fn reply(&self, component: ComponentId, task: TaskHandle<R>) -> Result<(), ReactorError> {
        match self.replies.entry(component) {
            Entry::Occupied(_) => Err(ReactorError::DuplicateReply(component)),
            Entry::Vacant(slot) => {
                slot.insert(task);
                Ok(())
            }
        }
    }

    /// Number of recorded replies.
    pub fn reply_count(&self) -> usize {
        self.replies.len()
    }

    /// Wait until the broadcast pass completed and every recorded task
    /// reached a terminal state (completed, failed, or cancelled).
    pub async fn wait_for_reply(&self) {
        self.completed.wait().await;
        let handles: Vec<TaskHandle<R>> =
            self.replies.iter().map(|entry| entry.value().clone()).collect();
        join_all(handles.iter().map(|handle| handle.wait())).await;
    }

    /// Non-blocking check. `Ok(true)` once the signal is set and all tasks
    /// are terminal with no failures; an aggregate error carrying every
    /// failure collected so far if any task failed.
    pub fn is_replied(&self) -> Result<bool, ReactorError> {
        let mut failures = Vec::new();
        let mut all_done = true;

        for entry in self.replies.iter() {
            match entry.value().outcome() {
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

    /// Collect the replies as a component-to-result mapping. Cancelled tasks
    /// are omitted; an unfinished task fails with
    /// [`ReactorError::ReplyPending`]; failed tasks surface as the same
    /// aggregate error as [`ParallelReplies::is_replied`].
    pub fn get_reply(&self) -> Result<HashMap<ComponentId, R>, ReactorError> {
        let mut results = HashMap::new();
        let mut failures = Vec::new();

        for entry in self.replies.iter() {
            match entry.value().outcome() {
                None => return Err(ReactorError::ReplyPending),
                Some(TaskOutcome::Completed(value)) => {
                    results.insert(*entry.key(), value);
                }
                Some(TaskOutcome::Failed(e)) => failures.push(e),
                Some(TaskOutcome::Cancelled) => {}
            }
        }

        if !failures.is_empty() {
            Err(ReactorError::ReplyFailures(failures))
        } else {
            Ok(results)
        }
    }
}
