//! Asynchronous task execution model
//!
//! Reply callbacks are ordinary units of work submitted to the shared tokio
//! scheduler. Each submission returns a [`TaskHandle`] that can be polled,
//! awaited (with or without a timeout), and cancelled. Cancellation is only
//! effective while the work has not yet started running; a running task
//! cannot be interrupted, only its result ignored.

use crate::error::TaskError;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;

/// Terminal state of a task.
#[derive(Debug, Clone)]
pub enum TaskOutcome<R> {
    /// The work ran to completion.
    Completed(R),
    /// The work returned an error (or panicked).
    Failed(TaskError),
    /// The task was cancelled before it started running.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Running,
    Finished,
    Cancelled,
}

struct TaskShared<R> {
    outcome: watch::Sender<Option<TaskOutcome<R>>>,
    phase: Mutex<Phase>,
    join: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a unit of work submitted with [`TaskHandle::spawn`] or
/// `Reactor::run_async`.
///
/// Handles are cheap to clone; every clone observes the same task.
pub struct TaskHandle<R> {
    shared: Arc<TaskShared<R>>,
}

impl<R> Clone for TaskHandle<R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<R> fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("phase", &*self.shared.phase.lock().unwrap())
            .finish()
    }
}

impl<R> TaskHandle<R>
where
    R: Clone + Send + Sync + 'static,
{
    /// Submit a unit of work to the shared scheduler.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = Result<R, TaskError>> + Send + 'static,
    {
        let (outcome, _rx) = watch::channel(None);
        let shared = Arc::new(TaskShared {
            outcome,
            phase: Mutex::new(Phase::Pending),
            join: Mutex::new(None),
        });

        let task_shared = shared.clone();
        let join = tokio::spawn(async move {
            {
                let mut phase = task_shared.phase.lock().unwrap();
                if *phase == Phase::Cancelled {
                    return;
                }
                *phase = Phase::Running;
            }

            let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(value)) => TaskOutcome::Completed(value),
                Ok(Err(e)) => TaskOutcome::Failed(e),
                Err(_) => {
                    error!("Task panicked while running");
                    TaskOutcome::Failed(TaskError::failed("task panicked"))
                }
            };

            *task_shared.phase.lock().unwrap() = Phase::Finished;
            let _ = task_shared.outcome.send(Some(outcome));
        });
        *shared.join.lock().unwrap() = Some(join);

        Self { shared }
    }

    /// Non-blocking completion check. True once the task reached any
    /// terminal state (completed, failed, or cancelled).
    pub fn is_finished(&self) -> bool {
        self.shared.outcome.borrow().is_some()
    }

    /// True while the work is actually executing.
    pub fn is_running(&self) -> bool {
        *self.shared.phase.lock().unwrap() == Phase::Running
    }

    /// True if the task was cancelled before it started.
    pub fn is_cancelled(&self) -> bool {
        matches!(&*self.shared.outcome.borrow(), Some(TaskOutcome::Cancelled))
    }

    /// Snapshot of the terminal state, if any.
    pub fn outcome(&self) -> Option<TaskOutcome<R>> {
        self.shared.outcome.borrow().clone()
    }

    /// The task's failure, if it failed.
    pub fn failure(&self) -> Option<TaskError> {
        match &*self.shared.outcome.borrow() {
            Some(TaskOutcome::Failed(e)) => Some(e.clone()),
            _ => None,
        }
    }

    /// Cancel the task. Returns true if the cancellation landed, which it
    /// only does while the work has not started running yet.
    pub fn cancel(&self) -> bool {
        {
            let mut phase = self.shared.phase.lock().unwrap();
            if *phase != Phase::Pending {
                return false;
            }
            *phase = Phase::Cancelled;
        }
        if let Some(join) = self.shared.join.lock().unwrap().take() {
            join.abort();
        }
        let _ = self.shared.outcome.send(Some(TaskOutcome::Cancelled));
        true
    }

    /// Wait for the task to reach a terminal state.
    pub async fn wait(&self) -> TaskOutcome<R> {
        let mut rx = self.shared.outcome.subscribe();
        // The sender is owned by the shared state, so the channel stays open
        // for as long as this handle exists.
        match rx.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => outcome.clone().unwrap_or(TaskOutcome::Cancelled),
            Err(_) => TaskOutcome::Cancelled,
        }
    }

    /// Wait for the task and return its result, mapping cancellation to
    /// [`TaskError::Cancelled`].
    pub async fn result(&self) -> Result<R, TaskError> {
        match self.wait().await {
            TaskOutcome::Completed(value) => Ok(value),
            TaskOutcome::Failed(e) => Err(e),
            TaskOutcome::Cancelled => Err(TaskError::Cancelled),
        }
    }

    /// Like [`TaskHandle::result`], but gives up after `timeout`.
    pub async fn result_timeout(&self, timeout: Duration) -> Result<R, TaskError> {
        match tokio::time::timeout(timeout, self.result()).await {
            Ok(result) => result,
            Err(_) => Err(TaskError::Timeout(timeout)),
        }
    }
}
