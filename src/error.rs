//! Error types for the reflex event bus

use crate::component::ComponentId;
use std::time::Duration;
use thiserror::Error;

/// Terminal error of a single reply task.
///
/// Stored inside the task's outcome and handed to every waiter, so it is
/// `Clone` and carries its failure payload as a message rather than a boxed
/// source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task failed: {0}")]
    Failed(String),

    #[error("task was cancelled before it started running")]
    Cancelled,

    #[error("task timed out after {0:?}")]
    Timeout(Duration),
}

impl TaskError {
    /// Build a `Failed` error from any displayable payload.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Errors surfaced by the reactor and the reply-aggregation protocols.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// A component tried to register a second reply on the same event.
    #[error("component {0} already replied to this event")]
    DuplicateReply(ComponentId),

    /// A sequential reply arrived after the event finished emitting.
    #[error("component {0} tried to reply after the event finished emitting")]
    ReplyAfterCompletion(ComponentId),

    /// A reply task was still running when results were collected.
    #[error("a reply task has not finished while collecting results")]
    ReplyPending,

    /// One or more reply tasks failed. Every collected failure is carried,
    /// not just the first.
    #[error("{} reply task(s) failed", .0.len())]
    ReplyFailures(Vec<TaskError>),

    /// An injection query matched nothing.
    #[error("no injectable matched query: {0}")]
    InjectableNotFound(String),

    #[error(transparent)]
    Task(#[from] TaskError),
}
