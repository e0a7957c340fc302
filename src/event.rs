//! Event definitions and traits

use crate::component::ComponentId;
use crate::error::ReactorError;
use crate::signal::CompletionSignal;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Event trait
///
/// Everything broadcast through a reactor implements this. An event's
/// identity (id, source, creation time) never changes after construction;
/// its payload may be interior-mutated by components while it is being
/// handled, and becomes read-only once the completion signal fires.
pub trait Event: Send + Sync + 'static {
    /// Get event ID.
    fn event_id(&self) -> EventId;

    /// The component that emitted this event, if any.
    fn source(&self) -> Option<ComponentId>;

    /// Cast to `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Cast an owning pointer to `Any`, for downcasting into a concrete
    /// event that a spawned reply task can hold on to.
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Called by the reactor exactly once, after every registered component
    /// has been visited for this emission.
    fn on_emit_completed(&self) {}

    /// Key that routing distributors match on.
    fn routing_key(&self) -> Option<&str> {
        None
    }
}

/// Base event state: identity plus the emit-completed signal.
#[derive(Debug, Clone)]
pub struct EventMeta {
    id: EventId,
    source: Option<ComponentId>,
    created_at: DateTime<Utc>,
    completed: CompletionSignal,
}

impl EventMeta {
    /// Create metadata for a new event.
    pub fn new(source: Option<ComponentId>) -> Self {
        Self {
            id: EventId::new(),
            source,
            created_at: Utc::now(),
            completed: CompletionSignal::new(),
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn source(&self) -> Option<ComponentId> {
        self.source
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The event's completion signal.
    pub fn completion(&self) -> &CompletionSignal {
        &self.completed
    }

    /// Set the completion signal.
    pub fn complete(&self) {
        self.completed.set();
    }
}

/// An event augmented with a reply registry that the emitter can wait on
/// and inspect.
#[async_trait]
pub trait ReturningEvent: Event {
    /// Wait until the broadcast pass has completed and every recorded reply
    /// task has reached a terminal state.
    async fn wait_for_reply(&self);

    /// Non-blocking check: `Ok(true)` once the broadcast completed and all
    /// reply tasks are terminal with no failures. If any reply task failed,
    /// returns [`ReactorError::ReplyFailures`] carrying every failure
    /// collected so far.
    fn is_replied(&self) -> Result<bool, ReactorError>;
}
