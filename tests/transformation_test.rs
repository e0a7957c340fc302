//! Integration tests for pre-broadcast event transformation

use async_trait::async_trait;
use reflex::*;
use std::any::Any;
use std::sync::{Arc, Mutex};

struct MessageEvent {
    meta: EventMeta,
    text: String,
}

impl MessageEvent {
    fn new(text: impl Into<String>) -> Self {
        Self {
            meta: EventMeta::new(None),
            text: text.into(),
        }
    }
}

impl Event for MessageEvent {
    fn event_id(&self) -> EventId {
        self.meta.id()
    }

    fn source(&self) -> Option<ComponentId> {
        self.meta.source()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn on_emit_completed(&self) {
        self.meta.complete();
    }
}

/// Records the text of every message event it observes.
struct Recorder {
    id: ComponentId,
    seen: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn new() -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::new(Self {
            id: ComponentId::new(),
            seen: seen.clone(),
        });
        (recorder, seen)
    }
}

#[async_trait]
impl Component for Recorder {
    fn component_id(&self) -> ComponentId {
        self.id
    }

    async fn on_event(&self, _reactor: &Reactor, event: &Arc<dyn Event>) {
        if let Some(message) = event.as_any().downcast_ref::<MessageEvent>() {
            self.seen.lock().unwrap().push(message.text.clone());
        }
    }
}

struct Uppercaser;

#[async_trait]
impl Transformer for Uppercaser {
    async fn transform(
        &self,
        _reactor: &Reactor,
        current: Arc<dyn Event>,
    ) -> Result<Arc<dyn Event>, TaskError> {
        match current.as_any().downcast_ref::<MessageEvent>() {
            Some(message) => Ok(Arc::new(MessageEvent::new(message.text.to_uppercase()))),
            None => Ok(current),
        }
    }
}

struct Exclaimer;

#[async_trait]
impl Transformer for Exclaimer {
    async fn transform(
        &self,
        _reactor: &Reactor,
        current: Arc<dyn Event>,
    ) -> Result<Arc<dyn Event>, TaskError> {
        match current.as_any().downcast_ref::<MessageEvent>() {
            Some(message) => Ok(Arc::new(MessageEvent::new(format!("{}!", message.text)))),
            None => Ok(current),
        }
    }
}

#[tokio::test]
async fn mode_none_broadcasts_the_event_untouched() {
    let reactor = Reactor::new();
    let (recorder, seen) = Recorder::new();
    reactor.add_component(recorder);
    reactor
        .transformation_distributor()
        .add_transformer(Arc::new(TransformerComponent::new(Uppercaser)));

    reactor
        .emit(Arc::new(MessageEvent::new("hello")), TransformationMode::None)
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string()]);
}

#[tokio::test]
async fn distributor_mode_broadcasts_the_rewritten_event() {
    let reactor = Reactor::new();
    let (recorder, seen) = Recorder::new();
    reactor.add_component(recorder);
    reactor
        .transformation_distributor()
        .add_transformer(Arc::new(TransformerComponent::new(Uppercaser)));

    reactor
        .emit(
            Arc::new(MessageEvent::new("hello")),
            TransformationMode::Distributor,
        )
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["HELLO".to_string()]);
}

#[tokio::test]
async fn transformers_chain_in_registration_order() {
    let reactor = Reactor::new();
    let (recorder, seen) = Recorder::new();
    reactor.add_component(recorder);
    reactor
        .transformation_distributor()
        .add_transformer(Arc::new(TransformerComponent::new(Uppercaser)));
    reactor
        .transformation_distributor()
        .add_transformer(Arc::new(TransformerComponent::new(Exclaimer)));

    reactor
        .emit(
            Arc::new(MessageEvent::new("hello")),
            TransformationMode::Distributor,
        )
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["HELLO!".to_string()]);
    assert_eq!(reactor.transformation_distributor().transformer_count(), 2);
}

#[tokio::test]
async fn distributor_mode_without_transformers_passes_through() {
    let reactor = Reactor::new();
    let (recorder, seen) = Recorder::new();
    reactor.add_component(recorder);

    reactor
        .emit(
            Arc::new(MessageEvent::new("hello")),
            TransformationMode::Distributor,
        )
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string()]);
}

// In `All` mode a transformer registered as a plain component takes part
// even though the transformation distributor never heard of it.
#[tokio::test]
async fn all_mode_reaches_transformers_registered_as_components() {
    let reactor = Reactor::new();
    let (recorder, seen) = Recorder::new();
    reactor.add_component(recorder);
    reactor.add_component(Arc::new(TransformerComponent::new(Uppercaser)));

    reactor
        .emit(Arc::new(MessageEvent::new("hello")), TransformationMode::All)
        .await
        .unwrap();

    // The recorder is also visited during the transformation pass but
    // ignores transform events, so it observes the final text exactly once.
    assert_eq!(*seen.lock().unwrap(), vec!["HELLO".to_string()]);
}

#[tokio::test]
async fn transform_events_carry_the_routing_key() {
    let original: Arc<dyn Event> = Arc::new(MessageEvent::new("hello"));
    let transform = TransformEvent::new(None, original.clone());
    assert_eq!(transform.routing_key(), Some(TRANSFORMATION_ROUTING_KEY));
    assert_eq!(transform.original().event_id(), original.event_id());

    // With no replies the transformed view is the original itself.
    transform.on_emit_completed();
    let transformed = transform.transformed().await.unwrap();
    assert_eq!(transformed.event_id(), original.event_id());
}
