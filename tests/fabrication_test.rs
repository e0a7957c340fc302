//! Integration tests for the fabrication pipeline

use async_trait::async_trait;
use reflex::*;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
struct DogModel {
    attributes: serde_json::Map<String, serde_json::Value>,
}

impl AttributeTarget for DogModel {
    fn set_attribute(&mut self, name: &str, value: AttributeValue) {
        self.attributes.insert(name.to_string(), value);
    }
}

#[tokio::test]
async fn factories_assemble_the_union_of_their_attributes() {
    let reactor = Reactor::new();

    reactor.factory_distributor().add_factory(Arc::new(
        AttributeAppender::<DogModel>::new()
            .attribute("age", |_, _| json!(7))
            .attribute("name", |_, _| json!("Jack"))
            .attribute("owner", |_, _| json!("Daniel"))
            .into_component(),
    ));
    reactor.factory_distributor().add_factory(Arc::new(
        AttributeAppender::<DogModel>::new()
            .attribute("owner_age", |_, _| json!(16))
            .attribute("owner_name", |_, _| json!("Daniel"))
            .into_component(),
    ));
    reactor.factory_distributor().add_factory(Arc::new(
        AttributeAppender::<DogModel>::new()
            .attribute("diet", |_, _| json!("any"))
            .into_component(),
    ));

    let dog = reactor.fabricate::<DogModel>().await.unwrap().unwrap();
    for attribute in ["age", "name", "owner", "owner_age", "owner_name", "diet"] {
        assert!(
            dog.attributes.contains_key(attribute),
            "missing attribute {attribute}"
        );
    }
    assert_eq!(dog.attributes.len(), 6);
    assert_eq!(dog.attributes["name"], json!("Jack"));
}

#[tokio::test]
async fn later_stages_see_the_instance_so_far() {
    let reactor = Reactor::new();

    reactor.factory_distributor().add_factory(Arc::new(
        AttributeAppender::<DogModel>::new()
            .attribute("age", |_, _| json!(7))
            .into_component(),
    ));
    // Derives its value from the attribute the first stage contributed.
    reactor.factory_distributor().add_factory(Arc::new(
        AttributeAppender::<DogModel>::new()
            .attribute("age_in_dog_years", |instance, _| {
                json!(instance.attributes["age"].as_i64().unwrap() * 7)
            })
            .into_component(),
    ));

    let dog = reactor.fabricate::<DogModel>().await.unwrap().unwrap();
    assert_eq!(dog.attributes["age_in_dog_years"], json!(49));
}

#[tokio::test]
async fn fabricating_with_no_factories_yields_no_instance() {
    let reactor = Reactor::new();
    let dog = reactor.fabricate::<DogModel>().await.unwrap();
    assert!(dog.is_none());
}

struct BrokenFabricator;

#[async_trait]
impl Fabricator<DogModel> for BrokenFabricator {
    async fn fabricate(
        &self,
        _reactor: &Reactor,
        _previous: Option<DogModel>,
        _event: &FabricationEvent<DogModel>,
    ) -> Result<Option<DogModel>, TaskError> {
        Err(TaskError::failed("broken stage"))
    }
}

// Best-effort policy: a failing stage produces no instance instead of
// aborting the chain, so its successor starts from scratch.
#[tokio::test]
async fn a_failing_stage_does_not_block_downstream_factories() {
    let reactor = Reactor::new();

    reactor.factory_distributor().add_factory(Arc::new(
        AttributeAppender::<DogModel>::new()
            .attribute("age", |_, _| json!(7))
            .into_component(),
    ));
    reactor
        .factory_distributor()
        .add_factory(Arc::new(FactoryComponent::<DogModel, _>::new(
            BrokenFabricator,
        )));
    reactor.factory_distributor().add_factory(Arc::new(
        AttributeAppender::<DogModel>::new()
            .attribute("diet", |_, _| json!("any"))
            .into_component(),
    ));

    let dog = reactor.fabricate::<DogModel>().await.unwrap().unwrap();
    // The broken stage dropped the instance so far; the last stage rebuilt
    // a fresh one.
    assert!(dog.attributes.contains_key("diet"));
    assert!(!dog.attributes.contains_key("age"));

    // The failure is swallowed, not surfaced: the chain reports success.
    assert_eq!(reactor.factory_distributor().factory_count(), 3);
}

#[tokio::test]
async fn fabrication_events_only_reach_the_factory_distributor() {
    let reactor = Reactor::new();
    reactor.factory_distributor().add_factory(Arc::new(
        AttributeAppender::<DogModel>::new()
            .attribute("age", |_, _| json!(7))
            .into_component(),
    ));

    let event = Arc::new(FabricationEvent::<DogModel>::new(None));
    assert_eq!(event.routing_key(), Some(FABRICATION_ROUTING_KEY));
    reactor
        .emit(event.clone(), TransformationMode::None)
        .await
        .unwrap();
    event.wait_for_reply().await;
    assert!(event.is_replied().unwrap());

    let dog = event.instance().await.unwrap().unwrap();
    assert_eq!(dog.attributes["age"], json!(7));
}
