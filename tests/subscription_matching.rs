use sensorthings_filter::{
    ComparisonOp, Entity, EntityChangedEvent, EntityProperty, EntityType, Expression, FilterError,
    Instant, NavigationProperty, RegistryBuilder, ResourcePath, SubscriptionRegistry,
};
use std::sync::Arc;

const ROOT: &str = "http://localhost:8080/sta/v1.1";

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn thing(id: i64, name: &str) -> Entity {
    Entity::new(EntityType::Thing)
        .with_id(id)
        .with_property(EntityProperty::Name, name)
        .with_property(EntityProperty::Description, "weather station")
}

#[tokio::test]
async fn test_property_subscription_end_to_end() {
    init();
    let registry = RegistryBuilder::new().build().unwrap();
    let path = ResourcePath::new()
        .entity(EntityType::Thing, 1)
        .property(EntityProperty::Name);
    let mut rx = registry.subscribe("v1.1/Things(1)/name", &path, ROOT).unwrap();

    let report = registry.notify(&EntityChangedEvent::updated(
        thing(1, "Sensor A"),
        [EntityProperty::Name],
    ));
    assert_eq!(report.delivered, 1);

    let notification = rx.recv().await.unwrap();
    assert_eq!(notification.topic, "v1.1/Things(1)/name");
    assert_eq!(notification.payload, r#"{"name":"Sensor A"}"#);
}

#[test]
fn test_property_subscription_ignores_other_ids() {
    init();
    let registry = SubscriptionRegistry::default();
    let path = ResourcePath::new()
        .entity(EntityType::Thing, 42)
        .property(EntityProperty::Name);
    let mut rx = registry.subscribe("v1.1/Things(42)/name", &path, ROOT).unwrap();

    let report = registry.notify(&EntityChangedEvent::updated(
        thing(43, "other"),
        [EntityProperty::Name],
    ));
    assert_eq!(report.matched, 0);
    assert!(rx.try_recv().is_err());

    let report = registry.notify(&EntityChangedEvent::updated(
        thing(42, "mine"),
        [EntityProperty::Name],
    ));
    assert_eq!(report.matched, 1);
    assert!(rx.try_recv().is_ok());
}

#[test]
fn test_text_ids_are_matched_exactly() {
    init();
    let registry = SubscriptionRegistry::default();
    let path = ResourcePath::new()
        .entity(EntityType::Thing, "42")
        .property(EntityProperty::Name);
    let _rx = registry.subscribe("v1.1/Things('42')/name", &path, ROOT).unwrap();

    let other = Entity::new(EntityType::Thing)
        .with_id("43")
        .with_property(EntityProperty::Name, "x");
    let report = registry.notify(&EntityChangedEvent::updated(
        other,
        [EntityProperty::Name, EntityProperty::Description],
    ));
    assert_eq!(report.matched, 0);
}

#[test]
fn test_property_subscription_needs_property_in_changed_set() {
    init();
    let registry = SubscriptionRegistry::default();
    let path = ResourcePath::new()
        .entity(EntityType::Thing, 1)
        .property(EntityProperty::Name);
    let mut rx = registry.subscribe("v1.1/Things(1)/name", &path, ROOT).unwrap();

    registry.notify(&EntityChangedEvent::updated(
        thing(1, "Sensor A"),
        [EntityProperty::Description, EntityProperty::Properties],
    ));
    registry.notify(&EntityChangedEvent::updated(
        thing(1, "Sensor A"),
        [NavigationProperty::Locations],
    ));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_query_on_property_topic_rejected() {
    init();
    let registry = SubscriptionRegistry::default();
    let path = ResourcePath::new()
        .entity(EntityType::Thing, 1)
        .property(EntityProperty::Name);
    let err = registry
        .subscribe("v1.1/Things(1)/name?$select=name", &path, ROOT)
        .unwrap_err();
    assert!(matches!(err, FilterError::InvalidSubscriptionTopic { .. }));
    assert!(!registry.contains("v1.1/Things(1)/name?$select=name"));
}

#[test]
fn test_filtered_entity_set() {
    init();
    let registry = SubscriptionRegistry::default();
    let path = ResourcePath::new()
        .entity(EntityType::Datastream, 5)
        .set(EntityType::Observation);
    let topic = "v1.1/Datastreams(5)/Observations?$filter=result gt 20";
    let filter = Expression::compare(
        ComparisonOp::GreaterThan,
        Expression::property(EntityProperty::Result),
        Expression::constant(20),
    );
    let mut rx = registry
        .subscribe_filtered(topic, &path, ROOT, filter)
        .unwrap();

    let observation = |id: i64, datastream: i64, result: f64| {
        Entity::new(EntityType::Observation)
            .with_id(id)
            .with_link(NavigationProperty::Datastream, datastream)
            .with_property(EntityProperty::Result, result)
            .with_property(
                EntityProperty::ResultTime,
                Instant::parse("2020-01-01T00:00:00Z").unwrap(),
            )
    };

    let hits = [
        observation(1, 5, 25.0),
        observation(2, 5, 10.0),
        observation(3, 6, 30.0),
    ]
    .into_iter()
    .map(|o| registry.notify(&EntityChangedEvent::created(o)).matched)
    .sum::<usize>();
    assert_eq!(hits, 1);

    let payload: serde_json::Value =
        serde_json::from_str(&rx.try_recv().unwrap().payload).unwrap();
    assert_eq!(payload["@iot.id"], 1);
    assert_eq!(payload["result"], 25.0);
    assert_eq!(
        payload["@iot.selfLink"],
        format!("{ROOT}/Observations(1)")
    );
}

#[test]
fn test_notify_from_many_threads() {
    init();
    let registry = Arc::new(SubscriptionRegistry::default());
    let path = ResourcePath::new().set(EntityType::Thing);
    let mut rx = registry.subscribe("v1.1/Things", &path, ROOT).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for i in 0..10 {
                    registry.notify(&EntityChangedEvent::created(thing(t * 10 + i, "x")));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut received = 0;
    while rx.try_recv().is_ok() {
        received += 1;
    }
    assert_eq!(received, 40);
}

#[test]
fn test_unsubscribe_while_dispatching() {
    init();
    let registry = Arc::new(SubscriptionRegistry::default());
    let path = ResourcePath::new().set(EntityType::Thing);

    let churn = {
        let registry = Arc::clone(&registry);
        let path = path.clone();
        std::thread::spawn(move || {
            for _ in 0..100 {
                let rx = registry.subscribe("v1.1/Things", &path, ROOT).unwrap();
                drop(rx);
                registry.unsubscribe("v1.1/Things");
            }
        })
    };
    for i in 0..100 {
        registry.notify(&EntityChangedEvent::created(thing(i, "x")));
    }
    churn.join().unwrap();

    assert_eq!(registry.subscription_count(), 0);
    assert!(registry.topics().is_empty());
}
