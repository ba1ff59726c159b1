use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sensorthings_filter::{
    ComparisonOp, Entity, EntityChangedEvent, EntityProperty, EntityType, Expression, Instant,
    Interval, NavigationProperty, PostgresBackend, ResourcePath, SubscriptionRegistry, evaluate,
};

fn sample_filter() -> Expression {
    Expression::and(
        Expression::compare(
            ComparisonOp::Overlaps,
            Expression::property(EntityProperty::PhenomenonTime),
            Expression::constant(
                Interval::parse("2020-01-01T00:00:00Z/2020-01-02T00:00:00Z").unwrap(),
            ),
        ),
        Expression::compare(
            ComparisonOp::GreaterThan,
            Expression::property(EntityProperty::Result),
            Expression::constant(20),
        ),
    )
}

fn observation(id: i64, datastream: i64) -> Entity {
    Entity::new(EntityType::Observation)
        .with_id(id)
        .with_link(NavigationProperty::Datastream, datastream)
        .with_property(EntityProperty::Result, (id % 40) as f64)
        .with_property(
            EntityProperty::PhenomenonTime,
            Instant::parse("2020-01-01T12:00:00Z").unwrap(),
        )
}

fn benchmark_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    let filter = sample_filter();
    let backend = PostgresBackend::new(EntityType::Observation);

    group.bench_function("postgres", |b| {
        b.iter(|| backend.compile(black_box(&filter)).unwrap())
    });

    let entity = observation(25, 1);
    group.bench_function("evaluate", |b| {
        b.iter(|| evaluate(black_box(&filter), black_box(&entity)).unwrap())
    });

    group.finish();
}

fn benchmark_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for subscriptions in [10, 100, 1000] {
        let registry = SubscriptionRegistry::default();
        let mut receivers = Vec::with_capacity(subscriptions);
        for datastream in 0..subscriptions as i64 {
            let path = ResourcePath::new()
                .entity(EntityType::Datastream, datastream)
                .set(EntityType::Observation);
            let topic = format!("v1.1/Datastreams({datastream})/Observations");
            receivers.push(
                registry
                    .subscribe_filtered(&topic, &path, "", sample_filter())
                    .unwrap(),
            );
        }

        let event = EntityChangedEvent::created(observation(25, 3));
        group.bench_with_input(
            BenchmarkId::new("notify", subscriptions),
            &event,
            |b, event| {
                b.iter(|| {
                    let report = registry.notify(black_box(event));
                    for rx in receivers.iter_mut() {
                        while rx.try_recv().is_ok() {}
                    }
                    report
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_compile, benchmark_dispatch);
criterion_main!(benches);
