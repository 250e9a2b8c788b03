use criterion::{black_box, criterion_group, criterion_main, Criterion};

use felon_entrepreneur::onboarding::{guard, route_for_step, StepRoute};

fn bench_sequencer(c: &mut Criterion) {
    c.bench_function("route_for_step", |b| {
        b.iter(|| {
            for step in -2i64..8 {
                black_box(route_for_step(Some(black_box(step))));
            }
            black_box(route_for_step(None));
        })
    });

    c.bench_function("guard", |b| {
        b.iter(|| {
            for step in -2i64..8 {
                black_box(guard(Some(black_box(step)), StepRoute::PathChoice));
            }
        })
    });
}

criterion_group!(benches, bench_sequencer);
criterion_main!(benches);
