//! # Archetype Storage Benchmark
//!
//! Measures the hot paths of the world:
//! 1. Row iteration through a view
//! 2. Chunk iteration through a view
//! 3. Component migration (add/remove round trip)
//! 4. Create/destroy churn with pooled chunks

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use strata_core::{Position, Velocity, World};

const ENTITY_COUNT: usize = 100_000;

#[derive(Clone, Copy, Default)]
struct Health(u32);

fn populated_world(count: usize) -> World {
    let mut world = World::new();
    world.register::<(Position, Velocity, Health)>();
    for i in 0..count {
        let e = world.create();
        world.add::<(Position, Velocity)>(e).expect("allocation failed");
        *world.component_mut::<Position>(e) = Position::new(i as f32, 0.0, 0.0);
        *world.component_mut::<Velocity>(e) = Velocity::new(0.1, 0.2, 0.3);
    }
    world
}

// =============================================================================
// ITERATION
// =============================================================================

fn bench_for_each(c: &mut Criterion) {
    let mut world = populated_world(ENTITY_COUNT);
    let view = world.make_view::<(Position, Velocity)>();

    c.bench_function("view_for_each_100k", |b| {
        b.iter(|| {
            world.for_each(&view, |_, (pos, vel)| pos.integrate(*vel, 0.016));
            black_box(world.view_len(&view))
        });
    });
}

fn bench_for_each_chunk(c: &mut Criterion) {
    let mut world = populated_world(ENTITY_COUNT);
    let view = world.make_view::<(Position, Velocity)>();

    c.bench_function("view_for_each_chunk_100k", |b| {
        b.iter(|| {
            world.for_each_chunk(&view, |_, (positions, velocities)| {
                for (pos, vel) in positions.iter_mut().zip(velocities.iter()) {
                    pos.integrate(*vel, 0.016);
                }
            });
            black_box(world.view_len(&view))
        });
    });
}

// =============================================================================
// STRUCTURAL CHANGES
// =============================================================================

fn bench_migration(c: &mut Criterion) {
    let mut world = populated_world(10_000);
    let ids: Vec<_> = world.archetypes()[0].entities().to_vec();

    c.bench_function("add_remove_round_trip_10k", |b| {
        b.iter(|| {
            for &id in &ids {
                world.add::<(Health,)>(id).expect("allocation failed");
            }
            for &id in &ids {
                world.remove::<(Health,)>(id).expect("allocation failed");
            }
        });
    });
}

fn bench_create_destroy(c: &mut Criterion) {
    c.bench_function("create_destroy_10k", |b| {
        b.iter_batched(
            || populated_world(10_000),
            |mut world| {
                let ids: Vec<_> = world.archetypes()[0].entities().to_vec();
                for id in ids {
                    world.destroy(id);
                }
                black_box(world.allocator_stats())
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_for_each,
    bench_for_each_chunk,
    bench_migration,
    bench_create_destroy
);
criterion_main!(benches);
