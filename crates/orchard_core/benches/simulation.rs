//! Simulation benchmarks for orchard_core.
//!
//! Run with: `cargo bench -p orchard_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use orchard_core::components::{IdAllocator, TilePos};
use orchard_core::data::GameRules;
use orchard_core::map_generation::{generate_map, seeded_rng};
use orchard_core::math::Fixed;
use orchard_core::pathfinding::find_path;
use orchard_core::session::{Session, SessionConfig};

/// Map generation and a corner-to-corner path search.
pub fn map_benchmark(c: &mut Criterion) {
    let rules = GameRules::default();

    c.bench_function("generate_map", |b| {
        b.iter(|| {
            let mut rng = seeded_rng(black_box(42));
            generate_map(&rules.map, &mut rng, &mut IdAllocator::new())
        })
    });

    let map = generate_map(&rules.map, &mut seeded_rng(42), &mut IdAllocator::new());
    c.bench_function("find_path_across_map", |b| {
        b.iter(|| {
            find_path(
                &map,
                black_box(TilePos::new(2, 2)),
                black_box(TilePos::new(58, 40)),
                rules.simulation.max_path_iterations,
            )
        })
    });
}

/// Whole-session ticks with both sides active.
pub fn session_benchmark(c: &mut Criterion) {
    let dt = Fixed::from_num(0.05);
    let mut warmed = Session::new(GameRules::default(), SessionConfig::with_seed(7))
        .expect("default rules are valid");
    warmed.select_all();
    warmed.issue_move(TilePos::new(30, 20));
    for _ in 0..600 {
        warmed.advance(dt);
    }

    c.bench_function("session_advance", |b| {
        b.iter_batched(
            || warmed.clone(),
            |mut session| {
                for _ in 0..20 {
                    session.advance(black_box(dt));
                }
                session
            },
            criterion::BatchSize::SmallInput,
        )
    });

    c.bench_function("state_hash", |b| b.iter(|| black_box(&warmed).state_hash()));
}

criterion_group!(benches, map_benchmark, session_benchmark);
criterion_main!(benches);
