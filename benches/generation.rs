//! Benchmarks for level generation.
//!
//! Run with: cargo bench --bench generation

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;

use prefabgen::script::{generate, Script};
use prefabgen::world::{DistanceField, Point};
use prefabgen::{GeneratorConfig, PrefabLibrary};

const LIBRARY: &str = include_str!("../assets/prefabs.ron");
const BASIC: &str = include_str!("../assets/levelscripts/basic.csv");
const FULL: &str = include_str!("../assets/levelscripts/full.csv");

fn benchmark_scripts(c: &mut Criterion) {
    let library = Arc::new(PrefabLibrary::from_ron_str(LIBRARY).expect("library"));
    let mut group = c.benchmark_group("scripts");

    for (name, text) in [("basic_40x40", BASIC), ("full_80x40", FULL)] {
        let script: Script = text.parse().expect("script");
        group.bench_function(name, |b| {
            let mut seed = 0u64;
            b.iter(|| {
                seed = seed.wrapping_add(1);
                let mut rng = StdRng::seed_from_u64(seed);
                black_box(
                    generate(&script, Arc::clone(&library), GeneratorConfig::default(), &mut rng)
                        .expect("generation"),
                )
            });
        });
    }

    group.finish();
}

fn benchmark_distance_field(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance_field");
    group.throughput(Throughput::Elements(200 * 200));
    group.bench_function("open_200x200", |b| {
        b.iter(|| {
            let mut field = DistanceField::new(200, 200);
            field.populate(&[Point::new(100, 100)], |p| (p.x + p.y) % 7 != 0);
            black_box(field.max_val())
        });
    });
    group.finish();
}

criterion_group!(benches, benchmark_scripts, benchmark_distance_field);
criterion_main!(benches);
