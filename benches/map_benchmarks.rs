//! Map benchmarks
//!
//! Benchmarks for the CPU-heavy map operations:
//! - Scan integration (min-dist filtering against a populated map)
//! - Dynamic-probability updates
//! - Cell unload/load cycles through the RAM store
//!
//! Run with: `cargo bench`
//! View HTML reports in: `target/criterion/`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use gati_map::{DynamicMap, MapperConfig, PointCloud, Pose, RamCellStore, RecordingSink};

fn bench_config() -> MapperConfig {
    MapperConfig {
        cell_size: 4.0,
        sensor_max_range: 20.0,
        min_dist_new_point: 0.1,
        is_3d: true,
        is_online: false,
        ..Default::default()
    }
}

/// A scan shaped like a room shell around the sensor, with normals.
fn create_scan(n_points: usize, seed: u64) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cloud = PointCloud::with_capacity(n_points);
    let mut normals = Vec::with_capacity(n_points);
    for _ in 0..n_points {
        let azimuth = rng.random::<f32>() * std::f32::consts::TAU;
        let elevation = (rng.random::<f32>() - 0.5) * 0.5;
        let range = 5.0 + rng.random::<f32>() * 10.0;
        let (sin_a, cos_a) = azimuth.sin_cos();
        let (sin_e, cos_e) = elevation.sin_cos();
        cloud.push(range * cos_e * cos_a, range * cos_e * sin_a, range * sin_e);
        normals.push([-cos_a, -sin_a, 0.0]);
    }
    cloud.set_normals(normals);
    cloud
}

fn bench_scan_integration(c: &mut Criterion) {
    c.bench_function("scan_integration_2k", |b| {
        b.iter_batched(
            || {
                let map = DynamicMap::with_store(
                    bench_config(),
                    Box::new(RamCellStore::new()),
                    RecordingSink::shared(),
                )
                .unwrap();
                map.update_scan(create_scan(2000, 1), &Pose::identity(), &[])
                    .unwrap();
                map
            },
            |map| {
                map.update_scan(create_scan(2000, 2), &Pose::identity(), &[])
                    .unwrap();
                black_box(map.is_local_point_cloud_empty());
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_dynamic_probability(c: &mut Criterion) {
    c.bench_function("dynamic_probability_2k", |b| {
        b.iter_batched(
            || {
                let config = MapperConfig {
                    compute_prob_dynamic: true,
                    ..bench_config()
                };
                let map = DynamicMap::with_store(
                    config,
                    Box::new(RamCellStore::new()),
                    RecordingSink::shared(),
                )
                .unwrap();
                map.update_scan(create_scan(2000, 1), &Pose::identity(), &[])
                    .unwrap();
                map
            },
            |map| {
                map.update_scan(create_scan(2000, 3), &Pose::identity(), &[])
                    .unwrap();
                black_box(map.is_local_point_cloud_empty());
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_cell_cycle(c: &mut Criterion) {
    c.bench_function("cell_unload_load_cycle", |b| {
        b.iter_batched(
            || {
                let mut map = DynamicMap::with_store(
                    bench_config(),
                    Box::new(RamCellStore::new()),
                    RecordingSink::shared(),
                )
                .unwrap();
                map.update_pose(&Pose::identity()).unwrap();
                map.update_scan(create_scan(2000, 1), &Pose::identity(), &[])
                    .unwrap();
                map
            },
            |mut map| {
                // Out and back: evicts the trailing slabs, then reloads them.
                map.update_pose(&Pose::from_translation(40.0, 0.0, 0.0))
                    .unwrap();
                map.update_pose(&Pose::identity()).unwrap();
                black_box(map.loaded_cell_infos().len());
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_scan_integration,
    bench_dynamic_probability,
    bench_cell_cycle
);
criterion_main!(benches);
