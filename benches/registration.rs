//! Benchmarks for rigid alignment and ICP
//!
//! Clouds are sampled on an ellipsoid shell of head-like size (mm).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::{Point3, Rotation3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rhino::core::{Affine, CoordFrame, PointCloud};
use rhino::registration::{icp_from, icp_multistart, solve_rigid, IcpOptions};
use std::time::Duration;

fn head_shell(n: usize, seed: u64) -> Vec<Point3<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let theta: f64 = rng.gen_range(0.0..std::f64::consts::PI);
            let phi: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
            Point3::new(
                75.0 * theta.sin() * phi.cos(),
                95.0 * theta.sin() * phi.sin(),
                85.0 * theta.cos(),
            )
        })
        .collect()
}

fn motion() -> Affine {
    Affine::rigid(
        CoordFrame::Head,
        CoordFrame::Head,
        &Rotation3::from_euler_angles(0.03, -0.02, 0.05),
        &Vector3::new(2.0, -1.0, 3.0),
    )
}

fn benchmark_rigid(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve_rigid");
    for n in [3usize, 100, 1000] {
        let source = PointCloud::new(CoordFrame::Head, head_shell(n, 1));
        let target = motion().apply(&source);
        group.bench_with_input(BenchmarkId::from_parameter(n), &(source, target), |b, (s, t)| {
            b.iter(|| solve_rigid(black_box(s), black_box(t)))
        });
    }
    group.finish();
}

fn benchmark_icp(c: &mut Criterion) {
    let mut group = c.benchmark_group("icp");
    group.measurement_time(Duration::from_secs(5));
    group.sample_size(20);

    for n_fixed in [2000usize, 10000] {
        let fixed = PointCloud::new(CoordFrame::Head, head_shell(n_fixed, 2));
        let moving = motion().inverse().unwrap().apply(&fixed.every_nth(10));
        let init = Affine::identity(CoordFrame::Head);

        group.bench_with_input(
            BenchmarkId::new("single", n_fixed),
            &(fixed.clone(), moving.clone()),
            |b, (f, m)| b.iter(|| icp_from(black_box(f), black_box(m), &init, 30, 1e-3)),
        );
    }
    group.finish();
}

fn benchmark_multistart(c: &mut Criterion) {
    let mut group = c.benchmark_group("icp_multistart");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    let fixed = PointCloud::new(CoordFrame::Head, head_shell(5000, 3));
    let moving = motion().inverse().unwrap().apply(&fixed.every_nth(10));
    let init = Affine::identity(CoordFrame::Head);

    for n_init in [1usize, 10, 30] {
        let options = IcpOptions {
            n_init,
            ..IcpOptions::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(n_init), &options, |b, o| {
            b.iter(|| icp_multistart(black_box(&fixed), black_box(&moving), &init, o))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_rigid, benchmark_icp, benchmark_multistart);
criterion_main!(benches);
