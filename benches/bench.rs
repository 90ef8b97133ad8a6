use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use kcluster::distance::{argmin, squared_euclidean};
use kcluster::kmeans::{EmptyClusterPolicy, base_assign, base_assign_parallel, update_centroids};
use rand::Rng;

pub fn l2_distance_benchmark(c: &mut Criterion) {
    let mut rng = rand::rng();

    let mut group = c.benchmark_group("l2 distance");
    for dim in [4, 16, 64, 128, 512].into_iter() {
        let lhs: Vec<f64> = (0..dim).map(|_| rng.random::<f64>()).collect();
        let rhs: Vec<f64> = (0..dim).map(|_| rng.random::<f64>()).collect();

        group.bench_with_input(
            BenchmarkId::new("native", dim),
            &(&lhs, &rhs),
            |b, input| b.iter(|| squared_euclidean(input.0, input.1)),
        );
    }
    group.finish();
}

pub fn argmin_benchmark(c: &mut Criterion) {
    let mut rng = rand::rng();

    let mut group = c.benchmark_group("argmin");
    for k in [3, 16, 64, 256].into_iter() {
        let x: Vec<f64> = (0..k).map(|_| rng.random::<f64>()).collect();

        group.bench_with_input(BenchmarkId::new("native", k), &x, |b, input| {
            b.iter(|| argmin(input))
        });
    }
    group.finish();
}

pub fn assign_benchmark(c: &mut Criterion) {
    let mut rng = rand::rng();
    let dim = 16;
    let k = 32;

    let mut group = c.benchmark_group("assign");
    for n in [1_000, 10_000, 100_000].into_iter() {
        let vecs: Vec<f64> = (0..n * dim).map(|_| rng.random::<f64>()).collect();
        let centroids: Vec<f64> = (0..k * dim).map(|_| rng.random::<f64>()).collect();
        let mut labels = vec![0u32; n];

        group.bench_with_input(BenchmarkId::new("single", n), &vecs, |b, input| {
            b.iter(|| base_assign(input, &centroids, dim, &mut labels))
        });
        group.bench_with_input(BenchmarkId::new("parallel", n), &vecs, |b, input| {
            b.iter(|| base_assign_parallel(input, &centroids, dim, &mut labels))
        });
    }
    group.finish();
}

pub fn update_benchmark(c: &mut Criterion) {
    let mut rng = rand::rng();
    let dim = 16;
    let k = 32;

    let mut group = c.benchmark_group("update");
    for n in [1_000, 10_000, 100_000].into_iter() {
        let vecs: Vec<f64> = (0..n * dim).map(|_| rng.random::<f64>()).collect();
        let labels: Vec<u32> = (0..n).map(|_| rng.random_range(0..k as u32)).collect();
        let mut centroids = vec![0.0; k * dim];

        group.bench_with_input(BenchmarkId::new("parallel", n), &vecs, |b, input| {
            b.iter(|| {
                update_centroids(
                    input,
                    &mut centroids,
                    dim,
                    &labels,
                    EmptyClusterPolicy::Retain,
                )
            })
        });
    }
    group.finish();
}

criterion_group!(l2_benches, l2_distance_benchmark);
criterion_group!(argmin_benches, argmin_benchmark);
criterion_group!(assign_benches, assign_benchmark);
criterion_group!(update_benches, update_benchmark);
criterion_main!(l2_benches, argmin_benches, assign_benches, update_benches);
