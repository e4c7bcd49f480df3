//! Spatial index benchmarks.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use spike_te_core::spatial::{GroupedKdTree, PointSet, UnivariateSearcher};
use spike_te_harness::scenario::SpikeRng;

const GROUP_DIMS: [usize; 3] = [1, 1, 1];

fn random_set(n: usize, seed: u64) -> PointSet {
    let mut rng = SpikeRng::new(seed);
    let mut set = PointSet::with_capacity(&GROUP_DIMS, n);
    for _ in 0..n {
        let p = [rng.next_f64(), rng.next_f64(), rng.next_f64()];
        // push only fails on a group-shape mismatch, which GROUP_DIMS rules out
        let _ = set.push(&[&p[0..1], &p[1..2], &p[2..3]]);
    }
    set
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("kdtree_build");
    for &n in &[1_000_usize, 10_000, 50_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || random_set(n, 7),
                GroupedKdTree::build,
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let n = 20_000;
    let tree = GroupedKdTree::build(random_set(n, 11));
    let mut group = c.benchmark_group("kdtree_query");

    for &k in &[1_usize, 4, 10] {
        group.bench_with_input(BenchmarkId::new("k_nearest", k), &k, |b, &k| {
            let mut idx = 0;
            b.iter(|| {
                idx = (idx + 7919) % n;
                criterion::black_box(tree.k_nearest(k, idx))
            });
        });
    }

    group.bench_function("points_within_radii", |b| {
        let mut idx = 0;
        b.iter(|| {
            idx = (idx + 7919) % n;
            criterion::black_box(tree.points_within_radii(idx, &[0.02, 0.02, 0.02], true))
        });
    });
    group.finish();
}

fn bench_univariate(c: &mut Criterion) {
    let mut rng = SpikeRng::new(13);
    let values: Vec<f64> = (0..50_000).map(|_| rng.exponential(1.0)).collect();
    let searcher = UnivariateSearcher::new(&values);
    let mut group = c.benchmark_group("univariate");

    group.bench_function("count_within", |b| {
        let mut idx = 0;
        b.iter(|| {
            idx = (idx + 7919) % values.len();
            criterion::black_box(searcher.count_within(idx, 0.01, 0.02, true))
        });
    });
    group.bench_function("count_at_least", |b| {
        let mut idx = 0;
        b.iter(|| {
            idx = (idx + 7919) % values.len();
            criterion::black_box(searcher.count_at_least(idx, 0.01, true))
        });
    });
    group.finish();
}

criterion_group!(benches, bench_build, bench_queries, bench_univariate);
criterion_main!(benches);
