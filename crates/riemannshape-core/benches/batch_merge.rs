//! Benchmarks for batch-shape resolution and batch merging
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array, IxDyn};
use riemannshape_core::vectorization::{batched_dot, get_batch_shape, BatchMerge};

fn benchmark_merge_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_merge");

    for &n_copies in &[4, 64, 512] {
        let shape = [16, n_copies, 3];
        let len: usize = shape.iter().product();
        let data = Array::from_iter((0..len).map(|i| i as f64))
            .into_shape_with_order(IxDyn(&shape))
            .unwrap();

        group.bench_with_input(BenchmarkId::new("resolve", n_copies), &n_copies, |b, &n| {
            b.iter(|| BatchMerge::resolve(&[n], &[3], &[black_box(data.view())]).unwrap())
        });

        let plan = BatchMerge::resolve(&[n_copies], &[3], &[data.view()]).unwrap();
        group.bench_with_input(BenchmarkId::new("merge_split", n_copies), &n_copies, |b, _| {
            b.iter(|| {
                let merged = plan.merge(&black_box(data.view())).unwrap();
                plan.split(merged, &[3]).unwrap()
            })
        });

        group.bench_with_input(BenchmarkId::new("batched_dot", n_copies), &n_copies, |b, _| {
            b.iter(|| batched_dot(&data.view(), black_box(&data.view()), 2).unwrap())
        });
    }

    group.finish();
}

fn benchmark_batch_shape(c: &mut Criterion) {
    let single = Array::<f64, _>::zeros(IxDyn(&[5, 3]));
    let batched = Array::<f64, _>::zeros(IxDyn(&[8, 32, 5, 3]));
    c.bench_function("get_batch_shape_broadcast", |b| {
        b.iter(|| {
            get_batch_shape(&[5, 3], &[black_box(single.view()), black_box(batched.view())])
                .unwrap()
        })
    });
}

criterion_group!(benches, benchmark_merge_split, benchmark_batch_shape);
criterion_main!(benches);
