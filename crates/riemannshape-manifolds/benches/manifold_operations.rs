//! Benchmarks for manifold operations
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use riemannshape_core::prelude::*;
use riemannshape_manifolds::{
    nfold_metric, ClosedDiscreteCurves, DiscreteCurves, Hypersphere, SrvShapeBundle,
};
use std::sync::Arc;

fn benchmark_nfold_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("nfold_hypersphere");

    for &n_copies in &[2, 16, 128] {
        let metric = nfold_metric(Hypersphere::new(2).unwrap(), n_copies, None).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let p = metric.space().random_point_with(&mut rng, 32, 1.0).unwrap();
        let q = metric.space().random_point_with(&mut rng, 32, 1.0).unwrap();
        let v = metric.log(&q.view(), &p.view()).unwrap();

        group.bench_with_input(BenchmarkId::new("belongs", n_copies), &n_copies, |b, _| {
            b.iter(|| metric.space().belongs(black_box(&p.view()), 1e-10).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("exp", n_copies), &n_copies, |b, _| {
            b.iter(|| metric.exp(black_box(&v.view()), black_box(&p.view())).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("squared_dist", n_copies), &n_copies, |b, _| {
            b.iter(|| metric.squared_dist(black_box(&p.view()), black_box(&q.view())).unwrap())
        });
    }

    group.finish();
}

fn benchmark_srv_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("srv_curves");
    group.sample_size(20);

    for &k in &[10, 50] {
        let space = Arc::new(DiscreteCurves::new(2, k).unwrap());
        let bundle = SrvShapeBundle::new(Arc::clone(&space));
        let mut rng = StdRng::seed_from_u64(1);
        let p = space.random_point_with(&mut rng, 8, 1.0).unwrap();
        let q = space.random_point_with(&mut rng, 8, 1.0).unwrap();
        let config = SolverConfig::builder().max_iter(5).build().unwrap();

        group.bench_with_input(BenchmarkId::new("vertical_projection", k), &k, |b, _| {
            b.iter(|| bundle.vertical_projection(black_box(&q.view()), black_box(&p.view())).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("align", k), &k, |b, _| {
            b.iter(|| bundle.align(black_box(&q.view()), black_box(&p.view()), &config).unwrap())
        });

        let closed = ClosedDiscreteCurves::new(2, k).unwrap();
        let srv = space.srv_transform(&p.view()).unwrap();
        group.bench_with_input(BenchmarkId::new("srv_projection", k), &k, |b, _| {
            b.iter(|| {
                closed
                    .srv_projection(black_box(&srv.view()), &SolverConfig::default())
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_nfold_operations, benchmark_srv_operations);
criterion_main!(benches);
