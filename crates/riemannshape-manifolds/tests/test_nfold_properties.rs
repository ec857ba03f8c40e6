//! Property tests for n-fold product manifolds and metrics.
//!
//! The product metric must agree with the base metric copy by copy, keep
//! arbitrary leading batch axes, and honour the validation rules of its
//! constructor.

use approx::assert_relative_eq;
use ndarray::{array, Axis, IxDyn};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use riemannshape_core::prelude::*;
use riemannshape_manifolds::{
    hypersphere::random_tangent_vec, nfold_metric, Euclidean, Hypersphere, HypersphereMetric,
    NFoldManifold, NFoldMetric,
};
use std::sync::Arc;

fn sphere_product(n_copies: usize, scales: Option<Vec<f64>>) -> NFoldMetric<HypersphereMetric> {
    nfold_metric(Hypersphere::new(2).unwrap(), n_copies, scales).unwrap()
}

#[test]
fn test_three_copies_of_a_plane() {
    let space = NFoldManifold::new(Euclidean::new(2).unwrap(), 3).unwrap();
    assert_eq!(space.dim(), 6);
    assert_eq!(space.shape(), &[3, 2]);

    let mut rng = StdRng::seed_from_u64(1);
    let point = space.random_point_with(&mut rng, 1, 1.0).unwrap();
    assert_eq!(point.shape(), &[3, 2]);
    assert!(space.belongs(&point.view(), constants::ATOL).unwrap()[IxDyn(&[])]);
    for copy in 0..3 {
        let slice = space.component(&point.view(), copy).unwrap();
        assert!(space
            .base_manifold()
            .belongs(&slice.view(), constants::ATOL)
            .unwrap()[IxDyn(&[])]);
    }
}

#[test]
fn test_scales_length_must_match_copies() {
    let err = nfold_metric(Euclidean::new(2).unwrap(), 3, Some(vec![1.0, 2.0])).unwrap_err();
    assert!(err.is_validation(), "{err}");
}

#[test]
fn test_geodesic_needs_end_point_or_tangent() {
    let metric = sphere_product(2, None);
    let point = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]].into_dyn();
    let err = metric.geodesic(&point.view(), None, None).unwrap_err();
    assert!(matches!(err, ManifoldError::AmbiguousSpecification { .. }));
}

#[test]
fn test_geodesic_rejects_inconsistent_arguments() {
    let metric = sphere_product(2, None);
    let p = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]].into_dyn();
    let q = array![[0.0, 1.0, 0.0], [0.0, 0.0, 1.0]].into_dyn();
    let wrong = array![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0]].into_dyn();
    let err = metric
        .geodesic(&p.view(), Some(&q.view()), Some(&wrong.view()))
        .unwrap_err();
    assert!(matches!(err, ManifoldError::InconsistentSpecification { .. }));
}

#[test]
fn test_batched_geodesic_hits_both_ends() {
    let metric = sphere_product(3, Some(vec![1.0, 0.5, 2.0]));
    let mut rng = StdRng::seed_from_u64(2);
    let p = metric.space().random_point_with(&mut rng, 4, 1.0).unwrap();
    let q = metric.space().random_point_with(&mut rng, 4, 1.0).unwrap();

    let geodesic = metric.geodesic(&p.view(), Some(&q.view()), None).unwrap();
    let path = geodesic.eval(&[0.0, 0.5, 1.0]).unwrap();
    assert_eq!(path.shape(), &[4, 3, 3, 3]);
    assert_relative_eq!(path.index_axis(Axis(1), 0), p.view(), epsilon = 1e-10);
    assert_relative_eq!(path.index_axis(Axis(1), 2), q.view(), epsilon = 1e-8);

    let midpoints = path.index_axis(Axis(1), 1).to_owned();
    assert!(metric
        .space()
        .belongs(&midpoints.view(), 1e-10)
        .unwrap()
        .iter()
        .all(|&b| b));
}

#[test]
fn test_scaled_distance_weights_each_copy() {
    let base = Hypersphere::new(2).unwrap();
    let metric = nfold_metric(base, 2, Some(vec![1.0, 4.0])).unwrap();
    let p = array![[1.0, 0.0, 0.0], [1.0, 0.0, 0.0]].into_dyn();
    let q = array![[0.0, 1.0, 0.0], [0.0, 1.0, 0.0]].into_dyn();
    let sq = metric.squared_dist(&p.view(), &q.view()).unwrap();
    let quarter = std::f64::consts::FRAC_PI_2;
    assert_relative_eq!(sq[IxDyn(&[])], 5.0 * quarter * quarter, max_relative = constants::RTOL);
}

#[test]
fn test_shared_base_metric_space() {
    let space = Arc::new(NFoldManifold::new(Hypersphere::new(3).unwrap(), 2).unwrap());
    let metric = NFoldMetric::<HypersphereMetric>::with_default_base(Arc::clone(&space), None).unwrap();
    assert!(Arc::ptr_eq(metric.space(), &space));
    assert!(Arc::ptr_eq(
        metric.base_metric().space(),
        &space.shared_base()
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn inner_product_is_scaled_sum_of_copies(
        seed in any::<u64>(),
        n_copies in 1usize..5,
        n_samples in 1usize..4,
        scale in 0.1f64..5.0,
    ) {
        let scales: Vec<f64> = (0..n_copies).map(|i| scale * (i + 1) as f64).collect();
        let metric = sphere_product(n_copies, Some(scales.clone()));
        let sphere = metric.space().base_manifold();
        let mut rng = StdRng::seed_from_u64(seed);

        let p = metric.space().random_point_with(&mut rng, n_samples, 1.0).unwrap();
        let u = random_tangent_vec(sphere, &mut rng, &p.view()).unwrap();
        let v = random_tangent_vec(sphere, &mut rng, &p.view()).unwrap();

        let inner = metric.inner_product(&u.view(), &v.view(), &p.view()).unwrap();
        prop_assert_eq!(inner.shape(), &[n_samples]);

        for sample in 0..n_samples {
            let mut expected = 0.0;
            for (copy, s) in scales.iter().enumerate() {
                let pick = |t: &Tensor| t.index_axis(Axis(0), sample).index_axis(Axis(0), copy).to_owned();
                let base_inner = metric
                    .base_metric()
                    .inner_product(&pick(&u).view(), &pick(&v).view(), &pick(&p).view())
                    .unwrap();
                expected += s * base_inner[IxDyn(&[])];
            }
            prop_assert!((inner[[sample]] - expected).abs() <= 1e-9 * (1.0 + expected.abs()));
        }
    }

    #[test]
    fn tangent_projection_is_idempotent(seed in any::<u64>(), n_copies in 1usize..4) {
        let space = NFoldManifold::new(Hypersphere::new(2).unwrap(), n_copies).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let p = space.random_point_with(&mut rng, 2, 1.0).unwrap();
        let noise = Euclidean::new(3).unwrap()
            .random_point_with(&mut rng, 2 * n_copies, 1.0)
            .unwrap()
            .into_shape_with_order(IxDyn(&[2, n_copies, 3]))
            .unwrap();

        let once = space.to_tangent(&noise.view(), &p.view()).unwrap();
        let twice = space.to_tangent(&once.view(), &p.view()).unwrap();
        prop_assert!(once.iter().zip(twice.iter()).all(|(a, b)| (a - b).abs() < 1e-12));
        prop_assert!(space.is_tangent(&once.view(), &p.view(), 1e-10).unwrap().iter().all(|&b| b));
    }

    #[test]
    fn exp_inverts_log(seed in any::<u64>(), n_copies in 1usize..4) {
        let metric = sphere_product(n_copies, None);
        let mut rng = StdRng::seed_from_u64(seed);
        let p = metric.space().random_point_with(&mut rng, 3, 1.0).unwrap();
        let q = metric.space().random_point_with(&mut rng, 3, 1.0).unwrap();

        // Antipodal pairs have no unique logarithm.
        let cosines = ndarray::Zip::from(p.lanes(Axis(2)))
            .and(q.lanes(Axis(2)))
            .map_collect(|a, b| a.dot(&b));
        prop_assume!(cosines.iter().all(|&c| c > -0.99));

        let log = metric.log(&q.view(), &p.view()).unwrap();
        let back = metric.exp(&log.view(), &p.view()).unwrap();
        prop_assert!(back.iter().zip(q.iter()).all(|(a, b)| (a - b).abs() < 1e-8));
    }

    #[test]
    fn squared_dist_matches_log_norm(seed in any::<u64>(), n_copies in 1usize..4) {
        let scales: Vec<f64> = (1..=n_copies).map(|i| i as f64).collect();
        let metric = sphere_product(n_copies, Some(scales));
        let mut rng = StdRng::seed_from_u64(seed);
        let p = metric.space().random_point_with(&mut rng, 2, 1.0).unwrap();
        let q = metric.space().random_point_with(&mut rng, 2, 1.0).unwrap();

        let cosines = ndarray::Zip::from(p.lanes(Axis(2)))
            .and(q.lanes(Axis(2)))
            .map_collect(|a, b| a.dot(&b));
        prop_assume!(cosines.iter().all(|&c| c > -0.99));

        let closed = metric.squared_dist(&p.view(), &q.view()).unwrap();
        let log = metric.log(&q.view(), &p.view()).unwrap();
        let via_log = metric.squared_norm(&log.view(), &p.view()).unwrap();
        for (a, b) in closed.iter().zip(via_log.iter()) {
            prop_assert!((a - b).abs() <= 1e-8 * (1.0 + b.abs()));
        }
    }
}
