//! Property tests for batch-shape resolution and batch merging.

use ndarray::{Array, ArrayD, IxDyn};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use riemannshape_core::{
    error::ManifoldError,
    vectorization::{get_batch_shape, BatchMerge},
};

fn shape_strategy(max_ndim: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..4, 0..=max_ndim)
}

proptest! {
    #[test]
    fn batch_shape_is_leading_axes(batch in shape_strategy(3), point in shape_strategy(2)) {
        let full: Vec<usize> = batch.iter().chain(&point).copied().collect();
        let array = ArrayD::<f64>::zeros(IxDyn(&full));
        let resolved = get_batch_shape(&point, &[array.view()]).unwrap();
        prop_assert_eq!(resolved, batch);
    }

    #[test]
    fn merge_then_split_is_identity(
        batch in shape_strategy(2),
        n_copies in 1usize..4,
        base in shape_strategy(2),
    ) {
        let full: Vec<usize> = batch.iter().copied().chain([n_copies]).chain(base.iter().copied()).collect();
        let len: usize = full.iter().product();
        let data = Array::from_iter((0..len).map(|i| i as f64))
            .into_shape_with_order(IxDyn(&full))
            .unwrap();

        let plan = BatchMerge::resolve(&[n_copies], &base, &[data.view()]).unwrap();
        let merged = plan.merge(&data.view()).unwrap();
        prop_assert_eq!(merged.shape()[0], plan.merged_len());

        let split = plan.split(merged, &base).unwrap();
        prop_assert_eq!(split, data);
    }
}

#[test]
fn test_batch_shapes_broadcast_across_arguments() {
    // (point shape, argument shapes, expected batch shape)
    let cases: Vec<(Vec<usize>, Vec<Vec<usize>>, Vec<usize>)> = vec![
        (vec![3], vec![vec![3]], vec![]),
        (vec![3], vec![vec![3], vec![7, 3]], vec![7]),
        (vec![5, 3], vec![vec![5, 3], vec![8, 32, 5, 3]], vec![8, 32]),
        (vec![2], vec![vec![4, 1, 2], vec![6, 2]], vec![4, 6]),
        (vec![], vec![vec![2, 3], vec![3]], vec![2, 3]),
    ];
    for (point_shape, shapes, expected) in cases {
        let arrays: Vec<ArrayD<f64>> = shapes.iter().map(|s| ArrayD::zeros(IxDyn(s))).collect();
        let views: Vec<_> = arrays.iter().map(|a| a.view()).collect();
        let resolved = get_batch_shape(&point_shape, &views).unwrap();
        assert_eq!(resolved, expected, "{shapes:?} with point shape {point_shape:?}");

        let plan = BatchMerge::resolve(&[], &point_shape, &views).unwrap();
        assert_eq!(plan.batch_shape(), expected.as_slice());
    }
}

#[test]
fn test_mismatched_point_shape_is_rejected() {
    let cases: Vec<(Vec<usize>, Vec<usize>)> = vec![
        (vec![3], vec![3, 2]),
        (vec![2, 3], vec![3, 2]),
        (vec![], vec![2]),
    ];
    for (array_shape, point_shape) in cases {
        let array = ArrayD::<f64>::zeros(IxDyn(&array_shape));
        let err = get_batch_shape(&point_shape, &[array.view()]).unwrap_err();
        assert!(
            matches!(err, ManifoldError::DimensionMismatch { .. }),
            "{array_shape:?} vs {point_shape:?}"
        );
    }
}

#[test]
fn test_incompatible_batches_are_rejected() {
    let a = ArrayD::<f64>::zeros(IxDyn(&[4, 2]));
    let b = ArrayD::<f64>::zeros(IxDyn(&[5, 2]));
    let err = get_batch_shape(&[2], &[a.view(), b.view()]).unwrap_err();
    assert!(matches!(err, ManifoldError::Shape(_)));
}
