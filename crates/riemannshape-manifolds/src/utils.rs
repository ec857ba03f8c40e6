//! Per-element helpers shared by the concrete manifolds.
//!
//! Closed-form maps are written for a single point and lifted to arbitrary
//! batch shapes through [`BatchMerge`] with an empty group.

use ndarray::{Array2, ArrayView1, ArrayView2, Ix1, Ix2};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use riemannshape_core::{
    error::Result,
    types::{Tensor, TensorView},
    vectorization::BatchMerge,
};

/// Resolves the batch of `arrays` for `point_shape`, applies `f` to each
/// element and stacks the `trailing`-shaped outputs as `[*batch, *trailing]`.
pub fn map_points<F>(
    point_shape: &[usize],
    trailing: &[usize],
    arrays: &[TensorView<'_>],
    f: F,
) -> Result<Tensor>
where
    F: Fn(&[TensorView<'_>]) -> Result<Tensor>,
{
    let plan = BatchMerge::resolve(&[], point_shape, arrays)?;
    let merged = arrays
        .iter()
        .map(|array| plan.merge(array))
        .collect::<Result<Vec<_>>>()?;
    plan.map_elements(&merged, trailing, f)
}

/// Runs `f` for every index in `0..len`, in parallel when the `parallel`
/// feature is enabled. Results keep index order.
pub fn map_indices<T, F>(len: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        (0..len).into_par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..len).map(f).collect()
    }
}

/// Views a single point as a vector.
pub fn as_vector<'a>(view: &TensorView<'a>) -> Result<ArrayView1<'a, f64>> {
    Ok(view.clone().into_dimensionality::<Ix1>()?)
}

/// Views a single point as a matrix (rows are sampling points).
pub fn as_matrix<'a>(view: &TensorView<'a>) -> Result<ArrayView2<'a, f64>> {
    Ok(view.clone().into_dimensionality::<Ix2>()?)
}

/// Prepends a zero row: curve samples without the pinned origin become the
/// full list of sampling points.
pub fn with_origin(curve: &ArrayView2<'_, f64>) -> Array2<f64> {
    let (rows, cols) = curve.dim();
    let mut full = Array2::zeros((rows + 1, cols));
    full.slice_mut(ndarray::s![1.., ..]).assign(curve);
    full
}

/// Piecewise-linear interpolation of `samples` (one row per grid point of a
/// uniform grid on `[0, 1]`) at parameters `params`.
pub fn interpolate_rows(samples: &ArrayView2<'_, f64>, params: &[f64]) -> Array2<f64> {
    let n_rows = samples.nrows();
    let last = (n_rows - 1) as f64;
    let mut out = Array2::zeros((params.len(), samples.ncols()));
    for (mut row, &param) in out.outer_iter_mut().zip(params) {
        let position = (param.clamp(0.0, 1.0) * last).min(last);
        let lower = (position.floor() as usize).min(n_rows - 1);
        let upper = (lower + 1).min(n_rows - 1);
        let weight = position - lower as f64;
        row.assign(&(&samples.row(lower) * (1.0 - weight) + &samples.row(upper) * weight));
    }
    out
}

/// Linear interpolation of scalar `values` on a uniform grid on `[0, 1]`.
pub fn interpolate_scalar(values: &[f64], param: f64) -> f64 {
    let last = (values.len() - 1) as f64;
    let position = (param.clamp(0.0, 1.0) * last).min(last);
    let lower = (position.floor() as usize).min(values.len() - 1);
    let upper = (lower + 1).min(values.len() - 1);
    let weight = position - lower as f64;
    values[lower] * (1.0 - weight) + values[upper] * weight
}

/// `n` evenly spaced values from 0 to 1.
pub fn unit_grid(n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![0.0; n];
    }
    let step = 1.0 / (n - 1) as f64;
    (0..n).map(|i| i as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_with_origin() {
        let curve = array![[1.0, 0.0], [2.0, 1.0]];
        let full = with_origin(&curve.view());
        assert_eq!(full, array![[0.0, 0.0], [1.0, 0.0], [2.0, 1.0]]);
    }

    #[test]
    fn test_interpolate_rows_hits_grid_and_midpoints() {
        let samples = array![[0.0], [1.0], [4.0]];
        let out = interpolate_rows(&samples.view(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(out.column(0).to_vec(), vec![0.0, 0.5, 1.0, 2.5, 4.0]);
    }

    #[test]
    fn test_interpolate_scalar_clamps() {
        let values = [0.0, 2.0];
        assert_relative_eq!(interpolate_scalar(&values, -1.0), 0.0);
        assert_relative_eq!(interpolate_scalar(&values, 0.25), 0.5);
        assert_relative_eq!(interpolate_scalar(&values, 2.0), 2.0);
    }

    #[test]
    fn test_map_points_over_batch() {
        let points = array![[3.0, 4.0], [0.0, 1.0], [1.0, 0.0]].into_dyn();
        let norms = map_points(&[2], &[], &[points.view()], |views| {
            let v = as_vector(&views[0])?;
            Ok(ndarray::arr0(v.dot(&v).sqrt()).into_dyn())
        })
        .unwrap();
        assert_eq!(norms, array![5.0, 1.0, 1.0].into_dyn());
    }

    #[test]
    fn test_map_indices_keeps_order() {
        let squares = map_indices(6, |i| Ok(i * i)).unwrap();
        assert_eq!(squares, vec![0, 1, 4, 9, 16, 25]);
    }
}
