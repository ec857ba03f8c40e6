//! Euclidean space R^n with its flat metric.
//!
//! The simplest substrate for composite manifolds: every finite vector is a
//! point, every tangent space is R^n itself and geodesics are straight lines.

use ndarray::{Array2, ArrayD, IxDyn};
use rand::RngCore;
use rand_distr::{Distribution, Uniform};
use riemannshape_core::{
    error::{ManifoldError, Result},
    manifold::{check_n_samples, sample_shape, Capabilities, Manifold},
    metric::{DefaultMetric, RiemannianMetric},
    numerical::all_finite,
    types::{BoolTensor, Tensor, TensorView},
    vectorization::{batched_dot, broadcast_arrays, get_batch_shape, reduce_trailing},
};
use std::sync::Arc;

/// Euclidean space R^n, points of shape `(n,)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Euclidean {
    shape: Vec<usize>,
}

impl Euclidean {
    /// Creates R^dim.
    ///
    /// # Errors
    /// Returns an error if `dim` is zero.
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(ManifoldError::invalid_parameter(
                "dim",
                "Euclidean space requires dim >= 1",
            ));
        }
        Ok(Self { shape: vec![dim] })
    }
}

impl Manifold for Euclidean {
    fn name(&self) -> &str {
        "Euclidean"
    }

    fn dim(&self) -> usize {
        self.shape[0]
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::WITH_PROJECTION
    }

    fn belongs(&self, point: &TensorView<'_>, _atol: f64) -> Result<BoolTensor> {
        get_batch_shape(&self.shape, &[point.view()])?;
        reduce_trailing(point.to_owned(), 1, |row| all_finite(row.iter()))
    }

    fn is_tangent(
        &self,
        vector: &TensorView<'_>,
        base_point: &TensorView<'_>,
        _atol: f64,
    ) -> Result<BoolTensor> {
        get_batch_shape(&self.shape, &[vector.view(), base_point.view()])?;
        let arrays = broadcast_arrays(&[vector.view(), base_point.view()])?;
        reduce_trailing(arrays[0].clone(), 1, |row| {
            all_finite(row.iter())
        })
    }

    fn to_tangent(&self, vector: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        get_batch_shape(&self.shape, &[vector.view(), base_point.view()])?;
        let mut arrays = broadcast_arrays(&[vector.view(), base_point.view()])?;
        Ok(arrays.swap_remove(0))
    }

    fn random_point_with(
        &self,
        rng: &mut dyn RngCore,
        n_samples: usize,
        bound: f64,
    ) -> Result<Tensor> {
        check_n_samples(n_samples)?;
        if !(bound > 0.0) {
            return Err(ManifoldError::invalid_parameter(
                "bound",
                format!("must be positive, got {bound}"),
            ));
        }
        let shape = sample_shape(n_samples, &self.shape);
        let uniform = Uniform::new_inclusive(-bound, bound);
        let len = shape.iter().product();
        let data: Vec<f64> = (0..len).map(|_| uniform.sample(rng)).collect();
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), data)?)
    }

    fn projection(&self, point: &TensorView<'_>) -> Result<Tensor> {
        get_batch_shape(&self.shape, &[point.view()])?;
        Ok(point.to_owned())
    }
}

impl DefaultMetric for Euclidean {
    type Metric = EuclideanMetric;

    fn default_metric(space: Arc<Self>) -> Result<Self::Metric> {
        Ok(EuclideanMetric::new(space))
    }
}

/// Flat metric `<u, v> = Σ u_i v_i`.
#[derive(Debug, Clone)]
pub struct EuclideanMetric {
    space: Arc<Euclidean>,
}

impl EuclideanMetric {
    /// Flat metric over `space`.
    pub fn new(space: Arc<Euclidean>) -> Self {
        Self { space }
    }
}

impl RiemannianMetric for EuclideanMetric {
    type Space = Euclidean;

    fn space(&self) -> &Arc<Euclidean> {
        &self.space
    }

    fn metric_matrix(&self, base_point: &TensorView<'_>) -> Result<Tensor> {
        let mut shape = get_batch_shape(&self.space.shape, &[base_point.view()])?;
        let dim = self.space.dim();
        shape.extend([dim, dim]);
        let identity = Array2::<f64>::eye(dim).into_dyn();
        Ok(identity
            .broadcast(IxDyn(&shape))
            .ok_or_else(|| ManifoldError::dimension_mismatch(format!("{shape:?}"), "[dim, dim]"))?
            .to_owned())
    }

    fn inner_product(
        &self,
        tangent_vec_a: &TensorView<'_>,
        tangent_vec_b: &TensorView<'_>,
        base_point: &TensorView<'_>,
    ) -> Result<Tensor> {
        let batch_shape = get_batch_shape(
            &self.space.shape,
            &[tangent_vec_a.view(), tangent_vec_b.view(), base_point.view()],
        )?;
        let inner = batched_dot(tangent_vec_a, tangent_vec_b, 1)?;
        broadcast_scalar(inner, &batch_shape)
    }

    fn exp(&self, tangent_vec: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        get_batch_shape(&self.space.shape, &[tangent_vec.view(), base_point.view()])?;
        Ok(base_point + tangent_vec)
    }

    fn log(&self, point: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        get_batch_shape(&self.space.shape, &[point.view(), base_point.view()])?;
        Ok(point - base_point)
    }

    fn squared_dist(&self, point_a: &TensorView<'_>, point_b: &TensorView<'_>) -> Result<Tensor> {
        get_batch_shape(&self.space.shape, &[point_a.view(), point_b.view()])?;
        let diff = point_b - point_a;
        batched_dot(&diff.view(), &diff.view(), 1)
    }
}

/// Broadcasts a per-batch scalar result to the full batch of all arguments
/// (a base point may carry batch axes the vectors do not).
pub(crate) fn broadcast_scalar(values: Tensor, batch_shape: &[usize]) -> Result<Tensor> {
    if values.shape() == batch_shape {
        return Ok(values);
    }
    Ok(values
        .broadcast(IxDyn(batch_shape))
        .ok_or_else(|| {
            ManifoldError::dimension_mismatch(format!("{batch_shape:?}"), format!("{:?}", values.shape()))
        })?
        .to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_rejects_zero_dim() {
        assert!(Euclidean::new(0).unwrap_err().is_validation());
    }

    #[test]
    fn test_random_points_within_bound() {
        let space = Euclidean::new(3).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let points = space.random_point_with(&mut rng, 5, 0.5).unwrap();
        assert_eq!(points.shape(), &[5, 3]);
        assert!(points.iter().all(|x| x.abs() <= 0.5));
        assert!(space.belongs(&points.view(), 1e-12).unwrap().iter().all(|&b| b));
    }

    #[test]
    fn test_non_finite_point_does_not_belong() {
        let space = Euclidean::new(2).unwrap();
        let points = array![[0.0, 1.0], [f64::NAN, 0.0]].into_dyn();
        let flags = space.belongs(&points.view(), 1e-12).unwrap();
        assert_eq!(flags, array![true, false].into_dyn());
    }

    #[test]
    fn test_metric_closed_forms() {
        let metric = Euclidean::new(2).unwrap().equip().unwrap().into_metric();
        let p = array![1.0, 1.0].into_dyn();
        let q = array![4.0, 5.0].into_dyn();

        let sq = metric.squared_dist(&p.view(), &q.view()).unwrap();
        assert_relative_eq!(sq[IxDyn(&[])], 25.0);

        let log = metric.log(&q.view(), &p.view()).unwrap();
        let back = metric.exp(&log.view(), &p.view()).unwrap();
        assert_relative_eq!(back, q, epsilon = 1e-12);

        let matrix = metric.metric_matrix(&p.view()).unwrap();
        assert_eq!(matrix, Array2::<f64>::eye(2).into_dyn());
    }

    #[test]
    fn test_inner_product_broadcasts_base_point_batch() {
        let metric = Euclidean::new(2).unwrap().equip().unwrap().into_metric();
        let v = array![1.0, 2.0].into_dyn();
        let base = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]].into_dyn();
        let inner = metric.inner_product(&v.view(), &v.view(), &base.view()).unwrap();
        assert_eq!(inner, array![5.0, 5.0, 5.0].into_dyn());
    }
}
