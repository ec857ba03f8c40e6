//! Common test manifolds for use in unit tests.
//!
//! This module provides reusable implementations of simple manifolds
//! that can be used across different test modules, reducing code duplication.

#![cfg(any(test, feature = "test-utils"))]

use crate::{
    error::{ManifoldError, Result},
    manifold::{check_n_samples, sample_shape, Manifold},
    metric::{DefaultMetric, RiemannianMetric},
    types::{BoolTensor, Tensor, TensorView},
    vectorization::{batched_dot, broadcast_arrays, get_batch_shape},
};
use ndarray::{ArrayD, IxDyn};
use rand::{Rng, RngCore};
use std::sync::Arc;

/// A minimal flat manifold for basic testing.
///
/// Points are vectors of shape `(dim,)`; every vector is a point and every
/// vector is tangent. No projection is declared.
#[derive(Debug, Clone)]
pub struct MinimalTestManifold {
    shape: Vec<usize>,
}

impl MinimalTestManifold {
    pub fn new(dim: usize) -> Self {
        Self { shape: vec![dim] }
    }
}

impl Manifold for MinimalTestManifold {
    fn name(&self) -> &str {
        "MinimalTest"
    }

    fn dim(&self) -> usize {
        self.shape[0]
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn belongs(&self, point: &TensorView<'_>, _atol: f64) -> Result<BoolTensor> {
        let batch_shape = get_batch_shape(&self.shape, &[point.view()])?;
        Ok(ArrayD::from_elem(IxDyn(&batch_shape), true))
    }

    fn is_tangent(
        &self,
        vector: &TensorView<'_>,
        base_point: &TensorView<'_>,
        _atol: f64,
    ) -> Result<BoolTensor> {
        let batch_shape = get_batch_shape(&self.shape, &[vector.view(), base_point.view()])?;
        Ok(ArrayD::from_elem(IxDyn(&batch_shape), true))
    }

    fn to_tangent(&self, vector: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        let mut arrays = broadcast_arrays(&[vector.view(), base_point.view()])?;
        get_batch_shape(&self.shape, &[arrays[0].view()])?;
        Ok(arrays.swap_remove(0))
    }

    fn random_point_with(
        &self,
        rng: &mut dyn RngCore,
        n_samples: usize,
        bound: f64,
    ) -> Result<Tensor> {
        check_n_samples(n_samples)?;
        let shape = sample_shape(n_samples, &self.shape);
        let len = shape.iter().product();
        let data: Vec<f64> = (0..len).map(|_| rng.gen_range(-bound..=bound)).collect();
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), data)?)
    }
}

impl DefaultMetric for MinimalTestManifold {
    type Metric = ScaledTestMetric;

    fn default_metric(space: Arc<Self>) -> Result<Self::Metric> {
        ScaledTestMetric::new(space, 1.0)
    }
}

/// Flat metric `scale * <a, b>` on [`MinimalTestManifold`].
#[derive(Debug, Clone)]
pub struct ScaledTestMetric {
    space: Arc<MinimalTestManifold>,
    scale: f64,
}

impl ScaledTestMetric {
    pub fn new(space: Arc<MinimalTestManifold>, scale: f64) -> Result<Self> {
        if !(scale > 0.0) {
            return Err(ManifoldError::invalid_parameter(
                "scale",
                format!("must be positive, got {scale}"),
            ));
        }
        Ok(Self { space, scale })
    }
}

impl RiemannianMetric for ScaledTestMetric {
    type Space = MinimalTestManifold;

    fn space(&self) -> &Arc<Self::Space> {
        &self.space
    }

    fn metric_matrix(&self, base_point: &TensorView<'_>) -> Result<Tensor> {
        let batch_shape = get_batch_shape(&self.space.shape, &[base_point.view()])?;
        let dim = self.space.dim();
        let identity = ndarray::Array2::<f64>::eye(dim) * self.scale;
        let mut shape = batch_shape;
        shape.extend([dim, dim]);
        identity
            .into_dyn()
            .broadcast(IxDyn(&shape))
            .map(|view| view.to_owned())
            .ok_or_else(|| ManifoldError::dimension_mismatch(format!("{shape:?}"), "(dim, dim)"))
    }

    fn inner_product(
        &self,
        tangent_vec_a: &TensorView<'_>,
        tangent_vec_b: &TensorView<'_>,
        base_point: &TensorView<'_>,
    ) -> Result<Tensor> {
        get_batch_shape(
            &self.space.shape,
            &[tangent_vec_a.view(), tangent_vec_b.view(), base_point.view()],
        )?;
        Ok(batched_dot(tangent_vec_a, tangent_vec_b, 1)? * self.scale)
    }

    fn exp(&self, tangent_vec: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        get_batch_shape(&self.space.shape, &[tangent_vec.view(), base_point.view()])?;
        Ok(base_point + tangent_vec)
    }

    fn log(&self, point: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        get_batch_shape(&self.space.shape, &[point.view(), base_point.view()])?;
        Ok(point - base_point)
    }
}
