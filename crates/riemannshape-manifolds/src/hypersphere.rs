//! Hypersphere S^n = {x in R^{n+1} : ||x|| = 1}
//!
//! Points are stored in extrinsic coordinates of the ambient R^{n+1}, so the
//! point shape is `(n + 1,)` while the intrinsic dimension is `n`.
//!
//! # Mathematical Properties
//!
//! - **Tangent space**: T_x S^n = {v in R^{n+1} : x^T v = 0}
//! - **Riemannian metric**: inherited from the ambient Euclidean space
//! - **Exponential map**: exp_x(v) = cos(||v||) x + sin(||v||) v/||v||
//! - **Logarithmic map**: log_x(y) = θ (y - cos(θ)x) / sin(θ), θ = arccos(x^T y)

use crate::euclidean::broadcast_scalar;
use crate::utils::{as_vector, map_points};
use ndarray::{Array2, ArrayD, Axis, IxDyn};
use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};
use riemannshape_core::{
    error::{ManifoldError, Result},
    manifold::{check_n_samples, sample_shape, Capabilities, CoordsType, Manifold},
    metric::{DefaultMetric, RiemannianMetric},
    numerical::{clamp_cosine, inv_sinc, sinc},
    types::{constants::EPSILON, BoolTensor, Tensor, TensorView},
    vectorization::{batched_dot, broadcast_arrays, get_batch_shape},
};
use std::sync::Arc;

/// The unit hypersphere S^dim embedded in R^{dim+1}.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hypersphere {
    dim: usize,
    shape: Vec<usize>,
}

impl Hypersphere {
    /// Creates S^dim.
    ///
    /// # Errors
    /// Returns an error if `dim` is zero.
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(ManifoldError::invalid_parameter(
                "dim",
                "Hypersphere requires dim >= 1",
            ));
        }
        Ok(Self {
            dim,
            shape: vec![dim + 1],
        })
    }

    /// Dimension of the embedding space.
    pub fn embedding_dim(&self) -> usize {
        self.dim + 1
    }
}

impl Manifold for Hypersphere {
    fn name(&self) -> &str {
        "Hypersphere"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn default_coords_type(&self) -> CoordsType {
        CoordsType::Extrinsic
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::WITH_PROJECTION
    }

    fn belongs(&self, point: &TensorView<'_>, atol: f64) -> Result<BoolTensor> {
        get_batch_shape(&self.shape, &[point.view()])?;
        let sq_norms = batched_dot(point, point, 1)?;
        Ok(sq_norms.mapv(|sq| (sq - 1.0).abs() <= atol))
    }

    fn is_tangent(
        &self,
        vector: &TensorView<'_>,
        base_point: &TensorView<'_>,
        atol: f64,
    ) -> Result<BoolTensor> {
        get_batch_shape(&self.shape, &[vector.view(), base_point.view()])?;
        let inner = batched_dot(vector, base_point, 1)?;
        Ok(inner.mapv(|x| x.abs() <= atol))
    }

    fn to_tangent(&self, vector: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        get_batch_shape(&self.shape, &[vector.view(), base_point.view()])?;
        let arrays = broadcast_arrays(&[vector.view(), base_point.view()])?;
        let (vector, base_point) = (&arrays[0], &arrays[1]);
        let inner = batched_dot(&vector.view(), &base_point.view(), 1)?;
        let inner = inner.insert_axis(Axis(vector.ndim() - 1));
        let normal = base_point * &inner;
        Ok(vector - &normal)
    }

    fn random_point_with(
        &self,
        rng: &mut dyn RngCore,
        n_samples: usize,
        _bound: f64,
    ) -> Result<Tensor> {
        check_n_samples(n_samples)?;
        let n = self.embedding_dim();
        let mut samples = Array2::<f64>::zeros((n_samples, n));
        for mut row in samples.outer_iter_mut() {
            loop {
                row.mapv_inplace(|_| StandardNormal.sample(&mut *rng));
                let norm = row.dot(&row).sqrt();
                if norm > EPSILON {
                    row /= norm;
                    break;
                }
            }
        }
        Ok(samples
            .into_dyn()
            .into_shape_with_order(IxDyn(&sample_shape(n_samples, &self.shape)))?)
    }

    fn projection(&self, point: &TensorView<'_>) -> Result<Tensor> {
        let n = self.embedding_dim();
        map_points(&self.shape, &[n], &[point.view()], |views| {
            let x = as_vector(&views[0])?;
            let norm = x.dot(&x).sqrt();
            if norm < EPSILON {
                return Err(ManifoldError::numerical_error(
                    "cannot project the origin onto the hypersphere",
                ));
            }
            Ok((&x / norm).into_dyn())
        })
    }
}

impl DefaultMetric for Hypersphere {
    type Metric = HypersphereMetric;

    fn default_metric(space: Arc<Self>) -> Result<Self::Metric> {
        Ok(HypersphereMetric::new(space))
    }
}

/// Round metric induced by the ambient Euclidean inner product.
#[derive(Debug, Clone)]
pub struct HypersphereMetric {
    space: Arc<Hypersphere>,
}

impl HypersphereMetric {
    /// Round metric over `space`.
    pub fn new(space: Arc<Hypersphere>) -> Self {
        Self { space }
    }
}

impl RiemannianMetric for HypersphereMetric {
    type Space = Hypersphere;

    fn space(&self) -> &Arc<Hypersphere> {
        &self.space
    }

    /// Ambient (extrinsic) metric matrix: the identity of R^{dim+1}.
    fn metric_matrix(&self, base_point: &TensorView<'_>) -> Result<Tensor> {
        let mut shape = get_batch_shape(&self.space.shape, &[base_point.view()])?;
        let n = self.space.embedding_dim();
        shape.extend([n, n]);
        let identity = Array2::<f64>::eye(n).into_dyn();
        Ok(identity
            .broadcast(IxDyn(&shape))
            .ok_or_else(|| ManifoldError::dimension_mismatch(format!("{shape:?}"), "[n, n]"))?
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
        broadcast_scalar(batched_dot(tangent_vec_a, tangent_vec_b, 1)?, &batch_shape)
    }

    fn exp(&self, tangent_vec: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        let n = self.space.embedding_dim();
        map_points(
            &self.space.shape,
            &[n],
            &[tangent_vec.view(), base_point.view()],
            |views| {
                let v = as_vector(&views[0])?;
                let x = as_vector(&views[1])?;
                let norm = v.dot(&v).sqrt();
                Ok((&x * norm.cos() + &v * sinc(norm)).into_dyn())
            },
        )
    }

    fn log(&self, point: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        let n = self.space.embedding_dim();
        map_points(
            &self.space.shape,
            &[n],
            &[point.view(), base_point.view()],
            |views| {
                let y = as_vector(&views[0])?;
                let x = as_vector(&views[1])?;
                let cos_theta = clamp_cosine(x.dot(&y));
                let theta = cos_theta.acos();
                if theta.sin() < EPSILON && cos_theta < 0.0 {
                    // Antipodal points: every great circle is minimizing
                    return Err(ManifoldError::numerical_error(
                        "logarithm is undefined between antipodal points",
                    ));
                }
                Ok(((&y - &(&x * cos_theta)) * inv_sinc(theta)).into_dyn())
            },
        )
    }

    fn squared_dist(&self, point_a: &TensorView<'_>, point_b: &TensorView<'_>) -> Result<Tensor> {
        get_batch_shape(&self.space.shape, &[point_a.view(), point_b.view()])?;
        let inner = batched_dot(point_a, point_b, 1)?;
        Ok(inner.mapv(|c| clamp_cosine(c).acos().powi(2)))
    }
}

/// Convenience: uniformly distributed tangent vectors at `base_point`.
pub fn random_tangent_vec(
    space: &Hypersphere,
    rng: &mut dyn RngCore,
    base_point: &TensorView<'_>,
) -> Result<Tensor> {
    let noise: Vec<f64> = (0..base_point.len())
        .map(|_| StandardNormal.sample(&mut *rng))
        .collect();
    let noise = ArrayD::from_shape_vec(IxDyn(base_point.shape()), noise)?;
    space.to_tangent(&noise.view(), base_point)
}
