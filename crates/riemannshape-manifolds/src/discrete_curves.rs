//! Discrete curves and the square-root-velocity (SRV) metric.
//!
//! A curve in R^d is sampled at `k` points `P_0, ..., P_{k-1}` on the uniform
//! parameter grid `s_i = i / (k-1)`. The first point is pinned at the origin
//! and omitted from storage, so a point of the space has shape `(k-1, d)`.
//!
//! # SRV transform
//!
//! ```text
//! v_i = (k-1) (P_{i+1} - P_i)           discrete velocity
//! q_i = v_i / sqrt(|v_i|)               square-root velocity
//! ```
//!
//! The inverse integrates `v_i = q_i |q_i|` from the origin. The SRV metric
//! is the pull-back of the L2 metric `<a, b> = Σ a_i·b_i / (k-1)` through the
//! transform, so geodesics are straight lines between SRV representations.

use crate::euclidean::broadcast_scalar;
use crate::utils::{as_matrix, map_points, with_origin};
use nalgebra::DMatrix;
use ndarray::{s, Array1, Array2, ArrayView2, ArrayD, IxDyn};
use rand::RngCore;
use rand_distr::{Distribution, Uniform};
use riemannshape_core::{
    error::{ManifoldError, Result},
    manifold::{check_n_samples, sample_shape, Manifold},
    metric::{DefaultMetric, RiemannianMetric},
    numerical::all_finite,
    types::{constants::EPSILON, BoolTensor, Tensor, TensorView},
    vectorization::{batched_dot, broadcast_arrays, get_batch_shape, reduce_trailing},
};
use std::f64::consts::PI;
use std::sync::Arc;

/// Number of sine/cosine bends per coordinate in random curves.
const N_BENDS: usize = 3;

/// Bend coefficients are uniform in `[-a, a] / sqrt(d)`; with three bends
/// the bend speed stays below `3.67 a`, under the unit drift.
const BEND_AMPLITUDE: f64 = 0.25;

/// Curves in R^ambient_dim sampled at `k_sampling_points` points, starting
/// at the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscreteCurves {
    ambient_dim: usize,
    k_sampling_points: usize,
    shape: Vec<usize>,
}

impl DiscreteCurves {
    /// Creates the space of discrete curves.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `ambient_dim == 0` or
    /// `k_sampling_points < 3`.
    pub fn new(ambient_dim: usize, k_sampling_points: usize) -> Result<Self> {
        if ambient_dim == 0 {
            return Err(ManifoldError::invalid_parameter(
                "ambient_dim",
                "curves need an ambient dimension >= 1",
            ));
        }
        if k_sampling_points < 3 {
            return Err(ManifoldError::invalid_parameter(
                "k_sampling_points",
                format!("need at least 3 sampling points, got {k_sampling_points}"),
            ));
        }
        Ok(Self {
            ambient_dim,
            k_sampling_points,
            shape: vec![k_sampling_points - 1, ambient_dim],
        })
    }

    /// Dimension of the space the curves live in.
    pub fn ambient_dim(&self) -> usize {
        self.ambient_dim
    }

    /// Number of sampling points, origin included.
    pub fn k_sampling_points(&self) -> usize {
        self.k_sampling_points
    }

    /// Number of segments `k - 1`, also the number of stored rows.
    pub fn n_segments(&self) -> usize {
        self.k_sampling_points - 1
    }

    fn segments(&self) -> f64 {
        self.n_segments() as f64
    }

    /// All `k` sampling points, origin included: `[*batch, k, d]`.
    pub fn sampling_points(&self, point: &TensorView<'_>) -> Result<Tensor> {
        let trailing = [self.k_sampling_points, self.ambient_dim];
        map_points(&self.shape, &trailing, &[point.view()], |views| {
            Ok(with_origin(&as_matrix(&views[0])?).into_dyn())
        })
    }

    /// SRV representation of every batched curve.
    pub fn srv_transform(&self, point: &TensorView<'_>) -> Result<Tensor> {
        let n = self.segments();
        map_points(&self.shape, &self.shape, &[point.view()], |views| {
            Ok(srv_of(&as_matrix(&views[0])?, n).into_dyn())
        })
    }

    /// Curve with the given SRV representation, starting at the origin.
    pub fn srv_inverse(&self, srv: &TensorView<'_>) -> Result<Tensor> {
        let n = self.segments();
        map_points(&self.shape, &self.shape, &[srv.view()], |views| {
            Ok(curve_of(&as_matrix(&views[0])?, n).into_dyn())
        })
    }

    /// Differential of the SRV transform at `base_point` applied to
    /// `tangent_vec`.
    pub fn srv_differential(
        &self,
        tangent_vec: &TensorView<'_>,
        base_point: &TensorView<'_>,
    ) -> Result<Tensor> {
        let n = self.segments();
        map_points(
            &self.shape,
            &self.shape,
            &[tangent_vec.view(), base_point.view()],
            |views| {
                let h = as_matrix(&views[0])?;
                let curve = as_matrix(&views[1])?;
                Ok(srv_differential_of(&h, &curve, n).into_dyn())
            },
        )
    }

    /// Inverse of [`DiscreteCurves::srv_differential`]: the curve
    /// perturbation whose SRV differential is `srv_tangent`.
    pub fn srv_differential_inverse(
        &self,
        srv_tangent: &TensorView<'_>,
        base_point: &TensorView<'_>,
    ) -> Result<Tensor> {
        let n = self.segments();
        map_points(
            &self.shape,
            &self.shape,
            &[srv_tangent.view(), base_point.view()],
            |views| {
                let dq = as_matrix(&views[0])?;
                let curve = as_matrix(&views[1])?;
                Ok(srv_differential_inverse_of(&dq, &curve, n).into_dyn())
            },
        )
    }
}

impl Manifold for DiscreteCurves {
    fn name(&self) -> &str {
        "DiscreteCurves"
    }

    fn dim(&self) -> usize {
        self.n_segments() * self.ambient_dim
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn belongs(&self, point: &TensorView<'_>, _atol: f64) -> Result<BoolTensor> {
        get_batch_shape(&self.shape, &[point.view()])?;
        reduce_trailing(point.to_owned(), 2, |curve| all_finite(curve.iter()))
    }

    fn is_tangent(
        &self,
        vector: &TensorView<'_>,
        base_point: &TensorView<'_>,
        _atol: f64,
    ) -> Result<BoolTensor> {
        get_batch_shape(&self.shape, &[vector.view(), base_point.view()])?;
        let arrays = broadcast_arrays(&[vector.view(), base_point.view()])?;
        reduce_trailing(arrays[0].clone(), 2, |v| all_finite(v.iter()))
    }

    fn to_tangent(&self, vector: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        get_batch_shape(&self.shape, &[vector.view(), base_point.view()])?;
        let mut arrays = broadcast_arrays(&[vector.view(), base_point.view()])?;
        Ok(arrays.swap_remove(0))
    }

    /// Smooth random curves from the origin: a straight drift of speed
    /// `bound` in a random direction plus low-frequency bends. The bends
    /// never cancel the drift, so sampled curves have no stationary points.
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
        let d = self.ambient_dim;
        let unit = Uniform::new_inclusive(-1.0, 1.0);
        let amplitude = BEND_AMPLITUDE / (d as f64).sqrt();
        let mut data = Vec::with_capacity(n_samples * self.n_segments() * d);
        for _ in 0..n_samples {
            let mut drift: Vec<f64> = (0..d).map(|_| unit.sample(rng)).collect();
            let norm = drift.iter().map(|x| x * x).sum::<f64>().sqrt();
            if norm > 1e-3 {
                drift.iter_mut().for_each(|x| *x /= norm);
            } else {
                drift = (0..d).map(|j| if j == 0 { 1.0 } else { 0.0 }).collect();
            }
            let bends: Vec<(f64, f64)> = (0..d * N_BENDS)
                .map(|_| (amplitude * unit.sample(rng), amplitude * unit.sample(rng)))
                .collect();

            for i in 1..self.k_sampling_points {
                let s = i as f64 / self.segments();
                for (j, direction) in drift.iter().enumerate() {
                    let mut value = direction * s;
                    for m in 1..=N_BENDS {
                        let (a, b) = bends[j * N_BENDS + m - 1];
                        let freq = m as f64 * PI;
                        value += (a * (freq * s).sin() + b * (1.0 - (freq * s).cos()))
                            / (m as f64 * freq);
                    }
                    data.push(bound * value);
                }
            }
        }
        Ok(ArrayD::from_shape_vec(
            IxDyn(&sample_shape(n_samples, &self.shape)),
            data,
        )?)
    }
}

impl DefaultMetric for DiscreteCurves {
    type Metric = SrvMetric;

    fn default_metric(space: Arc<Self>) -> Result<Self::Metric> {
        Ok(SrvMetric::new(space))
    }
}

/// Elastic metric pulled back from L2 through the SRV transform.
#[derive(Debug, Clone)]
pub struct SrvMetric {
    space: Arc<DiscreteCurves>,
}

impl SrvMetric {
    /// SRV metric over `space`.
    pub fn new(space: Arc<DiscreteCurves>) -> Self {
        Self { space }
    }

    /// L2 inner product of SRV-space vectors, weight `1 / (k-1)`.
    pub fn l2_inner_product(&self, a: &TensorView<'_>, b: &TensorView<'_>) -> Result<Tensor> {
        let weight = 1.0 / self.space.segments();
        Ok(batched_dot(a, b, 2)? * weight)
    }
}

impl RiemannianMetric for SrvMetric {
    type Space = DiscreteCurves;

    fn space(&self) -> &Arc<DiscreteCurves> {
        &self.space
    }

    /// Dense matrix `JᵀJ / (k-1)` of the pulled-back metric in the flattened
    /// coordinates of a curve, `[*batch, dim, dim]`.
    fn metric_matrix(&self, base_point: &TensorView<'_>) -> Result<Tensor> {
        let n = self.space.segments();
        let dim = self.space.dim();
        let (rows, cols) = (self.space.n_segments(), self.space.ambient_dim);
        map_points(&self.space.shape, &[dim, dim], &[base_point.view()], |views| {
            let curve = as_matrix(&views[0])?;
            let mut jacobian = DMatrix::<f64>::zeros(dim, dim);
            let mut h = Array2::<f64>::zeros((rows, cols));
            for column in 0..dim {
                h.fill(0.0);
                h[(column / cols, column % cols)] = 1.0;
                let dq = srv_differential_of(&h.view(), &curve, n);
                for (row, value) in dq.iter().enumerate() {
                    jacobian[(row, column)] = *value;
                }
            }
            let gram = jacobian.transpose() * &jacobian / n;
            let data: Vec<f64> = (0..dim)
                .flat_map(|i| (0..dim).map(move |j| (i, j)))
                .map(|(i, j)| gram[(i, j)])
                .collect();
            Ok(ArrayD::from_shape_vec(IxDyn(&[dim, dim]), data)?)
        })
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
        let dq_a = self.space.srv_differential(tangent_vec_a, base_point)?;
        let dq_b = self.space.srv_differential(tangent_vec_b, base_point)?;
        broadcast_scalar(self.l2_inner_product(&dq_a.view(), &dq_b.view())?, &batch_shape)
    }

    /// Straight line in SRV space, mapped back to curves.
    fn exp(&self, tangent_vec: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        let n = self.space.segments();
        map_points(
            &self.space.shape,
            &self.space.shape,
            &[tangent_vec.view(), base_point.view()],
            |views| {
                let h = as_matrix(&views[0])?;
                let curve = as_matrix(&views[1])?;
                let srv = srv_of(&curve, n) + srv_differential_of(&h, &curve, n);
                Ok(curve_of(&srv.view(), n).into_dyn())
            },
        )
    }

    fn log(&self, point: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        let n = self.space.segments();
        map_points(
            &self.space.shape,
            &self.space.shape,
            &[point.view(), base_point.view()],
            |views| {
                let end = as_matrix(&views[0])?;
                let curve = as_matrix(&views[1])?;
                let dq = srv_of(&end, n) - srv_of(&curve, n);
                Ok(srv_differential_inverse_of(&dq.view(), &curve, n).into_dyn())
            },
        )
    }

    /// `Σ |q_a - q_b|² / (k-1)`.
    fn squared_dist(&self, point_a: &TensorView<'_>, point_b: &TensorView<'_>) -> Result<Tensor> {
        let srv_a = self.space.srv_transform(point_a)?;
        let srv_b = self.space.srv_transform(point_b)?;
        let arrays = broadcast_arrays(&[srv_a.view(), srv_b.view()])?;
        let diff = &arrays[0] - &arrays[1];
        self.l2_inner_product(&diff.view(), &diff.view())
    }
}

/// Discrete velocities `(k-1)(P_{i+1} - P_i)` of a stored curve.
pub(crate) fn velocities(curve: &ArrayView2<'_, f64>, n_segments: f64) -> Array2<f64> {
    let full = with_origin(curve);
    (&full.slice(s![1.., ..]) - &full.slice(s![..-1, ..])) * n_segments
}

/// SRV representation of a single curve.
pub(crate) fn srv_of(curve: &ArrayView2<'_, f64>, n_segments: f64) -> Array2<f64> {
    let mut q = velocities(curve, n_segments);
    for mut row in q.outer_iter_mut() {
        let norm = row.dot(&row).sqrt();
        if norm > EPSILON {
            row /= norm.sqrt();
        } else {
            row.fill(0.0);
        }
    }
    q
}

/// Curve with SRV representation `srv`, integrated from the origin.
pub(crate) fn curve_of(srv: &ArrayView2<'_, f64>, n_segments: f64) -> Array2<f64> {
    let mut curve = Array2::zeros(srv.raw_dim());
    let mut position = Array1::<f64>::zeros(srv.ncols());
    for (mut out, q) in curve.outer_iter_mut().zip(srv.outer_iter()) {
        let norm = q.dot(&q).sqrt();
        position.scaled_add(norm / n_segments, &q);
        out.assign(&position);
    }
    curve
}

/// `dq_i = dv_i / |v_i|^½ - ½ <dv_i, v_i> v_i / |v_i|^{5/2}`.
pub(crate) fn srv_differential_of(
    tangent_vec: &ArrayView2<'_, f64>,
    curve: &ArrayView2<'_, f64>,
    n_segments: f64,
) -> Array2<f64> {
    let v = velocities(curve, n_segments);
    let mut dq = velocities(tangent_vec, n_segments);
    for (mut dq_i, v_i) in dq.outer_iter_mut().zip(v.outer_iter()) {
        let norm = v_i.dot(&v_i).sqrt();
        if norm > EPSILON {
            let radial = dq_i.dot(&v_i) / norm.powf(2.5);
            dq_i /= norm.sqrt();
            dq_i.scaled_add(-0.5 * radial, &v_i);
        } else {
            dq_i.fill(0.0);
        }
    }
    dq
}

/// `dv_i = |q_i| dq_i + <q_i, dq_i> q_i / |q_i|`, integrated from the origin.
pub(crate) fn srv_differential_inverse_of(
    srv_tangent: &ArrayView2<'_, f64>,
    curve: &ArrayView2<'_, f64>,
    n_segments: f64,
) -> Array2<f64> {
    let q = srv_of(curve, n_segments);
    let mut h = Array2::zeros(srv_tangent.raw_dim());
    let mut position = Array1::<f64>::zeros(srv_tangent.ncols());
    for ((mut out, dq_i), q_i) in h
        .outer_iter_mut()
        .zip(srv_tangent.outer_iter())
        .zip(q.outer_iter())
    {
        let norm = q_i.dot(&q_i).sqrt();
        if norm > EPSILON {
            position.scaled_add(norm / n_segments, &dq_i);
            position.scaled_add(q_i.dot(&dq_i) / (norm * n_segments), &q_i);
        }
        out.assign(&position);
    }
    h
}
