//! Closed discrete curves and the SRV closure projector.
//!
//! A curve stored without its origin closes up when its last sampled point
//! returns to the origin. In SRV coordinates this is the nonlinear constraint
//!
//! ```text
//! F(q) = Σ q_i |q_i| / (k-1) = 0
//! ```
//!
//! which [`ClosedDiscreteCurves::srv_projection`] enforces with damped Newton
//! steps followed by a rescaling that preserves the curve length.

use crate::discrete_curves::DiscreteCurves;
use crate::utils::{as_matrix, map_indices};
use ndarray::{s, Array1, Array2, ArrayD, ArrayView2, ArrayViewD, Axis, IxDyn};
use rand::RngCore;
use rand_distr::{Distribution, Uniform};
use riemannshape_core::{
    config::SolverConfig,
    error::{ManifoldError, Result},
    manifold::{check_n_samples, sample_shape, Capabilities, CoordsType, Manifold},
    numerical::{all_finite, solve_symmetric},
    types::{constants::EPSILON, BoolTensor, DMatrix, DVector, Tensor, TensorView},
    vectorization::{broadcast_arrays, get_batch_shape, reduce_trailing, stack, BatchMerge},
};
use std::f64::consts::PI;
use tracing::{debug, trace, warn};

/// Step halvings tried before a Newton step is declared stalled.
const MAX_HALVINGS: usize = 10;

/// Relative amplitude of the periodic perturbations of random curves.
const PERTURBATION: f64 = 0.1;

/// Fourier modes used by random curves.
const N_MODES: usize = 3;

/// Outcome of projecting SRV representations onto closed curves.
#[derive(Debug, Clone)]
pub struct SrvProjection {
    /// Projected SRV representations `[*batch, k - 1, d]`.
    pub srv: Tensor,
    /// `|F(q)|` of the returned representation, `[*batch]`.
    pub closure_error: Tensor,
    /// Newton iterations used, `[*batch]`.
    pub iterations: ArrayD<usize>,
    /// Whether the closure error fell below `atol`, `[*batch]`.
    pub converged: BoolTensor,
}

impl SrvProjection {
    /// True when every batch element converged.
    pub fn all_converged(&self) -> bool {
        self.converged.iter().all(|&c| c)
    }
}

/// Closed curves in R^ambient_dim sampled at `k_sampling_points` points.
#[derive(Debug, Clone)]
pub struct ClosedDiscreteCurves {
    curves: DiscreteCurves,
    config: SolverConfig,
}

impl ClosedDiscreteCurves {
    /// Creates the space of closed curves, projecting with default solver
    /// settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `ambient_dim < 2` or
    /// `k_sampling_points < 3`.
    pub fn new(ambient_dim: usize, k_sampling_points: usize) -> Result<Self> {
        if ambient_dim < 2 {
            return Err(ManifoldError::invalid_parameter(
                "ambient_dim",
                format!("closed curves need an ambient dimension >= 2, got {ambient_dim}"),
            ));
        }
        Ok(Self {
            curves: DiscreteCurves::new(ambient_dim, k_sampling_points)?,
            config: SolverConfig::default(),
        })
    }

    /// Replaces the solver settings used by [`Manifold::projection`].
    pub fn with_config(mut self, config: SolverConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// The enclosing space of open curves.
    pub fn open_curves(&self) -> &DiscreteCurves {
        &self.curves
    }

    /// Solver settings used by [`Manifold::projection`].
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Distance of the last sampled point from the origin, `[*batch]`.
    pub fn closure_error(&self, point: &TensorView<'_>) -> Result<Tensor> {
        get_batch_shape(self.shape(), &[point.view()])?;
        let d = self.curves.ambient_dim();
        reduce_trailing(point.to_owned(), 2, |curve| last_row_norm(&curve, d))
    }

    /// Projects SRV representations onto the SRV image of closed curves.
    ///
    /// Stops per element once `|F(q)| < config.atol` or after
    /// `config.max_iter` Newton steps; the best iterate is returned with an
    /// explicit convergence flag.
    pub fn srv_projection(&self, srv: &TensorView<'_>, config: &SolverConfig) -> Result<SrvProjection> {
        config.validate()?;
        let shape = self.shape().to_vec();
        let n = self.curves.n_segments() as f64;
        let plan = BatchMerge::resolve(&[], &shape, &[srv.view()])?;
        let merged = plan.merge(srv)?;

        let results = map_indices(plan.merged_len(), |i| {
            let q = as_matrix(&merged.index_axis(Axis(0), i))?;
            close_srv(&q, n, config)
        })?;

        let n_converged = results.iter().filter(|r| r.converged).count();
        debug!(
            curves = results.len(),
            converged = n_converged,
            "srv closure projection finished"
        );
        if n_converged < results.len() {
            warn!(
                unconverged = results.len() - n_converged,
                max_iter = config.max_iter,
                "srv closure projection did not reach atol"
            );
        }

        let projected: Vec<Tensor> = results.iter().map(|r| r.srv.clone().into_dyn()).collect();
        let merged_shape = [plan.merged_len()];
        let closure_error = ArrayD::from_shape_vec(
            IxDyn(&merged_shape),
            results.iter().map(|r| r.closure_error).collect(),
        )?;
        let iterations = ArrayD::from_shape_vec(
            IxDyn(&merged_shape),
            results.iter().map(|r| r.iterations).collect(),
        )?;
        let converged = ArrayD::from_shape_vec(
            IxDyn(&merged_shape),
            results.iter().map(|r| r.converged).collect(),
        )?;

        Ok(SrvProjection {
            srv: plan.split(stack(&shape, &projected)?, &shape)?,
            closure_error: plan.split(closure_error, &[])?,
            iterations: plan.split(iterations, &[])?,
            converged: plan.split(converged, &[])?,
        })
    }

    /// Closes curves with explicit solver settings: SRV transform, closure
    /// projection, inverse SRV.
    pub fn project_with(&self, point: &TensorView<'_>, config: &SolverConfig) -> Result<Tensor> {
        let srv = self.curves.srv_transform(point)?;
        let projected = self.srv_projection(&srv.view(), config)?;
        self.curves.srv_inverse(&projected.srv.view())
    }
}

impl Manifold for ClosedDiscreteCurves {
    fn name(&self) -> &str {
        "ClosedDiscreteCurves"
    }

    /// Closing the curve removes `ambient_dim` degrees of freedom.
    fn dim(&self) -> usize {
        (self.curves.n_segments() - 1) * self.curves.ambient_dim()
    }

    fn shape(&self) -> &[usize] {
        self.curves.shape()
    }

    fn default_coords_type(&self) -> CoordsType {
        CoordsType::Extrinsic
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::WITH_PROJECTION
    }

    fn belongs(&self, point: &TensorView<'_>, atol: f64) -> Result<BoolTensor> {
        get_batch_shape(self.shape(), &[point.view()])?;
        let d = self.curves.ambient_dim();
        reduce_trailing(point.to_owned(), 2, |curve| {
            all_finite(curve.iter()) && last_row_norm(&curve, d) < atol
        })
    }

    fn is_tangent(
        &self,
        vector: &TensorView<'_>,
        base_point: &TensorView<'_>,
        atol: f64,
    ) -> Result<BoolTensor> {
        get_batch_shape(self.shape(), &[vector.view(), base_point.view()])?;
        let arrays = broadcast_arrays(&[vector.view(), base_point.view()])?;
        let d = self.curves.ambient_dim();
        reduce_trailing(arrays[0].clone(), 2, |v| last_row_norm(&v, d) < atol)
    }

    fn to_tangent(&self, vector: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        get_batch_shape(self.shape(), &[vector.view(), base_point.view()])?;
        let mut tangent = broadcast_arrays(&[vector.view(), base_point.view()])?.swap_remove(0);
        let row_axis = Axis(tangent.ndim() - 2);
        let last = tangent.len_of(row_axis) - 1;
        tangent.index_axis_mut(row_axis, last).fill(0.0);
        Ok(tangent)
    }

    /// Perturbed circles of radius about `bound` in the first two
    /// coordinates, translated to start at the origin and closed by
    /// [`Manifold::projection`].
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
        let k = self.curves.k_sampling_points();
        let d = self.curves.ambient_dim();
        let amplitude = Uniform::new_inclusive(-1.0, 1.0);
        let weight = PERTURBATION / (2 * N_MODES) as f64;

        let mut data = Vec::with_capacity(n_samples * (k - 1) * d);
        for _ in 0..n_samples {
            let modes: Vec<Vec<(f64, f64)>> = (0..d)
                .map(|_| {
                    (1..=N_MODES)
                        .map(|_| (amplitude.sample(rng) * weight, amplitude.sample(rng) * weight))
                        .collect()
                })
                .collect();
            let mut curve = Array2::<f64>::zeros((k, d));
            for i in 0..k {
                let theta = 2.0 * PI * i as f64 / (k - 1) as f64;
                for (j, coefficients) in modes.iter().enumerate() {
                    let wave: f64 = coefficients
                        .iter()
                        .enumerate()
                        .map(|(m, (a, b))| {
                            let mode = (m + 1) as f64 * theta;
                            a * mode.cos() + b * mode.sin()
                        })
                        .sum();
                    curve[(i, j)] = bound
                        * match j {
                            0 => (1.0 + wave) * theta.cos(),
                            1 => (1.0 + wave) * theta.sin(),
                            _ => wave,
                        };
                }
            }
            let origin = curve.row(0).to_owned();
            curve -= &origin;
            data.extend(curve.slice(s![1.., ..]).iter().copied());
        }
        let points = ArrayD::from_shape_vec(IxDyn(&sample_shape(n_samples, self.shape())), data)?;
        self.projection(&points.view())
    }

    fn projection(&self, point: &TensorView<'_>) -> Result<Tensor> {
        self.project_with(point, &self.config)
    }
}

struct ClosedSrv {
    srv: Array2<f64>,
    closure_error: f64,
    iterations: usize,
    converged: bool,
}

/// Norm of the last `ambient_dim` entries of a flattened curve.
fn last_row_norm(flat: &ArrayViewD<'_, f64>, ambient_dim: usize) -> f64 {
    flat.iter()
        .skip(flat.len() - ambient_dim)
        .map(|x| x * x)
        .sum::<f64>()
        .sqrt()
}

/// `F(q) = Σ q_i |q_i| / (k-1)`, the end point of the curve.
fn closure(q: &Array2<f64>, n_segments: f64) -> Array1<f64> {
    let mut total = Array1::zeros(q.ncols());
    for row in q.outer_iter() {
        total.scaled_add(row.dot(&row).sqrt() / n_segments, &row);
    }
    total
}

fn closure_norm(q: &Array2<f64>, n_segments: f64) -> f64 {
    let f = closure(q, n_segments);
    f.dot(&f).sqrt()
}

fn l2_squared(q: &Array2<f64>, n_segments: f64) -> f64 {
    q.mapv(|x| x * x).sum() / n_segments
}

/// Newton direction `δ = Σ_l c_l b_l` with `G c = -F(q)`.
fn newton_direction(q: &Array2<f64>, n_segments: f64) -> Result<Array2<f64>> {
    let d = q.ncols();
    let residual = closure(q, n_segments);
    let mut gram = DMatrix::zeros(d, d);
    for row in q.outer_iter() {
        let sq_norm = row.dot(&row);
        for j in 0..d {
            for l in 0..d {
                let diagonal = if j == l { sq_norm } else { 0.0 };
                gram[(j, l)] += (diagonal + 3.0 * row[j] * row[l]) / n_segments;
            }
        }
    }
    let rhs = DVector::from_iterator(d, residual.iter().map(|x| -x));
    let coefficients = solve_symmetric(&gram, &rhs)?;

    let mut direction = Array2::zeros(q.raw_dim());
    for (mut out, row) in direction.outer_iter_mut().zip(q.outer_iter()) {
        let norm = row.dot(&row).sqrt();
        if norm <= EPSILON {
            continue;
        }
        let projection: f64 = row.iter().zip(coefficients.iter()).map(|(q, c)| q * c).sum();
        for (j, value) in out.iter_mut().enumerate() {
            *value = norm * coefficients[j] + projection * row[j] / norm;
        }
    }
    Ok(direction)
}

fn rescale(q: Array2<f64>, target_sq_norm: f64, n_segments: f64) -> Array2<f64> {
    let sq_norm = l2_squared(&q, n_segments);
    if sq_norm <= EPSILON {
        return q;
    }
    q * (target_sq_norm / sq_norm).sqrt()
}

fn close_srv(initial: &ArrayView2<'_, f64>, n_segments: f64, config: &SolverConfig) -> Result<ClosedSrv> {
    let mut q = initial.to_owned();
    let target = l2_squared(&q, n_segments);
    let mut error = closure_norm(&q, n_segments);
    let mut best = q.clone();
    let mut best_error = error;
    let mut iterations = 0;

    while best_error >= config.atol && iterations < config.max_iter {
        iterations += 1;
        let direction = newton_direction(&q, n_segments)?;

        let mut step = 1.0;
        let mut accepted = None;
        for _ in 0..=MAX_HALVINGS {
            let candidate = rescale(&q + &(&direction * step), target, n_segments);
            let candidate_error = closure_norm(&candidate, n_segments);
            if candidate_error < error {
                accepted = Some((candidate, candidate_error));
                break;
            }
            step *= 0.5;
        }

        let Some((candidate, candidate_error)) = accepted else {
            trace!(iteration = iterations, error, "srv closure step stalled");
            break;
        };
        q = candidate;
        error = candidate_error;
        trace!(iteration = iterations, error, step, "srv closure step");
        if error < best_error {
            best_error = error;
            best = q.clone();
        }
    }

    Ok(ClosedSrv {
        srv: best,
        closure_error: best_error,
        iterations,
        converged: best_error < config.atol,
    })
}
