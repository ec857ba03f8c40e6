//! Shape space of discrete curves: the SRV total space fibered by
//! reparametrisations that fix both end points.
//!
//! The orbit of a curve `c` is `{c ∘ φ}` for increasing diffeomorphisms `φ`
//! of `[0, 1]`. Its tangent space is spanned by `u(s) c'(s)` with `u`
//! vanishing at the ends; on the sampling grid this is spanned by the unit
//! tangents at the interior sampling points.
//!
//! Alignment removes the vertical part of the geodesic velocity by
//! integrating a reparametrisation along the path:
//!
//! ```text
//! ∂t φ = -λ(t, φ) / |∂s γ(t, φ)|,    φ(t = 0) = id
//! c_end  <-  c_end ∘ φ(t = 1)
//! ```

use crate::discrete_curves::{
    curve_of, srv_differential_of, srv_of, DiscreteCurves, SrvMetric,
};
use crate::utils::{
    as_matrix, interpolate_rows, interpolate_scalar, map_indices, unit_grid, with_origin,
};
use nalgebra::DMatrix;
use ndarray::{s, Array1, Array2, ArrayD, ArrayView2, Axis, IxDyn};
use riemannshape_core::{
    config::SolverConfig,
    error::Result,
    fiber_bundle::{Alignment, FiberBundle, QuotientMetric},
    manifold::Manifold,
    metric::RiemannianMetric,
    numerical::{project_onto_span, to_dvector},
    types::{constants::EPSILON, Tensor, TensorView},
    vectorization::{stack, BatchMerge},
};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Quotient metric of curve shapes modulo reparametrisation.
pub type SrvQuotientMetric = QuotientMetric<SrvShapeBundle>;

/// Discrete curves with the SRV metric, fibered by reparametrisations.
#[derive(Debug, Clone)]
pub struct SrvShapeBundle {
    metric: SrvMetric,
}

impl SrvShapeBundle {
    /// Bundle over `space` with the SRV metric.
    pub fn new(space: Arc<DiscreteCurves>) -> Self {
        Self::from_metric(SrvMetric::new(space))
    }

    /// Bundle over an existing SRV metric.
    pub fn from_metric(metric: SrvMetric) -> Self {
        Self { metric }
    }

    /// The total space.
    pub fn space(&self) -> &Arc<DiscreteCurves> {
        self.metric.space()
    }

    /// Quotient metric with the given alignment settings.
    pub fn quotient_metric(self, config: SolverConfig) -> Result<SrvQuotientMetric> {
        QuotientMetric::new(self, config)
    }

    /// Spanning set of the vertical space at every base point:
    /// `[*batch, k - 2, k - 1, d]`.
    pub fn vertical_basis(&self, base_point: &TensorView<'_>) -> Result<Tensor> {
        let shape = self.space().shape().to_vec();
        let plan = BatchMerge::resolve(&[], &shape, &[base_point.view()])?;
        let merged = plan.merge(base_point)?;
        let n_vectors = self.space().k_sampling_points() - 2;
        let trailing: Vec<usize> = std::iter::once(n_vectors).chain(shape).collect();
        plan.map_elements(&[merged], &trailing, |views| {
            let curve = as_matrix(&views[0])?;
            let basis: Vec<Tensor> = vertical_basis_of(&curve)
                .into_iter()
                .map(|u| u.into_dyn())
                .collect();
            stack(&trailing[1..], &basis)
        })
    }
}

impl FiberBundle for SrvShapeBundle {
    type Metric = SrvMetric;

    fn total_space_metric(&self) -> &SrvMetric {
        &self.metric
    }

    /// The norms are the coefficients `λ_i` of the vertical component in
    /// the unit-tangent spanning set, `[*batch, k - 2]`.
    fn vertical_projection_with_norm(
        &self,
        tangent_vec: &TensorView<'_>,
        base_point: &TensorView<'_>,
    ) -> Result<(Tensor, Tensor)> {
        let shape = self.space().shape().to_vec();
        let n = self.space().n_segments() as f64;
        let plan = BatchMerge::resolve(&[], &shape, &[tangent_vec.view(), base_point.view()])?;
        let vectors = plan.merge(tangent_vec)?;
        let points = plan.merge(base_point)?;

        let parts = map_indices(plan.merged_len(), |i| {
            let v = as_matrix(&vectors.index_axis(Axis(0), i))?;
            let curve = as_matrix(&points.index_axis(Axis(0), i))?;
            vertical_split(&curve, &v, n)
        })?;

        let n_vectors = self.space().k_sampling_points() - 2;
        let (verticals, coefficients): (Vec<Tensor>, Vec<Tensor>) = parts
            .into_iter()
            .map(|(vertical, lambda)| (vertical.into_dyn(), lambda.into_dyn()))
            .unzip();
        let vertical = plan.split(stack(&shape, &verticals)?, &shape)?;
        let norms = plan.split(stack(&[n_vectors], &coefficients)?, &[n_vectors])?;
        Ok((vertical, norms))
    }

    fn align(
        &self,
        point: &TensorView<'_>,
        base_point: &TensorView<'_>,
        config: &SolverConfig,
    ) -> Result<Alignment> {
        config.validate()?;
        let shape = self.space().shape().to_vec();
        let n = self.space().n_segments() as f64;
        let plan = BatchMerge::resolve(&[], &shape, &[point.view(), base_point.view()])?;
        let ends = plan.merge(point)?;
        let starts = plan.merge(base_point)?;

        let results = map_indices(plan.merged_len(), |i| {
            let end = as_matrix(&ends.index_axis(Axis(0), i))?;
            let start = as_matrix(&starts.index_axis(Axis(0), i))?;
            align_curve(&end, &start, n, config)
        })?;

        let n_converged = results.iter().filter(|r| r.converged).count();
        let worst_horizontality = results
            .iter()
            .map(|r| r.horizontality)
            .fold(0.0_f64, f64::max);
        debug!(
            curves = results.len(),
            converged = n_converged,
            horizontality = worst_horizontality,
            "srv alignment finished"
        );
        if n_converged < results.len() {
            warn!(
                unconverged = results.len() - n_converged,
                max_iter = config.max_iter,
                "srv alignment stopped at the iteration cap"
            );
        }

        let aligned: Vec<Tensor> = results.iter().map(|r| r.aligned.clone().into_dyn()).collect();
        let merged_shape = [plan.merged_len()];
        let gap = ArrayD::from_shape_vec(
            IxDyn(&merged_shape),
            results.iter().map(|r| r.gap).collect(),
        )?;
        let horizontality = ArrayD::from_shape_vec(
            IxDyn(&merged_shape),
            results.iter().map(|r| r.horizontality).collect(),
        )?;
        let iterations = ArrayD::from_shape_vec(
            IxDyn(&merged_shape),
            results.iter().map(|r| r.iterations).collect(),
        )?;
        let converged = ArrayD::from_shape_vec(
            IxDyn(&merged_shape),
            results.iter().map(|r| r.converged).collect(),
        )?;

        Ok(Alignment {
            aligned: plan.split(stack(&shape, &aligned)?, &shape)?,
            gap: plan.split(gap, &[])?,
            horizontality: plan.split(horizontality, &[])?,
            iterations: plan.split(iterations, &[])?,
            converged: plan.split(converged, &[])?,
        })
    }
}

struct CurveAlignment {
    aligned: Array2<f64>,
    gap: f64,
    horizontality: f64,
    iterations: usize,
    converged: bool,
}

/// Unit central-difference tangents at the interior sampling points, each
/// embedded as a tangent vector moving a single point.
fn vertical_basis_of(curve: &ArrayView2<'_, f64>) -> Vec<Array2<f64>> {
    let full = with_origin(curve);
    (1..curve.nrows())
        .map(|i| {
            let diff = &full.row(i + 1) - &full.row(i - 1);
            let norm = diff.dot(&diff).sqrt();
            let mut u = Array2::zeros(curve.raw_dim());
            if norm > EPSILON {
                u.row_mut(i - 1).assign(&(diff / norm));
            }
            u
        })
        .collect()
}

/// `|∂s c|` at every sampling point from central differences; zero at the
/// two ends, where reparametrisations do not move the curve.
fn central_speeds(curve: &ArrayView2<'_, f64>, n_segments: f64) -> Vec<f64> {
    let full = with_origin(curve);
    let k = full.nrows();
    let mut speeds = vec![0.0; k];
    for i in 1..k - 1 {
        let diff = &full.row(i + 1) - &full.row(i - 1);
        speeds[i] = diff.dot(&diff).sqrt() * n_segments / 2.0;
    }
    speeds
}

/// Vertical component of `tangent_vec` at `curve` and its coefficients.
///
/// The SRV metric is a uniformly weighted L2 product of SRV differentials,
/// so the projection is a Euclidean projection of the flattened
/// differentials.
fn vertical_split(
    curve: &ArrayView2<'_, f64>,
    tangent_vec: &ArrayView2<'_, f64>,
    n_segments: f64,
) -> Result<(Array2<f64>, Array1<f64>)> {
    let basis = vertical_basis_of(curve);
    let len = tangent_vec.len();
    let columns: Vec<f64> = basis
        .iter()
        .flat_map(|u| srv_differential_of(&u.view(), curve, n_segments).into_iter())
        .collect();
    let matrix = DMatrix::from_vec(len, basis.len(), columns);
    let dq = srv_differential_of(tangent_vec, curve, n_segments);
    let target = to_dvector(&dq.view().into_dyn());
    let (coefficients, _) = project_onto_span(&matrix, &target)?;

    let mut vertical = Array2::zeros(tangent_vec.raw_dim());
    for (u, &lambda) in basis.iter().zip(coefficients.iter()) {
        vertical.scaled_add(lambda, u);
    }
    Ok((vertical, Array1::from_iter(coefficients.iter().copied())))
}

/// `Σ |q_a - q_b|² / (k-1)` for two single curves.
fn srv_squared_dist(q_a: &Array2<f64>, q_b: &Array2<f64>, n_segments: f64) -> f64 {
    (q_a - q_b).mapv(|x| x * x).sum() / n_segments
}

/// Clamps to `[0, 1]`, pins the end points and makes `phi` non-decreasing.
fn make_monotone(phi: &mut [f64]) {
    let last = phi.len() - 1;
    phi[0] = 0.0;
    phi[last] = 1.0;
    let mut running = 0.0_f64;
    for value in phi.iter_mut() {
        running = running.max(value.clamp(0.0, 1.0));
        *value = running;
    }
}

/// Curves along the SRV geodesic from `start_srv` to `end`, sampled at
/// `n_times` evenly spaced times.
fn srv_path(
    start_srv: &Array2<f64>,
    end: &ArrayView2<'_, f64>,
    n_segments: f64,
    n_times: usize,
) -> Vec<Array2<f64>> {
    let end_srv = srv_of(end, n_segments);
    unit_grid(n_times)
        .iter()
        .map(|&t| {
            let srv = start_srv * (1.0 - t) + &end_srv * t;
            curve_of(&srv.view(), n_segments)
        })
        .collect()
}

/// SRV-metric norm of a tangent vector at `curve`.
fn srv_norm(
    tangent_vec: &ArrayView2<'_, f64>,
    curve: &ArrayView2<'_, f64>,
    n_segments: f64,
) -> f64 {
    let dq = srv_differential_of(tangent_vec, curve, n_segments);
    (dq.mapv(|x| x * x).sum() / n_segments).sqrt()
}

/// Largest `|ver(v)| / |v|` over the finite-difference velocities of a
/// sampled path. Steps that barely move are skipped.
fn path_horizontality(path: &[Array2<f64>], n_segments: f64) -> Result<f64> {
    let dt = 1.0 / (path.len() - 1) as f64;
    let mut worst = 0.0_f64;
    for window in path.windows(2) {
        let velocity = (&window[1] - &window[0]) / dt;
        let speed = srv_norm(&velocity.view(), &window[0].view(), n_segments);
        if speed <= EPSILON {
            continue;
        }
        let (vertical, _) = vertical_split(&window[0].view(), &velocity.view(), n_segments)?;
        let vertical_norm = srv_norm(&vertical.view(), &window[0].view(), n_segments);
        worst = worst.max(vertical_norm / speed);
    }
    Ok(worst)
}

/// One reparametrisation sweep along the SRV geodesic from `start` to `end`.
fn reparametrisation(
    start_srv: &Array2<f64>,
    end: &ArrayView2<'_, f64>,
    n_segments: f64,
    n_times: usize,
) -> Result<Vec<f64>> {
    let path = srv_path(start_srv, end, n_segments, n_times);
    let k = end.nrows() + 1;
    let dt = 1.0 / (n_times - 1) as f64;
    let mut phi = unit_grid(k);
    let mut speed_field = vec![0.0; k];
    for window in path.windows(2) {
        let velocity = (&window[1] - &window[0]) / dt;
        let (_, lambda) = vertical_split(&window[0].view(), &velocity.view(), n_segments)?;
        let speeds = central_speeds(&window[0].view(), n_segments);
        for i in 1..k - 1 {
            speed_field[i] = if speeds[i] > EPSILON {
                lambda[i - 1] / speeds[i]
            } else {
                0.0
            };
        }
        for value in phi.iter_mut() {
            *value -= dt * interpolate_scalar(&speed_field, *value);
        }
    }
    make_monotone(&mut phi);
    Ok(phi)
}

/// Iterates reparametrisation sweeps and keeps the iterate closest to
/// `start`. The reported gap belongs to that iterate.
fn align_curve(
    end: &ArrayView2<'_, f64>,
    start: &ArrayView2<'_, f64>,
    n_segments: f64,
    config: &SolverConfig,
) -> Result<CurveAlignment> {
    let start_srv = srv_of(start, n_segments);
    let mut current = end.to_owned();
    let mut best = current.clone();
    let mut best_dist = srv_squared_dist(&start_srv, &srv_of(end, n_segments), n_segments);
    let mut best_gap = f64::INFINITY;
    let mut iterations = 0;

    while iterations < config.max_iter {
        iterations += 1;
        let phi = reparametrisation(&start_srv, &current.view(), n_segments, config.n_times)?;
        let resampled = interpolate_rows(&with_origin(&current.view()).view(), &phi);
        let next = resampled.slice(s![1.., ..]).to_owned();

        let gap = (&next - &current).mapv(|x| x * x).sum() / next.len() as f64;
        current = next;
        let dist = srv_squared_dist(&start_srv, &srv_of(&current.view(), n_segments), n_segments);
        trace!(iteration = iterations, gap, dist, "srv alignment step");
        // Ties within rounding replace the best iterate.
        if dist <= best_dist + EPSILON * (1.0 + best_dist) {
            best_dist = dist;
            best_gap = gap;
            best = current.clone();
        }
        if gap < config.threshold {
            break;
        }
    }

    let path = srv_path(&start_srv, &best.view(), n_segments, config.n_times);
    let horizontality = path_horizontality(&path, n_segments)?;

    Ok(CurveAlignment {
        aligned: best,
        gap: best_gap,
        horizontality,
        iterations,
        converged: best_gap < config.threshold,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn bundle(d: usize, k: usize) -> SrvShapeBundle {
        SrvShapeBundle::new(Arc::new(DiscreteCurves::new(d, k).unwrap()))
    }

    #[test]
    fn test_vertical_basis_shape() {
        let bundle = bundle(2, 6);
        let mut rng = StdRng::seed_from_u64(3);
        let points = bundle.space().random_point_with(&mut rng, 4, 1.0).unwrap();
        let basis = bundle.vertical_basis(&points.view()).unwrap();
        assert_eq!(basis.shape(), &[4, 4, 5, 2]);
    }

    #[test]
    fn test_decomposition_sums_and_is_orthogonal() {
        let bundle = bundle(2, 7);
        let mut rng = StdRng::seed_from_u64(5);
        let p = bundle.space().random_point_with(&mut rng, 3, 1.0).unwrap();
        let v = bundle.space().random_point_with(&mut rng, 3, 1.0).unwrap();

        let (vertical, norms) = bundle
            .vertical_projection_with_norm(&v.view(), &p.view())
            .unwrap();
        assert_eq!(norms.shape(), &[3, 5]);
        let horizontal = bundle.horizontal_projection(&v.view(), &p.view()).unwrap();
        assert_relative_eq!(&vertical + &horizontal, v, epsilon = 1e-10);

        let inner = bundle
            .total_space_metric()
            .inner_product(&vertical.view(), &horizontal.view(), &p.view())
            .unwrap();
        for value in inner.iter() {
            assert_relative_eq!(*value, 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_vertical_vector_projects_onto_itself() {
        let bundle = bundle(2, 5);
        let curve = array![[0.3, 0.1], [0.5, 0.4], [0.6, 0.9], [1.0, 1.0]].into_dyn();
        let basis = bundle.vertical_basis(&curve.view()).unwrap();
        let vertical = basis.index_axis(Axis(0), 1).to_owned() * 2.0;
        assert!(bundle
            .is_vertical(&vertical.view(), &curve.view(), 1e-8)
            .unwrap()[IxDyn(&[])]);
    }

    #[test]
    fn test_monotone_reparametrisation() {
        let mut phi = vec![0.1, 0.05, 0.4, 0.3, 1.2];
        make_monotone(&mut phi);
        assert_eq!(phi, vec![0.0, 0.05, 0.4, 0.4, 1.0]);
    }

    #[test]
    fn test_align_identical_curves_converges_immediately() {
        let bundle = bundle(2, 6);
        let mut rng = StdRng::seed_from_u64(7);
        let p = bundle.space().random_point_with(&mut rng, 1, 1.0).unwrap();
        let alignment = bundle.align(&p.view(), &p.view(), &SolverConfig::default()).unwrap();
        assert!(alignment.all_converged());
        assert_eq!(alignment.iterations[IxDyn(&[])], 1);
        assert_relative_eq!(alignment.aligned, p, epsilon = 1e-10);
    }

    #[test]
    fn test_align_rejects_invalid_config() {
        let bundle = bundle(2, 4);
        let p = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0]].into_dyn();
        let config = SolverConfig {
            n_times: 1,
            ..SolverConfig::default()
        };
        assert!(bundle.align(&p.view(), &p.view(), &config).unwrap_err().is_validation());
    }
}
