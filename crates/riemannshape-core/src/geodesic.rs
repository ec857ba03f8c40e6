//! Geodesic curves produced by a metric.
//!
//! A [`Geodesic`] is fixed once at construction by an initial point and an
//! initial velocity, the latter either given directly or obtained as the
//! logarithm of an end point. Evaluation at times `t` yields
//! `exp(t * v, p)` for every batched pair `(p, v)`.

use crate::{
    error::{ManifoldError, Result},
    manifold::Manifold,
    metric::RiemannianMetric,
    types::{constants, Tensor, TensorView},
    vectorization::{allclose, broadcast_arrays, get_batch_shape, stack, BatchMerge},
};
use ndarray::Axis;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A batch of geodesics `t ↦ exp(t v, p)`.
#[derive(Debug, Clone)]
pub struct Geodesic<'a, M: RiemannianMetric> {
    metric: &'a M,
    initial_point: Tensor,
    initial_tangent_vec: Tensor,
    batch_shape: Vec<usize>,
}

impl<'a, M: RiemannianMetric> Geodesic<'a, M> {
    /// Builds the geodesic from an end point, an initial velocity, or both.
    ///
    /// # Errors
    ///
    /// - `AmbiguousSpecification` when neither is given
    /// - `InconsistentSpecification` when both are given and the velocity
    ///   differs from the logarithm of the end point
    pub fn new(
        metric: &'a M,
        initial_point: &TensorView<'_>,
        end_point: Option<&TensorView<'_>>,
        initial_tangent_vec: Option<&TensorView<'_>>,
    ) -> Result<Self> {
        let tangent = match (end_point, initial_tangent_vec) {
            (None, None) => {
                return Err(ManifoldError::ambiguous_specification(
                    "specify an end point or an initial tangent vector to define the geodesic",
                ))
            }
            (None, Some(tangent_vec)) => tangent_vec.to_owned(),
            (Some(end_point), given) => {
                let shooting = metric.log(end_point, initial_point)?;
                if let Some(given) = given {
                    if !allclose(
                        &shooting.view(),
                        given,
                        constants::GEODESIC_RTOL,
                        constants::GEODESIC_ATOL,
                    ) {
                        return Err(ManifoldError::inconsistent_specification(
                            "the initial tangent vector is not the logarithm of the end point",
                        ));
                    }
                }
                shooting
            }
        };

        let space_shape = metric.space().shape();
        let mut arrays = broadcast_arrays(&[initial_point.view(), tangent.view()])?;
        let batch_shape = get_batch_shape(space_shape, &[arrays[0].view()])?;
        let initial_tangent_vec = arrays.pop().ok_or_else(|| {
            ManifoldError::numerical_error("geodesic arguments vanished while broadcasting")
        })?;
        let initial_point = arrays.pop().ok_or_else(|| {
            ManifoldError::numerical_error("geodesic arguments vanished while broadcasting")
        })?;
        tracing::trace!(
            space = metric.space().name(),
            batch_shape = ?batch_shape,
            "geodesic initialized"
        );

        Ok(Self {
            metric,
            initial_point,
            initial_tangent_vec,
            batch_shape,
        })
    }

    /// Initial points, broadcast to `[*batch, *shape]`.
    pub fn initial_point(&self) -> &Tensor {
        &self.initial_point
    }

    /// Initial velocities, broadcast to `[*batch, *shape]`.
    pub fn initial_tangent_vec(&self) -> &Tensor {
        &self.initial_tangent_vec
    }

    /// Leading batch shape; empty for a single geodesic.
    pub fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    /// Evaluates every geodesic at `times`.
    ///
    /// Returns `[*batch, times.len(), *shape]`.
    pub fn eval(&self, times: &[f64]) -> Result<Tensor> {
        let space_shape = self.metric.space().shape().to_vec();
        let plan = BatchMerge::new(self.batch_shape.clone(), Vec::new(), space_shape.clone());
        let points = plan.merge(&self.initial_point.view())?;
        let tangents = plan.merge(&self.initial_tangent_vec.view())?;

        let path = |i: usize| -> Result<Tensor> {
            let point = points.index_axis(Axis(0), i);
            let tangent = tangents.index_axis(Axis(0), i);
            let scaled: Vec<Tensor> = times.iter().map(|&t| &tangent * t).collect();
            let scaled = stack(&space_shape, &scaled)?;
            self.metric.exp(&scaled.view(), &point)
        };

        #[cfg(feature = "parallel")]
        let paths = (0..plan.merged_len())
            .into_par_iter()
            .map(path)
            .collect::<Result<Vec<_>>>()?;
        #[cfg(not(feature = "parallel"))]
        let paths = (0..plan.merged_len())
            .map(path)
            .collect::<Result<Vec<_>>>()?;

        let trailing: Vec<usize> = std::iter::once(times.len())
            .chain(space_shape.iter().copied())
            .collect();
        let stacked = stack(&trailing, &paths)?;
        plan.split(stacked, &trailing)
    }

    /// Evaluates every geodesic at a single time, returning `[*batch, *shape]`.
    pub fn at(&self, t: f64) -> Result<Tensor> {
        let path = self.eval(&[t])?;
        Ok(path.index_axis_move(Axis(self.batch_shape.len()), 0))
    }

    /// Evaluates every geodesic at `n_times` evenly spaced times in `[0, 1]`.
    pub fn sample(&self, n_times: usize) -> Result<Tensor> {
        if n_times < 2 {
            return Err(ManifoldError::invalid_parameter(
                "n_times",
                format!("need at least 2 samples, got {n_times}"),
            ));
        }
        let step = 1.0 / (n_times - 1) as f64;
        let times: Vec<f64> = (0..n_times).map(|i| i as f64 * step).collect();
        self.eval(&times)
    }

    /// End points `exp(v, p)`.
    pub fn end_point(&self) -> Result<Tensor> {
        self.at(1.0)
    }
}
