//! Riemannian metric trait and the space/metric association.
//!
//! A Riemannian metric g on a manifold M assigns to each point p ∈ M an inner
//! product g_p on the tangent space T_p M. From it follow:
//! - lengths of tangent vectors and distances between points
//! - the exponential map exp_p: T_p M → M and its local inverse log_p
//! - geodesics t ↦ exp_p(t v)
//!
//! A metric holds a shared reference to its space; the space never owns the
//! metric's parameters. [`EquippedSpace`] binds one space to exactly one
//! active metric and swaps it only through [`EquippedSpace::equip_with_metric`].

use crate::{
    error::Result,
    geodesic::Geodesic,
    manifold::Manifold,
    types::{Tensor, TensorView},
};
use std::fmt::Debug;
use std::sync::Arc;

/// Trait for Riemannian metrics with batched operations.
///
/// Tangent vectors and points have shape `[*batch, *space.shape()]`; scalar
/// results have shape `[*batch]`. Arguments are broadcast against each other.
pub trait RiemannianMetric: Debug + Send + Sync {
    /// The space this metric is defined on.
    type Space: Manifold;

    /// Shared handle to the underlying space.
    fn space(&self) -> &Arc<Self::Space>;

    /// Matrix of the inner product at `base_point`.
    fn metric_matrix(&self, base_point: &TensorView<'_>) -> Result<Tensor>;

    /// Inner product ⟨a, b⟩ at `base_point`.
    fn inner_product(
        &self,
        tangent_vec_a: &TensorView<'_>,
        tangent_vec_b: &TensorView<'_>,
        base_point: &TensorView<'_>,
    ) -> Result<Tensor>;

    /// Riemannian exponential of `tangent_vec` at `base_point`.
    fn exp(&self, tangent_vec: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor>;

    /// Riemannian logarithm of `point` at `base_point`.
    fn log(&self, point: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor>;

    /// Squared norm ⟨v, v⟩ at `base_point`.
    fn squared_norm(&self, vector: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        self.inner_product(vector, vector, base_point)
    }

    /// Norm of a tangent vector.
    fn norm(&self, vector: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        Ok(self
            .squared_norm(vector, base_point)?
            .mapv(|sq| sq.max(0.0).sqrt()))
    }

    /// Squared geodesic distance.
    ///
    /// Defaults to the squared norm of `log(point_b, point_a)` at `point_a`.
    fn squared_dist(&self, point_a: &TensorView<'_>, point_b: &TensorView<'_>) -> Result<Tensor> {
        let log = self.log(point_b, point_a)?;
        self.squared_norm(&log.view(), point_a)
    }

    /// Geodesic distance.
    fn dist(&self, point_a: &TensorView<'_>, point_b: &TensorView<'_>) -> Result<Tensor> {
        Ok(self
            .squared_dist(point_a, point_b)?
            .mapv(|sq| sq.max(0.0).sqrt()))
    }

    /// Geodesic through `initial_point`, defined by exactly one of an end
    /// point or an initial velocity (or both when they agree).
    fn geodesic(
        &self,
        initial_point: &TensorView<'_>,
        end_point: Option<&TensorView<'_>>,
        initial_tangent_vec: Option<&TensorView<'_>>,
    ) -> Result<Geodesic<'_, Self>>
    where
        Self: Sized,
    {
        Geodesic::new(self, initial_point, end_point, initial_tangent_vec)
    }
}

/// A space that knows which metric to equip itself with.
pub trait DefaultMetric: Manifold + Sized {
    /// Metric type built by [`DefaultMetric::default_metric`].
    type Metric: RiemannianMetric<Space = Self>;

    /// Builds the default metric over a shared space.
    fn default_metric(space: Arc<Self>) -> Result<Self::Metric>;

    /// Equips the space with its default metric.
    fn equip(self) -> Result<EquippedSpace<Self::Metric>> {
        Ok(EquippedSpace::new(Self::default_metric(Arc::new(self))?))
    }
}

/// A space bound to exactly one active metric.
#[derive(Debug, Clone)]
pub struct EquippedSpace<M: RiemannianMetric> {
    metric: M,
}

impl<M: RiemannianMetric> EquippedSpace<M> {
    /// Binds `metric` (and through it, its space).
    pub fn new(metric: M) -> Self {
        Self { metric }
    }

    /// The underlying space.
    pub fn space(&self) -> &M::Space {
        self.metric.space()
    }

    /// The active metric.
    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Releases the active metric.
    pub fn into_metric(self) -> M {
        self.metric
    }

    /// Replaces the active metric with one built over the same space.
    ///
    /// Consumes `self`: when `build` fails no half-equipped space survives.
    pub fn equip_with_metric<N, F>(self, build: F) -> Result<EquippedSpace<N>>
    where
        N: RiemannianMetric<Space = M::Space>,
        F: FnOnce(Arc<M::Space>) -> Result<N>,
    {
        let space = Arc::clone(self.metric.space());
        Ok(EquippedSpace::new(build(space)?))
    }
}
