//! # N-Fold Product Manifold M^n = M × M × ... × M
//!
//! The n-fold product combines `n_copies` copies of one base manifold into a
//! single manifold whose points carry an extra copy axis:
//!
//! ```text
//! shape(M^n) = (n_copies, *shape(M)),    dim(M^n) = n_copies * dim(M)
//! ```
//!
//! ## Geometric Structure
//!
//! ### Tangent Space
//! The tangent space decomposes as a direct sum:
//! ```text
//! T_{(x₁,...,xₙ)} M^n = T_{x₁} M ⊕ ... ⊕ T_{xₙ} M
//! ```
//!
//! ### Riemannian Metric
//! The product metric is the (optionally scaled) sum of the copy metrics:
//! ```text
//! g_x((u₁,...,uₙ), (v₁,...,vₙ)) = Σⱼ sⱼ g(uⱼ, vⱼ)
//! ```
//!
//! ### Geodesics
//! Exponential and logarithm act copy-wise, so geodesics are copy-wise
//! geodesics of the base metric.
//!
//! ## Batching
//!
//! Every operation folds the copy axis into the batch axis, calls the base
//! manifold or metric exactly once on a flat `[batch * n_copies, *base]`
//! array and unfolds the result (see [`BatchMerge`]).
//!
//! ## Example Usage
//!
//! ```rust
//! use riemannshape_core::prelude::*;
//! use riemannshape_manifolds::{Hypersphere, HypersphereMetric, NFoldManifold, NFoldMetric};
//! use std::sync::Arc;
//!
//! let space = Arc::new(NFoldManifold::new(Hypersphere::new(2)?, 3)?);
//! assert_eq!(space.dim(), 6);
//! assert_eq!(space.shape(), &[3, 3]);
//!
//! let metric = NFoldMetric::<HypersphereMetric>::with_default_base(
//!     Arc::clone(&space),
//!     Some(vec![1.0, 2.0, 0.5]),
//! )?;
//! let point = space.random_point(1, 1.0)?;
//! let sq = metric.squared_dist(&point.view(), &point.view())?;
//! assert!(sq[ndarray::IxDyn(&[])] < 1e-12);
//! # Ok::<(), riemannshape_core::error::ManifoldError>(())
//! ```

use ndarray::{Axis, IxDyn};
use rand::RngCore;
use riemannshape_core::{
    error::{ManifoldError, Result},
    manifold::{check_n_samples, sample_shape, Capabilities, CoordsType, Manifold},
    metric::{DefaultMetric, RiemannianMetric},
    types::{BoolTensor, Tensor, TensorView},
    vectorization::BatchMerge,
};
use std::sync::Arc;

/// The product of `n_copies` copies of a base manifold.
///
/// # Invariants
///
/// - `n_copies >= 1`
/// - `shape == (n_copies, *base.shape())`
/// - the base manifold is shared, never mutated
#[derive(Debug)]
pub struct NFoldManifold<M: Manifold> {
    base_manifold: Arc<M>,
    n_copies: usize,
    shape: Vec<usize>,
    name: String,
}

impl<M: Manifold> NFoldManifold<M> {
    /// Creates the product of `n_copies` copies of `base_manifold`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `n_copies` is zero.
    pub fn new(base_manifold: M, n_copies: usize) -> Result<Self> {
        Self::from_shared(Arc::new(base_manifold), n_copies)
    }

    /// Same as [`NFoldManifold::new`] over an already shared base manifold.
    pub fn from_shared(base_manifold: Arc<M>, n_copies: usize) -> Result<Self> {
        if n_copies == 0 {
            return Err(ManifoldError::invalid_parameter(
                "n_copies",
                "must be a positive integer, got 0",
            ));
        }
        let shape = std::iter::once(n_copies)
            .chain(base_manifold.shape().iter().copied())
            .collect();
        let name = format!("{}^{}", base_manifold.name(), n_copies);
        Ok(Self {
            base_manifold,
            n_copies,
            shape,
            name,
        })
    }

    /// The base manifold.
    pub fn base_manifold(&self) -> &M {
        &self.base_manifold
    }

    /// Shared handle to the base manifold.
    pub fn shared_base(&self) -> Arc<M> {
        Arc::clone(&self.base_manifold)
    }

    /// Number of copies.
    #[inline]
    pub fn n_copies(&self) -> usize {
        self.n_copies
    }

    /// Copy `index` of every batched point: `[*batch, *base_shape]`.
    pub fn component(&self, point: &TensorView<'_>, index: usize) -> Result<Tensor> {
        if index >= self.n_copies {
            return Err(ManifoldError::invalid_parameter(
                "index",
                format!("copy {index} out of bounds for {} copies", self.n_copies),
            ));
        }
        let plan = self.plan(&[point.view()])?;
        Ok(point.index_axis(Axis(plan.batch_ndim()), index).to_owned())
    }

    fn plan(&self, arrays: &[TensorView<'_>]) -> Result<BatchMerge> {
        BatchMerge::resolve(&[self.n_copies], self.base_manifold.shape(), arrays)
    }

    fn merge_all(&self, plan: &BatchMerge, arrays: &[TensorView<'_>]) -> Result<Vec<Tensor>> {
        arrays.iter().map(|array| plan.merge(array)).collect()
    }
}

impl<M: Manifold> Manifold for NFoldManifold<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn dim(&self) -> usize {
        self.n_copies * self.base_manifold.dim()
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn default_coords_type(&self) -> CoordsType {
        self.base_manifold.default_coords_type()
    }

    fn capabilities(&self) -> Capabilities {
        self.base_manifold.capabilities()
    }

    /// A product point belongs iff every copy belongs.
    fn belongs(&self, point: &TensorView<'_>, atol: f64) -> Result<BoolTensor> {
        let plan = self.plan(&[point.view()])?;
        let merged = plan.merge(point)?;
        let flags = self.base_manifold.belongs(&merged.view(), atol)?;
        plan.split_reduce(flags, |copies| copies.iter().all(|&b| b))
    }

    fn is_tangent(
        &self,
        vector: &TensorView<'_>,
        base_point: &TensorView<'_>,
        atol: f64,
    ) -> Result<BoolTensor> {
        let arrays = [vector.view(), base_point.view()];
        let plan = self.plan(&arrays)?;
        let merged = self.merge_all(&plan, &arrays)?;
        let flags = self
            .base_manifold
            .is_tangent(&merged[0].view(), &merged[1].view(), atol)?;
        plan.split_reduce(flags, |copies| copies.iter().all(|&b| b))
    }

    fn to_tangent(&self, vector: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        let arrays = [vector.view(), base_point.view()];
        let plan = self.plan(&arrays)?;
        let merged = self.merge_all(&plan, &arrays)?;
        let projected = self
            .base_manifold
            .to_tangent(&merged[0].view(), &merged[1].view())?;
        plan.split(projected, self.base_manifold.shape())
    }

    /// Draws all `n_samples * n_copies` base samples in one call.
    fn random_point_with(
        &self,
        rng: &mut dyn RngCore,
        n_samples: usize,
        bound: f64,
    ) -> Result<Tensor> {
        check_n_samples(n_samples)?;
        let samples = self
            .base_manifold
            .random_point_with(rng, n_samples * self.n_copies, bound)?;
        Ok(samples
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order(IxDyn(&sample_shape(n_samples, &self.shape)))?)
    }

    fn projection(&self, point: &TensorView<'_>) -> Result<Tensor> {
        if !self.base_manifold.capabilities().projection {
            return Err(ManifoldError::not_implemented(format!(
                "projection on {}: base manifold {} declares no projection",
                self.name,
                self.base_manifold.name()
            )));
        }
        let plan = self.plan(&[point.view()])?;
        let merged = plan.merge(point)?;
        let projected = self.base_manifold.projection(&merged.view())?;
        plan.split(projected, self.base_manifold.shape())
    }
}

impl<M: DefaultMetric> DefaultMetric for NFoldManifold<M> {
    type Metric = NFoldMetric<M::Metric>;

    fn default_metric(space: Arc<Self>) -> Result<Self::Metric> {
        NFoldMetric::with_default_base(space, None)
    }
}

/// Product metric on an n-fold manifold with optional per-copy scales.
///
/// # Invariants
///
/// - `scales`, when present, has exactly `n_copies` finite positive entries
/// - `inner_product(u, v, p) == Σⱼ sⱼ base.inner_product(uⱼ, vⱼ, pⱼ)`
#[derive(Debug, Clone)]
pub struct NFoldMetric<G: RiemannianMetric> {
    space: Arc<NFoldManifold<G::Space>>,
    base_metric: G,
    scales: Option<Vec<f64>>,
}

impl<G: RiemannianMetric> NFoldMetric<G> {
    /// Builds the product of `base_metric` over `space`.
    ///
    /// # Errors
    ///
    /// - validation error if `scales` does not have one entry per copy or
    ///   contains a non-positive or non-finite value
    /// - dimension mismatch if `base_metric` lives on a differently shaped space
    pub fn new(
        space: Arc<NFoldManifold<G::Space>>,
        base_metric: G,
        scales: Option<Vec<f64>>,
    ) -> Result<Self> {
        if let Some(scales) = &scales {
            validate_scales(scales, space.n_copies())?;
        }
        let base_shape = space.base_manifold().shape();
        if base_metric.space().shape() != base_shape {
            return Err(ManifoldError::dimension_mismatch(
                format!("{base_shape:?}"),
                format!("{:?}", base_metric.space().shape()),
            ));
        }
        tracing::debug!(
            space = space.name(),
            n_copies = space.n_copies(),
            scaled = scales.is_some(),
            "n-fold metric constructed"
        );
        Ok(Self {
            space,
            base_metric,
            scales,
        })
    }

    /// Builds the product of the base manifold's default metric.
    ///
    /// The base metric type is usually inferred from the expected return
    /// type; otherwise name it: `NFoldMetric::<EuclideanMetric>::with_default_base`.
    pub fn with_default_base(
        space: Arc<NFoldManifold<G::Space>>,
        scales: Option<Vec<f64>>,
    ) -> Result<Self>
    where
        G::Space: DefaultMetric<Metric = G>,
    {
        let base_metric = <G::Space as DefaultMetric>::default_metric(space.shared_base())?;
        Self::new(space, base_metric, scales)
    }

    /// The metric applied to each copy.
    pub fn base_metric(&self) -> &G {
        &self.base_metric
    }

    /// Per-copy scales, `None` for uniform unit weights.
    pub fn scales(&self) -> Option<&[f64]> {
        self.scales.as_deref()
    }

    fn plan(&self, arrays: &[TensorView<'_>]) -> Result<BatchMerge> {
        self.space.plan(arrays)
    }

    /// Multiplies per-element values of a merged `[batch * n_copies, ...]`
    /// array by the scale of their copy.
    fn apply_scales(&self, mut merged: Tensor) -> Tensor {
        if let Some(scales) = &self.scales {
            let n_copies = scales.len();
            for (i, mut element) in merged.outer_iter_mut().enumerate() {
                element *= scales[i % n_copies];
            }
        }
        merged
    }

    /// Folds `arrays`, applies `op` once and sums the scaled per-copy values.
    fn reduce_copies<F>(&self, arrays: &[TensorView<'_>], op: F) -> Result<Tensor>
    where
        F: FnOnce(&[Tensor]) -> Result<Tensor>,
    {
        let plan = self.plan(arrays)?;
        let merged = self.space.merge_all(&plan, arrays)?;
        let per_copy = self.apply_scales(op(&merged)?);
        plan.split_reduce(per_copy, |copies| copies.sum())
    }

    /// Folds `arrays`, applies `op` once and unfolds the per-copy results.
    fn map_copies<F>(&self, arrays: &[TensorView<'_>], op: F) -> Result<Tensor>
    where
        F: FnOnce(&[Tensor]) -> Result<Tensor>,
    {
        let plan = self.plan(arrays)?;
        let merged = self.space.merge_all(&plan, arrays)?;
        let result = op(&merged)?;
        plan.split(result, self.space.base_manifold().shape())
    }
}

fn validate_scales(scales: &[f64], n_copies: usize) -> Result<()> {
    if scales.len() != n_copies {
        return Err(ManifoldError::invalid_parameter(
            "scales",
            format!("expected {n_copies} entries, got {}", scales.len()),
        ));
    }
    if let Some(bad) = scales.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
        return Err(ManifoldError::invalid_parameter(
            "scales",
            format!("entries must be finite and positive, got {bad}"),
        ));
    }
    Ok(())
}

impl<G: RiemannianMetric> RiemannianMetric for NFoldMetric<G> {
    type Space = NFoldManifold<G::Space>;

    fn space(&self) -> &Arc<Self::Space> {
        &self.space
    }

    /// Per-copy matrices `[*batch, n_copies, base_dim, base_dim]`, copy `j`
    /// multiplied by `scales[j]`.
    fn metric_matrix(&self, base_point: &TensorView<'_>) -> Result<Tensor> {
        let plan = self.plan(&[base_point.view()])?;
        let merged = plan.merge(base_point)?;
        let matrices = self.apply_scales(self.base_metric.metric_matrix(&merged.view())?);
        let trailing = matrices.shape()[1..].to_vec();
        plan.split(matrices, &trailing)
    }

    fn inner_product(
        &self,
        tangent_vec_a: &TensorView<'_>,
        tangent_vec_b: &TensorView<'_>,
        base_point: &TensorView<'_>,
    ) -> Result<Tensor> {
        self.reduce_copies(
            &[tangent_vec_a.view(), tangent_vec_b.view(), base_point.view()],
            |m| {
                self.base_metric
                    .inner_product(&m[0].view(), &m[1].view(), &m[2].view())
            },
        )
    }

    fn exp(&self, tangent_vec: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        self.map_copies(&[tangent_vec.view(), base_point.view()], |m| {
            self.base_metric.exp(&m[0].view(), &m[1].view())
        })
    }

    fn log(&self, point: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor> {
        self.map_copies(&[point.view(), base_point.view()], |m| {
            self.base_metric.log(&m[0].view(), &m[1].view())
        })
    }

    /// Scaled sum of the per-copy squared distances.
    fn squared_dist(&self, point_a: &TensorView<'_>, point_b: &TensorView<'_>) -> Result<Tensor> {
        self.reduce_copies(&[point_a.view(), point_b.view()], |m| {
            self.base_metric.squared_dist(&m[0].view(), &m[1].view())
        })
    }
}

/// Builds a scaled product metric over a fresh n-fold space.
pub fn nfold_metric<M>(
    base_manifold: M,
    n_copies: usize,
    scales: Option<Vec<f64>>,
) -> Result<NFoldMetric<M::Metric>>
where
    M: DefaultMetric,
{
    let space = Arc::new(NFoldManifold::new(base_manifold, n_copies)?);
    NFoldMetric::with_default_base(space, scales)
}
