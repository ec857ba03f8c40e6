//! Core manifold trait and associated types.
//!
//! This module defines the `Manifold` trait that every geometric space must
//! implement. Spaces are immutable descriptors: they carry an intrinsic
//! dimension, a fixed per-point shape and a coordinate convention, and every
//! operation works on batches of points laid out as `[*batch, *shape]`.
//!
//! # Mathematical Background
//!
//! - **Membership**: whether an array represents a point of M
//! - **Tangent space**: T_p M, the linear approximation of M at p
//! - **Tangent projection**: P_p: ambient → T_p M, idempotent
//! - **Projection**: closest point of M to an ambient point (optional)

use crate::{
    error::{ManifoldError, Result},
    types::{BoolTensor, Tensor, TensorView},
};
use rand::RngCore;
use std::fmt::Debug;

/// Coordinate convention of a manifold's points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CoordsType {
    /// Coordinates of dimension `dim`.
    #[default]
    Intrinsic,
    /// Coordinates of an embedding space.
    Extrinsic,
}

/// Optional operations a manifold declares up front.
///
/// Composite manifolds query these flags instead of probing for an operation
/// at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// The manifold implements [`Manifold::projection`].
    pub projection: bool,
}

impl Capabilities {
    /// No optional operation.
    pub const NONE: Self = Self { projection: false };

    /// Closest-point projection is available.
    pub const WITH_PROJECTION: Self = Self { projection: true };
}

/// Trait for manifolds with batched, shape-polymorphic operations.
///
/// Arrays passed to these methods have shape `[*batch, *self.shape()]`; the
/// batch may be empty. Boolean and scalar results have shape `[*batch]`.
///
/// # Example
///
/// ```rust,ignore
/// use riemannshape_core::prelude::*;
///
/// #[derive(Debug)]
/// struct Line { shape: Vec<usize> }
///
/// impl Manifold for Line {
///     fn name(&self) -> &str { "Line" }
///     fn dim(&self) -> usize { 1 }
///     fn shape(&self) -> &[usize] { &self.shape }
///     // ... membership, tangent projection and sampling
/// }
/// ```
pub trait Manifold: Debug + Send + Sync {
    /// Returns a human-readable name for the manifold.
    fn name(&self) -> &str;

    /// Returns the intrinsic dimension of the manifold.
    fn dim(&self) -> usize;

    /// Returns the per-point shape (trailing axes of every point array).
    fn shape(&self) -> &[usize];

    /// Number of trailing axes occupied by a single point.
    fn point_ndim(&self) -> usize {
        self.shape().len()
    }

    /// Coordinate convention of points.
    fn default_coords_type(&self) -> CoordsType {
        CoordsType::Intrinsic
    }

    /// Optional operations this manifold supports.
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    /// Tests whether each batched point lies on the manifold within `atol`.
    fn belongs(&self, point: &TensorView<'_>, atol: f64) -> Result<BoolTensor>;

    /// Tests whether `vector` lies in the tangent space at `base_point`.
    fn is_tangent(
        &self,
        vector: &TensorView<'_>,
        base_point: &TensorView<'_>,
        atol: f64,
    ) -> Result<BoolTensor>;

    /// Projects an ambient vector onto the tangent space at `base_point`.
    ///
    /// Must be idempotent: projecting a projected vector leaves it unchanged.
    fn to_tangent(&self, vector: &TensorView<'_>, base_point: &TensorView<'_>) -> Result<Tensor>;

    /// Draws `n_samples` points with the given generator.
    ///
    /// Returns `[n_samples, *shape]`, or `[*shape]` when `n_samples == 1`.
    /// `bound` limits the sampling region of non-compact manifolds.
    fn random_point_with(&self, rng: &mut dyn RngCore, n_samples: usize, bound: f64)
        -> Result<Tensor>;

    /// Draws `n_samples` points with the thread-local generator.
    fn random_point(&self, n_samples: usize, bound: f64) -> Result<Tensor> {
        let mut rng = rand::thread_rng();
        self.random_point_with(&mut rng, n_samples, bound)
    }

    /// Closest-point projection from the embedding space.
    ///
    /// Only available when [`Capabilities::projection`] is set.
    fn projection(&self, _point: &TensorView<'_>) -> Result<Tensor> {
        Err(ManifoldError::not_implemented(format!(
            "projection on {}",
            self.name()
        )))
    }
}

/// Validates a sample count shared by every `random_point` implementation.
pub fn check_n_samples(n_samples: usize) -> Result<()> {
    if n_samples == 0 {
        return Err(ManifoldError::invalid_parameter(
            "n_samples",
            "must be a positive integer",
        ));
    }
    Ok(())
}

/// Prepends the sample axis, dropping it for a single sample.
pub fn sample_shape(n_samples: usize, shape: &[usize]) -> Vec<usize> {
    if n_samples == 1 {
        shape.to_vec()
    } else {
        std::iter::once(n_samples).chain(shape.iter().copied()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_manifolds::MinimalTestManifold;

    #[test]
    fn test_default_capabilities() {
        let manifold = MinimalTestManifold::new(3);
        assert_eq!(manifold.capabilities(), Capabilities::NONE);
        assert_eq!(manifold.point_ndim(), 1);
        assert_eq!(manifold.default_coords_type(), CoordsType::Intrinsic);
    }

    #[test]
    fn test_projection_defaults_to_not_implemented() {
        let manifold = MinimalTestManifold::new(3);
        let point = manifold.random_point(1, 1.0).unwrap();
        let err = manifold.projection(&point.view()).unwrap_err();
        assert!(err.is_not_implemented());
    }

    #[test]
    fn test_sample_shape() {
        assert_eq!(sample_shape(1, &[3, 2]), vec![3, 2]);
        assert_eq!(sample_shape(4, &[3, 2]), vec![4, 3, 2]);
        assert!(check_n_samples(0).is_err());
    }

    #[test]
    fn test_manifold_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MinimalTestManifold>();
    }
}
