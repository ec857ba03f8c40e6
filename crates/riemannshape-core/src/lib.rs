//! Core traits and types for batched Riemannian geometry.
//!
//! This crate provides the foundational abstractions shared by every space
//! in the workspace: manifolds whose operations accept arbitrary leading
//! batch axes, Riemannian metrics with exponential and logarithm maps,
//! geodesic curves, and fiber bundles with their quotient metrics.
//!
//! # Key Concepts
//!
//! - **Manifolds**: spaces with a fixed per-point shape and batched membership tests
//! - **Riemannian Metrics**: inner products on tangent spaces, exp/log, distances
//! - **Geodesics**: curves `t ↦ exp(t v, p)` evaluated at arbitrary times
//! - **Fiber Bundles**: vertical/horizontal splitting and alignment along fibers
//!
//! # Modules
//!
//! - [`config`]: Settings of the iterative solvers
//! - [`error`]: Error types for manifold operations
//! - [`fiber_bundle`]: Fiber bundles and quotient metrics
//! - [`geodesic`]: Geodesic curves produced by a metric
//! - [`manifold`]: Core manifold trait and associated types
//! - [`metric`]: Riemannian metric trait and metric equipping
//! - [`numerical`]: Small dense solves and stability helpers
//! - [`types`]: Type aliases and numerical constants
//! - [`vectorization`]: Batch-shape resolution and batch merging

pub mod config;
pub mod error;
pub mod fiber_bundle;
pub mod geodesic;
pub mod manifold;
pub mod metric;
pub mod numerical;
pub mod types;
pub mod utils;
pub mod vectorization;

// Re-export commonly used items at the crate root
pub use error::{ManifoldError, Result};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use riemannshape_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{SolverConfig, SolverConfigBuilder};
    pub use crate::error::{ManifoldError, Result};
    pub use crate::fiber_bundle::{Alignment, FiberBundle, HorizontalGeodesic, QuotientMetric};
    pub use crate::geodesic::Geodesic;
    pub use crate::manifold::{Capabilities, CoordsType, Manifold};
    pub use crate::metric::{DefaultMetric, EquippedSpace, RiemannianMetric};
    pub use crate::types::{constants, BoolTensor, DMatrix, DVector, Tensor, TensorView};
    pub use crate::vectorization::{get_batch_shape, BatchMerge};
}
