//! # RiemannShape
//!
//! Batched Riemannian geometry on composite manifolds: n-fold products of a
//! base manifold and shape spaces of discrete curves modulo
//! reparametrisation.
//!
//! Every operation accepts arrays laid out as `[*batch, *shape]` with any
//! number of leading batch axes, and returns scalar or boolean results of
//! shape `[*batch]`.
//!
//! ## Quick Start
//!
//! ```rust
//! use riemannshape::prelude::*;
//!
//! # fn main() -> riemannshape::Result<()> {
//! // Three copies of the 2-sphere, the last one weighted twice.
//! let metric = nfold_metric(Hypersphere::new(2)?, 3, Some(vec![1.0, 1.0, 2.0]))?;
//! let p = metric.space().random_point(5, 1.0)?;
//! let q = metric.space().random_point(5, 1.0)?;
//!
//! let dist = metric.dist(&p.view(), &q.view())?;
//! assert_eq!(dist.shape(), &[5]);
//!
//! let geodesic = metric.geodesic(&p.view(), Some(&q.view()), None)?;
//! let path = geodesic.sample(10)?;
//! assert_eq!(path.shape(), &[5, 10, 3, 3]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Curve shapes
//!
//! ```rust
//! use riemannshape::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> riemannshape::Result<()> {
//! let curves = Arc::new(DiscreteCurves::new(2, 20)?);
//! let a = curves.random_point(1, 1.0)?;
//! let b = curves.random_point(1, 1.0)?;
//!
//! let quotient = SrvShapeBundle::new(curves).quotient_metric(SolverConfig::default())?;
//! let alignment = quotient.align(&a.view(), &b.view())?;
//! if !alignment.all_converged() {
//!     // The aligned curve is still the best iterate found.
//! }
//! let dist = quotient.dist(&a.view(), &b.view())?;
//! # let _ = dist;
//! # Ok(())
//! # }
//! ```

pub use riemannshape_core;
pub use riemannshape_manifolds;

pub use riemannshape_core::{ManifoldError, Result};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use riemannshape_core::prelude::*;
    pub use riemannshape_manifolds::{
        nfold_metric, ClosedDiscreteCurves, DiscreteCurves, Euclidean, EuclideanMetric,
        Hypersphere, HypersphereMetric, NFoldManifold, NFoldMetric, SrvMetric, SrvProjection,
        SrvQuotientMetric, SrvShapeBundle,
    };
}
