//! RiemannShape Manifolds - concrete spaces built on the core contract.
//!
//! This crate provides the base manifolds used as substrates, the n-fold
//! product composer, and the shape space of discrete curves under the
//! square-root-velocity metric.
//!
//! # Modules
//!
//! - [`euclidean`]: R^n with the flat metric
//! - [`hypersphere`]: unit sphere S^n embedded in R^(n+1)
//! - [`nfold`]: n independent copies of a base manifold, optionally scaled
//! - [`discrete_curves`]: open curves and the SRV metric
//! - [`srv_bundle`]: curves modulo reparametrisation, alignment, quotient metric
//! - [`closed_curves`]: closed curves and the SRV closure projector

pub mod closed_curves;
pub mod discrete_curves;
pub mod euclidean;
pub mod hypersphere;
pub mod nfold;
pub mod srv_bundle;
pub mod utils;

// Re-export main manifolds for convenience
pub use closed_curves::{ClosedDiscreteCurves, SrvProjection};
pub use discrete_curves::{DiscreteCurves, SrvMetric};
pub use euclidean::{Euclidean, EuclideanMetric};
pub use hypersphere::{Hypersphere, HypersphereMetric};
pub use nfold::{nfold_metric, NFoldManifold, NFoldMetric};
pub use srv_bundle::{SrvQuotientMetric, SrvShapeBundle};
