//! Type definitions and aliases for batched geometric computations.
//!
//! Points and tangent vectors are dynamic-rank `ndarray` tensors whose
//! trailing axes equal the manifold's point shape; any leading axes form the
//! batch. Small dense linear algebra (Gram systems, metric matrices built
//! column by column) goes through `nalgebra`.

use ndarray::{ArrayD, ArrayViewD};

/// Owned batched real tensor (points, tangent vectors, scalars per batch).
pub type Tensor = ArrayD<f64>;

/// Borrowed batched real tensor.
pub type TensorView<'a> = ArrayViewD<'a, f64>;

/// Owned batched boolean tensor returned by membership tests.
pub type BoolTensor = ArrayD<bool>;

/// Type alias for a dynamically-sized matrix.
pub type DMatrix = nalgebra::DMatrix<f64>;

/// Type alias for a dynamically-sized vector.
pub type DVector = nalgebra::DVector<f64>;

/// Numerical constants used as defaults across the workspace.
pub mod constants {
    /// Default absolute tolerance for membership and tangency checks.
    pub const ATOL: f64 = 1e-12;

    /// Default relative tolerance.
    pub const RTOL: f64 = 1e-6;

    /// Absolute tolerance of the geodesic consistency check.
    pub const GEODESIC_ATOL: f64 = 1e-8;

    /// Relative tolerance of the geodesic consistency check.
    pub const GEODESIC_RTOL: f64 = 1e-5;

    /// Guard against division by vanishing norms.
    pub const EPSILON: f64 = 1e-12;

    /// Pi constant.
    pub const PI: f64 = std::f64::consts::PI;
}
