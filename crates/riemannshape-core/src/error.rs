//! Error types for Riemannian manifold operations.
//!
//! This module defines the error taxonomy shared by every manifold, metric
//! and solver in the workspace. Shape and broadcasting failures raised by the
//! array runtime are passed through untouched.

use thiserror::Error;

/// Errors that can occur during manifold operations.
#[derive(Debug, Clone, Error)]
pub enum ManifoldError {
    /// Malformed construction argument.
    ///
    /// Raised immediately when a manifold, metric or solver configuration is
    /// built with values outside their domain (non-positive copy counts,
    /// non-positive scales, mismatched lengths).
    #[error("Invalid parameter `{parameter}`: {reason}")]
    InvalidParameter {
        /// Name of the offending parameter
        parameter: String,
        /// Description of why the value is rejected
        reason: String,
    },

    /// Dimension mismatch between tensors.
    ///
    /// This error occurs when an argument has fewer axes than the manifold's
    /// point shape, or when its trailing axes do not match that shape.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions
        expected: String,
        /// Actual dimensions
        actual: String,
    },

    /// Numerical instability detected.
    #[error("Numerical instability detected: {reason}")]
    NumericalError {
        /// Description of the numerical issue
        reason: String,
    },

    /// Operation not supported by this manifold.
    ///
    /// Used for optional capabilities, e.g. a composite manifold asked to
    /// project onto a base manifold that declares no projection.
    #[error("Feature not implemented: {feature}")]
    NotImplemented {
        /// Name of the unimplemented feature
        feature: String,
    },

    /// Neither of two mutually optional arguments was supplied.
    #[error("Ambiguous specification: {reason}")]
    AmbiguousSpecification {
        /// What is missing
        reason: String,
    },

    /// Redundant arguments disagree with each other.
    #[error("Inconsistent specification: {reason}")]
    InconsistentSpecification {
        /// What disagrees
        reason: String,
    },

    /// Shape or broadcasting failure from the array runtime.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl ManifoldError {
    /// Create an InvalidParameter error.
    pub fn invalid_parameter<S1: Into<String>, S2: Into<String>>(parameter: S1, reason: S2) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch<S1, S2>(expected: S1, actual: S2) -> Self
    where
        S1: std::fmt::Display,
        S2: std::fmt::Display,
    {
        Self::DimensionMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a NumericalError with a custom reason.
    pub fn numerical_error<S: Into<String>>(reason: S) -> Self {
        Self::NumericalError {
            reason: reason.into(),
        }
    }

    /// Create a NotImplemented error for a specific feature.
    pub fn not_implemented<S: Into<String>>(feature: S) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Create an AmbiguousSpecification error.
    pub fn ambiguous_specification<S: Into<String>>(reason: S) -> Self {
        Self::AmbiguousSpecification {
            reason: reason.into(),
        }
    }

    /// Create an InconsistentSpecification error.
    pub fn inconsistent_specification<S: Into<String>>(reason: S) -> Self {
        Self::InconsistentSpecification {
            reason: reason.into(),
        }
    }

    /// Returns `true` for construction-time validation failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. })
    }

    /// Returns `true` when an optional capability was requested but is absent.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented { .. })
    }
}

/// Result type alias for operations that can produce ManifoldError.
pub type Result<T> = std::result::Result<T, ManifoldError>;
