//! Numerical utilities and small dense linear algebra.

pub mod linalg;
pub mod stability;

pub use linalg::*;
pub use stability::*;
