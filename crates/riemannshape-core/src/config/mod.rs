//! Configuration of the iterative solvers.

pub mod solver;

pub use solver::{SolverConfig, SolverConfigBuilder};
