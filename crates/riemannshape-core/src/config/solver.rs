//! Settings shared by the iterative geometric solvers.
//!
//! The fiber-bundle alignment and the closed-curve projection both run a
//! bounded iteration with a stopping tolerance. Exhausting the iteration
//! budget is a soft failure: the best iterate is returned together with a
//! `converged` flag and a warning is logged.

use crate::error::{ManifoldError, Result};

/// Configuration for iterative solvers.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverConfig {
    /// Stopping tolerance on the closure residual of projections.
    pub atol: f64,
    /// Stopping tolerance on the mean squared gap of alignments.
    pub threshold: f64,
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Number of time steps used to discretize paths.
    pub n_times: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            atol: 1e-10,
            threshold: 1e-3,
            max_iter: 100,
            n_times: 20,
        }
    }
}

impl SolverConfig {
    /// Starts a builder from the default settings.
    pub fn builder() -> SolverConfigBuilder {
        SolverConfigBuilder::new()
    }

    /// Checks that every field is in range.
    pub fn validate(&self) -> Result<()> {
        if !(self.atol > 0.0) || !self.atol.is_finite() {
            return Err(ManifoldError::invalid_parameter(
                "atol",
                format!("must be a positive finite number, got {}", self.atol),
            ));
        }
        if !(self.threshold > 0.0) || !self.threshold.is_finite() {
            return Err(ManifoldError::invalid_parameter(
                "threshold",
                format!("must be a positive finite number, got {}", self.threshold),
            ));
        }
        if self.max_iter == 0 {
            return Err(ManifoldError::invalid_parameter(
                "max_iter",
                "must be at least 1",
            ));
        }
        if self.n_times < 2 {
            return Err(ManifoldError::invalid_parameter(
                "n_times",
                format!("must be at least 2, got {}", self.n_times),
            ));
        }
        Ok(())
    }
}

/// Builder for creating a custom solver configuration.
#[derive(Debug, Clone)]
pub struct SolverConfigBuilder {
    config: SolverConfig,
}

impl SolverConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: SolverConfig::default(),
        }
    }

    /// Set the closure tolerance.
    pub fn atol(mut self, atol: f64) -> Self {
        self.config.atol = atol;
        self
    }

    /// Set the alignment gap threshold.
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Set the iteration budget.
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.config.max_iter = max_iter;
        self
    }

    /// Set the path discretization.
    pub fn n_times(mut self, n_times: usize) -> Self {
        self.config.n_times = n_times;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<SolverConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for SolverConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_iter, 100);
        assert_eq!(config.n_times, 20);
    }

    #[test]
    fn test_builder_overrides() {
        let config = SolverConfig::builder()
            .threshold(1e-6)
            .max_iter(500)
            .n_times(40)
            .build()
            .unwrap();
        assert_eq!(config.threshold, 1e-6);
        assert_eq!(config.max_iter, 500);
        assert_eq!(config.n_times, 40);
        assert_eq!(config.atol, SolverConfig::default().atol);
    }

    #[test]
    fn test_builder_rejects_out_of_range_values() {
        let cases = vec![
            SolverConfig::builder().atol(0.0),
            SolverConfig::builder().atol(f64::NAN),
            SolverConfig::builder().threshold(-1.0),
            SolverConfig::builder().max_iter(0),
            SolverConfig::builder().n_times(1),
        ];
        for builder in cases {
            let err = builder.build().unwrap_err();
            assert!(err.is_validation(), "{err}");
        }
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_config_fills_defaults() {
        let config: SolverConfig = serde_json::from_str(r#"{"max_iter": 7}"#).unwrap();
        assert_eq!(config.max_iter, 7);
        assert_eq!(config.n_times, 20);
    }
}
