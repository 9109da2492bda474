/// Configuration shared by every solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Maximum number of major iterations (generations for CMA-ES).
    pub max_iters: usize,

    /// Gradient-based methods stop once the largest gradient component
    /// falls to this value. Derivative-free methods use it as their
    /// simplex or step-size tolerance unless they set their own.
    pub gradient_threshold: f64,

    /// Largest residual magnitude accepted when reporting
    /// [`Solution::converged`](crate::Solution::converged).
    pub residual_tol: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            gradient_threshold: 1e-8,
            residual_tol: 1e-6,
        }
    }
}

impl Config {
    /// Validates the iteration cap and tolerances.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_iters` is zero, `gradient_threshold` is not
    /// finite and positive, or `residual_tol` is negative or non-finite.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_iters == 0 {
            return Err("max_iters must be positive");
        }
        if !self.gradient_threshold.is_finite() || self.gradient_threshold <= 0.0 {
            return Err("gradient_threshold must be finite and positive");
        }
        if !self.residual_tol.is_finite() || self.residual_tol < 0.0 {
            return Err("residual_tol must be finite and non-negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = Config::default();
        assert_eq!(config.max_iters, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_iterations() {
        let config = Config {
            max_iters: 0,
            ..Config::default()
        };
        assert_eq!(config.validate(), Err("max_iters must be positive"));
    }

    #[test]
    fn rejects_non_positive_threshold() {
        for gradient_threshold in [0.0, -1e-8, f64::NAN, f64::INFINITY] {
            let config = Config {
                gradient_threshold,
                ..Config::default()
            };
            assert!(config.validate().is_err(), "accepted {gradient_threshold}");
        }
    }

    #[test]
    fn residual_tol_may_be_zero() {
        let config = Config {
            residual_tol: 0.0,
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        let config = Config {
            residual_tol: -1.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
