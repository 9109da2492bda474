use thiserror::Error;

use crate::EquationError;

/// Errors that can occur when building or evaluating a residual system.
#[derive(Debug, Error)]
pub enum Error {
    #[error("system has no equations")]
    EmptyEquationSet,

    #[error("equation slot {index} has no equation")]
    MissingEquation { index: usize },

    #[error("equation {index} failed to evaluate")]
    Equation {
        index: usize,
        #[source]
        source: EquationError,
    },

    #[error("equation {index} returned {found} partials for {expected} unknowns")]
    PartialsLength {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("differencing step must be finite and positive, got {step}")]
    InvalidStep { step: f64 },

    #[error("failed to build differencing thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
