use std::error::Error as StdError;

use thiserror::Error;

/// Errors returned by [`solve`](crate::solve) and [`root`](crate::root).
#[derive(Debug, Error)]
pub enum Error {
    #[error("system has no equations")]
    EmptyEquationSet,

    #[error("equation slot {index} has no equation")]
    MissingEquation { index: usize },

    #[error("initial guess cannot be empty")]
    EmptyInitialGuess,

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: &'static str },

    #[error("failed to build residual system")]
    System(#[source] gte_core::Error),

    #[error("{method} optimization failed")]
    OptimizationFailed {
        method: &'static str,
        #[source]
        source: Failure,
    },
}

impl From<gte_core::Error> for Error {
    fn from(err: gte_core::Error) -> Self {
        match err {
            gte_core::Error::EmptyEquationSet => Self::EmptyEquationSet,
            gte_core::Error::MissingEquation { index } => Self::MissingEquation { index },
            other => Self::System(other),
        }
    }
}

/// Reasons an optimization method could not produce a result.
#[derive(Debug, Error)]
pub enum Failure {
    #[error("problem evaluation failed")]
    Evaluation(#[source] Box<dyn StdError + Send + Sync>),

    #[error("non-finite cost at iteration {iter}")]
    NonFiniteCost { iter: usize },

    #[error("line search found no acceptable step at iteration {iter}")]
    LineSearch { iter: usize },

    #[error("hessian could not be made positive definite at iteration {iter}")]
    SingularHessian { iter: usize },

    #[error("covariance lost positive definiteness at generation {iter}")]
    CovarianceBreakdown { iter: usize },
}
