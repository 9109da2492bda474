use nalgebra::{DMatrix, DVector};

use crate::{Differencing, Error, ResidualSystem, fd};

/// Defines a minimization problem to be solved.
///
/// A minimization problem maps solver variables `x` to a scalar cost.
/// Solvers search for the `x` that minimizes it.
///
/// Only [`cost`](Self::cost) is required. The default
/// [`gradient`](Self::gradient) and [`hessian`](Self::hessian) use central
/// differences with [`Differencing::default`]; solvers that do not need
/// derivatives never call them.
pub trait MinimizationProblem {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Computes the cost at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the cost cannot be computed.
    fn cost(&self, x: &DVector<f64>) -> Result<f64, Self::Error>;

    /// Computes the gradient of the cost at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the cost cannot be computed at a perturbed point.
    fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Self::Error>
    where
        Self: Sync,
    {
        fd::gradient(
            |p| self.cost(&DVector::from_column_slice(p)),
            x.as_slice(),
            &Differencing::default(),
        )
    }

    /// Computes the Hessian of the cost at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the cost cannot be computed at a perturbed point.
    fn hessian(&self, x: &DVector<f64>) -> Result<DMatrix<f64>, Self::Error>
    where
        Self: Sync,
    {
        fd::hessian(
            |p| self.cost(&DVector::from_column_slice(p)),
            x.as_slice(),
            &Differencing::default(),
        )
    }
}

impl MinimizationProblem for ResidualSystem {
    type Error = Error;

    fn cost(&self, x: &DVector<f64>) -> Result<f64, Error> {
        self.objective(x.as_slice())
    }

    fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Error> {
        ResidualSystem::gradient(self, x.as_slice())
    }

    fn hessian(&self, x: &DVector<f64>) -> Result<DMatrix<f64>, Error> {
        ResidualSystem::hessian(self, x.as_slice())
    }
}
