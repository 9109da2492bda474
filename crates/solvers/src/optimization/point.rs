use gte_core::{MinimizationProblem, nalgebra::DVector};

use crate::{Failure, Status};

use super::Counted;

/// A point with its cost and gradient.
#[derive(Debug, Clone)]
pub(crate) struct Point {
    pub(crate) x: DVector<f64>,
    pub(crate) cost: f64,
    pub(crate) gradient: DVector<f64>,
}

impl Point {
    /// Evaluates cost and gradient at `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if evaluation fails or the cost is not finite.
    pub(crate) fn evaluate<P>(problem: &Counted<'_, P>, x: DVector<f64>, iter: usize) -> Result<Self, Failure>
    where
        P: MinimizationProblem + Sync,
    {
        let cost = problem.cost(&x)?;
        if !cost.is_finite() {
            return Err(Failure::NonFiniteCost { iter });
        }
        let gradient = problem.gradient(&x)?;
        Ok(Self { x, cost, gradient })
    }

    /// Returns the largest gradient component magnitude.
    pub(crate) fn gradient_norm(&self) -> f64 {
        self.gradient.amax()
    }

    pub(crate) fn finish(self, status: Status, iters: usize) -> Outcome {
        Outcome {
            x: self.x,
            cost: self.cost,
            iters,
            status,
        }
    }
}

/// What a method hands back to the orchestrator.
#[derive(Debug, Clone)]
pub(crate) struct Outcome {
    pub(crate) x: DVector<f64>,
    pub(crate) cost: f64,
    pub(crate) iters: usize,
    pub(crate) status: Status,
}
