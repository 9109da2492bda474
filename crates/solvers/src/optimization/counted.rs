use std::{cell::Cell, error::Error as StdError};

use gte_core::{
    MinimizationProblem,
    nalgebra::{DMatrix, DVector},
};

use crate::{Evals, Failure};

/// Wraps a problem, counting evaluations and normalizing its errors.
///
/// Methods only reach the problem through this wrapper, so the counts in
/// [`Evals`] show exactly which derivatives a method requested.
pub(crate) struct Counted<'a, P> {
    problem: &'a P,
    evals: Cell<Evals>,
}

impl<'a, P> Counted<'a, P>
where
    P: MinimizationProblem + Sync,
{
    pub(crate) fn new(problem: &'a P) -> Self {
        Self {
            problem,
            evals: Cell::new(Evals::default()),
        }
    }

    pub(crate) fn cost(&self, x: &DVector<f64>) -> Result<f64, Failure> {
        self.bump(|evals| evals.cost += 1);
        self.problem.cost(x).map_err(evaluation)
    }

    pub(crate) fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Failure> {
        self.bump(|evals| evals.gradient += 1);
        self.problem.gradient(x).map_err(evaluation)
    }

    pub(crate) fn hessian(&self, x: &DVector<f64>) -> Result<DMatrix<f64>, Failure> {
        self.bump(|evals| evals.hessian += 1);
        self.problem.hessian(x).map_err(evaluation)
    }

    pub(crate) fn evals(&self) -> Evals {
        self.evals.get()
    }

    fn bump(&self, update: impl FnOnce(&mut Evals)) {
        let mut evals = self.evals.get();
        update(&mut evals);
        self.evals.set(evals);
    }
}

fn evaluation<E: StdError + Send + Sync + 'static>(err: E) -> Failure {
    Failure::Evaluation(Box::new(err))
}
