use gte_core::{
    MinimizationProblem, Observer,
    nalgebra::{DMatrix, DVector, Dyn, linalg::Cholesky},
};

use crate::{Action, Config, Event, Failure, Status, event::notify};

use super::{Counted, Outcome, Point, line_search};

/// Growth factor for the Hessian shift between factorization attempts.
const SHIFT_GROWTH: f64 = 5.0;

/// Newton's method with a regularized Hessian.
///
/// Each iteration factors `H + tau I`, increasing `tau` from zero until the
/// shifted Hessian is positive definite, then backtracks along the Newton
/// direction until the cost decreases sufficiently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Newton {
    /// Factorization attempts before the Hessian is declared singular.
    pub max_regularizations: usize,
}

impl Default for Newton {
    fn default() -> Self {
        Self {
            max_regularizations: 60,
        }
    }
}

impl Newton {
    pub(crate) const NAME: &'static str = "newton";

    #[must_use]
    pub fn with_max_regularizations(self, max_regularizations: usize) -> Self {
        Self {
            max_regularizations,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.max_regularizations == 0 {
            return Err("newton max_regularizations must be positive");
        }
        Ok(())
    }

    pub(crate) fn minimize<P, Obs>(
        &self,
        problem: &Counted<'_, P>,
        x0: DVector<f64>,
        config: &Config,
        observer: &mut Obs,
    ) -> Result<Outcome, Failure>
    where
        P: MinimizationProblem + Sync,
        Obs: for<'a> Observer<Event<'a>, Action>,
    {
        let mut point = Point::evaluate(problem, x0, 0)?;
        let mut iters = 0;

        loop {
            if point.gradient_norm() <= config.gradient_threshold {
                return Ok(point.finish(Status::GradientThreshold, iters));
            }
            if iters >= config.max_iters {
                return Ok(point.finish(Status::MaxIters, iters));
            }

            iters += 1;
            let hessian = problem.hessian(&point.x)?;
            let factor = self
                .regularize(hessian)
                .ok_or(Failure::SingularHessian { iter: iters })?;
            let direction = -factor.solve(&point.gradient);

            point = line_search::backtracking(problem, &point, &direction)?
                .ok_or(Failure::LineSearch { iter: iters })?;

            if notify(
                observer,
                Self::NAME,
                iters,
                &point.x,
                point.cost,
                Some(point.gradient_norm()),
            ) {
                return Ok(point.finish(Status::StoppedByObserver, iters));
            }
        }
    }

    /// Factors `hessian + tau I` for the smallest `tau` tried that works.
    ///
    /// Returns `None` for a non-finite Hessian or when every attempt fails.
    fn regularize(&self, hessian: DMatrix<f64>) -> Option<Cholesky<f64, Dyn>> {
        if hessian.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let n = hessian.nrows();
        let diagonal = hessian.diagonal();
        let largest = diagonal.iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));
        let smallest = diagonal.min();
        let base = 1e-3 * largest.max(1.0);

        let mut tau = if smallest > 0.0 { 0.0 } else { base - smallest };
        for _ in 0..self.max_regularizations {
            let shifted = &hessian + DMatrix::identity(n, n) * tau;
            if let Some(factor) = shifted.cholesky() {
                return Some(factor);
            }
            tau = (SHIFT_GROWTH * tau).max(base);
        }
        None
    }
}
