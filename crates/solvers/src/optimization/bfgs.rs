use gte_core::{
    MinimizationProblem, Observer,
    nalgebra::{DMatrix, DVector},
};

use crate::{Action, Config, Event, Failure, Status, event::notify};

use super::{
    Counted, Outcome, Point,
    line_search::{self, QUASI_NEWTON},
};

/// Dense BFGS.
///
/// Maintains an explicit inverse Hessian approximation, starting from the
/// identity and rescaled by the first curvature pair. Steps are chosen by a
/// strong Wolfe line search. A failed search resets the approximation and
/// retries along steepest descent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bfgs;

impl Bfgs {
    pub(crate) const NAME: &'static str = "bfgs";

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
        let mut inverse = InverseHessian::new(point.x.len());
        let mut iters = 0;

        loop {
            if point.gradient_norm() <= config.gradient_threshold {
                return Ok(point.finish(Status::GradientThreshold, iters));
            }
            if iters >= config.max_iters {
                return Ok(point.finish(Status::MaxIters, iters));
            }

            iters += 1;
            let direction = -(&inverse.matrix * &point.gradient);
            let alpha = if inverse.fresh {
                line_search::initial_step(&point)
            } else {
                1.0
            };

            let next = match line_search::wolfe(problem, &point, &direction, alpha, &QUASI_NEWTON)? {
                Some(step) => step.point,
                None if !inverse.fresh => {
                    log::warn!("{} line search failed at iteration {iters}, resetting", Self::NAME);
                    inverse = InverseHessian::new(point.x.len());
                    let direction = -&point.gradient;
                    let alpha = line_search::initial_step(&point);
                    line_search::wolfe(problem, &point, &direction, alpha, &QUASI_NEWTON)?
                        .ok_or(Failure::LineSearch { iter: iters })?
                        .point
                }
                None => return Err(Failure::LineSearch { iter: iters }),
            };

            inverse.update(&(&next.x - &point.x), &(&next.gradient - &point.gradient));
            point = next;

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
}

struct InverseHessian {
    matrix: DMatrix<f64>,
    /// True until the first accepted curvature pair.
    fresh: bool,
}

impl InverseHessian {
    fn new(n: usize) -> Self {
        Self {
            matrix: DMatrix::identity(n, n),
            fresh: true,
        }
    }

    /// Applies the BFGS update for step `s` and gradient change `y`.
    ///
    /// Pairs without positive curvature are skipped.
    fn update(&mut self, s: &DVector<f64>, y: &DVector<f64>) {
        let sy = s.dot(y);
        if sy <= f64::EPSILON * s.norm() * y.norm() {
            return;
        }

        if self.fresh {
            let n = s.len();
            self.matrix = DMatrix::identity(n, n) * (sy / y.norm_squared());
            self.fresh = false;
        }

        let rho = 1.0 / sy;
        let hy = &self.matrix * y;
        let yhy = y.dot(&hy);

        self.matrix -= (s * hy.transpose() + &hy * s.transpose()) * rho;
        self.matrix += s * s.transpose() * (rho * rho * yhy + rho);
    }
}
