use gte_core::{MinimizationProblem, Observer, nalgebra::DVector};

use crate::{Action, Config, Event, Failure, Status, event::notify};

use super::{
    Counted, Outcome, Point,
    line_search::{self, CONJUGATE},
};

/// Steepest descent with a strong Wolfe line search.
///
/// Prone to slow progress along narrow valleys and to stalling at local
/// minima, so it carries its own stopping threshold, which replaces
/// [`Config::gradient_threshold`] for this method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientDescent {
    /// Stop once the largest gradient component falls to this value.
    pub gradient_threshold: f64,
}

impl Default for GradientDescent {
    fn default() -> Self {
        Self {
            gradient_threshold: 1e-7,
        }
    }
}

impl GradientDescent {
    pub(crate) const NAME: &'static str = "gradient-descent";

    #[must_use]
    pub fn with_gradient_threshold(self, gradient_threshold: f64) -> Self {
        Self { gradient_threshold }
    }

    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if !self.gradient_threshold.is_finite() || self.gradient_threshold <= 0.0 {
            return Err("gradient-descent gradient_threshold must be finite and positive");
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
        // Accepted step length and squared gradient norm from the last iteration.
        let mut previous: Option<(f64, f64)> = None;
        let mut iters = 0;

        loop {
            if point.gradient_norm() <= self.gradient_threshold {
                return Ok(point.finish(Status::GradientThreshold, iters));
            }
            if iters >= config.max_iters {
                return Ok(point.finish(Status::MaxIters, iters));
            }

            iters += 1;
            let direction = -&point.gradient;
            let squared = point.gradient.norm_squared();
            let fallback = line_search::initial_step(&point);
            let alpha = previous
                .map(|(alpha, prev_squared)| alpha * prev_squared / squared)
                .filter(|alpha| alpha.is_finite() && *alpha > 0.0)
                .unwrap_or(fallback);

            let step = match line_search::wolfe(problem, &point, &direction, alpha, &CONJUGATE)? {
                Some(step) => step,
                None if alpha != fallback => {
                    log::warn!("{} line search failed at iteration {iters}, retrying", Self::NAME);
                    line_search::wolfe(problem, &point, &direction, fallback, &CONJUGATE)?
                        .ok_or(Failure::LineSearch { iter: iters })?
                }
                None => return Err(Failure::LineSearch { iter: iters }),
            };

            previous = Some((step.alpha, squared));
            point = step.point;

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
