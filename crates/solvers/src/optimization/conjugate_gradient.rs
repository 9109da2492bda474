use gte_core::{MinimizationProblem, Observer, nalgebra::DVector};

use crate::{Action, Config, Event, Failure, Status, event::notify};

use super::{
    Counted, Outcome, Point,
    line_search::{self, CONJUGATE},
};

/// Formula for the conjugate direction coefficient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Beta {
    FletcherReeves,
    /// Polak–Ribière, clipped at zero.
    #[default]
    PolakRibiere,
    /// Hestenes–Stiefel, clipped at zero.
    HestenesStiefel,
}

impl Beta {
    fn compute(self, gradient: &DVector<f64>, previous: &DVector<f64>, direction: &DVector<f64>) -> f64 {
        let y = gradient - previous;
        let beta = match self {
            Self::FletcherReeves => gradient.norm_squared() / previous.norm_squared(),
            Self::PolakRibiere => gradient.dot(&y) / previous.norm_squared(),
            Self::HestenesStiefel => gradient.dot(&y) / direction.dot(&y),
        };
        if beta.is_finite() { beta.max(0.0) } else { 0.0 }
    }
}

/// Nonlinear conjugate gradient.
///
/// Directions are restarted along steepest descent when successive
/// gradients lose orthogonality, after every `restart_every` iterations
/// (the problem dimension by default), and whenever the conjugate direction
/// fails to descend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConjugateGradient {
    pub beta: Beta,

    /// Iterations between forced restarts; `None` uses the dimension.
    pub restart_every: Option<usize>,
}

/// Restart when `|g·g_prev| >= ORTHOGONALITY * |g|²`.
const ORTHOGONALITY: f64 = 0.2;

impl ConjugateGradient {
    pub(crate) const NAME: &'static str = "conjugate-gradient";

    #[must_use]
    pub fn with_beta(self, beta: Beta) -> Self {
        Self { beta, ..self }
    }

    #[must_use]
    pub fn with_restart_every(self, restart_every: usize) -> Self {
        Self {
            restart_every: Some(restart_every),
            ..self
        }
    }

    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.restart_every == Some(0) {
            return Err("conjugate-gradient restart_every must be positive");
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
        let restart_every = self.restart_every.unwrap_or(x0.len());
        let mut point = Point::evaluate(problem, x0, 0)?;
        let mut last: Option<Previous> = None;
        let mut since_restart = 0;
        let mut iters = 0;

        loop {
            if point.gradient_norm() <= config.gradient_threshold {
                return Ok(point.finish(Status::GradientThreshold, iters));
            }
            if iters >= config.max_iters {
                return Ok(point.finish(Status::MaxIters, iters));
            }

            iters += 1;
            let steepest = -&point.gradient;
            let conjugate = last
                .as_ref()
                .filter(|prev| {
                    since_restart < restart_every
                        && point.gradient.dot(&prev.gradient).abs()
                            < ORTHOGONALITY * point.gradient.norm_squared()
                })
                .map(|prev| {
                    let beta = self.beta.compute(&point.gradient, &prev.gradient, &prev.direction);
                    let direction = &steepest + &prev.direction * beta;
                    let alpha = prev.alpha * prev.gradient.dot(&prev.direction)
                        / point.gradient.dot(&direction);
                    (direction, alpha)
                })
                .filter(|(direction, alpha)| {
                    point.gradient.dot(direction) < 0.0 && alpha.is_finite() && *alpha > 0.0
                });

            let fallback = line_search::initial_step(&point);
            let step = match conjugate {
                Some((direction, alpha)) => {
                    match line_search::wolfe(problem, &point, &direction, alpha, &CONJUGATE)? {
                        Some(step) => Some((step, direction)),
                        None => {
                            log::warn!("{} line search failed at iteration {iters}, restarting", Self::NAME);
                            None
                        }
                    }
                }
                None => None,
            };
            let (step, direction) = match step {
                Some(found) => {
                    since_restart += 1;
                    found
                }
                None => {
                    since_restart = 1;
                    let step = line_search::wolfe(problem, &point, &steepest, fallback, &CONJUGATE)?
                        .ok_or(Failure::LineSearch { iter: iters })?;
                    (step, steepest)
                }
            };

            let previous = std::mem::replace(&mut point, step.point);
            last = Some(Previous {
                gradient: previous.gradient,
                direction,
                alpha: step.alpha,
            });

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

/// What the next direction is built from.
struct Previous {
    gradient: DVector<f64>,
    direction: DVector<f64>,
    alpha: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    use approx::assert_relative_eq;

    /// Rosenbrock's banana function.
    struct Rosenbrock;

    impl MinimizationProblem for Rosenbrock {
        type Error = Infallible;

        fn cost(&self, x: &DVector<f64>) -> Result<f64, Infallible> {
            Ok((1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2))
        }

        fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Infallible> {
            Ok(DVector::from_vec(vec![
                -2.0 * (1.0 - x[0]) - 400.0 * x[0] * (x[1] - x[0] * x[0]),
                200.0 * (x[1] - x[0] * x[0]),
            ]))
        }
    }

    #[test]
    fn every_beta_minimizes_rosenbrock() {
        let config = Config {
            max_iters: 5000,
            gradient_threshold: 1e-6,
            ..Config::default()
        };

        for beta in [Beta::FletcherReeves, Beta::PolakRibiere, Beta::HestenesStiefel] {
            let problem = Counted::new(&Rosenbrock);
            let outcome = ConjugateGradient::default()
                .with_beta(beta)
                .minimize(&problem, DVector::from_vec(vec![-1.2, 1.0]), &config, &mut ())
                .unwrap();

            assert_eq!(outcome.status, Status::GradientThreshold, "{beta:?}");
            assert_relative_eq!(outcome.x[0], 1.0, epsilon = 1e-4);
            assert_relative_eq!(outcome.x[1], 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn polak_ribiere_is_clipped_at_zero() {
        let previous = DVector::from_vec(vec![1.0, 0.0]);
        let gradient = DVector::from_vec(vec![0.5, 0.0]);
        let direction = -&previous;

        assert_relative_eq!(Beta::PolakRibiere.compute(&gradient, &previous, &direction), 0.0);
        assert_relative_eq!(Beta::FletcherReeves.compute(&gradient, &previous, &direction), 0.25);
    }

    #[test]
    fn rejects_zero_restart_interval() {
        assert!(ConjugateGradient::default().validate().is_ok());
        assert!(ConjugateGradient::default().with_restart_every(0).validate().is_err());
    }
}
