use std::collections::VecDeque;

use gte_core::{MinimizationProblem, Observer, nalgebra::DVector};

use crate::{Action, Config, Event, Failure, Status, event::notify};

use super::{
    Counted, Outcome, Point,
    line_search::{self, QUASI_NEWTON},
};

/// Limited-memory BFGS.
///
/// Approximates the inverse Hessian from the last `memory` step and
/// gradient-change pairs using the two-loop recursion, scaled by the most
/// recent curvature estimate. Steps are chosen by a strong Wolfe line search.
/// If the search fails, the history is dropped and the iteration is retried
/// along steepest descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lbfgs {
    /// Number of correction pairs kept.
    pub memory: usize,
}

impl Default for Lbfgs {
    fn default() -> Self {
        Self { memory: 10 }
    }
}

/// A stored correction pair.
struct Pair {
    s: DVector<f64>,
    y: DVector<f64>,
    rho: f64,
}

impl Lbfgs {
    pub(crate) const NAME: &'static str = "lbfgs";

    #[must_use]
    pub fn with_memory(self, memory: usize) -> Self {
        Self { memory }
    }

    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if self.memory == 0 {
            return Err("lbfgs memory must be positive");
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
        let mut history: VecDeque<Pair> = VecDeque::with_capacity(self.memory);
        let mut iters = 0;

        loop {
            if point.gradient_norm() <= config.gradient_threshold {
                return Ok(point.finish(Status::GradientThreshold, iters));
            }
            if iters >= config.max_iters {
                return Ok(point.finish(Status::MaxIters, iters));
            }

            iters += 1;
            let direction = two_loop(&point.gradient, &history);
            let alpha = if history.is_empty() {
                line_search::initial_step(&point)
            } else {
                1.0
            };

            let next = match line_search::wolfe(problem, &point, &direction, alpha, &QUASI_NEWTON)? {
                Some(step) => step.point,
                None if !history.is_empty() => {
                    log::warn!("{} line search failed at iteration {iters}, dropping history", Self::NAME);
                    history.clear();
                    let direction = -&point.gradient;
                    let alpha = line_search::initial_step(&point);
                    line_search::wolfe(problem, &point, &direction, alpha, &QUASI_NEWTON)?
                        .ok_or(Failure::LineSearch { iter: iters })?
                        .point
                }
                None => return Err(Failure::LineSearch { iter: iters }),
            };

            let s = &next.x - &point.x;
            let y = &next.gradient - &point.gradient;
            let sy = s.dot(&y);
            if sy > f64::EPSILON * s.norm() * y.norm() {
                if history.len() == self.memory {
                    history.pop_front();
                }
                history.push_back(Pair { s, y, rho: 1.0 / sy });
            }
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

/// Returns `-H g` for the inverse Hessian approximation held in `history`.
fn two_loop(gradient: &DVector<f64>, history: &VecDeque<Pair>) -> DVector<f64> {
    let mut q = gradient.clone();
    let mut alphas = Vec::with_capacity(history.len());

    for pair in history.iter().rev() {
        let alpha = pair.rho * pair.s.dot(&q);
        q.axpy(-alpha, &pair.y, 1.0);
        alphas.push(alpha);
    }

    if let Some(last) = history.back() {
        q *= last.s.dot(&last.y) / last.y.norm_squared();
    }

    for (pair, alpha) in history.iter().zip(alphas.iter().rev()) {
        let beta = pair.rho * pair.y.dot(&q);
        q.axpy(alpha - beta, &pair.s, 1.0);
    }

    -q
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    use approx::assert_relative_eq;
    use gte_core::nalgebra::DMatrix;

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
    fn minimizes_rosenbrock() {
        let problem = Counted::new(&Rosenbrock);
        let outcome = Lbfgs::default()
            .minimize(
                &problem,
                DVector::from_vec(vec![-1.2, 1.0]),
                &Config::default(),
                &mut (),
            )
            .unwrap();

        assert_eq!(outcome.status, Status::GradientThreshold);
        assert_relative_eq!(outcome.x[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(outcome.x[1], 1.0, epsilon = 1e-6);
        assert_eq!(problem.evals().hessian, 0);
    }

    #[test]
    fn two_loop_matches_dense_update() {
        // One pair: H = (I - rho s y') gamma I (I - rho y s') + rho s s'.
        let s = DVector::from_vec(vec![1.0, 0.5]);
        let y = DVector::from_vec(vec![2.0, 1.5]);
        let g = DVector::from_vec(vec![0.3, -0.7]);
        let rho = 1.0 / s.dot(&y);
        let gamma = s.dot(&y) / y.norm_squared();

        let identity = DMatrix::<f64>::identity(2, 2);
        let left = &identity - &s * y.transpose() * rho;
        let right = &identity - &y * s.transpose() * rho;
        let dense = &left * (&identity * gamma) * &right + &s * s.transpose() * rho;

        let history = VecDeque::from([Pair {
            s: s.clone(),
            y: y.clone(),
            rho,
        }]);
        let direction = two_loop(&g, &history);
        let expected = -(dense * g);

        assert_relative_eq!(direction[0], expected[0], epsilon = 1e-12);
        assert_relative_eq!(direction[1], expected[1], epsilon = 1e-12);
    }

    #[test]
    fn empty_history_is_steepest_descent() {
        let g = DVector::from_vec(vec![0.3, -0.7]);
        assert_eq!(two_loop(&g, &VecDeque::new()), -g);
    }
}
