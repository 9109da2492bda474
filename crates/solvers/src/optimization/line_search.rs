//! Line searches shared by the gradient-based methods.
//!
//! [`wolfe`] brackets a step satisfying the strong Wolfe conditions and then
//! zooms in with safeguarded quadratic interpolation. [`backtracking`] only
//! enforces sufficient decrease and is used by Newton, whose unit step is
//! usually acceptable.
//!
//! A trial point with a non-finite cost is treated as infinitely bad rather
//! than as an error, so a search that overshoots into an invalid region
//! simply shrinks the step.

use gte_core::{MinimizationProblem, nalgebra::DVector};

use crate::Failure;

use super::{Counted, Point};

/// Strong Wolfe parameters.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Wolfe {
    /// Sufficient decrease constant.
    pub(crate) c1: f64,
    /// Curvature constant.
    pub(crate) c2: f64,
    /// Trial points allowed per search.
    pub(crate) max_evals: usize,
}

/// Loose curvature condition suited to quasi-Newton directions.
pub(crate) const QUASI_NEWTON: Wolfe = Wolfe {
    c1: 1e-4,
    c2: 0.9,
    max_evals: 30,
};

/// Tight curvature condition for conjugate gradient and steepest descent.
pub(crate) const CONJUGATE: Wolfe = Wolfe {
    c1: 1e-4,
    c2: 0.1,
    max_evals: 30,
};

/// Step used for the first search of a run.
///
/// Keeps the first move no longer than one unit in any coordinate.
pub(crate) fn initial_step(point: &Point) -> f64 {
    let norm = point.gradient_norm();
    if norm > 1.0 { 1.0 / norm } else { 1.0 }
}

/// An accepted step along the search direction.
#[derive(Debug, Clone)]
pub(crate) struct Step {
    pub(crate) alpha: f64,
    pub(crate) point: Point,
}

/// A step length and what was found there.
#[derive(Debug, Clone)]
struct Trial {
    alpha: f64,
    cost: f64,
    /// Directional derivative, `NaN` when the cost was not finite.
    slope: f64,
    point: Option<Point>,
}

impl Trial {
    fn into_step(self) -> Option<Step> {
        let alpha = self.alpha;
        self.point.map(|point| Step { alpha, point })
    }
}

struct Line<'p, 'a, P> {
    problem: &'p Counted<'a, P>,
    start: &'p Point,
    direction: &'p DVector<f64>,
    evals: usize,
}

impl<P> Line<'_, '_, P>
where
    P: MinimizationProblem + Sync,
{
    /// Evaluates the cost at `start + alpha * direction`.
    ///
    /// The gradient is only computed for finite costs.
    fn probe(&mut self, alpha: f64, with_gradient: bool) -> Result<Trial, Failure> {
        self.evals += 1;
        let x = &self.start.x + self.direction * alpha;
        let cost = self.problem.cost(&x)?;
        if !cost.is_finite() {
            return Ok(Trial {
                alpha,
                cost: f64::INFINITY,
                slope: f64::NAN,
                point: None,
            });
        }
        if !with_gradient {
            return Ok(Trial {
                alpha,
                cost,
                slope: f64::NAN,
                point: Some(Point {
                    x,
                    cost,
                    gradient: DVector::zeros(0),
                }),
            });
        }
        let gradient = self.problem.gradient(&x)?;
        let slope = gradient.dot(self.direction);
        Ok(Trial {
            alpha,
            cost,
            slope,
            point: Some(Point { x, cost, gradient }),
        })
    }
}

/// Searches along `direction` for a step satisfying the strong Wolfe
/// conditions, starting from `alpha`.
///
/// Returns `None` if `direction` is not a descent direction or no step
/// produced sufficient decrease within the evaluation budget. If the budget
/// runs out after some step already decreased the cost sufficiently, the best
/// such step is returned.
///
/// # Errors
///
/// Returns an error only if the problem itself fails to evaluate.
pub(crate) fn wolfe<P>(
    problem: &Counted<'_, P>,
    start: &Point,
    direction: &DVector<f64>,
    alpha: f64,
    params: &Wolfe,
) -> Result<Option<Step>, Failure>
where
    P: MinimizationProblem + Sync,
{
    let slope0 = start.gradient.dot(direction);
    if !(slope0 < 0.0) || !alpha.is_finite() || alpha <= 0.0 {
        return Ok(None);
    }

    let mut line = Line {
        problem,
        start,
        direction,
        evals: 0,
    };
    let sufficient = |trial: &Trial| trial.cost <= start.cost + params.c1 * trial.alpha * slope0;
    let curvature = |trial: &Trial| trial.slope.abs() <= -params.c2 * slope0;

    let mut prev = Trial {
        alpha: 0.0,
        cost: start.cost,
        slope: slope0,
        point: None,
    };
    let mut alpha = alpha;

    while line.evals < params.max_evals {
        let trial = line.probe(alpha, true)?;

        if !sufficient(&trial) || (prev.alpha > 0.0 && trial.cost >= prev.cost) {
            return zoom(&mut line, prev, trial, params, slope0);
        }
        if curvature(&trial) {
            return Ok(trial.into_step());
        }
        if trial.slope >= 0.0 {
            return zoom(&mut line, trial, prev, params, slope0);
        }

        alpha = 2.0 * trial.alpha;
        prev = trial;
    }

    Ok(prev.into_step())
}

/// Narrows `[lo, hi]` until a strong Wolfe step is found.
///
/// `lo` always satisfies sufficient decrease and has the lowest cost seen.
fn zoom<P>(
    line: &mut Line<'_, '_, P>,
    mut lo: Trial,
    mut hi: Trial,
    params: &Wolfe,
    slope0: f64,
) -> Result<Option<Step>, Failure>
where
    P: MinimizationProblem + Sync,
{
    let cost0 = line.start.cost;

    while line.evals < params.max_evals {
        let width = (hi.alpha - lo.alpha).abs();
        if width <= f64::EPSILON * lo.alpha.abs().max(hi.alpha.abs()) {
            break;
        }

        let alpha = interpolate(&lo, &hi);
        let trial = line.probe(alpha, true)?;

        if trial.cost > cost0 + params.c1 * alpha * slope0 || trial.cost >= lo.cost {
            hi = trial;
            continue;
        }
        if trial.slope.abs() <= -params.c2 * slope0 {
            return Ok(trial.into_step());
        }
        if trial.slope * (hi.alpha - lo.alpha) >= 0.0 {
            hi = lo;
        }
        lo = trial;
    }

    Ok(lo.into_step())
}

/// Minimizer of the quadratic through `lo` (value and slope) and `hi`
/// (value), kept away from the interval ends.
fn interpolate(lo: &Trial, hi: &Trial) -> f64 {
    let delta = hi.alpha - lo.alpha;
    let (left, right) = if delta > 0.0 {
        (lo.alpha, hi.alpha)
    } else {
        (hi.alpha, lo.alpha)
    };
    let margin = 0.1 * (right - left);

    let curvature = hi.cost - lo.cost - lo.slope * delta;
    let alpha = lo.alpha - lo.slope * delta * delta / (2.0 * curvature);

    if alpha.is_finite() && alpha >= left + margin && alpha <= right - margin {
        alpha
    } else {
        0.5 * (left + right)
    }
}

/// Backtracks from a unit step until the Armijo condition holds.
///
/// Only the accepted point has its gradient evaluated. Returns `None` if the
/// step shrinks to nothing without sufficient decrease.
///
/// # Errors
///
/// Returns an error only if the problem itself fails to evaluate.
pub(crate) fn backtracking<P>(
    problem: &Counted<'_, P>,
    start: &Point,
    direction: &DVector<f64>,
) -> Result<Option<Point>, Failure>
where
    P: MinimizationProblem + Sync,
{
    const C1: f64 = 1e-4;
    const SHRINK: f64 = 0.5;
    const MAX_EVALS: usize = 60;

    let slope0 = start.gradient.dot(direction);
    if !(slope0 < 0.0) {
        return Ok(None);
    }

    let mut line = Line {
        problem,
        start,
        direction,
        evals: 0,
    };
    let mut alpha = 1.0;

    while line.evals < MAX_EVALS {
        let trial = line.probe(alpha, false)?;
        if trial.cost <= start.cost + C1 * alpha * slope0
            && let Some(point) = trial.point
        {
            let gradient = problem.gradient(&point.x)?;
            return Ok(Some(Point {
                gradient,
                ..point
            }));
        }
        alpha *= SHRINK;
    }

    Ok(None)
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

    /// Finite only inside the unit interval.
    struct Walled;

    impl MinimizationProblem for Walled {
        type Error = Infallible;

        fn cost(&self, x: &DVector<f64>) -> Result<f64, Infallible> {
            Ok(if x[0] < 1.0 { (x[0] - 0.9).powi(2) } else { f64::NAN })
        }

        fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, Infallible> {
            Ok(DVector::from_element(1, 2.0 * (x[0] - 0.9)))
        }
    }

    fn start<P: MinimizationProblem + Sync>(problem: &Counted<'_, P>, x: Vec<f64>) -> Point {
        Point::evaluate(problem, DVector::from_vec(x), 0).unwrap()
    }

    #[test]
    fn wolfe_step_satisfies_both_conditions() {
        let problem = Counted::new(&Rosenbrock);
        let start = start(&problem, vec![-1.2, 1.0]);
        let direction = -&start.gradient;
        let slope0 = start.gradient.dot(&direction);

        for params in [QUASI_NEWTON, CONJUGATE] {
            let alpha = initial_step(&start);
            let Step { alpha, point } = wolfe(&problem, &start, &direction, alpha, &params)
                .unwrap()
                .expect("wolfe step");

            assert!(point.cost <= start.cost + params.c1 * alpha * slope0);
            assert!(point.gradient.dot(&direction).abs() <= -params.c2 * slope0 + 1e-12);
        }
    }

    #[test]
    fn wolfe_rejects_ascent_direction() {
        let problem = Counted::new(&Rosenbrock);
        let start = start(&problem, vec![-1.2, 1.0]);
        let direction = start.gradient.clone();

        let found = wolfe(&problem, &start, &direction, 1.0, &QUASI_NEWTON).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn wolfe_shrinks_away_from_non_finite_costs() {
        let problem = Counted::new(&Walled);
        let start = start(&problem, vec![0.0]);
        let direction = DVector::from_element(1, 1.0);

        let Step { alpha, point } = wolfe(&problem, &start, &direction, 10.0, &CONJUGATE)
            .unwrap()
            .expect("finite step");
        assert!(alpha < 1.0);
        assert!(point.x[0] < 1.0);
        assert!(point.cost < start.cost);
    }

    #[test]
    fn backtracking_accepts_unit_newton_step() {
        let problem = Counted::new(&Walled);
        let start = start(&problem, vec![0.0]);
        // Exact Newton step for the quadratic.
        let direction = DVector::from_element(1, 0.9);

        let point = backtracking(&problem, &start, &direction)
            .unwrap()
            .expect("unit step");
        assert_relative_eq!(point.x[0], 0.9);
        assert_relative_eq!(point.gradient[0], 0.0);
        assert_eq!(problem.evals().gradient, 2);
    }
}
