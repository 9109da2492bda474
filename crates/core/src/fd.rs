//! Central-difference derivative estimates.
//!
//! Every estimate here uses symmetric perturbations of a fixed step `h`:
//!
//! - gradient and Jacobian: `(f(x + h·eⱼ) − f(x − h·eⱼ)) / 2h`
//! - Hessian: paired perturbations
//!   `[f(x+hᵢ+hⱼ) − f(x+hᵢ−hⱼ) − f(x−hᵢ+hⱼ) + f(x−hᵢ−hⱼ)] / 4h²`,
//!   computed on the lower triangle and mirrored
//!
//! Each partial derivative is independent of the others, so the work is
//! spread over rayon worker threads according to [`Parallelism`].
//! Results do not depend on the parallelism setting.

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};

use crate::Error;

/// Default differencing step.
pub const DEFAULT_STEP: f64 = 1e-8;

/// How finite-difference evaluations are scheduled.
#[derive(Debug, Clone, Default)]
pub enum Parallelism {
    /// Evaluate every perturbation on the calling thread.
    Serial,

    /// Use rayon's global pool, sized automatically.
    #[default]
    Automatic,

    /// Use a dedicated pool with a fixed number of threads.
    Pool(Arc<ThreadPool>),
}

impl Parallelism {
    /// Builds a dedicated pool with `threads` workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread pool cannot be created.
    pub fn threads(threads: usize) -> Result<Self, Error> {
        let pool = ThreadPoolBuilder::new().num_threads(threads).build()?;
        Ok(Self::Pool(Arc::new(pool)))
    }
}

/// Finite-difference settings shared by every derivative estimate.
///
/// The step is fixed when the settings are built and is never re-derived
/// per call, so repeated estimates at the same point are identical.
#[derive(Debug, Clone)]
pub struct Differencing {
    step: f64,
    parallelism: Parallelism,
}

impl Default for Differencing {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            parallelism: Parallelism::default(),
        }
    }
}

impl Differencing {
    /// Creates settings with the given step and automatic parallelism.
    ///
    /// # Errors
    ///
    /// Returns an error if `step` is not finite and positive.
    pub fn new(step: f64) -> Result<Self, Error> {
        if !step.is_finite() || step <= 0.0 {
            return Err(Error::InvalidStep { step });
        }
        Ok(Self {
            step,
            parallelism: Parallelism::default(),
        })
    }

    /// Replaces the scheduling policy.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Returns the first-derivative step `h`.
    #[must_use]
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Returns the step used for second derivatives, `√h`.
    ///
    /// Second differences divide by `h²`, so they need a wider perturbation
    /// than first differences to stay above rounding noise.
    #[must_use]
    pub fn hessian_step(&self) -> f64 {
        self.step.sqrt()
    }

    /// Returns the scheduling policy.
    #[must_use]
    pub fn parallelism(&self) -> &Parallelism {
        &self.parallelism
    }

    /// Evaluates `f(0..len)` under the configured scheduling policy.
    ///
    /// Results are returned in index order. The first error encountered
    /// is returned.
    fn map_indices<T, E, F>(&self, len: usize, f: F) -> Result<Vec<T>, E>
    where
        T: Send,
        E: Send,
        F: Fn(usize) -> Result<T, E> + Sync,
    {
        match &self.parallelism {
            Parallelism::Serial => (0..len).map(&f).collect(),
            Parallelism::Automatic => (0..len).into_par_iter().map(&f).collect(),
            Parallelism::Pool(pool) => {
                pool.install(|| (0..len).into_par_iter().map(&f).collect())
            }
        }
    }
}

/// Estimates the gradient of a scalar function at `x`.
///
/// # Errors
///
/// Returns the first error produced by `f`.
pub fn gradient<F, E>(f: F, x: &[f64], differencing: &Differencing) -> Result<DVector<f64>, E>
where
    F: Fn(&[f64]) -> Result<f64, E> + Sync,
    E: Send,
{
    let h = differencing.step();
    let partials = differencing.map_indices(x.len(), |j| {
        let mut probe = x.to_vec();
        probe[j] = x[j] + h;
        let forward = f(&probe)?;
        probe[j] = x[j] - h;
        let backward = f(&probe)?;
        Ok((forward - backward) / (2.0 * h))
    })?;
    Ok(DVector::from_vec(partials))
}

/// Estimates the `rows × x.len()` Jacobian of a vector function at `x`.
///
/// `f` must return a vector of length `rows` at every point.
///
/// # Errors
///
/// Returns the first error produced by `f`.
pub fn jacobian<F, E>(
    f: F,
    x: &[f64],
    rows: usize,
    differencing: &Differencing,
) -> Result<DMatrix<f64>, E>
where
    F: Fn(&[f64]) -> Result<DVector<f64>, E> + Sync,
    E: Send,
{
    let h = differencing.step();
    let columns = differencing.map_indices(x.len(), |j| {
        let mut probe = x.to_vec();
        probe[j] = x[j] + h;
        let forward = f(&probe)?;
        probe[j] = x[j] - h;
        let backward = f(&probe)?;
        Ok((forward - backward) / (2.0 * h))
    })?;
    Ok(DMatrix::from_fn(rows, x.len(), |i, j| columns[j][i]))
}

/// Estimates the symmetric Hessian of a scalar function at `x`.
///
/// Uses [`Differencing::hessian_step`] as the perturbation.
///
/// # Errors
///
/// Returns the first error produced by `f`.
pub fn hessian<F, E>(f: F, x: &[f64], differencing: &Differencing) -> Result<DMatrix<f64>, E>
where
    F: Fn(&[f64]) -> Result<f64, E> + Sync,
    E: Send,
{
    let h = differencing.hessian_step();
    let n = x.len();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (0..=i).map(move |j| (i, j)))
        .collect();

    let values = differencing.map_indices(pairs.len(), |k| {
        let (i, j) = pairs[k];
        let mut probe = x.to_vec();
        let mut at = |di: f64, dj: f64| {
            probe.copy_from_slice(x);
            probe[i] += di;
            probe[j] += dj;
            f(&probe)
        };
        let pp = at(h, h)?;
        let pm = at(h, -h)?;
        let mp = at(-h, h)?;
        let mm = at(-h, -h)?;
        Ok((pp - pm - mp + mm) / (4.0 * h * h))
    })?;

    let mut hess = DMatrix::zeros(n, n);
    for (&(i, j), &value) in pairs.iter().zip(&values) {
        hess[(i, j)] = value;
        hess[(j, i)] = value;
    }
    Ok(hess)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    use approx::assert_relative_eq;

    fn rosenbrock(x: &[f64]) -> Result<f64, Infallible> {
        Ok((1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2))
    }

    #[test]
    fn rejects_invalid_steps() {
        assert!(matches!(Differencing::new(0.0), Err(Error::InvalidStep { .. })));
        assert!(matches!(Differencing::new(-1e-6), Err(Error::InvalidStep { .. })));
        assert!(matches!(Differencing::new(f64::NAN), Err(Error::InvalidStep { .. })));
        assert!(Differencing::new(1e-6).is_ok());
    }

    #[test]
    fn hessian_step_is_square_root_of_step() {
        let differencing = Differencing::default();
        assert_relative_eq!(differencing.step(), 1e-8);
        assert_relative_eq!(differencing.hessian_step(), 1e-4, epsilon = 1e-18);
    }

    #[test]
    fn gradient_matches_analytic() {
        let x = [-1.2, 1.0];
        let grad = gradient(rosenbrock, &x, &Differencing::default()).unwrap();

        // ∂f/∂x = -2(1 - x) - 400x(y - x²), ∂f/∂y = 200(y - x²)
        assert_relative_eq!(grad[0], -215.6, max_relative = 1e-6);
        assert_relative_eq!(grad[1], -88.0, max_relative = 1e-6);
    }

    #[test]
    fn hessian_matches_analytic() {
        let x = [1.0, 1.0];
        let hess = hessian(rosenbrock, &x, &Differencing::default()).unwrap();

        assert_relative_eq!(hess[(0, 0)], 802.0, max_relative = 1e-5);
        assert_relative_eq!(hess[(0, 1)], -400.0, max_relative = 1e-5);
        assert_relative_eq!(hess[(1, 0)], -400.0, max_relative = 1e-5);
        assert_relative_eq!(hess[(1, 1)], 200.0, max_relative = 1e-5);
    }

    #[test]
    fn jacobian_matches_analytic() {
        let f = |x: &[f64]| -> Result<DVector<f64>, Infallible> {
            Ok(DVector::from_vec(vec![x[0] * x[1], x[0] + 3.0 * x[1], x[1].sin()]))
        };

        let jac = jacobian(f, &[2.0, 0.5], 3, &Differencing::default()).unwrap();

        assert_eq!(jac.shape(), (3, 2));
        assert_relative_eq!(jac[(0, 0)], 0.5, epsilon = 1e-6);
        assert_relative_eq!(jac[(0, 1)], 2.0, epsilon = 1e-6);
        assert_relative_eq!(jac[(1, 0)], 1.0, epsilon = 1e-6);
        assert_relative_eq!(jac[(1, 1)], 3.0, epsilon = 1e-6);
        assert_relative_eq!(jac[(2, 0)], 0.0, epsilon = 1e-6);
        assert_relative_eq!(jac[(2, 1)], 0.5_f64.cos(), epsilon = 1e-6);
    }

    #[test]
    fn parallelism_does_not_change_results() {
        let x = [0.3, -0.7];
        let serial = Differencing::default().with_parallelism(Parallelism::Serial);
        let automatic = Differencing::default();
        let pooled = Differencing::default().with_parallelism(Parallelism::threads(2).unwrap());

        let expected = gradient(rosenbrock, &x, &serial).unwrap();
        assert_eq!(gradient(rosenbrock, &x, &automatic).unwrap(), expected);
        assert_eq!(gradient(rosenbrock, &x, &pooled).unwrap(), expected);

        let expected = hessian(rosenbrock, &x, &serial).unwrap();
        assert_eq!(hessian(rosenbrock, &x, &automatic).unwrap(), expected);
        assert_eq!(hessian(rosenbrock, &x, &pooled).unwrap(), expected);
    }

    #[test]
    fn first_error_is_returned() {
        let failing = |x: &[f64]| -> Result<f64, String> {
            if x[1] > 0.0 {
                Err("out of domain".to_string())
            } else {
                Ok(x[0])
            }
        };

        let result = gradient(failing, &[0.0, 0.0], &Differencing::default());

        assert_eq!(result.unwrap_err(), "out of domain");
    }
}
