use gte_core::{Observer, ResidualSystem, nalgebra::DVector};

use crate::{
    Action, Config, Error, Event, Method, Solution,
    optimization::Counted,
};

/// Minimizes the squared residuals of `system` starting from `x0`.
///
/// The observer receives an [`Event`] after every completed iteration of the
/// chosen method.
///
/// The returned [`Solution`] records why the method stopped in `status` and,
/// independently, whether every residual is within
/// [`Config::residual_tol`] in `converged`.
///
/// # Errors
///
/// Returns an error if `x0` is empty, if the method settings or `config`
/// are invalid, or if the method fails.
pub fn solve<Obs>(
    system: &ResidualSystem,
    x0: &[f64],
    method: &Method,
    config: &Config,
    mut observer: Obs,
) -> Result<Solution, Error>
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    if x0.is_empty() {
        return Err(Error::EmptyInitialGuess);
    }
    if system.num_equations() == 0 {
        return Err(Error::EmptyEquationSet);
    }
    config
        .validate()
        .map_err(|reason| Error::InvalidConfig { reason })?;
    method
        .validate()
        .map_err(|reason| Error::InvalidConfig { reason })?;

    log::debug!(
        "solving {} equations in {} unknowns with {}",
        system.num_equations(),
        x0.len(),
        method.name()
    );

    let problem = Counted::new(system);
    let outcome = method
        .minimize(&problem, DVector::from_column_slice(x0), config, &mut observer)
        .map_err(|source| Error::OptimizationFailed {
            method: method.name(),
            source,
        })?;

    let converged = system.is_convergent(outcome.x.as_slice(), config.residual_tol);
    let evals = problem.evals();

    log::debug!(
        "{} finished after {} iterations: {:?}, cost = {:e}, converged = {converged}",
        method.name(),
        outcome.iters,
        outcome.status,
        outcome.cost
    );

    Ok(Solution {
        x: outcome.x,
        cost: outcome.cost,
        iters: outcome.iters,
        status: outcome.status,
        converged,
        evals,
    })
}

/// Minimizes the squared residuals of `system` without observer support.
///
/// This is a convenience wrapper around [`solve`] that uses a no-op observer.
///
/// # Errors
///
/// Returns an error if `x0` is empty, if the method settings or `config`
/// are invalid, or if the method fails.
pub fn solve_unobserved(
    system: &ResidualSystem,
    x0: &[f64],
    method: &Method,
    config: &Config,
) -> Result<Solution, Error> {
    solve(system, x0, method, config, ())
}
