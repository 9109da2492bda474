use gte_core::{EquationSet, ResidualSystem};

use crate::{Config, Error, Method, Solution};

use super::solve_unobserved;

/// Finds a root of `equations` with the default derivative-free method.
///
/// Uses [`Config::default`] when `config` is `None`. A supplied config is
/// validated and rejected if invalid, never replaced by defaults.
///
/// # Errors
///
/// Returns [`Error::EmptyEquationSet`] for an empty set,
/// [`Error::EmptyInitialGuess`] for an empty `x0`,
/// [`Error::MissingEquation`] for a placeholder slot,
/// [`Error::InvalidConfig`] for an invalid config, and
/// [`Error::OptimizationFailed`] if the method fails.
pub fn root(equations: EquationSet, x0: &[f64], config: Option<Config>) -> Result<Solution, Error> {
    root_with(equations, x0, &Method::default(), config)
}

/// Finds a root of `equations` with a chosen method.
///
/// Performs the same validation as [`root`].
///
/// # Errors
///
/// See [`root`].
pub fn root_with(
    equations: EquationSet,
    x0: &[f64],
    method: &Method,
    config: Option<Config>,
) -> Result<Solution, Error> {
    if equations.is_empty() {
        return Err(Error::EmptyEquationSet);
    }
    if x0.is_empty() {
        return Err(Error::EmptyInitialGuess);
    }
    let config = config.unwrap_or_default();
    config
        .validate()
        .map_err(|reason| Error::InvalidConfig { reason })?;

    let system = ResidualSystem::new(equations)?;
    solve_unobserved(&system, x0, method, &config)
}
