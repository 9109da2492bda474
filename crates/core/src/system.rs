use std::fmt;

use nalgebra::{DMatrix, DVector};

use crate::{Differencing, Equation, EquationSet, Error, fd};

/// A system of equations viewed as a least-squares problem.
///
/// The residual vector `r(x)` stacks every equation in order, and the
/// objective is `‖r(x)‖²`, which is zero exactly at a root of the system.
/// Derivatives are estimated with central differences unless every equation
/// supplies analytic partials.
pub struct ResidualSystem {
    equations: Vec<Box<dyn Equation>>,
    differencing: Differencing,
}

impl ResidualSystem {
    /// Builds a residual system from a set of equations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyEquationSet`] if the set is empty, or
    /// [`Error::MissingEquation`] for the first placeholder slot.
    pub fn new(equations: EquationSet) -> Result<Self, Error> {
        if equations.is_empty() {
            return Err(Error::EmptyEquationSet);
        }

        let equations = equations
            .into_slots()
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(Error::MissingEquation { index }))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            equations,
            differencing: Differencing::default(),
        })
    }

    /// Replaces the finite-difference settings.
    #[must_use]
    pub fn with_differencing(mut self, differencing: Differencing) -> Self {
        self.differencing = differencing;
        self
    }

    /// Returns the finite-difference settings.
    #[must_use]
    pub fn differencing(&self) -> &Differencing {
        &self.differencing
    }

    /// Returns the number of equations (always at least one).
    #[must_use]
    pub fn num_equations(&self) -> usize {
        self.equations.len()
    }

    /// Evaluates every equation at `x`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Equation`] for the first equation that fails.
    pub fn residuals(&self, x: &[f64]) -> Result<DVector<f64>, Error> {
        let values = self
            .equations
            .iter()
            .enumerate()
            .map(|(index, equation)| {
                equation
                    .evaluate(x)
                    .map_err(|source| Error::Equation { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DVector::from_vec(values))
    }

    /// Returns the sum of squared residuals at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Equation`] for the first equation that fails.
    pub fn objective(&self, x: &[f64]) -> Result<f64, Error> {
        Ok(self.residuals(x)?.norm_squared())
    }

    /// Returns the `m × n` Jacobian of the residuals at `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if an equation fails or reports partials of the
    /// wrong length.
    pub fn jacobian(&self, x: &[f64]) -> Result<DMatrix<f64>, Error> {
        if let Some(jac) = self.analytic_jacobian(x) {
            return jac;
        }
        fd::jacobian(
            |p| self.residuals(p),
            x,
            self.num_equations(),
            &self.differencing,
        )
    }

    /// Returns the gradient of the objective at `x`.
    ///
    /// With analytic partials for every equation this is exactly `2·Jᵀr`;
    /// otherwise it is a central-difference estimate.
    ///
    /// # Errors
    ///
    /// Returns an error if an equation fails or reports partials of the
    /// wrong length.
    pub fn gradient(&self, x: &[f64]) -> Result<DVector<f64>, Error> {
        if let Some(jac) = self.analytic_jacobian(x) {
            let residuals = self.residuals(x)?;
            return Ok(jac?.transpose() * residuals * 2.0);
        }
        fd::gradient(|p| self.objective(p), x, &self.differencing)
    }

    /// Returns the symmetric Hessian of the objective at `x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Equation`] for the first equation that fails.
    pub fn hessian(&self, x: &[f64]) -> Result<DMatrix<f64>, Error> {
        fd::hessian(|p| self.objective(p), x, &self.differencing)
    }

    /// Checks whether every residual at `x` is within `tolerance` of zero.
    ///
    /// A point where any equation fails or yields a non-finite residual is
    /// never convergent.
    #[must_use]
    pub fn is_convergent(&self, x: &[f64], tolerance: f64) -> bool {
        self.residuals(x)
            .is_ok_and(|residuals| residuals.iter().all(|r| r.abs() <= tolerance))
    }

    /// Builds the Jacobian from analytic partials, if every equation has them.
    fn analytic_jacobian(&self, x: &[f64]) -> Option<Result<DMatrix<f64>, Error>> {
        let n = x.len();
        let mut rows = Vec::with_capacity(self.equations.len());
        for (index, equation) in self.equations.iter().enumerate() {
            let row = match equation.partials(x)? {
                Ok(row) => row,
                Err(source) => return Some(Err(Error::Equation { index, source })),
            };
            if row.len() != n {
                return Some(Err(Error::PartialsLength {
                    index,
                    expected: n,
                    found: row.len(),
                }));
            }
            rows.push(row);
        }
        Some(Ok(DMatrix::from_fn(rows.len(), n, |i, j| rows[i][j])))
    }
}

impl fmt::Debug for ResidualSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResidualSystem")
            .field("equations", &self.equations.len())
            .field("differencing", &self.differencing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use thiserror::Error;

    use crate::{Differentiable, Parallelism, TryEquation};

    #[derive(Debug, Error)]
    #[error("outside the model's domain")]
    struct OutOfDomain;

    fn circle_and_line() -> EquationSet {
        EquationSet::new()
            .with(|x: &[f64]| x[0] * x[0] + x[1] * x[1] - 4.0)
            .with(|x: &[f64]| x[0] - x[1])
    }

    #[test]
    fn rejects_empty_set() {
        let result = ResidualSystem::new(EquationSet::new());
        assert!(matches!(result, Err(Error::EmptyEquationSet)));
    }

    #[test]
    fn rejects_missing_slot() {
        let mut set = circle_and_line();
        set.push_placeholder();

        let result = ResidualSystem::new(set);

        assert!(matches!(result, Err(Error::MissingEquation { index: 2 })));
    }

    #[test]
    fn residuals_match_direct_evaluation() {
        let f0 = |x: &[f64]| x[0] * x[0] + x[1] * x[1] - 4.0;
        let f1 = |x: &[f64]| x[0] - x[1];
        let system = ResidualSystem::new(EquationSet::new().with(f0).with(f1)).unwrap();

        for x in [[1.0, 1.0], [0.0, -3.5], [2.5, 0.25]] {
            let residuals = system.residuals(&x).unwrap();
            assert_eq!(residuals.len(), 2);
            assert_eq!(residuals[0], f0(&x));
            assert_eq!(residuals[1], f1(&x));
        }
    }

    #[test]
    fn objective_is_sum_of_squares() {
        let system = ResidualSystem::new(circle_and_line()).unwrap();

        // r = (1 + 1 - 4, 0) = (-2, 0)
        assert_relative_eq!(system.objective(&[1.0, 1.0]).unwrap(), 4.0);

        let root = 2.0_f64.sqrt();
        assert_relative_eq!(system.objective(&[root, root]).unwrap(), 0.0, epsilon = 1e-28);
    }

    #[test]
    fn jacobian_matches_analytic() {
        let system = ResidualSystem::new(circle_and_line()).unwrap();

        let jac = system.jacobian(&[1.5, -0.5]).unwrap();

        assert_eq!(jac.shape(), (2, 2));
        assert_relative_eq!(jac[(0, 0)], 3.0, epsilon = 1e-6);
        assert_relative_eq!(jac[(0, 1)], -1.0, epsilon = 1e-6);
        assert_relative_eq!(jac[(1, 0)], 1.0, epsilon = 1e-6);
        assert_relative_eq!(jac[(1, 1)], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn gradient_is_twice_jacobian_transpose_residuals() {
        let system = ResidualSystem::new(circle_and_line()).unwrap();
        let x = [1.5, -0.5];

        let expected = system.jacobian(&x).unwrap().transpose() * system.residuals(&x).unwrap() * 2.0;
        let grad = system.gradient(&x).unwrap();

        assert_relative_eq!(grad[0], expected[0], max_relative = 1e-6);
        assert_relative_eq!(grad[1], expected[1], max_relative = 1e-6);
    }

    #[test]
    fn hessian_is_symmetric_and_accurate() {
        // Linear residuals give the constant Hessian 2·JᵀJ.
        let system = ResidualSystem::new(
            EquationSet::new()
                .with(|x: &[f64]| x[0] + 2.0 * x[1] - 1.0)
                .with(|x: &[f64]| 3.0 * x[0] - x[1] + 4.0),
        )
        .unwrap();

        let hess = system.hessian(&[0.2, 0.7]).unwrap();

        assert_eq!(hess, hess.transpose());
        assert_relative_eq!(hess[(0, 0)], 20.0, epsilon = 1e-5);
        assert_relative_eq!(hess[(0, 1)], -2.0, epsilon = 1e-5);
        assert_relative_eq!(hess[(1, 1)], 10.0, epsilon = 1e-5);
    }

    #[test]
    fn analytic_partials_replace_differencing() {
        let system = ResidualSystem::new(
            EquationSet::new()
                .with(Differentiable::new(
                    |x: &[f64]| x[0] * x[0] + x[1] * x[1] - 4.0,
                    |x: &[f64]| vec![2.0 * x[0], 2.0 * x[1]],
                ))
                .with(Differentiable::new(
                    |x: &[f64]| x[0] - x[1],
                    |_: &[f64]| vec![1.0, -1.0],
                )),
        )
        .unwrap();

        let jac = system.jacobian(&[1.5, -0.5]).unwrap();
        assert_eq!(jac, DMatrix::from_row_slice(2, 2, &[3.0, -1.0, 1.0, -1.0]));

        // r = (-1.5, 2.0), so 2·Jᵀr = 2·(3·-1.5 + 2, -1·-1.5 - 2) = (-5, -1)
        let grad = system.gradient(&[1.5, -0.5]).unwrap();
        assert_eq!(grad, DVector::from_vec(vec![-5.0, -1.0]));
    }

    #[test]
    fn partials_of_wrong_length_are_rejected() {
        let system = ResidualSystem::new(
            EquationSet::new().with(Differentiable::new(|x: &[f64]| x[0], |_: &[f64]| vec![1.0])),
        )
        .unwrap();

        let result = system.jacobian(&[1.0, 2.0]);

        assert!(matches!(
            result,
            Err(Error::PartialsLength {
                index: 0,
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn equation_errors_carry_their_index() {
        let system = ResidualSystem::new(
            EquationSet::new()
                .with(|x: &[f64]| x[0])
                .with(TryEquation(|x: &[f64]| {
                    if x[0] < 0.0 { Err(OutOfDomain) } else { Ok(x[0].sqrt()) }
                })),
        )
        .unwrap();

        assert!(system.residuals(&[4.0]).is_ok());
        assert!(matches!(
            system.residuals(&[-1.0]),
            Err(Error::Equation { index: 1, .. })
        ));
        assert!(matches!(
            system.gradient(&[-1.0]),
            Err(Error::Equation { index: 1, .. })
        ));
    }

    #[test]
    fn convergence_check() {
        let system = ResidualSystem::new(circle_and_line()).unwrap();

        assert!(!system.is_convergent(&[1.0, 1.0], 1e-6));
        assert!(system.is_convergent(&[1.0, 1.0], 2.0));
        assert!(!system.is_convergent(&[0.0, 2.0], 1.5));

        let exact = ResidualSystem::new(EquationSet::new().with(|x: &[f64]| x[0] - 3.0)).unwrap();
        assert!(exact.is_convergent(&[3.0], 0.0));
        assert!(exact.is_convergent(&[3.0], 1e-12));
    }

    #[test]
    fn non_finite_residuals_never_converge() {
        let system = ResidualSystem::new(EquationSet::new().with(|x: &[f64]| x[0].ln())).unwrap();
        assert!(!system.is_convergent(&[-1.0], f64::MAX));
    }

    #[test]
    fn serial_and_parallel_differencing_agree() {
        let serial = ResidualSystem::new(circle_and_line())
            .unwrap()
            .with_differencing(Differencing::default().with_parallelism(Parallelism::Serial));
        let parallel = ResidualSystem::new(circle_and_line()).unwrap();
        let x = [0.4, 1.9];

        assert_eq!(serial.jacobian(&x).unwrap(), parallel.jacobian(&x).unwrap());
        assert_eq!(serial.gradient(&x).unwrap(), parallel.gradient(&x).unwrap());
        assert_eq!(serial.hessian(&x).unwrap(), parallel.hessian(&x).unwrap());
    }
}
