use gte_core::{MinimizationProblem, Observer, nalgebra::DVector};

use crate::{Action, Config, Event, Failure};

use super::{
    Bfgs, CmaEs, ConjugateGradient, Counted, GradientDescent, Lbfgs, NelderMead, Newton, Outcome,
};

/// Derivative information a method requests from the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Derivatives {
    None,
    Gradient,
    GradientAndHessian,
}

/// A minimization strategy and its settings.
///
/// Values are plain settings; the same `Method` can drive any number of
/// independent solves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Method {
    NelderMead(NelderMead),
    CmaEs(CmaEs),
    Lbfgs(Lbfgs),
    Bfgs(Bfgs),
    GradientDescent(GradientDescent),
    ConjugateGradient(ConjugateGradient),
    Newton(Newton),
}

impl Default for Method {
    /// Nelder–Mead with default settings.
    fn default() -> Self {
        Self::NelderMead(NelderMead::default())
    }
}

impl Method {
    /// Every strategy with default settings, grouped by [`Derivatives`].
    #[must_use]
    pub fn catalogue() -> Vec<Method> {
        vec![
            Self::NelderMead(NelderMead::default()),
            Self::CmaEs(CmaEs::default()),
            Self::Lbfgs(Lbfgs::default()),
            Self::Bfgs(Bfgs),
            Self::GradientDescent(GradientDescent::default()),
            Self::ConjugateGradient(ConjugateGradient::default()),
            Self::Newton(Newton::default()),
        ]
    }

    /// Short, stable name used in events, logs, and errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::NelderMead(_) => NelderMead::NAME,
            Self::CmaEs(_) => CmaEs::NAME,
            Self::Lbfgs(_) => Lbfgs::NAME,
            Self::Bfgs(_) => Bfgs::NAME,
            Self::GradientDescent(_) => GradientDescent::NAME,
            Self::ConjugateGradient(_) => ConjugateGradient::NAME,
            Self::Newton(_) => Newton::NAME,
        }
    }

    #[must_use]
    pub fn requirement(&self) -> Derivatives {
        match self {
            Self::NelderMead(_) | Self::CmaEs(_) => Derivatives::None,
            Self::Lbfgs(_) | Self::Bfgs(_) | Self::GradientDescent(_) | Self::ConjugateGradient(_) => {
                Derivatives::Gradient
            }
            Self::Newton(_) => Derivatives::GradientAndHessian,
        }
    }

    /// Validates the strategy settings.
    ///
    /// # Errors
    ///
    /// Returns a static reason describing the first invalid setting.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            Self::NelderMead(method) => method.validate(),
            Self::CmaEs(method) => method.validate(),
            Self::Lbfgs(method) => method.validate(),
            Self::Bfgs(_) => Ok(()),
            Self::GradientDescent(method) => method.validate(),
            Self::ConjugateGradient(method) => method.validate(),
            Self::Newton(method) => method.validate(),
        }
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
        match self {
            Self::NelderMead(method) => method.minimize(problem, x0, config, observer),
            Self::CmaEs(method) => method.minimize(problem, x0, config, observer),
            Self::Lbfgs(method) => method.minimize(problem, x0, config, observer),
            Self::Bfgs(method) => method.minimize(problem, x0, config, observer),
            Self::GradientDescent(method) => method.minimize(problem, x0, config, observer),
            Self::ConjugateGradient(method) => method.minimize(problem, x0, config, observer),
            Self::Newton(method) => method.minimize(problem, x0, config, observer),
        }
    }
}

macro_rules! impl_from_strategy {
    ($($strategy:ident),* $(,)?) => {
        $(
            impl From<$strategy> for Method {
                fn from(method: $strategy) -> Self {
                    Self::$strategy(method)
                }
            }
        )*
    };
}

impl_from_strategy!(
    NelderMead,
    CmaEs,
    Lbfgs,
    Bfgs,
    GradientDescent,
    ConjugateGradient,
    Newton,
);
