//! Minimization strategies for the sum-of-squares objective.
//!
//! Every strategy is a small settings struct with no run state, wrapped in
//! the closed [`Method`] enum. Strategies drive any
//! [`MinimizationProblem`](gte_core::MinimizationProblem); the orchestrator
//! hands them a [`ResidualSystem`](gte_core::ResidualSystem).
//!
//! # Strategies
//!
//! | Derivatives | Strategies |
//! |---|---|
//! | none | [`NelderMead`], [`CmaEs`] |
//! | gradient | [`Lbfgs`], [`Bfgs`], [`GradientDescent`], [`ConjugateGradient`] |
//! | gradient and Hessian | [`Newton`] |
//!
//! Gradient-based strategies stop when the largest gradient component falls
//! to [`Config::gradient_threshold`](crate::Config::gradient_threshold).
//! Derivative-free strategies stop when their search region collapses.

mod bfgs;
mod cma_es;
mod conjugate_gradient;
mod counted;
mod gradient_descent;
mod lbfgs;
mod line_search;
mod method;
mod nelder_mead;
mod newton;
mod point;

pub use bfgs::Bfgs;
pub use cma_es::CmaEs;
pub use conjugate_gradient::{Beta, ConjugateGradient};
pub use gradient_descent::GradientDescent;
pub use lbfgs::Lbfgs;
pub use method::{Derivatives, Method};
pub use nelder_mead::NelderMead;
pub use newton::Newton;

pub(crate) use counted::Counted;
pub(crate) use point::{Outcome, Point};
