//! Core traits and types for solving systems of nonlinear equations.
//!
//! This crate defines the shared abstractions that solvers and observers
//! build on:
//!
//! - [`Equation`] — a residual function `ℝⁿ → ℝ` with an optional analytic
//!   partials hook
//! - [`EquationSet`] — an ordered collection of equation slots
//! - [`ResidualSystem`] — residuals, the least-squares objective, and
//!   finite-difference Jacobian, gradient, and Hessian estimates
//! - [`MinimizationProblem`] — the problem trait minimizers drive
//! - [`Observer`] — receives solver events and optionally returns control actions

pub mod fd;

mod equation;
mod error;
mod observer;
mod problem;
mod system;

pub use equation::{Differentiable, Equation, EquationError, EquationSet, TryEquation};
pub use error::Error;
pub use fd::{Differencing, Parallelism};
pub use observer::Observer;
pub use problem::MinimizationProblem;
pub use system::ResidualSystem;

pub use nalgebra;
