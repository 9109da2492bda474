//! Solvers for systems of nonlinear equations.
//!
//! A system is solved by minimizing the sum of its squared residuals with a
//! caller-chosen strategy:
//!
//! - [`equation`] — the [`solve`] orchestrator and the [`root`] convenience
//!   entry point
//! - [`optimization`] — the [`Method`] registry and its strategies
//!
//! A returned [`Solution`] only says the optimizer stopped. Whether it found a
//! root is reported separately by [`Solution::converged`].

pub mod equation;
pub mod optimization;

mod config;
mod error;
mod event;
mod solution;

pub use config::Config;
pub use equation::{root, root_with, solve, solve_unobserved};
pub use error::{Error, Failure};
pub use event::{Action, Event};
pub use optimization::{Derivatives, Method};
pub use solution::{Evals, Solution, Status};
