//! Solving systems of equations by least-squares minimization.
//!
//! [`solve`] drives a [`ResidualSystem`](gte_core::ResidualSystem) with an
//! explicit [`Method`](crate::Method) and [`Config`](crate::Config).
//! [`root`] builds the system from an [`EquationSet`](gte_core::EquationSet)
//! and uses the derivative-free default method.
//!
//! # Observer Events
//!
//! [`solve`] emits one [`Event`](crate::Event) per completed iteration.
//! Observers can return [`Action::StopEarly`](crate::Action::StopEarly) to
//! end the solve with [`Status::StoppedByObserver`](crate::Status).

mod root;
mod solve;


pub use root::{root, root_with};
pub use solve::{solve, solve_unobserved};
