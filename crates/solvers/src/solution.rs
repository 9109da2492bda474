use gte_core::nalgebra::DVector;

/// Why the optimizer stopped.
///
/// This is the optimizer's own stopping rule. It says nothing about whether
/// the residuals are small; see [`Solution::converged`] for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The largest gradient component fell to the configured threshold.
    GradientThreshold,

    /// The Nelder–Mead simplex shrank below its tolerance.
    SimplexCollapsed,

    /// The CMA-ES search distribution shrank below its tolerance.
    StepSizeCollapsed,

    /// Reached the iteration limit.
    MaxIters,

    /// Stopped early due to an observer decision.
    StoppedByObserver,
}

/// Number of problem evaluations performed during a solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evals {
    pub cost: usize,
    pub gradient: usize,
    pub hessian: usize,
}

/// The result of a solve.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Best point found.
    pub x: DVector<f64>,

    /// Sum of squared residuals at `x`.
    pub cost: f64,

    /// Iteration count when the solver finished.
    pub iters: usize,

    /// Optimizer termination reason.
    pub status: Status,

    /// Whether every residual at `x` is within the configured residual
    /// tolerance.
    pub converged: bool,

    /// Problem evaluations performed.
    pub evals: Evals,
}
