use gte_core::{Observer, nalgebra::DVector};

/// Actions an observer can take during a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop the solver and return the current point.
    StopEarly,
}

/// Iteration event emitted after each completed major iteration.
#[derive(Debug)]
pub struct Event<'a> {
    /// Name of the running method.
    pub method: &'static str,

    /// Iteration counter (1-based).
    pub iter: usize,

    /// Current point (best sample for population methods).
    pub x: &'a DVector<f64>,

    /// Cost at `x`.
    pub cost: f64,

    /// Largest gradient component at `x`, for gradient-based methods.
    pub gradient_norm: Option<f64>,
}

/// Emits an event and reports whether the observer asked to stop.
pub(crate) fn notify<Obs>(
    observer: &mut Obs,
    method: &'static str,
    iter: usize,
    x: &DVector<f64>,
    cost: f64,
    gradient_norm: Option<f64>,
) -> bool
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    log::trace!("{method} iteration {iter}: cost = {cost:e}");

    let event = Event {
        method,
        iter,
        x,
        cost,
        gradient_norm,
    };
    matches!(observer.observe(&event), Some(Action::StopEarly))
}
