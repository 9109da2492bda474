use std::fmt;

/// Boxed error returned by a failing equation.
pub type EquationError = Box<dyn std::error::Error + Send + Sync>;

/// A scalar residual function `ℝⁿ → ℝ`.
///
/// A root of an equation is a point where [`Equation::evaluate`] returns zero.
///
/// Plain closures `Fn(&[f64]) -> f64` implement this trait directly.
/// Use [`TryEquation`] for closures that can fail, and [`Differentiable`] to
/// attach analytic partial derivatives.
///
/// Implementations must be pure: derivative estimates evaluate the same
/// equation from several worker threads at once.
pub trait Equation: Send + Sync {
    /// Evaluates the residual at `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if the residual cannot be computed at `x`,
    /// for example when `x` has the wrong number of unknowns.
    fn evaluate(&self, x: &[f64]) -> Result<f64, EquationError>;

    /// Returns the analytic partial derivatives `∂f/∂xⱼ` at `x`, if known.
    ///
    /// The default returns `None`, which makes the residual system fall back
    /// to central differences.
    fn partials(&self, _x: &[f64]) -> Option<Result<Vec<f64>, EquationError>> {
        None
    }
}

impl<F> Equation for F
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
{
    fn evaluate(&self, x: &[f64]) -> Result<f64, EquationError> {
        Ok(self(x))
    }
}

/// Adapts a fallible closure into an [`Equation`].
#[derive(Debug, Clone, Copy)]
pub struct TryEquation<F>(pub F);

impl<F, E> Equation for TryEquation<F>
where
    F: Fn(&[f64]) -> Result<f64, E> + Send + Sync,
    E: Into<EquationError>,
{
    fn evaluate(&self, x: &[f64]) -> Result<f64, EquationError> {
        (self.0)(x).map_err(Into::into)
    }
}

/// An equation with analytic partial derivatives.
#[derive(Debug, Clone, Copy)]
pub struct Differentiable<F, G> {
    value: F,
    partials: G,
}

impl<F, G> Differentiable<F, G>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
    G: Fn(&[f64]) -> Vec<f64> + Send + Sync,
{
    /// Pairs a residual function with its partial derivatives.
    pub fn new(value: F, partials: G) -> Self {
        Self { value, partials }
    }
}

impl<F, G> Equation for Differentiable<F, G>
where
    F: Fn(&[f64]) -> f64 + Send + Sync,
    G: Fn(&[f64]) -> Vec<f64> + Send + Sync,
{
    fn evaluate(&self, x: &[f64]) -> Result<f64, EquationError> {
        Ok((self.value)(x))
    }

    fn partials(&self, x: &[f64]) -> Option<Result<Vec<f64>, EquationError>> {
        Some(Ok((self.partials)(x)))
    }
}

/// An ordered collection of equation slots.
///
/// Slot order fixes the index of each residual. A slot may be reserved with
/// [`EquationSet::push_placeholder`] for a component that does not supply an
/// equation yet; a [`ResidualSystem`](crate::ResidualSystem) refuses to build
/// from a set that still contains one.
#[derive(Default)]
pub struct EquationSet {
    slots: Vec<Option<Box<dyn Equation>>>,
}

impl EquationSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an equation.
    pub fn push<E: Equation + 'static>(&mut self, equation: E) {
        self.slots.push(Some(Box::new(equation)));
    }

    /// Appends an equation, builder style.
    #[must_use]
    pub fn with<E: Equation + 'static>(mut self, equation: E) -> Self {
        self.push(equation);
        self
    }

    /// Reserves a slot without an equation.
    pub fn push_placeholder(&mut self) {
        self.slots.push(None);
    }

    /// Returns the number of slots, including placeholders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the set has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the index of the first placeholder slot, if any.
    #[must_use]
    pub fn first_missing(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    pub(crate) fn into_slots(self) -> Vec<Option<Box<dyn Equation>>> {
        self.slots
    }
}

impl fmt::Debug for EquationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let missing = self.slots.iter().filter(|slot| slot.is_none()).count();
        f.debug_struct("EquationSet")
            .field("len", &self.slots.len())
            .field("missing", &missing)
            .finish()
    }
}

impl FromIterator<Box<dyn Equation>> for EquationSet {
    fn from_iter<T: IntoIterator<Item = Box<dyn Equation>>>(iter: T) -> Self {
        Self {
            slots: iter.into_iter().map(Some).collect(),
        }
    }
}

impl FromIterator<Option<Box<dyn Equation>>> for EquationSet {
    fn from_iter<T: IntoIterator<Item = Option<Box<dyn Equation>>>>(iter: T) -> Self {
        Self {
            slots: iter.into_iter().collect(),
        }
    }
}
