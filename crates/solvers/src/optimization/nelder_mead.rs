use gte_core::{MinimizationProblem, Observer, nalgebra::DVector};

use crate::{Action, Config, Event, Failure, Status, event::notify};

use super::{Counted, Outcome};

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Nelder–Mead downhill simplex.
///
/// Uses only cost evaluations. The initial simplex is the guess plus one
/// vertex per coordinate, offset by `initial_step`. The search stops once
/// the simplex diameter and the spread of its costs both fall to
/// `tolerance`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMead {
    /// Absolute offset of the initial simplex vertices from the guess.
    pub initial_step: f64,

    /// Simplex tolerance; `None` uses [`Config::gradient_threshold`].
    pub tolerance: Option<f64>,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            initial_step: 0.05,
            tolerance: None,
        }
    }
}

impl NelderMead {
    pub(crate) const NAME: &'static str = "nelder-mead";

    #[must_use]
    pub fn with_initial_step(self, initial_step: f64) -> Self {
        Self {
            initial_step,
            ..self
        }
    }

    #[must_use]
    pub fn with_tolerance(self, tolerance: f64) -> Self {
        Self {
            tolerance: Some(tolerance),
            ..self
        }
    }

    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if !self.initial_step.is_finite() || self.initial_step <= 0.0 {
            return Err("nelder-mead initial_step must be finite and positive");
        }
        if let Some(tol) = self.tolerance
            && (!tol.is_finite() || tol <= 0.0)
        {
            return Err("nelder-mead tolerance must be finite and positive");
        }
        Ok(())
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
        let tolerance = self.tolerance.unwrap_or(config.gradient_threshold);
        let mut simplex = Simplex::new(problem, x0, self.initial_step)?;
        let mut iters = 0;

        loop {
            if simplex.has_collapsed(tolerance) {
                return Ok(simplex.finish(Status::SimplexCollapsed, iters));
            }
            if iters >= config.max_iters {
                return Ok(simplex.finish(Status::MaxIters, iters));
            }

            iters += 1;
            simplex.step(problem)?;

            let best = simplex.best();
            if notify(observer, Self::NAME, iters, &best.x, best.cost, None) {
                return Ok(simplex.finish(Status::StoppedByObserver, iters));
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Vertex {
    x: DVector<f64>,
    cost: f64,
}

impl Vertex {
    /// Evaluates `x`, ranking non-finite costs last.
    fn evaluate<P>(problem: &Counted<'_, P>, x: DVector<f64>) -> Result<Self, Failure>
    where
        P: MinimizationProblem + Sync,
    {
        let cost = problem.cost(&x)?;
        let cost = if cost.is_finite() { cost } else { f64::INFINITY };
        Ok(Self { x, cost })
    }
}

/// Vertices kept sorted from best to worst.
struct Simplex {
    vertices: Vec<Vertex>,
}

impl Simplex {
    fn new<P>(problem: &Counted<'_, P>, x0: DVector<f64>, step: f64) -> Result<Self, Failure>
    where
        P: MinimizationProblem + Sync,
    {
        let first = Vertex::evaluate(problem, x0)?;
        if !first.cost.is_finite() {
            return Err(Failure::NonFiniteCost { iter: 0 });
        }

        let n = first.x.len();
        let mut vertices = Vec::with_capacity(n + 1);
        for i in 0..n {
            let mut x = first.x.clone();
            x[i] += step;
            vertices.push(Vertex::evaluate(problem, x)?);
        }
        vertices.push(first);

        let mut simplex = Self { vertices };
        simplex.sort();
        Ok(simplex)
    }

    fn sort(&mut self) {
        self.vertices.sort_by(|a, b| a.cost.total_cmp(&b.cost));
    }

    fn best(&self) -> &Vertex {
        &self.vertices[0]
    }

    fn worst(&self) -> &Vertex {
        &self.vertices[self.vertices.len() - 1]
    }

    fn has_collapsed(&self, tolerance: f64) -> bool {
        let best = self.best();
        let diameter = self.vertices[1..]
            .iter()
            .map(|v| (&v.x - &best.x).amax())
            .fold(0.0, f64::max);
        let spread = self.worst().cost - best.cost;
        diameter <= tolerance && spread <= tolerance
    }

    /// Replaces the worst vertex or shrinks toward the best.
    fn step<P>(&mut self, problem: &Counted<'_, P>) -> Result<(), Failure>
    where
        P: MinimizationProblem + Sync,
    {
        let last = self.vertices.len() - 1;
        let best_cost = self.best().cost;
        let second_worst = self.vertices[last - 1].cost;
        let worst = self.worst().clone();

        let centroid = self.vertices[..last]
            .iter()
            .fold(DVector::zeros(worst.x.len()), |sum, v| sum + &v.x)
            / last as f64;
        let towards = |scale: f64, from: &DVector<f64>| &centroid + (from - &centroid) * scale;

        let reflected = Vertex::evaluate(problem, towards(-REFLECTION, &worst.x))?;

        let replacement = if reflected.cost < best_cost {
            let expanded = Vertex::evaluate(problem, towards(EXPANSION, &reflected.x))?;
            Some(if expanded.cost < reflected.cost {
                expanded
            } else {
                reflected
            })
        } else if reflected.cost < second_worst {
            Some(reflected)
        } else if reflected.cost < worst.cost {
            let outside = Vertex::evaluate(problem, towards(CONTRACTION, &reflected.x))?;
            (outside.cost <= reflected.cost).then_some(outside)
        } else {
            let inside = Vertex::evaluate(problem, towards(CONTRACTION, &worst.x))?;
            (inside.cost < worst.cost).then_some(inside)
        };

        match replacement {
            Some(vertex) => self.vertices[last] = vertex,
            None => self.shrink(problem)?,
        }
        self.sort();
        Ok(())
    }

    fn shrink<P>(&mut self, problem: &Counted<'_, P>) -> Result<(), Failure>
    where
        P: MinimizationProblem + Sync,
    {
        let best = self.best().x.clone();
        for vertex in &mut self.vertices[1..] {
            let x = &best + (&vertex.x - &best) * SHRINK;
            *vertex = Vertex::evaluate(problem, x)?;
        }
        Ok(())
    }

    fn finish(mut self, status: Status, iters: usize) -> Outcome {
        let Vertex { x, cost } = self.vertices.swap_remove(0);
        Outcome {
            x,
            cost,
            iters,
            status,
        }
    }
}
