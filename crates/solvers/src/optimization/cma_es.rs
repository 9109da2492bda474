use gte_core::{
    MinimizationProblem, Observer,
    nalgebra::{DMatrix, DVector},
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;

use crate::{Action, Config, Event, Failure, Status, event::notify};

use super::{Counted, Outcome};

/// Covariance matrix adaptation evolution strategy.
///
/// Samples a population around a mean, moves the mean toward the best half,
/// and adapts the step size and covariance from the successful steps.
/// Only cost evaluations are used. The best sample ever seen is returned.
///
/// Runs are reproducible when `seed` is set. Without a seed each solve draws
/// fresh entropy, so repeated solves differ slightly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CmaEs {
    /// Samples per generation.
    pub population: usize,

    /// Initial step size (standard deviation of the first generation).
    pub initial_step: f64,

    /// Seed for the sampler; `None` seeds from system entropy.
    pub seed: Option<u64>,

    /// Step-size tolerance; `None` uses [`Config::gradient_threshold`].
    pub tolerance: Option<f64>,
}

impl Default for CmaEs {
    fn default() -> Self {
        Self {
            population: 20,
            initial_step: 0.5,
            seed: None,
            tolerance: None,
        }
    }
}

impl CmaEs {
    pub(crate) const NAME: &'static str = "cma-es";

    #[must_use]
    pub fn with_population(self, population: usize) -> Self {
        Self { population, ..self }
    }

    #[must_use]
    pub fn with_initial_step(self, initial_step: f64) -> Self {
        Self {
            initial_step,
            ..self
        }
    }

    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
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
        if self.population < 2 {
            return Err("cma-es population must be at least 2");
        }
        if !self.initial_step.is_finite() || self.initial_step <= 0.0 {
            return Err("cma-es initial_step must be finite and positive");
        }
        if let Some(tol) = self.tolerance
            && (!tol.is_finite() || tol <= 0.0)
        {
            return Err("cma-es tolerance must be finite and positive");
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
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let cost = problem.cost(&x0)?;
        if !cost.is_finite() {
            return Err(Failure::NonFiniteCost { iter: 0 });
        }
        let mut best = Best {
            x: x0.clone(),
            cost,
        };

        let params = Params::new(x0.len(), self.population);
        let mut state = State::new(x0, self.initial_step);
        let mut iters = 0;

        loop {
            if state.spread() <= tolerance {
                return Ok(best.finish(Status::StepSizeCollapsed, iters));
            }
            if iters >= config.max_iters {
                return Ok(best.finish(Status::MaxIters, iters));
            }

            iters += 1;
            let samples = state.sample(problem, &params, &mut rng, iters)?;
            if samples[0].cost < best.cost {
                best = Best {
                    x: samples[0].x.clone(),
                    cost: samples[0].cost,
                };
            }
            state.update(&params, &samples, iters)?;

            if notify(observer, Self::NAME, iters, &best.x, best.cost, None) {
                return Ok(best.finish(Status::StoppedByObserver, iters));
            }
        }
    }
}

/// Strategy constants derived from the dimension and population size.
struct Params {
    lambda: usize,
    weights: Vec<f64>,
    mu_eff: f64,
    cc: f64,
    cs: f64,
    c1: f64,
    cmu: f64,
    damps: f64,
    chi_n: f64,
}

impl Params {
    fn new(n: usize, lambda: usize) -> Self {
        let nf = n as f64;
        let mu = lambda / 2;

        let raw: Vec<f64> = (1..=mu)
            .map(|i| (mu as f64 + 0.5).ln() - (i as f64).ln())
            .collect();
        let total: f64 = raw.iter().sum();
        let weights: Vec<f64> = raw.iter().map(|w| w / total).collect();
        let mu_eff = 1.0 / weights.iter().map(|w| w * w).sum::<f64>();

        let cc = (4.0 + mu_eff / nf) / (nf + 4.0 + 2.0 * mu_eff / nf);
        let cs = (mu_eff + 2.0) / (nf + mu_eff + 5.0);
        let c1 = 2.0 / ((nf + 1.3).powi(2) + mu_eff);
        let cmu = (1.0 - c1).min(2.0 * (mu_eff - 2.0 + 1.0 / mu_eff) / ((nf + 2.0).powi(2) + mu_eff));
        let damps = 1.0 + 2.0 * (((mu_eff - 1.0) / (nf + 1.0)).sqrt() - 1.0).max(0.0) + cs;
        let chi_n = nf.sqrt() * (1.0 - 1.0 / (4.0 * nf) + 1.0 / (21.0 * nf * nf));

        Self {
            lambda,
            weights,
            mu_eff,
            cc,
            cs,
            c1,
            cmu,
            damps,
            chi_n,
        }
    }
}

/// One evaluated draw: `x = mean + sigma * y` with `y = L z`.
struct Sample {
    z: DVector<f64>,
    y: DVector<f64>,
    x: DVector<f64>,
    cost: f64,
}

/// Lowest-cost point seen so far.
struct Best {
    x: DVector<f64>,
    cost: f64,
}

impl Best {
    fn finish(self, status: Status, iters: usize) -> Outcome {
        Outcome {
            x: self.x,
            cost: self.cost,
            iters,
            status,
        }
    }
}

/// Search distribution, rebuilt for every solve.
struct State {
    mean: DVector<f64>,
    sigma: f64,
    cov: DMatrix<f64>,
    pc: DVector<f64>,
    ps: DVector<f64>,
}

impl State {
    fn new(mean: DVector<f64>, sigma: f64) -> Self {
        let n = mean.len();
        Self {
            mean,
            sigma,
            cov: DMatrix::identity(n, n),
            pc: DVector::zeros(n),
            ps: DVector::zeros(n),
        }
    }

    /// Largest standard deviation along a coordinate axis.
    fn spread(&self) -> f64 {
        let widest = self.cov.diagonal().iter().copied().fold(0.0, f64::max);
        self.sigma * widest.sqrt()
    }

    /// Draws and evaluates a generation, sorted from best to worst.
    fn sample<P>(
        &self,
        problem: &Counted<'_, P>,
        params: &Params,
        rng: &mut StdRng,
        iter: usize,
    ) -> Result<Vec<Sample>, Failure>
    where
        P: MinimizationProblem + Sync,
    {
        let n = self.mean.len();
        let factor = self
            .cov
            .clone()
            .cholesky()
            .ok_or(Failure::CovarianceBreakdown { iter })?
            .l();

        let mut samples = Vec::with_capacity(params.lambda);
        for _ in 0..params.lambda {
            let z: DVector<f64> = DVector::from_fn(n, |_, _| rng.sample(StandardNormal));
            let y = &factor * &z;
            let x = &self.mean + &y * self.sigma;
            let cost = problem.cost(&x)?;
            let cost = if cost.is_finite() { cost } else { f64::INFINITY };
            samples.push(Sample { z, y, x, cost });
        }
        samples.sort_by(|a, b| a.cost.total_cmp(&b.cost));
        Ok(samples)
    }

    fn update(&mut self, params: &Params, samples: &[Sample], iter: usize) -> Result<(), Failure> {
        let n = self.mean.len();
        let nf = n as f64;

        let mut y_w = DVector::zeros(n);
        let mut z_w = DVector::zeros(n);
        for (w, sample) in params.weights.iter().zip(samples) {
            y_w.axpy(*w, &sample.y, 1.0);
            z_w.axpy(*w, &sample.z, 1.0);
        }
        self.mean.axpy(self.sigma, &y_w, 1.0);

        let cs = params.cs;
        self.ps *= 1.0 - cs;
        self.ps.axpy((cs * (2.0 - cs) * params.mu_eff).sqrt(), &z_w, 1.0);

        let ps_norm = self.ps.norm();
        let decay = 1.0 - (1.0 - cs).powi(2 * i32::try_from(iter).unwrap_or(i32::MAX));
        let stalled = ps_norm / decay.sqrt() / params.chi_n >= 1.4 + 2.0 / (nf + 1.0);

        let cc = params.cc;
        self.pc *= 1.0 - cc;
        if !stalled {
            self.pc.axpy((cc * (2.0 - cc) * params.mu_eff).sqrt(), &y_w, 1.0);
        }

        let mut cov = &self.cov * (1.0 - params.c1 - params.cmu);
        cov += &self.pc * self.pc.transpose() * params.c1;
        if stalled {
            cov += &self.cov * (params.c1 * cc * (2.0 - cc));
        }
        for (w, sample) in params.weights.iter().zip(samples) {
            cov += &sample.y * sample.y.transpose() * (params.cmu * w);
        }
        self.cov = (&cov + cov.transpose()) * 0.5;

        self.sigma *= ((cs / params.damps) * (ps_norm / params.chi_n - 1.0)).exp();
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(Failure::CovarianceBreakdown { iter });
        }
        Ok(())
    }
}
