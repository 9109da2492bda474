//! Solve benchmarks across problems and methods.
//!
//! ```bash
//! cargo bench -p gte-solvers --bench solve
//! cargo bench -p gte-solvers --bench solve -- circle
//! ```

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use gte_core::{EquationSet, ResidualSystem};
use gte_solvers::{
    Config, Method, solve_unobserved,
    optimization::{Bfgs, ConjugateGradient, Lbfgs, NelderMead, Newton},
};

fn problems() -> Vec<(&'static str, EquationSet, Vec<f64>)> {
    vec![
        (
            "square-root",
            EquationSet::new().with(|x: &[f64]| x[0] * x[0] - 2.0),
            vec![1.0],
        ),
        (
            "circle-line",
            EquationSet::new()
                .with(|x: &[f64]| x[0] * x[0] + x[1] * x[1] - 4.0)
                .with(|x: &[f64]| x[0] - x[1]),
            vec![1.0, 1.0],
        ),
        (
            "three-unknowns",
            EquationSet::new()
                .with(|x: &[f64]| x[0] + x[1] + x[2] - 6.0)
                .with(|x: &[f64]| x[0] * x[0] + x[1] * x[1] + x[2] * x[2] - 14.0)
                .with(|x: &[f64]| x[0] * x[1] * x[2] - 6.0),
            vec![0.5, 1.5, 2.5],
        ),
        (
            "sine",
            EquationSet::new().with(|x: &[f64]| x[0].sin() - 0.5),
            vec![0.5],
        ),
        (
            "exponential",
            EquationSet::new().with(|x: &[f64]| x[0].exp() - 2.0),
            vec![0.5],
        ),
    ]
}

fn methods() -> [Method; 5] {
    [
        NelderMead::default().into(),
        Lbfgs::default().into(),
        Bfgs.into(),
        ConjugateGradient::default().into(),
        Newton::default().into(),
    ]
}

fn bench_solve(c: &mut Criterion) {
    let config = Config::default();
    let mut group = c.benchmark_group("solve");

    for (name, equations, x0) in problems() {
        let system = ResidualSystem::new(equations).expect("benchmark system is valid");

        for method in methods() {
            group.bench_with_input(BenchmarkId::new(name, method.name()), &x0, |b, x0| {
                b.iter(|| solve_unobserved(black_box(&system), black_box(x0), &method, &config));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_solve);
criterion_main!(benches);
