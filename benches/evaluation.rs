//! Polynomial Evaluation Benchmarks
//!
//! This benchmark suite compares replaying cached evaluation plans against a naive
//! term-by-term evaluation that computes every power with `powi`, and measures the
//! one-time cost of building a plan.
//!
//! ## Benchmark Structure
//!
//! ### 1. Evaluation (`benchmark_evaluation`)
//! For polynomials of growing size and degree:
//! - **Naive**: sum of `c * x0^e0 * x1^e1 * ...` with no sharing between terms
//! - **Plan**: `Polynomial::evaluate`
//! - **Gradient**: `Polynomial::gradient`
//! - **Fused**: `Polynomial::evaluate_and_gradient_into` writing into a reused buffer
//!
//! ### 2. Plan Construction (`benchmark_plan_build`)
//! Measures `build_plan` on the same supports. Cache lookups are excluded since each
//! iteration builds directly.
//!
//! ### 3. System Jacobian (`benchmark_system`)
//! Evaluates values and Jacobian of a small square system, as done per Newton step.
//!
//! ## Usage
//!
//! Run with: `cargo bench --bench evaluation`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use polyplan::builder::build_plan;
use polyplan::{PlanCache, Polynomial, PolynomialSystem, Support, Term};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random dense-ish support with `nterms` distinct exponent vectors of max degree `degree`.
fn random_terms(
    rng: &mut StdRng,
    nvars: usize,
    nterms: usize,
    degree: u32,
) -> Vec<(f64, Vec<u32>, Vec<u32>)> {
    let mut seen = std::collections::HashSet::new();
    let mut terms = Vec::with_capacity(nterms);
    while terms.len() < nterms {
        let exps: Vec<u32> = (0..nvars).map(|_| rng.gen_range(0..=degree)).collect();
        if seen.insert(exps.clone()) {
            terms.push((rng.gen_range(-1.0..1.0), exps, vec![]));
        }
    }
    terms
}

fn naive_evaluate(terms: &[(f64, Vec<u32>, Vec<u32>)], x: &[f64]) -> f64 {
    terms
        .iter()
        .map(|(c, e, _)| {
            c * e
                .iter()
                .zip(x)
                .map(|(&k, &v)| v.powi(k as i32))
                .product::<f64>()
        })
        .sum()
}

fn benchmark_evaluation(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let cache = PlanCache::default();

    // (variables, terms, max degree)
    let shapes = [(2, 6, 3), (3, 20, 5), (4, 60, 6), (6, 150, 8)];

    let mut group = c.benchmark_group("Polynomial Evaluation");

    for (nvars, nterms, degree) in shapes {
        let terms = random_terms(&mut rng, nvars, nterms, degree);
        let f = Polynomial::from_terms_in(&cache, nvars, 0, terms.clone())
            .expect("Failed to create polynomial");
        let x: Vec<f64> = (0..nvars).map(|_| rng.gen_range(0.5..1.5)).collect();
        let name = format!("{}v_{}t_d{}", nvars, nterms, degree);

        group.bench_with_input(BenchmarkId::new("Naive", &name), &x, |b, x| {
            b.iter(|| black_box(naive_evaluate(&terms, black_box(x))))
        });

        group.bench_with_input(BenchmarkId::new("Plan", &name), &x, |b, x| {
            b.iter(|| black_box(f.evaluate(black_box(x)).unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("Gradient", &name), &x, |b, x| {
            b.iter(|| black_box(f.gradient(black_box(x)).unwrap()))
        });

        let mut gradient = vec![0.0; nvars];
        group.bench_with_input(BenchmarkId::new("Fused", &name), &x, |b, x| {
            b.iter(|| {
                let value = f
                    .evaluate_and_gradient_into(&mut gradient, black_box(x))
                    .unwrap();
                black_box(value)
            })
        });
    }

    group.finish();
}

fn benchmark_plan_build(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(2);
    let shapes = [(2, 6, 3), (3, 20, 5), (4, 60, 6), (6, 150, 8)];

    let mut group = c.benchmark_group("Plan Construction");

    for (nvars, nterms, degree) in shapes {
        let terms = random_terms(&mut rng, nvars, nterms, degree)
            .into_iter()
            .map(|(_, e, _)| Term::from_variables(e))
            .collect();
        let support = Support::new(nvars, 0, terms).expect("Failed to create support");

        group.bench_with_input(
            BenchmarkId::new("Build", format!("{}v_{}t_d{}", nvars, nterms, degree)),
            &support,
            |b, support| b.iter(|| black_box(build_plan(black_box(support)))),
        );
    }

    group.finish();
}

fn benchmark_system(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let cache = PlanCache::default();
    let nvars = 4;

    let system = PolynomialSystem::new(
        (0..nvars)
            .map(|_| {
                Polynomial::from_terms_in(&cache, nvars, 0, random_terms(&mut rng, nvars, 12, 4))
                    .expect("Failed to create polynomial")
            })
            .collect(),
    )
    .expect("Failed to create system");

    let x = vec![0.9, 1.1, 0.7, 1.3];
    let mut values = vec![0.0; nvars];
    let mut jacobian = vec![vec![0.0; nvars]; nvars];

    let mut group = c.benchmark_group("System");
    group.bench_function("evaluate_and_jacobian_into", |b| {
        b.iter(|| {
            system
                .evaluate_and_jacobian_into(&mut values, &mut jacobian, black_box(&x))
                .unwrap();
            black_box(&jacobian);
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    benchmark_evaluation,
    benchmark_plan_build,
    benchmark_system
);
criterion_main!(benches);
