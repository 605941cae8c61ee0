//! Property-based tests for plan compilation and replay.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    use crate::cache::PlanCache;
    use crate::polynomial::Polynomial;
    use crate::support::{Support, Term};

    type Terms = Vec<(i64, Vec<u32>)>;

    // Strategy for generating sparse integer polynomials with 1-3 variables, exponents 0-4
    fn sparse_poly() -> impl Strategy<Value = (usize, Terms)> {
        (1usize..=3).prop_flat_map(|nvars| {
            let exps = prop::collection::btree_set(prop::collection::vec(0u32..=4, nvars), 1..=6);
            (Just(nvars), exps).prop_flat_map(|(nvars, exps): (usize, BTreeSet<Vec<u32>>)| {
                let len = exps.len();
                let exps: Vec<Vec<u32>> = exps.into_iter().collect();
                prop::collection::vec(-10i64..=10, len).prop_map(move |coeffs| {
                    (nvars, coeffs.into_iter().zip(exps.clone()).collect::<Terms>())
                })
            })
        })
    }

    // Terms over 1-3 variables followed by 1-2 parameters, exponents 0-3. Each exponent
    // vector holds the variable exponents first, then the parameter exponents.
    fn mixed_poly() -> impl Strategy<Value = (usize, usize, Terms, Vec<i64>)> {
        (1usize..=3, 1usize..=2).prop_flat_map(|(nvars, nparams)| {
            let width = nvars + nparams;
            let exps = prop::collection::btree_set(prop::collection::vec(0u32..=3, width), 1..=8);
            (Just(nvars), Just(nparams), exps, point(width)).prop_flat_map(
                |(nvars, nparams, exps, xp): (usize, usize, BTreeSet<Vec<u32>>, Vec<i64>)| {
                    let len = exps.len();
                    let exps: Vec<Vec<u32>> = exps.into_iter().collect();
                    prop::collection::vec(-10i64..=10, len).prop_map(move |coeffs| {
                        let terms = coeffs.into_iter().zip(exps.clone()).collect::<Terms>();
                        (nvars, nparams, terms, xp.clone())
                    })
                },
            )
        })
    }

    fn poly_and_point() -> impl Strategy<Value = (usize, Terms, Vec<i64>)> {
        sparse_poly().prop_flat_map(|(n, t)| (Just(n), Just(t), point(n)))
    }

    fn point(nvars: usize) -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(-3i64..=3, nvars)
    }

    fn build(cache: &PlanCache, nvars: usize, terms: &Terms) -> Polynomial<i64> {
        Polynomial::from_terms_in(
            cache,
            nvars,
            0,
            terms.iter().map(|(c, e)| (*c, e.clone(), vec![])),
        )
        .unwrap()
    }

    fn build_mixed(
        cache: &PlanCache,
        nvars: usize,
        nparams: usize,
        terms: &Terms,
    ) -> Polynomial<i64> {
        Polynomial::from_terms_in(
            cache,
            nvars,
            nparams,
            terms
                .iter()
                .map(|(c, e)| (*c, e[..nvars].to_vec(), e[nvars..].to_vec())),
        )
        .unwrap()
    }

    fn naive_value(terms: &Terms, x: &[i64]) -> i64 {
        terms
            .iter()
            .map(|(c, e)| c * e.iter().zip(x).map(|(&k, &v)| v.pow(k)).product::<i64>())
            .sum()
    }

    fn naive_partial(terms: &Terms, x: &[i64], variable: usize) -> i64 {
        terms
            .iter()
            .filter(|(_, e)| e[variable] > 0)
            .map(|(c, e)| {
                let monomial: i64 = e
                    .iter()
                    .zip(x)
                    .enumerate()
                    .map(|(i, (&k, &v))| if i == variable { v.pow(k - 1) } else { v.pow(k) })
                    .product();
                c * i64::from(e[variable]) * monomial
            })
            .sum()
    }

    proptest! {
        #[test]
        fn value_matches_naive_sum(
            (nvars, terms, x) in poly_and_point()
        ) {
            let cache = PlanCache::default();
            let f = build(&cache, nvars, &terms);
            prop_assert_eq!(f.evaluate(&x).unwrap(), naive_value(&terms, &x));
        }

        #[test]
        fn gradient_matches_naive_partials(
            (nvars, terms, x) in poly_and_point()
        ) {
            let cache = PlanCache::default();
            let f = build(&cache, nvars, &terms);
            let expected: Vec<i64> = (0..nvars).map(|i| naive_partial(&terms, &x, i)).collect();
            prop_assert_eq!(f.gradient(&x).unwrap(), expected);
        }

        #[test]
        fn fused_matches_separate(
            (nvars, terms, x) in poly_and_point()
        ) {
            let cache = PlanCache::default();
            let f = build(&cache, nvars, &terms);
            let (value, gradient) = f.evaluate_and_gradient(&x).unwrap();
            prop_assert_eq!(value, f.evaluate(&x).unwrap());
            prop_assert_eq!(gradient, f.gradient(&x).unwrap());
        }

        #[test]
        fn signature_ignores_term_order((nvars, terms) in sparse_poly(), seed in any::<u64>()) {
            let ordered: Vec<Term> = terms
                .iter()
                .map(|(_, e)| Term::from_variables(e.clone()))
                .collect();
            // rotate by a seed-dependent amount
            let mut shuffled = ordered.clone();
            let shift = (seed as usize) % shuffled.len();
            shuffled.rotate_left(shift);

            let a = Support::new(nvars, 0, ordered).unwrap();
            let b = Support::new(nvars, 0, shuffled).unwrap();
            prop_assert_eq!(a.signature(), b.signature());
            prop_assert_eq!(a.canonicalize(), b.canonicalize());
        }

        #[test]
        fn scaling_is_linear(
            (nvars, terms, x) in poly_and_point(),
            lambda in -5i64..=5
        ) {
            let cache = PlanCache::default();
            let mut f = build(&cache, nvars, &terms);
            let value = f.evaluate(&x).unwrap();
            let gradient = f.gradient(&x).unwrap();

            f.scale_coefficients(lambda);
            prop_assert_eq!(f.evaluate(&x).unwrap(), lambda * value);
            prop_assert_eq!(
                f.gradient(&x).unwrap(),
                gradient.iter().map(|g| lambda * g).collect::<Vec<_>>()
            );
            prop_assert_eq!(cache.builds(), 1);
        }

        #[test]
        fn parameter_derivatives_match_naive_partials(
            (nvars, nparams, terms, xp) in mixed_poly()
        ) {
            let cache = PlanCache::default();
            let f = build_mixed(&cache, nvars, nparams, &terms);
            let (x, p) = xp.split_at(nvars);
            let expected: Vec<i64> = (0..nparams)
                .map(|j| naive_partial(&terms, &xp, nvars + j))
                .collect();
            prop_assert_eq!(f.differentiate_parameters(x, p).unwrap(), expected);
            prop_assert_eq!(f.evaluate_with(x, p).unwrap(), naive_value(&terms, &xp));
        }

        #[test]
        fn variable_gradient_holds_parameters_fixed(
            (nvars, nparams, terms, xp) in mixed_poly()
        ) {
            let cache = PlanCache::default();
            let f = build_mixed(&cache, nvars, nparams, &terms);
            let (x, p) = xp.split_at(nvars);
            let expected: Vec<i64> = (0..nvars).map(|i| naive_partial(&terms, &xp, i)).collect();
            prop_assert_eq!(f.gradient_with(x, p).unwrap(), expected.clone());

            let (value, gradient) = f.evaluate_and_gradient_with(x, p).unwrap();
            prop_assert_eq!(value, naive_value(&terms, &xp));
            prop_assert_eq!(gradient, expected);
        }
    }
}
