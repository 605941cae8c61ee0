//! This module compiles a [`Support`] into an [`EvaluationPlan`].
//!
//! The main entry point is [`build_plan()`]. It never sees coefficient values, only the
//! exponents, and proceeds as follows:
//!
//! 1. Power factoring: every `slot^k` with `k >= 2` is produced once by a halving chain
//!    (`x^5 = x^2 * x^3`, `x^3 = x * x^2`, ...) and memoized, so all monomials and
//!    derivative monomials needing that power share the instruction.
//! 2. Monomial assembly: a monomial is the left-to-right product of its non-zero power
//!    factors. Products are memoized per operand pair, so monomials with a common prefix
//!    (`x^2*y` and `x^2*y*z`) share the prefix, and identical monomials are emitted once.
//! 3. Derivative terms: for slot `s` with exponent `k >= 1` the term contributes
//!    `k * c * monomial(exponents with s decremented)`. The factor `k` is folded into a
//!    [`Weight`] so polynomials can pre-multiply it into their coefficients.
//! 4. Routines: [`schedule`] cuts the shared program down to what each output needs.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::errors::PlanError;
use crate::opt::schedule;
use crate::plan::{
    Contribution, DerivativeContribution, DerivativePlan, EvaluationPlan, FusedPlan, FusedTerm,
    Op, OpKind, Operand, ValuePlan, Weight,
};
use crate::support::Support;

/// Builds the evaluation plan of a support.
///
/// Terms are processed in canonical order (see [`Support::canonical_order`]), so supports
/// with equal signatures produce equal plans.
///
/// # Errors
/// Returns `PlanError::EmptySupport` for a support without terms and
/// `PlanError::InconsistentTerm` if a term's exponent count disagrees with the declared
/// variable and parameter counts.
///
/// # Example
/// ```
/// # use polyplan::builder::build_plan;
/// # use polyplan::support::{Support, Term};
/// let support = Support::new(2, 0, vec![
///     Term::from_variables(vec![0, 0]),
///     Term::from_variables(vec![2, 0]),
///     Term::from_variables(vec![1, 2]),
/// ]).unwrap();
/// let plan = build_plan(&support).unwrap();
///
/// // coefficients follow the canonical order: 1, x*y^2, x^2
/// let value = plan.evaluate(&[1.0, 3.0, 1.0], &[2.0, 3.0], &[]);
/// assert_eq!(value, 59.0);
/// ```
pub fn build_plan(support: &Support) -> Result<EvaluationPlan, PlanError> {
    if support.term_count() == 0 {
        return Err(PlanError::EmptySupport);
    }

    let slots = support.slot_count();
    let canonical = support.canonicalize();
    let exponents: Vec<Vec<u32>> = canonical
        .terms()
        .iter()
        .map(|term| term.slots().collect())
        .collect();
    for (term, exps) in exponents.iter().enumerate() {
        if exps.len() != slots {
            return Err(PlanError::InconsistentTerm {
                term,
                expected: slots,
                got: exps.len(),
            });
        }
    }

    let nvariables = support.variable_count();
    let nparameters = support.parameter_count();
    let mut program = ProgramBuilder::new(slots);

    // Value monomials first so their products get the lowest registers.
    let value_contributions: Vec<Contribution> = exponents
        .iter()
        .enumerate()
        .map(|(coefficient, exps)| Contribution {
            coefficient,
            monomial: program.monomial(exps),
        })
        .collect();

    let gradient_contributions: Vec<Vec<DerivativeContribution>> = (0..nvariables)
        .map(|slot| program.derivatives(&exponents, slot))
        .collect();
    let parameter_contributions: Vec<Vec<DerivativeContribution>> = (nvariables..slots)
        .map(|slot| program.derivatives(&exponents, slot))
        .collect();

    // Memoization makes these lookups return the contributions created above.
    let fused_terms: Vec<FusedTerm> = exponents
        .iter()
        .enumerate()
        .map(|(coefficient, exps)| FusedTerm {
            value: value_contributions[coefficient],
            partials: (0..nvariables)
                .filter_map(|slot| {
                    program
                        .derivative(coefficient, exps, slot)
                        .map(|partial| (slot, partial))
                })
                .collect(),
        })
        .collect();

    let ProgramBuilder { ops, weights, .. } = program;

    let value_roots = || value_contributions.iter().map(|c| c.monomial);
    let derivative_plans = |families: Vec<Vec<DerivativeContribution>>| -> Vec<DerivativePlan> {
        families
            .into_iter()
            .map(|contributions| DerivativePlan {
                routine: schedule(&ops, slots, contributions.iter().map(|c| c.monomial)),
                contributions,
            })
            .collect()
    };

    let gradient_routine = schedule(
        &ops,
        slots,
        gradient_contributions.iter().flatten().map(|c| c.monomial),
    );
    let parameter_routine = schedule(
        &ops,
        slots,
        parameter_contributions.iter().flatten().map(|c| c.monomial),
    );
    let fused_routine = schedule(
        &ops,
        slots,
        value_roots().chain(gradient_contributions.iter().flatten().map(|c| c.monomial)),
    );
    let value = ValuePlan {
        routine: schedule(&ops, slots, value_roots()),
        contributions: value_contributions.clone(),
    };

    let plan = EvaluationPlan {
        signature: support.signature(),
        gradient: derivative_plans(gradient_contributions),
        parameter_gradient: derivative_plans(parameter_contributions),
        support: canonical,
        ops,
        weights,
        value,
        gradient_routine,
        parameter_routine,
        fused: FusedPlan {
            routine: fused_routine,
            terms: fused_terms,
        },
    };

    trace!(
        signature = %plan.signature(),
        terms = plan.term_count(),
        ops = plan.ops().len(),
        variables = nvariables,
        parameters = nparameters,
        "compiled evaluation plan"
    );

    Ok(plan)
}

/// Accumulates the shared register program while memoizing powers, products, monomials
/// and weights.
struct ProgramBuilder {
    slots: usize,
    ops: Vec<Op>,
    powers: FxHashMap<(usize, u32), usize>,
    products: FxHashMap<(usize, usize), usize>,
    monomials: FxHashMap<Vec<u32>, Operand>,
    weights: Vec<Weight>,
    weight_index: FxHashMap<Weight, usize>,
}

impl ProgramBuilder {
    fn new(slots: usize) -> Self {
        Self {
            slots,
            ops: Vec::new(),
            powers: FxHashMap::default(),
            products: FxHashMap::default(),
            monomials: FxHashMap::default(),
            weights: Vec::new(),
            weight_index: FxHashMap::default(),
        }
    }

    fn push(&mut self, op: Op) -> usize {
        self.ops.push(op);
        self.slots + self.ops.len() - 1
    }

    /// Register holding `slot^exponent`, `exponent >= 1`.
    fn power(&mut self, slot: usize, exponent: u32) -> usize {
        if exponent == 1 {
            return slot;
        }
        if let Some(&register) = self.powers.get(&(slot, exponent)) {
            return register;
        }
        let half = exponent / 2;
        let lhs = self.power(slot, half);
        let rhs = self.power(slot, exponent - half);
        let register = self.push(Op {
            kind: OpKind::Power { slot, exponent },
            lhs,
            rhs,
        });
        self.powers.insert((slot, exponent), register);
        register
    }

    fn product(&mut self, lhs: usize, rhs: usize) -> usize {
        let key = (lhs.min(rhs), lhs.max(rhs));
        if let Some(&register) = self.products.get(&key) {
            return register;
        }
        let register = self.push(Op {
            kind: OpKind::Product,
            lhs: key.0,
            rhs: key.1,
        });
        self.products.insert(key, register);
        register
    }

    fn monomial(&mut self, exponents: &[u32]) -> Operand {
        if let Some(&operand) = self.monomials.get(exponents) {
            return operand;
        }
        let mut accumulated: Option<usize> = None;
        for (slot, &exponent) in exponents.iter().enumerate() {
            if exponent == 0 {
                continue;
            }
            let factor = self.power(slot, exponent);
            accumulated = Some(match accumulated {
                None => factor,
                Some(partial) => self.product(partial, factor),
            });
        }
        let operand = accumulated.map_or(Operand::One, Operand::Register);
        self.monomials.insert(exponents.to_vec(), operand);
        operand
    }

    fn weight(&mut self, coefficient: usize, factor: u32) -> usize {
        let weight = Weight {
            coefficient,
            factor,
        };
        if let Some(&index) = self.weight_index.get(&weight) {
            return index;
        }
        self.weights.push(weight);
        self.weight_index.insert(weight, self.weights.len() - 1);
        self.weights.len() - 1
    }

    /// Derivative contribution of term `coefficient` with respect to `slot`, `None` if the
    /// term does not depend on it.
    fn derivative(
        &mut self,
        coefficient: usize,
        exponents: &[u32],
        slot: usize,
    ) -> Option<DerivativeContribution> {
        let exponent = exponents[slot];
        if exponent == 0 {
            return None;
        }
        let mut lowered = exponents.to_vec();
        lowered[slot] -= 1;
        Some(DerivativeContribution {
            monomial: self.monomial(&lowered),
            weight: self.weight(coefficient, exponent),
        })
    }

    fn derivatives(&mut self, exponents: &[Vec<u32>], slot: usize) -> Vec<DerivativeContribution> {
        exponents
            .iter()
            .enumerate()
            .filter_map(|(coefficient, exps)| self.derivative(coefficient, exps, slot))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::support::Term;

    // 1 + x^2 + 3xy^2, canonical coefficients [1, 3, 1] for [1, xy^2, x^2]
    fn scenario() -> (EvaluationPlan, Vec<f64>) {
        let support = Support::new(
            2,
            0,
            vec![
                Term::from_variables(vec![0, 0]),
                Term::from_variables(vec![2, 0]),
                Term::from_variables(vec![1, 2]),
            ],
        )
        .unwrap();
        (build_plan(&support).unwrap(), vec![1.0, 3.0, 1.0])
    }

    #[test]
    fn test_value_and_gradient() {
        let (plan, coefficients) = scenario();
        let weighted = plan.weigh(&coefficients);
        assert_eq!(plan.evaluate(&coefficients, &[2.0, 3.0], &[]), 59.0);

        let mut gradient = [0.0; 2];
        plan.gradient_into(&weighted, &[2.0, 3.0], &[], &mut gradient);
        assert_eq!(gradient, [31.0, 36.0]);

        assert_eq!(plan.partial_derivative(0, &weighted, &[2.0, 3.0], &[]), 31.0);
        assert_eq!(plan.partial_derivative(1, &weighted, &[2.0, 3.0], &[]), 36.0);
    }

    #[test]
    fn test_integer_coefficients() {
        let (plan, _) = scenario();
        let coefficients = [1i64, 3, 1];
        let weighted = plan.weigh(&coefficients);
        assert_eq!(plan.evaluate(&coefficients, &[2, 3], &[]), 59);
        let mut gradient = [0i64; 2];
        let value = plan.evaluate_and_gradient_into(
            &coefficients,
            &weighted,
            &[2, 3],
            &[],
            &mut gradient,
        );
        assert_eq!(value, 59);
        assert_eq!(gradient, [31, 36]);
    }

    #[test]
    fn test_constant_term_needs_no_register() {
        let (plan, _) = scenario();
        assert_eq!(plan.value_plan().contributions[0].monomial, Operand::One);
        // d/dx x^2 = 2x reads the input register directly
        let dx = plan.gradient_plan(0).unwrap();
        assert!(dx
            .contributions
            .iter()
            .any(|c| c.monomial == Operand::Register(0)));
    }

    #[test]
    fn test_powers_are_shared_between_terms() {
        // x^2*y + x^2*z: one x^2 instruction
        let support = Support::new(
            3,
            0,
            vec![
                Term::from_variables(vec![2, 1, 0]),
                Term::from_variables(vec![2, 0, 1]),
            ],
        )
        .unwrap();
        let plan = build_plan(&support).unwrap();
        let squares = plan
            .ops()
            .iter()
            .filter(|op| op.kind == OpKind::Power { slot: 0, exponent: 2 })
            .count();
        assert_eq!(squares, 1);
        assert_eq!(plan.stats().value_steps, 3);
    }

    #[test]
    fn test_power_chain_reuse() {
        // x^5: value needs x^2, x^3, x^5; the derivative adds x^4 = x^2 * x^2
        let support = Support::new(1, 0, vec![Term::from_variables(vec![5])]).unwrap();
        let plan = build_plan(&support).unwrap();
        let stats = plan.stats();
        assert_eq!(stats.power_steps, 4);
        assert_eq!(stats.product_steps, 0);
        assert_eq!(stats.value_steps, 3);
        assert_eq!(stats.gradient_steps, 2);
        assert_eq!(stats.fused_steps, 4);

        let coefficients = [2.0];
        let weighted = plan.weigh(&coefficients);
        assert_eq!(plan.weights()[0].factor, 5);
        assert_eq!(plan.evaluate(&coefficients, &[3.0], &[]), 486.0);
        assert_eq!(plan.partial_derivative(0, &weighted, &[3.0], &[]), 810.0);
    }

    #[test]
    fn test_common_prefix_products_are_shared() {
        // x*y and x*y*z share the x*y product
        let support = Support::new(
            3,
            0,
            vec![
                Term::from_variables(vec![1, 1, 0]),
                Term::from_variables(vec![1, 1, 1]),
            ],
        )
        .unwrap();
        let plan = build_plan(&support).unwrap();
        assert_eq!(plan.stats().value_steps, 2);
    }

    #[test]
    fn test_terms_without_variable_drop_out_of_its_derivative() {
        let (plan, _) = scenario();
        // only x y^2 depends on y
        assert_eq!(plan.gradient_plan(1).unwrap().contributions.len(), 1);
        assert_eq!(plan.gradient_plan(0).unwrap().contributions.len(), 2);
    }

    #[test]
    fn test_parameter_derivatives() {
        // x^2 + 3xy^2 + a^2
        let support = Support::new(
            2,
            1,
            vec![
                Term::new(vec![2, 0], vec![0]),
                Term::new(vec![1, 2], vec![0]),
                Term::new(vec![0, 0], vec![2]),
            ],
        )
        .unwrap();
        let plan = build_plan(&support).unwrap();
        // canonical: a^2, xy^2, x^2
        let coefficients = [1.0, 3.0, 1.0];
        let weighted = plan.weigh(&coefficients);
        assert_eq!(plan.evaluate(&coefficients, &[2.0, 3.0], &[4.0]), 74.0);

        let mut gradient = [0.0; 2];
        plan.gradient_into(&weighted, &[2.0, 3.0], &[4.0], &mut gradient);
        assert_eq!(gradient, [31.0, 36.0]);

        let mut dp = [0.0; 1];
        plan.differentiate_parameters_into(&weighted, &[2.0, 3.0], &[4.0], &mut dp);
        assert_eq!(dp, [8.0]);
        // parameters never show up in the fused gradient
        assert!(plan
            .fused_plan()
            .terms
            .iter()
            .all(|t| t.partials.iter().all(|(v, _)| *v < 2)));
    }

    #[test]
    fn test_equal_signatures_build_equal_plans() {
        let terms = vec![
            Term::from_variables(vec![3, 1]),
            Term::from_variables(vec![0, 2]),
            Term::from_variables(vec![1, 0]),
        ];
        let mut shuffled = terms.clone();
        shuffled.rotate_left(1);
        let a = build_plan(&Support::new(2, 0, terms).unwrap()).unwrap();
        let b = build_plan(&Support::new(2, 0, shuffled).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_support() {
        let support = Support::new(2, 0, vec![]).unwrap();
        assert_eq!(build_plan(&support).unwrap_err(), PlanError::EmptySupport);
    }
}
