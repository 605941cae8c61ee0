//! Evaluation plans and their replay.
//!
//! An [`EvaluationPlan`] is the compiled form of a [`Support`]. It never stores coefficient
//! values. Instead it holds:
//!
//! - A register program: a straight-line list of multiplications over a register file whose
//!   first slots are loaded with the variables followed by the parameters. The program
//!   contains the shared power chains (`x^2`, `x^3`, ...) and the monomial products, each
//!   computed once no matter how many terms or derivative terms use it.
//! - Routines: for every output family (value, each gradient component, each parameter
//!   derivative, the full gradient and the fused value-and-gradient pass) the subset of
//!   the program that output actually needs, in program order.
//! - Contributions: which coefficient (or pre-weighted derivative coefficient) multiplies
//!   which register, in canonical term order.
//!
//! Because every output reads registers produced by the same program instruction, the
//! fused pass produces bit-for-bit the same numbers as the separate passes.

use crate::support::{Signature, Support};
use crate::types::{exponent_to_scalar, with_workspace, Coefficient};

/// A monomial operand: either the constant monomial or a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    One,
    Register(usize),
}

/// What a program instruction computes. Used for inspection only; every instruction
/// multiplies two registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// `slot^exponent` assembled from two smaller powers of the same slot
    Power { slot: usize, exponent: u32 },
    /// Partial or complete monomial product
    Product,
}

/// One instruction of the register program. Instruction `i` writes register
/// `slot_count + i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Op {
    pub kind: OpKind,
    pub lhs: usize,
    pub rhs: usize,
}

/// A scheduled instruction: `registers[dest] = registers[lhs] * registers[rhs]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub dest: usize,
    pub lhs: usize,
    pub rhs: usize,
}

/// An ordered subset of the register program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routine {
    pub steps: Vec<Step>,
}

impl Routine {
    #[inline]
    fn run<T: Coefficient>(&self, registers: &mut [T]) {
        for step in &self.steps {
            registers[step.dest] = registers[step.lhs] * registers[step.rhs];
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// `coefficient * monomial` in the value sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contribution {
    pub coefficient: usize,
    pub monomial: Operand,
}

/// A coefficient multiplied by the exponent that differentiation brings down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Weight {
    pub coefficient: usize,
    pub factor: u32,
}

/// `weighted[weight] * monomial` in a derivative sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivativeContribution {
    pub weight: usize,
    pub monomial: Operand,
}

/// Value sub-plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuePlan {
    pub routine: Routine,
    pub contributions: Vec<Contribution>,
}

/// Sub-plan of the derivative with respect to a single variable or parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativePlan {
    pub routine: Routine,
    pub contributions: Vec<DerivativeContribution>,
}

/// One term of the fused pass together with every gradient entry it feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusedTerm {
    pub value: Contribution,
    /// `(variable, contribution)` pairs in increasing variable order
    pub partials: Vec<(usize, DerivativeContribution)>,
}

/// Single traversal computing the value and the full gradient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusedPlan {
    pub routine: Routine,
    pub terms: Vec<FusedTerm>,
}

/// Operation counts of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanStats {
    pub terms: usize,
    pub power_steps: usize,
    pub product_steps: usize,
    pub value_steps: usize,
    pub gradient_steps: usize,
    pub fused_steps: usize,
}

/// The compiled, coefficient-free evaluation procedure of a support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationPlan {
    pub(crate) signature: Signature,
    pub(crate) support: Support,
    pub(crate) ops: Vec<Op>,
    pub(crate) weights: Vec<Weight>,
    pub(crate) value: ValuePlan,
    pub(crate) gradient: Vec<DerivativePlan>,
    pub(crate) parameter_gradient: Vec<DerivativePlan>,
    pub(crate) gradient_routine: Routine,
    pub(crate) parameter_routine: Routine,
    pub(crate) fused: FusedPlan,
}

#[inline]
fn scaled<T: Coefficient>(scale: T, monomial: Operand, registers: &[T]) -> T {
    match monomial {
        Operand::One => scale,
        Operand::Register(index) => scale * registers[index],
    }
}

impl EvaluationPlan {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The support this plan was built from, in canonical term order.
    pub fn support(&self) -> &Support {
        &self.support
    }

    pub fn variable_count(&self) -> usize {
        self.support.variable_count()
    }

    pub fn parameter_count(&self) -> usize {
        self.support.parameter_count()
    }

    pub fn term_count(&self) -> usize {
        self.support.term_count()
    }

    /// Size of the register file: one register per slot plus one per instruction.
    pub fn register_count(&self) -> usize {
        self.support.slot_count() + self.ops.len()
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn weights(&self) -> &[Weight] {
        &self.weights
    }

    pub fn value_plan(&self) -> &ValuePlan {
        &self.value
    }

    /// Derivative sub-plan of variable `index`.
    pub fn gradient_plan(&self, index: usize) -> Option<&DerivativePlan> {
        self.gradient.get(index)
    }

    /// Derivative sub-plan of parameter `index`.
    pub fn parameter_plan(&self, index: usize) -> Option<&DerivativePlan> {
        self.parameter_gradient.get(index)
    }

    pub fn fused_plan(&self) -> &FusedPlan {
        &self.fused
    }

    pub fn stats(&self) -> PlanStats {
        let power_steps = self
            .ops
            .iter()
            .filter(|op| matches!(op.kind, OpKind::Power { .. }))
            .count();
        PlanStats {
            terms: self.term_count(),
            power_steps,
            product_steps: self.ops.len() - power_steps,
            value_steps: self.value.routine.len(),
            gradient_steps: self.gradient_routine.len(),
            fused_steps: self.fused.routine.len(),
        }
    }

    /// Computes the pre-weighted derivative coefficients `c * k` for every [`Weight`].
    ///
    /// The result is what the derivative entry points expect as `weighted`. It only has to
    /// be recomputed when the coefficients change.
    pub fn weigh<T: Coefficient>(&self, coefficients: &[T]) -> Vec<T> {
        self.weights
            .iter()
            .map(|weight| {
                let coefficient = coefficients[weight.coefficient];
                if weight.factor == 1 {
                    coefficient
                } else {
                    coefficient * exponent_to_scalar::<T>(weight.factor)
                }
            })
            .collect()
    }

    /// Copies the inputs into the first slots of `registers`.
    fn load<T: Coefficient>(&self, registers: &mut [T], x: &[T], p: &[T]) {
        debug_assert_eq!(x.len(), self.variable_count());
        debug_assert_eq!(p.len(), self.parameter_count());
        debug_assert_eq!(registers.len(), self.register_count());
        registers[..x.len()].copy_from_slice(x);
        registers[x.len()..x.len() + p.len()].copy_from_slice(p);
    }

    fn accumulate<T: Coefficient>(
        contributions: &[DerivativeContribution],
        weighted: &[T],
        registers: &[T],
    ) -> T {
        contributions.iter().fold(T::zero(), |acc, c| {
            acc + scaled(weighted[c.weight], c.monomial, registers)
        })
    }

    /// Evaluates `sum_i coefficients[i] * monomial_i(x, p)` in canonical term order.
    ///
    /// Lengths are validated by the callers; this is the unchecked replay. Registers come
    /// from a per-thread workspace, so repeated calls do not allocate.
    pub fn evaluate<T: Coefficient>(&self, coefficients: &[T], x: &[T], p: &[T]) -> T {
        with_workspace(|workspace| {
            let (registers, _) = workspace.buffers(self.register_count(), 0);
            self.evaluate_in(registers, coefficients, x, p)
        })
    }

    /// Evaluates the derivative with respect to variable `variable`.
    pub fn partial_derivative<T: Coefficient>(
        &self,
        variable: usize,
        weighted: &[T],
        x: &[T],
        p: &[T],
    ) -> T {
        let plan = &self.gradient[variable];
        with_workspace(|workspace| {
            let (registers, _) = workspace.buffers(self.register_count(), 0);
            self.load(registers, x, p);
            plan.routine.run(registers);
            Self::accumulate(&plan.contributions, weighted, registers)
        })
    }

    /// Writes the gradient with respect to the variables into `out`.
    pub fn gradient_into<T: Coefficient>(&self, weighted: &[T], x: &[T], p: &[T], out: &mut [T]) {
        with_workspace(|workspace| {
            let (registers, _) = workspace.buffers(self.register_count(), 0);
            self.gradient_in(registers, weighted, x, p, out);
        })
    }

    /// Writes the derivatives with respect to the parameters into `out`.
    pub fn differentiate_parameters_into<T: Coefficient>(
        &self,
        weighted: &[T],
        x: &[T],
        p: &[T],
        out: &mut [T],
    ) {
        with_workspace(|workspace| {
            let (registers, _) = workspace.buffers(self.register_count(), 0);
            self.differentiate_parameters_in(registers, weighted, x, p, out);
        })
    }

    /// Computes the value and writes the gradient into `out` in a single pass over the terms.
    ///
    /// Each term's monomial registers are read once for the value and for every gradient
    /// entry the term feeds. Sums are formed in canonical term order, matching
    /// [`evaluate`](Self::evaluate) and [`gradient_into`](Self::gradient_into) exactly.
    pub fn evaluate_and_gradient_into<T: Coefficient>(
        &self,
        coefficients: &[T],
        weighted: &[T],
        x: &[T],
        p: &[T],
        out: &mut [T],
    ) -> T {
        with_workspace(|workspace| {
            let (registers, _) = workspace.buffers(self.register_count(), 0);
            self.evaluate_and_gradient_in(registers, coefficients, weighted, x, p, out)
        })
    }

    // The `*_in` forms run on a caller-provided register file of `register_count()`
    // entries. Systems use them to share one workspace borrow across all members.

    pub(crate) fn evaluate_in<T: Coefficient>(
        &self,
        registers: &mut [T],
        coefficients: &[T],
        x: &[T],
        p: &[T],
    ) -> T {
        self.load(registers, x, p);
        self.value.routine.run(registers);
        self.value.contributions.iter().fold(T::zero(), |acc, c| {
            acc + scaled(coefficients[c.coefficient], c.monomial, registers)
        })
    }

    pub(crate) fn gradient_in<T: Coefficient>(
        &self,
        registers: &mut [T],
        weighted: &[T],
        x: &[T],
        p: &[T],
        out: &mut [T],
    ) {
        self.load(registers, x, p);
        self.gradient_routine.run(registers);
        for (entry, plan) in out.iter_mut().zip(&self.gradient) {
            *entry = Self::accumulate(&plan.contributions, weighted, registers);
        }
    }

    pub(crate) fn differentiate_parameters_in<T: Coefficient>(
        &self,
        registers: &mut [T],
        weighted: &[T],
        x: &[T],
        p: &[T],
        out: &mut [T],
    ) {
        self.load(registers, x, p);
        self.parameter_routine.run(registers);
        for (entry, plan) in out.iter_mut().zip(&self.parameter_gradient) {
            *entry = Self::accumulate(&plan.contributions, weighted, registers);
        }
    }

    pub(crate) fn evaluate_and_gradient_in<T: Coefficient>(
        &self,
        registers: &mut [T],
        coefficients: &[T],
        weighted: &[T],
        x: &[T],
        p: &[T],
        out: &mut [T],
    ) -> T {
        self.load(registers, x, p);
        self.fused.routine.run(registers);

        out.fill(T::zero());
        let mut value = T::zero();
        for term in &self.fused.terms {
            value = value
                + scaled(
                    coefficients[term.value.coefficient],
                    term.value.monomial,
                    registers,
                );
            for &(variable, partial) in &term.partials {
                out[variable] =
                    out[variable] + scaled(weighted[partial.weight], partial.monomial, registers);
            }
        }
        value
    }
}
