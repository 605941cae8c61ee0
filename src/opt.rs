//! Liveness pass over the register program.
//!
//! The builder emits one shared program for every output of a plan. Each output family
//! only needs part of it: plain evaluation never needs the `x^(k-1)` chains that exist for
//! the gradient, a single partial derivative needs none of the other partials' products.
//! [`schedule`] walks the program backwards from a set of root operands and keeps exactly
//! the instructions they depend on.
//!
//! The pass is pure: it never reorders or rewrites instructions, it only drops dead ones.
//! Kept instructions therefore compute the same register values in every routine.

use crate::plan::{Op, Operand, Routine, Step};

/// Extracts the routine computing `roots` from the program `ops`.
///
/// `slots` is the number of input registers preceding the instruction registers.
pub fn schedule<I>(ops: &[Op], slots: usize, roots: I) -> Routine
where
    I: IntoIterator<Item = Operand>,
{
    let mut live = vec![false; ops.len()];
    let mut pending: Vec<usize> = roots
        .into_iter()
        .filter_map(|operand| match operand {
            Operand::Register(index) if index >= slots => Some(index - slots),
            _ => None,
        })
        .collect();

    while let Some(op_index) = pending.pop() {
        if live[op_index] {
            continue;
        }
        live[op_index] = true;
        let op = &ops[op_index];
        for register in [op.lhs, op.rhs] {
            if register >= slots && !live[register - slots] {
                pending.push(register - slots);
            }
        }
    }

    let steps = ops
        .iter()
        .enumerate()
        .filter(|(index, _)| live[*index])
        .map(|(index, op)| Step {
            dest: slots + index,
            lhs: op.lhs,
            rhs: op.rhs,
        })
        .collect();

    Routine { steps }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::OpKind;

    // Two slots (x = r0, y = r1):
    //   r2 = x^2, r3 = x^2 * y, r4 = y^2, r5 = x^3
    fn program() -> Vec<Op> {
        vec![
            Op {
                kind: OpKind::Power { slot: 0, exponent: 2 },
                lhs: 0,
                rhs: 0,
            },
            Op {
                kind: OpKind::Product,
                lhs: 2,
                rhs: 1,
            },
            Op {
                kind: OpKind::Power { slot: 1, exponent: 2 },
                lhs: 1,
                rhs: 1,
            },
            Op {
                kind: OpKind::Power { slot: 0, exponent: 3 },
                lhs: 0,
                rhs: 2,
            },
        ]
    }

    #[test]
    fn test_keeps_transitive_dependencies_in_order() {
        let routine = schedule(&program(), 2, [Operand::Register(3)]);
        assert_eq!(
            routine.steps,
            vec![
                Step { dest: 2, lhs: 0, rhs: 0 },
                Step { dest: 3, lhs: 2, rhs: 1 },
            ]
        );
    }

    #[test]
    fn test_drops_unused_instructions() {
        let routine = schedule(&program(), 2, [Operand::Register(4)]);
        assert_eq!(routine.steps, vec![Step { dest: 4, lhs: 1, rhs: 1 }]);
    }

    #[test]
    fn test_inputs_and_constants_need_nothing() {
        let routine = schedule(&program(), 2, [Operand::One, Operand::Register(1)]);
        assert!(routine.is_empty());
    }

    #[test]
    fn test_shared_roots_are_scheduled_once() {
        let routine = schedule(
            &program(),
            2,
            [Operand::Register(3), Operand::Register(5), Operand::Register(3)],
        );
        let dests: Vec<usize> = routine.steps.iter().map(|s| s.dest).collect();
        assert_eq!(dests, vec![2, 3, 5]);
    }
}
