use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt::Debug;
use std::sync::Arc;

use num_traits::Num;
use rustc_hash::FxHashMap;

use crate::plan::EvaluationPlan;

/// Numeric types a polynomial can carry as coefficients and be evaluated over.
///
/// Anything with ring arithmetic, an additive and a multiplicative identity and cheap
/// copies qualifies: `f64`, `f32`, the signed and unsigned integers, and complex numbers
/// from `num-complex` all implement it through the blanket impl below.
pub trait Coefficient: Num + Copy + Send + Sync + Debug + 'static {}

impl<T> Coefficient for T where T: Num + Copy + Send + Sync + Debug + 'static {}

/// Type alias for a compiled evaluation plan shared between polynomials.
///
/// Plans are immutable once built, so every polynomial with the same support holds a
/// clone of the same `Arc` and replays it against its own coefficients.
pub type SharedPlan = Arc<EvaluationPlan>;

/// Scratch storage for replaying plans: a register file and one output row.
///
/// Buffers only ever grow. Once a thread has replayed a plan of a given size, further
/// replays of that size or smaller do not allocate.
#[derive(Debug, Default)]
pub(crate) struct Workspace<T> {
    registers: Vec<T>,
    row: Vec<T>,
}

impl<T: Coefficient> Workspace<T> {
    pub(crate) fn new() -> Self {
        Self {
            registers: Vec::new(),
            row: Vec::new(),
        }
    }

    /// Returns a register file of `registers` entries and a row of `row` entries.
    ///
    /// Contents are left over from earlier calls; plans write every register before
    /// reading it.
    pub(crate) fn buffers(&mut self, registers: usize, row: usize) -> (&mut [T], &mut [T]) {
        if self.registers.len() < registers {
            self.registers.resize(registers, T::zero());
        }
        if self.row.len() < row {
            self.row.resize(row, T::zero());
        }
        (&mut self.registers[..registers], &mut self.row[..row])
    }
}

thread_local! {
    static WORKSPACES: RefCell<FxHashMap<TypeId, Box<dyn Any>>> =
        RefCell::new(FxHashMap::default());
}

/// Runs `f` with the calling thread's workspace for coefficient type `T`.
///
/// A nested call on the same thread gets a temporary workspace instead of the shared one.
pub(crate) fn with_workspace<T, R, F>(f: F) -> R
where
    T: Coefficient,
    F: FnOnce(&mut Workspace<T>) -> R,
{
    WORKSPACES.with(|workspaces| match workspaces.try_borrow_mut() {
        Ok(mut workspaces) => {
            let workspace = workspaces
                .entry(TypeId::of::<T>())
                .or_insert_with(|| Box::new(Workspace::<T>::new()) as Box<dyn Any>);
            match (**workspace).downcast_mut::<Workspace<T>>() {
                Some(workspace) => f(workspace),
                None => f(&mut Workspace::new()),
            }
        }
        Err(_) => f(&mut Workspace::new()),
    })
}

/// Converts an exponent into the coefficient type.
///
/// Uses double-and-add starting from `T::one()`, so the conversion is exact for every
/// type that can represent the exponent and never goes through a lossy cast.
pub fn exponent_to_scalar<T: Coefficient>(exponent: u32) -> T {
    let mut result = T::zero();
    for bit in (0..u32::BITS - exponent.leading_zeros()).rev() {
        result = result + result;
        if exponent & (1 << bit) != 0 {
            result = result + T::one();
        }
    }
    result
}
