//! Systems of polynomials evaluated together.
//!
//! A [`PolynomialSystem`] is an ordered list of [`Polynomial`]s over the same variables and
//! parameters. It turns the per-member results into vector and matrix results: the values
//! of all members, the Jacobian with one row per member, and the parameter derivatives.
//!
//! Members keep their own plans. Two members with the same support shape still share one
//! plan through the cache, but nothing is shared across members with different shapes.
//!
//! # Example
//!
//! ```
//! use polyplan::{Polynomial, PolynomialSystem};
//!
//! let system = PolynomialSystem::new(vec![
//!     // x^2 + y^2 + 1
//!     Polynomial::from_terms(2, 0, vec![
//!         (1.0, vec![2, 0], vec![]),
//!         (1.0, vec![0, 2], vec![]),
//!         (1.0, vec![0, 0], vec![]),
//!     ]).unwrap(),
//!     // x + y - 5
//!     Polynomial::from_terms(2, 0, vec![
//!         (1.0, vec![1, 0], vec![]),
//!         (1.0, vec![0, 1], vec![]),
//!         (-5.0, vec![0, 0], vec![]),
//!     ]).unwrap(),
//! ]).unwrap();
//!
//! assert_eq!(system.evaluate(&[2.0, 3.0]).unwrap(), vec![14.0, 0.0]);
//! assert_eq!(system.jacobian(&[2.0, 3.0]).unwrap(), vec![vec![4.0, 6.0], vec![1.0, 1.0]]);
//! ```

use std::any::type_name;
use std::fmt;

use colored::Colorize;
use rayon::prelude::*;
use tracing::debug;

use crate::backends::matrix::Matrix;
use crate::backends::vector::Vector;
use crate::errors::{Dimension, PolynomialError};
use crate::polynomial::Polynomial;
use crate::types::{with_workspace, Coefficient};

/// An ordered collection of polynomials sharing variable and parameter counts.
#[derive(Clone)]
pub struct PolynomialSystem<T> {
    polynomials: Vec<Polynomial<T>>,
    nvariables: usize,
    nparameters: usize,
}

impl<T: Coefficient> fmt::Debug for PolynomialSystem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        writeln!(f, "    {}: {}", "Coefficient Type".cyan(), self.coefficient_type())?;
        writeln!(f, "    {}: {}", "Variables".cyan(), self.nvariables)?;
        writeln!(f, "    {}: {}", "Parameters".cyan(), self.nparameters)?;
        writeln!(f, "    {}:", "Polynomials".cyan())?;
        for (i, polynomial) in self.polynomials.iter().enumerate() {
            writeln!(
                f,
                "        [{}] {} terms, plan {}",
                i,
                polynomial.term_count(),
                polynomial.signature()
            )?;
        }
        write!(f, "}}")
    }
}

impl<'a, T> IntoIterator for &'a PolynomialSystem<T> {
    type Item = &'a Polynomial<T>;
    type IntoIter = std::slice::Iter<'a, Polynomial<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.polynomials.iter()
    }
}

impl<T: Coefficient> PolynomialSystem<T> {
    /// Creates a system from its members.
    ///
    /// # Errors
    /// Returns `PolynomialError::EmptySystem` for an empty list and
    /// `PolynomialError::InconsistentDimensions` if a member's variable or parameter count
    /// differs from the first member's.
    pub fn new(polynomials: Vec<Polynomial<T>>) -> Result<Self, PolynomialError> {
        let first = polynomials.first().ok_or(PolynomialError::EmptySystem)?;
        let nvariables = first.variable_count();
        let nparameters = first.parameter_count();

        if let Some((index, member)) = polynomials.iter().enumerate().find(|(_, member)| {
            member.variable_count() != nvariables || member.parameter_count() != nparameters
        }) {
            return Err(PolynomialError::InconsistentDimensions {
                index,
                variables: member.variable_count(),
                parameters: member.parameter_count(),
                expected_variables: nvariables,
                expected_parameters: nparameters,
            });
        }

        debug!(
            members = polynomials.len(),
            variables = nvariables,
            parameters = nparameters,
            "created polynomial system"
        );
        Ok(Self {
            polynomials,
            nvariables,
            nparameters,
        })
    }

    /// Evaluates every member at `x`.
    pub fn evaluate<V>(&self, x: &V) -> Result<Vec<T>, PolynomialError>
    where
        V: Vector<T> + ?Sized,
    {
        self.evaluate_with(x, &[] as &[T])
    }

    /// Evaluates every member at `x` with parameters `p`.
    pub fn evaluate_with<V, P>(&self, x: &V, p: &P) -> Result<Vec<T>, PolynomialError>
    where
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        let mut out = vec![T::zero(); self.npolynomials()];
        self.evaluate_with_into(&mut out, x, p)?;
        Ok(out)
    }

    /// Writes the member values at `x` into `out`, one entry per member.
    ///
    /// # Example
    /// ```
    /// # use polyplan::{Polynomial, PolynomialSystem};
    /// let system = PolynomialSystem::new(vec![
    ///     Polynomial::from_terms(2, 0, vec![(1.0, vec![1, 0], vec![]), (1.0, vec![0, 1], vec![])]).unwrap(),
    ///     Polynomial::from_terms(2, 0, vec![(1.0, vec![1, 1], vec![])]).unwrap(),
    /// ]).unwrap();
    ///
    /// let mut results = [0.0; 2];
    /// system.evaluate_into(&mut results, &[2.0, 3.0]).unwrap();
    /// assert_eq!(results, [5.0, 6.0]);
    /// ```
    pub fn evaluate_into<W, V>(&self, out: &mut W, x: &V) -> Result<(), PolynomialError>
    where
        W: Vector<T> + ?Sized,
        V: Vector<T> + ?Sized,
    {
        self.evaluate_with_into(out, x, &[] as &[T])
    }

    /// Writes the member values at `x` with parameters `p` into `out`.
    pub fn evaluate_with_into<W, V, P>(
        &self,
        out: &mut W,
        x: &V,
        p: &P,
    ) -> Result<(), PolynomialError>
    where
        W: Vector<T> + ?Sized,
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        let (x, p) = self.validate_inputs(x, p)?;
        if out.len() != self.npolynomials() {
            return Err(PolynomialError::mismatch(
                Dimension::Output,
                self.npolynomials(),
                out.len(),
            ));
        }
        let out = out.as_mut_slice();
        with_workspace(|workspace| {
            let (registers, _) = workspace.buffers(self.register_count(), 0);
            for (entry, member) in out.iter_mut().zip(&self.polynomials) {
                let plan = member.raw_plan();
                *entry = plan.evaluate_in(
                    &mut registers[..plan.register_count()],
                    member.coefficients(),
                    x,
                    p,
                );
            }
        });
        Ok(())
    }

    /// Evaluates every member at many points in parallel.
    ///
    /// All points are validated before any evaluation starts. Only usable for systems
    /// without parameters.
    pub fn evaluate_parallel(&self, points: &[Vec<T>]) -> Result<Vec<Vec<T>>, PolynomialError> {
        for point in points {
            self.validate_inputs(point, &[] as &[T])?;
        }

        let chunk_size = (points.len() / (rayon::current_num_threads() * 4)).max(1);
        Ok(points
            .par_chunks(chunk_size)
            .flat_map_iter(|chunk| {
                chunk.iter().map(|point| {
                    self.polynomials
                        .iter()
                        .map(|member| member.raw_plan().evaluate(member.coefficients(), point, &[]))
                        .collect::<Vec<_>>()
                })
            })
            .collect())
    }

    /// Computes the Jacobian at `x`: one row per member, one column per variable.
    pub fn jacobian<V>(&self, x: &V) -> Result<Vec<Vec<T>>, PolynomialError>
    where
        V: Vector<T> + ?Sized,
    {
        self.jacobian_with(x, &[] as &[T])
    }

    /// Computes the Jacobian at `x` with parameters `p`.
    pub fn jacobian_with<V, P>(&self, x: &V, p: &P) -> Result<Vec<Vec<T>>, PolynomialError>
    where
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        let mut out = vec![vec![T::zero(); self.nvariables]; self.npolynomials()];
        self.jacobian_with_into(&mut out, x, p)?;
        Ok(out)
    }

    /// Writes the Jacobian at `x` into `out`.
    ///
    /// # Errors
    /// Returns `PolynomialError::DimensionMismatch` if `out` is not
    /// `npolynomials() x variable_count()` or `x` has the wrong length. Nothing is
    /// written on error.
    pub fn jacobian_into<M, V>(&self, out: &mut M, x: &V) -> Result<(), PolynomialError>
    where
        M: Matrix<T> + ?Sized,
        V: Vector<T> + ?Sized,
    {
        self.jacobian_with_into(out, x, &[] as &[T])
    }

    /// Writes the Jacobian at `x` with parameters `p` into `out`.
    pub fn jacobian_with_into<M, V, P>(
        &self,
        out: &mut M,
        x: &V,
        p: &P,
    ) -> Result<(), PolynomialError>
    where
        M: Matrix<T> + ?Sized,
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        let (x, p) = self.validate_inputs(x, p)?;
        self.validate_matrix(out, self.nvariables)?;

        with_workspace(|workspace| {
            let (registers, row) = workspace.buffers(self.register_count(), self.nvariables);
            for (i, member) in self.polynomials.iter().enumerate() {
                let plan = member.raw_plan();
                plan.gradient_in(
                    &mut registers[..plan.register_count()],
                    member.weighted(),
                    x,
                    p,
                    row,
                );
                for (j, &value) in row.iter().enumerate() {
                    out.set(i, j, value);
                }
            }
        });
        Ok(())
    }

    /// Evaluates the members and the Jacobian at `x` in one pass per member.
    pub fn evaluate_and_jacobian<V>(&self, x: &V) -> Result<(Vec<T>, Vec<Vec<T>>), PolynomialError>
    where
        V: Vector<T> + ?Sized,
    {
        self.evaluate_and_jacobian_with(x, &[] as &[T])
    }

    /// Evaluates the members and the Jacobian at `x` with parameters `p`.
    pub fn evaluate_and_jacobian_with<V, P>(
        &self,
        x: &V,
        p: &P,
    ) -> Result<(Vec<T>, Vec<Vec<T>>), PolynomialError>
    where
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        let mut values = vec![T::zero(); self.npolynomials()];
        let mut jacobian = vec![vec![T::zero(); self.nvariables]; self.npolynomials()];
        self.evaluate_and_jacobian_with_into(&mut values, &mut jacobian, x, p)?;
        Ok((values, jacobian))
    }

    /// Writes the member values into `values` and the Jacobian into `jacobian`.
    pub fn evaluate_and_jacobian_into<W, M, V>(
        &self,
        values: &mut W,
        jacobian: &mut M,
        x: &V,
    ) -> Result<(), PolynomialError>
    where
        W: Vector<T> + ?Sized,
        M: Matrix<T> + ?Sized,
        V: Vector<T> + ?Sized,
    {
        self.evaluate_and_jacobian_with_into(values, jacobian, x, &[] as &[T])
    }

    /// Writes the member values and the Jacobian at `x` with parameters `p`.
    pub fn evaluate_and_jacobian_with_into<W, M, V, P>(
        &self,
        values: &mut W,
        jacobian: &mut M,
        x: &V,
        p: &P,
    ) -> Result<(), PolynomialError>
    where
        W: Vector<T> + ?Sized,
        M: Matrix<T> + ?Sized,
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        let (x, p) = self.validate_inputs(x, p)?;
        if values.len() != self.npolynomials() {
            return Err(PolynomialError::mismatch(
                Dimension::Output,
                self.npolynomials(),
                values.len(),
            ));
        }
        self.validate_matrix(jacobian, self.nvariables)?;

        let values = values.as_mut_slice();
        with_workspace(|workspace| {
            let (registers, row) = workspace.buffers(self.register_count(), self.nvariables);
            for (i, member) in self.polynomials.iter().enumerate() {
                let plan = member.raw_plan();
                values[i] = plan.evaluate_and_gradient_in(
                    &mut registers[..plan.register_count()],
                    member.coefficients(),
                    member.weighted(),
                    x,
                    p,
                    row,
                );
                for (j, &value) in row.iter().enumerate() {
                    jacobian.set(i, j, value);
                }
            }
        });
        Ok(())
    }

    /// Computes the parameter derivatives at `x` with parameters `p`: one row per member,
    /// one column per parameter.
    ///
    /// A system without parameters returns one empty row per member.
    pub fn differentiate_parameters<V, P>(
        &self,
        x: &V,
        p: &P,
    ) -> Result<Vec<Vec<T>>, PolynomialError>
    where
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        let mut out = vec![vec![T::zero(); self.nparameters]; self.npolynomials()];
        self.differentiate_parameters_into(&mut out, x, p)?;
        Ok(out)
    }

    /// Writes the parameter derivatives at `x` with parameters `p` into `out`.
    pub fn differentiate_parameters_into<M, V, P>(
        &self,
        out: &mut M,
        x: &V,
        p: &P,
    ) -> Result<(), PolynomialError>
    where
        M: Matrix<T> + ?Sized,
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        let (x, p) = self.validate_inputs(x, p)?;
        self.validate_matrix(out, self.nparameters)?;

        with_workspace(|workspace| {
            let (registers, row) = workspace.buffers(self.register_count(), self.nparameters);
            for (i, member) in self.polynomials.iter().enumerate() {
                let plan = member.raw_plan();
                plan.differentiate_parameters_in(
                    &mut registers[..plan.register_count()],
                    member.weighted(),
                    x,
                    p,
                    row,
                );
                for (j, &value) in row.iter().enumerate() {
                    out.set(i, j, value);
                }
            }
        });
        Ok(())
    }

    /// Multiplies the coefficients of member `i` by `scales[i]`.
    ///
    /// # Errors
    /// Returns `PolynomialError::DimensionMismatch` if `scales` does not have one entry
    /// per member; no member is scaled in that case.
    pub fn scale_coefficients(&mut self, scales: &[T]) -> Result<(), PolynomialError> {
        if scales.len() != self.npolynomials() {
            return Err(PolynomialError::mismatch(
                Dimension::Scales,
                self.npolynomials(),
                scales.len(),
            ));
        }
        for (member, &lambda) in self.polynomials.iter_mut().zip(scales) {
            member.scale_coefficients(lambda);
        }
        Ok(())
    }

    /// Calls `f` on every member in order.
    pub fn foreach<F>(&self, f: F)
    where
        F: FnMut(&Polynomial<T>),
    {
        self.polynomials.iter().for_each(f);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Polynomial<T>> {
        self.polynomials.iter()
    }

    pub fn polynomials(&self) -> &[Polynomial<T>] {
        &self.polynomials
    }

    /// Mutable access to the members, e.g. to scale a single one.
    ///
    /// The member list itself is fixed; only the members' coefficients can change.
    pub fn polynomials_mut(&mut self) -> &mut [Polynomial<T>] {
        &mut self.polynomials
    }

    /// Returns the number of members.
    pub fn npolynomials(&self) -> usize {
        self.polynomials.len()
    }

    pub fn variable_count(&self) -> usize {
        self.nvariables
    }

    pub fn parameter_count(&self) -> usize {
        self.nparameters
    }

    /// Name of the coefficient type, e.g. `"f64"`.
    pub fn coefficient_type(&self) -> &'static str {
        type_name::<T>()
    }

    fn validate_inputs<'a, V, P>(
        &self,
        x: &'a V,
        p: &'a P,
    ) -> Result<(&'a [T], &'a [T]), PolynomialError>
    where
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        // every member has the system's dimensions
        self.polynomials[0].validate_inputs(x, p)
    }

    /// Largest register file any member needs.
    fn register_count(&self) -> usize {
        self.polynomials
            .iter()
            .map(|member| member.raw_plan().register_count())
            .max()
            .unwrap_or(0)
    }

    fn validate_matrix<M>(&self, out: &M, columns: usize) -> Result<(), PolynomialError>
    where
        M: Matrix<T> + ?Sized,
    {
        let rows = self.npolynomials();
        if out.has_shape(rows, columns) {
            return Ok(());
        }
        let (got_rows, _) = out.dims();
        if got_rows != rows {
            return Err(PolynomialError::mismatch(Dimension::Output, rows, got_rows));
        }
        let got = (0..rows)
            .map(|row| out.row_len(row))
            .find(|&len| len != columns)
            .unwrap_or(columns);
        Err(PolynomialError::mismatch(Dimension::Output, columns, got))
    }
}
