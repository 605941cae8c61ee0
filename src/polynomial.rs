//! Polynomial evaluation and differentiation through shared evaluation plans.
//!
//! This module provides the core `Polynomial` type: a compiled [`EvaluationPlan`] paired
//! with a coefficient vector. The plan is looked up in (or added to) a [`PlanCache`] at
//! construction, so polynomials that only differ in their coefficients share one plan and
//! pay the compilation cost once.
//!
//! # Features
//!
//! - Evaluation, gradients and the fused value-and-gradient pass
//! - Parameters: extra inputs that take part in the monomials but not in the gradient,
//!   with their own derivative family
//! - In-place variants writing into caller-owned buffers without allocating
//! - Any coefficient type implementing [`Coefficient`] (`f64`, integers, complex numbers)
//!
//! # Example
//!
//! ```
//! use polyplan::Polynomial;
//!
//! // 1 + x^2 + 3xy^2
//! let f = Polynomial::from_terms(2, 0, vec![
//!     (1.0, vec![0, 0], vec![]),
//!     (1.0, vec![2, 0], vec![]),
//!     (3.0, vec![1, 2], vec![]),
//! ]).unwrap();
//!
//! assert_eq!(f.evaluate(&[2.0, 3.0]).unwrap(), 59.0);
//! assert_eq!(f.gradient(&[2.0, 3.0]).unwrap(), vec![31.0, 36.0]);
//! ```
//!
//! # Term order
//!
//! Coefficients are stored in the canonical term order of the support (lexicographic on
//! the variable exponents, then the parameter exponents). [`Polynomial::coefficients`] and
//! [`Polynomial::exponents`] report that order, and sums are accumulated in it.

use std::any::type_name;
use std::fmt;

use colored::Colorize;
use itertools::Itertools;
use rayon::prelude::*;

use crate::backends::vector::Vector;
use crate::cache::PlanCache;
use crate::errors::{Dimension, PolynomialError};
use crate::plan::EvaluationPlan;
use crate::support::{Signature, Support, Term};
use crate::types::{Coefficient, SharedPlan};

/// A multivariate polynomial prepared for fast repeated evaluation.
///
/// Holds a shared, immutable evaluation plan and its own coefficients. Evaluation only
/// needs `&self`, so a polynomial can be evaluated from many threads at once; scaling the
/// coefficients needs `&mut self`.
#[derive(Clone)]
pub struct Polynomial<T> {
    plan: SharedPlan,
    coefficients: Vec<T>,
    weighted: Vec<T>,
    variables: Vec<String>,
    parameters: Vec<String>,
}

impl<T: Coefficient> fmt::Debug for Polynomial<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        writeln!(f, "    {}: {}", "Signature".cyan(), self.signature())?;
        writeln!(f, "    {}: {}", "Coefficient Type".cyan(), self.coefficient_type())?;
        writeln!(f, "    {}: {}", "Variables".cyan(), self.variable_count())?;
        writeln!(f, "    {}: {}", "Parameters".cyan(), self.parameter_count())?;
        if !self.variables.is_empty() || !self.parameters.is_empty() {
            writeln!(
                f,
                "    {}: [{}] [{}]",
                "Names".cyan(),
                self.variables.iter().join(", "),
                self.parameters.iter().join(", ")
            )?;
        }
        writeln!(f, "    {}: {:?}", "Coefficients".cyan(), self.coefficients)?;
        write!(f, "}}")
    }
}

impl<T: Coefficient> Polynomial<T> {
    /// Creates a polynomial from a support and one coefficient per term, using the
    /// process-wide plan cache.
    ///
    /// `coefficients[i]` belongs to `support.terms()[i]`.
    ///
    /// # Errors
    /// Returns `PolynomialError::DimensionMismatch` if the coefficient count differs from
    /// the term count and `PolynomialError::UnsupportedSupport` if no plan can be built.
    pub fn new(support: &Support, coefficients: Vec<T>) -> Result<Self, PolynomialError> {
        Self::new_in(PlanCache::global(), support, coefficients)
    }

    /// Creates a polynomial using the given plan cache.
    pub fn new_in(
        cache: &PlanCache,
        support: &Support,
        coefficients: Vec<T>,
    ) -> Result<Self, PolynomialError> {
        if coefficients.len() != support.term_count() {
            return Err(PolynomialError::mismatch(
                Dimension::Coefficients,
                support.term_count(),
                coefficients.len(),
            ));
        }

        let plan = cache.get_or_build(support)?;
        let coefficients: Vec<T> = support
            .canonical_order()
            .into_iter()
            .map(|index| coefficients[index])
            .collect();
        let weighted = plan.weigh(&coefficients);

        Ok(Self {
            plan,
            coefficients,
            weighted,
            variables: Vec::new(),
            parameters: Vec::new(),
        })
    }

    /// Creates a polynomial from `(coefficient, variable exponents, parameter exponents)`
    /// triples, using the process-wide plan cache.
    ///
    /// # Errors
    /// Returns `PolynomialError::InvalidSupport` for exponent vectors of the wrong length
    /// or duplicate terms.
    ///
    /// # Example
    /// ```
    /// # use polyplan::Polynomial;
    /// // x^2 + 3xy^2 + a^2 with parameter a
    /// let g = Polynomial::from_terms(2, 1, vec![
    ///     (1, vec![2, 0], vec![0]),
    ///     (3, vec![1, 2], vec![0]),
    ///     (1, vec![0, 0], vec![2]),
    /// ]).unwrap();
    /// assert_eq!(g.evaluate_with(&[2, 3], &[4]).unwrap(), 74);
    /// assert_eq!(g.differentiate_parameters(&[2, 3], &[4]).unwrap(), vec![8]);
    /// ```
    pub fn from_terms<I>(
        nvariables: usize,
        nparameters: usize,
        terms: I,
    ) -> Result<Self, PolynomialError>
    where
        I: IntoIterator<Item = (T, Vec<u32>, Vec<u32>)>,
    {
        Self::from_terms_in(PlanCache::global(), nvariables, nparameters, terms)
    }

    /// Creates a polynomial from coefficient/exponent triples using the given plan cache.
    pub fn from_terms_in<I>(
        cache: &PlanCache,
        nvariables: usize,
        nparameters: usize,
        terms: I,
    ) -> Result<Self, PolynomialError>
    where
        I: IntoIterator<Item = (T, Vec<u32>, Vec<u32>)>,
    {
        let (coefficients, terms): (Vec<T>, Vec<Term>) = terms
            .into_iter()
            .map(|(coefficient, variables, parameters)| {
                (coefficient, Term::new(variables, parameters))
            })
            .unzip();
        let support = Support::new(nvariables, nparameters, terms)?;
        Self::new_in(cache, &support, coefficients)
    }

    /// Attaches variable and parameter identifiers.
    ///
    /// Names play no role in evaluation, they only document the input order.
    ///
    /// # Errors
    /// Returns `PolynomialError::DimensionMismatch` if the name counts differ from the
    /// variable or parameter count.
    pub fn with_names(
        mut self,
        variables: Vec<String>,
        parameters: Vec<String>,
    ) -> Result<Self, PolynomialError> {
        if variables.len() != self.variable_count() {
            return Err(PolynomialError::mismatch(
                Dimension::VariableNames,
                self.variable_count(),
                variables.len(),
            ));
        }
        if parameters.len() != self.parameter_count() {
            return Err(PolynomialError::mismatch(
                Dimension::ParameterNames,
                self.parameter_count(),
                parameters.len(),
            ));
        }
        self.variables = variables;
        self.parameters = parameters;
        Ok(self)
    }

    /// Evaluates the polynomial at `x`.
    ///
    /// # Errors
    /// Returns `PolynomialError::DimensionMismatch` if `x` does not have one entry per
    /// variable, or if the polynomial has parameters (use [`evaluate_with`](Self::evaluate_with)).
    pub fn evaluate<V>(&self, x: &V) -> Result<T, PolynomialError>
    where
        V: Vector<T> + ?Sized,
    {
        self.evaluate_with(x, &[] as &[T])
    }

    /// Evaluates the polynomial at `x` with parameters `p`.
    pub fn evaluate_with<V, P>(&self, x: &V, p: &P) -> Result<T, PolynomialError>
    where
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        let (x, p) = self.validate_inputs(x, p)?;
        Ok(self.plan.evaluate(&self.coefficients, x, p))
    }

    /// Computes the gradient with respect to the variables at `x`.
    pub fn gradient<V>(&self, x: &V) -> Result<Vec<T>, PolynomialError>
    where
        V: Vector<T> + ?Sized,
    {
        self.gradient_with(x, &[] as &[T])
    }

    /// Computes the gradient with respect to the variables at `x` with parameters `p`.
    pub fn gradient_with<V, P>(&self, x: &V, p: &P) -> Result<Vec<T>, PolynomialError>
    where
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        let mut out = vec![T::zero(); self.variable_count()];
        self.gradient_with_into(&mut out, x, p)?;
        Ok(out)
    }

    /// Writes the gradient at `x` into `out`.
    ///
    /// # Errors
    /// Returns `PolynomialError::DimensionMismatch` if `out` or `x` have the wrong length.
    /// Nothing is written on error.
    ///
    /// # Example
    /// ```
    /// # use polyplan::Polynomial;
    /// let f = Polynomial::from_terms(2, 0, vec![(1.0, vec![2, 0], vec![]), (1.0, vec![0, 2], vec![])]).unwrap();
    /// let mut u = [0.0; 2];
    /// f.gradient_into(&mut u, &[1.0, 2.0]).unwrap();
    /// assert_eq!(u, [2.0, 4.0]);
    /// ```
    pub fn gradient_into<W, V>(&self, out: &mut W, x: &V) -> Result<(), PolynomialError>
    where
        W: Vector<T> + ?Sized,
        V: Vector<T> + ?Sized,
    {
        self.gradient_with_into(out, x, &[] as &[T])
    }

    /// Writes the gradient at `x` with parameters `p` into `out`.
    pub fn gradient_with_into<W, V, P>(
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
        let out = Self::validate_output(out, self.variable_count())?;
        self.plan.gradient_into(&self.weighted, x, p, out);
        Ok(())
    }

    /// Evaluates the polynomial and its gradient at `x` in one pass over the terms.
    ///
    /// The results are identical to calling [`evaluate`](Self::evaluate) and
    /// [`gradient`](Self::gradient) separately.
    pub fn evaluate_and_gradient<V>(&self, x: &V) -> Result<(T, Vec<T>), PolynomialError>
    where
        V: Vector<T> + ?Sized,
    {
        self.evaluate_and_gradient_with(x, &[] as &[T])
    }

    /// Evaluates the polynomial and its gradient at `x` with parameters `p`.
    pub fn evaluate_and_gradient_with<V, P>(
        &self,
        x: &V,
        p: &P,
    ) -> Result<(T, Vec<T>), PolynomialError>
    where
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        let mut out = vec![T::zero(); self.variable_count()];
        let value = self.evaluate_and_gradient_with_into(&mut out, x, p)?;
        Ok((value, out))
    }

    /// Writes the gradient at `x` into `out` and returns the value.
    pub fn evaluate_and_gradient_into<W, V>(&self, out: &mut W, x: &V) -> Result<T, PolynomialError>
    where
        W: Vector<T> + ?Sized,
        V: Vector<T> + ?Sized,
    {
        self.evaluate_and_gradient_with_into(out, x, &[] as &[T])
    }

    /// Writes the gradient at `x` with parameters `p` into `out` and returns the value.
    pub fn evaluate_and_gradient_with_into<W, V, P>(
        &self,
        out: &mut W,
        x: &V,
        p: &P,
    ) -> Result<T, PolynomialError>
    where
        W: Vector<T> + ?Sized,
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        let (x, p) = self.validate_inputs(x, p)?;
        let out = Self::validate_output(out, self.variable_count())?;
        Ok(self
            .plan
            .evaluate_and_gradient_into(&self.coefficients, &self.weighted, x, p, out))
    }

    /// Computes the derivatives with respect to the parameters at `x` with parameters `p`.
    ///
    /// A polynomial without parameters returns an empty vector.
    pub fn differentiate_parameters<V, P>(&self, x: &V, p: &P) -> Result<Vec<T>, PolynomialError>
    where
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        let mut out = vec![T::zero(); self.parameter_count()];
        self.differentiate_parameters_into(&mut out, x, p)?;
        Ok(out)
    }

    /// Writes the derivatives with respect to the parameters into `out`.
    ///
    /// For a polynomial without parameters `out` must be empty and nothing is written.
    pub fn differentiate_parameters_into<W, V, P>(
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
        let out = Self::validate_output(out, self.parameter_count())?;
        self.plan
            .differentiate_parameters_into(&self.weighted, x, p, out);
        Ok(())
    }

    /// Computes the derivative with respect to the variable at index `variable`.
    ///
    /// Only that variable's derivative sub-plan is replayed.
    pub fn partial_derivative<V, P>(
        &self,
        variable: usize,
        x: &V,
        p: &P,
    ) -> Result<T, PolynomialError>
    where
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        if variable >= self.variable_count() {
            return Err(PolynomialError::VariableOutOfRange {
                index: variable,
                count: self.variable_count(),
            });
        }
        let (x, p) = self.validate_inputs(x, p)?;
        Ok(self.plan.partial_derivative(variable, &self.weighted, x, p))
    }

    /// Evaluates the polynomial at many points in parallel.
    ///
    /// All points are validated before any evaluation starts.
    pub fn evaluate_batch(&self, points: &[Vec<T>]) -> Result<Vec<T>, PolynomialError> {
        for point in points {
            self.validate_inputs(point, &[] as &[T])?;
        }
        Ok(points
            .par_iter()
            .map(|point| self.plan.evaluate(&self.coefficients, point, &[]))
            .collect())
    }

    /// Multiplies every coefficient by `lambda`. The plan is not touched.
    pub fn scale_coefficients(&mut self, lambda: T) {
        for coefficient in self.coefficients.iter_mut() {
            *coefficient = *coefficient * lambda;
        }
        self.weighted = self.plan.weigh(&self.coefficients);
    }

    /// The coefficients in canonical term order.
    pub fn coefficients(&self) -> &[T] {
        &self.coefficients
    }

    /// The variable exponents as a matrix with one row per variable and one column per
    /// term, in canonical term order.
    pub fn exponents(&self) -> Vec<Vec<u32>> {
        let terms = self.plan.support().terms();
        (0..self.variable_count())
            .map(|row| terms.iter().map(|term| term.variables()[row]).collect())
            .collect()
    }

    /// The parameter exponents as a matrix with one row per parameter and one column per
    /// term.
    pub fn parameter_exponents(&self) -> Vec<Vec<u32>> {
        let terms = self.plan.support().terms();
        (0..self.parameter_count())
            .map(|row| terms.iter().map(|term| term.parameters()[row]).collect())
            .collect()
    }

    pub fn variable_count(&self) -> usize {
        self.plan.variable_count()
    }

    pub fn parameter_count(&self) -> usize {
        self.plan.parameter_count()
    }

    pub fn term_count(&self) -> usize {
        self.plan.term_count()
    }

    /// Name of the coefficient type, e.g. `"f64"`.
    pub fn coefficient_type(&self) -> &'static str {
        type_name::<T>()
    }

    /// Returns the variable names, empty unless attached with [`with_names`](Self::with_names).
    pub fn variable_names(&self) -> &[String] {
        &self.variables
    }

    /// Returns the parameter names.
    pub fn parameter_names(&self) -> &[String] {
        &self.parameters
    }

    pub fn signature(&self) -> &Signature {
        self.plan.signature()
    }

    /// Returns the shared evaluation plan.
    pub fn plan(&self) -> &SharedPlan {
        &self.plan
    }

    /// Returns true if both polynomials replay the same plan instance.
    pub fn shares_plan_with(&self, other: &Polynomial<T>) -> bool {
        std::sync::Arc::ptr_eq(&self.plan, &other.plan)
    }

    pub(crate) fn raw_plan(&self) -> &EvaluationPlan {
        &self.plan
    }

    pub(crate) fn weighted(&self) -> &[T] {
        &self.weighted
    }

    /// Validates the input lengths and returns the inputs as slices.
    pub(crate) fn validate_inputs<'a, V, P>(
        &self,
        x: &'a V,
        p: &'a P,
    ) -> Result<(&'a [T], &'a [T]), PolynomialError>
    where
        V: Vector<T> + ?Sized,
        P: Vector<T> + ?Sized,
    {
        if x.len() != self.variable_count() {
            return Err(PolynomialError::mismatch(
                Dimension::Variables,
                self.variable_count(),
                x.len(),
            ));
        }
        if p.len() != self.parameter_count() {
            return Err(PolynomialError::mismatch(
                Dimension::Parameters,
                self.parameter_count(),
                p.len(),
            ));
        }
        Ok((x.as_slice(), p.as_slice()))
    }

    fn validate_output<W>(out: &mut W, expected: usize) -> Result<&mut [T], PolynomialError>
    where
        W: Vector<T> + ?Sized,
    {
        if out.len() != expected {
            return Err(PolynomialError::mismatch(
                Dimension::Output,
                expected,
                out.len(),
            ));
        }
        Ok(out.as_mut_slice())
    }
}
