//! Error types for the polyplan crate.
//!
//! This module defines the various error types that can occur while describing a
//! polynomial's support, compiling it into an evaluation plan, and evaluating it.
//! The main error types are:
//!
//! - `SupportError`: Malformed exponent data handed over by the caller (invalid support)
//! - `PlanError`: Supports the plan builder refuses to compile (unsupported support)
//! - `PolynomialError`: High-level errors when working with polynomials and systems
//!
//! Each error type implements the standard Error trait and provides detailed error messages.

use std::fmt;

use thiserror::Error;

/// Which exponent vector of a term was malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExponentKind {
    Variable,
    Parameter,
}

impl fmt::Display for ExponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExponentKind::Variable => write!(f, "variable"),
            ExponentKind::Parameter => write!(f, "parameter"),
        }
    }
}

/// Errors that can occur while constructing a [`Support`](crate::support::Support).
///
/// The caller (usually a polynomial algebra library) is responsible for handing over
/// normalized terms. These errors flag inputs that violate that contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SupportError {
    /// Error when an exponent vector does not have the declared length
    #[error("term {term}: expected {expected} {kind} exponents, got {got}")]
    ExponentLength {
        term: usize,
        kind: ExponentKind,
        expected: usize,
        got: usize,
    },
    /// Error when two terms share the same exponent vectors
    #[error("terms {first} and {second} have identical exponents")]
    DuplicateExponents { first: usize, second: usize },
}

/// Errors that can occur while compiling a support into an evaluation plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// Error when the support contains no terms at all
    #[error("cannot build a plan for a support without terms")]
    EmptySupport,
    /// Error when a term's exponent count disagrees with the declared slot count
    #[error("term {term} has {got} exponents, the support declares {expected}")]
    InconsistentTerm {
        term: usize,
        expected: usize,
        got: usize,
    },
}

/// Which dimension of an evaluation call or construction was wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Variables,
    Parameters,
    Coefficients,
    Output,
    Scales,
    VariableNames,
    ParameterNames,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Variables => "variable",
            Dimension::Parameters => "parameter",
            Dimension::Coefficients => "coefficient",
            Dimension::Output => "output",
            Dimension::Scales => "scale",
            Dimension::VariableNames => "variable name",
            Dimension::ParameterNames => "parameter name",
        };
        write!(f, "{name}")
    }
}

/// High-level errors that can occur when working with polynomials and polynomial systems.
///
/// This enum wraps the lower-level support and plan errors and adds the failure modes of
/// the evaluation calls themselves. Every evaluation error is raised before any output
/// buffer is touched, so a failed call can simply be retried with corrected input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolynomialError {
    /// Error when the exponent data handed over is malformed
    #[error("invalid support")]
    InvalidSupport(#[from] SupportError),
    /// Error when the plan builder rejects the support
    #[error("unsupported support")]
    UnsupportedSupport(#[from] PlanError),
    /// Error when an input or output length does not match the polynomial
    #[error("invalid {dimension} length: expected {expected}, got {got}")]
    DimensionMismatch {
        dimension: Dimension,
        expected: usize,
        got: usize,
    },
    /// Error when a derivative is requested for a variable the polynomial does not have
    #[error("variable index {index} out of range for {count} variables")]
    VariableOutOfRange { index: usize, count: usize },
    /// Error when the members of a system disagree on their variable or parameter count
    #[error(
        "polynomial {index} has {variables} variables and {parameters} parameters, \
         the system expects {expected_variables} and {expected_parameters}"
    )]
    InconsistentDimensions {
        index: usize,
        variables: usize,
        parameters: usize,
        expected_variables: usize,
        expected_parameters: usize,
    },
    /// Error when a system is created without members
    #[error("a polynomial system needs at least one polynomial")]
    EmptySystem,
}

impl PolynomialError {
    pub(crate) fn mismatch(dimension: Dimension, expected: usize, got: usize) -> Self {
        PolynomialError::DimensionMismatch {
            dimension,
            expected,
            got,
        }
    }
}
