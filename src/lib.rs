//! Fast repeated evaluation of fixed multivariate polynomials and their derivatives.
//!
//! This crate compiles the *structure* of a polynomial (its exponent vectors) once into an
//! evaluation plan: a straight-line list of multiplications that computes every monomial,
//! sharing powers and partial products between terms. The plan is then replayed against
//! varying points and coefficients to produce values, gradients, Jacobians and
//! derivatives with respect to parameters.
//!
//! Plans are kept in a cache keyed by a signature of the support, so any number of
//! polynomials with the same shape share one plan regardless of their coefficients or the
//! order their terms were listed in.
//!
//! # Features
//!
//! - Power and product sharing across the terms of a polynomial
//! - Gradients and parameter derivatives from dedicated derivative plans
//! - Fused value-and-gradient evaluation in one pass
//! - In-place variants writing into slices, `Vec`s, arrays, and optionally
//!   `ndarray`/`nalgebra` containers
//! - Generic coefficients: floats, integers, complex numbers
//!
//! # Example
//!
//! ```rust
//! use polyplan::{Polynomial, Support, Term};
//!
//! // 1 + x^2 + 3xy^2
//! let support = Support::new(2, 0, vec![
//!     Term::from_variables(vec![0, 0]),
//!     Term::from_variables(vec![2, 0]),
//!     Term::from_variables(vec![1, 2]),
//! ]).unwrap();
//! let f = Polynomial::new(&support, vec![1.0, 1.0, 3.0]).unwrap();
//!
//! // Evaluate at point (x=2, y=3)
//! assert_eq!(f.evaluate(&[2.0, 3.0]).unwrap(), 59.0);
//!
//! // Compute gradient [∂/∂x, ∂/∂y]
//! assert_eq!(f.gradient(&[2.0, 3.0]).unwrap(), vec![31.0, 36.0]);
//!
//! // Both at once
//! let (value, gradient) = f.evaluate_and_gradient(&[2.0, 3.0]).unwrap();
//! assert_eq!((value, gradient), (59.0, vec![31.0, 36.0]));
//! ```

pub use cache::{CacheConfig, PlanCache};
pub use errors::{Dimension, ExponentKind, PlanError, PolynomialError, SupportError};
pub use plan::EvaluationPlan;
pub use polynomial::Polynomial;
pub use support::{Signature, Support, Term};
pub use system::PolynomialSystem;
pub use types::Coefficient;

pub mod prelude {
    pub use crate::backends::matrix::Matrix;
    pub use crate::backends::vector::Vector;
    pub use crate::cache::PlanCache;
    pub use crate::polynomial::Polynomial;
    pub use crate::support::{Support, Term};
    pub use crate::system::PolynomialSystem;
    pub use crate::types::Coefficient;
}

/// Input and output containers accepted by the evaluation calls
pub mod backends {
    pub mod matrix;
    pub mod vector;
}
/// Compilation of a support into an evaluation plan
pub mod builder;
/// Signature-keyed plan memoization
pub mod cache;
/// Error types for the various failure modes
pub mod errors;
/// Dead-step elimination for the per-output routines
pub mod opt;
/// Evaluation plan representation and replay
pub mod plan;
/// Single polynomial evaluation
pub mod polynomial;
/// Exponent supports and their signatures
pub mod support;
/// System of polynomials
pub mod system;
/// Shared type definitions
pub mod types;

#[cfg(test)]
mod proptests;
