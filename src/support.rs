//! The structural shape of a polynomial.
//!
//! A [`Support`] is the list of monomial exponent vectors of a polynomial, without the
//! coefficients. Two polynomials whose supports have equal [`Signature`]s are compiled into
//! the same evaluation plan and only differ in the coefficient vector they replay it with.
//!
//! Variables and parameters are kept apart: both take part in the monomials, but only
//! variables appear in gradients while parameters have their own derivative family.

use std::cmp::Ordering;
use std::fmt;

use itertools::Itertools;
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};

use crate::errors::{ExponentKind, SupportError};

/// Exponents of one monomial.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Term {
    variables: Vec<u32>,
    parameters: Vec<u32>,
}

impl Term {
    /// Creates a term from its variable and parameter exponents.
    pub fn new(variables: Vec<u32>, parameters: Vec<u32>) -> Self {
        Self {
            variables,
            parameters,
        }
    }

    /// Creates a term of a polynomial without parameters.
    pub fn from_variables(variables: Vec<u32>) -> Self {
        Self::new(variables, Vec::new())
    }

    /// The variable exponents.
    pub fn variables(&self) -> &[u32] {
        &self.variables
    }

    /// The parameter exponents.
    pub fn parameters(&self) -> &[u32] {
        &self.parameters
    }

    /// Iterates over all exponents, variables first and parameters after.
    pub fn slots(&self) -> impl Iterator<Item = u32> + '_ {
        self.variables.iter().chain(self.parameters.iter()).copied()
    }

    /// Total degree in the variables and parameters.
    pub fn degree(&self) -> u32 {
        self.slots().sum()
    }

    fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.variables
            .cmp(&other.variables)
            .then_with(|| self.parameters.cmp(&other.parameters))
    }
}

/// The monomial exponents of a polynomial together with its variable and parameter counts.
///
/// Terms keep the order they were handed over in. The coefficient belonging to term `i`
/// is the `i`-th coefficient passed next to the support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Support {
    nvariables: usize,
    nparameters: usize,
    terms: Vec<Term>,
}

impl Support {
    /// Creates a support after validating the terms.
    ///
    /// # Errors
    /// Returns `SupportError::ExponentLength` if an exponent vector does not match the
    /// declared variable or parameter count, and `SupportError::DuplicateExponents` if two
    /// terms are identical. Merging duplicate terms is the caller's job.
    ///
    /// # Example
    /// ```
    /// # use polyplan::support::{Support, Term};
    /// // 1 + x^2 + 3xy^2
    /// let support = Support::new(2, 0, vec![
    ///     Term::from_variables(vec![0, 0]),
    ///     Term::from_variables(vec![2, 0]),
    ///     Term::from_variables(vec![1, 2]),
    /// ]).unwrap();
    /// assert_eq!(support.term_count(), 3);
    /// ```
    pub fn new(
        nvariables: usize,
        nparameters: usize,
        terms: Vec<Term>,
    ) -> Result<Self, SupportError> {
        for (index, term) in terms.iter().enumerate() {
            if term.variables.len() != nvariables {
                return Err(SupportError::ExponentLength {
                    term: index,
                    kind: ExponentKind::Variable,
                    expected: nvariables,
                    got: term.variables.len(),
                });
            }
            if term.parameters.len() != nparameters {
                return Err(SupportError::ExponentLength {
                    term: index,
                    kind: ExponentKind::Parameter,
                    expected: nparameters,
                    got: term.parameters.len(),
                });
            }
        }

        let mut seen: FxHashMap<&Term, usize> = FxHashMap::default();
        for (index, term) in terms.iter().enumerate() {
            if let Some(&first) = seen.get(term) {
                return Err(SupportError::DuplicateExponents {
                    first,
                    second: index,
                });
            }
            seen.insert(term, index);
        }

        Ok(Self {
            nvariables,
            nparameters,
            terms,
        })
    }

    pub fn variable_count(&self) -> usize {
        self.nvariables
    }

    pub fn parameter_count(&self) -> usize {
        self.nparameters
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Number of exponent slots per term (variables plus parameters).
    pub fn slot_count(&self) -> usize {
        self.nvariables + self.nparameters
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Returns the term indices in canonical order.
    ///
    /// Terms are ordered lexicographically by their variable exponents and then by their
    /// parameter exponents. Plans are built in this order, so `canonical_order()[k]` is the
    /// position of the term the plan calls `k`.
    pub fn canonical_order(&self) -> Vec<usize> {
        (0..self.terms.len())
            .sorted_by(|&a, &b| self.terms[a].canonical_cmp(&self.terms[b]))
            .collect()
    }

    /// Returns a copy of this support with the terms in canonical order.
    pub fn canonicalize(&self) -> Support {
        Support {
            nvariables: self.nvariables,
            nparameters: self.nparameters,
            terms: self
                .canonical_order()
                .into_iter()
                .map(|index| self.terms[index].clone())
                .collect(),
        }
    }

    /// Computes the structural fingerprint of this support.
    ///
    /// The digest covers the variable and parameter counts and the terms in canonical
    /// order, so it does not depend on the order the terms were handed over in.
    pub fn signature(&self) -> Signature {
        let mut hasher = Sha256::new();
        hasher.update((self.nvariables as u64).to_le_bytes());
        hasher.update((self.nparameters as u64).to_le_bytes());
        hasher.update((self.terms.len() as u64).to_le_bytes());
        for index in self.canonical_order() {
            for exponent in self.terms[index].slots() {
                hasher.update(exponent.to_le_bytes());
            }
        }

        Signature {
            nvariables: self.nvariables,
            nparameters: self.nparameters,
            nterms: self.terms.len(),
            digest: hasher.finalize().into(),
        }
    }
}

/// Canonical fingerprint of a support, used as the plan cache key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    nvariables: usize,
    nparameters: usize,
    nterms: usize,
    digest: [u8; 32],
}

impl Signature {
    pub fn variable_count(&self) -> usize {
        self.nvariables
    }

    pub fn parameter_count(&self) -> usize {
        self.nparameters
    }

    pub fn term_count(&self) -> usize {
        self.nterms
    }

    /// The SHA-256 digest over the canonical term list.
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.digest[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Signature({self}, vars={}, params={}, terms={})",
            self.nvariables, self.nparameters, self.nterms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_terms() -> Vec<Term> {
        vec![
            Term::from_variables(vec![0, 0]),
            Term::from_variables(vec![2, 0]),
            Term::from_variables(vec![1, 2]),
        ]
    }

    #[test]
    fn test_structural_accessors() {
        let support = Support::new(2, 0, sample_terms()).unwrap();
        assert_eq!(support.variable_count(), 2);
        assert_eq!(support.parameter_count(), 0);
        assert_eq!(support.term_count(), 3);
        assert_eq!(support.slot_count(), 2);
        assert_eq!(support.terms()[2].degree(), 3);
    }

    #[test]
    fn test_signature_ignores_term_order() {
        let a = Support::new(2, 0, sample_terms()).unwrap();
        let mut reversed = sample_terms();
        reversed.reverse();
        let b = Support::new(2, 0, reversed).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.canonicalize(), b.canonicalize());
    }

    #[test]
    fn test_signature_distinguishes_supports() {
        let a = Support::new(2, 0, sample_terms()).unwrap();
        let mut terms = sample_terms();
        terms[2] = Term::from_variables(vec![2, 1]);
        let b = Support::new(2, 0, terms).unwrap();
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_signature_separates_variables_from_parameters() {
        // x*a versus x*y: same flattened exponents, different slot roles
        let with_param = Support::new(1, 1, vec![Term::new(vec![1], vec![1])]).unwrap();
        let without = Support::new(2, 0, vec![Term::from_variables(vec![1, 1])]).unwrap();
        assert_ne!(with_param.signature(), without.signature());
    }

    #[test]
    fn test_canonical_order() {
        let support = Support::new(2, 0, sample_terms()).unwrap();
        // [0,0] < [1,2] < [2,0]
        assert_eq!(support.canonical_order(), vec![0, 2, 1]);
    }

    #[test]
    fn test_rejects_wrong_lengths() {
        let err = Support::new(2, 0, vec![Term::from_variables(vec![1])]).unwrap_err();
        assert_eq!(
            err,
            SupportError::ExponentLength {
                term: 0,
                kind: ExponentKind::Variable,
                expected: 2,
                got: 1
            }
        );

        let err = Support::new(1, 1, vec![Term::from_variables(vec![1])]).unwrap_err();
        assert!(matches!(
            err,
            SupportError::ExponentLength {
                kind: ExponentKind::Parameter,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_duplicates() {
        let terms = vec![
            Term::from_variables(vec![1, 0]),
            Term::from_variables(vec![0, 1]),
            Term::from_variables(vec![1, 0]),
        ];
        let err = Support::new(2, 0, terms).unwrap_err();
        assert_eq!(err, SupportError::DuplicateExponents { first: 0, second: 2 });
    }

    #[test]
    fn test_signature_display() {
        let support = Support::new(2, 0, sample_terms()).unwrap();
        let shown = support.signature().to_string();
        assert_eq!(shown.len(), 16);
        assert!(shown.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
