//! The comparison operator vocabulary.

use std::collections::HashMap;

use crate::value::{value_contains, value_is_contained, values_equal};
use serde_json::Value;

/// Comparison operators supported by filter masks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    /// Structural equality with numeric coercion.
    Equals,
    /// Negated equality. Null-safe: null differs from every non-null value.
    NotEquals,
    /// Substring match on strings, element membership on arrays.
    Contains,
    /// Negated containment.
    NotContains,
    /// Membership of the datum value in the comparison collection.
    IsContained,
    /// Negated membership.
    NotIsContained,
}

impl ComparisonOp {
    /// Canonical operator name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::IsContained => "is_contained",
            Self::NotIsContained => "not_is_contained",
        }
    }

    /// Evaluates the operator against a datum value and a comparison value.
    #[must_use]
    pub fn evaluate(&self, datum: &Value, comparison: &Value) -> bool {
        match self {
            Self::Equals => values_equal(datum, comparison),
            Self::NotEquals => !values_equal(datum, comparison),
            Self::Contains => value_contains(datum, comparison),
            Self::NotContains => !value_contains(datum, comparison),
            Self::IsContained => value_is_contained(datum, comparison),
            Self::NotIsContained => !value_is_contained(datum, comparison),
        }
    }
}

/// Registry of operator names accepted in mask expressions.
///
/// The default vocabulary carries each operator under its canonical name plus
/// the shorthand aliases (`==`, `!=`, `has`, `not_has`, `in`, `not_in`).
/// Mask construction resolves names against this table and rejects anything
/// unknown.
#[derive(Clone, Debug)]
pub struct OperatorVocabulary {
    operators: HashMap<String, ComparisonOp>,
}

impl OperatorVocabulary {
    /// Creates an empty vocabulary.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            operators: HashMap::new(),
        }
    }

    /// Registers `name` as an alias for `op`, replacing any previous binding.
    pub fn register(&mut self, name: impl Into<String>, op: ComparisonOp) {
        self.operators.insert(name.into(), op);
    }

    /// Resolves an operator name to its comparison operator.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<ComparisonOp> {
        self.operators.get(name).copied()
    }

    /// Registered operator names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }
}

impl Default for OperatorVocabulary {
    fn default() -> Self {
        let mut vocabulary = Self::empty();
        for op in [
            ComparisonOp::Equals,
            ComparisonOp::NotEquals,
            ComparisonOp::Contains,
            ComparisonOp::NotContains,
            ComparisonOp::IsContained,
            ComparisonOp::NotIsContained,
        ] {
            vocabulary.register(op.name(), op);
        }
        vocabulary.register("==", ComparisonOp::Equals);
        vocabulary.register("!=", ComparisonOp::NotEquals);
        vocabulary.register("has", ComparisonOp::Contains);
        vocabulary.register("not_has", ComparisonOp::NotContains);
        vocabulary.register("in", ComparisonOp::IsContained);
        vocabulary.register("not_in", ComparisonOp::NotIsContained);
        vocabulary
    }
}
