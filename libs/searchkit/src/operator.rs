//! Search operators permitted in condition leaves.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operators a condition leaf may carry.
///
/// The wire names are the SCREAMING_SNAKE_CASE tokens (`EQUALS`,
/// `GREATER_THAN_OR_EQUAL_TO`, `IS_NULL`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    Between,
    NotBetween,
    In,
    NotIn,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    IsNull,
    IsNotNull,
}

/// How many raw values an operator consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorArity {
    /// No value at all (`IS_NULL`, `IS_NOT_NULL`).
    None,
    /// Exactly one value.
    Single,
    /// A `[start, end]` pair.
    Pair,
    /// A non-empty list.
    List,
}

impl SearchOperator {
    /// Every operator, in declaration order. Used as the default allowed set
    /// for a searchable field.
    pub const ALL: &'static [SearchOperator] = &[
        SearchOperator::Equals,
        SearchOperator::NotEquals,
        SearchOperator::GreaterThan,
        SearchOperator::GreaterThanOrEqualTo,
        SearchOperator::LessThan,
        SearchOperator::LessThanOrEqualTo,
        SearchOperator::Between,
        SearchOperator::NotBetween,
        SearchOperator::In,
        SearchOperator::NotIn,
        SearchOperator::Contains,
        SearchOperator::NotContains,
        SearchOperator::StartsWith,
        SearchOperator::NotStartsWith,
        SearchOperator::EndsWith,
        SearchOperator::NotEndsWith,
        SearchOperator::IsNull,
        SearchOperator::IsNotNull,
    ];

    /// Value arity this operator expects during validation.
    #[must_use]
    pub fn arity(self) -> OperatorArity {
        match self {
            SearchOperator::IsNull | SearchOperator::IsNotNull => OperatorArity::None,
            SearchOperator::Between | SearchOperator::NotBetween => OperatorArity::Pair,
            SearchOperator::In | SearchOperator::NotIn => OperatorArity::List,
            _ => OperatorArity::Single,
        }
    }

    /// True for the negated variant of any operator pair.
    #[must_use]
    pub fn is_negated(self) -> bool {
        matches!(
            self,
            SearchOperator::NotEquals
                | SearchOperator::NotBetween
                | SearchOperator::NotIn
                | SearchOperator::NotContains
                | SearchOperator::NotStartsWith
                | SearchOperator::NotEndsWith
                | SearchOperator::IsNotNull
        )
    }

    /// True for the `LIKE`-family operators, which only apply to string
    /// fields and compile to case-insensitive pattern matches.
    #[must_use]
    pub fn is_pattern(self) -> bool {
        matches!(
            self,
            SearchOperator::Contains
                | SearchOperator::NotContains
                | SearchOperator::StartsWith
                | SearchOperator::NotStartsWith
                | SearchOperator::EndsWith
                | SearchOperator::NotEndsWith
        )
    }

    /// Wire token for this operator.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            SearchOperator::Equals => "EQUALS",
            SearchOperator::NotEquals => "NOT_EQUALS",
            SearchOperator::GreaterThan => "GREATER_THAN",
            SearchOperator::GreaterThanOrEqualTo => "GREATER_THAN_OR_EQUAL_TO",
            SearchOperator::LessThan => "LESS_THAN",
            SearchOperator::LessThanOrEqualTo => "LESS_THAN_OR_EQUAL_TO",
            SearchOperator::Between => "BETWEEN",
            SearchOperator::NotBetween => "NOT_BETWEEN",
            SearchOperator::In => "IN",
            SearchOperator::NotIn => "NOT_IN",
            SearchOperator::Contains => "CONTAINS",
            SearchOperator::NotContains => "NOT_CONTAINS",
            SearchOperator::StartsWith => "STARTS_WITH",
            SearchOperator::NotStartsWith => "NOT_STARTS_WITH",
            SearchOperator::EndsWith => "ENDS_WITH",
            SearchOperator::NotEndsWith => "NOT_ENDS_WITH",
            SearchOperator::IsNull => "IS_NULL",
            SearchOperator::IsNotNull => "IS_NOT_NULL",
        }
    }
}

impl fmt::Display for SearchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_tokens_round_trip() {
        for op in SearchOperator::ALL {
            let json = serde_json::to_string(op).unwrap();
            assert_eq!(json, format!("\"{}\"", op.token()));
            let back: SearchOperator = serde_json::from_str(&json).unwrap();
            assert_eq!(back, *op);
        }
    }

    #[test]
    fn arity_classification() {
        assert_eq!(SearchOperator::IsNull.arity(), OperatorArity::None);
        assert_eq!(SearchOperator::Equals.arity(), OperatorArity::Single);
        assert_eq!(SearchOperator::Between.arity(), OperatorArity::Pair);
        assert_eq!(SearchOperator::NotIn.arity(), OperatorArity::List);
    }

    #[test]
    fn negation_pairs() {
        assert!(!SearchOperator::Contains.is_negated());
        assert!(SearchOperator::NotContains.is_negated());
        assert!(SearchOperator::IsNotNull.is_negated());
    }
}
