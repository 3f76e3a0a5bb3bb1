//! Error taxonomy shared by the condition layer and the query engine.
//!
//! Every error carries a stable kind code (see [`SearchError::kind`]) so that
//! callers can map failures to transport-level responses or localized
//! messages without matching on display text.

use crate::kind::FieldKind;
use crate::operator::SearchOperator;
use thiserror::Error;

/// DTO-level validation failures raised while building or validating a
/// search condition. These are always user-caused.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("unknown search field: {0}")]
    UnknownField(String),

    #[error("operator {operator} is not allowed on field {field}")]
    OperatorNotAllowed {
        field: String,
        operator: SearchOperator,
    },

    #[error("operator {operator} requires a string field, but {field} is {kind}")]
    OperatorRequiresString {
        field: String,
        operator: SearchOperator,
        kind: FieldKind,
    },

    #[error("field {0} is not sortable")]
    FieldNotSortable(String),

    #[error("size must be > 0")]
    InvalidSize,

    #[error("condition group must contain at least one condition")]
    EmptyGroup,

    #[error("operator {operator} on field {field} requires {expected}")]
    ValueArity {
        field: String,
        operator: SearchOperator,
        expected: &'static str,
    },

    #[error("value list for field {0} must not be empty")]
    EmptyValueList(String),
}

/// Value coercion failure: the raw value could not be turned into the
/// field's target type.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("field {field}: cannot parse {raw:?} as {target}: {reason}")]
pub struct ParseError {
    pub field: String,
    pub raw: String,
    pub target: FieldKind,
    pub reason: String,
}

impl ParseError {
    pub(crate) fn new(raw: impl Into<String>, target: FieldKind, reason: impl Into<String>) -> Self {
        Self {
            field: String::new(),
            raw: raw.into(),
            target,
            reason: reason.into(),
        }
    }

    /// Attach the DTO field name once it is known.
    #[must_use]
    pub fn for_field(mut self, field: &str) -> Self {
        self.field = field.to_owned();
        self
    }
}

/// Internal inconsistency while compiling a validated condition into a
/// relational query. Never user-caused; indicates a programming bug such as
/// a descriptor pointing at a nonexistent entity attribute.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("query compilation failed: {reason}")]
pub struct CompileError {
    pub reason: String,
}

impl CompileError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Unified error for the whole search pipeline.
#[derive(Debug, Error, Clone)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Surfaced from the query runner, propagated unchanged.
    ///
    /// Keys vanishing between the executor's phases (concurrent delete) are
    /// not an error: the page is returned degraded, with its
    /// `integrity_degraded` flag set.
    #[error("backend error: {0}")]
    Backend(String),
}

impl SearchError {
    /// Stable kind code for transport mapping and localization lookups.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::Validation(_) => "validation",
            SearchError::Parse(_) => "parse",
            SearchError::Compile(_) => "compile",
            SearchError::Backend(_) => "backend",
        }
    }
}
