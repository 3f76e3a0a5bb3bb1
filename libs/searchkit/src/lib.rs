//! Declarative search conditions over typed DTOs.
//!
//! This crate is the backend-agnostic half of the searchkit engine:
//!
//! - an immutable condition tree ([`SearchCondition`]) with a canonical JSON
//!   wire format (AND/OR groups of leaf comparisons, sort, page window);
//! - a fluent, scoped [`SearchConditionBuilder`] that validates once at
//!   `build`;
//! - per-DTO field metadata ([`SearchableDto`], [`FieldDescriptor`]) mapping
//!   API field names onto entity attribute paths with per-field operator
//!   allow-lists and sortability;
//! - typed value coercion ([`coerce`]) from raw wire values into domain
//!   values, including range-aware date widening for `BETWEEN`;
//! - the [`Page`] result model.
//!
//! Compilation into relational queries and the two-phase executor live in the
//! companion `searchkit-db` crate.

pub mod builder;
pub mod coerce;
pub mod condition;
pub mod errors;
pub mod fields;
pub mod kind;
pub mod operator;
pub mod page;
pub mod validate;
pub mod value;

pub use builder::{GroupBuilder, IntoSearchValue, SearchConditionBuilder};
pub use coerce::{RangePosition, coerce, coerce_str};
pub use condition::{
    ConditionNode, GroupNode, LogicalOp, Node, SearchCondition, SortDirection, SortOrder, SortSpec,
};
pub use errors::{CompileError, ParseError, SearchError, ValidationError};
pub use fields::{
    FieldDescriptor, SearchableDto, descriptor_for, descriptors_for, validate_operator,
    validate_sortable,
};
pub use kind::FieldKind;
pub use operator::{OperatorArity, SearchOperator};
pub use page::Page;
pub use validate::{ValidatedCondition, ValidatedLeaf, ValidatedNode, ValidatedSort, validate};
pub use value::Value;
