//! Immutable condition tree and its JSON wire format.
//!
//! Wire shape:
//!
//! ```json
//! {
//!   "conditions": [
//!     { "field": "age", "searchOperator": "LESS_THAN", "value": 30 },
//!     { "operator": "AND", "conditions": [ ... ] }
//!   ],
//!   "sort": { "orders": [ { "field": "createdAt", "direction": "DESC" } ] },
//!   "page": 0,
//!   "size": 20
//! }
//! ```
//!
//! A node is a group when it carries a `conditions` member, a leaf otherwise.
//! The first sibling of any list has a null/absent `operator`; later siblings
//! connect with `AND` or `OR`. `fetchFields` is server-settable only and is
//! discarded by the decoder when present in input.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::marker::PhantomData;

use crate::fields::SearchableDto;
use crate::operator::SearchOperator;

/// Connector between a node and its preceding sibling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOp {
    And,
    Or,
}

/// Sort direction for one order entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[serde(alias = "asc")]
    Asc,
    #[serde(alias = "desc")]
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// One requested sort order, by DTO field name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: String,
    pub direction: SortDirection,
}

/// Ordered sort specification.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    #[serde(default)]
    pub orders: Vec<SortOrder>,
}

impl SortSpec {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// A leaf comparison against one DTO field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<LogicalOp>,
    pub field: String,
    pub search_operator: SearchOperator,
    /// Raw wire value; absent for `IS_NULL` / `IS_NOT_NULL`, a two-element
    /// array for `BETWEEN`, a non-empty array for `IN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// A parenthesized sub-tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<LogicalOp>,
    pub conditions: Vec<Node>,
}

/// One node of the condition tree: a group or a leaf. Untagged on the wire;
/// the `conditions` member distinguishes the two.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Group(GroupNode),
    Leaf(ConditionNode),
}

impl Node {
    #[must_use]
    pub fn operator(&self) -> Option<LogicalOp> {
        match self {
            Node::Group(g) => g.operator,
            Node::Leaf(c) => c.operator,
        }
    }

    pub(crate) fn set_operator(&mut self, operator: Option<LogicalOp>) {
        match self {
            Node::Group(g) => g.operator = operator,
            Node::Leaf(c) => c.operator = operator,
        }
    }

    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self, Node::Group(_))
    }
}

fn default_size() -> u64 {
    20
}

/// An immutable, validated search request bound to a DTO type.
///
/// Built by [`crate::SearchConditionBuilder`] (which validates on `build`) or
/// decoded from JSON (validated again by the service facade before
/// compilation). After construction the tree is read-only; deriving a new
/// condition goes through [`SearchCondition::to_builder`], which deep-clones
/// and never mutates the source.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct SearchCondition<D> {
    #[serde(default)]
    conditions: Vec<Node>,
    #[serde(default)]
    sort: SortSpec,
    #[serde(default)]
    page: u64,
    #[serde(default = "default_size")]
    size: u64,
    /// Attribute paths to eagerly materialize. Never serialized, never
    /// accepted from input.
    #[serde(skip)]
    fetch_fields: BTreeSet<String>,
    #[serde(skip)]
    _dto: PhantomData<fn() -> D>,
}

impl<D> SearchCondition<D> {
    pub(crate) fn from_parts(
        conditions: Vec<Node>,
        sort: SortSpec,
        page: u64,
        size: u64,
        fetch_fields: BTreeSet<String>,
    ) -> Self {
        Self {
            conditions,
            sort,
            page,
            size,
            fetch_fields,
            _dto: PhantomData,
        }
    }

    #[must_use]
    pub fn conditions(&self) -> &[Node] {
        &self.conditions
    }

    #[must_use]
    pub fn sort(&self) -> &SortSpec {
        &self.sort
    }

    #[must_use]
    pub fn page(&self) -> u64 {
        self.page
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn fetch_fields(&self) -> &BTreeSet<String> {
        &self.fetch_fields
    }
}

impl<D: SearchableDto> SearchCondition<D> {
    /// Start a fresh builder for this DTO type.
    #[must_use]
    pub fn builder() -> crate::builder::SearchConditionBuilder<D> {
        crate::builder::SearchConditionBuilder::new()
    }

    /// Seed a new builder with a deep clone of this condition. The source is
    /// never mutated; re-validation runs at the new `build`.
    #[must_use]
    pub fn to_builder(&self) -> crate::builder::SearchConditionBuilder<D> {
        crate::builder::SearchConditionBuilder::from_existing(self)
    }
}

impl<D> Clone for SearchCondition<D> {
    fn clone(&self) -> Self {
        Self {
            conditions: self.conditions.clone(),
            sort: self.sort.clone(),
            page: self.page,
            size: self.size,
            fetch_fields: self.fetch_fields.clone(),
            _dto: PhantomData,
        }
    }
}

impl<D> std::fmt::Debug for SearchCondition<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchCondition")
            .field("conditions", &self.conditions)
            .field("sort", &self.sort)
            .field("page", &self.page)
            .field("size", &self.size)
            .field("fetch_fields", &self.fetch_fields)
            .finish()
    }
}

impl<D> PartialEq for SearchCondition<D> {
    fn eq(&self, other: &Self) -> bool {
        self.conditions == other.conditions
            && self.sort == other.sort
            && self.page == other.page
            && self.size == other.size
            && self.fetch_fields == other.fetch_fields
    }
}
