//! Validation of a raw condition tree into its typed, path-resolved form.
//!
//! Both the builder's `build` and the service facade (for wire-decoded
//! conditions) run this pass, so user-caused failures are always raised as
//! [`ValidationError`] / [`ParseError`] before compilation. The compiler only
//! ever consumes a [`ValidatedCondition`].

use crate::coerce::{RangePosition, coerce};
use crate::condition::{LogicalOp, Node, SearchCondition, SortDirection};
use crate::errors::{SearchError, ValidationError};
use crate::fields::{SearchableDto, descriptor_for, validate_operator, validate_sortable};
use crate::kind::FieldKind;
use crate::operator::{OperatorArity, SearchOperator};
use crate::value::Value;

/// A validated leaf: operators checked, entity path resolved, values coerced.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedLeaf {
    pub connector: Option<LogicalOp>,
    /// DTO field name, kept for diagnostics.
    pub field: String,
    /// Resolved dotted entity attribute path.
    pub entity_path: String,
    pub operator: SearchOperator,
    pub kind: FieldKind,
    /// Coerced values: empty for null checks, `[low, high]` for ranges.
    pub values: Vec<Value>,
}

/// A validated node, preserving the group structure of the source tree.
#[derive(Clone, Debug, PartialEq)]
pub enum ValidatedNode {
    Leaf(ValidatedLeaf),
    Group {
        connector: Option<LogicalOp>,
        nodes: Vec<ValidatedNode>,
    },
}

impl ValidatedNode {
    #[must_use]
    pub fn connector(&self) -> Option<LogicalOp> {
        match self {
            ValidatedNode::Leaf(leaf) => leaf.connector,
            ValidatedNode::Group { connector, .. } => *connector,
        }
    }
}

/// A validated sort order with its resolved entity attribute path.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedSort {
    pub field: String,
    pub path: String,
    pub direction: SortDirection,
}

/// The compiler's input: a fully validated search request.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedCondition {
    pub nodes: Vec<ValidatedNode>,
    pub sort: Vec<ValidatedSort>,
    pub page: u64,
    pub size: u64,
    /// Requested eager-fetch attribute paths, in deterministic order.
    pub fetch_paths: Vec<String>,
}

/// Validate a condition against its DTO's field metadata.
///
/// # Errors
/// [`SearchError::Validation`] for structural and metadata violations,
/// [`SearchError::Parse`] when a raw value fails coercion.
pub fn validate<D: SearchableDto>(
    cond: &SearchCondition<D>,
) -> Result<ValidatedCondition, SearchError> {
    if cond.size() == 0 {
        return Err(ValidationError::InvalidSize.into());
    }

    let nodes = validate_nodes::<D>(cond.conditions())?;

    let mut sort = Vec::with_capacity(cond.sort().orders.len());
    for order in &cond.sort().orders {
        let descriptor = descriptor_for::<D>(&order.field)?;
        validate_sortable(descriptor)?;
        sort.push(ValidatedSort {
            field: order.field.clone(),
            path: descriptor.resolved_sort_path().to_owned(),
            direction: order.direction,
        });
    }

    Ok(ValidatedCondition {
        nodes,
        sort,
        page: cond.page(),
        size: cond.size(),
        fetch_paths: cond.fetch_fields().iter().cloned().collect(),
    })
}

fn validate_nodes<D: SearchableDto>(nodes: &[Node]) -> Result<Vec<ValidatedNode>, SearchError> {
    let mut out = Vec::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        let connector = if i == 0 {
            None
        } else {
            Some(node.operator().unwrap_or(LogicalOp::And))
        };
        out.push(validate_node::<D>(node, connector)?);
    }
    Ok(out)
}

fn validate_node<D: SearchableDto>(
    node: &Node,
    connector: Option<LogicalOp>,
) -> Result<ValidatedNode, SearchError> {
    match node {
        Node::Group(group) => {
            if group.conditions.is_empty() {
                return Err(ValidationError::EmptyGroup.into());
            }
            Ok(ValidatedNode::Group {
                connector,
                nodes: validate_nodes::<D>(&group.conditions)?,
            })
        }
        Node::Leaf(leaf) => {
            let descriptor = descriptor_for::<D>(&leaf.field)?;
            validate_operator(descriptor, leaf.search_operator)?;
            if leaf.search_operator.is_pattern() && descriptor.kind != FieldKind::String {
                return Err(ValidationError::OperatorRequiresString {
                    field: leaf.field.clone(),
                    operator: leaf.search_operator,
                    kind: descriptor.kind,
                }
                .into());
            }

            let values = coerce_leaf_values(leaf, descriptor.kind)?;

            Ok(ValidatedNode::Leaf(ValidatedLeaf {
                connector,
                field: leaf.field.clone(),
                entity_path: descriptor.resolved_entity_path().to_owned(),
                operator: leaf.search_operator,
                kind: descriptor.kind,
                values,
            }))
        }
    }
}

fn coerce_leaf_values(
    leaf: &crate::condition::ConditionNode,
    kind: FieldKind,
) -> Result<Vec<Value>, SearchError> {
    let op = leaf.search_operator;
    match op.arity() {
        OperatorArity::None => Ok(Vec::new()),
        OperatorArity::Single => {
            let raw = leaf.value.as_ref().unwrap_or(&serde_json::Value::Null);
            let value = coerce(raw, kind, RangePosition::Single)
                .map_err(|e| e.for_field(&leaf.field))?
                .ok_or_else(|| ValidationError::ValueArity {
                    field: leaf.field.clone(),
                    operator: op,
                    expected: "a value",
                })?;
            Ok(vec![value])
        }
        OperatorArity::Pair => {
            let arity_err = || ValidationError::ValueArity {
                field: leaf.field.clone(),
                operator: op,
                expected: "a [start, end] pair",
            };
            let raw = leaf.value.as_ref().ok_or_else(arity_err)?;
            let serde_json::Value::Array(items) = raw else {
                return Err(arity_err().into());
            };
            let [low, high] = items.as_slice() else {
                return Err(arity_err().into());
            };
            let low = coerce(low, kind, RangePosition::RangeStart)
                .map_err(|e| e.for_field(&leaf.field))?
                .ok_or_else(arity_err)?;
            let high = coerce(high, kind, RangePosition::RangeEnd)
                .map_err(|e| e.for_field(&leaf.field))?
                .ok_or_else(arity_err)?;
            Ok(vec![low, high])
        }
        OperatorArity::List => {
            let arity_err = || ValidationError::ValueArity {
                field: leaf.field.clone(),
                operator: op,
                expected: "a value list",
            };
            let raw = leaf.value.as_ref().ok_or_else(arity_err)?;
            let serde_json::Value::Array(items) = raw else {
                return Err(arity_err().into());
            };
            if items.is_empty() {
                return Err(ValidationError::EmptyValueList(leaf.field.clone()).into());
            }
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                let value = coerce(item, kind, RangePosition::Single)
                    .map_err(|e| e.for_field(&leaf.field))?
                    .ok_or_else(arity_err)?;
                values.push(value);
            }
            Ok(values)
        }
    }
}
