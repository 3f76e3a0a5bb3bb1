//! Fluent, scoped construction of search conditions.
//!
//! The top-level builder chains `where_` / `and` / `or`, each appending one
//! node to the root list. Each of those takes a closure over a
//! [`GroupBuilder`], which chains leaf predicates, their `or_*` variants and
//! nested `and` / `or` sub-groups.
//!
//! Structural rules (observable through the compiled tree):
//! - a closure producing a single node appends that node directly;
//! - chained `or_*` leaf helpers stay as sibling leaves and never create a
//!   synthetic group;
//! - a closure whose chain contains a nested `and(..)` / `or(..)` call is
//!   committed as a real group node, preserving the parenthesization.

use serde_json::json;
use std::collections::BTreeSet;
use std::marker::PhantomData;

use crate::condition::{
    ConditionNode, GroupNode, LogicalOp, Node, SearchCondition, SortDirection, SortOrder, SortSpec,
};
use crate::errors::SearchError;
use crate::fields::SearchableDto;
use crate::operator::SearchOperator;
use crate::validate::validate;

/// Conversion into a raw wire value accepted by the builder's leaf helpers.
pub trait IntoSearchValue {
    fn into_search_value(self) -> serde_json::Value;
}

macro_rules! impl_into_search_value {
    ($($ty:ty => $conv:expr),+ $(,)?) => {
        $(impl IntoSearchValue for $ty {
            fn into_search_value(self) -> serde_json::Value {
                ($conv)(self)
            }
        })+
    };
}

impl_into_search_value! {
    bool => |v: bool| json!(v),
    i16 => |v: i16| json!(v),
    i32 => |v: i32| json!(v),
    i64 => |v: i64| json!(v),
    u32 => |v: u32| json!(v),
    f32 => |v: f32| json!(v),
    f64 => |v: f64| json!(v),
    char => |v: char| json!(v.to_string()),
    &str => |v: &str| json!(v),
    String => |v: String| json!(v),
    uuid::Uuid => |v: uuid::Uuid| json!(v.to_string()),
    rust_decimal::Decimal => |v: rust_decimal::Decimal| json!(v.to_string()),
    chrono::NaiveDate => |v: chrono::NaiveDate| json!(v.to_string()),
    chrono::NaiveTime => |v: chrono::NaiveTime| json!(v.to_string()),
    chrono::NaiveDateTime => |v: chrono::NaiveDateTime| json!(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
    chrono::DateTime<chrono::Utc> => |v: chrono::DateTime<chrono::Utc>| json!(v.to_rfc3339()),
    chrono::DateTime<chrono::FixedOffset> => |v: chrono::DateTime<chrono::FixedOffset>| json!(v.to_rfc3339()),
}

/// Builder scope for one group of predicates.
#[derive(Debug, Default)]
pub struct GroupBuilder {
    nodes: Vec<Node>,
}

macro_rules! leaf_pair {
    ($(#[$doc:meta])* $name:ident, $or_name:ident, $op:expr) => {
        $(#[$doc])*
        pub fn $name(&mut self, field: &str, value: impl IntoSearchValue) -> &mut Self {
            self.leaf(LogicalOp::And, field, $op, Some(value.into_search_value()))
        }

        /// `OR`-connected variant of the same predicate.
        pub fn $or_name(&mut self, field: &str, value: impl IntoSearchValue) -> &mut Self {
            self.leaf(LogicalOp::Or, field, $op, Some(value.into_search_value()))
        }
    };
}

macro_rules! pattern_pair {
    ($(#[$doc:meta])* $name:ident, $or_name:ident, $op:expr) => {
        $(#[$doc])*
        pub fn $name(&mut self, field: &str, value: &str) -> &mut Self {
            self.leaf(LogicalOp::And, field, $op, Some(json!(value)))
        }

        /// `OR`-connected variant of the same predicate.
        pub fn $or_name(&mut self, field: &str, value: &str) -> &mut Self {
            self.leaf(LogicalOp::Or, field, $op, Some(json!(value)))
        }
    };
}

impl GroupBuilder {
    fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn leaf(
        &mut self,
        connector: LogicalOp,
        field: &str,
        operator: SearchOperator,
        value: Option<serde_json::Value>,
    ) -> &mut Self {
        let operator_slot = if self.nodes.is_empty() {
            None
        } else {
            Some(connector)
        };
        self.nodes.push(Node::Leaf(ConditionNode {
            operator: operator_slot,
            field: field.to_owned(),
            search_operator: operator,
            value,
        }));
        self
    }

    leaf_pair!(
        /// `field = value`
        eq, or_eq, SearchOperator::Equals
    );
    leaf_pair!(
        /// `field <> value`
        ne, or_ne, SearchOperator::NotEquals
    );
    leaf_pair!(
        /// `field > value`
        gt, or_gt, SearchOperator::GreaterThan
    );
    leaf_pair!(
        /// `field >= value`
        ge, or_ge, SearchOperator::GreaterThanOrEqualTo
    );
    leaf_pair!(
        /// `field < value`
        lt, or_lt, SearchOperator::LessThan
    );
    leaf_pair!(
        /// `field <= value`
        le, or_le, SearchOperator::LessThanOrEqualTo
    );

    pattern_pair!(
        /// Case-insensitive substring match.
        contains, or_contains, SearchOperator::Contains
    );
    pattern_pair!(
        /// Negated case-insensitive substring match.
        not_contains, or_not_contains, SearchOperator::NotContains
    );
    pattern_pair!(
        /// Case-insensitive prefix match.
        starts_with, or_starts_with, SearchOperator::StartsWith
    );
    pattern_pair!(not_starts_with, or_not_starts_with, SearchOperator::NotStartsWith);
    pattern_pair!(
        /// Case-insensitive suffix match.
        ends_with, or_ends_with, SearchOperator::EndsWith
    );
    pattern_pair!(not_ends_with, or_not_ends_with, SearchOperator::NotEndsWith);

    /// `field BETWEEN low AND high` (inclusive).
    pub fn between(
        &mut self,
        field: &str,
        low: impl IntoSearchValue,
        high: impl IntoSearchValue,
    ) -> &mut Self {
        self.range(LogicalOp::And, field, SearchOperator::Between, low, high)
    }

    pub fn or_between(
        &mut self,
        field: &str,
        low: impl IntoSearchValue,
        high: impl IntoSearchValue,
    ) -> &mut Self {
        self.range(LogicalOp::Or, field, SearchOperator::Between, low, high)
    }

    pub fn not_between(
        &mut self,
        field: &str,
        low: impl IntoSearchValue,
        high: impl IntoSearchValue,
    ) -> &mut Self {
        self.range(LogicalOp::And, field, SearchOperator::NotBetween, low, high)
    }

    pub fn or_not_between(
        &mut self,
        field: &str,
        low: impl IntoSearchValue,
        high: impl IntoSearchValue,
    ) -> &mut Self {
        self.range(LogicalOp::Or, field, SearchOperator::NotBetween, low, high)
    }

    fn range(
        &mut self,
        connector: LogicalOp,
        field: &str,
        operator: SearchOperator,
        low: impl IntoSearchValue,
        high: impl IntoSearchValue,
    ) -> &mut Self {
        let value = serde_json::Value::Array(vec![
            low.into_search_value(),
            high.into_search_value(),
        ]);
        self.leaf(connector, field, operator, Some(value))
    }

    /// `field IN (values...)`.
    pub fn is_in<V: IntoSearchValue>(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.list(LogicalOp::And, field, SearchOperator::In, values)
    }

    pub fn or_is_in<V: IntoSearchValue>(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.list(LogicalOp::Or, field, SearchOperator::In, values)
    }

    pub fn not_in<V: IntoSearchValue>(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.list(LogicalOp::And, field, SearchOperator::NotIn, values)
    }

    pub fn or_not_in<V: IntoSearchValue>(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.list(LogicalOp::Or, field, SearchOperator::NotIn, values)
    }

    fn list<V: IntoSearchValue>(
        &mut self,
        connector: LogicalOp,
        field: &str,
        operator: SearchOperator,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        let items: Vec<serde_json::Value> = values
            .into_iter()
            .map(IntoSearchValue::into_search_value)
            .collect();
        self.leaf(connector, field, operator, Some(serde_json::Value::Array(items)))
    }

    /// `field IS NULL`.
    pub fn is_null(&mut self, field: &str) -> &mut Self {
        self.leaf(LogicalOp::And, field, SearchOperator::IsNull, None)
    }

    pub fn or_is_null(&mut self, field: &str) -> &mut Self {
        self.leaf(LogicalOp::Or, field, SearchOperator::IsNull, None)
    }

    /// `field IS NOT NULL`.
    pub fn is_not_null(&mut self, field: &str) -> &mut Self {
        self.leaf(LogicalOp::And, field, SearchOperator::IsNotNull, None)
    }

    pub fn or_is_not_null(&mut self, field: &str) -> &mut Self {
        self.leaf(LogicalOp::Or, field, SearchOperator::IsNotNull, None)
    }

    /// Append a nested `AND` group. Always committed as a real group node so
    /// the parenthesization survives compilation.
    pub fn and(&mut self, f: impl FnOnce(&mut GroupBuilder)) -> &mut Self {
        self.nested(LogicalOp::And, f)
    }

    /// Append a nested `OR` group.
    pub fn or(&mut self, f: impl FnOnce(&mut GroupBuilder)) -> &mut Self {
        self.nested(LogicalOp::Or, f)
    }

    fn nested(&mut self, connector: LogicalOp, f: impl FnOnce(&mut GroupBuilder)) -> &mut Self {
        let mut inner = GroupBuilder::new();
        f(&mut inner);
        if !inner.nodes.is_empty() {
            let mut children = inner.nodes;
            children[0].set_operator(None);
            self.nodes.push(Node::Group(GroupNode {
                operator: Some(connector),
                conditions: children,
            }));
        }
        self
    }
}

/// Fluent builder for [`SearchCondition`]. Validation (operators, sortability,
/// value coercion, page/size bounds) runs once at [`build`](Self::build).
#[derive(Debug)]
pub struct SearchConditionBuilder<D: SearchableDto> {
    nodes: Vec<Node>,
    sort: SortSpec,
    page: u64,
    size: u64,
    fetch_fields: BTreeSet<String>,
    _dto: PhantomData<fn() -> D>,
}

impl<D: SearchableDto> SearchConditionBuilder<D> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            sort: SortSpec::default(),
            page: 0,
            size: 20,
            fetch_fields: BTreeSet::new(),
            _dto: PhantomData,
        }
    }

    /// Seed from an existing condition (deep clone; the source stays intact).
    #[must_use]
    pub fn from_existing(cond: &SearchCondition<D>) -> Self {
        Self {
            nodes: cond.conditions().to_vec(),
            sort: cond.sort().clone(),
            page: cond.page(),
            size: cond.size(),
            fetch_fields: cond.fetch_fields().clone(),
            _dto: PhantomData,
        }
    }

    /// Append the first predicate scope.
    #[must_use]
    pub fn where_(mut self, f: impl FnOnce(&mut GroupBuilder)) -> Self {
        self.append_scope(LogicalOp::And, f);
        self
    }

    /// Append an `AND`-connected predicate scope.
    #[must_use]
    pub fn and(mut self, f: impl FnOnce(&mut GroupBuilder)) -> Self {
        self.append_scope(LogicalOp::And, f);
        self
    }

    /// Append an `OR`-connected predicate scope.
    #[must_use]
    pub fn or(mut self, f: impl FnOnce(&mut GroupBuilder)) -> Self {
        self.append_scope(LogicalOp::Or, f);
        self
    }

    fn append_scope(&mut self, connector: LogicalOp, f: impl FnOnce(&mut GroupBuilder)) {
        let mut group = GroupBuilder::new();
        f(&mut group);
        let mut children = group.nodes;
        match children.len() {
            0 => {}
            1 => {
                let mut node = children.remove(0);
                node.set_operator(Some(connector));
                self.nodes.push(node);
            }
            _ if children.iter().any(Node::is_group) => {
                children[0].set_operator(None);
                self.nodes.push(Node::Group(GroupNode {
                    operator: Some(connector),
                    conditions: children,
                }));
            }
            _ => {
                // A plain leaf chain stays flat at this level.
                children[0].set_operator(Some(connector));
                self.nodes.append(&mut children);
            }
        }
    }

    /// Append one sort order.
    #[must_use]
    pub fn sort(mut self, field: &str, direction: SortDirection) -> Self {
        self.sort.orders.push(SortOrder {
            field: field.to_owned(),
            direction,
        });
        self
    }

    /// Zero-based page index.
    #[must_use]
    pub fn page(mut self, page: u64) -> Self {
        self.page = page;
        self
    }

    /// Page size; must be positive at `build` time.
    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Request eager materialization of a ToOne attribute path.
    #[must_use]
    pub fn fetch(mut self, path: &str) -> Self {
        self.fetch_fields.insert(path.to_owned());
        self
    }

    /// Validate and freeze the condition.
    ///
    /// # Errors
    /// Returns [`SearchError::Validation`] for unknown fields, disallowed
    /// operators, unsortable sort fields, a zero size or malformed value
    /// arities, and [`SearchError::Parse`] when a value cannot be coerced to
    /// the field's target type.
    pub fn build(self) -> Result<SearchCondition<D>, SearchError> {
        let mut nodes = self.nodes;
        normalize_connectors(&mut nodes);
        let cond = SearchCondition::from_parts(
            nodes,
            self.sort,
            self.page,
            self.size,
            self.fetch_fields,
        );
        validate::<D>(&cond)?;
        Ok(cond)
    }
}

impl<D: SearchableDto> Default for SearchConditionBuilder<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// First sibling carries no connector; later siblings default to `AND`.
fn normalize_connectors(nodes: &mut [Node]) {
    for (i, node) in nodes.iter_mut().enumerate() {
        if i == 0 {
            node.set_operator(None);
        } else if node.operator().is_none() {
            node.set_operator(Some(LogicalOp::And));
        }
        if let Node::Group(group) = node {
            normalize_connectors(&mut group.conditions);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldDescriptor;
    use crate::kind::FieldKind;

    struct PersonSearch;

    impl SearchableDto for PersonSearch {
        const DTO_NAME: &'static str = "PersonSearch";
        const FIELDS: &'static [FieldDescriptor] = &[
            FieldDescriptor::new("id", FieldKind::I64),
            FieldDescriptor::new("name", FieldKind::String),
            FieldDescriptor::new("age", FieldKind::I64),
            FieldDescriptor::new("score", FieldKind::F64),
        ];
    }

    #[test]
    fn single_leaf_scope_appends_a_leaf() {
        let cond = SearchCondition::<PersonSearch>::builder()
            .where_(|w| {
                w.eq("id", 1);
            })
            .build()
            .unwrap();
        assert_eq!(cond.conditions().len(), 1);
        let Node::Leaf(leaf) = &cond.conditions()[0] else {
            panic!("expected leaf")
        };
        assert_eq!(leaf.operator, None);
        assert_eq!(leaf.search_operator, SearchOperator::Equals);
    }

    #[test]
    fn nested_or_group_is_preserved() {
        // where(age = 25) and (score < 30 or (score is null))
        let cond = SearchCondition::<PersonSearch>::builder()
            .where_(|w| {
                w.eq("age", 25);
            })
            .and(|a| {
                a.lt("score", 30.0).or(|g| {
                    g.is_null("score");
                });
            })
            .build()
            .unwrap();

        assert_eq!(cond.conditions().len(), 2);
        assert!(matches!(&cond.conditions()[0], Node::Leaf(_)));

        let Node::Group(group) = &cond.conditions()[1] else {
            panic!("expected group")
        };
        assert_eq!(group.operator, Some(LogicalOp::And));
        assert_eq!(group.conditions.len(), 2);
        assert!(matches!(&group.conditions[0], Node::Leaf(l) if l.operator.is_none()));
        let Node::Group(inner) = &group.conditions[1] else {
            panic!("expected inner or-group")
        };
        assert_eq!(inner.operator, Some(LogicalOp::Or));
        assert_eq!(inner.conditions.len(), 1);
    }

    #[test]
    fn or_chained_leaves_stay_flat() {
        // where(age = 25) and (score < 20 or score = 50 or score is null)
        // -> four sibling leaves, no synthetic group
        let cond = SearchCondition::<PersonSearch>::builder()
            .where_(|w| {
                w.eq("age", 25);
            })
            .and(|a| {
                a.lt("score", 20.0).or_eq("score", 50.0).or_is_null("score");
            })
            .build()
            .unwrap();

        assert_eq!(cond.conditions().len(), 4);
        let ops: Vec<Option<LogicalOp>> =
            cond.conditions().iter().map(Node::operator).collect();
        assert_eq!(
            ops,
            vec![
                None,
                Some(LogicalOp::And),
                Some(LogicalOp::Or),
                Some(LogicalOp::Or)
            ]
        );
        assert!(cond.conditions().iter().all(|n| !n.is_group()));
    }

    #[test]
    fn from_existing_never_mutates_the_source() {
        let original = SearchCondition::<PersonSearch>::builder()
            .where_(|w| {
                w.eq("id", 1);
            })
            .page(0)
            .size(10)
            .build()
            .unwrap();

        let derived = original
            .to_builder()
            .and(|g| {
                g.eq("name", "test");
            })
            .build()
            .unwrap();

        assert_eq!(original.conditions().len(), 1);
        assert_eq!(derived.conditions().len(), 2);
        assert_eq!(derived.page(), 0);
        assert_eq!(derived.size(), 10);
    }

    #[test]
    fn empty_scope_is_a_no_op() {
        let cond = SearchCondition::<PersonSearch>::builder()
            .where_(|_| {})
            .build()
            .unwrap();
        assert!(cond.conditions().is_empty());
    }

    #[test]
    fn zero_size_is_rejected() {
        let err = SearchCondition::<PersonSearch>::builder()
            .size(0)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn sort_page_size_and_fetch_are_recorded() {
        let cond = SearchCondition::<PersonSearch>::builder()
            .sort("age", SortDirection::Desc)
            .page(3)
            .size(25)
            .fetch("author")
            .build()
            .unwrap();
        assert_eq!(cond.sort().orders.len(), 1);
        assert_eq!(cond.page(), 3);
        assert_eq!(cond.size(), 25);
        assert!(cond.fetch_fields().contains("author"));
    }
}
