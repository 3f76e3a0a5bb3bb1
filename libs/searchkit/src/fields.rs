//! Per-DTO field metadata: which fields are searchable, with which
//! operators, whether they sort, and how they map onto entity attributes.
//!
//! The descriptor table is declared once per DTO type through the
//! [`SearchableDto`] trait (the static equivalent of reflective field
//! discovery) and memoized process-wide on first use.

use dashmap::DashMap;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::errors::ValidationError;
use crate::kind::FieldKind;
use crate::operator::SearchOperator;

/// Metadata for one searchable DTO field.
#[derive(Clone, Copy, Debug)]
pub struct FieldDescriptor {
    /// API-visible field name used in conditions and sort orders.
    pub dto_name: &'static str,
    /// Dotted entity attribute path override (e.g. `author.profile.department`).
    /// Defaults to the DTO name when absent.
    pub entity_path: Option<&'static str>,
    /// Sort-only attribute override. Takes priority over `entity_path` when
    /// resolving a sort order.
    pub sort_field: Option<&'static str>,
    /// Logical type used for value coercion.
    pub kind: FieldKind,
    /// Operators a caller may apply to this field.
    pub operators: &'static [SearchOperator],
    /// Whether the field may appear in a sort specification.
    pub sortable: bool,
}

impl FieldDescriptor {
    /// A searchable, sortable field allowing every operator.
    #[must_use]
    pub const fn new(dto_name: &'static str, kind: FieldKind) -> Self {
        Self {
            dto_name,
            entity_path: None,
            sort_field: None,
            kind,
            operators: SearchOperator::ALL,
            sortable: true,
        }
    }

    #[must_use]
    pub const fn entity_path(mut self, path: &'static str) -> Self {
        self.entity_path = Some(path);
        self
    }

    #[must_use]
    pub const fn sort_field(mut self, path: &'static str) -> Self {
        self.sort_field = Some(path);
        self
    }

    #[must_use]
    pub const fn operators(mut self, operators: &'static [SearchOperator]) -> Self {
        self.operators = operators;
        self
    }

    #[must_use]
    pub const fn unsortable(mut self) -> Self {
        self.sortable = false;
        self
    }

    /// Entity attribute path this field filters on.
    #[must_use]
    pub fn resolved_entity_path(&self) -> &'static str {
        self.entity_path.unwrap_or(self.dto_name)
    }

    /// Entity attribute path this field sorts on: the sort override wins over
    /// the entity override, which wins over the DTO name.
    #[must_use]
    pub fn resolved_sort_path(&self) -> &'static str {
        self.sort_field
            .or(self.entity_path)
            .unwrap_or(self.dto_name)
    }
}

/// A DTO type whose fields may be searched.
///
/// Implementations declare the descriptor table as a const slice; discovery
/// and lookup are memoized per type.
pub trait SearchableDto: 'static {
    /// Human-readable DTO name, used in diagnostics.
    const DTO_NAME: &'static str;

    /// Descriptor table, one entry per searchable field.
    const FIELDS: &'static [FieldDescriptor];
}

type DescriptorMap = HashMap<&'static str, &'static FieldDescriptor>;

static DESCRIPTOR_CACHE: LazyLock<DashMap<TypeId, Arc<DescriptorMap>>> =
    LazyLock::new(DashMap::new);

/// Descriptor map for a DTO type, keyed by DTO field name.
///
/// Built once per type and cached process-wide; the dashmap entry API gives
/// single-flight initialization.
#[must_use]
pub fn descriptors_for<D: SearchableDto>() -> Arc<DescriptorMap> {
    DESCRIPTOR_CACHE
        .entry(TypeId::of::<D>())
        .or_insert_with(|| Arc::new(D::FIELDS.iter().map(|f| (f.dto_name, f)).collect()))
        .clone()
}

/// Look up one field descriptor.
///
/// # Errors
/// Returns [`ValidationError::UnknownField`] when the DTO does not declare
/// the field.
pub fn descriptor_for<D: SearchableDto>(
    field: &str,
) -> Result<&'static FieldDescriptor, ValidationError> {
    descriptors_for::<D>()
        .get(field)
        .copied()
        .ok_or_else(|| ValidationError::UnknownField(field.to_owned()))
}

/// Check that the operator is in the field's allowed set.
///
/// # Errors
/// Returns [`ValidationError::OperatorNotAllowed`] otherwise.
pub fn validate_operator(
    descriptor: &FieldDescriptor,
    operator: SearchOperator,
) -> Result<(), ValidationError> {
    if descriptor.operators.contains(&operator) {
        Ok(())
    } else {
        Err(ValidationError::OperatorNotAllowed {
            field: descriptor.dto_name.to_owned(),
            operator,
        })
    }
}

/// Check that the field may be sorted on.
///
/// # Errors
/// Returns [`ValidationError::FieldNotSortable`] otherwise.
pub fn validate_sortable(descriptor: &FieldDescriptor) -> Result<(), ValidationError> {
    if descriptor.sortable {
        Ok(())
    } else {
        Err(ValidationError::FieldNotSortable(
            descriptor.dto_name.to_owned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BookSearch;

    impl SearchableDto for BookSearch {
        const DTO_NAME: &'static str = "BookSearch";
        const FIELDS: &'static [FieldDescriptor] = &[
            FieldDescriptor::new("title", FieldKind::String),
            FieldDescriptor::new("authorName", FieldKind::String).entity_path("author.name"),
            FieldDescriptor::new("popularity", FieldKind::I64)
                .entity_path("stats.popularity")
                .sort_field("stats.score"),
            FieldDescriptor::new("isbn", FieldKind::String)
                .operators(&[SearchOperator::Equals, SearchOperator::In])
                .unsortable(),
        ];
    }

    #[test]
    fn descriptor_lookup_is_memoized() {
        let first = descriptors_for::<BookSearch>();
        let second = descriptors_for::<BookSearch>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = descriptor_for::<BookSearch>("publisher").unwrap_err();
        assert_eq!(err, ValidationError::UnknownField("publisher".into()));
    }

    #[test]
    fn entity_path_defaults_to_dto_name() {
        let d = descriptor_for::<BookSearch>("title").unwrap();
        assert_eq!(d.resolved_entity_path(), "title");
        let d = descriptor_for::<BookSearch>("authorName").unwrap();
        assert_eq!(d.resolved_entity_path(), "author.name");
    }

    #[test]
    fn sort_override_takes_priority_over_entity_override() {
        let d = descriptor_for::<BookSearch>("popularity").unwrap();
        assert_eq!(d.resolved_sort_path(), "stats.score");
        let d = descriptor_for::<BookSearch>("authorName").unwrap();
        assert_eq!(d.resolved_sort_path(), "author.name");
        let d = descriptor_for::<BookSearch>("title").unwrap();
        assert_eq!(d.resolved_sort_path(), "title");
    }

    #[test]
    fn operator_allow_list_is_enforced() {
        let d = descriptor_for::<BookSearch>("isbn").unwrap();
        assert!(validate_operator(d, SearchOperator::Equals).is_ok());
        let err = validate_operator(d, SearchOperator::Contains).unwrap_err();
        assert!(matches!(err, ValidationError::OperatorNotAllowed { .. }));
    }

    #[test]
    fn sortability_is_enforced() {
        let d = descriptor_for::<BookSearch>("isbn").unwrap();
        assert!(matches!(
            validate_sortable(d).unwrap_err(),
            ValidationError::FieldNotSortable(_)
        ));
        assert!(validate_sortable(descriptor_for::<BookSearch>("title").unwrap()).is_ok());
    }
}
