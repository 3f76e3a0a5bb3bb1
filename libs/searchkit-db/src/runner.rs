//! The abstract query runner the executor drives.
//!
//! The engine compiles conditions into [`CompiledQuery`] and needs exactly
//! five operations from the backend: ordered key projection, entity
//! materialization by keys, distinct-key count, and keyed update/delete.
//! The statement builders in [`crate::statements`] produce ready-to-render
//! SQL for each of them; a runner binds those to its connection and row
//! mapping.

use async_trait::async_trait;
use std::collections::BTreeMap;

use searchkit::{SearchError, Value};

use crate::key::EntityKey;
use crate::meta::EntityDef;
use crate::predicate::CompiledQuery;

/// A scalar-attribute projection request (root attributes only).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Projection {
    attributes: Vec<String>,
}

impl Projection {
    #[must_use]
    pub fn new(attributes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }
}

/// One projected row: attribute name to value (None for SQL NULL).
pub type ProjectionRow = BTreeMap<String, Option<Value>>;

/// Attribute assignments for a keyed batch update. `None` writes NULL.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateDescriptor {
    assignments: Vec<(String, Option<Value>)>,
}

impl UpdateDescriptor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a value to a scalar attribute.
    #[must_use]
    pub fn set(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((attribute.into(), Some(value.into())));
        self
    }

    /// Assign NULL to a scalar attribute.
    #[must_use]
    pub fn set_null(mut self, attribute: impl Into<String>) -> Self {
        self.assignments.push((attribute.into(), None));
        self
    }

    #[must_use]
    pub fn assignments(&self) -> &[(String, Option<Value>)] {
        &self.assignments
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Backend executor for compiled queries.
///
/// Implementations are expected to be stateless per call; the session or
/// connection they wrap is scoped by the caller. All errors surface as
/// [`SearchError::Backend`].
#[async_trait]
pub trait QueryRunner: Send + Sync {
    /// Materialized entity type.
    type Entity: Send;

    /// Phase 1: ordered primary-key window. Applies the full predicate and
    /// join plan, the compiled sort and the given window; deduplicates when
    /// the query says so.
    async fn project_keys(
        &self,
        query: &CompiledQuery,
        offset: u64,
        limit: Option<u64>,
    ) -> Result<Vec<EntityKey>, SearchError>;

    /// Phase 2: load entities for one key batch, fetch-joining only the
    /// query's admissible ToOne paths. Order of the returned pairs is not
    /// significant; the executor re-sorts by phase-1 key order.
    async fn load_entities(
        &self,
        query: &CompiledQuery,
        keys: &[EntityKey],
    ) -> Result<Vec<(EntityKey, Self::Entity)>, SearchError>;

    /// Phase 2, projection form: scalar attributes only.
    async fn load_projection(
        &self,
        query: &CompiledQuery,
        keys: &[EntityKey],
        projection: &Projection,
    ) -> Result<Vec<(EntityKey, ProjectionRow)>, SearchError>;

    /// Phase 3: `COUNT(DISTINCT pk)` over the phase-1 predicate and joins.
    async fn count_distinct_keys(&self, query: &CompiledQuery) -> Result<u64, SearchError>;

    /// Keyed batch update; returns the affected row count.
    async fn execute_update(
        &self,
        entity: &'static EntityDef,
        keys: &[EntityKey],
        update: &UpdateDescriptor,
    ) -> Result<u64, SearchError>;

    /// Keyed batch delete; returns the affected row count.
    async fn execute_delete(
        &self,
        entity: &'static EntityDef,
        keys: &[EntityKey],
    ) -> Result<u64, SearchError>;
}
