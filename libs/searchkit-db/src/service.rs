//! Service facade: the public entry point over a query runner.
//!
//! The facade revalidates every incoming condition (wire-decoded trees have
//! not gone through the builder), compiles it for the bound entity, and
//! drives the executor. Updates and deletes never issue predicate-addressed
//! DML: the predicate may cross collection joins, so they always collect
//! keys first and run keyed batches.

use std::marker::PhantomData;
use std::time::Duration;

use searchkit::{CompileError, Page, SearchCondition, SearchError, SearchableDto, validate};

use crate::compile::compile_for;
use crate::executor::{self, SearchOptions};
use crate::meta::SearchEntity;
use crate::runner::{Projection, ProjectionRow, QueryRunner, UpdateDescriptor};

/// Search service for one entity type over a query runner.
pub struct SearchService<E, R> {
    runner: R,
    options: SearchOptions,
    _entity: PhantomData<fn() -> E>,
}

impl<E, R> SearchService<E, R>
where
    E: SearchEntity,
    R: QueryRunner,
{
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            options: SearchOptions::default(),
            _entity: PhantomData,
        }
    }

    /// Bound each executor phase independently.
    #[must_use]
    pub fn with_phase_timeout(mut self, timeout: Duration) -> Self {
        self.options.phase_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Find a page of entities matching the condition.
    ///
    /// # Errors
    /// [`SearchError::Validation`] / [`SearchError::Parse`] for invalid
    /// conditions, [`SearchError::Backend`] from the runner.
    pub async fn find_all<D: SearchableDto>(
        &self,
        condition: &SearchCondition<D>,
    ) -> Result<Page<R::Entity>, SearchError> {
        let validated = validate(condition)?;
        let query = compile_for(E::def(), &validated)?;
        executor::find_page(&self.runner, &query, &self.options).await
    }

    /// Find the first matching entity under the condition's sort.
    ///
    /// # Errors
    /// See [`find_all`](Self::find_all).
    pub async fn find_one<D: SearchableDto>(
        &self,
        condition: &SearchCondition<D>,
    ) -> Result<Option<R::Entity>, SearchError> {
        let validated = validate(condition)?;
        let query = compile_for(E::def(), &validated)?;
        let mut keys =
            executor::collect_keys(&self.runner, &query, Some(1), &self.options).await?;
        match keys.pop() {
            Some(key) => executor::load_one(&self.runner, &query, key, &self.options).await,
            None => Ok(None),
        }
    }

    /// Find a page of scalar projections instead of full entities.
    ///
    /// Only root scalar attributes may be projected; association-typed
    /// entries are rejected at compile time.
    ///
    /// # Errors
    /// See [`find_all`](Self::find_all); additionally
    /// [`SearchError::Compile`] for non-scalar projection attributes.
    pub async fn find_all_projected<D: SearchableDto>(
        &self,
        condition: &SearchCondition<D>,
        projection: &Projection,
    ) -> Result<Page<ProjectionRow>, SearchError> {
        let def = E::def();
        for attr in projection.attributes() {
            if def.attribute(attr).is_none() {
                return Err(CompileError::new(format!(
                    "projection attribute {attr:?} is not a scalar attribute of {}",
                    def.name
                ))
                .into());
            }
        }
        let validated = validate(condition)?;
        let query = compile_for(def, &validated)?;
        executor::find_projection_page(&self.runner, &query, projection, &self.options).await
    }

    /// Update every matching row through keyed batches; returns the affected
    /// count.
    ///
    /// # Errors
    /// See [`find_all`](Self::find_all); additionally
    /// [`SearchError::Compile`] for unknown update attributes.
    pub async fn update_with<D: SearchableDto>(
        &self,
        condition: &SearchCondition<D>,
        update: &UpdateDescriptor,
    ) -> Result<u64, SearchError> {
        let def = E::def();
        for (attr, _) in update.assignments() {
            if def.attribute(attr).is_none() {
                return Err(CompileError::new(format!(
                    "update attribute {attr:?} is not a scalar attribute of {}",
                    def.name
                ))
                .into());
            }
        }
        let validated = validate(condition)?;
        let query = compile_for(def, &validated)?;
        let keys = executor::collect_keys(&self.runner, &query, None, &self.options).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        executor::update_by_keys(&self.runner, &query, &keys, update, &self.options).await
    }

    /// Delete every matching row through keyed batches; returns the affected
    /// count.
    ///
    /// # Errors
    /// See [`find_all`](Self::find_all).
    pub async fn delete_with<D: SearchableDto>(
        &self,
        condition: &SearchCondition<D>,
    ) -> Result<u64, SearchError> {
        let validated = validate(condition)?;
        let query = compile_for(E::def(), &validated)?;
        let keys = executor::collect_keys(&self.runner, &query, None, &self.options).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        executor::delete_by_keys(&self.runner, &query, &keys, &self.options).await
    }
}
