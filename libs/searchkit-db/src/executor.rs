//! Two-phase query executor.
//!
//! `find_page` always runs the three-query protocol:
//!
//! 1. **Key projection**: distinct primary keys under the full predicate,
//!    sort (with PK tiebreak) and page window. An empty result short-circuits
//!    to an empty page.
//! 2. **Entity materialization**: entities by key, in `MAX_IN_CLAUSE`
//!    batches, re-sorted to phase 1's key order. ToOne paths may be
//!    fetch-joined; collections never are, so the parent set is not
//!    multiplied.
//! 3. **Count**: a separate `COUNT(DISTINCT pk)` with the same joins.
//!
//! Keys that vanish between phases 1 and 2 (concurrent delete) degrade the
//! page instead of failing it: the surviving subset is returned with
//! `integrity_degraded` set and a warning logged.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use searchkit::{Page, SearchError};

use crate::key::EntityKey;
use crate::predicate::CompiledQuery;
use crate::runner::{Projection, ProjectionRow, QueryRunner, UpdateDescriptor};

/// Maximum number of keys per `IN` clause; larger key sets are split into
/// batches and re-sorted afterwards.
pub const MAX_IN_CLAUSE: usize = 500;

/// Per-call execution options.
#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    /// Upper bound applied to each phase independently.
    pub phase_timeout: Option<Duration>,
}

async fn timed<T>(
    fut: impl Future<Output = Result<T, SearchError>>,
    timeout: Option<Duration>,
    phase: &str,
) -> Result<T, SearchError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| SearchError::Backend(format!("{phase} query timed out")))?,
        None => fut.await,
    }
}

/// Restore phase 1's key ordering over materialized rows. Returns the
/// ordered rows plus the number of keys that vanished in between.
fn reorder_by_keys<T>(keys: &[EntityKey], rows: Vec<(EntityKey, T)>) -> (Vec<T>, usize) {
    let mut by_key: HashMap<EntityKey, T> = rows.into_iter().collect();
    let mut content = Vec::with_capacity(keys.len());
    let mut missing = 0;
    for key in keys {
        match by_key.remove(key) {
            Some(row) => content.push(row),
            None => missing += 1,
        }
    }
    (content, missing)
}

fn assemble_page<T>(
    query: &CompiledQuery,
    content: Vec<T>,
    total: u64,
    missing: usize,
    expected: usize,
) -> Page<T> {
    let mut page = Page::new(content, query.page, query.size, total);
    if missing > 0 {
        warn!(
            entity = query.entity.name,
            expected,
            missing,
            "entity rows vanished between key projection and materialization"
        );
        page.integrity_degraded = true;
    }
    page
}

/// Execute the full three-query protocol and assemble a page.
///
/// # Errors
/// Propagates [`SearchError::Backend`] from the runner unchanged; never
/// raises validation or parse errors (those were handled upstream).
pub async fn find_page<R: QueryRunner>(
    runner: &R,
    query: &CompiledQuery,
    options: &SearchOptions,
) -> Result<Page<R::Entity>, SearchError> {
    let offset = query.page.saturating_mul(query.size);

    let keys = timed(
        runner.project_keys(query, offset, Some(query.size)),
        options.phase_timeout,
        "key projection",
    )
    .await?;
    debug!(
        entity = query.entity.name,
        keys = keys.len(),
        page = query.page,
        size = query.size,
        "projected key window"
    );

    if keys.is_empty() {
        return Ok(Page::empty(query.page, query.size));
    }

    let mut loaded = Vec::with_capacity(keys.len());
    for batch in keys.chunks(MAX_IN_CLAUSE) {
        let rows = timed(
            runner.load_entities(query, batch),
            options.phase_timeout,
            "entity load",
        )
        .await?;
        loaded.extend(rows);
    }
    let (content, missing) = reorder_by_keys(&keys, loaded);

    let total = timed(
        runner.count_distinct_keys(query),
        options.phase_timeout,
        "count",
    )
    .await?;

    Ok(assemble_page(query, content, total, missing, keys.len()))
}

/// Projection variant of [`find_page`]: phase 2 loads scalar attribute rows
/// instead of entities.
///
/// # Errors
/// See [`find_page`].
pub async fn find_projection_page<R: QueryRunner>(
    runner: &R,
    query: &CompiledQuery,
    projection: &Projection,
    options: &SearchOptions,
) -> Result<Page<ProjectionRow>, SearchError> {
    let offset = query.page.saturating_mul(query.size);

    let keys = timed(
        runner.project_keys(query, offset, Some(query.size)),
        options.phase_timeout,
        "key projection",
    )
    .await?;

    if keys.is_empty() {
        return Ok(Page::empty(query.page, query.size));
    }

    let mut loaded = Vec::with_capacity(keys.len());
    for batch in keys.chunks(MAX_IN_CLAUSE) {
        let rows = timed(
            runner.load_projection(query, batch, projection),
            options.phase_timeout,
            "projection load",
        )
        .await?;
        loaded.extend(rows);
    }
    let (content, missing) = reorder_by_keys(&keys, loaded);

    let total = timed(
        runner.count_distinct_keys(query),
        options.phase_timeout,
        "count",
    )
    .await?;

    Ok(assemble_page(query, content, total, missing, keys.len()))
}

/// Phase 1 without a page window: matching keys in order, optionally
/// bounded. Used by `find_one` (limit 1) and by keyed update/delete.
///
/// # Errors
/// Propagates runner failures.
pub async fn collect_keys<R: QueryRunner>(
    runner: &R,
    query: &CompiledQuery,
    limit: Option<u64>,
    options: &SearchOptions,
) -> Result<Vec<EntityKey>, SearchError> {
    timed(
        runner.project_keys(query, 0, limit),
        options.phase_timeout,
        "key projection",
    )
    .await
}

/// Load one entity by a phase-1 key, if it still exists.
///
/// # Errors
/// Propagates runner failures.
pub async fn load_one<R: QueryRunner>(
    runner: &R,
    query: &CompiledQuery,
    key: EntityKey,
    options: &SearchOptions,
) -> Result<Option<R::Entity>, SearchError> {
    let keys = vec![key];
    let mut rows = timed(
        runner.load_entities(query, &keys),
        options.phase_timeout,
        "entity load",
    )
    .await?;
    Ok(rows.pop().map(|(_, entity)| entity))
}

/// Batched update over a key set; returns the affected row count.
///
/// # Errors
/// Propagates runner failures.
pub async fn update_by_keys<R: QueryRunner>(
    runner: &R,
    query: &CompiledQuery,
    keys: &[EntityKey],
    update: &UpdateDescriptor,
    options: &SearchOptions,
) -> Result<u64, SearchError> {
    let mut affected = 0;
    for batch in keys.chunks(MAX_IN_CLAUSE) {
        affected += timed(
            runner.execute_update(query.entity, batch, update),
            options.phase_timeout,
            "update",
        )
        .await?;
    }
    Ok(affected)
}

/// Batched delete over a key set; returns the affected row count.
///
/// # Errors
/// Propagates runner failures.
pub async fn delete_by_keys<R: QueryRunner>(
    runner: &R,
    query: &CompiledQuery,
    keys: &[EntityKey],
    options: &SearchOptions,
) -> Result<u64, SearchError> {
    let mut affected = 0;
    for batch in keys.chunks(MAX_IN_CLAUSE) {
        affected += timed(
            runner.execute_delete(query.entity, batch),
            options.phase_timeout,
            "delete",
        )
        .await?;
    }
    Ok(affected)
}
