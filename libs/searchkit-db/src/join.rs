//! Join planning: the minimal tree of left-outer joins addressing a set of
//! resolved paths, with one alias per association prefix.

use std::collections::BTreeSet;
use std::sync::Arc;

use searchkit::CompileError;

use crate::meta::{AssocKind, EntityDef, ResolvedPath, entity_at};

/// Alias of the root entity in every generated statement.
pub const ROOT_ALIAS: &str = "t0";

/// One left-outer join edge of the plan.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinEdge {
    /// Dotted association path from the root (e.g. `author.profile`).
    pub path: String,
    /// Alias assigned to the joined table.
    pub alias: String,
    /// Alias of the join source (the root or a previous edge).
    pub source_alias: String,
    pub table: &'static str,
    /// Join column pairs: `(source column, target column)`.
    pub on: &'static [(&'static str, &'static str)],
    pub kind: AssocKind,
}

/// The ordered join tree for one compiled query. Paths sharing a prefix
/// share that prefix's alias.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JoinPlan {
    pub joins: Vec<JoinEdge>,
}

impl JoinPlan {
    /// Alias serving a dotted association path; the empty path is the root.
    #[must_use]
    pub fn alias_for(&self, assoc_path: &str) -> Option<&str> {
        if assoc_path.is_empty() {
            return Some(ROOT_ALIAS);
        }
        self.joins
            .iter()
            .find(|j| j.path == assoc_path)
            .map(|j| j.alias.as_str())
    }
}

/// Build the minimal join plan covering every association prefix of the
/// given paths. Aliases are deterministic (`t1`, `t2`, ... in sorted prefix
/// order), so compiled queries are stable.
///
/// # Errors
/// Returns [`CompileError`] when a path references an unknown association.
pub fn join_plan_for(
    def: &'static EntityDef,
    paths: &[Arc<ResolvedPath>],
) -> Result<JoinPlan, CompileError> {
    let mut prefixes = BTreeSet::new();
    for path in paths {
        let mut acc = String::new();
        for hop in &path.hops {
            if !acc.is_empty() {
                acc.push('.');
            }
            acc.push_str(&hop.name);
            prefixes.insert(acc.clone());
        }
    }

    let mut plan = JoinPlan::default();
    for (i, prefix) in prefixes.iter().enumerate() {
        let (parent_prefix, assoc_name) = match prefix.rsplit_once('.') {
            Some((parent, name)) => (parent, name),
            None => ("", prefix.as_str()),
        };
        let source_alias = plan
            .alias_for(parent_prefix)
            .ok_or_else(|| {
                CompileError::new(format!("join plan is missing prefix {parent_prefix:?}"))
            })?
            .to_owned();
        let source = entity_at(def, parent_prefix)?;
        let assoc = source.association(assoc_name).ok_or_else(|| {
            CompileError::new(format!(
                "unknown association {assoc_name:?} on entity {}",
                source.name
            ))
        })?;
        plan.joins.push(JoinEdge {
            path: prefix.clone(),
            alias: format!("t{}", i + 1),
            source_alias,
            table: (assoc.target)().table,
            on: assoc.columns,
            kind: assoc.kind,
        });
    }
    Ok(plan)
}
