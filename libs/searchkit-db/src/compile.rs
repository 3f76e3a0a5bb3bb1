//! Specification compiler: validated condition -> [`CompiledQuery`].
//!
//! Responsibilities:
//! - collect every entity path referenced by conditions, sort and fetch
//!   fields, and classify it through the metadata adapter;
//! - build one join plan for all of them;
//! - walk the condition tree depth-first into the predicate AST, preserving
//!   group boundaries;
//! - resolve the sort and unconditionally append the primary-key attributes
//!   (in declared order, ascending) as final tiebreaks;
//! - restrict the fetch graph to ToOne paths, dropping ToMany entries with a
//!   structured warning.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use searchkit::{
    CompileError, LogicalOp, SearchError, SearchOperator, SortDirection, ValidatedCondition,
    ValidatedLeaf, ValidatedNode, Value,
};

use crate::join::{JoinPlan, join_plan_for};
use crate::meta::{EntityDef, ResolvedPath, SearchEntity, classify_path};
use crate::predicate::{
    CmpOp, ColumnRef, CompiledQuery, Predicate, SortItem, like_contains, like_ends, like_starts,
};

/// Compile a validated condition for entity `E`.
///
/// # Errors
/// Returns [`SearchError::Compile`] for internal inconsistencies (bad
/// descriptor paths, malformed validated trees). User-caused failures were
/// already rejected during validation.
pub fn compile<E: SearchEntity>(validated: &ValidatedCondition) -> Result<CompiledQuery, SearchError> {
    compile_for(E::def(), validated)
}

/// Non-generic compilation entry point.
///
/// # Errors
/// See [`compile`].
pub fn compile_for(
    def: &'static EntityDef,
    validated: &ValidatedCondition,
) -> Result<CompiledQuery, SearchError> {
    let mut resolver = PathResolver::new(def);

    // Filter + sort paths participate in the phase-1 join plan.
    collect_leaf_paths(&validated.nodes, &mut resolver)?;
    for sort in &validated.sort {
        resolver.resolve(&sort.path)?;
    }

    // Fetch graph: requested paths plus ToOne prefixes referenced by the
    // predicate or sort; ToMany entries are ignored with a warning.
    let fetch_paths = admissible_fetch_paths(def, validated, &resolver)?;
    let mut plan_paths: Vec<Arc<ResolvedPath>> = resolver.all();
    plan_paths.extend(fetch_paths.iter().cloned());

    let join_plan = join_plan_for(def, &plan_paths)?;

    let predicate = compile_nodes(&validated.nodes, &resolver, &join_plan)?;

    let mut sort = Vec::with_capacity(validated.sort.len() + def.pk_attrs().len());
    for order in &validated.sort {
        let resolved = resolver.resolve(&order.path)?;
        sort.push(SortItem {
            col: column_ref(&resolved, &join_plan)?,
            direction: order.direction,
        });
    }
    append_pk_tiebreak(def, &mut sort);

    let distinct_keys = resolver.any_to_many();

    Ok(CompiledQuery {
        entity: def,
        predicate,
        join_plan,
        sort,
        page: validated.page,
        size: validated.size,
        fetch_paths,
        distinct_keys,
    })
}

/// Append the full primary-key attribute list, ascending, unless an
/// attribute is already present in the sort. This turns any user sort into a
/// strict total order, which page-boundary stability depends on.
fn append_pk_tiebreak(def: &'static EntityDef, sort: &mut Vec<SortItem>) {
    for attr in def.pk_attrs() {
        let present = sort
            .iter()
            .any(|item| item.col.alias == crate::join::ROOT_ALIAS && item.col.column == attr.column);
        if !present {
            sort.push(SortItem {
                col: ColumnRef {
                    path: attr.name.to_owned(),
                    alias: crate::join::ROOT_ALIAS.to_owned(),
                    column: attr.column.to_owned(),
                },
                direction: SortDirection::Asc,
            });
        }
    }
}

/// Resolves and memoizes paths for one compilation, tracking whether any of
/// them crosses a collection.
struct PathResolver {
    def: &'static EntityDef,
    resolved: HashMap<String, Arc<ResolvedPath>>,
    any_to_many: bool,
}

impl PathResolver {
    fn new(def: &'static EntityDef) -> Self {
        Self {
            def,
            resolved: HashMap::new(),
            any_to_many: false,
        }
    }

    fn resolve(&mut self, path: &str) -> Result<Arc<ResolvedPath>, CompileError> {
        if let Some(hit) = self.resolved.get(path) {
            return Ok(Arc::clone(hit));
        }
        let resolved = classify_path(self.def, path)?;
        if resolved.crosses_to_many() {
            self.any_to_many = true;
        }
        self.resolved.insert(path.to_owned(), Arc::clone(&resolved));
        Ok(resolved)
    }

    fn get(&self, path: &str) -> Result<Arc<ResolvedPath>, CompileError> {
        self.resolved
            .get(path)
            .cloned()
            .ok_or_else(|| CompileError::new(format!("unresolved path {path:?}")))
    }

    fn all(&self) -> Vec<Arc<ResolvedPath>> {
        self.resolved.values().cloned().collect()
    }

    fn any_to_many(&self) -> bool {
        self.any_to_many
    }
}

fn collect_leaf_paths(
    nodes: &[ValidatedNode],
    resolver: &mut PathResolver,
) -> Result<(), CompileError> {
    for node in nodes {
        match node {
            ValidatedNode::Leaf(leaf) => {
                resolver.resolve(&leaf.entity_path)?;
            }
            ValidatedNode::Group { nodes, .. } => collect_leaf_paths(nodes, resolver)?,
        }
    }
    Ok(())
}

fn admissible_fetch_paths(
    def: &'static EntityDef,
    validated: &ValidatedCondition,
    resolver: &PathResolver,
) -> Result<Vec<Arc<ResolvedPath>>, SearchError> {
    let mut out: Vec<Arc<ResolvedPath>> = Vec::new();
    let mut push = |p: Arc<ResolvedPath>| {
        if !out.iter().any(|existing| existing.path == p.path) {
            out.push(p);
        }
    };

    for path in &validated.fetch_paths {
        let resolved = classify_path(def, path)?;
        if resolved.leaf.is_some() {
            warn!(path = %path, "fetch field does not address an association; ignored");
            continue;
        }
        if resolved.crosses_to_many() {
            warn!(path = %path, "fetch field crosses a collection; ignored to avoid row multiplication");
            continue;
        }
        push(resolved);
    }

    // ToOne prefixes touched by the predicate or sort are materialized in
    // phase 2 as well, so the loaded graph is self-consistent.
    for resolved in resolver.all() {
        if resolved.hops.is_empty() || resolved.crosses_to_many() {
            continue;
        }
        let mut prefix = String::new();
        for hop in &resolved.hops {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(&hop.name);
            push(classify_path(def, &prefix)?);
        }
    }

    // Deterministic order keeps generated statements stable.
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}

fn compile_nodes(
    nodes: &[ValidatedNode],
    resolver: &PathResolver,
    plan: &JoinPlan,
) -> Result<Option<Predicate>, SearchError> {
    let mut acc: Option<Predicate> = None;
    for node in nodes {
        let compiled = match node {
            ValidatedNode::Leaf(leaf) => compile_leaf(leaf, resolver, plan)?,
            ValidatedNode::Group { nodes, .. } => compile_nodes(nodes, resolver, plan)?
                .ok_or_else(|| CompileError::new("empty group survived validation"))?,
        };
        let connector = node.connector().unwrap_or(LogicalOp::And);
        acc = Some(match acc {
            None => compiled,
            Some(prev) => join_predicates(prev, connector, compiled),
        });
    }
    Ok(acc)
}

/// Left-to-right fold; runs of the same connector collapse into one
/// `And`/`Or` node so sibling chains stay flat.
fn join_predicates(prev: Predicate, connector: LogicalOp, next: Predicate) -> Predicate {
    match (connector, prev) {
        (LogicalOp::And, Predicate::And(mut children)) => {
            children.push(next);
            Predicate::And(children)
        }
        (LogicalOp::And, prev) => Predicate::And(vec![prev, next]),
        (LogicalOp::Or, Predicate::Or(mut children)) => {
            children.push(next);
            Predicate::Or(children)
        }
        (LogicalOp::Or, prev) => Predicate::Or(vec![prev, next]),
    }
}

fn column_ref(resolved: &ResolvedPath, plan: &JoinPlan) -> Result<ColumnRef, CompileError> {
    let leaf = resolved.leaf.as_ref().ok_or_else(|| {
        CompileError::new(format!("path {:?} does not address an attribute", resolved.path))
    })?;
    let assoc_path = resolved.association_path();
    let alias = plan.alias_for(&assoc_path).ok_or_else(|| {
        CompileError::new(format!("no join alias for association path {assoc_path:?}"))
    })?;
    Ok(ColumnRef {
        path: resolved.path.clone(),
        alias: alias.to_owned(),
        column: leaf.column.clone(),
    })
}

fn compile_leaf(
    leaf: &ValidatedLeaf,
    resolver: &PathResolver,
    plan: &JoinPlan,
) -> Result<Predicate, SearchError> {
    let resolved = resolver.get(&leaf.entity_path)?;
    let col = column_ref(&resolved, plan)?;

    let single = || -> Result<Value, CompileError> {
        leaf.values
            .first()
            .cloned()
            .ok_or_else(|| CompileError::new("missing comparison value"))
    };
    let pattern_text = || -> Result<String, CompileError> {
        let value = single()?;
        match value.as_str() {
            Some(s) => Ok(s.to_owned()),
            None => Err(CompileError::new(format!(
                "pattern operator requires a string value, got {}",
                value.type_name()
            ))),
        }
    };
    let pair = || -> Result<(Value, Value), CompileError> {
        match leaf.values.as_slice() {
            [low, high] => Ok((low.clone(), high.clone())),
            _ => Err(CompileError::new("range operator requires two values")),
        }
    };

    let predicate = match leaf.operator {
        SearchOperator::Equals => cmp(col, CmpOp::Eq, single()?),
        SearchOperator::NotEquals => cmp(col, CmpOp::Ne, single()?),
        SearchOperator::GreaterThan => cmp(col, CmpOp::Gt, single()?),
        SearchOperator::GreaterThanOrEqualTo => cmp(col, CmpOp::Ge, single()?),
        SearchOperator::LessThan => cmp(col, CmpOp::Lt, single()?),
        SearchOperator::LessThanOrEqualTo => cmp(col, CmpOp::Le, single()?),
        SearchOperator::Between | SearchOperator::NotBetween => {
            let (low, high) = pair()?;
            Predicate::Between {
                col,
                low,
                high,
                negated: leaf.operator.is_negated(),
            }
        }
        SearchOperator::In | SearchOperator::NotIn => Predicate::In {
            col,
            values: leaf.values.clone(),
            negated: leaf.operator.is_negated(),
        },
        SearchOperator::Contains | SearchOperator::NotContains => Predicate::Like {
            col,
            pattern: like_contains(&pattern_text()?),
            negated: leaf.operator.is_negated(),
        },
        SearchOperator::StartsWith | SearchOperator::NotStartsWith => Predicate::Like {
            col,
            pattern: like_starts(&pattern_text()?),
            negated: leaf.operator.is_negated(),
        },
        SearchOperator::EndsWith | SearchOperator::NotEndsWith => Predicate::Like {
            col,
            pattern: like_ends(&pattern_text()?),
            negated: leaf.operator.is_negated(),
        },
        SearchOperator::IsNull | SearchOperator::IsNotNull => Predicate::IsNull {
            col,
            negated: leaf.operator.is_negated(),
        },
    };
    Ok(predicate)
}

fn cmp(col: ColumnRef, op: CmpOp, value: Value) -> Predicate {
    Predicate::Cmp { col, op, value }
}
