//! Statement builders: [`CompiledQuery`] -> `sea_query` statements.
//!
//! Pure functions producing the three protocol queries (key projection,
//! entity-by-key load, distinct-key count) plus keyed update/delete. A
//! runner renders these with its backend's query builder and executes them;
//! nothing here touches a connection.

use sea_orm::Value as DbValue;
use sea_orm::sea_query::{
    Alias, Condition, DeleteStatement, Expr, Func, JoinType, Order, Query, SelectStatement,
    UpdateStatement,
};

use searchkit::{CompileError, FieldKind, SortDirection, Value};

use crate::join::{JoinEdge, ROOT_ALIAS};
use crate::key::{EntityKey, KeyValue};
use crate::meta::{AttrDef, EntityDef, entity_at};
use crate::predicate::{CmpOp, ColumnRef, CompiledQuery, Predicate};
use crate::runner::UpdateDescriptor;

/// Convert a typed domain value into a bindable database value.
#[must_use]
pub fn value_to_db(value: &Value) -> DbValue {
    match value {
        Value::Bool(v) => DbValue::Bool(Some(*v)),
        Value::Char(v) => DbValue::Char(Some(*v)),
        Value::I64(v) => DbValue::BigInt(Some(*v)),
        Value::F64(v) => DbValue::Double(Some(*v)),
        Value::Decimal(v) => DbValue::Decimal(Some(Box::new(*v))),
        Value::String(v) => DbValue::String(Some(Box::new(v.clone()))),
        Value::Uuid(v) => DbValue::Uuid(Some(Box::new(*v))),
        Value::Date(v) => DbValue::ChronoDate(Some(Box::new(*v))),
        Value::Time(v) => DbValue::ChronoTime(Some(Box::new(*v))),
        Value::DateTime(v) => DbValue::ChronoDateTime(Some(Box::new(*v))),
        Value::DateTimeUtc(v) => DbValue::ChronoDateTimeUtc(Some(Box::new(*v))),
        Value::DateTimeFixed(v) => DbValue::ChronoDateTimeWithTimeZone(Some(Box::new(*v))),
    }
}

/// Typed NULL for an attribute kind, for update assignments.
#[must_use]
pub fn null_for_kind(kind: FieldKind) -> DbValue {
    match kind {
        FieldKind::String | FieldKind::Enum(_) => DbValue::String(None),
        FieldKind::Char => DbValue::Char(None),
        FieldKind::Bool => DbValue::Bool(None),
        FieldKind::I16 => DbValue::SmallInt(None),
        FieldKind::I32 => DbValue::Int(None),
        FieldKind::I64 | FieldKind::Year => DbValue::BigInt(None),
        FieldKind::F32 => DbValue::Float(None),
        FieldKind::F64 => DbValue::Double(None),
        FieldKind::Decimal => DbValue::Decimal(None),
        FieldKind::Uuid => DbValue::Uuid(None),
        FieldKind::Date | FieldKind::YearMonth => DbValue::ChronoDate(None),
        FieldKind::Time => DbValue::ChronoTime(None),
        FieldKind::DateTime => DbValue::ChronoDateTime(None),
        FieldKind::DateTimeUtc => DbValue::ChronoDateTimeUtc(None),
        FieldKind::DateTimeFixed => DbValue::ChronoDateTimeWithTimeZone(None),
    }
}

fn key_value_to_db(value: &KeyValue) -> DbValue {
    match value {
        KeyValue::I64(v) => DbValue::BigInt(Some(*v)),
        KeyValue::String(v) => DbValue::String(Some(Box::new(v.clone()))),
        KeyValue::Uuid(v) => DbValue::Uuid(Some(Box::new(*v))),
        KeyValue::DateTimeUtc(v) => DbValue::ChronoDateTimeUtc(Some(Box::new(*v))),
    }
}

fn col_expr(col: &ColumnRef) -> Expr {
    Expr::col((Alias::new(col.alias.as_str()), Alias::new(col.column.as_str())))
}

fn order_of(direction: SortDirection) -> Order {
    match direction {
        SortDirection::Asc => Order::Asc,
        SortDirection::Desc => Order::Desc,
    }
}

/// Render the predicate AST into a `sea_query` condition tree.
#[must_use]
pub fn predicate_condition(predicate: &Predicate) -> Condition {
    match predicate {
        Predicate::And(children) => children
            .iter()
            .fold(Condition::all(), |cond, child| cond.add(predicate_condition(child))),
        Predicate::Or(children) => children
            .iter()
            .fold(Condition::any(), |cond, child| cond.add(predicate_condition(child))),
        Predicate::Cmp { col, op, value } => {
            let lhs = col_expr(col);
            let value = value_to_db(value);
            let expr = match op {
                CmpOp::Eq => lhs.eq(value),
                CmpOp::Ne => lhs.ne(value),
                CmpOp::Gt => lhs.gt(value),
                CmpOp::Ge => lhs.gte(value),
                CmpOp::Lt => lhs.lt(value),
                CmpOp::Le => lhs.lte(value),
            };
            Condition::all().add(expr)
        }
        Predicate::Between {
            col,
            low,
            high,
            negated,
        } => {
            let lhs = col_expr(col);
            let expr = if *negated {
                lhs.not_between(value_to_db(low), value_to_db(high))
            } else {
                lhs.between(value_to_db(low), value_to_db(high))
            };
            Condition::all().add(expr)
        }
        Predicate::In {
            col,
            values,
            negated,
        } => {
            let bound: Vec<DbValue> = values.iter().map(value_to_db).collect();
            let lhs = col_expr(col);
            let expr = if *negated {
                lhs.is_not_in(bound)
            } else {
                lhs.is_in(bound)
            };
            Condition::all().add(expr)
        }
        Predicate::Like {
            col,
            pattern,
            negated,
        } => {
            // Case-insensitive on both sides; the pattern is pre-escaped.
            let expr = Expr::expr(Func::lower(col_expr(col))).like(pattern.to_lowercase());
            let cond = Condition::all().add(expr);
            if *negated { cond.not() } else { cond }
        }
        Predicate::IsNull { col, negated } => {
            let lhs = col_expr(col);
            let expr = if *negated {
                lhs.is_not_null()
            } else {
                lhs.is_null()
            };
            Condition::all().add(expr)
        }
    }
}

fn apply_joins<'a>(stmt: &mut SelectStatement, joins: impl IntoIterator<Item = &'a JoinEdge>) {
    for edge in joins {
        let mut on = Condition::all();
        for (source_col, target_col) in edge.on {
            on = on.add(
                Expr::col((Alias::new(edge.source_alias.as_str()), Alias::new(*source_col)))
                    .equals((Alias::new(edge.alias.as_str()), Alias::new(*target_col))),
            );
        }
        stmt.join_as(
            JoinType::LeftJoin,
            Alias::new(edge.table),
            Alias::new(edge.alias.as_str()),
            on,
        );
    }
}

fn root_from(stmt: &mut SelectStatement, def: &EntityDef) {
    stmt.from_as(Alias::new(def.table), Alias::new(ROOT_ALIAS));
}

/// Phase 1: ordered, windowed projection of the distinct primary-key tuple.
///
/// When the plan crosses a collection the projection is `DISTINCT`; sort
/// columns are then included in the select list to satisfy the SQL
/// `DISTINCT` / `ORDER BY` rule. Key decoding reads the primary-key columns
/// by index, so the extra columns are harmless.
#[must_use]
pub fn key_projection(query: &CompiledQuery, offset: u64, limit: Option<u64>) -> SelectStatement {
    let def = query.entity;
    let mut stmt = Query::select();
    root_from(&mut stmt, def);
    apply_joins(&mut stmt, &query.join_plan.joins);

    for attr in def.pk_attrs() {
        stmt.column((Alias::new(ROOT_ALIAS), Alias::new(attr.column)));
    }

    if query.distinct_keys {
        stmt.distinct();
        for item in &query.sort {
            let is_pk_col = item.col.alias == ROOT_ALIAS
                && def.pk_attrs().iter().any(|a| a.column == item.col.column);
            if !is_pk_col {
                stmt.column((
                    Alias::new(item.col.alias.as_str()),
                    Alias::new(item.col.column.as_str()),
                ));
            }
        }
    }

    if let Some(predicate) = &query.predicate {
        stmt.cond_where(predicate_condition(predicate));
    }

    for item in &query.sort {
        stmt.order_by(
            (
                Alias::new(item.col.alias.as_str()),
                Alias::new(item.col.column.as_str()),
            ),
            order_of(item.direction),
        );
    }

    if offset > 0 {
        stmt.offset(offset);
    }
    if let Some(limit) = limit {
        stmt.limit(limit);
    }
    stmt
}

/// Phase 3: `SELECT COUNT(*)` over the distinct key projection, with the
/// phase-1 join plan but no sort or window.
#[must_use]
pub fn count_keys(query: &CompiledQuery) -> SelectStatement {
    let def = query.entity;
    let mut inner = Query::select();
    root_from(&mut inner, def);
    apply_joins(&mut inner, &query.join_plan.joins);
    inner.distinct();
    for attr in def.pk_attrs() {
        inner.column((Alias::new(ROOT_ALIAS), Alias::new(attr.column)));
    }
    if let Some(predicate) = &query.predicate {
        inner.cond_where(predicate_condition(predicate));
    }

    let mut outer = Query::select();
    outer.expr(Expr::cust("COUNT(*)"));
    outer.from_subquery(inner, Alias::new("pk_keys"));
    outer
}

/// `WHERE` clause addressing a batch of primary keys: a plain `IN` list for
/// single-attribute keys, a disjunction of tuple equalities for composite
/// keys. An empty batch yields an always-false condition.
///
/// # Errors
/// Returns [`CompileError`] when a key's arity does not match the entity's
/// primary-key attribute list.
pub fn key_in_condition(
    def: &EntityDef,
    alias: Option<&str>,
    keys: &[EntityKey],
) -> Result<Condition, CompileError> {
    let pk = def.pk_attrs();
    let column = |name: &str| match alias {
        Some(a) => Expr::col((Alias::new(a), Alias::new(name))),
        None => Expr::col(Alias::new(name)),
    };

    if keys.is_empty() {
        return Ok(Condition::all().add(Expr::cust("1=0")));
    }

    if let [single] = pk {
        let mut bound = Vec::with_capacity(keys.len());
        for key in keys {
            let [value] = key.0.as_slice() else {
                return Err(CompileError::new(format!(
                    "key arity {} does not match primary key of {}",
                    key.len(),
                    def.name
                )));
            };
            bound.push(key_value_to_db(value));
        }
        return Ok(Condition::all().add(column(single.column).is_in(bound)));
    }

    let mut any = Condition::any();
    for key in keys {
        if key.len() != pk.len() {
            return Err(CompileError::new(format!(
                "key arity {} does not match primary key of {}",
                key.len(),
                def.name
            )));
        }
        let mut all = Condition::all();
        for (attr, value) in pk.iter().zip(&key.0) {
            all = all.add(column(attr.column).eq(key_value_to_db(value)));
        }
        any = any.add(all);
    }
    Ok(any)
}

/// Phase 2: load full entity rows for a key batch, fetch-joining only the
/// admissible ToOne paths. Joined columns are exposed as
/// `{alias}_{column}`. Never joins a collection.
///
/// # Errors
/// Returns [`CompileError`] on key arity mismatches or inconsistent plans.
pub fn load_by_keys(
    query: &CompiledQuery,
    keys: &[EntityKey],
) -> Result<SelectStatement, CompileError> {
    let def = query.entity;
    let mut stmt = Query::select();
    root_from(&mut stmt, def);

    let fetch_edges: Vec<&JoinEdge> = query
        .join_plan
        .joins
        .iter()
        .filter(|edge| {
            query.fetch_paths.iter().any(|fetch| {
                fetch.path == edge.path || fetch.path.starts_with(&format!("{}.", edge.path))
            })
        })
        .collect();
    apply_joins(&mut stmt, fetch_edges.iter().copied());

    for attr in def.pk_attrs() {
        stmt.column((Alias::new(ROOT_ALIAS), Alias::new(attr.column)));
    }
    for attr in def.attributes {
        let is_pk = def.pk_attrs().iter().any(|pk| pk.column == attr.column);
        if !is_pk {
            stmt.column((Alias::new(ROOT_ALIAS), Alias::new(attr.column)));
        }
    }
    for fetch in &query.fetch_paths {
        let alias = query
            .join_plan
            .alias_for(&fetch.path)
            .ok_or_else(|| {
                CompileError::new(format!("no join alias for fetch path {:?}", fetch.path))
            })?
            .to_owned();
        let target = entity_at(def, &fetch.path)?;
        for attr in target.attributes {
            stmt.expr_as(
                Expr::col((Alias::new(alias.as_str()), Alias::new(attr.column))),
                Alias::new(format!("{alias}_{}", attr.column)),
            );
        }
    }

    stmt.cond_where(key_in_condition(def, Some(ROOT_ALIAS), keys)?);

    // Phase-1 order, restricted to aliases present in this statement; the
    // executor re-sorts by key order anyway, this only helps single-batch
    // streaming consumers.
    let available: Vec<&str> = std::iter::once(ROOT_ALIAS)
        .chain(fetch_edges.iter().map(|edge| edge.alias.as_str()))
        .collect();
    for item in &query.sort {
        if available.contains(&item.col.alias.as_str()) {
            stmt.order_by(
                (
                    Alias::new(item.col.alias.as_str()),
                    Alias::new(item.col.column.as_str()),
                ),
                order_of(item.direction),
            );
        }
    }

    Ok(stmt)
}

/// Phase 2 (projection form): scalar root attributes only.
///
/// # Errors
/// Returns [`CompileError`] on key arity mismatches.
pub fn projection_by_keys(
    query: &CompiledQuery,
    keys: &[EntityKey],
    attrs: &[&'static AttrDef],
) -> Result<SelectStatement, CompileError> {
    let def = query.entity;
    let mut stmt = Query::select();
    root_from(&mut stmt, def);
    for attr in def.pk_attrs() {
        stmt.column((Alias::new(ROOT_ALIAS), Alias::new(attr.column)));
    }
    for attr in attrs {
        stmt.column((Alias::new(ROOT_ALIAS), Alias::new(attr.column)));
    }
    stmt.cond_where(key_in_condition(def, Some(ROOT_ALIAS), keys)?);
    Ok(stmt)
}

/// Keyed batch update. Assignments address scalar root attributes; `None`
/// writes a typed NULL.
///
/// # Errors
/// Returns [`CompileError`] for unknown attributes or key arity mismatches.
pub fn update_by_keys(
    def: &EntityDef,
    keys: &[EntityKey],
    update: &UpdateDescriptor,
) -> Result<UpdateStatement, CompileError> {
    let mut stmt = Query::update();
    stmt.table(Alias::new(def.table));
    for (attr_name, value) in update.assignments() {
        let attr = def.attribute(attr_name).ok_or_else(|| {
            CompileError::new(format!(
                "unknown attribute {attr_name:?} on entity {}",
                def.name
            ))
        })?;
        let bound = match value {
            Some(v) => value_to_db(v),
            None => null_for_kind(attr.kind),
        };
        stmt.value(Alias::new(attr.column), bound);
    }
    stmt.cond_where(key_in_condition(def, None, keys)?);
    Ok(stmt)
}

/// Keyed batch delete.
///
/// # Errors
/// Returns [`CompileError`] on key arity mismatches.
pub fn delete_by_keys(def: &EntityDef, keys: &[EntityKey]) -> Result<DeleteStatement, CompileError> {
    let mut stmt = Query::delete();
    stmt.from_table(Alias::new(def.table));
    stmt.cond_where(key_in_condition(def, None, keys)?);
    Ok(stmt)
}
