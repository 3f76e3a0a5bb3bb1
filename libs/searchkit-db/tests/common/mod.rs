//! Shared fixtures: a small blog-style schema (post -> author -> profile,
//! post -> tags), a composite-key entity, DTO descriptor tables and an
//! in-memory query runner that evaluates compiled predicates against rows.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use searchkit::{
    FieldDescriptor, FieldKind, SearchCondition, SearchError, SearchOperator, SearchableDto,
    SortDirection, Value, validate,
};
use searchkit_db::{
    AssocDef, AssocKind, AttrDef, CmpOp, CompiledQuery, EntityDef, EntityKey, KeyValue, Predicate,
    PrimaryKeyDef, Projection, ProjectionRow, QueryRunner, SearchEntity, UpdateDescriptor,
    compile_for,
};

// ---------------------------------------------------------------- schema --

pub static PROFILE: EntityDef = EntityDef {
    name: "profile",
    table: "profile",
    pk: PrimaryKeyDef::Columns(&[AttrDef::new("id", "id", FieldKind::I64)]),
    attributes: &[
        AttrDef::new("id", "id", FieldKind::I64),
        AttrDef::new("department", "department", FieldKind::String),
    ],
    associations: &[],
};

fn profile_def() -> &'static EntityDef {
    &PROFILE
}

pub static AUTHOR: EntityDef = EntityDef {
    name: "author",
    table: "author",
    pk: PrimaryKeyDef::Columns(&[AttrDef::new("id", "id", FieldKind::I64)]),
    attributes: &[
        AttrDef::new("id", "id", FieldKind::I64),
        AttrDef::new("name", "name", FieldKind::String),
        AttrDef::new("profile_id", "profile_id", FieldKind::I64),
    ],
    associations: &[AssocDef::new(
        "profile",
        AssocKind::ToOne,
        profile_def,
        &[("profile_id", "id")],
    )],
};

fn author_def() -> &'static EntityDef {
    &AUTHOR
}

pub static TAG: EntityDef = EntityDef {
    name: "tag",
    table: "tag",
    pk: PrimaryKeyDef::Columns(&[AttrDef::new("id", "id", FieldKind::I64)]),
    attributes: &[
        AttrDef::new("id", "id", FieldKind::I64),
        AttrDef::new("name", "name", FieldKind::String),
        AttrDef::new("post_id", "post_id", FieldKind::I64),
    ],
    associations: &[],
};

fn tag_def() -> &'static EntityDef {
    &TAG
}

pub static POST: EntityDef = EntityDef {
    name: "post",
    table: "post",
    pk: PrimaryKeyDef::Columns(&[AttrDef::new("id", "id", FieldKind::I64)]),
    attributes: &[
        AttrDef::new("id", "id", FieldKind::I64),
        AttrDef::new("title", "title", FieldKind::String),
        AttrDef::new("created_at", "created_at", FieldKind::DateTime),
        AttrDef::new("age", "age", FieldKind::I64),
        AttrDef::new("score", "score", FieldKind::F64),
        AttrDef::new("author_id", "author_id", FieldKind::I64),
    ],
    associations: &[
        AssocDef::new("author", AssocKind::ToOne, author_def, &[("author_id", "id")]),
        AssocDef::new("tags", AssocKind::ToMany, tag_def, &[("id", "post_id")]),
    ],
};

pub struct Post;

impl SearchEntity for Post {
    fn def() -> &'static EntityDef {
        &POST
    }
}

pub static ORDER_LINE: EntityDef = EntityDef {
    name: "order_line",
    table: "order_line",
    pk: PrimaryKeyDef::Embedded {
        name: "key",
        attrs: &[
            AttrDef::new("order_id", "order_id", FieldKind::I64),
            AttrDef::new("line_no", "line_no", FieldKind::I64),
        ],
    },
    attributes: &[
        AttrDef::new("order_id", "order_id", FieldKind::I64),
        AttrDef::new("line_no", "line_no", FieldKind::I64),
        AttrDef::new("qty", "qty", FieldKind::I64),
    ],
    associations: &[],
};

pub struct OrderLine;

impl SearchEntity for OrderLine {
    fn def() -> &'static EntityDef {
        &ORDER_LINE
    }
}

// ------------------------------------------------------------------ dtos --

pub struct PostSearch;

impl SearchableDto for PostSearch {
    const DTO_NAME: &'static str = "PostSearch";
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("id", FieldKind::I64),
        FieldDescriptor::new("title", FieldKind::String),
        FieldDescriptor::new("createdAt", FieldKind::DateTime).entity_path("created_at"),
        FieldDescriptor::new("age", FieldKind::I64),
        FieldDescriptor::new("score", FieldKind::F64),
        FieldDescriptor::new("authorName", FieldKind::String).entity_path("author.name"),
        FieldDescriptor::new("department", FieldKind::String)
            .entity_path("author.profile.department"),
        FieldDescriptor::new("tagName", FieldKind::String).entity_path("tags.name"),
        FieldDescriptor::new("popularity", FieldKind::I64)
            .entity_path("age")
            .sort_field("score"),
        FieldDescriptor::new("secret", FieldKind::String)
            .operators(&[SearchOperator::Equals])
            .unsortable()
            .entity_path("title"),
    ];
}

pub struct OrderLineSearch;

impl SearchableDto for OrderLineSearch {
    const DTO_NAME: &'static str = "OrderLineSearch";
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("orderId", FieldKind::I64).entity_path("order_id"),
        FieldDescriptor::new("qty", FieldKind::I64),
    ];
}

/// Validate + compile a post condition in one step.
pub fn compiled_post(cond: &SearchCondition<PostSearch>) -> CompiledQuery {
    compile_for(&POST, &validate(cond).unwrap()).unwrap()
}

// ------------------------------------------------------------- in-memory --

/// One in-memory entity row. Scalar paths hold a single candidate value;
/// collection-crossing paths hold one candidate per child row, mirroring the
/// row multiplication a SQL join would produce.
#[derive(Clone, Debug, PartialEq)]
pub struct MemRow {
    pub key: EntityKey,
    pub values: BTreeMap<String, Vec<Option<Value>>>,
}

impl MemRow {
    pub fn new(id: i64) -> Self {
        let mut values = BTreeMap::new();
        values.insert("id".to_owned(), vec![Some(Value::I64(id))]);
        Self {
            key: EntityKey::single(id),
            values,
        }
    }

    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.values
            .insert(path.to_owned(), vec![Some(value.into())]);
        self
    }

    pub fn set_null(mut self, path: &str) -> Self {
        self.values.insert(path.to_owned(), vec![None]);
        self
    }

    pub fn set_many(mut self, path: &str, values: impl IntoIterator<Item = Value>) -> Self {
        self.values
            .insert(path.to_owned(), values.into_iter().map(Some).collect());
        self
    }

    fn candidates(&self, path: &str) -> Vec<Option<Value>> {
        self.values.get(path).cloned().unwrap_or_else(|| vec![None])
    }

    fn first(&self, path: &str) -> Option<Value> {
        self.candidates(path).into_iter().next().flatten()
    }
}

fn cmp_ok(actual: &Value, op: CmpOp, expected: &Value) -> bool {
    let Some(ordering) = actual.partial_cmp_value(expected) else {
        return false;
    };
    match op {
        CmpOp::Eq => ordering.is_eq(),
        CmpOp::Ne => ordering.is_ne(),
        CmpOp::Gt => ordering.is_gt(),
        CmpOp::Ge => ordering.is_ge(),
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::Le => ordering.is_le(),
    }
}

/// Minimal LIKE matcher for the patterns the compiler emits (`%x%`, `x%`,
/// `%x`), case-insensitive, honoring backslash escapes.
fn like_match(pattern: &str, text: &str) -> bool {
    let p = pattern.to_lowercase();
    let t = text.to_lowercase();
    let starts_any = p.starts_with('%');
    let rest = if starts_any { &p[1..] } else { p.as_str() };
    let ends_any = rest.ends_with('%') && !rest.ends_with("\\%");
    let core = if ends_any { &rest[..rest.len() - 1] } else { rest };
    let needle = unescape(core);
    match (starts_any, ends_any) {
        (true, true) => t.contains(&needle),
        (false, true) => t.starts_with(&needle),
        (true, false) => t.ends_with(&needle),
        (false, false) => t == needle,
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn eval(predicate: &Predicate, row: &MemRow) -> bool {
    match predicate {
        Predicate::And(children) => children.iter().all(|c| eval(c, row)),
        Predicate::Or(children) => children.iter().any(|c| eval(c, row)),
        Predicate::Cmp { col, op, value } => row
            .candidates(&col.path)
            .iter()
            .any(|v| v.as_ref().is_some_and(|actual| cmp_ok(actual, *op, value))),
        Predicate::Between {
            col,
            low,
            high,
            negated,
        } => row.candidates(&col.path).iter().any(|v| {
            v.as_ref().is_some_and(|actual| {
                let in_range = cmp_ok(actual, CmpOp::Ge, low) && cmp_ok(actual, CmpOp::Le, high);
                in_range != *negated
            })
        }),
        Predicate::In {
            col,
            values,
            negated,
        } => row.candidates(&col.path).iter().any(|v| {
            v.as_ref()
                .is_some_and(|actual| values.contains(actual) != *negated)
        }),
        Predicate::Like {
            col,
            pattern,
            negated,
        } => row.candidates(&col.path).iter().any(|v| {
            matches!(v, Some(Value::String(s)) if like_match(pattern, s) != *negated)
        }),
        Predicate::IsNull { col, negated } => {
            let any_null = row.candidates(&col.path).iter().any(Option::is_none);
            let any_present = row.candidates(&col.path).iter().any(Option::is_some);
            if *negated { any_present } else { any_null }
        }
    }
}

fn sort_rows(rows: &mut [&MemRow], query: &CompiledQuery) {
    rows.sort_by(|a, b| {
        for item in &query.sort {
            let av = a.first(&item.col.path);
            let bv = b.first(&item.col.path);
            // Nulls sort last ascending, first descending (Postgres default).
            let ordering = match (&av, &bv) {
                (None, None) => std::cmp::Ordering::Equal,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (Some(_), None) => std::cmp::Ordering::Less,
                (Some(x), Some(y)) => x.partial_cmp_value(y).unwrap_or(std::cmp::Ordering::Equal),
            };
            let ordering = match item.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

/// In-memory query runner: filters, sorts and windows [`MemRow`]s according
/// to the compiled query, and records enough call metadata for the executor
/// tests to assert the protocol shape.
#[derive(Default)]
pub struct MemRunner {
    pub rows: Vec<MemRow>,
    /// Keys that exist during key projection but vanish before phase 2,
    /// simulating a concurrent delete.
    pub vanish: HashSet<EntityKey>,
    pub load_batches: Mutex<Vec<usize>>,
    pub seen_fetch_paths: Mutex<Vec<Vec<String>>>,
    pub update_batches: Mutex<Vec<usize>>,
    pub delete_batches: Mutex<Vec<usize>>,
}

impl MemRunner {
    pub fn new(rows: Vec<MemRow>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    fn matching<'a>(&'a self, query: &CompiledQuery) -> Vec<&'a MemRow> {
        self.rows
            .iter()
            .filter(|row| {
                query
                    .predicate
                    .as_ref()
                    .is_none_or(|predicate| eval(predicate, row))
            })
            .collect()
    }
}

#[async_trait]
impl QueryRunner for MemRunner {
    type Entity = MemRow;

    async fn project_keys(
        &self,
        query: &CompiledQuery,
        offset: u64,
        limit: Option<u64>,
    ) -> Result<Vec<EntityKey>, SearchError> {
        let mut rows = self.matching(query);
        sort_rows(&mut rows, query);
        let iter = rows.into_iter().map(|row| row.key.clone());
        let iter = iter.skip(usize::try_from(offset).unwrap());
        let keys = match limit {
            Some(limit) => iter.take(usize::try_from(limit).unwrap()).collect(),
            None => iter.collect(),
        };
        Ok(keys)
    }

    async fn load_entities(
        &self,
        query: &CompiledQuery,
        keys: &[EntityKey],
    ) -> Result<Vec<(EntityKey, MemRow)>, SearchError> {
        self.load_batches.lock().unwrap().push(keys.len());
        self.seen_fetch_paths
            .lock()
            .unwrap()
            .push(query.fetch_paths.iter().map(|p| p.path.clone()).collect());
        let wanted: HashSet<&EntityKey> = keys.iter().collect();
        Ok(self
            .rows
            .iter()
            .filter(|row| wanted.contains(&row.key) && !self.vanish.contains(&row.key))
            .map(|row| (row.key.clone(), row.clone()))
            .collect())
    }

    async fn load_projection(
        &self,
        _query: &CompiledQuery,
        keys: &[EntityKey],
        projection: &Projection,
    ) -> Result<Vec<(EntityKey, ProjectionRow)>, SearchError> {
        let wanted: HashSet<&EntityKey> = keys.iter().collect();
        Ok(self
            .rows
            .iter()
            .filter(|row| wanted.contains(&row.key) && !self.vanish.contains(&row.key))
            .map(|row| {
                let projected: ProjectionRow = projection
                    .attributes()
                    .iter()
                    .map(|attr| (attr.clone(), row.first(attr)))
                    .collect();
                (row.key.clone(), projected)
            })
            .collect())
    }

    async fn count_distinct_keys(&self, query: &CompiledQuery) -> Result<u64, SearchError> {
        Ok(self.matching(query).len() as u64)
    }

    async fn execute_update(
        &self,
        _entity: &'static EntityDef,
        keys: &[EntityKey],
        _update: &UpdateDescriptor,
    ) -> Result<u64, SearchError> {
        self.update_batches.lock().unwrap().push(keys.len());
        Ok(keys.len() as u64)
    }

    async fn execute_delete(
        &self,
        _entity: &'static EntityDef,
        keys: &[EntityKey],
    ) -> Result<u64, SearchError> {
        self.delete_batches.lock().unwrap().push(keys.len());
        Ok(keys.len() as u64)
    }
}

/// Convenience: `EntityKey` for a single i64 id.
pub fn key(id: i64) -> EntityKey {
    EntityKey::single(KeyValue::I64(id))
}
