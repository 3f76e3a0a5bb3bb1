//! Entity metadata: declarative descriptors for tables, attributes,
//! associations and primary keys, plus cached attribute-path classification.
//!
//! Descriptors replace runtime metamodel reflection: each entity declares one
//! static [`EntityDef`] and registers it through [`SearchEntity`]. Path
//! classification (`author.profile.department` -> ToOne, ToOne, Leaf) is
//! memoized process-wide.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, LazyLock};

use searchkit::{CompileError, FieldKind};

/// One scalar attribute of an entity.
#[derive(Clone, Copy, Debug)]
pub struct AttrDef {
    /// Attribute name as used in dotted paths.
    pub name: &'static str,
    /// Backing column name.
    pub column: &'static str,
    pub kind: FieldKind,
}

impl AttrDef {
    #[must_use]
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { name, column, kind }
    }
}

/// Cardinality of an association.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssocKind {
    /// Many-to-one / one-to-one; does not multiply parent rows under join.
    ToOne,
    /// One-to-many / many-to-many; multiplies parent rows under join.
    ToMany,
}

/// A named association to another entity.
#[derive(Clone, Copy)]
pub struct AssocDef {
    pub name: &'static str,
    pub kind: AssocKind,
    /// Target entity descriptor, late-bound to allow cycles between statics.
    pub target: fn() -> &'static EntityDef,
    /// Join column pairs: `(source column, target column)`.
    pub columns: &'static [(&'static str, &'static str)],
}

impl AssocDef {
    #[must_use]
    pub const fn new(
        name: &'static str,
        kind: AssocKind,
        target: fn() -> &'static EntityDef,
        columns: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            name,
            kind,
            target,
            columns,
        }
    }
}

impl std::fmt::Debug for AssocDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssocDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Primary key shape. Both a multi-column key declared on the entity and an
/// embedded key record reduce to one ordered attribute list.
#[derive(Clone, Copy, Debug)]
pub enum PrimaryKeyDef {
    Columns(&'static [AttrDef]),
    Embedded {
        /// Name of the embedded key attribute.
        name: &'static str,
        attrs: &'static [AttrDef],
    },
}

impl PrimaryKeyDef {
    /// Ordered primary-key attributes, regardless of shape.
    #[must_use]
    pub const fn attrs(&self) -> &'static [AttrDef] {
        match *self {
            PrimaryKeyDef::Columns(attrs) | PrimaryKeyDef::Embedded { attrs, .. } => attrs,
        }
    }
}

/// Static descriptor for one searchable entity.
#[derive(Debug)]
pub struct EntityDef {
    pub name: &'static str,
    pub table: &'static str,
    pub pk: PrimaryKeyDef,
    /// All scalar attributes, including the primary-key attributes.
    pub attributes: &'static [AttrDef],
    pub associations: &'static [AssocDef],
}

impl EntityDef {
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&'static AttrDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    #[must_use]
    pub fn association(&self, name: &str) -> Option<&'static AssocDef> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// Ordered primary-key attributes.
    #[must_use]
    pub fn pk_attrs(&self) -> &'static [AttrDef] {
        self.pk.attrs()
    }
}

/// An entity type addressable by the search engine.
pub trait SearchEntity: 'static {
    fn def() -> &'static EntityDef;
}

/// One association hop of a resolved path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedHop {
    pub name: String,
    pub kind: AssocKind,
}

/// Terminal scalar attribute of a resolved path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAttr {
    pub name: String,
    pub column: String,
    pub kind: FieldKind,
}

/// A dotted attribute path resolved against an entity: a chain of
/// association hops and, for attribute paths, a terminal scalar. A path that
/// addresses an association itself (used by fetch graphs) has no leaf.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedPath {
    pub path: String,
    pub hops: Vec<ResolvedHop>,
    pub leaf: Option<ResolvedAttr>,
}

impl ResolvedPath {
    /// True when any hop crosses a collection.
    #[must_use]
    pub fn crosses_to_many(&self) -> bool {
        self.hops.iter().any(|h| h.kind == AssocKind::ToMany)
    }

    /// Dotted association prefix addressing the entity the leaf lives on
    /// (empty for root attributes). For association paths this is the whole
    /// path.
    #[must_use]
    pub fn association_path(&self) -> String {
        self.hops
            .iter()
            .map(|h| h.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }
}

static PATH_CACHE: LazyLock<DashMap<(&'static str, String), Arc<ResolvedPath>>> =
    LazyLock::new(DashMap::new);

/// Classify a dotted attribute path against an entity, labelling every
/// segment ToOne / ToMany / Leaf. Results are cached per (entity, path).
///
/// # Errors
/// Returns [`CompileError`] for unknown segments; descriptor tables are
/// server-authored, so a bad path is a programming bug.
pub fn classify_path(
    def: &'static EntityDef,
    path: &str,
) -> Result<Arc<ResolvedPath>, CompileError> {
    match PATH_CACHE.entry((def.name, path.to_owned())) {
        Entry::Occupied(hit) => Ok(Arc::clone(hit.get())),
        Entry::Vacant(slot) => {
            let resolved = Arc::new(resolve(def, path)?);
            slot.insert(Arc::clone(&resolved));
            Ok(resolved)
        }
    }
}

fn resolve(def: &'static EntityDef, path: &str) -> Result<ResolvedPath, CompileError> {
    let segments: Vec<&str> = path.split('.').collect();
    if path.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(CompileError::new(format!(
            "malformed attribute path {path:?} on entity {}",
            def.name
        )));
    }

    let mut current = def;
    let mut hops = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        let last = i + 1 == segments.len();
        if let Some(assoc) = current.association(segment) {
            hops.push(ResolvedHop {
                name: (*segment).to_owned(),
                kind: assoc.kind,
            });
            current = (assoc.target)();
        } else if last {
            let attr = current.attribute(segment).ok_or_else(|| {
                CompileError::new(format!(
                    "unknown attribute {segment:?} on entity {}",
                    current.name
                ))
            })?;
            return Ok(ResolvedPath {
                path: path.to_owned(),
                hops,
                leaf: Some(ResolvedAttr {
                    name: attr.name.to_owned(),
                    column: attr.column.to_owned(),
                    kind: attr.kind,
                }),
            });
        } else {
            return Err(CompileError::new(format!(
                "unknown association {segment:?} on entity {}",
                current.name
            )));
        }
    }

    // Every segment was an association: the path addresses the association.
    Ok(ResolvedPath {
        path: path.to_owned(),
        hops,
        leaf: None,
    })
}

/// Entity reached by following a dotted association path from `def`.
/// An empty path yields `def` itself.
///
/// # Errors
/// Returns [`CompileError`] when a segment is not an association.
pub fn entity_at(
    def: &'static EntityDef,
    assoc_path: &str,
) -> Result<&'static EntityDef, CompileError> {
    if assoc_path.is_empty() {
        return Ok(def);
    }
    let mut current = def;
    for segment in assoc_path.split('.') {
        let assoc = current.association(segment).ok_or_else(|| {
            CompileError::new(format!(
                "unknown association {segment:?} on entity {}",
                current.name
            ))
        })?;
        current = (assoc.target)();
    }
    Ok(current)
}
