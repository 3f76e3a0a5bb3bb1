//! Relational binding for `searchkit`: entity metadata, join planning, the
//! specification compiler and the two-phase paginated executor.
//!
//! # Pipeline
//!
//! ```text
//! SearchCondition<D>  --validate-->  ValidatedCondition
//!                     --compile--->  CompiledQuery { predicate, join plan, sort + PK tiebreak }
//!                     --execute--->  Page<Entity>   (keys -> entities -> count)
//! ```
//!
//! The executor talks to an abstract [`QueryRunner`]; the statement builders
//! in [`statements`] turn a [`CompiledQuery`] into ready-to-render
//! `sea_query` statements for runners backed by a SQL connection.
//!
//! # Why two phases
//!
//! A single query with a fetch-join over a collection multiplies parent rows
//! and forces the backend (or worse, the ORM in memory) to deduplicate after
//! applying the limit, returning short pages. Phase 1 touches only parent
//! identity; phase 2 attaches ToOne edges without multiplying the parent
//! set; collections stay lazy.

pub mod compile;
pub mod executor;
pub mod join;
pub mod key;
pub mod meta;
pub mod predicate;
pub mod runner;
pub mod service;
pub mod statements;

pub use compile::{compile, compile_for};
pub use executor::{MAX_IN_CLAUSE, SearchOptions, find_page, find_projection_page};
pub use join::{JoinEdge, JoinPlan, ROOT_ALIAS, join_plan_for};
pub use key::{EntityKey, KeyValue};
pub use meta::{
    AssocDef, AssocKind, AttrDef, EntityDef, PrimaryKeyDef, ResolvedAttr, ResolvedHop,
    ResolvedPath, SearchEntity, classify_path, entity_at,
};
pub use predicate::{CmpOp, ColumnRef, CompiledQuery, Predicate, SortItem};
pub use runner::{Projection, ProjectionRow, QueryRunner, UpdateDescriptor};
pub use service::SearchService;
