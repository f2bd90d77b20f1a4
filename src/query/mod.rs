//! The query pipeline: AST in, shaped rows out.
//!
//! Each submodule is one stage. [`engine::QueryEngine::run`] drives all of
//! them in order; everything else here is exposed for embedders that want
//! to inspect or reuse an individual stage (e.g. running the indexer
//! standalone, or building an AST without the fluent [`builder::QueryBuilder`]).

pub mod ast;
pub mod builder;
pub mod engine;
pub mod hints;
pub mod hop;
pub mod indexer;
pub mod matcher;
pub mod motif;
pub mod predicate;
pub mod shaper;

pub use ast::{
    AggKind, AttrPath, BoolExpr, CmpOp, EdgeClause, EdgeDirection, MatchClause, OrderItem,
    OrderKey, PathBinding, Projection, QueryAst, ReturnItem, Scalar, SortDir, Var,
};
pub use builder::{PredicateBuilder, QueryBuilder};
pub use engine::{EngineConfig, QueryEngine, MAX_HOP_HARD_CAP};
pub use hints::Hint;
pub use indexer::ArrayAttributeIndexer;
pub use shaper::QueryResult;
