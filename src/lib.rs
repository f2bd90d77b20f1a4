//! # motifql - declarative graph pattern-matching query engine
//!
//! motifql evaluates a small, Cypher-like pattern language (`MATCH ... WHERE
//! ... RETURN ...`) against an in-memory [`model::PropertyGraph`]. It does
//! not parse query text itself; embedders hand it an already-built
//! [`query::QueryAst`] (by hand, through [`query::QueryBuilder`], or by
//! translating from whatever surface syntax they expose) and the engine
//! plans, executes, and shapes the result rows.
//!
//! ## Quick start
//!
//! ```rust
//! use motifql::model::{attrs, labels_value, NamedGraphBuilder, Value};
//! use motifql::query::{EdgeDirection, QueryBuilder, QueryEngine};
//!
//! let mut g = NamedGraphBuilder::new();
//! let mut alice_attrs = attrs();
//! alice_attrs.insert("labels".into(), labels_value(["Person"]));
//! alice_attrs.insert("name".into(), Value::from("Alice"));
//! g.node("alice", &["Person"], alice_attrs);
//! g.node("bob", &["Person"], attrs());
//! g.edge("alice", "bob", Some("KNOWS"), attrs());
//! let (graph, _names) = g.build();
//!
//! let ast = QueryBuilder::new()
//!     .match_edge("a", EdgeDirection::Outgoing, "KNOWS", "b")
//!     .return_var("a", "name")
//!     .build()
//!     .expect("valid query");
//!
//! let engine = QueryEngine::new(&graph);
//! let rows = engine.run(&ast).expect("query executes");
//! assert_eq!(rows.len(), 1);
//! ```
//!
//! ## Architecture
//!
//! Queries pass through a fixed pipeline, each stage its own module:
//! - [`query::ast`] — the query AST an embedder builds or translates to.
//! - [`query::motif`] — compiles the AST's MATCH clauses into an
//!   index-addressed motif graph.
//! - [`query::hop`] — expands variable-length edges into concrete hop
//!   chains.
//! - [`query::predicate`] — the WHERE predicate tree and its evaluator.
//! - [`query::indexer`] and [`query::hints`] — attribute indexing and
//!   hint-driven search-order planning.
//! - [`query::matcher`] — lazy subgraph matching against the host graph.
//! - [`query::shaper`] — projection, aggregation, ordering, and pagination
//!   of raw bindings into result rows.
//! - [`query::engine`] — ties the pipeline together behind one `run` call.
//!
//! See `DESIGN.md` in the repository root for how each stage is grounded.

pub mod error;
pub mod model;
pub mod query;

pub use crate::error::{EngineError, Result, ValidationError};
pub use crate::model::{AggregatedEdge, Attrs, InMemoryGraph, NamedGraphBuilder, PropertyGraph, Value};
pub use crate::query::{QueryAst, QueryBuilder, QueryEngine};
