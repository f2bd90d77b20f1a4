//! High-level abstract syntax tree representing the user-facing query DSL.
//!
//! Nothing in this crate parses query text into this shape; an embedder's
//! own front-end (or [`crate::query::builder::QueryBuilder`] when no parser
//! is wired up) produces a [`QueryAst`], which is then lowered by
//! [`crate::query::motif`] into the motif the matcher actually runs against.

use crate::model::Value;
use std::ops::Bound;

/// Identifier assigned to a binding (node or edge) within the query.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(pub String);

impl Var {
    /// Builds a variable from anything string-like.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Var(name.into())
    }
}

impl From<&str> for Var {
    fn from(value: &str) -> Self {
        Var(value.to_owned())
    }
}

/// A match clause introducing (or further constraining) a node variable.
#[derive(Clone, Debug)]
pub struct MatchClause {
    /// The variable bound by this clause.
    pub var: Var,
    /// Required label set (empty means no label constraint).
    pub labels: Vec<String>,
    /// Inline `{key: value}` property constraints.
    pub props: Vec<(String, Value)>,
}

/// Direction selector for edge traversals, as written in the query surface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EdgeDirection {
    /// `(a)-->(b)`: edge must run from `a` to `b`.
    Outgoing,
    /// `(a)<--(b)`: edge must run from `b` to `a`.
    Incoming,
    /// `(a)--(b)`: edge may run in either direction.
    Bidirectional,
}

/// An edge traversal clause connecting two (already or newly) bound
/// variables.
#[derive(Clone, Debug)]
pub struct EdgeClause {
    /// Optional bound name (`[r:...]`), usable from WHERE/RETURN.
    pub name: Option<Var>,
    /// Left-hand variable as written in the query surface.
    pub from: Var,
    /// Right-hand variable as written in the query surface.
    pub to: Var,
    /// Acceptable edge types (`[:A|B|C]`); empty means no type constraint.
    pub types: Vec<String>,
    /// Direction as written in the query surface.
    pub direction: EdgeDirection,
    /// `Some((min, max))` for an explicit `*min..max` hop range; `None` for
    /// the implicit single-hop form.
    pub hop: Option<(u32, u32)>,
    /// Inline `{key: value}` property constraints on the edge.
    pub props: Vec<(String, Value)>,
}

/// A name bound to an entire traversal chain (`MATCH p = (a)-->(b)-->(c)`).
#[derive(Clone, Debug)]
pub struct PathBinding {
    /// The bound path name.
    pub name: String,
    /// Indices into the owning [`QueryAst::edges`] forming the chain, in
    /// traversal order.
    pub edges: Vec<usize>,
}

/// One step of an attribute path: a whole variable, one of its properties,
/// or the node-identity function.
#[derive(Clone, Debug)]
pub enum AttrPath {
    /// The full value bound to a variable (a node's attribute map, or an
    /// edge's attribute map/list).
    Var(Var),
    /// A single property of a variable.
    Prop(Var, String),
    /// `id(var)`.
    Id(Var),
}

impl AttrPath {
    /// The variable this path is rooted at, regardless of variant.
    pub fn root(&self) -> &Var {
        match self {
            AttrPath::Var(v) => v,
            AttrPath::Prop(v, _) => v,
            AttrPath::Id(v) => v,
        }
    }
}

/// The right-hand side of a comparison: either a literal or another
/// attribute path.
#[derive(Clone, Debug)]
pub enum Scalar {
    /// A literal constant.
    Const(Value),
    /// Another attribute path, compared live against the left-hand side.
    Path(AttrPath),
}

impl From<Value> for Scalar {
    fn from(value: Value) -> Self {
        Scalar::Const(value)
    }
}

/// Comparison operators recognised by [`BoolExpr::Compare`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CmpOp {
    /// `=` / `==`
    Eq,
    /// `<>` / `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `IS` (identity comparison, primarily against `NULL`/`TRUE`/`FALSE`).
    Is,
    /// `IN` (membership in a literal list).
    In,
    /// `CONTAINS` (substring test).
    Contains,
    /// `STARTS WITH`.
    StartsWith,
    /// `ENDS WITH`.
    EndsWith,
}

/// Boolean predicate tree evaluated by [`crate::query::predicate`].
#[derive(Clone, Debug)]
pub enum BoolExpr {
    /// A leaf comparison.
    Compare {
        /// Comparison operator.
        op: CmpOp,
        /// Left-hand attribute path.
        lhs: AttrPath,
        /// Right-hand side.
        rhs: Scalar,
    },
    /// A range test with independently optional/inclusive bounds.
    Between {
        /// Attribute path being range-tested.
        path: AttrPath,
        /// Lower bound.
        low: Bound<Value>,
        /// Upper bound.
        high: Bound<Value>,
    },
    /// Negation.
    Not(Box<BoolExpr>),
    /// Conjunction of two or more children.
    And(Vec<BoolExpr>),
    /// Disjunction of two or more children.
    Or(Vec<BoolExpr>),
    /// `EXISTS { ... }` / `NOT EXISTS { ... }`, holding the child query to
    /// run with the outer binding projected in as hints.
    Exists {
        /// The child query.
        query: Box<QueryAst>,
        /// True for `NOT EXISTS`.
        negated: bool,
    },
}

/// Aggregation function applied to a property across a group of rows.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AggKind {
    /// Row count within the group.
    Count,
    /// Sum of a numeric property (missing counts as 0).
    Sum,
    /// Mean of a numeric property (missing counts as 0).
    Avg,
    /// Minimum value (missing values are skipped).
    Min,
    /// Maximum value (missing values are skipped).
    Max,
}

/// One return item before aliasing.
#[derive(Clone, Debug)]
pub enum ReturnItem {
    /// A plain attribute path.
    Path(AttrPath),
    /// An aggregation over an attribute path.
    Agg(AggKind, AttrPath),
}

/// A single projected output column.
#[derive(Clone, Debug)]
pub struct Projection {
    /// What to compute.
    pub item: ReturnItem,
    /// Output column name override.
    pub alias: Option<String>,
}

/// Sort direction for an ORDER BY item.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortDir {
    /// Ascending (the default).
    Asc,
    /// Descending.
    Desc,
}

/// What an ORDER BY item sorts on: either a column already present in the
/// projection (referenced by name/alias) or a freshly computed path.
#[derive(Clone, Debug)]
pub enum OrderKey {
    /// References a projected column or aggregation alias by name.
    Column(String),
    /// Computes a fresh value to sort on.
    Item(ReturnItem),
}

/// One ORDER BY item.
#[derive(Clone, Debug)]
pub struct OrderItem {
    /// What to sort on.
    pub key: OrderKey,
    /// Sort direction.
    pub dir: SortDir,
}

/// Top-level query AST.
#[derive(Clone, Debug, Default)]
pub struct QueryAst {
    /// Match clauses introducing node variables.
    pub matches: Vec<MatchClause>,
    /// Edge traversal clauses connecting variables.
    pub edges: Vec<EdgeClause>,
    /// Named whole-path bindings.
    pub paths: Vec<PathBinding>,
    /// Canonical boolean predicate tree.
    pub predicate: Option<BoolExpr>,
    /// Whether to deduplicate results.
    pub distinct: bool,
    /// Projection items defining the output columns, in order.
    pub projections: Vec<Projection>,
    /// ORDER BY items, in precedence order.
    pub order_by: Vec<OrderItem>,
    /// Number of leading rows to skip.
    pub skip: Option<u64>,
    /// Maximum number of rows to return.
    pub limit: Option<u64>,
}
