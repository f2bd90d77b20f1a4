//! Fluent query builder (C10 ambient surface).
//!
//! Nothing in this crate parses query text; an embedder either builds a
//! [`QueryAst`] by hand or goes through this builder, which mirrors the
//! shape of the DSL ([`super::ast`]) while catching the usual misuse early
//! (duplicate aliases, empty `IN` lists, out-of-order bounds) instead of
//! deferring all of it to [`super::motif::build`].

use crate::error::{EngineError, Result};
use crate::model::Value;
use crate::query::ast::{
    AggKind, AttrPath, BoolExpr, CmpOp, EdgeClause, EdgeDirection, MatchClause, OrderItem,
    OrderKey, Projection, QueryAst, ReturnItem, Scalar, SortDir, Var,
};
use std::mem;
use std::ops::Bound;

/// Fluent builder for a [`QueryAst`].
///
/// Every method takes `self` by value and returns `Self` so calls chain;
/// a misuse (e.g. an edge clause before any node has been matched) is
/// recorded rather than panicking, and surfaces from [`QueryBuilder::build`].
#[derive(Default)]
pub struct QueryBuilder {
    ast: QueryAst,
    last_var: Option<Var>,
    next_var_idx: usize,
    pending_direction: EdgeDirection,
    error: Option<EngineError>,
}

impl Default for EdgeDirection {
    fn default() -> Self {
        EdgeDirection::Outgoing
    }
}

impl QueryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            ast: QueryAst::default(),
            last_var: None,
            next_var_idx: 0,
            pending_direction: EdgeDirection::Outgoing,
            error: None,
        }
    }

    /// Adds a bare node match clause, optionally constrained by labels.
    pub fn match_node<S>(mut self, var: S, labels: &[&str]) -> Self
    where
        S: Into<String>,
    {
        if self.error.is_some() {
            return self;
        }
        let var = Var(var.into());
        if self.ast.matches.iter().any(|m| m.var == var) {
            self.error = Some(EngineError::Runtime(format!(
                "variable `{}` already matched",
                var.0
            )));
            return self;
        }
        self.ast.matches.push(MatchClause {
            var: var.clone(),
            labels: labels.iter().map(|l| (*l).to_owned()).collect(),
            props: Vec::new(),
        });
        self.last_var = Some(var);
        self
    }

    /// Adds an inline property constraint to an already-matched node or
    /// edge variable.
    pub fn with_prop<S, P, V>(mut self, var: S, prop: P, value: V) -> Self
    where
        S: Into<String>,
        P: Into<String>,
        V: Into<Value>,
    {
        if self.error.is_some() {
            return self;
        }
        let var = var.into();
        if let Some(m) = self.ast.matches.iter_mut().find(|m| m.var.0 == var) {
            m.props.push((prop.into(), value.into()));
            return self;
        }
        if let Some(e) = self
            .ast
            .edges
            .iter_mut()
            .find(|e| e.name.as_ref().is_some_and(|n| n.0 == var))
        {
            e.props.push((prop.into(), value.into()));
            return self;
        }
        self.error = Some(EngineError::Runtime(format!(
            "with_prop: unknown variable `{var}`"
        )));
        self
    }

    /// Sets the direction used by the next [`QueryBuilder::match_edge`] or
    /// [`QueryBuilder::match_edge_hops`] call. Resets to [`EdgeDirection::Outgoing`]
    /// after being consumed.
    pub fn direction(mut self, dir: EdgeDirection) -> Self {
        self.pending_direction = dir;
        self
    }

    /// Adds a single-hop edge clause between two node variables, creating
    /// either endpoint that has not already been matched.
    pub fn match_edge<F, T>(self, from: F, direction: EdgeDirection, edge_type: &str, to: T) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        self.direction(direction)
            .push_edge(from.into(), to.into(), &[edge_type], None, None)
    }

    /// Adds a single-hop edge clause with no type constraint (`()-->()`).
    pub fn match_edge_any<F, T>(self, from: F, direction: EdgeDirection, to: T) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        self.direction(direction)
            .push_edge(from.into(), to.into(), &[], None, None)
    }

    /// Adds a single-hop edge clause accepting any of several edge types
    /// (`[:A|B|C]`).
    pub fn match_edge_types<F, T>(
        self,
        from: F,
        direction: EdgeDirection,
        edge_types: &[&str],
        to: T,
    ) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        self.direction(direction)
            .push_edge(from.into(), to.into(), edge_types, None, None)
    }

    /// Adds a variable-length edge clause (`*min..max`).
    pub fn match_edge_hops<F, T>(
        self,
        from: F,
        direction: EdgeDirection,
        edge_types: &[&str],
        to: T,
        min_hop: u32,
        max_hop: u32,
    ) -> Self
    where
        F: Into<String>,
        T: Into<String>,
    {
        self.direction(direction).push_edge(
            from.into(),
            to.into(),
            edge_types,
            Some((min_hop, max_hop)),
            None,
        )
    }

    /// Binds a name to the edge added by the immediately preceding
    /// `match_edge`/`match_edge_hops` call, making it addressable from
    /// `where_var`/`return_var`/`order_by`.
    pub fn name_last_edge<S: Into<String>>(mut self, name: S) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.ast.edges.last_mut() {
            Some(edge) => edge.name = Some(Var(name.into())),
            None => {
                self.error = Some(EngineError::Runtime(
                    "name_last_edge requires a preceding edge clause".into(),
                ))
            }
        }
        self
    }

    fn push_edge(
        mut self,
        from: String,
        to: String,
        edge_types: &[&str],
        hop: Option<(u32, u32)>,
        name: Option<String>,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        if !self.ast.matches.iter().any(|m| m.var.0 == from) {
            self.error = Some(EngineError::Runtime(format!(
                "match_edge: unknown left variable `{from}`"
            )));
            return self;
        }
        let to_var = Var(to.clone());
        if !self.ast.matches.iter().any(|m| m.var == to_var) {
            self.ast.matches.push(MatchClause {
                var: to_var.clone(),
                labels: Vec::new(),
                props: Vec::new(),
            });
        }
        self.ast.edges.push(EdgeClause {
            name: name.map(Var),
            from: Var(from),
            to: to_var,
            types: edge_types.iter().map(|t| (*t).to_owned()).collect(),
            direction: self.pending_direction,
            hop,
            props: Vec::new(),
        });
        self.last_var = Some(Var(to));
        self.pending_direction = EdgeDirection::Outgoing;
        self
    }

    /// Adds predicates over a single variable, combined with the rest of
    /// the WHERE tree by AND.
    pub fn where_var<S, F>(mut self, var: S, build: F) -> Self
    where
        S: Into<String>,
        F: FnOnce(&mut PredicateBuilder),
    {
        if self.error.is_some() {
            return self;
        }
        let var = Var(var.into());
        let mut builder = PredicateBuilder::new(var);
        build(&mut builder);
        if let Some(err) = builder.error {
            self.error = Some(err);
            return self;
        }
        match builder.finish() {
            Some(expr) => {
                self.append_bool_expr(expr);
                self
            }
            None => {
                self.error = Some(EngineError::Runtime(
                    "where_var requires at least one predicate".into(),
                ));
                self
            }
        }
    }

    /// Adds a raw, already-constructed predicate to the WHERE tree.
    pub fn where_expr(mut self, expr: BoolExpr) -> Self {
        if self.error.is_some() {
            return self;
        }
        self.append_bool_expr(expr);
        self
    }

    /// Adds an `EXISTS { ... }` / `NOT EXISTS { ... }` predicate whose
    /// child query is produced by a nested builder.
    pub fn where_exists<F>(mut self, negated: bool, build: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        if self.error.is_some() {
            return self;
        }
        let child = build(QueryBuilder::new());
        match child.build() {
            Ok(query) => {
                self.append_bool_expr(BoolExpr::Exists {
                    query: Box::new(query),
                    negated,
                });
                self
            }
            Err(err) => {
                self.error = Some(err);
                self
            }
        }
    }

    fn append_bool_expr(&mut self, expr: BoolExpr) {
        self.ast.predicate = Some(match self.ast.predicate.take() {
            Some(BoolExpr::And(mut args)) => {
                args.push(expr);
                BoolExpr::And(args)
            }
            Some(existing) => BoolExpr::And(vec![existing, expr]),
            None => expr,
        });
    }

    /// Marks the query as DISTINCT.
    pub fn distinct(mut self) -> Self {
        self.ast.distinct = true;
        self
    }

    /// Projects a plain property of a variable.
    pub fn return_var<S, P>(mut self, var: S, prop: P) -> Self
    where
        S: Into<String>,
        P: Into<String>,
    {
        self.push_projection(ReturnItem::Path(AttrPath::Prop(Var(var.into()), prop.into())), None)
    }

    /// Projects a variable's property under an explicit output alias.
    pub fn return_var_as<S, P, A>(mut self, var: S, prop: P, alias: A) -> Self
    where
        S: Into<String>,
        P: Into<String>,
        A: Into<String>,
    {
        self.push_projection(
            ReturnItem::Path(AttrPath::Prop(Var(var.into()), prop.into())),
            Some(alias.into()),
        )
    }

    /// Projects a variable's whole bound value (its attribute map, or an
    /// edge's attribute map/list for a variable-length edge).
    pub fn return_whole<S>(mut self, var: S) -> Self
    where
        S: Into<String>,
    {
        self.push_projection(ReturnItem::Path(AttrPath::Var(Var(var.into()))), None)
    }

    /// Projects `id(var)`.
    pub fn return_id<S>(mut self, var: S) -> Self
    where
        S: Into<String>,
    {
        self.push_projection(ReturnItem::Path(AttrPath::Id(Var(var.into()))), None)
    }

    /// Projects an aggregation over a variable's property.
    pub fn return_agg<S, P, A>(mut self, kind: AggKind, var: S, prop: P, alias: A) -> Self
    where
        S: Into<String>,
        P: Into<String>,
        A: Into<String>,
    {
        self.push_projection(
            ReturnItem::Agg(kind, AttrPath::Prop(Var(var.into()), prop.into())),
            Some(alias.into()),
        )
    }

    fn push_projection(mut self, item: ReturnItem, alias: Option<String>) -> Self {
        if self.error.is_some() {
            return self;
        }
        self.ast.projections.push(Projection { item, alias });
        self
    }

    /// Orders by a previously projected column or alias.
    pub fn order_by_column<S: Into<String>>(mut self, column: S, dir: SortDir) -> Self {
        if self.error.is_some() {
            return self;
        }
        self.ast.order_by.push(OrderItem {
            key: OrderKey::Column(column.into()),
            dir,
        });
        self
    }

    /// Orders by a freshly computed path, independent of the RETURN list.
    pub fn order_by_var<S, P>(mut self, var: S, prop: P, dir: SortDir) -> Self
    where
        S: Into<String>,
        P: Into<String>,
    {
        if self.error.is_some() {
            return self;
        }
        self.ast.order_by.push(OrderItem {
            key: OrderKey::Item(ReturnItem::Path(AttrPath::Prop(Var(var.into()), prop.into()))),
            dir,
        });
        self
    }

    /// Skips the first `n` rows after ordering.
    pub fn skip(mut self, n: u64) -> Self {
        self.ast.skip = Some(n);
        self
    }

    /// Caps the result at `n` rows after skipping.
    pub fn limit(mut self, n: u64) -> Self {
        self.ast.limit = Some(n);
        self
    }

    /// Finalizes the AST, surfacing any error recorded along the way.
    pub fn build(self) -> Result<QueryAst> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.ast),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum PredicateMode {
    And,
    Or,
}

/// Builder used to construct a predicate tree bound to a single variable
/// from inside [`QueryBuilder::where_var`].
pub struct PredicateBuilder {
    var: Var,
    mode: PredicateMode,
    exprs: Vec<BoolExpr>,
    error: Option<EngineError>,
}

impl PredicateBuilder {
    fn new(var: Var) -> Self {
        Self::with_mode(var, PredicateMode::And)
    }

    fn with_mode(var: Var, mode: PredicateMode) -> Self {
        Self {
            var,
            mode,
            exprs: Vec::new(),
            error: None,
        }
    }

    fn path(&self, prop: String) -> AttrPath {
        AttrPath::Prop(self.var.clone(), prop)
    }

    fn push_cmp(&mut self, op: CmpOp, prop: String, value: Value) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        self.exprs.push(BoolExpr::Compare {
            op,
            lhs: self.path(prop),
            rhs: Scalar::Const(value),
        });
        self
    }

    fn finish(self) -> Option<BoolExpr> {
        if self.error.is_some() {
            return None;
        }
        match self.exprs.len() {
            0 => None,
            1 => self.exprs.into_iter().next(),
            _ => Some(match self.mode {
                PredicateMode::And => BoolExpr::And(self.exprs),
                PredicateMode::Or => BoolExpr::Or(self.exprs),
            }),
        }
    }

    fn record_error(&mut self, err: EngineError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn build_group<F>(var: Var, mode: PredicateMode, build: F) -> Result<BoolExpr>
    where
        F: FnOnce(&mut PredicateBuilder),
    {
        let mut nested = PredicateBuilder::with_mode(var, mode);
        build(&mut nested);
        if let Some(err) = nested.error {
            return Err(err);
        }
        nested
            .finish()
            .ok_or_else(|| EngineError::Runtime("predicate group produced no predicate".into()))
    }

    /// `prop = value`
    pub fn eq<P, V>(&mut self, prop: P, value: V) -> &mut Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        self.push_cmp(CmpOp::Eq, prop.into(), value.into())
    }

    /// `prop <> value`
    pub fn ne<P, V>(&mut self, prop: P, value: V) -> &mut Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        self.push_cmp(CmpOp::Ne, prop.into(), value.into())
    }

    /// `prop < value`
    pub fn lt<P, V>(&mut self, prop: P, value: V) -> &mut Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        self.push_cmp(CmpOp::Lt, prop.into(), value.into())
    }

    /// `prop <= value`
    pub fn le<P, V>(&mut self, prop: P, value: V) -> &mut Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        self.push_cmp(CmpOp::Le, prop.into(), value.into())
    }

    /// `prop > value`
    pub fn gt<P, V>(&mut self, prop: P, value: V) -> &mut Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        self.push_cmp(CmpOp::Gt, prop.into(), value.into())
    }

    /// `prop >= value`
    pub fn ge<P, V>(&mut self, prop: P, value: V) -> &mut Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        self.push_cmp(CmpOp::Ge, prop.into(), value.into())
    }

    /// `prop CONTAINS value`
    pub fn contains<P, V>(&mut self, prop: P, value: V) -> &mut Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        self.push_cmp(CmpOp::Contains, prop.into(), value.into())
    }

    /// `prop STARTS WITH value`
    pub fn starts_with<P, V>(&mut self, prop: P, value: V) -> &mut Self
    where
        P: Into<String>,
        V: Into<Value>,
    {
        self.push_cmp(CmpOp::StartsWith, prop.into(), value.into())
    }

    /// Inclusive `prop BETWEEN low AND high`.
    pub fn between<P, L, H>(&mut self, prop: P, low: L, high: H) -> &mut Self
    where
        P: Into<String>,
        L: Into<Value>,
        H: Into<Value>,
    {
        if self.error.is_some() {
            return self;
        }
        self.exprs.push(BoolExpr::Between {
            path: self.path(prop.into()),
            low: Bound::Included(low.into()),
            high: Bound::Included(high.into()),
        });
        self
    }

    /// `prop IS NULL`
    pub fn is_null<P: Into<String>>(&mut self, prop: P) -> &mut Self {
        self.push_cmp(CmpOp::Is, prop.into(), Value::Null)
    }

    /// `prop IN (values)`. Recorded as an error if `values` is empty or
    /// mixes incompatible value kinds, matching the checks a hand-built
    /// `BoolExpr::Compare { op: CmpOp::In, .. }` skips.
    pub fn in_list<P, I, V>(&mut self, prop: P, values: I) -> &mut Self
    where
        P: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        if self.error.is_some() {
            return self;
        }
        let collected: Vec<Value> = values.into_iter().map(Into::into).collect();
        if collected.is_empty() {
            self.record_error(EngineError::Runtime("in_list requires at least one value".into()));
            return self;
        }
        let first_tag = mem::discriminant(&collected[0]);
        if !collected.iter().all(|v| mem::discriminant(v) == first_tag) {
            self.record_error(EngineError::Runtime(
                "in_list requires all values to share the same type".into(),
            ));
            return self;
        }
        self.push_cmp(CmpOp::In, prop.into(), Value::List(collected))
    }

    /// Nests a group of predicates over the same variable, combined by AND.
    pub fn and_group<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut PredicateBuilder),
    {
        match PredicateBuilder::build_group(self.var.clone(), PredicateMode::And, build) {
            Ok(expr) => {
                self.exprs.push(expr);
                self
            }
            Err(err) => {
                self.record_error(err);
                self
            }
        }
    }

    /// Nests a group of predicates over the same variable, combined by OR.
    pub fn or_group<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut PredicateBuilder),
    {
        match PredicateBuilder::build_group(self.var.clone(), PredicateMode::Or, build) {
            Ok(expr) => {
                self.exprs.push(expr);
                self
            }
            Err(err) => {
                self.record_error(err);
                self
            }
        }
    }
}
