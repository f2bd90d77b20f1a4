//! WHERE predicate tree evaluation (C4).
//!
//! Evaluating a predicate against one binding yields `(bool, EdgeMask)`:
//! the overall pass/fail, plus — for any leaf that compared a bound
//! single-hop edge variable's property against something — which of that
//! edge's parallel keys individually satisfied the leaf. `AND`/`OR` combine
//! masks component-wise; `NOT` negates only the boolean and passes the mask
//! through untouched, since negating "which keys matched" has no sensible
//! meaning on its own.
//!
//! Comparison failure — a missing attribute, or a type mismatch — evaluates
//! to `false` rather than propagating an error. This is deliberate: it
//! keeps WHERE a total predicate over whatever the host graph happens to
//! have, matching the behavior of the system this engine's WHERE semantics
//! are modeled on.

use crate::error::Result;
use crate::model::{PropertyGraph, Value};
use crate::query::ast::{AttrPath, BoolExpr, CmpOp, Scalar};
use crate::query::engine::QueryEngine;
use crate::query::hop::ExpandedMotif;
use crate::query::matcher::Binding;
use crate::query::motif::MotifEdgeIdx;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// Edge key sets, keyed by *original* motif edge index, that individually
/// satisfied some leaf of the predicate tree being evaluated.
pub type EdgeMask = BTreeMap<MotifEdgeIdx, BTreeSet<u32>>;

/// Evaluation context threaded through predicate evaluation: the host
/// graph, the expanded motif the binding was produced against, the
/// candidate binding itself, and the enclosing engine (needed only to
/// recurse into `EXISTS` subqueries).
pub struct EvalCtx<'a, G: PropertyGraph> {
    /// Host graph being queried.
    pub graph: &'a G,
    /// Expanded motif the binding lives in.
    pub expanded: &'a ExpandedMotif,
    /// Bound name -> original edge index (for resolving `AttrPath`s that
    /// name an edge rather than a node).
    pub edge_names: &'a BTreeMap<String, MotifEdgeIdx>,
    /// Candidate binding under evaluation.
    pub binding: &'a Binding<G::NodeId>,
    /// Owning engine, used to run `EXISTS` child queries.
    pub engine: &'a QueryEngine<'a, G>,
}

fn resolve_node_value(ctx: &EvalCtx<impl PropertyGraph>, path: &AttrPath) -> Option<Value> {
    match path {
        AttrPath::Id(var) => {
            let idx = *ctx.expanded.motif.var_index.get(&var.0)?;
            let host = *ctx.binding.nodes.get(&idx)?;
            Some(ctx.graph.id_value(host))
        }
        AttrPath::Var(var) => {
            let idx = *ctx.expanded.motif.var_index.get(&var.0)?;
            let host = *ctx.binding.nodes.get(&idx)?;
            Some(Value::Map(ctx.graph.node_attrs(host)))
        }
        AttrPath::Prop(var, prop) => {
            if let Some(&idx) = ctx.expanded.motif.var_index.get(&var.0) {
                let host = *ctx.binding.nodes.get(&idx)?;
                return ctx.graph.node_attrs(host).get(prop).cloned();
            }
            None
        }
    }
}

/// Resolves a `Prop` path rooted at a bound single-hop edge variable into a
/// per-edge-key value map; returns `None` when the variable does not name
/// such an edge (so the caller falls back to node resolution).
fn resolve_edge_values(
    ctx: &EvalCtx<impl PropertyGraph>,
    var: &str,
    prop: &str,
) -> Option<BTreeMap<u32, Option<Value>>> {
    let &orig_edge_idx = ctx.edge_names.get(var)?;
    let path = ctx.expanded.paths.get(&orig_edge_idx)?;
    if path.edges.len() != 1 {
        // Variable-length edge bound to a name: WHERE narrowing of
        // individual parallel edges is only meaningful for a single hop.
        return None;
    }
    let edge = &ctx.expanded.motif.edges[path.edges[0]];
    let u = *ctx.binding.nodes.get(&edge.from)?;
    let v = *ctx.binding.nodes.get(&edge.to)?;
    let aggregated = ctx.graph.aggregated_edge(u, v)?;
    Some(
        aggregated
            .per_key
            .into_iter()
            .map(|(key, attrs)| (key, attrs.get(prop).cloned()))
            .collect(),
    )
}

fn compare_scalar(op: CmpOp, lhs: &Option<Value>, rhs: &Value) -> bool {
    match lhs {
        None => matches!(op, CmpOp::Is) && matches!(rhs, Value::Null),
        Some(value) => compare_values(op, value, rhs),
    }
}

/// Compares two concrete values under one operator. Type mismatches (e.g.
/// `CONTAINS` on a non-string) evaluate to `false`.
pub fn compare_values(op: CmpOp, lhs: &Value, rhs: &Value) -> bool {
    match op {
        CmpOp::Eq => lhs.partial_cmp(rhs) == Some(std::cmp::Ordering::Equal),
        CmpOp::Ne => lhs.partial_cmp(rhs) != Some(std::cmp::Ordering::Equal),
        CmpOp::Lt => matches!(lhs.partial_cmp(rhs), Some(std::cmp::Ordering::Less)),
        CmpOp::Le => matches!(
            lhs.partial_cmp(rhs),
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        ),
        CmpOp::Gt => matches!(lhs.partial_cmp(rhs), Some(std::cmp::Ordering::Greater)),
        CmpOp::Ge => matches!(
            lhs.partial_cmp(rhs),
            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
        ),
        CmpOp::Is => lhs.partial_cmp(rhs) == Some(std::cmp::Ordering::Equal),
        CmpOp::In => match rhs {
            Value::List(items) => items
                .iter()
                .any(|item| lhs.partial_cmp(item) == Some(std::cmp::Ordering::Equal)),
            _ => false,
        },
        CmpOp::Contains => match (lhs.as_str(), rhs.as_str()) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => false,
        },
        CmpOp::StartsWith => match (lhs.as_str(), rhs.as_str()) {
            (Some(haystack), Some(needle)) => haystack.starts_with(needle),
            _ => false,
        },
        CmpOp::EndsWith => match (lhs.as_str(), rhs.as_str()) {
            (Some(haystack), Some(needle)) => haystack.ends_with(needle),
            _ => false,
        },
    }
}

fn bound_within(value: &Value, bound: &Bound<Value>, is_low: bool) -> bool {
    match bound {
        Bound::Unbounded => true,
        Bound::Included(b) => {
            if is_low {
                compare_values(CmpOp::Ge, value, b)
            } else {
                compare_values(CmpOp::Le, value, b)
            }
        }
        Bound::Excluded(b) => {
            if is_low {
                compare_values(CmpOp::Gt, value, b)
            } else {
                compare_values(CmpOp::Lt, value, b)
            }
        }
    }
}

fn merge_masks(masks: &[EdgeMask], intersect_common: bool) -> EdgeMask {
    let mut out: EdgeMask = BTreeMap::new();
    for mask in masks {
        for (&edge_idx, keys) in mask {
            out.entry(edge_idx)
                .and_modify(|existing: &mut BTreeSet<u32>| {
                    *existing = if intersect_common {
                        existing.intersection(keys).copied().collect()
                    } else {
                        existing.union(keys).copied().collect()
                    };
                })
                .or_insert_with(|| keys.clone());
        }
    }
    out
}

/// Evaluates `expr` against the candidate binding in `ctx`, returning the
/// overall boolean verdict and the per-edge-key mask accumulated from any
/// bound-edge leaves.
pub fn eval<G: PropertyGraph>(expr: &BoolExpr, ctx: &EvalCtx<G>) -> Result<(bool, EdgeMask)> {
    match expr {
        BoolExpr::Compare { op, lhs, rhs } => {
            let rhs_value = match rhs {
                Scalar::Const(v) => v.clone(),
                Scalar::Path(p) => resolve_node_value(ctx, p).unwrap_or(Value::Null),
            };

            if let AttrPath::Prop(var, prop) = lhs {
                if let Some(per_key) = resolve_edge_values(ctx, &var.0, prop) {
                    let &orig_edge_idx = ctx.edge_names.get(&var.0).expect("checked by resolve");
                    let mut keys = BTreeSet::new();
                    for (key, value) in &per_key {
                        if compare_scalar(*op, value, &rhs_value) {
                            keys.insert(*key);
                        }
                    }
                    let passed = !keys.is_empty();
                    let mut mask = BTreeMap::new();
                    if !keys.is_empty() {
                        mask.insert(orig_edge_idx, keys);
                    }
                    return Ok((passed, mask));
                }
            }

            let lhs_value = resolve_node_value(ctx, lhs);
            Ok((compare_scalar(*op, &lhs_value, &rhs_value), BTreeMap::new()))
        }
        BoolExpr::Between { path, low, high } => {
            let value = resolve_node_value(ctx, path);
            let ok = match value {
                Some(v) => bound_within(&v, low, true) && bound_within(&v, high, false),
                None => false,
            };
            Ok((ok, BTreeMap::new()))
        }
        BoolExpr::Not(inner) => {
            let (b, mask) = eval(inner, ctx)?;
            Ok((!b, mask))
        }
        BoolExpr::And(children) => {
            let mut results = Vec::with_capacity(children.len());
            for child in children {
                results.push(eval(child, ctx)?);
            }
            let all = results.iter().all(|(b, _)| *b);
            let masks: Vec<_> = results.into_iter().map(|(_, m)| m).collect();
            Ok((all, merge_masks(&masks, true)))
        }
        BoolExpr::Or(children) => {
            let mut results = Vec::with_capacity(children.len());
            for child in children {
                results.push(eval(child, ctx)?);
            }
            let any = results.iter().any(|(b, _)| *b);
            let masks: Vec<_> = results.into_iter().map(|(_, m)| m).collect();
            Ok((any, merge_masks(&masks, false)))
        }
        BoolExpr::Exists { query, negated } => {
            let found = ctx.engine.run_exists(query, ctx.expanded, ctx.binding)?;
            Ok((found != *negated, BTreeMap::new()))
        }
    }
}
