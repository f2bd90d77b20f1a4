//! Top-level query orchestration (C9) and engine configuration (C10).
//!
//! `QueryEngine::run` wires every other component together: build the motif
//! (C2), expand variable-length hops (C3), optionally narrow the search with
//! attribute-indexer hints (C7 + C6), enumerate candidate bindings per
//! expanded motif (C5), filter them through the WHERE tree (C4), and shape
//! the survivors into a result (C8). `run_exists` is the same pipeline bent
//! into a short-circuiting existence check for `EXISTS { ... }` predicates.

use crate::error::{Result, ValidationError};
use crate::model::{PropertyGraph, Value};
use crate::query::ast::{AttrPath, BoolExpr, CmpOp, QueryAst, ReturnItem, Scalar};
use crate::query::hints::{self, Hint};
use crate::query::hop::{self, ExpandedMotif};
use crate::query::indexer::{self, ArrayAttributeIndexer};
use crate::query::matcher::{self, Binding, LocalHint};
use crate::query::motif::{self, Motif, MotifEdgeIdx};
use crate::query::predicate::{self, EvalCtx};
use crate::query::shaper::{self, MatchRow, QueryResult};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// The hard ceiling on `max_hop` fixed by the language surface; an
/// `EngineConfig` may lower it but never raise it.
pub const MAX_HOP_HARD_CAP: u32 = 100;

/// Tunable limits and feature flags for one [`QueryEngine`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Ceiling applied to every edge's `max_hop`, at most [`MAX_HOP_HARD_CAP`].
    pub max_hop: u32,
    /// Maximum number of nodes a WHERE predicate tree may contain.
    pub predicate_node_budget: usize,
    /// Maximum nesting depth a WHERE predicate tree may reach.
    pub predicate_depth_budget: usize,
    /// Whether the attribute-indexer accelerator (C7) is consulted to
    /// pre-narrow the search via hints. Purely a performance knob: disabling
    /// it never changes which rows are returned.
    pub use_indexer: bool,
    /// Row limit applied when a query does not specify its own `LIMIT`.
    pub default_limit: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_hop: MAX_HOP_HARD_CAP,
            predicate_node_budget: 256,
            predicate_depth_budget: 64,
            use_indexer: true,
            default_limit: None,
        }
    }
}

/// The top-level query interpreter, bound to one host graph.
pub struct QueryEngine<'g, G: PropertyGraph> {
    graph: &'g G,
    config: EngineConfig,
}

impl<'g, G: PropertyGraph> QueryEngine<'g, G> {
    /// Builds an engine over `graph` with default configuration.
    pub fn new(graph: &'g G) -> Self {
        Self {
            graph,
            config: EngineConfig::default(),
        }
    }

    /// Builds an engine over `graph` with an explicit configuration.
    pub fn with_config(graph: &'g G, config: EngineConfig) -> Self {
        Self { graph, config }
    }

    /// Runs `ast` with no externally-supplied hints.
    pub fn run(&self, ast: &QueryAst) -> Result<QueryResult> {
        self.run_with_hints(ast, &[])
    }

    /// Runs `ast`, additionally restricting the search with caller-supplied
    /// hints (each a partial binding keyed by *original* query variable
    /// name). Hints only ever narrow the result; a hint inconsistent with
    /// the host graph is dropped rather than rejected.
    pub fn run_with_hints(&self, ast: &QueryAst, hints: &[Hint<G::NodeId>]) -> Result<QueryResult> {
        let span = tracing::info_span!("query");
        let _enter = span.enter();

        let (motif, edge_names) = self.prepare(ast)?;

        let mut combined_hints: Vec<Hint<G::NodeId>> = hints.to_vec();
        if self.config.use_indexer {
            if let Some(predicate) = &ast.predicate {
                let domain_span = tracing::debug_span!("indexer_prefilter").entered();
                let indexer = ArrayAttributeIndexer::new(self.graph);
                let domain_expr = indexer::translate(predicate);
                if let Some(domain) = indexer::evaluate(&domain_expr, &indexer) {
                    let from_index = hints::from_domain(&domain);
                    tracing::debug!(hint_count = from_index.len(), "indexer produced hints");
                    combined_hints.extend(from_index);
                }
                drop(domain_span);
            }
        }
        let doublechecked = hints::doublecheck(self.graph, &motif, &combined_hints);
        let deduped_hints = hints::eliminate_supersets(&doublechecked);

        let expansions = {
            let _span = tracing::debug_span!("hop_expand").entered();
            hop::expand(&motif)
        };

        let early_stop = self.early_stop_cap(ast);

        let mut accepted: Vec<MatchRow<'_, G::NodeId>> = Vec::new();
        'expansions: for expanded in &expansions {
            let _span = tracing::debug_span!("match_expansion").entered();
            let local_hints: Vec<LocalHint<G::NodeId>> =
                deduped_hints.iter().map(|h| hints::project_into(h, &expanded.motif)).collect();
            let mut stream = matcher::enumerate(self.graph, &expanded.motif, &local_hints)?;
            let mut candidate_count = 0usize;
            let mut accepted_count = 0usize;
            while let Some(binding) = stream.try_next()? {
                candidate_count += 1;
                let ok = match &ast.predicate {
                    Some(expr) => {
                        let ctx = EvalCtx {
                            graph: self.graph,
                            expanded,
                            edge_names: &edge_names,
                            binding: &binding,
                            engine: self,
                        };
                        predicate::eval(expr, &ctx)?.0
                    }
                    None => true,
                };
                if ok {
                    accepted_count += 1;
                    accepted.push(MatchRow { expanded, binding });
                    if let Some(cap) = early_stop {
                        if accepted.len() as u64 >= cap {
                            tracing::debug!(candidate_count, accepted_count, "expansion matched (early stop)");
                            break 'expansions;
                        }
                    }
                }
            }
            tracing::debug!(candidate_count, accepted_count, "expansion matched");
        }

        let shaped = {
            let _span = tracing::debug_span!("shape").entered();
            if ast.limit.is_none() && self.config.default_limit.is_some() {
                let mut with_default = ast.clone();
                with_default.limit = self.config.default_limit;
                shaper::shape(self.graph, &motif, &edge_names, &with_default, &accepted)?
            } else {
                shaper::shape(self.graph, &motif, &edge_names, ast, &accepted)?
            }
        };
        Ok(shaped)
    }

    /// Runs `child` as an `EXISTS` subquery, with the outer binding's
    /// variables (by name) projected in as a hint, and returns whether at
    /// least one row survives. Stops at the first accepted binding.
    pub fn run_exists(&self, child: &QueryAst, outer_expanded: &ExpandedMotif, outer_binding: &Binding<G::NodeId>) -> Result<bool> {
        let _span = tracing::debug_span!("exists_subquery").entered();
        let (motif, edge_names) = self.prepare(child)?;

        let outer_hint = project_outer_binding(outer_expanded, outer_binding);
        let child_vars: BTreeSet<String> = motif.var_index.keys().cloned().collect();
        let restricted = hints::project(&[outer_hint], &child_vars);
        let doublechecked = hints::doublecheck(self.graph, &motif, &restricted);
        let deduped_hints = hints::eliminate_supersets(&doublechecked);

        let expansions = hop::expand(&motif);
        for expanded in &expansions {
            let local_hints: Vec<LocalHint<G::NodeId>> =
                deduped_hints.iter().map(|h| hints::project_into(h, &expanded.motif)).collect();
            let mut stream = matcher::enumerate(self.graph, &expanded.motif, &local_hints)?;
            while let Some(binding) = stream.try_next()? {
                let ok = match &child.predicate {
                    Some(expr) => {
                        let ctx = EvalCtx {
                            graph: self.graph,
                            expanded,
                            edge_names: &edge_names,
                            binding: &binding,
                            engine: self,
                        };
                        predicate::eval(expr, &ctx)?.0
                    }
                    None => true,
                };
                if ok {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn prepare(&self, ast: &QueryAst) -> Result<(Motif, BTreeMap<String, MotifEdgeIdx>)> {
        validate_predicate_budget(ast.predicate.as_ref(), self.config.predicate_node_budget, self.config.predicate_depth_budget)?;
        let (motif, edge_names, _paths) = {
            let _span = tracing::debug_span!("build_motif").entered();
            motif::build(ast, self.config.max_hop)?
        };
        validate_refs(ast, &motif, &edge_names)?;
        Ok((motif, edge_names))
    }

    /// A row cap usable to stop enumeration early: only valid when nothing
    /// downstream needs the full candidate set first (no ORDER BY, no
    /// DISTINCT, no aggregation).
    fn early_stop_cap(&self, ast: &QueryAst) -> Option<u64> {
        let needs_full_set = !ast.order_by.is_empty() || ast.distinct || ast.projections.iter().any(|p| matches!(p.item, ReturnItem::Agg(_, _)));
        if needs_full_set {
            return None;
        }
        let limit = ast.limit.or(self.config.default_limit)?;
        Some(limit + ast.skip.unwrap_or(0))
    }
}

fn project_outer_binding<Id: Copy + Eq + Ord>(expanded: &ExpandedMotif, binding: &Binding<Id>) -> Hint<Id> {
    expanded
        .motif
        .var_index
        .iter()
        .filter_map(|(name, &idx)| binding.nodes.get(&idx).map(|&id| (name.clone(), id)))
        .collect()
}

fn predicate_node_count(expr: &BoolExpr) -> usize {
    match expr {
        BoolExpr::Compare { .. } | BoolExpr::Between { .. } | BoolExpr::Exists { .. } => 1,
        BoolExpr::Not(inner) => 1 + predicate_node_count(inner),
        BoolExpr::And(children) | BoolExpr::Or(children) => 1 + children.iter().map(predicate_node_count).sum::<usize>(),
    }
}

fn predicate_depth(expr: &BoolExpr) -> usize {
    match expr {
        BoolExpr::Compare { .. } | BoolExpr::Between { .. } | BoolExpr::Exists { .. } => 1,
        BoolExpr::Not(inner) => 1 + predicate_depth(inner),
        BoolExpr::And(children) | BoolExpr::Or(children) => 1 + children.iter().map(predicate_depth).max().unwrap_or(0),
    }
}

fn validate_predicate_budget(expr: Option<&BoolExpr>, node_budget: usize, depth_budget: usize) -> Result<()> {
    let Some(expr) = expr else { return Ok(()) };
    let nodes = predicate_node_count(expr);
    if nodes > node_budget {
        return Err(ValidationError::PredicateTooLarge { actual: nodes, max: node_budget }.into());
    }
    let depth = predicate_depth(expr);
    if depth > depth_budget {
        return Err(ValidationError::PredicateTooDeep { actual: depth, max: depth_budget }.into());
    }
    Ok(())
}

fn is_finite_value(value: &Value) -> bool {
    !matches!(value, Value::Float(f) if !f.is_finite())
}

fn bound_inner(bound: &Bound<Value>) -> Option<&Value> {
    match bound {
        Bound::Included(v) | Bound::Excluded(v) => Some(v),
        Bound::Unbounded => None,
    }
}

fn check_attr_path(path: &AttrPath, motif: &Motif, edge_names: &BTreeMap<String, MotifEdgeIdx>) -> Result<()> {
    motif::check_known_var(&path.root().0, "predicate", motif, edge_names)?;
    Ok(())
}

fn walk_predicate_refs(expr: &BoolExpr, motif: &Motif, edge_names: &BTreeMap<String, MotifEdgeIdx>) -> Result<()> {
    match expr {
        BoolExpr::Compare { op, lhs, rhs } => {
            check_attr_path(lhs, motif, edge_names)?;
            match rhs {
                Scalar::Path(p) => check_attr_path(p, motif, edge_names)?,
                Scalar::Const(value) => {
                    if !is_finite_value(value) {
                        return Err(ValidationError::NonFiniteFloat.into());
                    }
                    if matches!(op, CmpOp::In) {
                        if let Value::List(items) = value {
                            if items.is_empty() {
                                return Err(ValidationError::InListEmpty.into());
                            }
                        }
                    }
                }
            }
            Ok(())
        }
        BoolExpr::Between { path, low, high } => {
            check_attr_path(path, motif, edge_names)?;
            if let Some(v) = bound_inner(low) {
                if !is_finite_value(v) {
                    return Err(ValidationError::NonFiniteFloat.into());
                }
            }
            if let Some(v) = bound_inner(high) {
                if !is_finite_value(v) {
                    return Err(ValidationError::NonFiniteFloat.into());
                }
            }
            if let (Some(lo), Some(hi)) = (bound_inner(low), bound_inner(high)) {
                if lo.partial_cmp(hi) == Some(std::cmp::Ordering::Greater) {
                    return Err(ValidationError::InvalidRangeBounds.into());
                }
            }
            Ok(())
        }
        BoolExpr::Not(inner) => walk_predicate_refs(inner, motif, edge_names),
        BoolExpr::And(children) | BoolExpr::Or(children) => {
            for child in children {
                walk_predicate_refs(child, motif, edge_names)?;
            }
            Ok(())
        }
        // The EXISTS child query declares its own variables and validates
        // itself the moment it runs; nothing here references the outer
        // motif beyond the by-name hint projection `run_exists` performs.
        BoolExpr::Exists { .. } => Ok(()),
    }
}

fn validate_refs(ast: &QueryAst, motif: &Motif, edge_names: &BTreeMap<String, MotifEdgeIdx>) -> Result<()> {
    if let Some(expr) = &ast.predicate {
        walk_predicate_refs(expr, motif, edge_names)?;
    }
    for projection in &ast.projections {
        let path = match &projection.item {
            ReturnItem::Path(p) => p,
            ReturnItem::Agg(_, p) => p,
        };
        motif::check_known_var(&path.root().0, "RETURN", motif, edge_names)?;
    }
    for item in &ast.order_by {
        if let crate::query::ast::OrderKey::Item(ret_item) = &item.key {
            let path = match ret_item {
                ReturnItem::Path(p) => p,
                ReturnItem::Agg(_, p) => p,
            };
            motif::check_known_var(&path.root().0, "ORDER BY", motif, edge_names)?;
        }
    }
    Ok(())
}
