//! Attribute-index pre-filter accelerator (C7).
//!
//! [`ArrayAttributeIndexer`] holds, for a fixed entity list, a per-attribute
//! sorted `(value, id)` array built lazily on first use and memoised behind
//! a small LRU (capacity 4 — building the sorted permutation is the
//! dominant cost, and one predicate tree may probe the same attribute from
//! several branches). [`translate`] turns a WHERE predicate into a small AST
//! over the operators this indexer can accelerate; [`evaluate`] walks that
//! AST against an indexer to produce a `var -> candidate id set` domain.
//!
//! The indexer only ever narrows the search frontier — [`crate::query::engine`]
//! still re-checks every WHERE predicate against the actual bindings the
//! matcher produces, so a wrong or stale domain here can only cost
//! performance, never correctness.

use crate::model::{PropertyGraph, Value};
use crate::query::ast::{AttrPath, BoolExpr, CmpOp, Scalar};
use lru::LruCache;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::rc::Rc;

const QUERIER_CACHE_CAPACITY: usize = 4;

type SortedEntries<Id> = Vec<(Value, Id)>;

/// Sorted-array-or-linear-scan accelerator over one fixed entity list.
pub struct ArrayAttributeIndexer<'g, G: PropertyGraph> {
    graph: &'g G,
    entities: Vec<G::NodeId>,
    /// `None` means every attribute is eligible to be indexed on first use;
    /// `Some(keys)` restricts indexing to a known-hot set, everything else
    /// always falls back to a scan querier.
    indexed_keys: Option<BTreeSet<String>>,
    cache: RefCell<LruCache<String, Rc<SortedEntries<G::NodeId>>>>,
}

impl<'g, G: PropertyGraph> ArrayAttributeIndexer<'g, G> {
    /// Builds an indexer over every node in `graph`, building a sorted
    /// index for any attribute the first time it is queried.
    pub fn new(graph: &'g G) -> Self {
        Self {
            graph,
            entities: graph.node_ids(),
            indexed_keys: None,
            cache: RefCell::new(LruCache::new(NonZeroUsize::new(QUERIER_CACHE_CAPACITY).unwrap())),
        }
    }

    /// Builds an indexer that only ever builds a sorted index for the given
    /// attribute names; any other attribute always uses a scan querier.
    pub fn with_indexed_keys(graph: &'g G, keys: BTreeSet<String>) -> Self {
        Self {
            graph,
            entities: graph.node_ids(),
            indexed_keys: Some(keys),
            cache: RefCell::new(LruCache::new(NonZeroUsize::new(QUERIER_CACHE_CAPACITY).unwrap())),
        }
    }

    fn eligible(&self, prop: &str) -> bool {
        self.indexed_keys.as_ref().is_none_or(|keys| keys.contains(prop))
    }

    /// Candidate ids whose `prop` attribute satisfies `op value`.
    pub fn query(&self, prop: &str, op: CmpOp, value: &Value) -> BTreeSet<G::NodeId> {
        if self.eligible(prop) {
            query_sorted(&self.indexed_entries(prop), op, value)
        } else {
            query_scan(self.graph, &self.entities, prop, op, value)
        }
    }

    fn indexed_entries(&self, prop: &str) -> Rc<SortedEntries<G::NodeId>> {
        if let Some(hit) = self.cache.borrow_mut().get(prop) {
            return hit.clone();
        }
        let built = Rc::new(build_sorted(self.graph, &self.entities, prop));
        self.cache.borrow_mut().put(prop.to_owned(), built.clone());
        built
    }
}

fn build_sorted<G: PropertyGraph>(graph: &G, entities: &[G::NodeId], prop: &str) -> SortedEntries<G::NodeId> {
    let mut entries: SortedEntries<G::NodeId> = entities
        .iter()
        .filter_map(|&id| graph.node_attrs(id).get(prop).cloned().map(|v| (v, id)))
        .filter(|(v, _)| !v.is_null())
        .collect();
    entries.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    entries
}

fn query_scan<G: PropertyGraph>(graph: &G, entities: &[G::NodeId], prop: &str, op: CmpOp, value: &Value) -> BTreeSet<G::NodeId> {
    entities
        .iter()
        .copied()
        .filter(|&id| {
            let attrs = graph.node_attrs(id);
            let stored = attrs.get(prop);
            stored.is_some_and(|v| crate::query::predicate::compare_values(op, v, value))
        })
        .collect()
}

fn query_sorted<Id: Copy + Ord>(entries: &[(Value, Id)], op: CmpOp, value: &Value) -> BTreeSet<Id> {
    let lower = entries.partition_point(|(v, _)| matches!(v.partial_cmp(value), Some(std::cmp::Ordering::Less)));
    let upper = entries.partition_point(|(v, _)| {
        matches!(v.partial_cmp(value), Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal))
    });
    match op {
        CmpOp::Eq => entries[lower..upper].iter().map(|(_, id)| *id).collect(),
        CmpOp::Ne => entries[..lower]
            .iter()
            .chain(entries[upper..].iter())
            .map(|(_, id)| *id)
            .collect(),
        CmpOp::Lt => entries[..lower].iter().map(|(_, id)| *id).collect(),
        CmpOp::Le => entries[..upper].iter().map(|(_, id)| *id).collect(),
        CmpOp::Gt => entries[upper..].iter().map(|(_, id)| *id).collect(),
        CmpOp::Ge => entries[lower..].iter().map(|(_, id)| *id).collect(),
        _ => BTreeSet::new(),
    }
}

/// Predicate-tree fragment the indexer knows how to turn into a domain.
#[derive(Clone, Debug)]
pub enum DomainExpr {
    /// A leaf comparison of `var.prop op literal`.
    Compare {
        /// Motif variable the comparison is rooted at.
        var: String,
        /// Attribute name being compared.
        prop: String,
        /// Comparison operator (always one of the six order operators).
        op: CmpOp,
        /// Literal right-hand side.
        value: Value,
    },
    /// Conjunction; narrows by intersecting overlapping variable domains.
    And(Box<DomainExpr>, Box<DomainExpr>),
    /// Disjunction; narrows only variables present on every branch.
    Or(Box<DomainExpr>, Box<DomainExpr>),
    /// A leaf that imposes no constraint translatable into a domain (e.g. a
    /// comparison against another attribute path rather than a literal).
    /// Neutral under `And`, but does not poison an enclosing `Or`.
    Skip,
    /// A leaf or subtree this translator cannot reason about at all (`NOT`,
    /// `EXISTS`, or an operator outside the six order operators). Poisons
    /// an enclosing `Or` to "unknown" since the untranslatable branch could
    /// still admit hosts the translatable branches would otherwise exclude.
    UnsupportedOp,
}

const INDEXABLE_OPS: [CmpOp; 6] = [CmpOp::Eq, CmpOp::Ne, CmpOp::Lt, CmpOp::Le, CmpOp::Gt, CmpOp::Ge];

/// Walks a WHERE predicate tree, producing the [`DomainExpr`] the indexer
/// can use to pre-filter candidates. Purely syntactic — no graph access.
pub fn translate(expr: &BoolExpr) -> DomainExpr {
    match expr {
        BoolExpr::Compare { op, lhs, rhs } if INDEXABLE_OPS.contains(op) => match (lhs, rhs) {
            (AttrPath::Prop(var, prop), Scalar::Const(value)) => DomainExpr::Compare {
                var: var.0.clone(),
                prop: prop.clone(),
                op: *op,
                value: value.clone(),
            },
            _ => DomainExpr::Skip,
        },
        BoolExpr::Compare { .. } => DomainExpr::Skip,
        BoolExpr::Between { path, low, high } => {
            let (AttrPath::Prop(var, prop), low_v, high_v) = (path, bound_value(low), bound_value(high)) else {
                return DomainExpr::Skip;
            };
            match (low_v, high_v) {
                (Some(lo), Some(hi)) => DomainExpr::And(
                    Box::new(DomainExpr::Compare {
                        var: var.0.clone(),
                        prop: prop.clone(),
                        op: CmpOp::Ge,
                        value: lo,
                    }),
                    Box::new(DomainExpr::Compare {
                        var: var.0.clone(),
                        prop: prop.clone(),
                        op: CmpOp::Le,
                        value: hi,
                    }),
                ),
                (Some(lo), None) => DomainExpr::Compare {
                    var: var.0.clone(),
                    prop: prop.clone(),
                    op: CmpOp::Ge,
                    value: lo,
                },
                (None, Some(hi)) => DomainExpr::Compare {
                    var: var.0.clone(),
                    prop: prop.clone(),
                    op: CmpOp::Le,
                    value: hi,
                },
                (None, None) => DomainExpr::Skip,
            }
        }
        BoolExpr::And(children) => children
            .iter()
            .map(translate)
            .reduce(|a, b| DomainExpr::And(Box::new(a), Box::new(b)))
            .unwrap_or(DomainExpr::Skip),
        BoolExpr::Or(children) => children
            .iter()
            .map(translate)
            .reduce(|a, b| DomainExpr::Or(Box::new(a), Box::new(b)))
            .unwrap_or(DomainExpr::Skip),
        BoolExpr::Not(_) | BoolExpr::Exists { .. } => DomainExpr::UnsupportedOp,
    }
}

fn bound_value(bound: &std::ops::Bound<Value>) -> Option<Value> {
    match bound {
        std::ops::Bound::Included(v) => Some(v.clone()),
        std::ops::Bound::Excluded(_) | std::ops::Bound::Unbounded => None,
    }
}

type Domain<Id> = BTreeMap<String, BTreeSet<Id>>;

/// Evaluates a translated predicate against an indexer, producing a
/// `var -> candidate id set` domain, or `None` if nothing in the tree could
/// be narrowed (e.g. a bare `NOT`/`EXISTS` at the top).
pub fn evaluate<G: PropertyGraph>(expr: &DomainExpr, indexer: &ArrayAttributeIndexer<G>) -> Option<Domain<G::NodeId>> {
    match expr {
        DomainExpr::Compare { var, prop, op, value } => {
            let mut domain = Domain::new();
            domain.insert(var.clone(), indexer.query(prop, *op, value));
            Some(domain)
        }
        DomainExpr::Skip => Some(Domain::new()),
        DomainExpr::UnsupportedOp => None,
        DomainExpr::And(a, b) => {
            let a = evaluate(a, indexer).unwrap_or_default();
            let b = evaluate(b, indexer).unwrap_or_default();
            Some(merge_and(a, b))
        }
        DomainExpr::Or(a, b) => {
            let a = evaluate(a, indexer)?;
            let b = evaluate(b, indexer)?;
            Some(merge_or(&a, &b))
        }
    }
}

fn merge_and<Id: Ord + Clone>(mut a: Domain<Id>, b: Domain<Id>) -> Domain<Id> {
    for (k, v) in b {
        a.entry(k)
            .and_modify(|existing| *existing = existing.intersection(&v).cloned().collect())
            .or_insert(v);
    }
    a
}

fn merge_or<Id: Ord + Clone>(a: &Domain<Id>, b: &Domain<Id>) -> Domain<Id> {
    let mut out = Domain::new();
    for (k, v) in a {
        if let Some(bv) = b.get(k) {
            out.insert(k.clone(), v.union(bv).cloned().collect());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{attrs, NamedGraphBuilder, Value};

    fn sample_graph() -> crate::model::InMemoryGraph {
        let mut g = NamedGraphBuilder::new();
        for (name, age) in [("alice", 25), ("bob", 30), ("carol", 25)] {
            let mut a = attrs();
            a.insert("age".into(), Value::Int(age));
            g.node(name, &[], a);
        }
        g.build().0
    }

    #[test]
    fn indexed_and_scan_queriers_agree() {
        let graph = sample_graph();
        let indexed = ArrayAttributeIndexer::new(&graph);
        let scanned = ArrayAttributeIndexer::with_indexed_keys(&graph, BTreeSet::new());
        let lhs = indexed.query("age", CmpOp::Ge, &Value::Int(30));
        let rhs = scanned.query("age", CmpOp::Ge, &Value::Int(30));
        assert_eq!(lhs, rhs);
        assert_eq!(lhs.len(), 1);
    }

    #[test]
    fn and_intersects_common_keys() {
        let graph = sample_graph();
        let indexer = ArrayAttributeIndexer::new(&graph);
        let expr = DomainExpr::And(
            Box::new(DomainExpr::Compare {
                var: "n".into(),
                prop: "age".into(),
                op: CmpOp::Ge,
                value: Value::Int(25),
            }),
            Box::new(DomainExpr::Compare {
                var: "n".into(),
                prop: "age".into(),
                op: CmpOp::Lt,
                value: Value::Int(30),
            }),
        );
        let domain = evaluate(&expr, &indexer).unwrap();
        assert_eq!(domain["n"].len(), 2);
    }

    #[test]
    fn or_with_unsupported_branch_collapses_to_none() {
        let graph = sample_graph();
        let indexer = ArrayAttributeIndexer::new(&graph);
        let expr = DomainExpr::Or(
            Box::new(DomainExpr::Compare {
                var: "n".into(),
                prop: "age".into(),
                op: CmpOp::Eq,
                value: Value::Int(25),
            }),
            Box::new(DomainExpr::UnsupportedOp),
        );
        assert!(evaluate(&expr, &indexer).is_none());
    }
}
