//! Subgraph-monomorphism enumeration against the host graph (C5).
//!
//! The matcher is a pull-based pipeline, mirroring this codebase's executor
//! idiom (`BindingStream::try_next`) rather than a blanket `Iterator` impl,
//! so combinators can surface host-graph errors instead of swallowing them —
//! even though, per the matcher's own failure semantics, only a handful of
//! internal invariants are fallible; a missing attribute is "not a match",
//! never an error.
//!
//! Enumeration happens in three layers:
//! - [`ComponentSearchStream`] runs an explicit-stack backtracking search
//!   over one weakly-connected component of the motif, producing one
//!   [`Binding`] restricted to that component's variables per `try_next`
//!   call (the "coroutine-style lazy iteration" the design notes call for).
//! - Each component's stream is drained once into a `Vec` (components are
//!   small; materializing them lets the cross-component join revisit rows).
//! - [`CartesianStream`] lazily walks the cross product of the materialized
//!   per-component rows into complete motif bindings, using an odometer
//!   counter so `LIMIT` can stop pulling without ever materializing the full
//!   product.
//!
//! Hints restrict rather than merely order the search: when the caller
//! supplies hints, each component is searched once per hint that touches
//! it (with the hinted variables' domains collapsed to a single id) and the
//! results are de-duplicated, so the final binding set is a subset of what
//! an unhinted search would produce.

use crate::error::Result;
use crate::model::{labels_of, PropertyGraph, Value};
use crate::query::motif::{EdgeDir, Motif, MotifEdge, MotifNodeIdx};
use std::collections::{BTreeMap, BTreeSet};

/// A mapping from motif variable (by arena index, in the *expanded* motif)
/// to the host node id bound to it.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Binding<Id: Copy + Eq + Ord> {
    /// Node bindings, keyed by expanded-motif node index.
    pub nodes: BTreeMap<MotifNodeIdx, Id>,
}

/// A restriction of one or more expanded-motif variables to a single host
/// id, expressed in the expanded motif's own index space. Produced by
/// projecting a caller/indexer [`crate::query::hints::Hint`] through a
/// specific expansion's `var_index`.
pub type LocalHint<Id> = BTreeMap<MotifNodeIdx, Id>;

/// Pull-based stream over candidate bindings, mirroring this codebase's
/// `BindingStream` executor trait.
pub trait BindingStream<Id: Copy + Eq + Ord> {
    /// Produces the next binding, or `None` once exhausted.
    fn try_next(&mut self) -> Result<Option<Binding<Id>>>;
}

/// Boxed, owned stream handle.
pub type BoxStream<'a, Id> = Box<dyn BindingStream<Id> + 'a>;

fn values_equal(a: &Value, b: &Value) -> bool {
    a.partial_cmp(b) == Some(std::cmp::Ordering::Equal)
}

/// Whether a host node's attribute map satisfies a motif node's constraints:
/// its required label set is a subset of the host's labels (an empty
/// requirement matches anything) and every inline property constraint
/// equals the corresponding host attribute.
pub fn node_matches(attrs: &crate::model::Attrs, node: &crate::query::motif::MotifNode) -> bool {
    if !node.labels.is_empty() {
        let host_labels = labels_of(attrs);
        if !node.labels.is_subset(&host_labels) {
            return false;
        }
    }
    node.props
        .iter()
        .all(|(k, v)| attrs.get(k).is_some_and(|hv| values_equal(hv, v)))
}

fn edge_key_matches(attrs: &crate::model::Attrs, edge: &MotifEdge) -> bool {
    if !edge.types.is_empty() {
        let host_labels = labels_of(attrs);
        if !edge.types.iter().any(|t| host_labels.contains(t)) {
            return false;
        }
    }
    edge.props
        .iter()
        .all(|(k, v)| attrs.get(k).is_some_and(|hv| values_equal(hv, v)))
}

/// Whether some parallel edge from `u` to `v` (merged across keys) satisfies
/// a motif edge's type/property constraints. `Bidirectional` edges are
/// satisfied by either direction independently.
pub fn edge_matches<G: PropertyGraph>(graph: &G, u: G::NodeId, v: G::NodeId, edge: &MotifEdge) -> bool {
    let forward_ok = graph
        .aggregated_edge(u, v)
        .is_some_and(|agg| agg.per_key.values().any(|attrs| edge_key_matches(attrs, edge)));
    match edge.direction {
        EdgeDir::Forward => forward_ok,
        EdgeDir::Bidirectional => {
            forward_ok
                || graph
                    .aggregated_edge(v, u)
                    .is_some_and(|agg| agg.per_key.values().any(|attrs| edge_key_matches(attrs, edge)))
        }
    }
}

/// Explicit-stack backtracking search over one connected component of a
/// motif. Exposed as a [`BindingStream`] so the caller can pull solutions
/// one at a time; internally it is a standard "generator via saved state"
/// translation of recursive backtracking, advancing a per-depth cursor and
/// replaying the last assignment's cursor position on the call after a
/// solution was emitted.
pub struct ComponentSearchStream<'g, G: PropertyGraph> {
    graph: &'g G,
    motif: &'g Motif,
    order: Vec<MotifNodeIdx>,
    domains: Vec<Vec<G::NodeId>>,
    assigned: Vec<Option<G::NodeId>>,
    cursor: Vec<usize>,
    depth: usize,
    pending_backtrack: bool,
    done: bool,
}

impl<'g, G: PropertyGraph> ComponentSearchStream<'g, G> {
    /// Builds a search over `component` (node indices of one weakly
    /// connected part of `motif`). `fixed` restricts any of those
    /// variables' domains to a single host id (used to honor a hint).
    pub fn new(graph: &'g G, motif: &'g Motif, component: &[MotifNodeIdx], fixed: &LocalHint<G::NodeId>) -> Self {
        let order: Vec<MotifNodeIdx> = component.to_vec();
        let mut domains = Vec::with_capacity(order.len());
        let mut impossible = false;
        for &idx in &order {
            let node = &motif.nodes[idx];
            let domain = if let Some(&fixed_id) = fixed.get(&idx) {
                if graph.has_node(fixed_id) && node_matches(&graph.node_attrs(fixed_id), node) {
                    vec![fixed_id]
                } else {
                    Vec::new()
                }
            } else {
                graph
                    .node_ids()
                    .into_iter()
                    .filter(|&id| node_matches(&graph.node_attrs(id), node))
                    .collect()
            };
            if domain.is_empty() {
                impossible = true;
            }
            domains.push(domain);
        }
        let n = order.len();
        Self {
            graph,
            motif,
            order,
            domains,
            assigned: vec![None; n],
            cursor: vec![0; n + 1],
            depth: 0,
            pending_backtrack: false,
            done: impossible,
        }
    }

    fn is_consistent(&self, depth: usize, candidate: G::NodeId) -> bool {
        if self.assigned[..depth].iter().flatten().any(|&id| id == candidate) {
            return false;
        }
        let var = self.order[depth];
        for &edge_idx in &self.motif.adjacency[var] {
            let edge = &self.motif.edges[edge_idx];
            let (other, as_from) = if edge.from == var {
                (edge.to, true)
            } else {
                (edge.from, false)
            };
            if other == var {
                continue; // self-loop edges are not produced by this engine's hop expansion
            }
            let Some(other_pos) = self.order[..depth].iter().position(|&v| v == other) else {
                continue;
            };
            let Some(other_id) = self.assigned[other_pos] else {
                continue;
            };
            let (u, v) = if as_from { (candidate, other_id) } else { (other_id, candidate) };
            if !edge_matches(self.graph, u, v, edge) {
                return false;
            }
        }
        true
    }

    fn build_binding(&self) -> Binding<G::NodeId> {
        let mut nodes = BTreeMap::new();
        for (pos, &var) in self.order.iter().enumerate() {
            if let Some(id) = self.assigned[pos] {
                nodes.insert(var, id);
            }
        }
        Binding { nodes }
    }
}

impl<'g, G: PropertyGraph> BindingStream<G::NodeId> for ComponentSearchStream<'g, G> {
    fn try_next(&mut self) -> Result<Option<Binding<G::NodeId>>> {
        if self.done {
            return Ok(None);
        }
        if self.order.is_empty() {
            // A component with no nodes never occurs in practice, but an
            // empty component trivially has exactly one (empty) solution.
            self.done = true;
            return Ok(Some(Binding::default()));
        }
        if self.pending_backtrack {
            self.pending_backtrack = false;
            self.depth -= 1;
        }
        loop {
            if self.depth == self.order.len() {
                self.pending_backtrack = true;
                return Ok(Some(self.build_binding()));
            }
            let mut advanced = false;
            while self.cursor[self.depth] < self.domains[self.depth].len() {
                let candidate = self.domains[self.depth][self.cursor[self.depth]];
                self.cursor[self.depth] += 1;
                if self.is_consistent(self.depth, candidate) {
                    self.assigned[self.depth] = Some(candidate);
                    self.depth += 1;
                    self.cursor[self.depth] = 0;
                    advanced = true;
                    break;
                }
            }
            if advanced {
                continue;
            }
            if self.depth == 0 {
                self.done = true;
                return Ok(None);
            }
            self.depth -= 1;
        }
    }
}

/// Lazily walks the cross product of several materialized per-component
/// binding lists, merging one row from each into a complete binding per
/// `try_next` call via a mixed-radix counter (an "odometer").
pub struct CartesianStream<Id: Copy + Eq + Ord> {
    components: Vec<Vec<Binding<Id>>>,
    counters: Vec<usize>,
    done: bool,
}

impl<Id: Copy + Eq + Ord> CartesianStream<Id> {
    /// Builds a stream over the cross product of `components`. Any empty
    /// component makes the whole product empty.
    pub fn new(components: Vec<Vec<Binding<Id>>>) -> Self {
        let done = components.iter().any(Vec::is_empty);
        let counters = vec![0; components.len()];
        Self { components, counters, done }
    }
}

impl<Id: Copy + Eq + Ord> BindingStream<Id> for CartesianStream<Id> {
    fn try_next(&mut self) -> Result<Option<Binding<Id>>> {
        if self.done {
            return Ok(None);
        }
        let mut merged = Binding::default();
        for (ci, comp) in self.components.iter().enumerate() {
            merged.nodes.extend(comp[self.counters[ci]].nodes.iter().map(|(&k, &v)| (k, v)));
        }
        let mut i = 0;
        loop {
            if i == self.counters.len() {
                self.done = true;
                break;
            }
            self.counters[i] += 1;
            if self.counters[i] < self.components[i].len() {
                break;
            }
            self.counters[i] = 0;
            i += 1;
        }
        Ok(Some(merged))
    }
}

/// Chains several streams in sequence, optionally de-duplicating rows
/// across them (used when joining results across expanded motifs, where
/// two different hop-length expansions could otherwise emit the same
/// binding).
pub struct UnionStream<'a, Id: Copy + Eq + Ord> {
    inputs: Vec<BoxStream<'a, Id>>,
    current: usize,
    seen: Option<BTreeSet<BTreeMap<MotifNodeIdx, Id>>>,
}

impl<'a, Id: Copy + Eq + Ord> UnionStream<'a, Id> {
    /// Builds a union over `inputs`, de-duplicating identical bindings
    /// across branches when `dedup` is set.
    pub fn new(inputs: Vec<BoxStream<'a, Id>>, dedup: bool) -> Self {
        Self {
            inputs,
            current: 0,
            seen: dedup.then(BTreeSet::new),
        }
    }
}

impl<'a, Id: Copy + Eq + Ord> BindingStream<Id> for UnionStream<'a, Id> {
    fn try_next(&mut self) -> Result<Option<Binding<Id>>> {
        while self.current < self.inputs.len() {
            match self.inputs[self.current].try_next()? {
                Some(row) => {
                    if let Some(seen) = self.seen.as_mut() {
                        if !seen.insert(row.nodes.clone()) {
                            continue;
                        }
                    }
                    return Ok(Some(row));
                }
                None => self.current += 1,
            }
        }
        Ok(None)
    }
}

/// Drains a component search to completion, de-duplicating across the
/// (possibly several, one per relevant hint) searches that were run for it.
fn materialize_component<G: PropertyGraph>(
    graph: &G,
    motif: &Motif,
    component: &[MotifNodeIdx],
    local_hints: &[LocalHint<G::NodeId>],
) -> Result<Vec<Binding<G::NodeId>>> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    let empty_hint = LocalHint::new();
    let variants: Vec<&LocalHint<G::NodeId>> = if local_hints.is_empty() {
        vec![&empty_hint]
    } else {
        local_hints.iter().collect()
    };
    for hint in variants {
        let mut stream = ComponentSearchStream::new(graph, motif, component, hint);
        while let Some(binding) = stream.try_next()? {
            if seen.insert(binding.nodes.clone()) {
                out.push(binding);
            }
        }
    }
    Ok(out)
}

/// Enumerates every complete binding of `motif` against `graph`, honoring
/// `local_hints` (each a partial binding in the motif's own index space;
/// pass an empty slice for an unrestricted search). Bindings are produced
/// eagerly per component (components are small) and then joined lazily.
pub fn enumerate<G: PropertyGraph>(
    graph: &G,
    motif: &Motif,
    local_hints: &[LocalHint<G::NodeId>],
) -> Result<CartesianStream<G::NodeId>> {
    let mut per_component = Vec::new();
    for component in motif.components() {
        let relevant: Vec<LocalHint<G::NodeId>> = local_hints
            .iter()
            .map(|h| {
                h.iter()
                    .filter(|(k, _)| component.contains(k))
                    .map(|(&k, &v)| (k, v))
                    .collect()
            })
            .collect();
        per_component.push(materialize_component(graph, motif, &component, &relevant)?);
    }
    Ok(CartesianStream::new(per_component))
}
