//! Core data model: typed property values and the host-graph adapter (C1).
//!
//! The engine never assumes a concrete graph storage layer. [`PropertyGraph`]
//! is the uniform read interface every host container must provide; this
//! module also ships [`InMemoryGraph`], a reference implementation used by
//! the engine's own test suite and suitable as the default adapter for
//! embedders that have no other graph storage layer of their own.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::Hash;

/// Typed scalar (or list) value stored on nodes/edges and carried by
/// predicate literals.
///
/// `Value` is shared between the host graph's property maps and the query
/// layer's literal constants, so a `WHERE a.age > 30` comparison never needs
/// a conversion step between "stored" and "literal" representations.
#[derive(Clone, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    /// Absence of a value, or an attribute that was never set.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit floating point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// A list of values, used for label sets and `IN` literals.
    List(Vec<Value>),
    /// A keyed map, used by the result shaper to return a whole node's
    /// attribute map, or to represent a multigraph edge-attribute column
    /// keyed by `"{key}:{label}"` (see [`crate::query::shaper`]).
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns true if this value is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrows the string payload, if this is a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Borrows the list payload, if this is a [`Value::List`].
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Borrows the map payload, if this is a [`Value::Map`].
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Widens `Int`/`Float` to `f64` for arithmetic comparisons. Returns
    /// `None` for any other variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<&[&str]> for Value {
    fn from(values: &[&str]) -> Self {
        Value::List(values.iter().map(|s| Value::String((*s).to_owned())).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

/// Attribute map carried by a node or an edge. Keyed by `String` and backed
/// by a `BTreeMap` so iteration order (and therefore any derived ordering in
/// the result shaper) is deterministic.
pub type Attrs = BTreeMap<String, Value>;

/// Builds a fresh, empty attribute map. Convenience for call sites that
/// would otherwise need the full `BTreeMap::new()` spelling.
pub fn attrs() -> Attrs {
    BTreeMap::new()
}

/// Reads the distinguished `labels` attribute out of an attribute map,
/// returning an empty set if it is absent or not a list of strings.
pub fn labels_of(attrs: &Attrs) -> BTreeSet<String> {
    match attrs.get("labels") {
        Some(Value::List(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(|s| s.to_owned()))
            .collect(),
        _ => BTreeSet::new(),
    }
}

/// Builds a `labels` attribute value from a set of label strings.
pub fn labels_value<I, S>(labels: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::List(labels.into_iter().map(|s| Value::String(s.into())).collect())
}

/// Non-negative integer distinguishing parallel edges between the same
/// ordered pair of nodes. `0` is used whenever the host has at most one
/// edge per ordered pair.
pub type EdgeKey = u32;

/// The merged view of every parallel edge between an ordered pair of nodes:
/// the union of their `labels`, plus each edge key's attribute map verbatim.
///
/// See [`PropertyGraph::aggregated_edge`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregatedEdge {
    /// Union of `labels` across every parallel edge for this pair.
    pub labels: BTreeSet<String>,
    /// Per-edge-key attribute maps, verbatim.
    pub per_key: BTreeMap<EdgeKey, Attrs>,
}

impl AggregatedEdge {
    /// Attribute map for a specific edge key, if present.
    pub fn attrs_for(&self, key: EdgeKey) -> Option<&Attrs> {
        self.per_key.get(&key)
    }
}

/// Uniform read interface over a directed, possibly-multi-edge property
/// graph.
///
/// Implementations are never asked to mutate anything; the engine only
/// reads through `&self`. Missing nodes/edges are represented as empty or
/// absent values rather than errors — the matcher relies on this to treat
/// "no such attribute" as "predicate is false" rather than as a fault.
pub trait PropertyGraph {
    /// The host's native node identifier type.
    type NodeId: Copy + Eq + Hash + Ord + fmt::Debug;

    /// Every node id in the graph, in a stable (implementation-defined)
    /// order.
    fn node_ids(&self) -> Vec<Self::NodeId>;

    /// Whether `id` names a node in this graph.
    fn has_node(&self, id: Self::NodeId) -> bool;

    /// Attribute map for a node, including the distinguished `labels` entry.
    /// Returns an empty map for an absent node rather than failing.
    fn node_attrs(&self, id: Self::NodeId) -> Attrs;

    /// Nodes reachable from `id` via one outgoing edge (deduplicated).
    fn out_neighbors(&self, id: Self::NodeId) -> Vec<Self::NodeId>;

    /// Nodes that reach `id` via one outgoing edge (deduplicated).
    fn in_neighbors(&self, id: Self::NodeId) -> Vec<Self::NodeId>;

    /// Whether at least one edge exists from `u` to `v`.
    fn has_edge(&self, u: Self::NodeId, v: Self::NodeId) -> bool;

    /// Every parallel edge key from `u` to `v`. Single-edge graphs return
    /// `[0]` when an edge exists, `[]` otherwise.
    fn edge_keys(&self, u: Self::NodeId, v: Self::NodeId) -> Vec<EdgeKey>;

    /// Attribute map for one specific parallel edge, or `None` if that key
    /// does not exist between `u` and `v`.
    fn edge_attrs(&self, u: Self::NodeId, v: Self::NodeId, key: EdgeKey) -> Option<Attrs>;

    /// Whether this host may have more than one edge per ordered pair.
    fn is_multi(&self) -> bool;

    /// Renders a node id as a [`Value`], used by the `id(var)` query
    /// function and by RETURN of an identity column. Hosts whose ids are
    /// not naturally representable may fall back to a string rendering.
    fn id_value(&self, id: Self::NodeId) -> Value;

    /// Merges every parallel edge from `u` to `v` into one aggregated view:
    /// the union of their `labels`, plus each key's attributes verbatim.
    /// Returns `None` when `u` and `v` have no edge at all.
    fn aggregated_edge(&self, u: Self::NodeId, v: Self::NodeId) -> Option<AggregatedEdge> {
        let keys = self.edge_keys(u, v);
        if keys.is_empty() {
            return None;
        }
        let mut merged = AggregatedEdge::default();
        for key in keys {
            if let Some(attrs) = self.edge_attrs(u, v, key) {
                merged.labels.extend(labels_of(&attrs));
                merged.per_key.insert(key, attrs);
            }
        }
        Some(merged)
    }
}

/// Reference in-memory implementation of [`PropertyGraph`].
///
/// Node ids are dense `u64`s assigned on insertion. Properties are kept in
/// `BTreeMap`s for deterministic iteration, mirroring how this codebase's
/// other property containers are organized. A `label -> node id set` side
/// index speeds up label-only scans without requiring callers to build an
/// index themselves.
#[derive(Debug, Clone)]
pub struct InMemoryGraph {
    multi: bool,
    next_node_id: u64,
    nodes: BTreeMap<u64, Attrs>,
    out_adj: BTreeMap<u64, BTreeSet<u64>>,
    in_adj: BTreeMap<u64, BTreeSet<u64>>,
    edges: BTreeMap<(u64, u64), BTreeMap<EdgeKey, Attrs>>,
    label_index: HashMap<String, BTreeSet<u64>>,
}

impl InMemoryGraph {
    /// Creates an empty graph. `multi` fixes whether more than one edge per
    /// ordered pair is permitted; it cannot be changed after construction.
    pub fn new(multi: bool) -> Self {
        Self {
            multi,
            next_node_id: 1,
            nodes: BTreeMap::new(),
            out_adj: BTreeMap::new(),
            in_adj: BTreeMap::new(),
            edges: BTreeMap::new(),
            label_index: HashMap::new(),
        }
    }

    /// Inserts a node with the given attributes (which may include
    /// `labels`) and returns its freshly assigned id.
    pub fn add_node(&mut self, attrs: Attrs) -> u64 {
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.index_labels(id, &attrs);
        self.nodes.insert(id, attrs);
        id
    }

    fn index_labels(&mut self, id: u64, attrs: &Attrs) {
        for label in labels_of(attrs) {
            self.label_index.entry(label).or_default().insert(id);
        }
    }

    /// Every node id carrying the given label.
    pub fn nodes_with_label(&self, label: &str) -> BTreeSet<u64> {
        self.label_index.get(label).cloned().unwrap_or_default()
    }

    /// Adds an edge from `u` to `v` with the given attributes, returning the
    /// edge key it was stored under. For single-edge graphs this is always
    /// `0` and a second call between the same pair overwrites the first; for
    /// multigraphs each call allocates the next unused key for that pair.
    pub fn add_edge(&mut self, u: u64, v: u64, attrs: Attrs) -> EdgeKey {
        self.out_adj.entry(u).or_default().insert(v);
        self.in_adj.entry(v).or_default().insert(u);
        let slot = self.edges.entry((u, v)).or_default();
        let key = if self.multi {
            slot.keys().next_back().map(|k| k + 1).unwrap_or(0)
        } else {
            0
        };
        slot.insert(key, attrs);
        key
    }
}

impl PropertyGraph for InMemoryGraph {
    type NodeId = u64;

    fn node_ids(&self) -> Vec<u64> {
        self.nodes.keys().copied().collect()
    }

    fn has_node(&self, id: u64) -> bool {
        self.nodes.contains_key(&id)
    }

    fn node_attrs(&self, id: u64) -> Attrs {
        self.nodes.get(&id).cloned().unwrap_or_default()
    }

    fn out_neighbors(&self, id: u64) -> Vec<u64> {
        self.out_adj.get(&id).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }

    fn in_neighbors(&self, id: u64) -> Vec<u64> {
        self.in_adj.get(&id).map(|s| s.iter().copied().collect()).unwrap_or_default()
    }

    fn has_edge(&self, u: u64, v: u64) -> bool {
        self.edges.get(&(u, v)).is_some_and(|m| !m.is_empty())
    }

    fn edge_keys(&self, u: u64, v: u64) -> Vec<EdgeKey> {
        self.edges.get(&(u, v)).map(|m| m.keys().copied().collect()).unwrap_or_default()
    }

    fn edge_attrs(&self, u: u64, v: u64, key: EdgeKey) -> Option<Attrs> {
        self.edges.get(&(u, v)).and_then(|m| m.get(&key)).cloned()
    }

    fn is_multi(&self) -> bool {
        self.multi
    }

    fn id_value(&self, id: u64) -> Value {
        Value::Int(id as i64)
    }
}

/// Ergonomic builder that lets callers (tests, examples) name nodes with a
/// string handle while the underlying [`InMemoryGraph`] only ever stores
/// dense `u64` ids. This mirrors the illustrative scenarios in the
/// specification, which name host nodes `"x"`, `"y"`, `"z"`, etc.
#[derive(Debug, Default)]
pub struct NamedGraphBuilder {
    graph: InMemoryGraphDraft,
    names: HashMap<String, u64>,
}

#[derive(Debug)]
struct InMemoryGraphDraft(InMemoryGraph);

impl Default for InMemoryGraphDraft {
    fn default() -> Self {
        InMemoryGraphDraft(InMemoryGraph::new(true))
    }
}

impl NamedGraphBuilder {
    /// Creates a builder over an empty multigraph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder over an empty graph, fixing whether it allows
    /// parallel edges.
    pub fn with_multi(multi: bool) -> Self {
        Self {
            graph: InMemoryGraphDraft(InMemoryGraph::new(multi)),
            names: HashMap::new(),
        }
    }

    /// Registers (or reuses) a named node, merging the supplied attributes
    /// and labels into any attributes already set for that name.
    pub fn node<S>(&mut self, name: S, labels: &[&str], props: Attrs) -> u64
    where
        S: Into<String>,
    {
        let name = name.into();
        if let Some(&id) = self.names.get(&name) {
            let existing = self.graph.0.nodes.entry(id).or_default();
            existing.extend(props);
            if !labels.is_empty() {
                let mut merged = labels_of(existing);
                merged.extend(labels.iter().map(|s| s.to_string()));
                existing.insert("labels".to_string(), labels_value(merged));
            }
            self.graph.0.index_labels(id, &existing.clone());
            return id;
        }
        let mut attrs = props;
        if !labels.is_empty() {
            attrs.insert("labels".to_string(), labels_value(labels.iter().copied()));
        }
        let id = self.graph.0.add_node(attrs);
        self.names.insert(name, id);
        id
    }

    /// Adds an edge between two named nodes (creating them bare, with no
    /// labels, if not already registered), returning the allocated edge key.
    pub fn edge<S>(&mut self, from: S, to: S, edge_type: Option<&str>, props: Attrs) -> EdgeKey
    where
        S: Into<String> + Clone,
    {
        let u = self.node(from, &[], attrs());
        let v = self.node(to, &[], attrs());
        let mut attrs = props;
        if let Some(ty) = edge_type {
            attrs.insert("labels".to_string(), labels_value([ty]));
        }
        self.graph.0.add_edge(u, v, attrs)
    }

    /// Looks up the host id assigned to a previously registered name.
    pub fn id_of(&self, name: &str) -> Option<u64> {
        self.names.get(name).copied()
    }

    /// Consumes the builder, returning the finished graph and the
    /// name-to-id table (useful for asserting on results by name in tests).
    pub fn build(self) -> (InMemoryGraph, HashMap<String, u64>) {
        (self.graph.0, self.names)
    }
}
