//! Compiles a [`QueryAst`] into a motif: a small directed multigraph whose
//! nodes are query variables (C2).
//!
//! The motif is kept as an arena of node records plus an adjacency list
//! indexed by small integer handles (`MotifNodeIdx`, `MotifEdgeIdx`), with a
//! side table mapping variable names to arena indices. This sidesteps the
//! ownership cycles a pointer- or name-keyed graph representation would
//! introduce for what is, after all, a graph of its own.

use crate::error::ValidationError;
use crate::model::Value;
use crate::query::ast::{EdgeClause, EdgeDirection, QueryAst};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Arena index of a motif node.
pub type MotifNodeIdx = usize;
/// Arena index of a motif edge.
pub type MotifEdgeIdx = usize;

/// A query-local variable's constraints: required labels and inline
/// property equalities.
#[derive(Clone, Debug, Default)]
pub struct MotifNode {
    /// Variable name, as written in the query (or a generated token for an
    /// anonymous node).
    pub var: String,
    /// Required label set. A host node matches if this set is a subset of
    /// its own labels; an empty set matches any node.
    pub labels: BTreeSet<String>,
    /// Inline property equality constraints.
    pub props: Vec<(String, Value)>,
}

/// Direction of a motif edge once `Incoming` has been normalized away by
/// swapping `from`/`to` at build time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EdgeDir {
    /// Host edge must run from `from` to `to`.
    Forward,
    /// Host edge may run in either direction between `from` and `to`.
    Bidirectional,
}

/// A motif edge between two motif nodes.
#[derive(Clone, Debug)]
pub struct MotifEdge {
    /// Source node (already normalized for direction).
    pub from: MotifNodeIdx,
    /// Target node (already normalized for direction).
    pub to: MotifNodeIdx,
    /// Bound name (`[r:...]`), if any.
    pub bound_name: Option<String>,
    /// Acceptable edge types; empty means no type constraint.
    pub types: BTreeSet<String>,
    /// Direction.
    pub direction: EdgeDir,
    /// Minimum hop count.
    pub min_hop: u32,
    /// Maximum hop count.
    pub max_hop: u32,
    /// False exactly when `*min..max` syntax was used; true for the
    /// implicit single-hop form. Controls whether the shaper returns one
    /// edge record or a list of them.
    pub is_hop: bool,
    /// Inline property equality constraints.
    pub props: Vec<(String, Value)>,
}

/// The compiled motif: an arena of nodes, an arena of edges, and an
/// adjacency index over both.
#[derive(Clone, Debug, Default)]
pub struct Motif {
    /// Node arena.
    pub nodes: Vec<MotifNode>,
    /// Edge arena.
    pub edges: Vec<MotifEdge>,
    /// Variable name to node index.
    pub var_index: HashMap<String, MotifNodeIdx>,
    /// Outgoing edge indices per node, `Bidirectional` edges appear in both
    /// endpoints' lists.
    pub adjacency: Vec<Vec<MotifEdgeIdx>>,
}

impl Motif {
    /// Appends a node to the arena, registering its variable name. Used by
    /// [`build`] and by the hop expander when assembling expanded motifs.
    pub(crate) fn push_node(&mut self, node: MotifNode) -> MotifNodeIdx {
        let idx = self.nodes.len();
        self.var_index.insert(node.var.clone(), idx);
        self.nodes.push(node);
        self.adjacency.push(Vec::new());
        idx
    }

    /// Appends an edge to the arena, indexing it on both endpoints.
    pub(crate) fn push_edge(&mut self, edge: MotifEdge) -> MotifEdgeIdx {
        let idx = self.edges.len();
        self.adjacency[edge.from].push(idx);
        if edge.from != edge.to {
            self.adjacency[edge.to].push(idx);
        }
        self.edges.push(edge);
        idx
    }

    /// Weakly-connected components of the motif, as lists of node indices.
    pub fn components(&self) -> Vec<Vec<MotifNodeIdx>> {
        let mut seen = vec![false; self.nodes.len()];
        let mut out = Vec::new();
        for start in 0..self.nodes.len() {
            if seen[start] {
                continue;
            }
            let mut stack = vec![start];
            let mut component = Vec::new();
            seen[start] = true;
            while let Some(n) = stack.pop() {
                component.push(n);
                for &e in &self.adjacency[n] {
                    let edge = &self.edges[e];
                    let other = if edge.from == n { edge.to } else { edge.from };
                    if !seen[other] {
                        seen[other] = true;
                        stack.push(other);
                    }
                }
            }
            component.sort_unstable();
            out.push(component);
        }
        out
    }
}

fn fresh_anon(counter: &mut usize) -> String {
    let name = format!("_anon{counter}");
    *counter += 1;
    name
}

fn merge_constraints(
    existing: &mut MotifNode,
    labels: &[String],
    props: &[(String, Value)],
) -> Result<(), ValidationError> {
    for label in labels {
        existing.labels.insert(label.clone());
    }
    for (key, value) in props {
        if let Some((_, prior)) = existing.props.iter().find(|(k, _)| k == key) {
            if !values_equal(prior, value) {
                return Err(ValidationError::DuplicateVariable {
                    var: existing.var.clone(),
                });
            }
        } else {
            existing.props.push((key.clone(), value.clone()));
        }
    }
    Ok(())
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a.partial_cmp(b) == Some(std::cmp::Ordering::Equal)
}

struct Builder {
    motif: Motif,
    anon_counter: usize,
}

impl Builder {
    fn node_idx(&mut self, var_name: &str) -> MotifNodeIdx {
        if let Some(&idx) = self.motif.var_index.get(var_name) {
            return idx;
        }
        self.motif.push_node(MotifNode {
            var: var_name.to_owned(),
            labels: BTreeSet::new(),
            props: Vec::new(),
        })
    }

    fn declare_match(
        &mut self,
        name: &str,
        labels: &[String],
        props: &[(String, Value)],
    ) -> Result<MotifNodeIdx, ValidationError> {
        let resolved = if name.is_empty() {
            fresh_anon(&mut self.anon_counter)
        } else {
            name.to_owned()
        };
        let idx = self.node_idx(&resolved);
        merge_constraints(&mut self.motif.nodes[idx], labels, props)?;
        Ok(idx)
    }
}

/// Builds a [`Motif`] from a [`QueryAst`], returning the motif, a table
/// mapping bound edge names to their motif edge index, and the list of
/// named path bindings (edge index chains).
///
/// `max_hop_cap` is the engine-configured ceiling on `max_hop` (at most the
/// hard cap of 100).
pub fn build(
    ast: &QueryAst,
    max_hop_cap: u32,
) -> Result<(Motif, BTreeMap<String, MotifEdgeIdx>, Vec<(String, Vec<MotifEdgeIdx>)>), ValidationError>
{
    if ast.matches.is_empty() && ast.edges.is_empty() {
        return Err(ValidationError::EmptyMatches);
    }

    let mut builder = Builder {
        motif: Motif::default(),
        anon_counter: 0,
    };

    for m in &ast.matches {
        builder.declare_match(&m.var.0, &m.labels, &m.props)?;
    }

    let mut edge_names = BTreeMap::new();
    let mut ast_edge_to_motif_edge = Vec::with_capacity(ast.edges.len());

    for edge in &ast.edges {
        let motif_edge_idx = build_edge(&mut builder, edge, max_hop_cap)?;
        ast_edge_to_motif_edge.push(motif_edge_idx);
        if let Some(name) = &edge.name {
            edge_names.insert(name.0.clone(), motif_edge_idx);
        }
    }

    let mut paths = Vec::with_capacity(ast.paths.len());
    for path in &ast.paths {
        let mapped = path
            .edges
            .iter()
            .map(|&i| ast_edge_to_motif_edge[i])
            .collect();
        paths.push((path.name.clone(), mapped));
    }

    Ok((builder.motif, edge_names, paths))
}

fn build_edge(
    builder: &mut Builder,
    edge: &EdgeClause,
    max_hop_cap: u32,
) -> Result<MotifEdgeIdx, ValidationError> {
    let (min_hop, max_hop, is_hop) = match edge.hop {
        None => (1, 1, true),
        Some((min, max)) => {
            if max == 0 || min > max {
                return Err(ValidationError::InvalidHopRange { min, max });
            }
            (min, max, false)
        }
    };
    if max_hop > max_hop_cap {
        return Err(ValidationError::HopCapExceeded {
            max: max_hop,
            cap: max_hop_cap,
        });
    }
    if matches!(edge.direction, EdgeDirection::Bidirectional) && edge.hop.is_some() {
        return Err(ValidationError::BidirectionalWithHopRange);
    }

    let (from_name, to_name, direction) = match edge.direction {
        EdgeDirection::Outgoing => (edge.from.0.as_str(), edge.to.0.as_str(), EdgeDir::Forward),
        EdgeDirection::Incoming => (edge.to.0.as_str(), edge.from.0.as_str(), EdgeDir::Forward),
        EdgeDirection::Bidirectional => {
            (edge.from.0.as_str(), edge.to.0.as_str(), EdgeDir::Bidirectional)
        }
    };

    let from = builder.declare_match(from_name, &[], &[])?;
    let to = builder.declare_match(to_name, &[], &[])?;

    let idx = builder.motif.push_edge(MotifEdge {
        from,
        to,
        bound_name: edge.name.as_ref().map(|v| v.0.clone()),
        types: edge.types.iter().cloned().collect(),
        direction,
        min_hop,
        max_hop,
        is_hop,
        props: edge.props.clone(),
    });
    Ok(idx)
}

/// Checks that every variable referenced outside of MATCH/edge clauses
/// (WHERE, RETURN, ORDER BY) names either a motif node or a bound edge.
pub fn check_known_var(
    var: &str,
    context: &'static str,
    motif: &Motif,
    edge_names: &BTreeMap<String, MotifEdgeIdx>,
) -> Result<(), ValidationError> {
    if motif.var_index.contains_key(var) || edge_names.contains_key(var) {
        Ok(())
    } else {
        Err(ValidationError::UnknownVariable {
            var: var.to_owned(),
            context,
        })
    }
}
