//! Expands variable-length edges into a finite list of fixed-shape motifs
//! (C3).
//!
//! Each motif edge carries a `[min_hop, max_hop]` range. This module turns
//! one such motif into the cartesian product of, per edge, one branch per
//! concrete length in that range: a zero-hop branch (when `min_hop == 0`)
//! collapses the edge's two endpoints into a single motif node, and each
//! length-`k` branch inserts `k - 1` fresh anonymous intermediate nodes.

use crate::query::motif::{Motif, MotifEdge, MotifEdgeIdx, MotifNode, MotifNodeIdx};
use std::collections::{BTreeMap, HashMap};

/// The realized node/edge sequence an original motif edge expanded into,
/// indices in the *expanded* motif's arenas.
#[derive(Clone, Debug)]
pub struct PathInfo {
    /// `hops + 1` node indices: `(u, h1, h2, ..., v)`, or `(u, u)` for a
    /// zero-hop collapse.
    pub nodes: Vec<MotifNodeIdx>,
    /// `hops` edge indices forming the chain; empty for a zero-hop collapse.
    pub edges: Vec<MotifEdgeIdx>,
}

/// One fully hop-expanded motif, paired with the bookkeeping needed to map
/// back to the variables and bound edge names of the original query.
#[derive(Clone, Debug)]
pub struct ExpandedMotif {
    /// The fixed-length motif the matcher runs against.
    pub motif: Motif,
    /// Original motif edge index to its realized path in this expansion.
    pub paths: HashMap<MotifEdgeIdx, PathInfo>,
}

#[derive(Clone, Copy, Debug)]
enum Branch {
    Zero,
    Chain(u32),
}

fn branches_for(edge: &MotifEdge) -> Vec<Branch> {
    let mut out = Vec::new();
    if edge.min_hop == 0 {
        out.push(Branch::Zero);
    }
    let start = edge.min_hop.max(1);
    for k in start..=edge.max_hop {
        out.push(Branch::Chain(k));
    }
    out
}

fn cartesian(branch_lists: &[Vec<Branch>]) -> Vec<Vec<Branch>> {
    let mut combos: Vec<Vec<Branch>> = vec![Vec::new()];
    for list in branch_lists {
        let mut next = Vec::with_capacity(combos.len() * list.len().max(1));
        for combo in &combos {
            for &branch in list {
                let mut extended = combo.clone();
                extended.push(branch);
                next.push(extended);
            }
        }
        combos = next;
    }
    combos
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

fn merge_node_into(target: &mut MotifNode, other: &MotifNode) {
    for label in &other.labels {
        target.labels.insert(label.clone());
    }
    for (key, value) in &other.props {
        // Keep both constraints even when `key` repeats: a zero-hop collapse
        // must satisfy each endpoint's requirements independently on the
        // single merged host node, so two different required values under
        // the same key must make the merged node unsatisfiable rather than
        // silently keeping only the first endpoint's requirement.
        if !target.props.iter().any(|(k, v)| k == key && v == value) {
            target.props.push((key.clone(), value.clone()));
        }
    }
}

/// Expands every variable-length edge of `motif` into the cartesian product
/// of fixed-length alternatives, returning one [`ExpandedMotif`] per
/// combination.
pub fn expand(motif: &Motif) -> Vec<ExpandedMotif> {
    let branch_lists: Vec<Vec<Branch>> = motif.edges.iter().map(branches_for).collect();
    let combos = cartesian(&branch_lists);

    combos
        .into_iter()
        .map(|combo| build_expansion(motif, &combo))
        .collect()
}

fn build_expansion(motif: &Motif, combo: &[Branch]) -> ExpandedMotif {
    let mut dsu = DisjointSet::new(motif.nodes.len());
    for (edge_idx, branch) in combo.iter().enumerate() {
        if let Branch::Zero = branch {
            let edge = &motif.edges[edge_idx];
            dsu.union(edge.from, edge.to);
        }
    }

    let mut rep_to_new: HashMap<usize, MotifNodeIdx> = HashMap::new();
    let mut expanded = Motif::default();

    let mut new_idx_of = |orig: MotifNodeIdx,
                          dsu: &mut DisjointSet,
                          expanded: &mut Motif|
     -> MotifNodeIdx {
        let rep = dsu.find(orig);
        if let Some(&idx) = rep_to_new.get(&rep) {
            merge_node_into(&mut expanded.nodes[idx], &motif.nodes[orig]);
            // keep the representative's own variable name resolvable too
            expanded.var_index.insert(motif.nodes[orig].var.clone(), idx);
            idx
        } else {
            let idx = expanded.push_node(motif.nodes[orig].clone());
            rep_to_new.insert(rep, idx);
            idx
        }
    };

    // Seed every original node — including ones no edge in this combo
    // touches — before laying down edges, so a motif node with no incident
    // edge at all (`MATCH (a)`) still gets a representative in the expanded
    // motif instead of silently vanishing.
    for idx in 0..motif.nodes.len() {
        new_idx_of(idx, &mut dsu, &mut expanded);
    }

    let mut paths = HashMap::new();

    for (edge_idx, branch) in combo.iter().enumerate() {
        let edge = &motif.edges[edge_idx];
        match branch {
            Branch::Zero => {
                let u = new_idx_of(edge.from, &mut dsu, &mut expanded);
                // The target must also resolve to the same representative:
                // its variable name needs to be resolvable post-collapse,
                // and its own label/prop constraints still have to hold on
                // the single merged host node.
                new_idx_of(edge.to, &mut dsu, &mut expanded);
                paths.insert(
                    edge_idx,
                    PathInfo {
                        nodes: vec![u, u],
                        edges: vec![],
                    },
                );
            }
            Branch::Chain(k) => {
                let u = new_idx_of(edge.from, &mut dsu, &mut expanded);
                let v = new_idx_of(edge.to, &mut dsu, &mut expanded);
                let mut node_chain = vec![u];
                for _ in 1..*k {
                    let anon = expanded.push_node(MotifNode {
                        var: format!("_hop{}_{}", edge_idx, expanded.nodes.len()),
                        labels: Default::default(),
                        props: Vec::new(),
                    });
                    node_chain.push(anon);
                }
                node_chain.push(v);

                let mut edge_chain = Vec::with_capacity(*k as usize);
                for window in node_chain.windows(2) {
                    let (from, to) = (window[0], window[1]);
                    let new_edge_idx = expanded.push_edge(MotifEdge {
                        from,
                        to,
                        bound_name: None,
                        types: edge.types.clone(),
                        direction: edge.direction,
                        min_hop: 1,
                        max_hop: 1,
                        is_hop: true,
                        props: edge.props.clone(),
                    });
                    edge_chain.push(new_edge_idx);
                }
                paths.insert(
                    edge_idx,
                    PathInfo {
                        nodes: node_chain,
                        edges: edge_chain,
                    },
                );
            }
        }
    }

    ExpandedMotif {
        motif: expanded,
        paths,
    }
}

/// Convenience alias used by callers that only need the bound-name table,
/// unchanged across expansion since it is keyed by *original* edge index.
pub type EdgeNameTable = BTreeMap<String, MotifEdgeIdx>;
