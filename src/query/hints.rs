//! Caller/indexer-supplied partial bindings that restrict enumeration (C6).
//!
//! A hint is expressed in terms of the *original* (pre-hop-expansion) query
//! variable names, since that is the vocabulary a caller or an `EXISTS`
//! parent query actually has. [`project_into`] translates a hint into the
//! index space of one specific expanded motif right before the matcher
//! needs it.

use crate::model::PropertyGraph;
use crate::query::matcher::{edge_matches, node_matches, LocalHint};
use crate::query::motif::Motif;
use std::collections::BTreeMap;

/// A partial binding `{var name -> host id}` restricting the search.
pub type Hint<Id> = BTreeMap<String, Id>;

/// Keeps only hints that are not a superset of some other (already kept,
/// necessarily smaller-or-equal) hint: an antichain under "is a subset of".
/// The smallest hints win, since a subset hint already covers every
/// extension a superset would additionally restrict to.
pub fn eliminate_supersets<Id: Clone + PartialEq>(hints: &[Hint<Id>]) -> Vec<Hint<Id>> {
    let mut order: Vec<&Hint<Id>> = hints.iter().collect();
    order.sort_by_key(|h| h.len());
    let mut kept: Vec<&Hint<Id>> = Vec::new();
    'outer: for candidate in order {
        for smaller in &kept {
            if is_subset(smaller, candidate) {
                continue 'outer;
            }
        }
        kept.push(candidate);
    }
    kept.into_iter().cloned().collect()
}

fn is_subset<Id: PartialEq>(small: &Hint<Id>, big: &Hint<Id>) -> bool {
    small.len() <= big.len() && small.iter().all(|(k, v)| big.get(k).is_some_and(|bv| bv == v))
}

/// Drops any hint key that does not name a motif variable (discarded
/// silently, per the invariant on unknown hint keys), then drops any hint
/// whose remaining bindings are refuted by node or edge attribute matching
/// against `graph`.
pub fn doublecheck<G: PropertyGraph>(graph: &G, motif: &Motif, hints: &[Hint<G::NodeId>]) -> Vec<Hint<G::NodeId>> {
    hints
        .iter()
        .filter_map(|hint| {
            let narrowed: Hint<G::NodeId> = hint
                .iter()
                .filter(|(k, _)| motif.var_index.contains_key(*k))
                .map(|(k, v)| (k.clone(), *v))
                .collect();
            consistent(graph, motif, &narrowed).then_some(narrowed)
        })
        .collect()
}

fn consistent<G: PropertyGraph>(graph: &G, motif: &Motif, hint: &Hint<G::NodeId>) -> bool {
    for (var, &host_id) in hint {
        let Some(&idx) = motif.var_index.get(var) else {
            continue;
        };
        if !graph.has_node(host_id) || !node_matches(&graph.node_attrs(host_id), &motif.nodes[idx]) {
            return false;
        }
    }
    for edge in &motif.edges {
        let from_var = &motif.nodes[edge.from].var;
        let to_var = &motif.nodes[edge.to].var;
        let (Some(&u), Some(&v)) = (hint.get(from_var), hint.get(to_var)) else {
            continue;
        };
        if !edge_matches(graph, u, v, edge) {
            return false;
        }
    }
    true
}

/// Restricts every hint to the given key set, dropping any hint that would
/// become empty (an empty hint would otherwise be indistinguishable from
/// "no restriction").
pub fn project<Id: Clone>(hints: &[Hint<Id>], keys: &std::collections::BTreeSet<String>) -> Vec<Hint<Id>> {
    hints
        .iter()
        .filter_map(|hint| {
            let narrowed: Hint<Id> = hint
                .iter()
                .filter(|(k, _)| keys.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            (!narrowed.is_empty()).then_some(narrowed)
        })
        .collect()
}

/// Expands a `var -> candidate id set` domain (as produced by the attribute
/// indexer) into one hint per combination in the Cartesian product.
pub fn from_domain<Id: Clone + Ord>(domain: &BTreeMap<String, std::collections::BTreeSet<Id>>) -> Vec<Hint<Id>> {
    let mut combos: Vec<Hint<Id>> = vec![Hint::new()];
    for (var, ids) in domain {
        let mut next = Vec::with_capacity(combos.len() * ids.len().max(1));
        for combo in &combos {
            for id in ids {
                let mut extended = combo.clone();
                extended.insert(var.clone(), id.clone());
                next.push(extended);
            }
        }
        combos = next;
    }
    if domain.is_empty() {
        Vec::new()
    } else {
        combos
    }
}

/// Projects a hint (keyed by original variable name) into the index space
/// of one specific expanded motif, dropping keys that expansion doesn't
/// recognize (anonymous hop-intermediate variables are never hinted by a
/// caller, so this only ever drops names genuinely absent from this
/// expansion).
pub fn project_into<Id: Copy>(hint: &Hint<Id>, expanded_motif: &Motif) -> LocalHint<Id> {
    hint.iter()
        .filter_map(|(name, &id)| expanded_motif.var_index.get(name).map(|&idx| (idx, id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superset_elimination_is_an_antichain() {
        let mut a = Hint::new();
        a.insert("x".to_string(), 1u64);
        let mut b = Hint::new();
        b.insert("x".to_string(), 1u64);
        b.insert("y".to_string(), 2u64);
        let mut c = Hint::new();
        c.insert("z".to_string(), 9u64);

        let kept = eliminate_supersets(&[a.clone(), b, c.clone()]);
        assert_eq!(kept.len(), 2);
        assert!(kept.contains(&a));
        assert!(kept.contains(&c));
    }

    #[test]
    fn from_domain_is_the_cartesian_product() {
        let mut domain = BTreeMap::new();
        domain.insert("a".to_string(), [1u64, 2].into_iter().collect());
        domain.insert("b".to_string(), [3u64].into_iter().collect());
        let hints = from_domain(&domain);
        assert_eq!(hints.len(), 2);
    }

    #[test]
    fn empty_domain_yields_no_hints() {
        let domain: BTreeMap<String, std::collections::BTreeSet<u64>> = BTreeMap::new();
        assert!(from_domain(&domain).is_empty());
    }
}
