//! Property-based checks for the universal guarantees in SPEC_FULL.md §8:
//! hint irrelevance, indexer equivalence, superset-elimination antichains,
//! DISTINCT idempotence, hop-expander length coverage, and hard-cap
//! enforcement. These generate small random multigraphs and queries rather
//! than fixing one scenario, so they catch regressions the handwritten
//! scenario tests in `scenarios.rs`/`hints_and_indexer.rs` don't happen to
//! exercise.

use motifql::model::{attrs, InMemoryGraph, NamedGraphBuilder, Value};
use motifql::query::ast::{AttrPath, MatchClause, Projection, QueryAst, ReturnItem, Var};
use motifql::query::engine::EngineConfig;
use motifql::query::hints::{self, Hint};
use motifql::query::hop;
use motifql::query::motif;
use motifql::query::{EdgeDirection, QueryBuilder, QueryEngine};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Builds a random directed multigraph: `n` nodes carrying a small
/// categorical `group` attribute, and up to `m` edges of one of two types.
fn arb_graph(max_nodes: usize, max_edges: usize) -> impl Strategy<Value = (InMemoryGraph, Vec<u64>)> {
    (2..=max_nodes, 0..=max_edges).prop_flat_map(move |(n, m)| {
        let groups = prop::collection::vec(0u8..3, n);
        let edges = prop::collection::vec((0..n, 0..n, any::<bool>()), 0..=m);
        (groups, edges).prop_map(move |(groups, edges)| {
            let mut g = NamedGraphBuilder::with_multi(true);
            for (i, group) in groups.into_iter().enumerate() {
                let mut a = attrs();
                a.insert("group".into(), Value::Int(group as i64));
                g.node(format!("n{i}"), &[], a);
            }
            for (u, v, ty) in edges {
                let edge_type = if ty { "A" } else { "B" };
                g.edge(format!("n{u}"), format!("n{v}"), Some(edge_type), attrs());
            }
            let (graph, names) = g.build();
            let ids: Vec<u64> = (0..n).map(|i| names[&format!("n{i}")]).collect();
            (graph, ids)
        })
    })
}

fn node_edge_query() -> QueryAst {
    QueryBuilder::new()
        .match_node("a", &[])
        .match_edge_any("a", EdgeDirection::Outgoing, "b")
        .return_id("a")
        .return_id("b")
        .build()
        .expect("valid query")
}

fn result_rows(result: &motifql::query::QueryResult) -> BTreeSet<(i64, i64)> {
    result.values["id(a)"]
        .iter()
        .zip(result.values["id(b)"].iter())
        .map(|(a, b)| match (a, b) {
            (Value::Int(a), Value::Int(b)) => (*a, *b),
            _ => unreachable!("id(x) always projects an Int"),
        })
        .collect()
}

proptest! {
    /// **Hint irrelevance (SPEC_FULL.md §8.4).** Any single hint consistent
    /// with the host graph narrows (never grows) the result, and hinting
    /// with the full candidate product exactly reproduces the unhinted
    /// result.
    #[test]
    fn hint_irrelevance(graph_ids in arb_graph(6, 10)) {
        let (graph, node_ids) = graph_ids;
        let ast = node_edge_query();
        let engine = QueryEngine::new(&graph);

        let unhinted = engine.run(&ast).expect("query executes");
        let unhinted_rows = result_rows(&unhinted);

        for &id in &node_ids {
            let mut hint = Hint::new();
            hint.insert("a".to_string(), id);
            let hinted = engine.run_with_hints(&ast, &[hint]).expect("query executes");
            let hinted_rows = result_rows(&hinted);
            prop_assert!(hinted_rows.is_subset(&unhinted_rows));
        }

        let full_hints: Vec<Hint<u64>> = unhinted_rows
            .iter()
            .map(|&(a, b)| {
                let mut h = Hint::new();
                h.insert("a".to_string(), a as u64);
                h.insert("b".to_string(), b as u64);
                h
            })
            .collect();
        let reproduced = engine.run_with_hints(&ast, &full_hints).expect("query executes");
        prop_assert_eq!(result_rows(&reproduced), unhinted_rows);
    }

    /// **Index equivalence (SPEC_FULL.md §8.5).** Enabling the attribute
    /// indexer accelerator never changes which rows a WHERE-bearing query
    /// returns, regardless of the underlying graph.
    #[test]
    fn indexer_equivalence(graph_ids in arb_graph(8, 14)) {
        let (graph, _node_ids) = graph_ids;
        let ast = QueryBuilder::new()
            .match_node("a", &[])
            .where_var("a", |p| { p.eq("group", Value::Int(1)); })
            .return_id("a")
            .build()
            .expect("valid query");

        let with_indexer = QueryEngine::with_config(&graph, EngineConfig { use_indexer: true, ..EngineConfig::default() });
        let without_indexer = QueryEngine::with_config(&graph, EngineConfig { use_indexer: false, ..EngineConfig::default() });

        let a = with_indexer.run(&ast).expect("query executes");
        let b = without_indexer.run(&ast).expect("query executes");

        let ids_a: BTreeSet<i64> = a.values["id(a)"].iter().map(|v| match v { Value::Int(i) => *i, _ => unreachable!() }).collect();
        let ids_b: BTreeSet<i64> = b.values["id(a)"].iter().map(|v| match v { Value::Int(i) => *i, _ => unreachable!() }).collect();
        prop_assert_eq!(ids_a, ids_b);
    }

    /// **Superset elimination fixed point (SPEC_FULL.md §8.6).** The result
    /// of `eliminate_supersets` is always an antichain: no kept hint is a
    /// strict superset of another kept hint, and running it again changes
    /// nothing.
    #[test]
    fn superset_elimination_is_a_fixed_point_antichain(
        raw in prop::collection::vec(
            prop::collection::btree_map("[a-c]", 0u64..5, 0..=3),
            0..12,
        )
    ) {
        let kept = hints::eliminate_supersets(&raw);

        for i in 0..kept.len() {
            for j in 0..kept.len() {
                if i != j {
                    let subset = kept[i].len() <= kept[j].len()
                        && kept[i].iter().all(|(k, v)| kept[j].get(k) == Some(v));
                    prop_assert!(!(subset && kept[i] != kept[j]), "kept set is not an antichain");
                }
            }
        }

        let kept_twice = hints::eliminate_supersets(&kept);
        let mut a: Vec<_> = kept.clone();
        let mut b: Vec<_> = kept_twice;
        a.sort_by_key(|h| h.iter().map(|(k, v)| (k.clone(), *v)).collect::<Vec<_>>());
        b.sort_by_key(|h| h.iter().map(|(k, v)| (k.clone(), *v)).collect::<Vec<_>>());
        prop_assert_eq!(a, b);
    }

    /// **DISTINCT idempotence (SPEC_FULL.md §8.3).** Applying DISTINCT to an
    /// already-distinct result changes nothing: re-deduping its rows (by the
    /// returned columns) yields the same row count.
    #[test]
    fn distinct_is_idempotent(graph_ids in arb_graph(6, 0)) {
        let (graph, _node_ids) = graph_ids;
        let ast = QueryBuilder::new()
            .match_node("n", &[])
            .distinct()
            .return_var("n", "group")
            .build()
            .expect("valid query");

        let engine = QueryEngine::new(&graph);
        let result = engine.run(&ast).expect("query executes");

        let rows: Vec<&Value> = result.values["n.group"].iter().collect();
        let deduped: BTreeSet<String> = rows.iter().map(|v| format!("{v:?}")).collect();
        prop_assert_eq!(rows.len(), deduped.len());
    }

    /// **Hop-expander closure (SPEC_FULL.md §8.7).** Expanding a single
    /// variable-length edge covers every length in `[min, max]` exactly
    /// once (plus one zero-hop branch iff `min == 0`), independent of the
    /// host graph.
    #[test]
    fn hop_expander_covers_every_length_exactly_once(min_hop in 0u32..4, extra in 0u32..5) {
        let max_hop = min_hop.max(1) + extra;
        let mut ast = QueryAst::default();
        ast.matches.push(MatchClause { var: Var::new("a"), labels: vec![], props: vec![] });
        ast.edges.push(motifql::query::ast::EdgeClause {
            name: None,
            from: Var::new("a"),
            to: Var::new("b"),
            types: vec![],
            direction: EdgeDirection::Outgoing,
            hop: Some((min_hop, max_hop)),
            props: vec![],
        });
        ast.projections.push(Projection { item: ReturnItem::Path(AttrPath::Id(Var::new("a"))), alias: None });

        let (built, _edge_names, _paths) = motif::build(&ast, 100).expect("valid motif");
        let expansions = hop::expand(&built);

        let mut lengths: Vec<u32> = expansions
            .iter()
            .map(|expanded| {
                let path = expanded.paths.values().next().expect("single edge expanded");
                path.edges.len() as u32
            })
            .collect();
        lengths.sort_unstable();

        let mut expected: Vec<u32> = (min_hop.max(1)..=max_hop).collect();
        if min_hop == 0 {
            expected.insert(0, 0);
        }
        prop_assert_eq!(lengths, expected);
    }
}

#[test]
fn hop_range_exceeding_the_hard_cap_always_fails_validation() {
    let mut g = NamedGraphBuilder::new();
    g.edge("x", "y", None, attrs());
    let (graph, _names) = g.build();

    let ast = QueryBuilder::new()
        .match_node("a", &[])
        .match_edge_hops("a", EdgeDirection::Outgoing, &[], "b", 0, 101)
        .return_id("a")
        .build()
        .expect("builder performs no hop-cap validation itself");

    let engine = QueryEngine::new(&graph);
    let err = engine.run(&ast).unwrap_err();
    assert_eq!(err.code(), "HopCapExceeded");
}
