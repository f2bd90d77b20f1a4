//! End-to-end scenarios covering pattern shape, hop expansion, and edge
//! type disjunction.

use motifql::model::{attrs, NamedGraphBuilder, Value};
use motifql::query::{EdgeDirection, QueryBuilder, QueryEngine};
use std::collections::BTreeSet;

#[test]
fn two_hop_chain_returns_only_the_endpoints() {
    let mut g = NamedGraphBuilder::new();
    g.edge("x", "y", None, attrs());
    g.edge("y", "z", None, attrs());
    let (graph, names) = g.build();

    let ast = QueryBuilder::new()
        .match_node("a", &[])
        .match_edge_any("a", EdgeDirection::Outgoing, "b")
        .match_edge_any("b", EdgeDirection::Outgoing, "c")
        .return_id("a")
        .return_id("c")
        .build()
        .expect("valid query");

    let engine = QueryEngine::new(&graph);
    let result = engine.run(&ast).expect("query executes");
    assert_eq!(result.len(), 1);
    assert_eq!(result.values["id(a)"], vec![Value::Int(names["x"] as i64)]);
    assert_eq!(result.values["id(c)"], vec![Value::Int(names["z"] as i64)]);
}

#[test]
fn variable_hop_zero_to_two_covers_every_length_on_a_three_cycle() {
    let mut g = NamedGraphBuilder::new();
    g.edge("x", "y", None, attrs());
    g.edge("y", "z", None, attrs());
    g.edge("z", "x", None, attrs());
    let (graph, names) = g.build();

    let ast = QueryBuilder::new()
        .match_node("a", &[])
        .match_edge_hops("a", EdgeDirection::Outgoing, &[], "b", 0, 2)
        .return_id("a")
        .return_id("b")
        .build()
        .expect("valid query");

    let engine = QueryEngine::new(&graph);
    let result = engine.run(&ast).expect("query executes");
    assert_eq!(result.len(), 9);

    let pairs: BTreeSet<(i64, i64)> = result.values["id(a)"]
        .iter()
        .zip(result.values["id(b)"].iter())
        .map(|(a, b)| match (a, b) {
            (Value::Int(a), Value::Int(b)) => (*a, *b),
            _ => unreachable!("id(x) always projects an Int"),
        })
        .collect();

    let x = names["x"] as i64;
    let y = names["y"] as i64;
    let z = names["z"] as i64;
    let expected: BTreeSet<(i64, i64)> = [
        (x, x), (x, y), (x, z),
        (y, y), (y, z), (y, x),
        (z, z), (z, x), (z, y),
    ]
    .into_iter()
    .collect();
    assert_eq!(pairs, expected);
}

#[test]
fn edge_type_disjunction_matches_either_type() {
    let mut g = NamedGraphBuilder::new();
    let mut bob = attrs();
    bob.insert("name".into(), Value::from("Bob"));
    g.node("b", &[], bob);
    let mut carol = attrs();
    carol.insert("name".into(), Value::from("Carol"));
    g.node("c", &[], carol);
    g.edge("a", "b", Some("LOVES"), attrs());
    g.edge("b", "c", Some("WORKS_WITH"), attrs());
    let (graph, _names) = g.build();

    let ast = QueryBuilder::new()
        .match_node("n", &[])
        .match_edge_types("n", EdgeDirection::Outgoing, &["LOVES", "WORKS_WITH"], "m")
        .return_var("m", "name")
        .build()
        .expect("valid query");

    let engine = QueryEngine::new(&graph);
    let result = engine.run(&ast).expect("query executes");
    let names: BTreeSet<String> = result.values["m.name"]
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect();
    assert_eq!(names, ["Bob".to_string(), "Carol".to_string()].into_iter().collect());
}

#[test]
fn bare_match_with_no_edges_returns_one_row_per_node() {
    let mut g = NamedGraphBuilder::new();
    g.node("x", &[], attrs());
    g.node("y", &[], attrs());
    let (graph, names) = g.build();

    let ast = QueryBuilder::new()
        .match_node("a", &[])
        .return_id("a")
        .build()
        .expect("valid query");

    let engine = QueryEngine::new(&graph);
    let result = engine.run(&ast).expect("query executes");
    let ids: BTreeSet<i64> = result.values["id(a)"]
        .iter()
        .map(|v| match v {
            Value::Int(i) => *i,
            _ => unreachable!("id(x) always projects an Int"),
        })
        .collect();
    assert_eq!(
        ids,
        [names["x"] as i64, names["y"] as i64].into_iter().collect()
    );
}

#[test]
fn zero_hop_branch_enforces_the_target_endpoints_label() {
    let mut g = NamedGraphBuilder::new();
    g.node("x", &["Person"], attrs());
    g.node("y", &[], attrs());
    let (graph, names) = g.build();

    let ast = QueryBuilder::new()
        .match_node("a", &[])
        .match_edge_hops("a", EdgeDirection::Outgoing, &[], "b", 0, 1)
        .match_node("b", &["Person"])
        .return_id("a")
        .return_id("b")
        .build()
        .expect("valid query");

    let engine = QueryEngine::new(&graph);
    let result = engine.run(&ast).expect("query executes");
    assert_eq!(result.len(), 1);
    assert_eq!(result.values["id(a)"], vec![Value::Int(names["x"] as i64)]);
    assert_eq!(result.values["id(b)"], vec![Value::Int(names["x"] as i64)]);
}

#[test]
fn hop_range_beyond_the_hard_cap_is_rejected() {
    let mut g = NamedGraphBuilder::new();
    g.edge("x", "y", None, attrs());
    let (graph, _names) = g.build();

    let ast = QueryBuilder::new()
        .match_node("a", &[])
        .match_edge_hops("a", EdgeDirection::Outgoing, &[], "b", 1, 101)
        .return_id("a")
        .build()
        .expect("builder performs no hop-cap validation itself");

    let engine = QueryEngine::new(&graph);
    let err = engine.run(&ast).unwrap_err();
    assert_eq!(err.code(), "HopCapExceeded");
}
