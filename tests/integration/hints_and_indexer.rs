//! Hint-restricted search and attribute-indexer pre-filtering: both are
//! pure performance accelerators, so every check here is really checking
//! that using them changes nothing about which rows come back.

use motifql::model::{attrs, NamedGraphBuilder, Value};
use motifql::query::engine::EngineConfig;
use motifql::query::{EdgeDirection, QueryBuilder, QueryEngine};
use std::collections::{BTreeMap, BTreeSet};

fn three_people_graph() -> (motifql::model::InMemoryGraph, BTreeMap<String, u64>) {
    let mut g = NamedGraphBuilder::new();
    let mut alice = attrs();
    alice.insert("name".into(), Value::from("Alice"));
    alice.insert("age".into(), Value::Int(30));
    g.node("alice", &[], alice);
    let mut bob = attrs();
    bob.insert("name".into(), Value::from("Bob"));
    bob.insert("age".into(), Value::Int(25));
    g.node("bob", &[], bob);
    let mut carol = attrs();
    carol.insert("name".into(), Value::from("Carol"));
    carol.insert("age".into(), Value::Int(40));
    g.node("carol", &[], carol);
    g.edge("alice", "bob", Some("KNOWS"), attrs());
    g.edge("alice", "carol", Some("KNOWS"), attrs());
    let (graph, names) = g.build();
    (graph, names.into_iter().collect())
}

#[test]
fn a_hint_restricts_to_the_subset_it_names() {
    let (graph, names) = three_people_graph();

    let ast = QueryBuilder::new()
        .match_node("a", &[])
        .match_edge_types("a", EdgeDirection::Outgoing, &["KNOWS"], "b")
        .return_var("b", "name")
        .build()
        .expect("valid query");

    let engine = QueryEngine::new(&graph);

    let unhinted = engine.run(&ast).expect("query executes");
    let unhinted_names: BTreeSet<String> = unhinted.values["b.name"]
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect();
    assert_eq!(unhinted_names, ["Bob".to_string(), "Carol".to_string()].into_iter().collect());

    let mut hint = BTreeMap::new();
    hint.insert("b".to_string(), names["bob"]);
    let hinted = engine.run_with_hints(&ast, &[hint]).expect("query executes");
    let hinted_names: BTreeSet<String> = hinted.values["b.name"]
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect();
    assert_eq!(hinted_names, ["Bob".to_string()].into_iter().collect());
}

#[test]
fn a_hint_inconsistent_with_the_graph_is_dropped_not_rejected() {
    let (graph, names) = three_people_graph();

    let ast = QueryBuilder::new()
        .match_node("a", &[])
        .match_edge_types("a", EdgeDirection::Outgoing, &["KNOWS"], "b")
        .return_var("b", "name")
        .build()
        .expect("valid query");

    let engine = QueryEngine::new(&graph);

    // `a` hinted to Bob's id is inconsistent with the KNOWS edge shape
    // (Bob has no outgoing KNOWS edge), so the hint is silently dropped
    // and the unrestricted result comes back rather than an error.
    let mut bogus_hint = BTreeMap::new();
    bogus_hint.insert("a".to_string(), names["bob"]);
    let result = engine.run_with_hints(&ast, &[bogus_hint]).expect("query executes");
    let result_names: BTreeSet<String> = result.values["b.name"]
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect();
    assert_eq!(result_names, ["Bob".to_string(), "Carol".to_string()].into_iter().collect());
}

#[test]
fn indexer_prefilter_does_not_change_which_rows_are_returned() {
    let (graph, _names) = three_people_graph();

    let ast = QueryBuilder::new()
        .match_node("a", &[])
        .where_var("a", |p| {
            p.gt("age", Value::Int(27));
        })
        .return_var("a", "name")
        .build()
        .expect("valid query");

    let with_indexer = QueryEngine::with_config(&graph, EngineConfig { use_indexer: true, ..EngineConfig::default() });
    let without_indexer = QueryEngine::with_config(&graph, EngineConfig { use_indexer: false, ..EngineConfig::default() });

    let a = with_indexer.run(&ast).expect("query executes");
    let b = without_indexer.run(&ast).expect("query executes");

    let names_a: BTreeSet<String> = a.values["a.name"].iter().map(|v| v.as_str().unwrap().to_owned()).collect();
    let names_b: BTreeSet<String> = b.values["a.name"].iter().map(|v| v.as_str().unwrap().to_owned()).collect();
    assert_eq!(names_a, names_b);
    assert_eq!(names_a, ["Alice".to_string(), "Carol".to_string()].into_iter().collect());
}
