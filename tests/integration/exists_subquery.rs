//! `EXISTS`/`NOT EXISTS` predicate scenarios: filtering an outer match by
//! whether a correlated child pattern has any binding at all.

use motifql::model::{attrs, NamedGraphBuilder, Value};
use motifql::query::{EdgeDirection, QueryBuilder, QueryEngine};
use std::collections::BTreeSet;

#[test]
fn exists_keeps_only_people_with_an_outgoing_knows_edge() {
    let mut g = NamedGraphBuilder::new();
    let mut alice = attrs();
    alice.insert("name".into(), Value::from("Alice"));
    g.node("alice", &[], alice);
    let mut bob = attrs();
    bob.insert("name".into(), Value::from("Bob"));
    g.node("bob", &[], bob);
    let mut carol = attrs();
    carol.insert("name".into(), Value::from("Carol"));
    g.node("carol", &[], carol);
    g.edge("alice", "bob", Some("KNOWS"), attrs());
    let (graph, _names) = g.build();

    let ast = QueryBuilder::new()
        .match_node("a", &[])
        .where_exists(false, |q| {
            q.match_node("a", &[])
                .match_edge_types("a", EdgeDirection::Outgoing, &["KNOWS"], "b")
        })
        .return_var("a", "name")
        .build()
        .expect("valid query");

    let engine = QueryEngine::new(&graph);
    let result = engine.run(&ast).expect("query executes");
    let names: BTreeSet<String> = result.values["a.name"]
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect();
    assert_eq!(names, ["Alice".to_string()].into_iter().collect());
}

#[test]
fn not_exists_keeps_only_people_without_an_outgoing_knows_edge() {
    let mut g = NamedGraphBuilder::new();
    let mut alice = attrs();
    alice.insert("name".into(), Value::from("Alice"));
    g.node("alice", &[], alice);
    let mut bob = attrs();
    bob.insert("name".into(), Value::from("Bob"));
    g.node("bob", &[], bob);
    g.edge("alice", "bob", Some("KNOWS"), attrs());
    let (graph, _names) = g.build();

    let ast = QueryBuilder::new()
        .match_node("a", &[])
        .where_exists(true, |q| {
            q.match_node("a", &[])
                .match_edge_types("a", EdgeDirection::Outgoing, &["KNOWS"], "b")
        })
        .return_var("a", "name")
        .build()
        .expect("valid query");

    let engine = QueryEngine::new(&graph);
    let result = engine.run(&ast).expect("query executes");
    let names: BTreeSet<String> = result.values["a.name"]
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect();
    assert_eq!(names, ["Bob".to_string()].into_iter().collect());
}

#[test]
fn exists_with_no_matching_child_binding_empties_the_outer_result() {
    let mut g = NamedGraphBuilder::new();
    g.node("alice", &[], attrs());
    let (graph, _names) = g.build();

    let ast = QueryBuilder::new()
        .match_node("a", &[])
        .where_exists(false, |q| {
            q.match_node("a", &[])
                .match_edge_types("a", EdgeDirection::Outgoing, &["KNOWS"], "b")
        })
        .return_id("a")
        .build()
        .expect("valid query");

    let engine = QueryEngine::new(&graph);
    let result = engine.run(&ast).expect("query executes");
    assert!(result.is_empty());
}
