//! Result-shaping scenarios driven end to end through [`QueryBuilder`] and
//! [`QueryEngine`]: DISTINCT + ORDER BY, SKIP/LIMIT, and grouped
//! aggregation.

use motifql::model::{attrs, NamedGraphBuilder, Value};
use motifql::query::ast::AggKind;
use motifql::query::{EdgeDirection, QueryBuilder, QueryEngine, SortDir};

#[test]
fn distinct_drops_duplicate_rows_before_order_by_sees_them() {
    let mut g = NamedGraphBuilder::new();
    for (name, age) in [("alice", 25), ("bob", 30), ("carol", 25), ("alice2", 25), ("greg", 32)] {
        let mut a = attrs();
        a.insert("name".into(), Value::from(if name == "alice2" { "Alice" } else { name }));
        a.insert("age".into(), Value::Int(age));
        g.node(name, &[], a);
    }
    let (graph, _names) = g.build();

    let ast = QueryBuilder::new()
        .match_node("n", &[])
        .distinct()
        .return_var("n", "name")
        .return_var("n", "age")
        .order_by_var("n", "age", SortDir::Desc)
        .build()
        .expect("valid query");

    let engine = QueryEngine::new(&graph);
    let result = engine.run(&ast).expect("query executes");

    assert_eq!(
        result.values["n.name"],
        vec![Value::from("greg"), Value::from("bob"), Value::from("alice"), Value::from("carol")]
    );
    assert_eq!(result.values["n.age"], vec![Value::Int(32), Value::Int(30), Value::Int(25), Value::Int(25)]);
}

#[test]
fn skip_and_limit_apply_after_order_by() {
    let mut g = NamedGraphBuilder::new();
    for (name, age) in [("a", 10), ("b", 20), ("c", 30), ("d", 40)] {
        let mut attrs_map = attrs();
        attrs_map.insert("age".into(), Value::Int(age));
        g.node(name, &[], attrs_map);
    }
    let (graph, _names) = g.build();

    let ast = QueryBuilder::new()
        .match_node("n", &[])
        .return_var("n", "age")
        .order_by_var("n", "age", SortDir::Asc)
        .skip(1)
        .limit(2)
        .build()
        .expect("valid query");

    let engine = QueryEngine::new(&graph);
    let result = engine.run(&ast).expect("query executes");
    assert_eq!(result.values["n.age"], vec![Value::Int(20), Value::Int(30)]);
}

#[test]
fn count_groups_by_the_non_aggregated_return_key() {
    let mut g = NamedGraphBuilder::new();
    let mut engineering = attrs();
    engineering.insert("team".into(), Value::from("engineering"));
    g.node("alice", &[], engineering.clone());
    g.node("bob", &[], engineering);
    let mut sales = attrs();
    sales.insert("team".into(), Value::from("sales"));
    g.node("carol", &[], sales);
    let (graph, _names) = g.build();

    let ast = QueryBuilder::new()
        .match_node("n", &[])
        .return_var("n", "team")
        .return_agg(AggKind::Count, "n", "team", "members")
        .build()
        .expect("valid query");

    let engine = QueryEngine::new(&graph);
    let result = engine.run(&ast).expect("query executes");

    let rows: std::collections::BTreeMap<String, i64> = result.values["n.team"]
        .iter()
        .zip(result.values["members"].iter())
        .map(|(team, count)| match (team, count) {
            (Value::String(t), Value::Int(c)) => (t.clone(), *c),
            _ => unreachable!("team is a string, members is a count"),
        })
        .collect();

    assert_eq!(rows.get("engineering"), Some(&2));
    assert_eq!(rows.get("sales"), Some(&1));
}

#[test]
fn sum_treats_a_missing_attribute_as_zero_but_max_skips_it() {
    let mut g = NamedGraphBuilder::new();
    let mut with_amount = attrs();
    with_amount.insert("amount".into(), Value::Int(100));
    g.node("a", &[], with_amount);
    g.node("b", &[], attrs());
    let mut other_amount = attrs();
    other_amount.insert("amount".into(), Value::Int(50));
    g.node("c", &[], other_amount);
    let (graph, _names) = g.build();

    let sum_ast = QueryBuilder::new()
        .match_node("n", &[])
        .return_agg(AggKind::Sum, "n", "amount", "total")
        .build()
        .expect("valid query");
    let max_ast = QueryBuilder::new()
        .match_node("n", &[])
        .return_agg(AggKind::Max, "n", "amount", "largest")
        .build()
        .expect("valid query");

    let engine = QueryEngine::new(&graph);
    let sum_result = engine.run(&sum_ast).expect("query executes");
    let max_result = engine.run(&max_ast).expect("query executes");

    assert_eq!(sum_result.values["total"], vec![Value::Int(150)]);
    assert_eq!(max_result.values["largest"], vec![Value::Int(100)]);
}

#[test]
fn order_by_on_a_non_returned_column_is_rejected_when_distinct() {
    let mut g = NamedGraphBuilder::new();
    g.edge("x", "y", None, attrs());
    let (graph, _names) = g.build();

    let built = QueryBuilder::new()
        .match_node("a", &[])
        .match_edge_any("a", EdgeDirection::Outgoing, "b")
        .distinct()
        .return_var("a", "name")
        .order_by_var("b", "name", SortDir::Asc)
        .build()
        .expect("builder performs no order-by/distinct cross-check itself");

    let engine = QueryEngine::new(&graph);
    let err = engine.run(&built).unwrap_err();
    assert_eq!(err.code(), "OrderByNonReturnedWithDistinct");
}
