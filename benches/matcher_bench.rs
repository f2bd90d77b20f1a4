//! Microbenchmarks for subgraph search and attribute-index pre-filtering
//! over a synthetic graph of varying size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use motifql::model::{attrs, NamedGraphBuilder, Value};
use motifql::query::{EdgeDirection, QueryBuilder, QueryEngine};

fn ring_graph(node_count: u64) -> motifql::model::InMemoryGraph {
    let mut g = NamedGraphBuilder::new();
    for i in 0..node_count {
        let mut props = attrs();
        props.insert("seq".into(), Value::Int(i as i64));
        g.node(i.to_string(), &[], props);
    }
    for i in 0..node_count {
        let next = (i + 1) % node_count;
        g.edge(i.to_string(), next.to_string(), Some("NEXT"), attrs());
    }
    let (graph, _names) = g.build();
    graph
}

fn two_hop_chain_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("two_hop_chain");
    for &node_count in &[100u64, 1_000, 10_000] {
        let graph = ring_graph(node_count);
        let ast = QueryBuilder::new()
            .match_node("a", &[])
            .match_edge_types("a", EdgeDirection::Outgoing, &["NEXT"], "b")
            .match_edge_types("b", EdgeDirection::Outgoing, &["NEXT"], "c")
            .return_id("a")
            .return_id("c")
            .build()
            .expect("valid query");
        let engine = QueryEngine::new(&graph);

        group.bench_with_input(BenchmarkId::from_parameter(node_count), &node_count, |b, _| {
            b.iter(|| {
                let result = engine.run(black_box(&ast)).expect("query executes");
                black_box(result.len());
            });
        });
    }
    group.finish();
}

fn indexed_predicate_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexed_predicate");
    for &node_count in &[100u64, 1_000, 10_000] {
        let graph = ring_graph(node_count);
        let ast = QueryBuilder::new()
            .match_node("a", &[])
            .where_var("a", |p| {
                p.gt("seq", Value::Int(node_count as i64 / 2));
            })
            .return_var("a", "seq")
            .build()
            .expect("valid query");
        let engine = QueryEngine::new(&graph);

        group.bench_with_input(BenchmarkId::from_parameter(node_count), &node_count, |b, _| {
            b.iter(|| {
                let result = engine.run(black_box(&ast)).expect("query executes");
                black_box(result.len());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, two_hop_chain_benchmark, indexed_predicate_benchmark);
criterion_main!(benches);
