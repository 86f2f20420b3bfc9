use std::collections::HashSet;
use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use graph_config::models::NodeId;
use graph_config::validation::validate;

fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    *state
}

fn synthetic_dag(node_count: usize, edge_count: usize) -> (Vec<NodeId>, Vec<(NodeId, NodeId)>) {
    let nodes = (0..node_count)
        .map(|idx| NodeId::Text(format!("node-{idx}")))
        .collect::<Vec<_>>();

    let mut state = 0x1234_5678_9abc_def0u64;
    let mut seen = HashSet::with_capacity(edge_count);
    let mut edges = Vec::with_capacity(edge_count);
    while edges.len() < edge_count {
        let a = (lcg_next(&mut state) as usize) % node_count;
        let b = (lcg_next(&mut state) as usize) % node_count;
        if a == b {
            continue;
        }
        let pair = if a < b { (a, b) } else { (b, a) };
        if seen.insert(pair) {
            edges.push((nodes[pair.0].clone(), nodes[pair.1].clone()));
        }
    }

    (nodes, edges)
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");
    for (nodes, edges) in [(100usize, 300usize), (1_000usize, 3_000usize)] {
        let (node_data, mut edge_data) = synthetic_dag(nodes, edges);

        group.throughput(Throughput::Elements(edges as u64));
        group.bench_with_input(
            BenchmarkId::new("dag", format!("{nodes}n_{edges}e")),
            &(node_data.clone(), edge_data.clone()),
            |b, (nodes, edges)| b.iter(|| black_box(validate(nodes, edges))),
        );

        edge_data.push((node_data[0].clone(), node_data[1].clone()));
        edge_data.push((node_data[1].clone(), node_data[0].clone()));
        group.bench_with_input(
            BenchmarkId::new("cyclic", format!("{nodes}n_{}e", edges + 2)),
            &(node_data, edge_data),
            |b, (nodes, edges)| b.iter(|| black_box(validate(nodes, edges))),
        );
    }
    group.finish();
}

criterion_group!(cycle_checks, bench_validate);
criterion_main!(cycle_checks);
