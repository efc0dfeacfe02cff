use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use futures_util::future::{ready, Ready};

use depload_core::{BoxError, DependencyLoader, DirectedGraph};

/// Graph of `layers` layers of `width` nodes, each node depending on every
/// node of the layer below.
fn layered_graph(layers: usize, width: usize) -> DirectedGraph<String> {
    let mut graph = DirectedGraph::new();
    for layer in 0..layers {
        for i in 0..width {
            graph.add(format!("{layer}:{i}")).unwrap();
        }
    }
    for layer in 1..layers {
        for i in 0..width {
            for j in 0..width {
                graph
                    .add_edge(&format!("{layer}:{i}"), &format!("{}:{j}", layer - 1))
                    .unwrap();
            }
        }
    }
    graph
}

/// Resolver for the same layered shape, discovered from the top layer down.
fn layered_resolver(width: usize) -> impl Fn(Vec<String>) -> Ready<Result<Vec<Vec<String>>, BoxError>> {
    move |keys: Vec<String>| {
        let deps = keys
            .iter()
            .map(|key| {
                let layer: usize = key
                    .split(':')
                    .next()
                    .and_then(|layer| layer.parse().ok())
                    .unwrap_or(0);
                match layer {
                    0 => Vec::new(),
                    _ => (0..width).map(|j| format!("{}:{j}", layer - 1)).collect(),
                }
            })
            .collect();
        ready(Ok(deps))
    }
}

fn bench_generations(c: &mut Criterion) {
    let mut group = c.benchmark_group("generations");
    for (layers, width) in [(10, 10), (50, 10), (20, 40)] {
        let graph = layered_graph(layers, width);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{layers}x{width}")),
            &graph,
            |b, graph| {
                b.iter(|| {
                    for generation in graph.generations() {
                        black_box(generation.unwrap());
                    }
                })
            },
        );
    }
    group.finish();
}

fn bench_cycle_check(c: &mut Criterion) {
    c.bench_function("build_acyclic_20x10", |b| {
        b.iter(|| black_box(layered_graph(20, 10)))
    });
}

fn bench_load(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("load");
    for (layers, width) in [(10, 10), (20, 20)] {
        group.bench_function(BenchmarkId::from_parameter(format!("{layers}x{width}")), |b| {
            b.to_async(&runtime).iter(|| async move {
                let top: Vec<String> = (0..width).map(|i| format!("{}:{i}", layers - 1)).collect();
                let mut loader = DependencyLoader::new(
                    top,
                    layered_resolver(width),
                    |keys: Vec<String>| {
                        black_box(keys);
                        ready(Ok::<(), BoxError>(()))
                    },
                );
                loader.load().await.unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_generations, bench_cycle_check, bench_load);
criterion_main!(benches);
