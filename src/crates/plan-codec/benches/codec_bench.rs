use criterion::{black_box, criterion_group, criterion_main, Criterion};
use plan_codec::{BincodePayloadCodec, NodeIndex, NodeKindTag, WorkGraph, WorkNodeCodec, WorkPayload};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BenchWork {
    path: String,
    task: bool,
}

impl WorkPayload for BenchWork {
    fn kind(&self) -> NodeKindTag {
        if self.task {
            NodeKindTag::Task
        } else {
            NodeKindTag::Plain
        }
    }
}

/// Layered plan: every node depends on up to four nodes of the previous layer
fn layered_graph(layers: usize, width: usize) -> (WorkGraph<BenchWork>, Vec<NodeIndex>) {
    let mut graph = WorkGraph::with_capacity(layers * width);
    let mut previous: Vec<NodeIndex> = Vec::new();

    for layer in 0..layers {
        let mut current = Vec::with_capacity(width);
        for i in 0..width {
            let node = graph.add_node(BenchWork {
                path: format!(":project{}:task{}", layer, i),
                task: i % 3 != 0,
            });
            for &dependency in previous.iter().skip(i % width).take(4) {
                graph.add_dependency(node, dependency).unwrap();
            }
            current.push(node);
        }
        previous = current;
    }

    let batch = graph.batch();
    (graph, batch)
}

fn encode_benchmark(c: &mut Criterion) {
    let (graph, batch) = layered_graph(50, 200);
    let codec = WorkNodeCodec::new(BincodePayloadCodec::<BenchWork>::new());

    c.bench_function("encode 10k nodes", |b| {
        b.iter(|| codec.encode(black_box(&graph), black_box(&batch)).unwrap());
    });
}

fn decode_benchmark(c: &mut Criterion) {
    let (graph, batch) = layered_graph(50, 200);
    let codec = WorkNodeCodec::new(BincodePayloadCodec::<BenchWork>::new());
    let bytes = codec.encode(&graph, &batch).unwrap();

    c.bench_function("decode 10k nodes", |b| {
        b.iter(|| codec.decode(black_box(&bytes)).unwrap());
    });
}

criterion_group!(benches, encode_benchmark, decode_benchmark);
criterion_main!(benches);
