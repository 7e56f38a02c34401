//! Fusion benchmarks.
//!
//! Run with: cargo bench -p docqa-retrieval --bench fusion_bench

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use docqa_core::{Metadata, Representation};
use docqa_retrieval::{reciprocal_rank_fusion, IndexHit, DEFAULT_RRF_K};

fn hit(list: usize, position: usize) -> IndexHit {
    // overlapping ids across lists, so fusion actually merges entries
    IndexHit {
        id: format!("chunk_{:04}", (list * 7 + position * 3) % 40),
        content: "benchmark chunk content that is long enough to copy".to_string(),
        similarity: 1.0 / (position + 1) as f32,
        representation: Representation::Dense,
        metadata: Metadata::new(),
    }
}

fn make_lists(lists: usize, hits_per_list: usize) -> Vec<Vec<IndexHit>> {
    (0..lists)
        .map(|list| (0..hits_per_list).map(|position| hit(list, position)).collect())
        .collect()
}

fn bench_fusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("reciprocal_rank_fusion");

    // one query with its rewrites, the common retrieval shape
    for (lists, hits_per_list) in [(3usize, 10usize), (6, 15), (8, 30)] {
        let input = make_lists(lists, hits_per_list);
        group.throughput(Throughput::Elements((lists * hits_per_list) as u64));
        group.bench_with_input(
            BenchmarkId::new("fuse", format!("{lists}x{hits_per_list}")),
            &input,
            |b, input| b.iter(|| reciprocal_rank_fusion(input, DEFAULT_RRF_K)),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_fusion);
criterion_main!(benches);
