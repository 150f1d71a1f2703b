use criterion::{Criterion, black_box, criterion_group, criterion_main};
use entitylink_strings::{WeightCostModel, optimized_distance, weighted_distance};

const CLOSE: (&str, &str) = ("John Smith", "John  Smith");
const FAR: (&str, &str) = ("abcdefghijklmnop", "zyxwvutsrqponmlk");

fn bench_weighted(c: &mut Criterion) {
    let mut group = c.benchmark_group("edit_distance");

    group.bench_function("weighted_close", |b| {
        b.iter(|| black_box(weighted_distance(CLOSE.0, CLOSE.1, WeightCostModel)))
    });
    group.bench_function("weighted_far", |b| {
        b.iter(|| black_box(weighted_distance(FAR.0, FAR.1, WeightCostModel)))
    });

    // The early-termination kernel should win decisively on FAR, where it
    // bails out long before the full table would be computed.
    group.bench_function("optimized_close", |b| {
        b.iter(|| black_box(optimized_distance(CLOSE.0, CLOSE.1)))
    });
    group.bench_function("optimized_far", |b| {
        b.iter(|| black_box(optimized_distance(FAR.0, FAR.1)))
    });

    group.finish();
}

criterion_group!(benches, bench_weighted);
criterion_main!(benches);
