use criterion::{criterion_group, criterion_main, Criterion};

use concord_core::{AwSet, Marshaler};

fn merge_benchmarks(c: &mut Criterion) {
    let left = AwSet::new();
    let right = AwSet::new();
    for i in 0..1_000 {
        left.add_one(format!("left-{i}"), "replica-a");
        right.add_one(format!("right-{i}"), "replica-b");
    }
    let overlapping = AwSet::new();
    overlapping.merge(&left);
    for i in 0..1_000 {
        overlapping.add_one(format!("left-{i}"), "replica-b");
    }

    c.bench_function("awset_merge_disjoint_1k", |b| {
        b.iter(|| {
            let target = AwSet::new();
            target.merge(&left);
            target.merge(&right);
            target.cardinality()
        })
    });

    c.bench_function("awset_merge_overlapping_1k", |b| {
        b.iter(|| {
            let target = AwSet::new();
            target.merge(&left);
            target.merge(&overlapping);
            target.cardinality()
        })
    });

    c.bench_function("awset_marshal_1k", |b| b.iter(|| left.marshal().unwrap().len()));
}

criterion_group!(benches, merge_benchmarks);
criterion_main!(benches);
