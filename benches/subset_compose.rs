use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lndb_storage::IndexSet;

// =============================================================================
// Index composition
// =============================================================================

fn strided(n: usize, step: usize) -> Vec<usize> {
    (0..n).step_by(step).collect()
}

fn bench_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_compose");

    for &n in &[10_000usize, 1_000_000] {
        let outer = IndexSet::explicit(strided(n, 2));
        let local = strided(n / 2, 3);

        group.bench_with_input(BenchmarkId::new("all_then_explicit", n), &n, |b, _| {
            b.iter(|| black_box(&IndexSet::All).compose(Some(black_box(local.as_slice()))))
        });

        group.bench_with_input(BenchmarkId::new("explicit_then_explicit", n), &n, |b, _| {
            b.iter(|| black_box(&outer).compose(Some(black_box(local.as_slice()))))
        });
    }

    group.finish();
}

fn bench_nested_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_subset_chain");

    // Ten successive halvings of a million-row axis.
    let n = 1_000_000usize;
    group.bench_function("halving_x10", |b| {
        b.iter(|| {
            let mut index = IndexSet::All;
            let mut len = n;
            for _ in 0..10 {
                let keep: Vec<usize> = (0..len).step_by(2).collect();
                len = keep.len();
                index = index.compose(Some(keep.as_slice()));
            }
            black_box(index.len_or(n))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_compose, bench_nested_chain);
criterion_main!(benches);
