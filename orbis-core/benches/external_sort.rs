//! Criterion benchmarks for the external merge sort.
//!
//! Sorts deterministic pseudo-random longs with sequential and rayon-backed
//! batch sorting across a few batch sizes.
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench --package orbis-core
//! ```

// Criterion macros generate code that triggers missing_docs warnings.
#![allow(missing_docs, reason = "Criterion macros generate undocumented code")]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use orbis_core::codec::LongDataType;
use orbis_core::{
    AlignedDataList, CollectionError, DataList, ExternalMergeSort, OnHeapMemory, SortConfig,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const BENCHMARK_SEED: u64 = 0x0b15;
const VALUE_COUNT: u64 = 200_000;
const BATCH_SIZES: &[usize] = &[5_000, 50_000];

fn long_list() -> Result<AlignedDataList<LongDataType>, CollectionError> {
    AlignedDataList::new(OnHeapMemory::new(1 << 20)?, LongDataType)
}

fn random_input() -> AlignedDataList<LongDataType> {
    let mut rng = ChaCha8Rng::seed_from_u64(BENCHMARK_SEED);
    let list = long_list().expect("input list");
    for _ in 0..VALUE_COUNT {
        list.add(&rng.r#gen::<i64>()).expect("add");
    }
    list
}

fn bench_sort(c: &mut Criterion) {
    let input = random_input();
    let mut group = c.benchmark_group("external_sort");
    group.sample_size(10);
    group.throughput(Throughput::Elements(VALUE_COUNT));

    for &batch_size in BATCH_SIZES {
        for parallel in [false, true] {
            let label = if parallel { "parallel" } else { "sequential" };
            let sort = ExternalMergeSort::new(SortConfig {
                batch_size,
                parallel,
                ..SortConfig::default()
            })
            .expect("valid config");
            group.bench_with_input(BenchmarkId::new(label, batch_size), &sort, |b, sort| {
                b.iter(|| {
                    let output = long_list().expect("output list");
                    sort.sort(&input, &output, i64::cmp, long_list)
                        .expect("sort");
                    output
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_sort);
criterion_main!(benches);
