//! Benchmark for the ordered containers under epoch reclamation:
//! SkipList, OrderedList vs crossbeam-skiplist.
//!
//! Run with: cargo bench --package urchin-crossbeam --bench ordered_container_benchmark

use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;
use crossbeam_skiplist::SkipMap;
use mimalloc::MiMalloc;
use std::sync::Arc;
use std::thread;

use urchin_core::OrderedContainer;
use urchin_core::OrderedList;
use urchin_core::SkipList;
use urchin_crossbeam::EpochReclaim;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

// Type aliases for convenience
type EpochSkipList = SkipList<u64, EpochReclaim>;
type EpochOrderedList = OrderedList<u64, EpochReclaim>;

// ============================================================================
// Generic benchmark helpers
// ============================================================================

/// add -> contains -> remove over disjoint per-thread key ranges.
fn churn<C>(threads: u64, ops_per_thread: u64)
where
    C: OrderedContainer<u64> + Default + 'static,
{
    let container = Arc::new(C::default());
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let container = Arc::clone(&container);
            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let key = t * ops_per_thread + i + 1;
                    container.add(key, key);
                    black_box(container.contains(key));
                    container.remove(key);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

/// The same workload against crossbeam's SkipMap as a baseline.
fn churn_skipmap(threads: u64, ops_per_thread: u64) {
    let map = Arc::new(SkipMap::new());
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let key = t * ops_per_thread + i + 1;
                    map.insert(key, key);
                    black_box(map.contains_key(&key));
                    map.remove(&key);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

/// Pre-populated queue drained to exhaustion by `threads` poppers.
fn pop_drain(threads: u64, count: u64) {
    let queue: Arc<EpochSkipList> = Arc::new(SkipList::new());
    for key in 0..count {
        queue.add(key, key);
    }
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                while let Some(value) = queue.pop_min() {
                    black_box(value);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

// ============================================================================
// Criterion groups
// ============================================================================

fn bench_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("churn");
    group.sample_size(10);

    for threads in [1u64, 4] {
        group.bench_with_input(
            BenchmarkId::new("skip_list", threads),
            &threads,
            |b, &threads| b.iter(|| churn::<EpochSkipList>(threads, 10_000)),
        );
        group.bench_with_input(
            BenchmarkId::new("crossbeam_skipmap", threads),
            &threads,
            |b, &threads| b.iter(|| churn_skipmap(threads, 10_000)),
        );
        // the list walk is linear in the key range; keep its volume sane
        group.bench_with_input(
            BenchmarkId::new("ordered_list", threads),
            &threads,
            |b, &threads| b.iter(|| churn::<EpochOrderedList>(threads, 1_000)),
        );
    }
    group.finish();
}

fn bench_pop_min(c: &mut Criterion) {
    let mut group = c.benchmark_group("pop_min");
    group.sample_size(10);

    for threads in [1u64, 4] {
        group.bench_with_input(
            BenchmarkId::new("drain", threads),
            &threads,
            |b, &threads| b.iter(|| pop_drain(threads, 20_000)),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_churn, bench_pop_min);
criterion_main!(benches);
