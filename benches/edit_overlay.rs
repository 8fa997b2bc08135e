//! Benchmarks for the edit overlay
//!
//! Measures timeline mapping on heavily edited clips, which runs on every
//! tick and every decoded frame.

use clipforge::EditOverlay;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const HOUR_US: u64 = 3_600_000_000;

/// An hour-long overlay with `cuts` evenly spaced one-second deletions.
fn edited_overlay(cuts: u64) -> EditOverlay {
    let mut overlay = EditOverlay::new(HOUR_US);
    let stride = HOUR_US / (cuts + 1);
    // Later cuts first so earlier edited positions stay put
    for i in (1..=cuts).rev() {
        let start = i * stride;
        let _ = overlay.delete_range(start, start + 1_000_000);
    }
    overlay
}

fn bench_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("map");

    for cuts in [1u64, 100, 1000] {
        let overlay = edited_overlay(cuts);
        let probe = overlay.duration() / 2;

        group.bench_with_input(BenchmarkId::new("edited_to_original", cuts), &overlay, |b, o| {
            b.iter(|| o.map(black_box(probe)));
        });

        let original = overlay.map(probe).unwrap_or_default();
        group.bench_with_input(BenchmarkId::new("original_to_edited", cuts), &overlay, |b, o| {
            b.iter(|| o.unmap(black_box(original)));
        });

        group.bench_with_input(BenchmarkId::new("is_visible", cuts), &overlay, |b, o| {
            b.iter(|| o.is_visible(black_box(original), black_box(original + 41_667)));
        });
    }

    group.finish();
}

fn bench_delete_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_range");

    for cuts in [1u64, 100, 1000] {
        let overlay = edited_overlay(cuts);
        group.bench_with_input(BenchmarkId::new("middle", cuts), &overlay, |b, o| {
            b.iter_batched(
                || o.clone(),
                |mut o| {
                    let mid = o.duration() / 2;
                    o.delete_range(black_box(mid), black_box(mid + 10_000_000))
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_map, bench_delete_range);
criterion_main!(benches);
