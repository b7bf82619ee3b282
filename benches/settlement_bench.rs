//! Settlement Math Benchmarks — Pipeline Hot-Path Validation
//!
//! Benchmarks the pure Decimal math that runs at the top of every
//! settlement poll and acquisition cycle. These are dwarfed by RPC
//! latency in production; the bench exists to catch accidental
//! regressions in the exact-arithmetic paths.
//!
//! Run with: cargo bench --bench settlement_bench

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_decimal_macros::dec;

use nft_flywheel_bot::domain::flywheel::{ask_price, covers_price_with_buffer};
use nft_flywheel_bot::domain::settlement::{SettlementPlan, minimum_output};

/// Benchmark the treasury balance partition.
fn bench_partition(c: &mut Criterion) {
    c.bench_function("settlement_partition", |b| {
        b.iter(|| {
            let _plan =
                SettlementPlan::partition(black_box(dec!(10)), black_box(dec!(0.5))).unwrap();
        });
    });
}

/// Benchmark the slippage floor computation.
fn bench_minimum_output(c: &mut Criterion) {
    c.bench_function("settlement_minimum_output", |b| {
        b.iter(|| {
            let _min = minimum_output(black_box(dec!(98431.5521)), black_box(dec!(0.10))).unwrap();
        });
    });
}

/// Benchmark the relist ask computation.
fn bench_ask_price(c: &mut Criterion) {
    c.bench_function("flywheel_ask_price", |b| {
        b.iter(|| {
            let _ask = ask_price(black_box(dec!(2.3781)), black_box(dec!(0.20)));
        });
    });
}

/// Benchmark the affordability gate.
fn bench_affordability(c: &mut Criterion) {
    c.bench_function("flywheel_affordability", |b| {
        b.iter(|| {
            let _ok = covers_price_with_buffer(
                black_box(dec!(12.5)),
                black_box(dec!(2.3781)),
                black_box(dec!(0.05)),
            );
        });
    });
}

criterion_group!(
    benches,
    bench_partition,
    bench_minimum_output,
    bench_ask_price,
    bench_affordability
);
criterion_main!(benches);
