//! Health factor sweep benchmarks.
//!
//! Every valuation walks the full listed asset set, so cost grows with the
//! number of markets rather than with the number of positions an account holds.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use lendpool::prelude::*;

fn listed_pool(markets: u64) -> (LedgerPool<InMemoryTokens>, Address, Vec<u128>) {
    let admin = Address::from_low_u64(1);
    let account = Address::from_low_u64(2);
    let lender = Address::from_low_u64(3);
    let controller = AdminController::new(admin).unwrap();
    let mut pool = LedgerPool::new(
        Address::from_low_u64(0x9001),
        controller,
        InterestRateModel::new(controller),
        InMemoryTokens::new(),
        ManualClock::new(0),
    )
    .unwrap();

    let config = AssetConfig::new(u128::MAX, u128::MAX, 7_500, 8_000, 500).unwrap();
    let custody = pool.address();
    for n in 0..markets {
        let asset = Address::from_low_u64(0x1000 + n);
        pool.set_asset_config(&admin, asset, config).unwrap();
        pool.add_allowed_asset(&admin, asset).unwrap();
        for holder in [account, lender] {
            pool.tokens_mut().mint(&asset, &holder, 1_000 * WAD).unwrap();
            pool.tokens_mut().approve(&asset, &holder, &custody, u128::MAX).unwrap();
        }
    }

    let prices = vec![WAD; markets as usize];
    for n in 0..markets {
        let asset = Address::from_low_u64(0x1000 + n);
        pool.deposit(&account, asset, 100 * WAD).unwrap();
        pool.deposit(&lender, asset, 1_000 * WAD).unwrap();
    }
    for n in (0..markets).step_by(2) {
        let asset = Address::from_low_u64(0x1000 + n);
        pool.borrow(&account, asset, 50 * WAD, &prices).unwrap();
    }
    (pool, account, prices)
}

fn bench_health_factor(c: &mut Criterion) {
    let mut group = c.benchmark_group("health_factor");
    for markets in [2u64, 8, 32, 128] {
        let (pool, account, prices) = listed_pool(markets);
        group.bench_with_input(BenchmarkId::from_parameter(markets), &markets, |b, _| {
            b.iter(|| pool.health_factor(black_box(&account), black_box(&prices)).unwrap())
        });
    }
    group.finish();
}

fn bench_account_summary(c: &mut Criterion) {
    let (pool, account, prices) = listed_pool(32);
    c.bench_function("account_summary_32", |b| {
        b.iter(|| pool.account_summary(black_box(&account), black_box(&prices)).unwrap())
    });
}

criterion_group!(benches, bench_health_factor, bench_account_summary);
criterion_main!(benches);
