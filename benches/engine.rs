// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Benchmarks for the ledger engine.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded movement application
//! - Contended and uncontended multi-threaded application
//! - History paging and audits
//! - Scaling with number of threads

use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group,
    criterion_main,
};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use wallet_ledger::{AccountId, Engine, HistoryQuery, MovementKind, MovementRequest, OwnerId};

// =============================================================================
// Helper Functions
// =============================================================================

fn make_request(kind: MovementKind, cents: i64) -> MovementRequest {
    MovementRequest::new(kind, Decimal::new(cents, 2), "bench")
}

/// Engine with `accounts` accounts, for owners `1..=accounts`.
fn make_engine(accounts: u64) -> (Engine, Vec<AccountId>) {
    let engine = Engine::in_memory();
    let ids = (1..=accounts)
        .map(|owner| engine.get_or_create(OwnerId(owner)).unwrap().id)
        .collect();
    (engine, ids)
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_single_deposit(c: &mut Criterion) {
    let deposit = make_request(MovementKind::Deposit, 100);
    c.bench_function("single_deposit", |b| {
        b.iter_batched(
            || make_engine(1),
            |(engine, ids)| engine.apply(ids[0], black_box(&deposit)).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

fn bench_rejected_withdrawal(c: &mut Criterion) {
    let (engine, ids) = make_engine(1);
    let withdrawal = make_request(MovementKind::Withdrawal, 100);
    c.bench_function("rejected_withdrawal", |b| {
        b.iter(|| engine.apply(ids[0], black_box(&withdrawal)).unwrap_err())
    });
}

fn bench_mixed_movements(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_movements");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64 * 2));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let deposit = make_request(MovementKind::Deposit, 10_000);
            let fee = make_request(MovementKind::Fee, 5_000);
            b.iter(|| {
                let (engine, ids) = make_engine(1);
                for _ in 0..count {
                    engine.apply(ids[0], &deposit).unwrap();
                    engine.apply(ids[0], &fee).unwrap();
                }
                black_box(&engine);
            })
        });
    }
    group.finish();
}

// =============================================================================
// Multi-Threaded Benchmarks
// =============================================================================

fn bench_parallel_same_account(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_same_account");

    for count in [1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let deposit = make_request(MovementKind::Deposit, 100);
            b.iter(|| {
                let (engine, ids) = make_engine(1);
                (0..count).into_par_iter().for_each(|_| {
                    engine.apply(ids[0], &deposit).unwrap();
                });
                black_box(&engine);
            })
        });
    }
    group.finish();
}

fn bench_parallel_many_accounts(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_many_accounts");
    let total = 10_000usize;

    for num_accounts in [10u64, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(total as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_accounts),
            num_accounts,
            |b, &num_accounts| {
                let deposit = make_request(MovementKind::Deposit, 100);
                b.iter(|| {
                    let (engine, ids) = make_engine(num_accounts);
                    (0..total).into_par_iter().for_each(|i| {
                        engine.apply(ids[i % ids.len()], &deposit).unwrap();
                    });
                    black_box(&engine);
                })
            },
        );
    }
    group.finish();
}

fn bench_thread_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_scaling");
    let total = 50_000usize;

    for num_threads in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(total as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(num_threads),
            num_threads,
            |b, &num_threads| {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .unwrap();
                let deposit = make_request(MovementKind::Deposit, 100);

                b.iter(|| {
                    let (engine, ids) = make_engine(1_000);
                    pool.install(|| {
                        (0..total).into_par_iter().for_each(|i| {
                            engine.apply(ids[i % ids.len()], &deposit).unwrap();
                        });
                    });
                    black_box(&engine);
                })
            },
        );
    }
    group.finish();
}

// =============================================================================
// Read Path Benchmarks
// =============================================================================

fn bench_history_and_audit(c: &mut Criterion) {
    let (engine, ids) = make_engine(1);
    let deposit = make_request(MovementKind::Deposit, 100);
    for _ in 0..5_000 {
        engine.apply(ids[0], &deposit).unwrap();
    }

    let mut group = c.benchmark_group("read_path");
    group.bench_function("history_page", |b| {
        let query = HistoryQuery::default().with_limit(50).newest_first();
        b.iter(|| engine.history(ids[0], black_box(&query)).unwrap())
    });
    group.bench_function("balance", |b| {
        b.iter(|| engine.balance(black_box(ids[0])).unwrap())
    });
    group.bench_function("audit_5000", |b| {
        b.iter(|| engine.audit(black_box(ids[0])).unwrap())
    });
    group.finish();
}

fn bench_shared_engine(c: &mut Criterion) {
    let bonus = make_request(MovementKind::Bonus, 1);

    c.bench_function("shared_engine_parallel_bonus", |b| {
        b.iter_batched(
            || {
                let (engine, ids) = make_engine(100);
                (Arc::new(engine), ids)
            },
            |(engine, ids)| {
                ids.par_iter().for_each(|id| {
                    engine.apply(*id, &bonus).unwrap();
                });
                engine
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    single_threaded,
    bench_single_deposit,
    bench_rejected_withdrawal,
    bench_mixed_movements,
);

criterion_group!(
    multi_threaded,
    bench_parallel_same_account,
    bench_parallel_many_accounts,
    bench_shared_engine,
);

criterion_group!(scaling, bench_thread_scaling,);

criterion_group!(reads, bench_history_and_audit,);

criterion_main!(single_threaded, multi_threaded, scaling, reads);
