// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for the safety check and the request path.

use allocator::{Allocator, SafetyChecker};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use resource_vector::ResourceVector;

/// `clients` rows over `classes` classes where each client can only finish
/// after the one before it, the worst case for the restarting scan.
fn chained_rows(clients: usize, classes: usize) -> (ResourceVector, Vec<(ResourceVector, ResourceVector)>) {
    let work = ResourceVector::from(vec![1; classes]);
    let rows = (0..clients)
        .rev()
        .map(|i| {
            let allocation = ResourceVector::from(vec![1; classes]);
            let need = ResourceVector::from(vec![i as u32 + 1; classes]);
            (allocation, need)
        })
        .collect();
    (work, rows)
}

fn bench_safety_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("safety_check");
    for clients in [8, 32, 128] {
        let (work, rows) = chained_rows(clients, 4);
        group.bench_with_input(BenchmarkId::from_parameter(clients), &rows, |b, rows| {
            b.iter(|| {
                let checker = rows
                    .iter()
                    .enumerate()
                    .fold(SafetyChecker::new(work.clone()), |c, (i, (a, n))| c.client(i, a, n));
                black_box(checker.is_safe())
            });
        });
    }
    group.finish();
}

fn bench_request_release(c: &mut Criterion) {
    let pool = Allocator::new(ResourceVector::from([64, 64, 64, 64])).unwrap();
    let clients: Vec<_> = (0..16)
        .map(|_| pool.register(ResourceVector::from([4, 4, 4, 4])).unwrap())
        .collect();
    let unit = ResourceVector::from([1, 1, 1, 1]);

    c.bench_function("request_release", |b| {
        b.iter(|| {
            for client in &clients {
                black_box(client.request(&unit).unwrap());
            }
            for client in &clients {
                client.release(&unit).unwrap();
            }
        });
    });
}

criterion_group!(benches, bench_safety_check, bench_request_release);
criterion_main!(benches);
