// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Integration tests: the classic five-client instance and the request
//! outcomes around it, single-threaded and racing.

use allocator::{Allocator, AllocatorError, BackoffPolicy, Client, DenialReason, RequestOutcome};
use resource_vector::ResourceVector;
use std::sync::Barrier;
use std::time::Duration;

// ── Helpers ─────────────────────────────────────────────────

fn v<const N: usize>(units: [u32; N]) -> ResourceVector {
    ResourceVector::from(units)
}

const TOTAL: [u32; 3] = [10, 5, 7];

/// Declared maxima of the five textbook clients.
const MAXIMA: [[u32; 3]; 5] = [[7, 5, 3], [3, 2, 2], [9, 0, 2], [2, 2, 2], [4, 3, 3]];

/// Allocations of the five textbook clients at the snapshot.
const ALLOCATIONS: [[u32; 3]; 5] = [[0, 1, 0], [2, 0, 0], [3, 0, 2], [2, 1, 1], [0, 0, 2]];

/// Drives a fresh allocator into the textbook state (available `[3, 3, 2]`).
fn textbook() -> (Allocator, Vec<Client>) {
    let pool = Allocator::new(v(TOTAL)).unwrap();
    let clients: Vec<Client> = MAXIMA.iter().map(|m| pool.register(v(*m)).unwrap()).collect();
    for (client, alloc) in clients.iter().zip(ALLOCATIONS) {
        assert_eq!(client.request(&v(alloc)).unwrap(), RequestOutcome::Granted);
    }
    assert_eq!(pool.available(), v([3, 3, 2]));
    (pool, clients)
}

// ── Textbook instance ───────────────────────────────────────

#[test]
fn textbook_state_is_safe() {
    let (pool, _clients) = textbook();
    assert!(pool.is_safe());
    let snapshot = pool.snapshot();
    assert!(snapshot.conserves_units());
    assert!(snapshot.within_maxima());
}

#[test]
fn textbook_p1_request_is_granted() {
    let (pool, clients) = textbook();
    assert!(clients[1].request(&v([1, 0, 2])).unwrap().is_granted());
    assert_eq!(pool.available(), v([2, 3, 0]));
    assert!(pool.is_safe());
}

#[test]
fn textbook_p0_request_after_p1_is_unsafe_and_leaves_state() {
    let (pool, clients) = textbook();
    assert!(clients[1].request(&v([1, 0, 2])).unwrap().is_granted());
    let before = pool.snapshot();
    assert_eq!(
        clients[0].request(&v([0, 2, 0])).unwrap(),
        RequestOutcome::Denied(DenialReason::Unsafe)
    );
    assert_eq!(pool.snapshot(), before);
}

#[test]
fn textbook_p4_requests_are_denied() {
    let (pool, clients) = textbook();
    let before = pool.snapshot();
    assert_eq!(
        clients[4].request(&v([3, 3, 0])).unwrap(),
        RequestOutcome::Denied(DenialReason::Unsafe)
    );
    assert_eq!(
        clients[4].request(&v([4, 0, 0])).unwrap(),
        RequestOutcome::Denied(DenialReason::Unavailable)
    );
    assert_eq!(pool.snapshot(), before);
}

// ── Incremental growth ──────────────────────────────────────

#[test]
fn incremental_requests_with_idle_peers_are_granted() {
    let pool = Allocator::new(v(TOTAL)).unwrap();
    let main = pool.register(v([6, 4, 3])).unwrap();
    let _peers: Vec<Client> = [[3, 2, 2], [3, 0, 2], [2, 1, 1], [3, 3, 3]]
        .iter()
        .map(|m| pool.register(v(*m)).unwrap())
        .collect();

    assert!(main.request(&v([0, 1, 0])).unwrap().is_granted());
    assert!(main.request(&v([0, 2, 0])).unwrap().is_granted());
    assert!(main.request(&v([6, 0, 3])).unwrap().is_granted());
    assert_eq!(main.need().unwrap(), v([0, 1, 0]));
    assert_eq!(pool.available(), v([4, 2, 4]));
    assert!(pool.is_safe());
}

#[test]
fn five_threads_all_run_to_completion() {
    let pool = Allocator::new(v(TOTAL)).unwrap();
    let maxima = [[6, 4, 3], [3, 2, 2], [3, 0, 2], [2, 1, 1], [3, 3, 3]];
    let policy = BackoffPolicy::fixed(Duration::from_millis(1));

    std::thread::scope(|s| {
        for max in maxima {
            let pool = pool.clone();
            let policy = policy.clone();
            s.spawn(move || {
                let client = pool.register(v(max)).unwrap();
                // Acquire the maximum in unit steps along each class, then hold all.
                let mut held = Vec::new();
                for (class, &units) in max.iter().enumerate() {
                    for _ in 0..units {
                        let mut step = [0; 3];
                        step[class] = 1;
                        held.push(client.acquire(v(step), &policy).unwrap());
                    }
                }
                assert_eq!(client.need().unwrap(), ResourceVector::zeros(3));
                drop(held);
                client.finish().unwrap();
            });
        }
    });

    assert_eq!(pool.available(), v(TOTAL));
    assert_eq!(pool.client_count(), 0);
    assert_eq!(pool.stats().deregistrations, 5);
}

// ── Declared maximum ────────────────────────────────────────

#[test]
fn request_over_maximum_is_fatal() {
    let (pool, clients) = textbook();
    let before = pool.available();
    let err = clients[3].request(&v([1, 1, 2])).unwrap_err();
    match err {
        AllocatorError::ExceedsDeclaredMaximum { need, requested, .. } => {
            assert_eq!(need, v([0, 1, 1]));
            assert_eq!(requested, v([1, 1, 2]));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(pool.available(), before);
}

// ── Racing requests ─────────────────────────────────────────

#[test]
fn racing_requests_commit_exactly_one() {
    for _ in 0..50 {
        let pool = Allocator::new(v([2])).unwrap();
        let a = pool.register(v([2])).unwrap();
        let b = pool.register(v([2])).unwrap();
        let barrier = Barrier::new(2);

        let outcomes: Vec<RequestOutcome> = std::thread::scope(|s| {
            let handles: Vec<_> = [&a, &b]
                .into_iter()
                .map(|client| {
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        client.request(&v([1])).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let granted = outcomes.iter().filter(|o| o.is_granted()).count();
        assert_eq!(granted, 1, "outcomes: {outcomes:?}");
        assert!(outcomes.contains(&RequestOutcome::Denied(DenialReason::Unsafe)));
        assert_eq!(pool.available(), v([1]));
        assert!(pool.is_safe());
    }
}

// ── Release ─────────────────────────────────────────────────

#[test]
fn release_restores_available_exactly() {
    let pool = Allocator::new(v(TOTAL)).unwrap();
    let client = pool.register(v([6, 4, 3])).unwrap();
    let before = pool.available();
    assert!(client.request(&v([0, 1, 0])).unwrap().is_granted());
    client.release(&v([0, 1, 0])).unwrap();
    assert_eq!(pool.available(), before);
    assert_eq!(client.allocation().unwrap(), ResourceVector::zeros(3));
}

#[test]
fn split_release_matches_single_release() {
    let held = v([3, 1, 2]);
    let first = v([1, 0, 2]);
    let second = v([1, 1, 0]);

    let split = Allocator::new(v(TOTAL)).unwrap();
    let a = split.register(v([7, 5, 3])).unwrap();
    assert!(a.request(&held).unwrap().is_granted());
    a.release(&first).unwrap();
    a.release(&second).unwrap();

    let whole = Allocator::new(v(TOTAL)).unwrap();
    let b = whole.register(v([7, 5, 3])).unwrap();
    assert!(b.request(&held).unwrap().is_granted());
    b.release(&(&first + &second)).unwrap();

    assert_eq!(split.available(), whole.available());
    assert_eq!(a.allocation().unwrap(), b.allocation().unwrap());
    assert_eq!(a.need().unwrap(), b.need().unwrap());
    assert_eq!(a.allocation().unwrap(), v([1, 0, 0]));
}

#[test]
fn guard_drop_on_error_path_releases() {
    fn failing_work(client: &Client) -> Result<(), String> {
        let _held = client
            .acquire(v([2, 2, 2]), &BackoffPolicy::immediate())
            .map_err(|e| e.to_string())?;
        Err("work failed".to_string())
    }

    let pool = Allocator::new(v(TOTAL)).unwrap();
    let client = pool.register(v([3, 3, 3])).unwrap();
    assert!(failing_work(&client).is_err());
    assert_eq!(pool.available(), v(TOTAL));
}
