// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The Banker's safety check.
//!
//! A state is *safe* when some completion order exists in which every
//! client, in turn, can be handed its full remaining need from the units
//! on hand and then returns everything it holds.
//!
//! # Algorithm
//!
//! ```text
//! work     = available
//! finished = {}
//! loop:
//!     pick the first unfinished c with need[c] ≤ work
//!     if none: stop
//!     work += allocation[c]; finished += c     (restart the scan)
//! safe ⇔ finished == all clients
//! ```
//!
//! The search is greedy but its verdict does not depend on scan order:
//! finishing a client only ever grows `work`, so a client that could run
//! now can still run later. The reported sequence is one witness among
//! possibly many; callers must only rely on the verdict.
//!
//! Worst case is O(n²·k) for n clients and k resource classes.

use resource_vector::ResourceVector;

/// One client row of the hypothetical state being checked.
#[derive(Debug, Clone)]
struct Row<'a, K> {
    key: K,
    allocation: &'a ResourceVector,
    need: &'a ResourceVector,
}

/// Outcome of a safety check.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum SafetyVerdict<K> {
    /// Every client can complete; `sequence` is one completion order.
    Safe { sequence: Vec<K> },
    /// Some clients can never be satisfied from the units on hand.
    Unsafe {
        /// Clients that could complete before the search got stuck.
        finished: Vec<K>,
        /// Clients whose need exceeds every reachable `work` vector.
        blocked: Vec<K>,
    },
}

impl<K> SafetyVerdict<K> {
    /// Returns `true` for [`SafetyVerdict::Safe`].
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyVerdict::Safe { .. })
    }
}

/// Evaluates whether a hypothetical allocation state is safe.
///
/// The checker is generic over the client key so it can run both on the
/// live allocator (keyed by [`crate::ClientId`]) and on static snapshots
/// keyed by name.
///
/// # Example
/// ```
/// use allocator::SafetyChecker;
/// use resource_vector::ResourceVector;
///
/// let alloc_a = ResourceVector::from([1, 0]);
/// let need_a = ResourceVector::from([1, 1]);
/// let alloc_b = ResourceVector::from([0, 1]);
/// let need_b = ResourceVector::from([2, 0]);
///
/// let verdict = SafetyChecker::new(ResourceVector::from([1, 1]))
///     .client("a", &alloc_a, &need_a)
///     .client("b", &alloc_b, &need_b)
///     .evaluate();
/// assert!(verdict.is_safe());
/// ```
#[derive(Debug, Clone)]
pub struct SafetyChecker<'a, K> {
    work: ResourceVector,
    rows: Vec<Row<'a, K>>,
}

impl<'a, K: Clone> SafetyChecker<'a, K> {
    /// Starts a check with `work` as the hypothetical available vector.
    pub fn new(work: ResourceVector) -> Self {
        Self {
            work,
            rows: Vec::new(),
        }
    }

    /// Adds a client row. Rows are scanned in insertion order.
    pub fn client(mut self, key: K, allocation: &'a ResourceVector, need: &'a ResourceVector) -> Self {
        self.push(key, allocation, need);
        self
    }

    /// Adds a client row in place.
    pub fn push(&mut self, key: K, allocation: &'a ResourceVector, need: &'a ResourceVector) {
        self.rows.push(Row {
            key,
            allocation,
            need,
        });
    }

    /// Number of client rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if no rows were added. An empty state is trivially safe.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Runs the scan-and-restart search.
    pub fn evaluate(self) -> SafetyVerdict<K> {
        let Self { mut work, rows } = self;
        let mut finished = vec![false; rows.len()];
        let mut sequence = Vec::with_capacity(rows.len());

        'scan: loop {
            for (i, row) in rows.iter().enumerate() {
                if !finished[i] && row.need.fits_within(&work) {
                    work += row.allocation;
                    finished[i] = true;
                    sequence.push(row.key.clone());
                    continue 'scan;
                }
            }
            break;
        }

        if sequence.len() == rows.len() {
            SafetyVerdict::Safe { sequence }
        } else {
            let blocked = rows
                .iter()
                .zip(&finished)
                .filter(|(_, done)| !**done)
                .map(|(row, _)| row.key.clone())
                .collect();
            SafetyVerdict::Unsafe {
                finished: sequence,
                blocked,
            }
        }
    }

    /// Shortcut for `evaluate().is_safe()`.
    pub fn is_safe(self) -> bool {
        self.evaluate().is_safe()
    }
}
