// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Allocator statistics for diagnostics.
//!
//! [`AllocatorStats`] counts what the allocator has decided so far. It is
//! updated under the same lock as the state, so the numbers always agree
//! with the tables they describe.

use crate::{DenialReason, RequestOutcome};

/// Cumulative counters of allocator activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocatorStats {
    /// Clients registered since construction.
    pub registrations: u64,
    /// Clients removed (explicitly or by reclamation).
    pub deregistrations: u64,
    /// Requests evaluated, including fatal ones.
    pub total_requests: u64,
    pub grants: u64,
    /// Requests denied because the pool was short.
    pub denied_unavailable: u64,
    /// Requests denied by the safety check.
    pub denied_unsafe: u64,
    /// Requests rejected for exceeding the declared maximum.
    pub exceeded_maximum: u64,
    pub releases: u64,
    /// Clients whose remaining units were reclaimed on finish or drop.
    pub reclamations: u64,
    /// Highest number of simultaneously registered clients.
    pub peak_clients: usize,
}

impl AllocatorStats {
    /// Fraction of evaluated requests that were granted, in `[0.0, 1.0]`.
    ///
    /// Returns `0.0` if no requests have been made.
    pub fn grant_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.grants as f64 / self.total_requests as f64
    }

    /// Total transient denials.
    pub fn denials(&self) -> u64 {
        self.denied_unavailable + self.denied_unsafe
    }

    pub(crate) fn record_registration(&mut self, clients_now: usize) {
        self.registrations += 1;
        self.peak_clients = self.peak_clients.max(clients_now);
    }

    pub(crate) fn record_deregistration(&mut self) {
        self.deregistrations += 1;
    }

    pub(crate) fn record_outcome(&mut self, outcome: RequestOutcome) {
        self.total_requests += 1;
        match outcome {
            RequestOutcome::Granted => self.grants += 1,
            RequestOutcome::Denied(DenialReason::Unavailable) => self.denied_unavailable += 1,
            RequestOutcome::Denied(DenialReason::Unsafe) => self.denied_unsafe += 1,
        }
    }

    pub(crate) fn record_exceeded(&mut self) {
        self.total_requests += 1;
        self.exceeded_maximum += 1;
    }

    pub(crate) fn record_release(&mut self) {
        self.releases += 1;
    }

    pub(crate) fn record_reclamation(&mut self) {
        self.reclamations += 1;
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "Requests: {} total ({} granted, {:.0}% grant rate), \
             {} denied ({} unavailable, {} unsafe), {} over maximum, \
             {} releases, {} clients (peak {}), {} reclaimed",
            self.total_requests,
            self.grants,
            self.grant_ratio() * 100.0,
            self.denials(),
            self.denied_unavailable,
            self.denied_unsafe,
            self.exceeded_maximum,
            self.releases,
            self.registrations,
            self.peak_clients,
            self.reclamations,
        )
    }
}
