// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Scenario run reports.
//!
//! [`RunReport`] collects per-client timing and retry counts together with
//! the allocator's own statistics, so that runs with different backoff
//! settings can be compared side by side.

use allocator::{AllocatorEvent, AllocatorStats, ClientId};
use resource_vector::ResourceVector;
use std::time::Duration;

/// How a client's run ended.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClientOutcome {
    /// Every step ran and the client deregistered cleanly.
    Completed,
    /// Step `step` (1-based, 0 = registration) failed.
    Failed { step: usize, error: String },
    /// The client thread panicked.
    Panicked,
}

/// What one client did.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClientReport {
    pub name: String,
    /// Allocator id, once registered.
    pub client: Option<ClientId>,
    pub maximum: ResourceVector,
    pub outcome: ClientOutcome,
    /// Steps that ran to completion.
    pub steps_completed: usize,
    /// Successful acquisitions.
    pub acquisitions: u32,
    /// Requests made by acquisitions, granted or not.
    pub attempts: u32,
    /// Time spent waiting inside acquisitions.
    pub waited: Duration,
    /// Time from scenario start until the client finished.
    pub elapsed: Duration,
}

impl ClientReport {
    pub(crate) fn new(name: &str, maximum: &ResourceVector) -> Self {
        Self {
            name: name.to_string(),
            client: None,
            maximum: maximum.clone(),
            outcome: ClientOutcome::Completed,
            steps_completed: 0,
            acquisitions: 0,
            attempts: 0,
            waited: Duration::ZERO,
            elapsed: Duration::ZERO,
        }
    }

    /// Requests that were denied before being granted.
    pub fn denials(&self) -> u32 {
        self.attempts.saturating_sub(self.acquisitions)
    }

    pub fn completed(&self) -> bool {
        self.outcome == ClientOutcome::Completed
    }
}

/// Aggregate result of a scenario run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub total: ResourceVector,
    /// Pool availability after every client finished.
    pub final_available: ResourceVector,
    pub wall_time: Duration,
    pub clients: Vec<ClientReport>,
    pub stats: AllocatorStats,
    /// Event timeline, if the scenario asked for one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<AllocatorEvent>>,
}

impl RunReport {
    /// `true` when every client completed.
    pub fn all_completed(&self) -> bool {
        self.clients.iter().all(ClientReport::completed)
    }

    /// Clients that did not complete.
    pub fn failures(&self) -> impl Iterator<Item = &ClientReport> {
        self.clients.iter().filter(|c| !c.completed())
    }

    /// `true` once every unit is back in the pool.
    pub fn pool_restored(&self) -> bool {
        self.final_available == self.total
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let completed = self.clients.iter().filter(|c| c.completed()).count();
        format!(
            "Scenario '{}': {}/{} clients completed in {:.2}ms, pool {} ({}), {}",
            self.scenario,
            completed,
            self.clients.len(),
            self.wall_time.as_secs_f64() * 1000.0,
            self.final_available,
            if self.pool_restored() { "restored" } else { "NOT restored" },
            self.stats.summary(),
        )
    }
}
