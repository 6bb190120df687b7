// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Observability hook for allocator state transitions.
//!
//! Every register, grant, denial, release and deregistration produces one
//! [`AllocatorEvent`]. Events are handed to the allocator's [`EventSink`]
//! after the state lock has been released, so a slow sink delays only the
//! calling client.

use crate::{ClientId, DenialReason};
use resource_vector::ResourceVector;
use std::sync::{Mutex, PoisonError};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Registered,
    Granted,
    Denied(DenialReason),
    Released,
    Deregistered,
}

/// A single state transition.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AllocatorEvent {
    /// The client the transition belongs to.
    pub client: ClientId,
    pub kind: EventKind,
    /// Declared maximum for `Registered`, the requested or released amount
    /// otherwise. Zero for `Deregistered`.
    pub amount: ResourceVector,
    /// Pool availability after the transition.
    pub available: ResourceVector,
}

/// Receives allocator events.
///
/// Implementations must not block for long and must not panic.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &AllocatorEvent);
}

/// Logs every event through `tracing`. The default sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &AllocatorEvent) {
        let AllocatorEvent {
            client,
            kind,
            amount,
            available,
        } = event;
        match kind {
            EventKind::Registered => {
                tracing::info!(%client, maximum = %amount, %available, "client registered");
            }
            EventKind::Granted => {
                tracing::debug!(%client, %amount, %available, "request granted");
            }
            EventKind::Denied(reason) => {
                tracing::debug!(%client, %amount, %available, %reason, "request denied");
            }
            EventKind::Released => {
                tracing::debug!(%client, %amount, %available, "units released");
            }
            EventKind::Deregistered => {
                tracing::info!(%client, %available, "client deregistered");
            }
        }
    }
}

/// Keeps every event in memory (and forwards it to [`TracingSink`]).
///
/// Used by the scenario runner to attach a timeline to its report.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AllocatorEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the events recorded so far, in arrival order.
    pub fn events(&self) -> Vec<AllocatorEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of events recorded so far.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &AllocatorEvent) {
        TracingSink.record(event);
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
