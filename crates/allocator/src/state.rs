// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The allocator's bookkeeping tables and their transactional mutators.
//!
//! [`AllocatorState`] is plain data: it knows nothing about locking,
//! events or statistics. [`crate::Allocator`] wraps exactly one instance
//! in a mutex and calls these methods while holding it.
//!
//! Invariants maintained by every method, for every class `k` and every
//! registered client `c`:
//!
//! ```text
//! available[k] + Σ_c allocation[c][k] == total[k]
//! allocation[c][k] ≤ maximum[c][k]
//! need[c]          == maximum[c] − allocation[c]
//! ```
//!
//! Methods either commit a complete new state or leave the tables
//! untouched; no error path performs a partial write.

use crate::{AllocatorError, PreconditionViolation, SafetyChecker, SafetyVerdict};
use resource_vector::ResourceVector;
use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier of a registered client.
///
/// Identifiers come from a per-allocator counter and are never handed out
/// twice by the same allocator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(pub(crate) u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Why a request was refused for now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The pool does not currently hold enough units.
    Unavailable,
    /// Granting would leave the system without a safe completion order.
    Unsafe,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::Unavailable => write!(f, "insufficient available units"),
            DenialReason::Unsafe => write!(f, "grant would leave the system unsafe"),
        }
    }
}

/// Result of a request that did not violate the client's declared maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// The units were committed to the client.
    Granted,
    /// Nothing changed; the same request may succeed later.
    Denied(DenialReason),
}

impl RequestOutcome {
    /// Returns `true` for [`RequestOutcome::Granted`].
    pub fn is_granted(&self) -> bool {
        matches!(self, RequestOutcome::Granted)
    }
}

/// Per-client rows: declared ceiling, current holding, remaining need.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ClientRecord {
    /// Declared ceiling, fixed at registration.
    pub maximum: ResourceVector,
    /// Units currently held.
    pub allocation: ResourceVector,
    /// `maximum − allocation`.
    pub need: ResourceVector,
}

impl ClientRecord {
    fn new(maximum: ResourceVector) -> Self {
        let classes = maximum.classes();
        Self {
            need: maximum.clone(),
            allocation: ResourceVector::zeros(classes),
            maximum,
        }
    }
}

/// A client's rows as seen in an [`AllocatorSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ClientSnapshot {
    pub id: ClientId,
    pub maximum: ResourceVector,
    pub allocation: ResourceVector,
    pub need: ResourceVector,
}

/// A consistent copy of the whole allocator state.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AllocatorSnapshot {
    /// Configured pool size per class.
    pub total: ResourceVector,
    /// Units not held by anyone.
    pub available: ResourceVector,
    /// Registered clients in registration order.
    pub clients: Vec<ClientSnapshot>,
}

impl AllocatorSnapshot {
    /// `available + Σ allocation == total`.
    pub fn conserves_units(&self) -> bool {
        let mut sum = self.available.clone();
        for c in &self.clients {
            sum += &c.allocation;
        }
        sum == self.total
    }

    /// Every client holds no more than its maximum and `need` matches.
    pub fn within_maxima(&self) -> bool {
        self.clients.iter().all(|c| {
            c.allocation.fits_within(&c.maximum) && &c.allocation + &c.need == c.maximum
        })
    }

    /// Runs the safety check on this snapshot.
    pub fn verdict(&self) -> SafetyVerdict<ClientId> {
        let mut checker = SafetyChecker::new(self.available.clone());
        for c in &self.clients {
            checker.push(c.id, &c.allocation, &c.need);
        }
        checker.evaluate()
    }
}

/// The shared tables: `available` plus one [`ClientRecord`] per client.
#[derive(Debug, Clone)]
pub(crate) struct AllocatorState {
    total: ResourceVector,
    available: ResourceVector,
    clients: BTreeMap<ClientId, ClientRecord>,
    next_id: u64,
}

impl AllocatorState {
    /// Sets up an empty state with every unit available.
    pub(crate) fn new(total: ResourceVector) -> Result<Self, AllocatorError> {
        if total.classes() == 0 {
            return Err(PreconditionViolation::EmptyResourceSpace.into());
        }
        Ok(Self {
            available: total.clone(),
            total,
            clients: BTreeMap::new(),
            next_id: 0,
        })
    }

    pub(crate) fn total(&self) -> &ResourceVector {
        &self.total
    }

    pub(crate) fn available(&self) -> &ResourceVector {
        &self.available
    }

    pub(crate) fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub(crate) fn record(&self, id: ClientId) -> Result<&ClientRecord, AllocatorError> {
        self.clients
            .get(&id)
            .ok_or_else(|| PreconditionViolation::UnknownClient { client: id }.into())
    }

    fn check_width(&self, vector: &ResourceVector) -> Result<(), AllocatorError> {
        if vector.same_width(&self.total) {
            Ok(())
        } else {
            Err(PreconditionViolation::DimensionMismatch {
                expected: self.total.classes(),
                found: vector.classes(),
                vector: vector.clone(),
            }
            .into())
        }
    }

    /// Creates rows for a new client: allocation zero, need = maximum.
    ///
    /// No feasibility check is made against the pool.
    pub(crate) fn register(&mut self, maximum: ResourceVector) -> Result<ClientId, AllocatorError> {
        self.check_width(&maximum)?;
        let id = ClientId(self.next_id);
        self.next_id += 1;
        self.clients.insert(id, ClientRecord::new(maximum));
        Ok(id)
    }

    /// Evaluates and, if safe, commits a request.
    pub(crate) fn request(
        &mut self,
        id: ClientId,
        req: &ResourceVector,
    ) -> Result<RequestOutcome, AllocatorError> {
        self.check_width(req)?;
        let record = self.record(id)?;

        if !req.fits_within(&record.need) {
            return Err(AllocatorError::ExceedsDeclaredMaximum {
                client: id,
                requested: req.clone(),
                need: record.need.clone(),
                available: self.available.clone(),
            });
        }
        if !req.fits_within(&self.available) {
            return Ok(RequestOutcome::Denied(DenialReason::Unavailable));
        }
        // Nothing would change.
        if req.is_zero() {
            return Ok(RequestOutcome::Granted);
        }

        // Tentative copy: only `available` and this client's row change.
        let tentative_available = &self.available - req;
        let mut tentative = record.clone();
        tentative.allocation += req;
        tentative.need -= req;

        let mut checker = SafetyChecker::new(tentative_available.clone());
        for (cid, rec) in &self.clients {
            if *cid == id {
                checker.push(*cid, &tentative.allocation, &tentative.need);
            } else {
                checker.push(*cid, &rec.allocation, &rec.need);
            }
        }
        if !checker.is_safe() {
            return Ok(RequestOutcome::Denied(DenialReason::Unsafe));
        }

        self.available = tentative_available;
        self.clients.insert(id, tentative);
        Ok(RequestOutcome::Granted)
    }

    /// Returns `amount` from the client to the pool.
    pub(crate) fn release(&mut self, id: ClientId, amount: &ResourceVector) -> Result<(), AllocatorError> {
        self.check_width(amount)?;
        let available = self.available.clone();
        let record = self
            .clients
            .get_mut(&id)
            .ok_or(PreconditionViolation::UnknownClient { client: id })?;

        if !amount.fits_within(&record.allocation) {
            return Err(PreconditionViolation::ReleaseExceedsAllocation {
                client: id,
                amount: amount.clone(),
                allocation: record.allocation.clone(),
                available,
            }
            .into());
        }

        record.allocation -= amount;
        record.need += amount;
        self.available += amount;
        Ok(())
    }

    /// Removes a client that holds nothing.
    pub(crate) fn deregister(&mut self, id: ClientId) -> Result<ClientRecord, AllocatorError> {
        let record = self.record(id)?;
        if !record.allocation.is_zero() {
            return Err(PreconditionViolation::DeregisterWhileHolding {
                client: id,
                allocation: record.allocation.clone(),
            }
            .into());
        }
        self.clients
            .remove(&id)
            .ok_or_else(|| PreconditionViolation::UnknownClient { client: id }.into())
    }

    /// Releases whatever the client still holds, then removes it.
    ///
    /// Returns the reclaimed units.
    pub(crate) fn reclaim(&mut self, id: ClientId) -> Result<ResourceVector, AllocatorError> {
        let held = self.record(id)?.allocation.clone();
        self.release(id, &held)?;
        self.deregister(id)?;
        Ok(held)
    }

    pub(crate) fn snapshot(&self) -> AllocatorSnapshot {
        AllocatorSnapshot {
            total: self.total.clone(),
            available: self.available.clone(),
            clients: self
                .clients
                .iter()
                .map(|(id, rec)| ClientSnapshot {
                    id: *id,
                    maximum: rec.maximum.clone(),
                    allocation: rec.allocation.clone(),
                    need: rec.need.clone(),
                })
                .collect(),
        }
    }

    pub(crate) fn verdict(&self) -> SafetyVerdict<ClientId> {
        let mut checker = SafetyChecker::new(self.available.clone());
        for (id, rec) in &self.clients {
            checker.push(*id, &rec.allocation, &rec.need);
        }
        checker.evaluate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v<const N: usize>(units: [u32; N]) -> ResourceVector {
        ResourceVector::from(units)
    }

    fn state() -> AllocatorState {
        AllocatorState::new(v([10, 5, 7])).unwrap()
    }

    #[test]
    fn test_empty_resource_space_rejected() {
        let err = AllocatorState::new(ResourceVector::zeros(0)).unwrap_err();
        assert!(matches!(
            err,
            AllocatorError::Precondition(PreconditionViolation::EmptyResourceSpace)
        ));
    }

    #[test]
    fn test_register_initialises_rows() {
        let mut s = state();
        let id = s.register(v([6, 4, 3])).unwrap();
        let rec = s.record(id).unwrap();
        assert_eq!(rec.maximum, v([6, 4, 3]));
        assert_eq!(rec.need, v([6, 4, 3]));
        assert!(rec.allocation.is_zero());
        assert_eq!(s.available(), &v([10, 5, 7]));
    }

    #[test]
    fn test_register_ids_are_unique() {
        let mut s = state();
        let a = s.register(v([1, 1, 1])).unwrap();
        s.deregister(a).unwrap();
        let b = s.register(v([1, 1, 1])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_register_dimension_mismatch() {
        let mut s = state();
        let err = s.register(v([1, 1])).unwrap_err();
        assert!(matches!(
            err,
            AllocatorError::Precondition(PreconditionViolation::DimensionMismatch {
                expected: 3,
                found: 2,
                ..
            })
        ));
        assert_eq!(s.client_count(), 0);
    }

    #[test]
    fn test_request_grant_updates_all_rows() {
        let mut s = state();
        let id = s.register(v([6, 4, 3])).unwrap();
        assert_eq!(s.request(id, &v([0, 1, 0])).unwrap(), RequestOutcome::Granted);

        let rec = s.record(id).unwrap();
        assert_eq!(rec.allocation, v([0, 1, 0]));
        assert_eq!(rec.need, v([6, 3, 3]));
        assert_eq!(s.available(), &v([10, 4, 7]));
    }

    #[test]
    fn test_request_exceeding_need_is_fatal() {
        let mut s = state();
        let id = s.register(v([1, 1, 1])).unwrap();
        let err = s.request(id, &v([2, 0, 0])).unwrap_err();
        assert!(matches!(err, AllocatorError::ExceedsDeclaredMaximum { client, .. } if client == id));
        assert_eq!(s.available(), &v([10, 5, 7]));
    }

    #[test]
    fn test_request_unavailable_denied() {
        let mut s = state();
        let a = s.register(v([10, 0, 0])).unwrap();
        let b = s.register(v([10, 0, 0])).unwrap();
        assert!(s.request(a, &v([10, 0, 0])).unwrap().is_granted());
        assert_eq!(
            s.request(b, &v([1, 0, 0])).unwrap(),
            RequestOutcome::Denied(DenialReason::Unavailable)
        );
    }

    #[test]
    fn test_request_unsafe_denied_without_mutation() {
        let mut s = AllocatorState::new(v([2])).unwrap();
        let a = s.register(v([2])).unwrap();
        let b = s.register(v([2])).unwrap();
        assert!(s.request(a, &v([1])).unwrap().is_granted());

        let before = s.snapshot();
        // Handing b one unit leaves nothing for either to finish.
        assert_eq!(
            s.request(b, &v([1])).unwrap(),
            RequestOutcome::Denied(DenialReason::Unsafe)
        );
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn test_zero_request_granted() {
        let mut s = state();
        let id = s.register(v([1, 1, 1])).unwrap();
        assert!(s.request(id, &v([0, 0, 0])).unwrap().is_granted());
        assert!(s.record(id).unwrap().allocation.is_zero());
    }

    #[test]
    fn test_unknown_client() {
        let mut s = state();
        let err = s.request(ClientId(42), &v([0, 0, 0])).unwrap_err();
        assert!(matches!(
            err,
            AllocatorError::Precondition(PreconditionViolation::UnknownClient { .. })
        ));
    }

    #[test]
    fn test_release_restores_available() {
        let mut s = state();
        let id = s.register(v([6, 4, 3])).unwrap();
        s.request(id, &v([0, 1, 0])).unwrap();
        s.release(id, &v([0, 1, 0])).unwrap();
        assert_eq!(s.available(), &v([10, 5, 7]));
        assert_eq!(s.record(id).unwrap().need, v([6, 4, 3]));
    }

    #[test]
    fn test_release_more_than_held_rejected() {
        let mut s = state();
        let id = s.register(v([6, 4, 3])).unwrap();
        s.request(id, &v([1, 0, 0])).unwrap();
        let before = s.snapshot();
        let err = s.release(id, &v([2, 0, 0])).unwrap_err();
        assert!(matches!(
            err,
            AllocatorError::Precondition(PreconditionViolation::ReleaseExceedsAllocation { .. })
        ));
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn test_deregister_while_holding_rejected() {
        let mut s = state();
        let id = s.register(v([6, 4, 3])).unwrap();
        s.request(id, &v([1, 0, 0])).unwrap();
        assert!(matches!(
            s.deregister(id),
            Err(AllocatorError::Precondition(PreconditionViolation::DeregisterWhileHolding { .. }))
        ));
        assert_eq!(s.client_count(), 1);
    }

    #[test]
    fn test_reclaim_returns_units() {
        let mut s = state();
        let id = s.register(v([6, 4, 3])).unwrap();
        s.request(id, &v([2, 1, 0])).unwrap();
        assert_eq!(s.reclaim(id).unwrap(), v([2, 1, 0]));
        assert_eq!(s.available(), &v([10, 5, 7]));
        assert_eq!(s.client_count(), 0);
    }

    #[test]
    fn test_snapshot_invariants() {
        let mut s = state();
        let a = s.register(v([6, 4, 3])).unwrap();
        let b = s.register(v([3, 2, 2])).unwrap();
        s.request(a, &v([0, 1, 0])).unwrap();
        s.request(b, &v([2, 0, 0])).unwrap();

        let snap = s.snapshot();
        assert!(snap.conserves_units());
        assert!(snap.within_maxima());
        assert!(snap.verdict().is_safe());
        assert_eq!(snap.clients.len(), 2);
        assert_eq!(snap.clients[0].id, a);
    }

    #[test]
    fn test_client_id_display() {
        assert_eq!(ClientId(7).to_string(), "client#7");
    }
}
