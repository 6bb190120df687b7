// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The shared allocator: one state table behind one lock.
//!
//! [`Allocator`] is the central coordinator. It:
//!
//! 1. Owns the only [`AllocatorState`] in the process (per pool) behind a
//!    single `Mutex`, so `available`, `maximum`, `allocation` and `need`
//!    form one consistency domain.
//! 2. Runs every operation with the lock held for its whole duration and
//!    never sleeps while holding it.
//! 3. Tracks [`AllocatorStats`] under the same lock.
//! 4. Reports each transition to its [`EventSink`] once the lock is gone.
//!
//! # Thread Safety
//! `Allocator` is a cheap `Arc` handle: clone it into every thread or task
//! that needs to register clients.

use crate::events::{AllocatorEvent, EventKind, EventSink, TracingSink};
use crate::state::{AllocatorState, ClientRecord};
use crate::{
    AllocatorError, AllocatorSnapshot, AllocatorStats, Client, ClientId, RequestOutcome,
    SafetyVerdict,
};
use resource_vector::ResourceVector;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Everything guarded by the allocator lock.
#[derive(Debug)]
struct Shared {
    state: AllocatorState,
    stats: AllocatorStats,
}

/// Inner allocator state, shared by every [`Allocator`] clone and every
/// [`Client`] handle.
struct AllocatorInner {
    shared: Mutex<Shared>,
    /// Copy of the configured totals, readable without the lock.
    total: ResourceVector,
    sink: Arc<dyn EventSink>,
}

/// Deadlock-avoiding allocator for a fixed set of resource classes.
///
/// # Example
/// ```
/// use allocator::{Allocator, RequestOutcome};
/// use resource_vector::ResourceVector;
///
/// let pool = Allocator::new(ResourceVector::from([10, 5, 7])).unwrap();
/// let client = pool.register(ResourceVector::from([6, 4, 3])).unwrap();
///
/// let outcome = client.request(&ResourceVector::from([0, 1, 0])).unwrap();
/// assert_eq!(outcome, RequestOutcome::Granted);
/// assert_eq!(pool.available(), ResourceVector::from([10, 4, 7]));
///
/// client.release(&ResourceVector::from([0, 1, 0])).unwrap();
/// assert_eq!(pool.available(), ResourceVector::from([10, 5, 7]));
/// ```
#[derive(Clone)]
pub struct Allocator {
    inner: Arc<AllocatorInner>,
}

impl Allocator {
    /// Creates an allocator whose pool initially holds `total` units.
    ///
    /// This is the one-time setup of the pool: the class count and the
    /// totals cannot change afterwards. Events are logged through
    /// [`TracingSink`].
    pub fn new(total: ResourceVector) -> Result<Self, AllocatorError> {
        Self::with_sink(total, Arc::new(TracingSink))
    }

    /// Like [`Allocator::new`], reporting transitions to `sink`.
    pub fn with_sink(total: ResourceVector, sink: Arc<dyn EventSink>) -> Result<Self, AllocatorError> {
        let state = AllocatorState::new(total)?;
        Ok(Self {
            inner: Arc::new(AllocatorInner {
                total: state.total().clone(),
                shared: Mutex::new(Shared {
                    state,
                    stats: AllocatorStats::default(),
                }),
                sink,
            }),
        })
    }

    /// State is only ever replaced by complete commits, so a panic in
    /// another holder cannot have left it half-written.
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.inner.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, client: ClientId, kind: EventKind, amount: ResourceVector, available: ResourceVector) {
        self.inner.sink.record(&AllocatorEvent {
            client,
            kind,
            amount,
            available,
        });
    }

    /// Registers a client that will never hold more than `maximum`.
    ///
    /// No feasibility check is made against the pool. A client whose
    /// maximum exceeds the pool can never be driven to completion, so
    /// while it is registered every non-empty request is denied as unsafe.
    pub fn register(&self, maximum: ResourceVector) -> Result<Client, AllocatorError> {
        let (id, available) = {
            let mut guard = self.lock();
            let shared = &mut *guard;
            let id = shared.state.register(maximum.clone())?;
            shared.stats.record_registration(shared.state.client_count());
            (id, shared.state.available().clone())
        };

        if !maximum.fits_within(&self.inner.total) {
            tracing::warn!(
                client = %id,
                %maximum,
                total = %self.inner.total,
                "declared maximum exceeds the pool; requests will be denied while this client is registered"
            );
        }
        self.emit(id, EventKind::Registered, maximum, available);
        Ok(Client::new(self.clone(), id))
    }

    /// Evaluates a request for `req` more units on behalf of `id`.
    ///
    /// - `Err(ExceedsDeclaredMaximum)` if `req` exceeds the client's need.
    /// - `Ok(Denied(Unavailable))` if the pool is short right now.
    /// - `Ok(Denied(Unsafe))` if granting would leave no safe completion order.
    /// - `Ok(Granted)` once the new state has been committed.
    ///
    /// A denial or error leaves the state exactly as it was.
    pub fn request(&self, id: ClientId, req: &ResourceVector) -> Result<RequestOutcome, AllocatorError> {
        let (result, available) = {
            let mut guard = self.lock();
            let shared = &mut *guard;
            let result = shared.state.request(id, req);
            match &result {
                Ok(outcome) => shared.stats.record_outcome(*outcome),
                Err(AllocatorError::ExceedsDeclaredMaximum { .. }) => shared.stats.record_exceeded(),
                Err(AllocatorError::Precondition(_)) => {}
            }
            (result, shared.state.available().clone())
        };

        let outcome = result?;
        let kind = match outcome {
            RequestOutcome::Granted => EventKind::Granted,
            RequestOutcome::Denied(reason) => EventKind::Denied(reason),
        };
        self.emit(id, kind, req.clone(), available);
        Ok(outcome)
    }

    /// Returns `amount` units held by `id` to the pool.
    ///
    /// Releasing more than the client holds is a precondition violation.
    pub fn release(&self, id: ClientId, amount: &ResourceVector) -> Result<(), AllocatorError> {
        let available = {
            let mut guard = self.lock();
            let shared = &mut *guard;
            shared.state.release(id, amount)?;
            shared.stats.record_release();
            shared.state.available().clone()
        };
        self.emit(id, EventKind::Released, amount.clone(), available);
        Ok(())
    }

    /// Removes `id`, which must hold nothing.
    ///
    /// Use [`Client::finish`] to release and deregister in one step.
    pub fn deregister(&self, id: ClientId) -> Result<(), AllocatorError> {
        let available = {
            let mut guard = self.lock();
            let shared = &mut *guard;
            shared.state.deregister(id)?;
            shared.stats.record_deregistration();
            shared.state.available().clone()
        };
        self.emit(id, EventKind::Deregistered, ResourceVector::zeros(self.classes()), available);
        Ok(())
    }

    /// Releases everything `id` still holds and deregisters it, atomically.
    pub(crate) fn reclaim(&self, id: ClientId) -> Result<ResourceVector, AllocatorError> {
        let (held, available) = {
            let mut guard = self.lock();
            let shared = &mut *guard;
            let held = shared.state.reclaim(id)?;
            if !held.is_zero() {
                shared.stats.record_release();
                shared.stats.record_reclamation();
            }
            shared.stats.record_deregistration();
            (held, shared.state.available().clone())
        };

        if !held.is_zero() {
            self.emit(id, EventKind::Released, held.clone(), available.clone());
        }
        self.emit(id, EventKind::Deregistered, ResourceVector::zeros(self.classes()), available);
        Ok(held)
    }

    /// Configured pool size per class.
    pub fn total(&self) -> ResourceVector {
        self.inner.total.clone()
    }

    /// Number of resource classes.
    pub fn classes(&self) -> usize {
        self.inner.total.classes()
    }

    /// Units currently held by nobody.
    pub fn available(&self) -> ResourceVector {
        self.lock().state.available().clone()
    }

    /// Number of registered clients.
    pub fn client_count(&self) -> usize {
        self.lock().state.client_count()
    }

    /// Copy of a client's rows.
    pub fn record(&self, id: ClientId) -> Result<ClientRecord, AllocatorError> {
        self.lock().state.record(id).cloned()
    }

    /// Units currently held by `id`.
    pub fn allocation(&self, id: ClientId) -> Result<ResourceVector, AllocatorError> {
        Ok(self.record(id)?.allocation)
    }

    /// Units `id` may still request.
    pub fn need(&self, id: ClientId) -> Result<ResourceVector, AllocatorError> {
        Ok(self.record(id)?.need)
    }

    /// The maximum `id` declared at registration.
    pub fn maximum(&self, id: ClientId) -> Result<ResourceVector, AllocatorError> {
        Ok(self.record(id)?.maximum)
    }

    /// A consistent copy of the whole state.
    pub fn snapshot(&self) -> AllocatorSnapshot {
        self.lock().state.snapshot()
    }

    /// Runs the safety check on the committed state.
    pub fn verdict(&self) -> SafetyVerdict<ClientId> {
        self.lock().state.verdict()
    }

    /// Returns `true` if the committed state is safe.
    pub fn is_safe(&self) -> bool {
        self.verdict().is_safe()
    }

    /// Returns a copy of the statistics.
    pub fn stats(&self) -> AllocatorStats {
        self.lock().stats.clone()
    }
}

impl std::fmt::Debug for Allocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.lock();
        f.debug_struct("Allocator")
            .field("total", &self.inner.total)
            .field("available", shared.state.available())
            .field("clients", &shared.state.client_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::{DenialReason, PreconditionViolation};

    fn v<const N: usize>(units: [u32; N]) -> ResourceVector {
        ResourceVector::from(units)
    }

    #[test]
    fn test_new_sets_available() {
        let pool = Allocator::new(v([10, 5, 7])).unwrap();
        assert_eq!(pool.available(), v([10, 5, 7]));
        assert_eq!(pool.total(), v([10, 5, 7]));
        assert_eq!(pool.classes(), 3);
        assert_eq!(pool.client_count(), 0);
    }

    #[test]
    fn test_new_rejects_empty_space() {
        assert!(matches!(
            Allocator::new(ResourceVector::zeros(0)),
            Err(AllocatorError::Precondition(PreconditionViolation::EmptyResourceSpace))
        ));
    }

    #[test]
    fn test_scenario_d_release_restores_available() {
        let pool = Allocator::new(v([10, 5, 7])).unwrap();
        let c = pool.register(v([6, 4, 3])).unwrap();
        let before = pool.available();
        assert!(pool.request(c.id(), &v([0, 1, 0])).unwrap().is_granted());
        pool.release(c.id(), &v([0, 1, 0])).unwrap();
        assert_eq!(pool.available(), before);
    }

    #[test]
    fn test_scenario_b_exceeds_maximum() {
        let pool = Allocator::new(v([10, 5, 7])).unwrap();
        let c = pool.register(v([3, 2, 2])).unwrap();
        let err = pool.request(c.id(), &v([4, 0, 0])).unwrap_err();
        assert!(matches!(err, AllocatorError::ExceedsDeclaredMaximum { .. }));
        assert_eq!(pool.available(), v([10, 5, 7]));
        assert_eq!(pool.stats().exceeded_maximum, 1);
    }

    #[test]
    fn test_events_emitted_in_order() {
        let sink = Arc::new(MemorySink::new());
        let pool = Allocator::with_sink(v([2, 2]), sink.clone()).unwrap();
        let c = pool.register(v([2, 2])).unwrap();
        c.request(&v([1, 1])).unwrap();
        c.request(&v([2, 0])).unwrap_err();
        c.release(&v([1, 1])).unwrap();
        c.finish().unwrap();

        let kinds: Vec<_> = sink.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Registered,
                EventKind::Granted,
                EventKind::Released,
                EventKind::Deregistered,
            ]
        );
        let granted = &sink.events()[1];
        assert_eq!(granted.amount, v([1, 1]));
        assert_eq!(granted.available, v([1, 1]));
    }

    #[test]
    fn test_denied_event_carries_reason() {
        let sink = Arc::new(MemorySink::new());
        let pool = Allocator::with_sink(v([1]), sink.clone()).unwrap();
        let a = pool.register(v([1])).unwrap();
        let b = pool.register(v([1])).unwrap();
        a.request(&v([1])).unwrap();
        assert_eq!(
            b.request(&v([1])).unwrap(),
            RequestOutcome::Denied(DenialReason::Unavailable)
        );
        let last = sink.events().last().cloned().unwrap();
        assert_eq!(last.kind, EventKind::Denied(DenialReason::Unavailable));
        assert_eq!(last.client, b.id());
    }

    #[test]
    fn test_deregister_requires_zero_allocation() {
        let pool = Allocator::new(v([4])).unwrap();
        let c = pool.register(v([2])).unwrap();
        c.request(&v([1])).unwrap();
        assert!(matches!(
            pool.deregister(c.id()),
            Err(AllocatorError::Precondition(PreconditionViolation::DeregisterWhileHolding { .. }))
        ));
        c.release(&v([1])).unwrap();
        pool.deregister(c.id()).unwrap();
        assert_eq!(pool.client_count(), 0);
        // Dropping the handle of an already-deregistered client is a no-op.
        drop(c);
        assert_eq!(pool.available(), v([4]));
    }

    #[test]
    fn test_oversized_maximum_blocks_everyone() {
        let pool = Allocator::new(v([3])).unwrap();
        let normal = pool.register(v([1])).unwrap();
        let greedy = pool.register(v([5])).unwrap();
        assert!(!pool.is_safe());
        assert_eq!(
            normal.request(&v([1])).unwrap(),
            RequestOutcome::Denied(DenialReason::Unsafe)
        );
        drop(greedy);
        assert!(normal.request(&v([1])).unwrap().is_granted());
    }

    #[test]
    fn test_stats_track_activity() {
        let pool = Allocator::new(v([2])).unwrap();
        let a = pool.register(v([2])).unwrap();
        let b = pool.register(v([2])).unwrap();
        a.request(&v([1])).unwrap();
        b.request(&v([1])).unwrap(); // unsafe
        a.release(&v([1])).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.registrations, 2);
        assert_eq!(stats.peak_clients, 2);
        assert_eq!(stats.grants, 1);
        assert_eq!(stats.denied_unsafe, 1);
        assert_eq!(stats.releases, 1);
    }

    #[test]
    fn test_debug_format() {
        let pool = Allocator::new(v([10, 5, 7])).unwrap();
        let debug = format!("{pool:?}");
        assert!(debug.contains("Allocator"));
        assert!(debug.contains("available"));
    }
}
