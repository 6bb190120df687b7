// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-client handle returned by [`Allocator::register`].
//!
//! A [`Client`] owns its registration. Finishing the client, explicitly
//! through [`Client::finish`] or implicitly on drop, returns whatever it
//! still holds to the pool and removes its rows from the state table.

use crate::{
    AcquireError, Allocator, AllocatorError, BackoffPolicy, ClientId, PreconditionViolation,
    RequestOutcome, ResourceGuard,
};
use resource_vector::ResourceVector;
use tokio_util::sync::CancellationToken;

/// A registered client of an [`Allocator`].
///
/// # Example
/// ```
/// use allocator::{Allocator, BackoffPolicy};
/// use resource_vector::ResourceVector;
///
/// let pool = Allocator::new(ResourceVector::from([4, 4])).unwrap();
/// let client = pool.register(ResourceVector::from([2, 3])).unwrap();
///
/// {
///     let _held = client
///         .acquire(ResourceVector::from([1, 2]), &BackoffPolicy::immediate())
///         .unwrap();
///     assert_eq!(pool.available(), ResourceVector::from([3, 2]));
/// } // guard dropped, units returned
///
/// assert_eq!(pool.available(), ResourceVector::from([4, 4]));
/// client.finish().unwrap();
/// assert_eq!(pool.client_count(), 0);
/// ```
pub struct Client {
    allocator: Allocator,
    id: ClientId,
    /// Set once the registration has been handed back by [`Client::finish`].
    finished: bool,
}

impl Client {
    pub(crate) fn new(allocator: Allocator, id: ClientId) -> Self {
        Self {
            allocator,
            id,
            finished: false,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// The allocator this client is registered with.
    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// Single non-blocking request. See [`Allocator::request`].
    pub fn request(&self, req: &ResourceVector) -> Result<RequestOutcome, AllocatorError> {
        self.allocator.request(self.id, req)
    }

    /// See [`Allocator::release`].
    pub fn release(&self, amount: &ResourceVector) -> Result<(), AllocatorError> {
        self.allocator.release(self.id, amount)
    }

    pub fn allocation(&self) -> Result<ResourceVector, AllocatorError> {
        self.allocator.allocation(self.id)
    }

    pub fn need(&self) -> Result<ResourceVector, AllocatorError> {
        self.allocator.need(self.id)
    }

    pub fn maximum(&self) -> Result<ResourceVector, AllocatorError> {
        self.allocator.maximum(self.id)
    }

    /// Requests `amount`, blocking the calling thread between denials.
    ///
    /// Returns a guard that releases `amount` when dropped.
    pub fn acquire(
        &self,
        amount: ResourceVector,
        policy: &BackoffPolicy,
    ) -> Result<ResourceGuard<'_>, AcquireError> {
        ResourceGuard::acquire(self, amount, policy)
    }

    /// Async counterpart of [`Client::acquire`]; waits on the tokio timer.
    pub async fn acquire_async(
        &self,
        amount: ResourceVector,
        policy: &BackoffPolicy,
        cancel: Option<&CancellationToken>,
    ) -> Result<ResourceGuard<'_>, AcquireError> {
        ResourceGuard::acquire_async(self, amount, policy, cancel).await
    }

    /// Releases everything still held and deregisters.
    ///
    /// Returns the units that had to be reclaimed.
    pub fn finish(mut self) -> Result<ResourceVector, AllocatorError> {
        self.finished = true;
        self.allocator.reclaim(self.id)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.allocator.reclaim(self.id) {
            Ok(held) if !held.is_zero() => {
                tracing::warn!(client = %self.id, reclaimed = %held, "client dropped while holding units");
            }
            Ok(_) => {}
            // Already deregistered through the allocator.
            Err(AllocatorError::Precondition(PreconditionViolation::UnknownClient { .. })) => {}
            Err(e) => {
                tracing::error!(client = %self.id, error = %e, "failed to reclaim client");
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("finished", &self.finished)
            .finish()
    }
}
