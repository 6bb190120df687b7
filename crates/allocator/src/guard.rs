// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! RAII guard that returns granted units to the pool on drop.
//!
//! [`ResourceGuard`] is produced by retrying a request under a
//! [`BackoffPolicy`] until it is granted. Dropping the guard releases
//! exactly the amount it was granted, so a client cannot forget to give
//! units back on an early return or a panic.

use crate::{
    AcquireError, AllocatorError, BackoffPolicy, Client, ClientId, RequestOutcome, Sleeper,
    ThreadSleeper,
};
use resource_vector::ResourceVector;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Units held by a [`Client`] until this guard is dropped.
#[must_use = "dropping the guard releases the units immediately"]
pub struct ResourceGuard<'a> {
    client: &'a Client,
    amount: ResourceVector,
    /// Requests made before the grant, including the granted one.
    attempts: u32,
    /// Set once the units have gone back through [`ResourceGuard::release`].
    released: bool,
}

impl<'a> ResourceGuard<'a> {
    /// Retries `amount` on the calling thread until granted.
    pub fn acquire(
        client: &'a Client,
        amount: ResourceVector,
        policy: &BackoffPolicy,
    ) -> Result<Self, AcquireError> {
        Self::acquire_with(client, amount, policy, &ThreadSleeper, None)
    }

    /// Like [`ResourceGuard::acquire`] with an explicit sleeper and an
    /// optional cancellation token.
    ///
    /// The token is checked before every attempt, so a cancellation raised
    /// during a delay is seen once the sleeper returns.
    pub fn acquire_with(
        client: &'a Client,
        amount: ResourceVector,
        policy: &BackoffPolicy,
        sleeper: &dyn Sleeper,
        cancel: Option<&CancellationToken>,
    ) -> Result<Self, AcquireError> {
        let mut attempts = 0;
        loop {
            match attempt(client, &amount, policy, cancel, &mut attempts)? {
                Some(delay) => sleeper.sleep(delay),
                None => return Ok(Self::granted(client, amount, attempts)),
            }
        }
    }

    /// Retries `amount` on the tokio timer until granted.
    ///
    /// Cancelling the token interrupts a pending delay. The allocator lock
    /// is never held across an `.await`.
    pub async fn acquire_async(
        client: &'a Client,
        amount: ResourceVector,
        policy: &BackoffPolicy,
        cancel: Option<&CancellationToken>,
    ) -> Result<Self, AcquireError> {
        let mut attempts = 0;
        loop {
            let delay = match attempt(client, &amount, policy, cancel, &mut attempts)? {
                Some(delay) => delay,
                None => return Ok(Self::granted(client, amount, attempts)),
            };
            match cancel {
                Some(token) => tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = token.cancelled() => {}
                },
                None => tokio::time::sleep(delay).await,
            }
        }
    }

    fn granted(client: &'a Client, amount: ResourceVector, attempts: u32) -> Self {
        Self {
            client,
            amount,
            attempts,
            released: false,
        }
    }

    /// The amount this guard holds.
    pub fn amount(&self) -> &ResourceVector {
        &self.amount
    }

    /// Requests it took to obtain the grant.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn client_id(&self) -> ClientId {
        self.client.id()
    }

    /// Releases the units now, reporting any failure instead of logging it.
    pub fn release(mut self) -> Result<(), AllocatorError> {
        self.released = true;
        self.client.release(&self.amount)
    }
}

/// One request. `Ok(None)` means granted, `Ok(Some(delay))` means retry
/// after `delay`.
fn attempt(
    client: &Client,
    amount: &ResourceVector,
    policy: &BackoffPolicy,
    cancel: Option<&CancellationToken>,
    attempts: &mut u32,
) -> Result<Option<Duration>, AcquireError> {
    if cancel.is_some_and(CancellationToken::is_cancelled) {
        tracing::debug!(client = %client.id(), %amount, attempts = *attempts, "acquisition cancelled");
        return Err(AcquireError::Cancelled {
            amount: amount.clone(),
            attempts: *attempts,
        });
    }

    *attempts += 1;
    match client.request(amount)? {
        RequestOutcome::Granted => Ok(None),
        RequestOutcome::Denied(reason) => {
            if policy.exhausted(*attempts) {
                tracing::warn!(
                    client = %client.id(),
                    %amount,
                    attempts = *attempts,
                    %reason,
                    "giving up on acquisition"
                );
                return Err(AcquireError::AttemptsExhausted {
                    amount: amount.clone(),
                    attempts: *attempts,
                    last_denial: reason,
                });
            }
            let delay = policy.delay_for(*attempts - 1);
            tracing::trace!(client = %client.id(), attempt = *attempts, ?delay, %reason, "backing off");
            Ok(Some(delay))
        }
    }
}

impl Drop for ResourceGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.client.release(&self.amount) {
            tracing::error!(
                client = %self.client.id(),
                amount = %self.amount,
                error = %e,
                "failed to release guarded units"
            );
        }
    }
}

impl std::fmt::Debug for ResourceGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("client", &self.client.id())
            .field("amount", &self.amount)
            .field("attempts", &self.attempts)
            .finish()
    }
}
