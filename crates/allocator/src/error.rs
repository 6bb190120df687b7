// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the allocator.
//!
//! Transient refusals are *not* errors: they come back as
//! [`crate::RequestOutcome::Denied`]. Everything in this module is fatal
//! for the calling client's current flow and must not be retried as-is.

use crate::{ClientId, DenialReason};
use resource_vector::ResourceVector;

/// Fatal allocator errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocatorError {
    /// The request is larger than what the client may still ask for under
    /// its own declared maximum. It can never succeed.
    #[error("{client} requested {requested}, exceeding its remaining declared need {need} (available: {available})")]
    ExceedsDeclaredMaximum {
        client: ClientId,
        requested: ResourceVector,
        need: ResourceVector,
        available: ResourceVector,
    },

    /// The API was misused.
    #[error("precondition violated: {0}")]
    Precondition(#[from] PreconditionViolation),
}

/// Misuse of the allocator API. These indicate a bug in the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionViolation {
    /// The pool was configured with zero resource classes.
    #[error("the resource pool must have at least one resource class")]
    EmptyResourceSpace,

    /// The id does not belong to a registered client.
    #[error("{client} is not registered")]
    UnknownClient { client: ClientId },

    /// A vector's width differs from the configured class count.
    #[error("vector {vector} has {found} resource classes, expected {expected}")]
    DimensionMismatch {
        expected: usize,
        found: usize,
        vector: ResourceVector,
    },

    /// A release larger than the client's current holding.
    #[error("{client} tried to release {amount} but holds only {allocation} (available: {available})")]
    ReleaseExceedsAllocation {
        client: ClientId,
        amount: ResourceVector,
        allocation: ResourceVector,
        available: ResourceVector,
    },

    /// Deregistration while the client still holds units.
    #[error("{client} cannot deregister while holding {allocation}")]
    DeregisterWhileHolding {
        client: ClientId,
        allocation: ResourceVector,
    },
}

/// Errors from [`crate::ResourceGuard`] acquisition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    /// A fatal allocator error, surfaced without retrying.
    #[error(transparent)]
    Allocator(#[from] AllocatorError),

    /// The caller's cancellation token fired before the grant.
    #[error("acquisition of {amount} cancelled after {attempts} attempt(s)")]
    Cancelled {
        amount: ResourceVector,
        attempts: u32,
    },

    /// The backoff policy's attempt limit was reached.
    #[error("gave up acquiring {amount} after {attempts} attempt(s): {last_denial}")]
    AttemptsExhausted {
        amount: ResourceVector,
        attempts: u32,
        last_denial: DenialReason,
    },
}

impl AcquireError {
    /// Denied requests made before giving up. Zero for fatal errors.
    pub fn denied_attempts(&self) -> u32 {
        match self {
            Self::Allocator(_) => 0,
            Self::Cancelled { attempts, .. } | Self::AttemptsExhausted { attempts, .. } => *attempts,
        }
    }
}
