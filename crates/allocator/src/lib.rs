// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # allocator
//!
//! A deadlock-avoiding resource allocator built on the Banker's algorithm.
//! Concurrent clients declare up front the most they will ever hold of each
//! resource class; a request is granted only if the resulting state still
//! admits an order in which every client can run to completion.
//!
//! # Key Components
//!
//! - [`Allocator`] — the shared pool: one state table behind one lock.
//! - [`Client`] — a registration handle. Finishing or dropping it returns
//!   whatever it still holds and removes it from the table.
//! - [`ResourceGuard`] — an RAII grant obtained by retrying a request under
//!   a [`BackoffPolicy`]; dropping it releases the granted units.
//! - [`SafetyChecker`] — the stand-alone safety check, usable on any
//!   allocation table.
//! - [`AllocatorStats`] and [`EventSink`] — counters and a per-transition
//!   hook for diagnostics.
//!
//! # Ownership Model
//!
//! ```text
//! Allocator::register(maximum)
//!       │
//!       ▼
//!    Client  ◄─── holds Arc<AllocatorInner>
//!       │
//!       │  acquire(amount, policy)
//!       ▼
//!  ResourceGuard<'_>  ◄─── borrows the Client
//!       │
//!       │  drop()
//!       ▼
//!  Allocator::release()  ──► available
//! ```
//!
//! A guard borrows its client, so a client cannot be finished while a grant
//! obtained through it is still outstanding.
//!
//! # Outcomes
//!
//! `request` separates transient refusals from fatal errors:
//!
//! - `Ok(Granted)`: committed.
//! - `Ok(Denied(Unavailable | Unsafe))`: nothing changed, retry later.
//! - `Err(ExceedsDeclaredMaximum)`: the client broke its declaration.
//! - `Err(Precondition(..))`: a misuse such as an unknown client or a
//!   vector with the wrong number of classes.
//!
//! # Example
//! ```
//! use allocator::{Allocator, DenialReason, RequestOutcome};
//! use resource_vector::ResourceVector;
//!
//! let pool = Allocator::new(ResourceVector::from([1])).unwrap();
//! let a = pool.register(ResourceVector::from([1])).unwrap();
//! let b = pool.register(ResourceVector::from([1])).unwrap();
//!
//! assert!(a.request(&ResourceVector::from([1])).unwrap().is_granted());
//! assert_eq!(
//!     b.request(&ResourceVector::from([1])).unwrap(),
//!     RequestOutcome::Denied(DenialReason::Unavailable),
//! );
//! ```

mod allocator;
mod backoff;
mod client;
mod error;
pub mod events;
mod guard;
pub mod safety;
mod state;
mod stats;

pub use allocator::Allocator;
pub use backoff::{BackoffPolicy, Sleeper, ThreadSleeper};
pub use client::Client;
pub use error::{AcquireError, AllocatorError, PreconditionViolation};
pub use events::{AllocatorEvent, EventKind, EventSink, MemorySink, TracingSink};
pub use guard::ResourceGuard;
pub use safety::{SafetyChecker, SafetyVerdict};
pub use state::{
    AllocatorSnapshot, ClientId, ClientRecord, ClientSnapshot, DenialReason, RequestOutcome,
};
pub use stats::AllocatorStats;
