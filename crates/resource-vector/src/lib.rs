// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # resource-vector
//!
//! Fixed-width vectors of unit counts, one slot per resource class.
//!
//! A [`ResourceVector`] is the currency of the allocator: it describes what
//! a client holds, what it asks for, what it may still ask for, and what
//! the pool has left. The operations are deliberately few:
//!
//! - [`ResourceVector::fits_within`] — component-wise `≤`.
//! - `+=` / `-=` (and `+` / `-` on references) — component-wise arithmetic.
//! - [`ResourceVector::checked_add`] — addition for sums of untrusted input.
//!
//! Subtraction assumes the caller has already established
//! `rhs.fits_within(self)`. Addition assumes the sum fits; the allocator
//! keeps every sum bounded by the pool, other callers use `checked_add`.
//!
//! # Example
//! ```
//! use resource_vector::ResourceVector;
//!
//! let available = ResourceVector::parse("10,5,7").unwrap();
//! let request = ResourceVector::from([0, 1, 0]);
//!
//! assert!(request.fits_within(&available));
//! let left = &available - &request;
//! assert_eq!(left, ResourceVector::from([10, 4, 7]));
//! ```

mod error;
mod vector;

pub use error::VectorError;
pub use vector::{ResourceVector, Units};
