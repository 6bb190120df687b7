// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for resource vector parsing.

/// Errors that can occur when building a [`crate::ResourceVector`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VectorError {
    /// The input contained no components at all.
    #[error("empty resource vector: expected comma-separated unit counts like '10,5,7'")]
    Empty,

    /// One of the components is not a non-negative integer.
    #[error("invalid component #{index} '{component}': expected a non-negative integer")]
    InvalidComponent { index: usize, component: String },
}
