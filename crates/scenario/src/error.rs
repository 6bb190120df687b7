// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for scenario loading and execution.

/// Errors that can occur while loading or running a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// The file could not be read or parsed.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The file parsed but describes an impossible workload.
    #[error("invalid scenario: {0}")]
    Invalid(String),

    /// The allocator rejected the pool definition.
    #[error("allocator error: {0}")]
    Allocator(#[from] allocator::AllocatorError),

    /// A client thread could not be started.
    #[error("failed to spawn thread for client '{client}': {source}")]
    Spawn {
        client: String,
        #[source]
        source: std::io::Error,
    },
}
