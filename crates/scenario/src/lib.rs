// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # scenario
//!
//! Data-driven workloads for the [`allocator`] crate.
//!
//! - A [`ScenarioConfig`] describes a pool, a backoff policy and, per
//!   client, a declared maximum plus an ordered list of acquire / release /
//!   sleep steps. [`ScenarioRunner`] runs every client on its own thread
//!   against one shared allocator and returns a [`RunReport`].
//! - A [`SnapshotConfig`] is a static allocation table. [`evaluate_snapshot`]
//!   derives `available` and `need`, runs the safety check and optionally
//!   decides a hypothetical request.
//!
//! # Example
//! ```
//! use scenario::{ScenarioConfig, ScenarioRunner};
//!
//! let config = ScenarioConfig::from_toml(r#"
//! total = [2]
//! [backoff]
//! interval_ms = 1
//! [[client]]
//! name = "a"
//! max = [2]
//! steps = [{ op = "acquire", amount = [2] }]
//! "#).unwrap();
//!
//! let report = ScenarioRunner::new(config).unwrap().run().unwrap();
//! assert!(report.all_completed());
//! assert!(report.pool_restored());
//! ```

mod config;
mod error;
mod report;
mod runner;
mod snapshot;

pub use config::{BackoffConfig, ClientSpec, RequestProbe, ScenarioConfig, SnapshotClient, SnapshotConfig, Step};
pub use error::ScenarioError;
pub use report::{ClientOutcome, ClientReport, RunReport};
pub use runner::ScenarioRunner;
pub use snapshot::{evaluate_snapshot, ProbeOutcome, ProbeReport, SnapshotReport};
