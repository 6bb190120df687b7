// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Runs a scenario: one OS thread per client, one shared allocator.
//!
//! ```text
//! ScenarioRunner::run()
//!     │
//!     ├── Allocator::new(total)
//!     ├── watchdog thread (timeout_ms) ──► CancellationToken
//!     └── per client thread:
//!             register(max) → steps (acquire/release/sleep) → finish()
//! ```

use crate::{ClientOutcome, ClientReport, ClientSpec, RunReport, ScenarioConfig, ScenarioError, Step};
use allocator::{Allocator, BackoffPolicy, Client, MemorySink, ResourceGuard, ThreadSleeper};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Executes a validated [`ScenarioConfig`].
#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    config: ScenarioConfig,
}

impl ScenarioRunner {
    /// Validates `config` and wraps it for execution.
    pub fn new(config: ScenarioConfig) -> Result<Self, ScenarioError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Runs every client to completion (or failure) and reports.
    ///
    /// Client failures are recorded in the report, not returned as errors;
    /// `Err` means the run could not be set up at all.
    pub fn run(&self) -> Result<RunReport, ScenarioError> {
        let config = &self.config;
        let sink = config.record_events.then(|| Arc::new(MemorySink::new()));
        let allocator = match &sink {
            Some(sink) => Allocator::with_sink(config.total.clone(), sink.clone())?,
            None => Allocator::new(config.total.clone())?,
        };
        let policy = config.backoff.to_policy();
        let cancel = CancellationToken::new();

        tracing::info!(
            "running scenario '{}': {} clients over {}",
            config.name,
            config.clients.len(),
            config.total
        );
        let started = Instant::now();

        let clients = thread::scope(|s| -> Result<Vec<ClientReport>, ScenarioError> {
            let (done_tx, done_rx) = mpsc::channel::<()>();
            if let Some(timeout) = config.timeout() {
                let cancel = cancel.clone();
                s.spawn(move || watchdog(done_rx, timeout, cancel));
            }

            let mut handles = Vec::with_capacity(config.clients.len());
            for spec in &config.clients {
                let (allocator, policy, cancel) = (&allocator, &policy, &cancel);
                let handle = thread::Builder::new()
                    .name(spec.name.clone())
                    .spawn_scoped(s, move || run_client(allocator, spec, policy, cancel, started))
                    .map_err(|source| ScenarioError::Spawn {
                        client: spec.name.clone(),
                        source,
                    })?;
                handles.push((spec, handle));
            }

            let reports = handles
                .into_iter()
                .map(|(spec, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        tracing::error!("client '{}' panicked", spec.name);
                        let mut report = ClientReport::new(&spec.name, &spec.max);
                        report.outcome = ClientOutcome::Panicked;
                        report
                    })
                })
                .collect();
            drop(done_tx);
            Ok(reports)
        })?;

        let report = RunReport {
            scenario: config.name.clone(),
            total: config.total.clone(),
            final_available: allocator.available(),
            wall_time: started.elapsed(),
            clients,
            stats: allocator.stats(),
            events: sink.map(|s| s.events()),
        };
        tracing::info!("{}", report.summary());
        Ok(report)
    }
}

/// Cancels every pending acquisition unless all clients are done first.
fn watchdog(done: mpsc::Receiver<()>, timeout: Duration, cancel: CancellationToken) {
    if let Err(RecvTimeoutError::Timeout) = done.recv_timeout(timeout) {
        tracing::warn!("scenario timed out after {timeout:?}; cancelling pending acquisitions");
        cancel.cancel();
    }
}

fn run_client(
    allocator: &Allocator,
    spec: &ClientSpec,
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
    started: Instant,
) -> ClientReport {
    let mut report = ClientReport::new(&spec.name, &spec.max);
    let client = match allocator.register(spec.max.clone()) {
        Ok(client) => client,
        Err(e) => {
            report.outcome = ClientOutcome::Failed {
                step: 0,
                error: e.to_string(),
            };
            report.elapsed = started.elapsed();
            return report;
        }
    };
    report.client = Some(client.id());

    if spec.start_delay_ms > 0 {
        thread::sleep(Duration::from_millis(spec.start_delay_ms));
    }

    // On failure the client is dropped instead, which reclaims its units.
    let outcome = run_steps(&client, spec, policy, cancel, &mut report).and_then(|()| {
        client
            .finish()
            .map(drop)
            .map_err(|e| (spec.steps.len() + 1, e.to_string()))
    });
    if let Err((step, error)) = outcome {
        tracing::warn!("client '{}' failed at step {step}: {error}", spec.name);
        report.outcome = ClientOutcome::Failed { step, error };
    } else {
        tracing::debug!("client '{}' completed", spec.name);
    }
    report.elapsed = started.elapsed();
    report
}

/// Runs the steps; `Err((step, message))` on the first failure.
fn run_steps(
    client: &Client,
    spec: &ClientSpec,
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
    report: &mut ClientReport,
) -> Result<(), (usize, String)> {
    let mut held: Vec<ResourceGuard<'_>> = Vec::new();

    for (i, step) in spec.steps.iter().enumerate() {
        let n = i + 1;
        match step {
            Step::Acquire { amount, hold_ms } => {
                let waiting = Instant::now();
                let acquired = ResourceGuard::acquire_with(
                    client,
                    amount.clone(),
                    policy,
                    &ThreadSleeper,
                    Some(cancel),
                );
                report.waited += waiting.elapsed();
                let guard = acquired.map_err(|e| {
                    report.attempts += e.denied_attempts();
                    (n, e.to_string())
                })?;
                report.acquisitions += 1;
                report.attempts += guard.attempts();
                tracing::debug!(
                    "client '{}' step {n}: acquired {amount} after {} attempt(s)",
                    spec.name,
                    guard.attempts()
                );
                held.push(guard);
                if *hold_ms > 0 {
                    thread::sleep(Duration::from_millis(*hold_ms));
                }
            }
            Step::Release => {
                let guard = held
                    .pop()
                    .ok_or_else(|| (n, "release with nothing held".to_string()))?;
                guard.release().map_err(|e| (n, e.to_string()))?;
            }
            Step::Sleep { ms } => thread::sleep(Duration::from_millis(*ms)),
        }
        report.steps_completed = n;
    }

    while let Some(guard) = held.pop() {
        guard.release().map_err(|e| (spec.steps.len() + 1, e.to_string()))?;
    }
    Ok(())
}
