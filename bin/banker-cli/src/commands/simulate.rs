// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `banker simulate` command: run a scenario file.
//!
//! Client threads block while backing off, so the run happens on tokio's
//! blocking pool.

use anyhow::Context;
use scenario::{ClientOutcome, RunReport, ScenarioConfig, ScenarioRunner};
use std::path::PathBuf;
use std::process::ExitCode;

pub async fn execute(path: PathBuf, json: bool) -> anyhow::Result<ExitCode> {
    let config = ScenarioConfig::from_file(&path)?;
    let runner = ScenarioRunner::new(config)
        .with_context(|| format!("scenario '{}' is not runnable", path.display()))?;

    let report = tokio::task::spawn_blocking(move || runner.run())
        .await
        .context("scenario runner panicked")??;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    let failed = report.failures().count();
    if failed > 0 || !report.pool_restored() {
        tracing::warn!(
            failed,
            final_available = %report.final_available,
            "scenario '{}' did not finish cleanly",
            report.scenario
        );
        return Ok(ExitCode::FAILURE);
    }
    tracing::info!("scenario '{}' finished cleanly", report.scenario);
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &RunReport) {
    println!("Scenario: {}", report.scenario);
    println!("Pool:     {}", report.total);
    println!();
    println!(
        "  {:<12} {:<14} {:>6} {:>8} {:>8} {:>10} {:>10}  {}",
        "client", "max", "steps", "grants", "denials", "waited", "elapsed", "outcome"
    );
    for c in &report.clients {
        let outcome = match &c.outcome {
            ClientOutcome::Completed => "completed".to_string(),
            ClientOutcome::Failed { step, error } => format!("FAILED at step {step}: {error}"),
            ClientOutcome::Panicked => "PANICKED".to_string(),
        };
        println!(
            "  {:<12} {:<14} {:>6} {:>8} {:>8} {:>8.1}ms {:>8.1}ms  {}",
            c.name,
            c.maximum.to_string(),
            c.steps_completed,
            c.acquisitions,
            c.denials(),
            c.waited.as_secs_f64() * 1000.0,
            c.elapsed.as_secs_f64() * 1000.0,
            outcome,
        );
    }
    println!();

    if let Some(events) = &report.events {
        println!("  Timeline ({} events)", events.len());
        for e in events {
            println!(
                "   {:<10} {:<22} {:<14} available {}",
                e.client.to_string(),
                format!("{:?}", e.kind),
                e.amount.to_string(),
                e.available,
            );
        }
        println!();
    }

    println!("{}", report.summary());
}
