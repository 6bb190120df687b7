// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `banker check` command: is a static allocation table safe?
//!
//! Prints a completion order when the state is safe and the blocked clients
//! when it is not. Exits with code 1 for an unsafe state.

use super::join_names;
use allocator::SafetyVerdict;
use scenario::{evaluate_snapshot, ProbeOutcome, SnapshotConfig, SnapshotReport};
use std::path::PathBuf;
use std::process::ExitCode;

pub async fn execute(path: PathBuf, json: bool) -> anyhow::Result<ExitCode> {
    let snapshot = SnapshotConfig::from_file(&path)?;
    let report = evaluate_snapshot(&snapshot)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&snapshot, &report);
    }

    if !report.is_safe() {
        tracing::info!(path = %path.display(), "snapshot is unsafe");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(snapshot: &SnapshotConfig, report: &SnapshotReport) {
    println!("  Total:      {}", report.total);
    println!("  Available:  {}", report.available);
    println!();
    println!("  {:<12} {:<14} {:<14} {:<14}", "client", "max", "allocation", "need");
    for c in &snapshot.clients {
        let need = &c.max - &c.allocation;
        println!(
            "  {:<12} {:<14} {:<14} {:<14}",
            c.name,
            c.max.to_string(),
            c.allocation.to_string(),
            need.to_string(),
        );
    }
    println!();

    print_verdict("State", &report.verdict);

    if let Some(probe) = &report.probe {
        println!();
        println!("  Request {} by '{}'", probe.amount, probe.client);
        match probe.outcome {
            ProbeOutcome::Granted => println!("   Outcome:    would be GRANTED"),
            ProbeOutcome::Denied(reason) => println!("   Outcome:    would be DENIED ({reason})"),
            ProbeOutcome::ExceedsDeclaredMaximum => {
                println!("   Outcome:    ERROR, exceeds the client's remaining need")
            }
        }
        if let Some(verdict) = &probe.verdict {
            print_verdict("After grant", verdict);
        }
    }
}

fn print_verdict(label: &str, verdict: &SafetyVerdict<String>) {
    match verdict {
        SafetyVerdict::Safe { sequence } => {
            println!("  {label}: SAFE");
            println!("   Sequence:   {}", join_names(sequence, " → "));
        }
        SafetyVerdict::Unsafe { finished, blocked } => {
            println!("  {label}: UNSAFE");
            println!("   Finished:   {}", join_names(finished, ", "));
            println!("   Blocked:    {}", join_names(blocked, ", "));
        }
    }
}
