// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Static safety evaluation of an allocation table.
//!
//! Given pool totals and per-client `max`/`allocation` rows, derives
//! `available` and `need`, runs the safety check and, if the snapshot
//! carries a [`RequestProbe`](crate::RequestProbe), decides how the
//! allocator would answer that request.

use crate::{ScenarioError, SnapshotConfig};
use allocator::{DenialReason, SafetyChecker, SafetyVerdict};
use resource_vector::ResourceVector;
use std::collections::HashSet;

/// How the allocator would answer the probed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Granted,
    Denied(DenialReason),
    /// The request is larger than the client's remaining need.
    ExceedsDeclaredMaximum,
}

/// Result of evaluating a [`RequestProbe`](crate::RequestProbe).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProbeReport {
    pub client: String,
    pub amount: ResourceVector,
    pub outcome: ProbeOutcome,
    /// Verdict on the tentative state, when the request got that far.
    pub verdict: Option<SafetyVerdict<String>>,
}

/// Result of [`evaluate_snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SnapshotReport {
    pub total: ResourceVector,
    /// `total − Σ allocation`.
    pub available: ResourceVector,
    pub verdict: SafetyVerdict<String>,
    pub probe: Option<ProbeReport>,
}

impl SnapshotReport {
    pub fn is_safe(&self) -> bool {
        self.verdict.is_safe()
    }
}

struct Row {
    name: String,
    allocation: ResourceVector,
    need: ResourceVector,
}

fn verdict(work: &ResourceVector, rows: &[Row]) -> SafetyVerdict<String> {
    rows.iter()
        .fold(SafetyChecker::new(work.clone()), |checker, row| {
            checker.client(row.name.clone(), &row.allocation, &row.need)
        })
        .evaluate()
}

/// Validates `snapshot` and runs the safety check on it.
pub fn evaluate_snapshot(snapshot: &SnapshotConfig) -> Result<SnapshotReport, ScenarioError> {
    let classes = snapshot.total.classes();
    if classes == 0 {
        return Err(ScenarioError::Invalid("total must have at least one resource class".into()));
    }

    let mut names = HashSet::new();
    let mut held = ResourceVector::zeros(classes);
    let mut rows = Vec::with_capacity(snapshot.clients.len());
    for c in &snapshot.clients {
        if !names.insert(c.name.as_str()) {
            return Err(ScenarioError::Invalid(format!("duplicate client name '{}'", c.name)));
        }
        if c.max.classes() != classes || c.allocation.classes() != classes {
            return Err(ScenarioError::Invalid(format!(
                "client '{}' rows must have {classes} classes",
                c.name
            )));
        }
        if !c.allocation.fits_within(&c.max) {
            return Err(ScenarioError::Invalid(format!(
                "client '{}' holds {} beyond its maximum {}",
                c.name, c.allocation, c.max
            )));
        }
        held = held.checked_add(&c.allocation).ok_or_else(|| {
            ScenarioError::Invalid(format!(
                "allocations up to client '{}' overflow the unit counter",
                c.name
            ))
        })?;
        rows.push(Row {
            name: c.name.clone(),
            allocation: c.allocation.clone(),
            need: &c.max - &c.allocation,
        });
    }
    if !held.fits_within(&snapshot.total) {
        return Err(ScenarioError::Invalid(format!(
            "clients hold {held} in total, more than the pool's {}",
            snapshot.total
        )));
    }

    let available = &snapshot.total - &held;
    let report_verdict = verdict(&available, &rows);
    let probe = match &snapshot.request {
        Some(probe) => Some(evaluate_probe(&probe.client, &probe.amount, &available, &mut rows)?),
        None => None,
    };

    tracing::debug!(%available, safe = report_verdict.is_safe(), "snapshot evaluated");
    Ok(SnapshotReport {
        total: snapshot.total.clone(),
        available,
        verdict: report_verdict,
        probe,
    })
}

fn evaluate_probe(
    client: &str,
    amount: &ResourceVector,
    available: &ResourceVector,
    rows: &mut [Row],
) -> Result<ProbeReport, ScenarioError> {
    if amount.classes() != available.classes() {
        return Err(ScenarioError::Invalid(format!(
            "request amount {amount} must have {} classes",
            available.classes()
        )));
    }
    let index = rows
        .iter()
        .position(|r| r.name == client)
        .ok_or_else(|| ScenarioError::Invalid(format!("request names unknown client '{client}'")))?;

    let report = |outcome, verdict| ProbeReport {
        client: client.to_string(),
        amount: amount.clone(),
        outcome,
        verdict,
    };

    if !amount.fits_within(&rows[index].need) {
        return Ok(report(ProbeOutcome::ExceedsDeclaredMaximum, None));
    }
    if !amount.fits_within(available) {
        return Ok(report(ProbeOutcome::Denied(DenialReason::Unavailable), None));
    }

    let work = available - amount;
    rows[index].allocation += amount;
    rows[index].need -= amount;
    let tentative = verdict(&work, rows);
    let outcome = if tentative.is_safe() {
        ProbeOutcome::Granted
    } else {
        ProbeOutcome::Denied(DenialReason::Unsafe)
    };
    Ok(report(outcome, Some(tentative)))
}
