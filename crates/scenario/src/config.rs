// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Scenario and snapshot files, loaded from TOML or built programmatically.
//!
//! # Scenario format
//! ```toml
//! name = "textbook"
//! total = [10, 5, 7]
//! record_events = true
//! timeout_ms = 10000
//!
//! [backoff]
//! interval_ms = 20
//! max_interval_ms = 200
//! multiplier = 2.0
//!
//! [[client]]
//! name = "t2"
//! max = [3, 0, 2]
//! steps = [
//!     { op = "acquire", amount = [3, 0, 2], hold_ms = 5 },
//!     { op = "release" },
//! ]
//! ```
//!
//! # Snapshot format
//! ```toml
//! total = [10, 5, 7]
//!
//! [[client]]
//! name = "p0"
//! max = [7, 5, 3]
//! allocation = [0, 1, 0]
//!
//! [request]
//! client = "p1"
//! amount = [1, 0, 2]
//! ```

use crate::ScenarioError;
use allocator::BackoffPolicy;
use resource_vector::ResourceVector;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// A workload: the pool plus one ordered step list per client.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScenarioConfig {
    /// Name shown in reports.
    #[serde(default = "default_name")]
    pub name: String,
    /// Units of each class in the pool.
    pub total: ResourceVector,
    /// Retry policy for denied acquisitions.
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Attach the full event timeline to the report.
    #[serde(default)]
    pub record_events: bool,
    /// Cancel every pending acquisition once this much time has passed.
    pub timeout_ms: Option<u64>,
    #[serde(default, rename = "client")]
    pub clients: Vec<ClientSpec>,
}

fn default_name() -> String {
    "scenario".to_string()
}

/// Backoff settings in milliseconds. See [`BackoffPolicy`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay after the first denial.
    pub interval_ms: u64,
    /// Cap for growing delays (defaults to `interval_ms`).
    pub max_interval_ms: Option<u64>,
    pub multiplier: f64,
    /// Fraction of random spread, in `[0.0, 1.0]`.
    pub jitter: f64,
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    /// Half-second fixed retry, unbounded.
    fn default() -> Self {
        Self {
            interval_ms: 500,
            max_interval_ms: None,
            multiplier: 1.0,
            jitter: 0.0,
            max_attempts: None,
        }
    }
}

impl BackoffConfig {
    /// Builds the runtime policy.
    pub fn to_policy(&self) -> BackoffPolicy {
        let mut policy = BackoffPolicy::fixed(Duration::from_millis(self.interval_ms))
            .with_multiplier(self.multiplier)
            .with_jitter(self.jitter);
        if let Some(max) = self.max_interval_ms {
            policy = policy.with_max_interval(Duration::from_millis(max));
        }
        if let Some(attempts) = self.max_attempts {
            policy = policy.with_max_attempts(attempts);
        }
        policy
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ScenarioError::Invalid(format!(
                "backoff multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ScenarioError::Invalid(format!(
                "backoff jitter must be within [0.0, 1.0], got {}",
                self.jitter
            )));
        }
        if self.max_attempts == Some(0) {
            return Err(ScenarioError::Invalid("backoff max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

/// One client of a scenario.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClientSpec {
    pub name: String,
    /// Declared maximum.
    pub max: ResourceVector,
    /// Wait this long after registering before the first step.
    #[serde(default)]
    pub start_delay_ms: u64,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A single client action. Held amounts form a stack: `release` returns the
/// most recent acquisition. Whatever is still held after the last step is
/// released in reverse order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Acquire `amount` (retrying under the backoff policy), then hold it
    /// for `hold_ms` before the next step.
    Acquire {
        amount: ResourceVector,
        #[serde(default)]
        hold_ms: u64,
    },
    /// Release the most recent acquisition still held.
    Release,
    /// Work without acquiring anything.
    Sleep { ms: u64 },
}

impl ScenarioConfig {
    /// Loads a scenario from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScenarioError::ConfigError(format!("cannot read scenario '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses a scenario from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ScenarioError> {
        toml::from_str(toml_str)
            .map_err(|e| ScenarioError::ConfigError(format!("TOML parse error: {e}")))
    }

    /// Serialises the scenario to TOML.
    pub fn to_toml(&self) -> Result<String, ScenarioError> {
        toml::to_string_pretty(self)
            .map_err(|e| ScenarioError::ConfigError(format!("TOML serialise error: {e}")))
    }

    /// Checks that the workload can be run as written.
    ///
    /// Rejects dimension mismatches, duplicate names, releases with nothing
    /// held and step sequences that would hold more than the declared
    /// maximum. A maximum larger than the pool is accepted: the allocator
    /// allows it, it just blocks every request while registered.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let classes = self.total.classes();
        if classes == 0 {
            return Err(ScenarioError::Invalid("total must have at least one resource class".into()));
        }
        if self.clients.is_empty() {
            return Err(ScenarioError::Invalid("scenario has no clients".into()));
        }
        self.backoff.validate()?;

        let mut names = HashSet::new();
        for spec in &self.clients {
            if !names.insert(spec.name.as_str()) {
                return Err(ScenarioError::Invalid(format!("duplicate client name '{}'", spec.name)));
            }
            check_width(&spec.name, "max", &spec.max, classes)?;
            spec.validate_steps(classes)?;
        }
        Ok(())
    }

    /// Timeout as a `Duration`, if configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl ClientSpec {
    fn validate_steps(&self, classes: usize) -> Result<(), ScenarioError> {
        let mut stack: Vec<&ResourceVector> = Vec::new();
        let mut held = ResourceVector::zeros(classes);

        for (i, step) in self.steps.iter().enumerate() {
            let n = i + 1;
            match step {
                Step::Acquire { amount, .. } => {
                    check_width(&self.name, &format!("step {n} amount"), amount, classes)?;
                    held = held.checked_add(amount).ok_or_else(|| {
                        ScenarioError::Invalid(format!(
                            "client '{}' step {n} overflows the unit counter",
                            self.name
                        ))
                    })?;
                    if !held.fits_within(&self.max) {
                        return Err(ScenarioError::Invalid(format!(
                            "client '{}' step {n} would hold {held}, exceeding its maximum {}",
                            self.name, self.max
                        )));
                    }
                    stack.push(amount);
                }
                Step::Release => {
                    let amount = stack.pop().ok_or_else(|| {
                        ScenarioError::Invalid(format!(
                            "client '{}' step {n} releases with nothing held",
                            self.name
                        ))
                    })?;
                    held -= amount;
                }
                Step::Sleep { .. } => {}
            }
        }
        Ok(())
    }
}

fn check_width(
    client: &str,
    what: &str,
    vector: &ResourceVector,
    classes: usize,
) -> Result<(), ScenarioError> {
    if vector.classes() != classes {
        return Err(ScenarioError::Invalid(format!(
            "client '{client}' {what} {vector} has {} classes, expected {classes}",
            vector.classes()
        )));
    }
    Ok(())
}

/// A static allocation table for the "is this state safe?" check.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SnapshotConfig {
    pub total: ResourceVector,
    #[serde(default, rename = "client")]
    pub clients: Vec<SnapshotClient>,
    /// Optional request to evaluate against the snapshot.
    pub request: Option<RequestProbe>,
}

/// One row of a [`SnapshotConfig`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SnapshotClient {
    pub name: String,
    pub max: ResourceVector,
    pub allocation: ResourceVector,
}

/// A hypothetical request by a named snapshot client.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RequestProbe {
    pub client: String,
    pub amount: ResourceVector,
}

impl SnapshotConfig {
    /// Loads a snapshot from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScenarioError::ConfigError(format!("cannot read snapshot '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses a snapshot from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ScenarioError> {
        toml::from_str(toml_str)
            .map_err(|e| ScenarioError::ConfigError(format!("TOML parse error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
name = "small"
total = [3, 2]
timeout_ms = 1000

[backoff]
interval_ms = 5
max_interval_ms = 40
multiplier = 2.0
max_attempts = 10

[[client]]
name = "a"
max = [2, 1]
steps = [
    { op = "acquire", amount = [1, 0] },
    { op = "acquire", amount = [1, 1], hold_ms = 3 },
    { op = "release" },
    { op = "sleep", ms = 2 },
]

[[client]]
name = "b"
max = [1, 2]
start_delay_ms = 4
"#;

    fn small() -> ScenarioConfig {
        ScenarioConfig::from_toml(SMALL).unwrap()
    }

    #[test]
    fn test_from_toml() {
        let c = small();
        assert_eq!(c.name, "small");
        assert_eq!(c.total, ResourceVector::from([3, 2]));
        assert_eq!(c.timeout(), Some(Duration::from_secs(1)));
        assert!(!c.record_events);
        assert_eq!(c.clients.len(), 2);
        assert_eq!(
            c.clients[0].steps[1],
            Step::Acquire {
                amount: ResourceVector::from([1, 1]),
                hold_ms: 3
            }
        );
        assert_eq!(c.clients[0].steps[2], Step::Release);
        assert_eq!(c.clients[0].steps[3], Step::Sleep { ms: 2 });
        assert_eq!(c.clients[1].start_delay_ms, 4);
        assert!(c.clients[1].steps.is_empty());
        c.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let c = ScenarioConfig::from_toml("total = [1]\n[[client]]\nname = \"x\"\nmax = [1]\n").unwrap();
        assert_eq!(c.name, "scenario");
        assert_eq!(c.backoff, BackoffConfig::default());
        assert_eq!(c.timeout(), None);
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = small();
        let toml = c.to_toml().unwrap();
        let back = ScenarioConfig::from_toml(&toml).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_backoff_to_policy() {
        let policy = small().backoff.to_policy();
        assert_eq!(policy.initial_interval, Duration::from_millis(5));
        assert_eq!(policy.max_interval, Duration::from_millis(40));
        assert_eq!(policy.max_attempts, Some(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));
    }

    #[test]
    fn test_validate_rejects_bad_width() {
        let mut c = small();
        c.clients[1].max = ResourceVector::from([1, 2, 3]);
        assert!(matches!(c.validate(), Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut c = small();
        c.clients[1].name = "a".into();
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_validate_rejects_release_without_hold() {
        let mut c = small();
        c.clients[1].steps = vec![Step::Release];
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("nothing held"));
    }

    #[test]
    fn test_validate_rejects_holding_over_maximum() {
        let mut c = small();
        c.clients[0].steps = vec![
            Step::Acquire { amount: ResourceVector::from([1, 1]), hold_ms: 0 },
            Step::Acquire { amount: ResourceVector::from([1, 1]), hold_ms: 0 },
        ];
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("exceeding its maximum"));
    }

    #[test]
    fn test_validate_rejects_step_overflow() {
        let mut c = small();
        c.clients[0].max = ResourceVector::from([u32::MAX, 0]);
        c.clients[0].steps = vec![
            Step::Acquire { amount: ResourceVector::from([u32::MAX, 0]), hold_ms: 0 },
            Step::Acquire { amount: ResourceVector::from([1, 0]), hold_ms: 0 },
        ];
        let err = c.validate().unwrap_err();
        assert!(matches!(err, ScenarioError::Invalid(_)));
        assert!(err.to_string().contains("step 2 overflows"), "{err}");
    }

    #[test]
    fn test_validate_tracks_releases() {
        let mut c = small();
        c.clients[0].steps = vec![
            Step::Acquire { amount: ResourceVector::from([2, 1]), hold_ms: 0 },
            Step::Release,
            Step::Acquire { amount: ResourceVector::from([2, 1]), hold_ms: 0 },
        ];
        c.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_backoff() {
        let mut c = small();
        c.backoff.jitter = 1.5;
        assert!(c.validate().is_err());
        c.backoff.jitter = 0.0;
        c.backoff.multiplier = 0.5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_oversized_maximum_is_accepted() {
        let mut c = small();
        c.clients[1].max = ResourceVector::from([9, 9]);
        c.validate().unwrap();
    }

    #[test]
    fn test_snapshot_from_toml() {
        let s = SnapshotConfig::from_toml(
            r#"
total = [10, 5, 7]

[[client]]
name = "p0"
max = [7, 5, 3]
allocation = [0, 1, 0]

[request]
client = "p0"
amount = [1, 0, 0]
"#,
        )
        .unwrap();
        assert_eq!(s.clients.len(), 1);
        assert_eq!(s.clients[0].allocation, ResourceVector::from([0, 1, 0]));
        assert_eq!(s.request.unwrap().client, "p0");
    }

    #[test]
    fn test_from_file_missing() {
        let err = ScenarioConfig::from_file(Path::new("/nonexistent/scenario.toml")).unwrap_err();
        assert!(matches!(err, ScenarioError::ConfigError(_)));
    }
}
