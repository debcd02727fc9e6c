// Domain models module
// Contains shared data structures used throughout the launcher

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Provisioning status of the runtime environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupStatus {
    /// Whether setup finished successfully
    pub completed: bool,

    /// Setup progress (0.0 - 1.0)
    pub progress: f32,

    /// Current setup step message
    pub status_message: String,
}

/// Summary of a completed environment setup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupReport {
    /// Whether the conda environment was created (false when it already existed)
    pub env_created: bool,

    /// Top-level model entries linked or copied into the project tree
    pub entries_linked: usize,

    /// Files found under the linked model directory
    pub model_files: u64,

    /// Total size of the linked model directory in bytes
    pub model_bytes: u64,

    /// Whether the CosyVoice2 entry point imported cleanly inside the env
    pub import_verified: bool,
}

/// Outcome of a single smoke scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario name
    pub name: String,

    /// Artifact the scenario is expected to produce
    pub artifact: PathBuf,

    /// Whether the artifact exists and is non-empty
    pub passed: bool,
}

/// Report for one run of the smoke suite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokeReport {
    /// When the suite was started
    pub started_at: DateTime<Utc>,

    /// Total wall time in seconds
    pub elapsed_seconds: f64,

    /// Per-scenario outcomes
    pub results: Vec<ScenarioResult>,
}

impl SmokeReport {
    pub fn all_passed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.passed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, passed: bool) -> ScenarioResult {
        ScenarioResult {
            name: name.to_string(),
            artifact: PathBuf::from(format!("{name}.wav")),
            passed,
        }
    }

    #[test]
    fn test_smoke_report_all_passed() {
        let report = SmokeReport {
            started_at: Utc::now(),
            elapsed_seconds: 1.0,
            results: vec![result("zero_shot", true), result("instruct", true)],
        };
        assert!(report.all_passed());
        assert_eq!(report.failed().count(), 0);
    }

    #[test]
    fn test_smoke_report_with_failure() {
        let report = SmokeReport {
            started_at: Utc::now(),
            elapsed_seconds: 1.0,
            results: vec![result("zero_shot", true), result("streaming", false)],
        };
        assert!(!report.all_passed());
        assert_eq!(report.failed().next().unwrap().name, "streaming");
    }

    #[test]
    fn test_empty_report_is_not_a_pass() {
        let report = SmokeReport {
            started_at: Utc::now(),
            elapsed_seconds: 0.0,
            results: vec![],
        };
        assert!(!report.all_passed());
    }
}
