// Smoke-test service
// Drives the external inference test entry point against the linked model
// and verifies the artifacts each scenario is expected to produce.

use chrono::Utc;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc::Sender;

use crate::config::LauncherConfig;
use crate::errors::{LauncherError, LauncherResult};
use crate::models::{ScenarioResult, SmokeReport};
use crate::utils::common::check_file_exists_and_valid;
use crate::utils::tools;

/// Bundled reference audio the external suite falls back to
pub const DEFAULT_PROMPT_FILE: &str = "asset/zero_shot_prompt.wav";

/// One inference scenario of the fixed suite
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub artifact: &'static str,
}

/// The fixed suite run by the external test entry point
pub const SCENARIOS: [Scenario; 5] = [
    Scenario { name: "zero_shot", artifact: "zero_shot_output.wav" },
    Scenario { name: "cross_lingual", artifact: "cross_lingual_output.wav" },
    Scenario { name: "fine_grained_control", artifact: "fine_grained_control_output.wav" },
    Scenario { name: "instruct", artifact: "instruct_output.wav" },
    Scenario { name: "streaming", artifact: "streaming/combined_streaming.wav" },
];

/// Progress updates emitted while the suite runs
#[derive(Debug, Clone)]
pub enum SmokeProgress {
    Started,
    ScenarioStarted { ordinal: usize, banner: String },
    Completed,
}

/// Parse a scenario banner line ("===== ... =====") from the child's output
pub fn parse_scenario_banner(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.len() < 11 || !trimmed.starts_with("=====") || !trimmed.ends_with("=====") {
        return None;
    }
    let inner = trimmed.trim_matches('=').trim();
    if inner.is_empty() {
        return None;
    }
    Some(inner.to_string())
}

/// Build the documented test invocation.
/// The prompt argument appears only when a reference file is supplied.
pub fn test_invocation_args(
    env: &str,
    test_entry: &Path,
    model_dir: &Path,
    output_dir: &Path,
    prompt_file: Option<&Path>,
) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "-n".to_string(),
        env.to_string(),
        "python".to_string(),
        test_entry.to_string_lossy().to_string(),
        "--model_dir".to_string(),
        model_dir.to_string_lossy().to_string(),
        "--output_dir".to_string(),
        output_dir.to_string_lossy().to_string(),
    ];
    if let Some(prompt) = prompt_file {
        args.push("--prompt_file".to_string());
        args.push(prompt.to_string_lossy().to_string());
    }
    args
}

/// Pick the reference audio for the run.
/// A configured file is passed explicitly; otherwise the bundled default must
/// exist for the external suite to fall back to, and no argument is passed.
async fn resolve_prompt(config: &LauncherConfig) -> LauncherResult<Option<PathBuf>> {
    if let Some(prompt) = &config.prompt_file {
        if check_file_exists_and_valid(prompt).await {
            return Ok(Some(prompt.clone()));
        }
        warn!(
            "Configured prompt file {} not found, falling back to the bundled default",
            prompt.display()
        );
    }

    if Path::new(DEFAULT_PROMPT_FILE).exists() {
        Ok(None)
    } else {
        Err(LauncherError::SmokeError(format!(
            "No reference audio available ({DEFAULT_PROMPT_FILE} is missing)"
        )))
    }
}

/// Check the expected artifact of every scenario under the output directory
pub async fn verify_artifacts(output_dir: &Path) -> Vec<ScenarioResult> {
    let mut results = Vec::with_capacity(SCENARIOS.len());
    for scenario in &SCENARIOS {
        let artifact = output_dir.join(scenario.artifact);
        let passed = check_file_exists_and_valid(&artifact).await;
        if !passed {
            warn!(
                "Scenario {} did not produce {}",
                scenario.name,
                artifact.display()
            );
        }
        results.push(ScenarioResult {
            name: scenario.name.to_string(),
            artifact,
            passed,
        });
    }
    results
}

/// Run the fixed smoke suite to completion and verify its artifacts
pub async fn run_smoke(
    config: &LauncherConfig,
    progress_sender: Option<Sender<SmokeProgress>>,
) -> LauncherResult<SmokeReport> {
    if !config.model_dir.exists() {
        return Err(LauncherError::ModelPathMissing(config.model_dir.clone()));
    }

    let prompt = resolve_prompt(config).await?;
    std::fs::create_dir_all(&config.output_dir)?;

    let conda = tools::require("conda")?;
    let args = test_invocation_args(
        &config.conda_env,
        &config.test_entry,
        &config.model_dir,
        &config.output_dir,
        prompt.as_deref(),
    );

    info!("Running smoke suite: {} {}", conda.display(), args.join(" "));
    let started_at = Utc::now();
    let timer = Instant::now();

    if let Some(sender) = &progress_sender {
        let _ = sender.send(SmokeProgress::Started).await;
    }

    let mut child = TokioCommand::new(&conda)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                debug!("{}", line);
            }
        });
    }

    let mut scenarios_seen = 0usize;
    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if let Some(banner) = parse_scenario_banner(&line) {
                scenarios_seen += 1;
                info!("Scenario {}/{}: {}", scenarios_seen, SCENARIOS.len(), banner);
                if let Some(sender) = &progress_sender {
                    let _ = sender
                        .send(SmokeProgress::ScenarioStarted {
                            ordinal: scenarios_seen,
                            banner,
                        })
                        .await;
                }
            } else {
                debug!("{}", line);
            }
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(LauncherError::SmokeError(format!(
            "test entry point exited with status {status}"
        )));
    }

    let results = verify_artifacts(&config.output_dir).await;
    let report = SmokeReport {
        started_at,
        elapsed_seconds: timer.elapsed().as_secs_f64(),
        results,
    };

    if let Some(sender) = &progress_sender {
        let _ = sender.send(SmokeProgress::Completed).await;
    }

    info!(
        "Smoke suite finished in {:.2}s, {}/{} scenarios passed",
        report.elapsed_seconds,
        report.results.iter().filter(|r| r.passed).count(),
        report.results.len()
    );

    Ok(report)
}
