use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

use crate::errors::{LauncherError, LauncherResult};

// Structure to represent an external tool
#[derive(Debug, Clone)]
pub struct ExternalTool {
    pub name: String,
    pub path: PathBuf,
    pub version: Option<Version>,
    pub min_version: Version,
}

// Global storage for discovered tools
static TOOLS: Lazy<Mutex<Vec<ExternalTool>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Check if a command is available in PATH
fn check_command_in_path(command: &str) -> Result<PathBuf> {
    which::which(command).map_err(|_| anyhow!("Command {} not found in PATH", command))
}

/// Pad a loosely formatted version ("24" or "24.11") to semver shape
fn pad_version(version: &str) -> String {
    let parts: Vec<&str> = version.split('.').collect();
    match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        _ => version.to_string(),
    }
}

/// Check conda version ("conda 24.11.1")
fn check_conda_version(path: &Path) -> Result<Version> {
    let output = Command::new(path)
        .args(["--version"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .context("Failed to execute conda")?;

    if output.status.success() {
        // Older conda prints the version banner on stderr
        let version_str = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let re = Regex::new(r"conda (\d+(?:\.\d+){0,2})")?;
        if let Some(caps) = re.captures(&version_str) {
            let version = caps.get(1).map_or("", |m| m.as_str());
            Ok(Version::parse(&pad_version(version))?)
        } else {
            debug!("Could not parse conda version, using default");
            Ok(Version::new(4, 0, 0))
        }
    } else {
        Err(anyhow!("Failed to get conda version"))
    }
}

/// Check git version ("git version 2.43.0")
fn check_git_version(path: &Path) -> Result<Version> {
    let output = Command::new(path)
        .args(["--version"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .context("Failed to execute git")?;

    if output.status.success() {
        let version_str = String::from_utf8_lossy(&output.stdout);
        let re = Regex::new(r"git version (\d+(?:\.\d+){0,2})")?;
        if let Some(caps) = re.captures(&version_str) {
            let version = caps.get(1).map_or("", |m| m.as_str());
            Ok(Version::parse(&pad_version(version))?)
        } else {
            debug!("Could not parse git version, using default");
            Ok(Version::new(2, 0, 0))
        }
    } else {
        Err(anyhow!("Failed to get git version"))
    }
}

fn probe_tool(name: &str, min_version: Version) -> Result<ExternalTool> {
    let path = check_command_in_path(name)?;
    info!("Found {} at {}", name, path.display());

    let version = match name {
        "conda" => check_conda_version(&path).ok(),
        "git" => check_git_version(&path).ok(),
        _ => None,
    };
    if let Some(v) = &version {
        info!("{} version: {}", name, v);
    }

    Ok(ExternalTool {
        name: name.to_string(),
        path,
        version,
        min_version,
    })
}

/// Locate a tool, caching the result for later calls.
/// Returns `ToolNotFound` when the command is absent from PATH.
pub fn require(name: &str) -> LauncherResult<PathBuf> {
    if let Some(path) = get_tool_path(name) {
        return Ok(path);
    }

    let min_version = match name {
        "conda" => Version::new(4, 10, 0),
        "git" => Version::new(2, 20, 0),
        _ => Version::new(0, 0, 0),
    };

    let tool =
        probe_tool(name, min_version).map_err(|_| LauncherError::ToolNotFound(name.to_string()))?;
    let path = tool.path.clone();
    TOOLS.lock().unwrap().push(tool);
    Ok(path)
}

/// Get tool path by name
pub fn get_tool_path(name: &str) -> Option<PathBuf> {
    TOOLS
        .lock()
        .unwrap()
        .iter()
        .find(|tool| tool.name == name)
        .map(|tool| tool.path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_version() {
        assert_eq!(pad_version("24"), "24.0.0");
        assert_eq!(pad_version("24.11"), "24.11.0");
        assert_eq!(pad_version("24.11.1"), "24.11.1");
    }

    #[test]
    fn test_require_unknown_tool() {
        let err = require("definitely-not-a-real-tool-xyz").unwrap_err();
        assert!(matches!(err, LauncherError::ToolNotFound(_)));
    }
}
