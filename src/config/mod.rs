// Configuration module
// Centralized management of launcher configuration

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::errors::{LauncherError, LauncherResult};

/// Launcher configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LauncherConfig {
    /// External checkpoint directory the model files are linked from
    pub model_source: PathBuf,

    /// Linked model directory inside the project tree
    pub model_dir: PathBuf,

    /// Directory the smoke suite writes its outputs to
    pub output_dir: PathBuf,

    /// Reference audio for voice cloning scenarios.
    /// Falls back to the bundled default prompt when unset.
    pub prompt_file: Option<PathBuf>,

    /// Conda environment name
    pub conda_env: String,

    /// Python version used when creating the environment
    pub python_version: String,

    /// pip index mirror for dependency installation
    pub pip_index_url: String,

    /// Trusted host matching the mirror
    pub pip_trusted_host: String,

    /// External test entry point
    pub test_entry: PathBuf,

    /// External web UI entry point
    pub webui_entry: PathBuf,

    /// Web UI bind host
    pub webui_host: String,

    /// Web UI bind port
    pub webui_port: u16,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

        LauncherConfig {
            model_source: home_dir.join("models").join("CosyVoice2-0.5B"),
            model_dir: PathBuf::from("pretrained_models/CosyVoice2-0.5B"),
            output_dir: PathBuf::from("test_outputs"),
            prompt_file: None,
            conda_env: "cosyvoice".to_string(),
            python_version: "3.10".to_string(),
            pip_index_url: "https://mirrors.aliyun.com/pypi/simple/".to_string(),
            pip_trusted_host: "mirrors.aliyun.com".to_string(),
            test_entry: PathBuf::from("test_cosyvoice.py"),
            webui_entry: PathBuf::from("webui.py"),
            webui_host: "127.0.0.1".to_string(),
            webui_port: 50000,
        }
    }
}

static CONFIG: Lazy<Arc<Mutex<Option<LauncherConfig>>>> = Lazy::new(|| Arc::new(Mutex::new(None)));

const CONFIG_FILENAME: &str = "cosylaunch_config.json";

/// Get the path to the config file
fn get_config_path() -> PathBuf {
    let app_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cosylaunch");

    if !app_dir.exists() {
        let _ = fs::create_dir_all(&app_dir);
    }

    app_dir.join(CONFIG_FILENAME)
}

fn save_config_to(config: &LauncherConfig, path: &Path) -> LauncherResult<()> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| LauncherError::ConfigurationError(e.to_string()))?;
    fs::write(path, json)?;
    Ok(())
}

fn load_config_from(path: &Path) -> LauncherResult<LauncherConfig> {
    if !path.exists() {
        let config = LauncherConfig::default();
        save_config_to(&config, path)?;
        return Ok(config);
    }

    let json = fs::read_to_string(path)?;
    let config = serde_json::from_str(&json)
        .map_err(|e| LauncherError::ConfigurationError(e.to_string()))?;
    Ok(config)
}

/// Set launcher configuration
pub fn set_config(config: LauncherConfig) -> LauncherResult<()> {
    let mut config_guard = CONFIG.lock().unwrap();
    *config_guard = Some(config.clone());
    save_config_to(&config, &get_config_path())
}

/// Get launcher configuration, loading it from disk on first use
pub fn get_config() -> LauncherResult<LauncherConfig> {
    let mut config_guard = CONFIG.lock().unwrap();

    if let Some(config) = config_guard.clone() {
        return Ok(config);
    }

    let config = load_config_from(&get_config_path())?;
    *config_guard = Some(config.clone());

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LauncherConfig::default();
        assert_eq!(config.conda_env, "cosyvoice");
        assert_eq!(config.python_version, "3.10");
        assert_eq!(config.webui_port, 50000);
        assert_eq!(config.webui_host, "127.0.0.1");
        assert_eq!(config.model_dir, PathBuf::from("pretrained_models/CosyVoice2-0.5B"));
        assert_eq!(config.output_dir, PathBuf::from("test_outputs"));
        assert!(config.prompt_file.is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);

        let mut config = LauncherConfig::default();
        config.webui_port = 8080;
        config.prompt_file = Some(PathBuf::from("voices/ref.wav"));
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, LauncherConfig::default());
        assert!(path.exists(), "defaults are persisted on first load");
    }
}
