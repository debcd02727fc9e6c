// Environment provisioning service
// Creates the conda environment, installs dependencies and links the
// pretrained model checkpoint into the project tree.

use log::{info, warn};
use once_cell::sync::Lazy;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;

use crate::config::LauncherConfig;
use crate::errors::{LauncherError, LauncherResult};
use crate::models::{SetupReport, SetupStatus};
use crate::utils::common::copy_recursively;
use crate::utils::tools;

const PYNINI_SPEC: &str = "pynini==2.1.5";
const REQUIREMENTS_FILE: &str = "requirements.txt";
const MATCHA_TTS_PATH: &str = "./third_party/Matcha-TTS";

// Track setup status
static SETUP_STATUS: Lazy<Arc<Mutex<SetupStatus>>> = Lazy::new(|| {
    Arc::new(Mutex::new(SetupStatus {
        completed: false,
        progress: 0.0,
        status_message: "Not started".to_string(),
    }))
});

/// Get current setup status
pub fn get_setup_status() -> SetupStatus {
    SETUP_STATUS.lock().unwrap().clone()
}

fn update_status(progress: f32, message: &str) {
    let mut status = SETUP_STATUS.lock().unwrap();
    status.progress = progress;
    status.status_message = message.to_string();
    info!("Setup: {:.1}% - {}", progress * 100.0, message);
}

fn complete_setup() {
    let mut status = SETUP_STATUS.lock().unwrap();
    status.completed = true;
    status.progress = 1.0;
    status.status_message = "Setup complete".to_string();
}

/// Arguments for creating the conda environment
pub fn conda_create_args(env: &str, python_version: &str) -> Vec<String> {
    vec![
        "create".to_string(),
        "-n".to_string(),
        env.to_string(),
        "-y".to_string(),
        format!("python={python_version}"),
    ]
}

/// Arguments for installing pynini from conda-forge into the environment
pub fn pynini_install_args(env: &str) -> Vec<String> {
    vec![
        "install".to_string(),
        "-n".to_string(),
        env.to_string(),
        "-y".to_string(),
        "-c".to_string(),
        "conda-forge".to_string(),
        PYNINI_SPEC.to_string(),
    ]
}

/// Arguments for installing the Python requirements through the mirror
pub fn pip_install_args(env: &str, index_url: &str, trusted_host: &str) -> Vec<String> {
    vec![
        "run".to_string(),
        "-n".to_string(),
        env.to_string(),
        "pip".to_string(),
        "install".to_string(),
        "-r".to_string(),
        REQUIREMENTS_FILE.to_string(),
        "-i".to_string(),
        index_url.to_string(),
        format!("--trusted-host={trusted_host}"),
    ]
}

/// Arguments for updating git submodules
pub fn submodule_update_args() -> Vec<String> {
    vec![
        "submodule".to_string(),
        "update".to_string(),
        "--init".to_string(),
        "--recursive".to_string(),
    ]
}

/// Arguments for the import verification probe
pub fn import_check_args(env: &str) -> Vec<String> {
    let snippet = format!(
        "import sys; sys.path.insert(0, '{MATCHA_TTS_PATH}'); \
         from cosyvoice.cli.cosyvoice import CosyVoice2; print('import ok')"
    );
    vec![
        "run".to_string(),
        "-n".to_string(),
        env.to_string(),
        "python".to_string(),
        "-c".to_string(),
        snippet,
    ]
}

/// Parse `conda env list` output and look for an environment by name.
/// Comment lines start with '#'; the name is the first whitespace token.
pub fn env_list_contains(output: &str, env: &str) -> bool {
    output
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .filter_map(|line| line.split_whitespace().next())
        .any(|name| name == env)
}

/// Check whether the conda environment already exists
async fn env_exists(conda: &Path, env: &str) -> LauncherResult<bool> {
    let output = TokioCommand::new(conda)
        .args(["env", "list"])
        .output()
        .await?;

    if !output.status.success() {
        return Err(LauncherError::SetupError(
            "conda env list exited with a non-zero status".to_string(),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(env_list_contains(&stdout, env))
}

/// Run one provisioning command, streaming its output into the log.
/// A non-zero exit fails the whole setup with the step name.
async fn run_step(program: &Path, args: &[String], step: &str) -> LauncherResult<()> {
    info!("Running: {} {}", program.display(), args.join(" "));

    let mut child = TokioCommand::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                warn!("{}", line);
            }
        });
    }

    if let Some(stdout) = child.stdout.take() {
        let mut reader = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            info!("{}", line);
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(LauncherError::SetupError(format!(
            "{step} exited with status {status}"
        )));
    }

    Ok(())
}

/// Link or copy every top-level entry of the external model directory into
/// the project model directory. Existing targets are replaced.
pub fn link_model_files(source: &Path, target: &Path) -> LauncherResult<usize> {
    fs::create_dir_all(target)?;

    let entries: Vec<PathBuf> = fs::read_dir(source)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();

    if entries.is_empty() {
        warn!("No model files found in {}", source.display());
        return Ok(0);
    }

    let mut linked = 0;
    for entry in entries {
        let file_name = entry
            .file_name()
            .ok_or_else(|| LauncherError::SetupError(format!("Bad entry: {}", entry.display())))?;
        let target_path = target.join(file_name);

        if let Ok(metadata) = fs::symlink_metadata(&target_path) {
            if metadata.is_dir() {
                fs::remove_dir_all(&target_path)?;
            } else {
                fs::remove_file(&target_path)?;
            }
        }

        match make_symlink(&entry, &target_path) {
            Ok(()) => info!(
                "Linked {} -> {}",
                target_path.display(),
                entry.display()
            ),
            Err(_) => {
                if entry.is_dir() {
                    copy_recursively(&entry, &target_path)?;
                } else {
                    fs::copy(&entry, &target_path)?;
                }
                info!("Copied {} -> {}", entry.display(), target_path.display());
            }
        }
        linked += 1;
    }

    Ok(linked)
}

#[cfg(unix)]
fn make_symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn make_symlink(source: &Path, target: &Path) -> std::io::Result<()> {
    if source.is_dir() {
        std::os::windows::fs::symlink_dir(source, target)
    } else {
        std::os::windows::fs::symlink_file(source, target)
    }
}

/// Count files and bytes under the linked model directory
pub fn model_census(model_dir: &Path) -> (u64, u64) {
    let mut files = 0u64;
    let mut bytes = 0u64;
    for entry in walkdir::WalkDir::new(model_dir)
        .follow_links(true)
        .into_iter()
        .flatten()
    {
        if entry.file_type().is_file() {
            files += 1;
            if let Ok(metadata) = entry.metadata() {
                bytes += metadata.len();
            }
        }
    }
    (files, bytes)
}

/// Verify the installation: the model directory must be non-empty and the
/// CosyVoice2 entry point must import cleanly inside the environment.
async fn verify_installation(conda: &Path, env: &str, model_dir: &Path) -> LauncherResult<bool> {
    if !model_dir.exists()
        || fs::read_dir(model_dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true)
    {
        warn!("Model directory {} is missing or empty", model_dir.display());
        return Ok(false);
    }

    let output = TokioCommand::new(conda)
        .args(import_check_args(env))
        .output()
        .await?;

    if output.status.success() {
        info!("CosyVoice2 import check passed");
        Ok(true)
    } else {
        warn!(
            "CosyVoice2 import check failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(false)
    }
}

/// Provision the conda environment, install dependencies and link model files
pub async fn run_setup(config: &LauncherConfig) -> LauncherResult<SetupReport> {
    if !config.model_source.exists() {
        return Err(LauncherError::ModelPathMissing(config.model_source.clone()));
    }

    update_status(0.05, "Locating external tools");
    let conda = tools::require("conda")?;

    update_status(0.1, "Checking conda environment");
    let mut env_created = false;
    if env_exists(&conda, &config.conda_env).await? {
        info!(
            "Environment '{}' already exists, skipping creation",
            config.conda_env
        );
    } else {
        update_status(0.2, "Creating conda environment");
        run_step(
            &conda,
            &conda_create_args(&config.conda_env, &config.python_version),
            "conda create",
        )
        .await?;
        env_created = true;
    }

    update_status(0.35, "Installing pynini");
    run_step(
        &conda,
        &pynini_install_args(&config.conda_env),
        "pynini install",
    )
    .await?;

    update_status(0.5, "Installing Python dependencies");
    run_step(
        &conda,
        &pip_install_args(
            &config.conda_env,
            &config.pip_index_url,
            &config.pip_trusted_host,
        ),
        "pip install",
    )
    .await?;

    update_status(0.65, "Updating git submodules");
    match tools::require("git") {
        Ok(git) => run_step(&git, &submodule_update_args(), "git submodule update").await?,
        Err(_) => warn!("git not found in PATH, skipping submodule update"),
    }

    update_status(0.75, "Linking model files");
    let entries_linked = link_model_files(&config.model_source, &config.model_dir)?;

    update_status(0.9, "Verifying installation");
    let import_verified = verify_installation(&conda, &config.conda_env, &config.model_dir).await?;
    let (model_files, model_bytes) = model_census(&config.model_dir);

    if import_verified {
        complete_setup();
    }

    Ok(SetupReport {
        env_created,
        entries_linked,
        model_files,
        model_bytes,
        import_verified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_status_tracking() {
        update_status(0.5, "halfway");
        let status = get_setup_status();
        assert_eq!(status.status_message, "halfway");
        assert_eq!(status.progress, 0.5);
        assert!(!status.completed);
    }

    #[test]
    fn test_conda_create_args() {
        assert_eq!(
            conda_create_args("cosyvoice", "3.10"),
            vec!["create", "-n", "cosyvoice", "-y", "python=3.10"]
        );
    }

    #[test]
    fn test_pynini_install_args() {
        assert_eq!(
            pynini_install_args("cosyvoice"),
            vec!["install", "-n", "cosyvoice", "-y", "-c", "conda-forge", "pynini==2.1.5"]
        );
    }

    #[test]
    fn test_pip_install_args() {
        assert_eq!(
            pip_install_args(
                "cosyvoice",
                "https://mirrors.aliyun.com/pypi/simple/",
                "mirrors.aliyun.com"
            ),
            vec![
                "run",
                "-n",
                "cosyvoice",
                "pip",
                "install",
                "-r",
                "requirements.txt",
                "-i",
                "https://mirrors.aliyun.com/pypi/simple/",
                "--trusted-host=mirrors.aliyun.com"
            ]
        );
    }

    #[test]
    fn test_submodule_update_args() {
        assert_eq!(
            submodule_update_args(),
            vec!["submodule", "update", "--init", "--recursive"]
        );
    }

    #[test]
    fn test_import_check_args_shape() {
        let args = import_check_args("cosyvoice");
        assert_eq!(&args[..5], &["run", "-n", "cosyvoice", "python", "-c"]);
        assert!(args[5].contains("from cosyvoice.cli.cosyvoice import CosyVoice2"));
        assert!(args[5].contains("third_party/Matcha-TTS"));
    }

    #[test]
    fn test_env_list_contains() {
        let output = "\
# conda environments:
#
base                  *  /opt/conda
cosyvoice                /opt/conda/envs/cosyvoice
fish-speech              /opt/conda/envs/fish-speech
";
        assert!(env_list_contains(output, "cosyvoice"));
        assert!(env_list_contains(output, "base"));
        assert!(!env_list_contains(output, "cosy"));
        assert!(!env_list_contains(output, "missing"));
    }

    #[test]
    fn test_link_model_files() {
        let source = tempfile::tempdir().unwrap();
        let project = tempfile::tempdir().unwrap();
        let target = project.path().join("pretrained_models/CosyVoice2-0.5B");

        std::fs::write(source.path().join("cosyvoice.yaml"), b"cfg").unwrap();
        std::fs::create_dir(source.path().join("campplus")).unwrap();
        std::fs::write(source.path().join("campplus/model.onnx"), b"onnx").unwrap();

        let linked = link_model_files(source.path(), &target).unwrap();
        assert_eq!(linked, 2);
        assert!(target.join("cosyvoice.yaml").exists());
        assert!(target.join("campplus/model.onnx").exists());

        // Re-linking replaces existing targets instead of failing
        let linked = link_model_files(source.path(), &target).unwrap();
        assert_eq!(linked, 2);
    }

    #[test]
    fn test_link_model_files_empty_source() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        let linked = link_model_files(source.path(), &target.path().join("models")).unwrap();
        assert_eq!(linked, 0);
    }

    #[test]
    fn test_model_census() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), vec![0u8; 10]).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.bin"), vec![0u8; 5]).unwrap();

        let (files, bytes) = model_census(dir.path());
        assert_eq!(files, 2);
        assert_eq!(bytes, 15);
    }
}
