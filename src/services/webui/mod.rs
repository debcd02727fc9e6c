// Web UI launch service
// Spawns the bundled third-party web UI and reports when it is reachable
// over HTTP, then blocks until the server process exits.

use log::{debug, info};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as TokioCommand;

use crate::config::LauncherConfig;
use crate::errors::{LauncherError, LauncherResult};
use crate::utils::tools;

const READY_TIMEOUT: Duration = Duration::from_secs(120);
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Build the documented web UI invocation
pub fn webui_invocation_args(
    env: &str,
    webui_entry: &Path,
    port: u16,
    model_dir: &Path,
) -> Vec<String> {
    vec![
        "run".to_string(),
        "-n".to_string(),
        env.to_string(),
        "python".to_string(),
        webui_entry.to_string_lossy().to_string(),
        "--port".to_string(),
        port.to_string(),
        "--model_dir".to_string(),
        model_dir.to_string_lossy().to_string(),
    ]
}

/// Poll the URL until any HTTP response arrives or the timeout elapses.
/// A server that answers at all counts as reachable, whatever the status.
pub async fn wait_until_reachable(url: &str, timeout: Duration, interval: Duration) -> bool {
    let client = reqwest::Client::new();
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if client.get(url).send().await.is_ok() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Launch the web UI and block until the server process exits
pub async fn launch_webui(config: &LauncherConfig) -> LauncherResult<()> {
    if !config.model_dir.exists() {
        return Err(LauncherError::ModelPathMissing(config.model_dir.clone()));
    }

    let conda = tools::require("conda")?;
    let args = webui_invocation_args(
        &config.conda_env,
        &config.webui_entry,
        config.webui_port,
        &config.model_dir,
    );
    let url = format!("http://{}:{}/", config.webui_host, config.webui_port);

    info!("Launching web UI: {} {}", conda.display(), args.join(" "));

    let mut child = TokioCommand::new(&conda)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                debug!("{}", line);
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                debug!("{}", line);
            }
        });
    }

    tokio::select! {
        status = child.wait() => {
            let status = status?;
            return Err(LauncherError::WebUiError(format!(
                "web UI exited before becoming reachable (status {status})"
            )));
        }
        ready = wait_until_reachable(&url, READY_TIMEOUT, POLL_INTERVAL) => {
            if !ready {
                let _ = child.kill().await;
                return Err(LauncherError::WebUiError(format!(
                    "web UI did not answer at {url} within {}s",
                    READY_TIMEOUT.as_secs()
                )));
            }
        }
    }

    info!("Web UI is reachable at {url}");
    println!("Web UI is running at {url} (Ctrl+C to stop)");

    let status = child.wait().await?;
    if !status.success() {
        return Err(LauncherError::WebUiError(format!(
            "web UI exited with status {status}"
        )));
    }

    info!("Web UI shut down cleanly");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_webui_invocation_args() {
        let args = webui_invocation_args(
            "cosyvoice",
            Path::new("webui.py"),
            50000,
            Path::new("pretrained_models/CosyVoice2-0.5B"),
        );
        assert_eq!(
            args,
            vec![
                "run",
                "-n",
                "cosyvoice",
                "python",
                "webui.py",
                "--port",
                "50000",
                "--model_dir",
                "pretrained_models/CosyVoice2-0.5B"
            ]
        );
    }

    #[tokio::test]
    async fn test_wait_until_reachable_success() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
                    .await;
            }
        });

        let url = format!("http://{addr}/");
        let reachable = wait_until_reachable(
            &url,
            Duration::from_secs(5),
            Duration::from_millis(100),
        )
        .await;
        assert!(reachable);
    }

    #[tokio::test]
    async fn test_wait_until_reachable_timeout() {
        // Bind a port to learn a free number, then release it
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{addr}/");
        let reachable = wait_until_reachable(
            &url,
            Duration::from_millis(300),
            Duration::from_millis(100),
        )
        .await;
        assert!(!reachable);
    }
}
