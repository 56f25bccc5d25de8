//! Runs external tools (yt-dlp, ffmpeg) with captured output and a deadline.

use std::{process::Output, time::Duration};

use tokio::{process::Command, time::timeout};

use crate::error::ConvertError;

/// Runs `command` to completion and returns its captured output. The child
/// is killed when the deadline passes or the caller is dropped.
pub async fn run_output_with_timeout(
    mut command: Command,
    label: &str,
    limit: Duration,
) -> Result<Output, ConvertError> {
    command.kill_on_drop(true);
    let child = command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|err| ConvertError::upstream(format!("failed to start {label}: {err}")))?;

    match timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(ConvertError::upstream(format!(
            "failed to wait for {label}: {err}"
        ))),
        Err(_) => Err(ConvertError::upstream(format!(
            "{label} timed out after {}s",
            limit.as_secs()
        ))),
    }
}

/// Trimmed stderr for logs and classification.
pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}
