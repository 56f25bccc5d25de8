//! Multiplexing separately fetched video and audio into one container.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use tokio::process::Command;

use crate::{
    error::ConvertError,
    process::{run_output_with_timeout, stderr_text},
};

/// Container produced by every muxer.
pub const MERGED_CONTAINER: &str = "mp4";

#[async_trait]
pub trait Muxer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Combines `video` and `audio` into `output`. `output` may be left
    /// partially written on failure.
    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), ConvertError>;
}

/// Copies the video stream untouched and encodes audio to AAC.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    binary: PathBuf,
    timeout: Duration,
}

impl FfmpegMuxer {
    pub fn new(binary: PathBuf, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    fn build_args(video: &Path, audio: &Path, output: &Path) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostdin",
            "-y",
            "-i",
        ]
        .into_iter()
        .map(Into::into)
        .collect();
        args.push(video.as_os_str().to_owned());
        args.push("-i".into());
        args.push(audio.as_os_str().to_owned());
        args.extend(
            [
                "-map",
                "0:v:0",
                "-map",
                "1:a:0",
                "-c:v",
                "copy",
                "-c:a",
                "aac",
                "-b:a",
                "192k",
                "-movflags",
                "+faststart",
                "-f",
                MERGED_CONTAINER,
            ]
            .into_iter()
            .map(Into::into),
        );
        args.push(output.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), ConvertError> {
        let mut command = Command::new(&self.binary);
        command.args(Self::build_args(video, audio, output));

        let result = run_output_with_timeout(command, "ffmpeg", self.timeout).await?;
        if !result.status.success() {
            let stderr = stderr_text(&result);
            return Err(ConvertError::upstream(describe_failure(
                result.status.code(),
                &stderr,
            )));
        }
        Ok(())
    }
}

/// Short summary of an ffmpeg failure. 255 is what ffmpeg exits with when
/// interrupted.
fn describe_failure(exit_code: Option<i32>, stderr: &str) -> String {
    let summary = match exit_code {
        Some(255) => "ffmpeg was stopped".to_string(),
        Some(code) => format!("ffmpeg failed (exit code {code})"),
        None => "ffmpeg was terminated by a signal".to_string(),
    };
    match stderr.lines().map(str::trim).find(|line| !line.is_empty()) {
        Some(line) => format!("{summary}: {line}"),
        None => summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn args_copy_video_and_encode_audio() {
        let args = FfmpegMuxer::build_args(
            Path::new("/tmp/v.mp4"),
            Path::new("/tmp/a.m4a"),
            Path::new("/tmp/out.mp4"),
        );
        let args: Vec<String> = args
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let joined = args.join(" ");
        assert!(joined.contains("-i /tmp/v.mp4 -i /tmp/a.m4a"));
        assert!(joined.contains("-c:v copy"));
        assert!(joined.contains("-c:a aac"));
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
    }

    #[test]
    fn failure_description_keeps_first_stderr_line() {
        assert_eq!(
            describe_failure(Some(1), "\nInvalid data found when processing input\nmore"),
            "ffmpeg failed (exit code 1): Invalid data found when processing input"
        );
        assert_eq!(describe_failure(Some(255), ""), "ffmpeg was stopped");
        assert_eq!(describe_failure(None, ""), "ffmpeg was terminated by a signal");
    }

    #[cfg(unix)]
    fn install_stub(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("ffmpeg");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn ffmpeg_stub_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        // The output path is always the last argument.
        let stub = install_stub(
            dir.path(),
            r#"for last; do :; done; printf merged > "$last""#,
        );
        let muxer = FfmpegMuxer::new(stub, Duration::from_secs(5));
        let output = dir.path().join("out.mp4");
        muxer
            .merge(&dir.path().join("v"), &dir.path().join("a"), &output)
            .await
            .unwrap();
        assert_eq!(fs::read(&output).unwrap(), b"merged");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn ffmpeg_failure_is_upstream_error() {
        let dir = tempfile::tempdir().unwrap();
        let stub = install_stub(dir.path(), "echo 'moov atom not found' >&2\nexit 1");
        let muxer = FfmpegMuxer::new(stub, Duration::from_secs(5));
        let err = muxer
            .merge(
                &dir.path().join("v"),
                &dir.path().join("a"),
                &dir.path().join("o"),
            )
            .await
            .unwrap_err();
        match err {
            ConvertError::Upstream(detail) => {
                assert!(detail.contains("moov atom not found"), "{detail}")
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
