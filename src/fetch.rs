//! Retrieval of encoding bytes, either streamed or staged on disk.

use std::{
    io,
    path::{Path, PathBuf},
    pin::Pin,
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, future, stream};
use tokio::{
    io::AsyncReadExt,
    process::{Child, Command},
    task::JoinHandle,
};
use tokio_util::io::ReaderStream;

use crate::{
    error::{ConvertError, classify_upstream_message},
    formats::EncodingDescriptor,
    process::{run_output_with_timeout, stderr_text},
    staging::{StagedArtifact, remove_all},
    video_id::VideoId,
};

pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

#[async_trait]
pub trait Downloader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Streams one encoding. Failures that happen after the first chunk show
    /// up as an error item at the end of the stream.
    async fn open(
        &self,
        video_id: &VideoId,
        encoding: &EncodingDescriptor,
    ) -> Result<ByteStream, ConvertError>;

    /// Writes one encoding to `destination`, which may be left partially
    /// written on failure.
    async fn fetch_to(
        &self,
        video_id: &VideoId,
        encoding: &EncodingDescriptor,
        destination: &Path,
    ) -> Result<(), ConvertError>;
}

/// Downloads through yt-dlp so signature deciphering and throttling
/// workarounds stay yt-dlp's problem.
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    binary: PathBuf,
    cookies: Option<PathBuf>,
    timeout: Duration,
}

impl YtDlpDownloader {
    pub fn new(binary: PathBuf, cookies: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary,
            cookies,
            timeout,
        }
    }

    fn base_command(&self, encoding: &EncodingDescriptor) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("--format")
            .arg(&encoding.format_id)
            .arg("--no-part")
            .arg("--no-playlist")
            .arg("--no-progress")
            .arg("--no-warnings")
            .arg("--quiet");
        if let Some(cookies) = self.cookies.as_ref().filter(|path| path.exists()) {
            command.arg("--cookies").arg(cookies);
        }
        command
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn open(
        &self,
        video_id: &VideoId,
        encoding: &EncodingDescriptor,
    ) -> Result<ByteStream, ConvertError> {
        let mut command = self.base_command(encoding);
        command
            .arg("--output")
            .arg("-")
            .arg(video_id.watch_url())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|err| ConvertError::upstream(format!("failed to start yt-dlp: {err}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConvertError::upstream("failed to capture yt-dlp stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConvertError::upstream("failed to capture yt-dlp stderr"))?;

        // Drain stderr concurrently so a chatty child never blocks on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let exit = stream::once(wait_for_exit(
            child,
            stderr_task,
            encoding.format_id.clone(),
        ))
        .filter_map(future::ready);

        Ok(Box::pin(ReaderStream::new(stdout).chain(exit)))
    }

    async fn fetch_to(
        &self,
        video_id: &VideoId,
        encoding: &EncodingDescriptor,
        destination: &Path,
    ) -> Result<(), ConvertError> {
        let mut command = self.base_command(encoding);
        command
            .arg("--force-overwrites")
            .arg("--output")
            .arg(destination)
            .arg(video_id.watch_url());

        let output = run_output_with_timeout(command, "yt-dlp", self.timeout).await?;
        if !output.status.success() {
            let stderr = stderr_text(&output);
            tracing::warn!(%video_id, format_id = %encoding.format_id, status = %output.status, %stderr, "yt-dlp fetch failed");
            return Err(classify_upstream_message(&stderr));
        }
        if !destination.exists() {
            return Err(ConvertError::upstream(format!(
                "yt-dlp reported success but {} is missing",
                destination.display()
            )));
        }
        Ok(())
    }
}

/// Final item of a streamed download: nothing on a clean exit, an error
/// carrying yt-dlp's diagnostics otherwise.
async fn wait_for_exit(
    mut child: Child,
    stderr_task: JoinHandle<String>,
    format_id: String,
) -> Option<io::Result<Bytes>> {
    let status = match child.wait().await {
        Ok(status) => status,
        Err(err) => return Some(Err(err)),
    };
    if status.success() {
        return None;
    }
    let stderr = stderr_task.await.unwrap_or_default();
    Some(Err(io::Error::other(format!(
        "yt-dlp exited with {status} for format {format_id}: {}",
        stderr.trim()
    ))))
}

/// Video and audio streams fetched side by side for one request.
#[derive(Debug)]
pub struct StagedPair {
    pub video: StagedArtifact,
    pub audio: StagedArtifact,
}

/// Fetches both encodings concurrently. Both fetches always run to
/// completion; if either fails, both artifacts are removed before the first
/// error is returned.
pub async fn stage_pair(
    downloader: &dyn Downloader,
    staging_dir: &Path,
    video_id: &VideoId,
    video: &EncodingDescriptor,
    audio: &EncodingDescriptor,
) -> Result<StagedPair, ConvertError> {
    let mut video_artifact =
        StagedArtifact::reserve(staging_dir, video_id, "video", &video.container);
    let mut audio_artifact =
        StagedArtifact::reserve(staging_dir, video_id, "audio", &audio.container);

    tracing::info!(
        %video_id,
        video_format = %video.format_id,
        audio_format = %audio.format_id,
        "staging separate streams"
    );
    let (video_result, audio_result) = tokio::join!(
        downloader.fetch_to(video_id, video, video_artifact.path()),
        downloader.fetch_to(video_id, audio, audio_artifact.path()),
    );

    if let Err(err) = video_result.and(audio_result) {
        remove_all(&mut [&mut video_artifact, &mut audio_artifact]);
        return Err(err);
    }

    Ok(StagedPair {
        video: video_artifact,
        audio: audio_artifact,
    })
}
