//! Metadata providers: where titles and the list of encodings come from.

use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::{
    error::{ConvertError, classify_upstream_message},
    formats::EncodingDescriptor,
    process::{run_output_with_timeout, stderr_text},
    video_id::VideoId,
};

pub const OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";

/// Body of a successful `/api/info` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub video_id: VideoId,
    pub title: String,
    pub author: String,
    /// Seconds; zero when the provider does not know.
    pub duration: u64,
    pub thumbnail: String,
    pub view_count: u64,
}

#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub details: VideoDetails,
    /// Empty for providers that only know about titles.
    pub encodings: Vec<EncodingDescriptor>,
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Name of the provider (for logging)
    fn name(&self) -> &'static str;

    async fn fetch(&self, video_id: &VideoId) -> Result<VideoMetadata, ConvertError>;
}

pub type SharedProvider = Arc<dyn MetadataProvider>;

fn default_thumbnail(video_id: &VideoId) -> String {
    format!("https://img.youtube.com/vi/{video_id}/maxresdefault.jpg")
}

/// Asks yt-dlp for the full info JSON, including every format.
#[derive(Debug, Clone)]
pub struct YtDlpProvider {
    binary: PathBuf,
    cookies: Option<PathBuf>,
    timeout: Duration,
}

impl YtDlpProvider {
    pub fn new(binary: PathBuf, cookies: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary,
            cookies,
            timeout,
        }
    }
}

#[async_trait]
impl MetadataProvider for YtDlpProvider {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch(&self, video_id: &VideoId) -> Result<VideoMetadata, ConvertError> {
        let mut command = Command::new(&self.binary);
        command
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg("--no-progress")
            .arg("--no-playlist");
        if let Some(cookies) = self.cookies.as_ref().filter(|path| path.exists()) {
            command.arg("--cookies").arg(cookies);
        }
        command.arg(video_id.watch_url());

        let output = run_output_with_timeout(command, "yt-dlp", self.timeout).await?;
        if !output.status.success() {
            let stderr = stderr_text(&output);
            tracing::warn!(%video_id, status = %output.status, %stderr, "yt-dlp metadata lookup failed");
            return Err(classify_upstream_message(&stderr));
        }

        let info: RawInfo = serde_json::from_slice(&output.stdout)
            .map_err(|err| ConvertError::upstream(format!("parsing yt-dlp metadata: {err}")))?;
        Ok(info.into_metadata(video_id))
    }
}

/// Subset of the yt-dlp info JSON this crate reads.
#[derive(Debug, Deserialize)]
struct RawInfo {
    title: Option<String>,
    fulltitle: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    view_count: Option<u64>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
    abr: Option<f32>,
    tbr: Option<f32>,
    url: Option<String>,
}

fn codec_present(codec: Option<&str>) -> bool {
    codec.is_some_and(|value| !value.is_empty() && value != "none")
}

impl RawFormat {
    /// Storyboards and other image tracks are neither audio nor video.
    fn into_descriptor(self) -> Option<EncodingDescriptor> {
        let has_audio = codec_present(self.acodec.as_deref());
        let has_video = codec_present(self.vcodec.as_deref());
        if !has_audio && !has_video {
            return None;
        }
        let audio_bitrate = if has_audio {
            self.abr.or(if has_video { None } else { self.tbr })
        } else {
            None
        };
        Some(EncodingDescriptor {
            format_id: self.format_id,
            container: self.ext.unwrap_or_else(|| "mp4".to_string()),
            has_audio,
            has_video,
            height: if has_video { self.height } else { None },
            audio_bitrate,
            url: self.url,
        })
    }
}

impl RawInfo {
    fn into_metadata(self, video_id: &VideoId) -> VideoMetadata {
        let title = self
            .title
            .or(self.fulltitle)
            .unwrap_or_else(|| "Unknown".to_string());
        let author = self
            .uploader
            .or(self.channel)
            .unwrap_or_else(|| "Unknown".to_string());
        let encodings = self
            .formats
            .into_iter()
            .filter_map(RawFormat::into_descriptor)
            .collect();
        VideoMetadata {
            details: VideoDetails {
                video_id: video_id.clone(),
                title,
                author,
                duration: self.duration.map_or(0, |secs| secs.max(0.0).round() as u64),
                thumbnail: self
                    .thumbnail
                    .unwrap_or_else(|| default_thumbnail(video_id)),
                view_count: self.view_count.unwrap_or(0),
            },
            encodings,
        }
    }
}

/// Title/author lookup through the public embed-info endpoint. Knows nothing
/// about encodings, duration or views.
#[derive(Debug, Clone)]
pub struct OEmbedProvider {
    endpoint: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: Option<String>,
    author_name: Option<String>,
}

impl OEmbedProvider {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    fn lookup_blocking(&self, video_id: &VideoId) -> Result<OEmbedResponse, ConvertError> {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        let watch_url = video_id.watch_url();
        let response = agent
            .get(&self.endpoint)
            .query("url", &watch_url)
            .query("format", "json")
            .call();
        match response {
            Ok(response) => response
                .into_json::<OEmbedResponse>()
                .map_err(|err| ConvertError::upstream(format!("parsing oEmbed response: {err}"))),
            Err(ureq::Error::Status(code, _)) => Err(oembed_status_error(code)),
            Err(err) => Err(ConvertError::upstream(format!("oEmbed request failed: {err}"))),
        }
    }
}

fn oembed_status_error(code: u16) -> ConvertError {
    match code {
        401 | 403 => ConvertError::Forbidden,
        404 => ConvertError::NotFound,
        other => ConvertError::upstream(format!("oEmbed API error: {other}")),
    }
}

#[async_trait]
impl MetadataProvider for OEmbedProvider {
    fn name(&self) -> &'static str {
        "oembed"
    }

    async fn fetch(&self, video_id: &VideoId) -> Result<VideoMetadata, ConvertError> {
        let provider = self.clone();
        let id = video_id.clone();
        let data = tokio::task::spawn_blocking(move || provider.lookup_blocking(&id))
            .await
            .map_err(|err| ConvertError::upstream(format!("oEmbed task failed: {err}")))??;

        Ok(VideoMetadata {
            details: VideoDetails {
                video_id: video_id.clone(),
                title: data.title.unwrap_or_else(|| "Unknown".to_string()),
                author: data.author_name.unwrap_or_else(|| "Unknown".to_string()),
                duration: 0,
                thumbnail: default_thumbnail(video_id),
                view_count: 0,
            },
            encodings: Vec::new(),
        })
    }
}
