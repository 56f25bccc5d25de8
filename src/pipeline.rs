//! The convert pipeline: metadata → selection → (stage → merge) → output.
//!
//! Every temporary file a request creates is owned by a [`StagedArtifact`].
//! Intermediate artifacts are removed as soon as they are no longer needed;
//! the merged output travels inside the response body and is removed when
//! the body is dropped, whether it was fully sent or the client went away.

use std::{
    io,
    path::PathBuf,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt, future, stream};
use tokio_util::io::ReaderStream;

use crate::{
    error::{ConvertError, classify_upstream_message},
    fetch::{ByteStream, Downloader, stage_pair},
    formats::{EncodingDescriptor, OutputFormat, Selection, select, video_content_type},
    mux::{MERGED_CONTAINER, Muxer},
    provider::{MetadataProvider, VideoMetadata},
    security::sanitize_filename_stem,
    staging::{StagedArtifact, remove_all},
    video_id::VideoId,
};

/// Bytes ready to be sent, plus the headers that describe them.
pub struct OutputStream {
    pub content_type: &'static str,
    pub filename: String,
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("content_type", &self.content_type)
            .field("filename", &self.filename)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Result of metadata lookup plus selection, before any bytes move.
#[derive(Debug, Clone)]
pub struct ConvertPlan {
    pub metadata: VideoMetadata,
    pub selection: Selection,
    pub filename_stem: String,
}

impl ConvertPlan {
    /// The single encoding to hand out when merging is not an option.
    pub fn single_encoding(&self) -> Option<&EncodingDescriptor> {
        match &self.selection {
            Selection::Single(encoding) => Some(encoding),
            Selection::Merge { fallback, .. } => fallback.as_ref(),
        }
    }
}

pub struct ConvertPipeline {
    provider: Arc<dyn MetadataProvider>,
    downloader: Arc<dyn Downloader>,
    muxer: Arc<dyn Muxer>,
    staging_dir: PathBuf,
}

impl ConvertPipeline {
    pub fn new(
        provider: Arc<dyn MetadataProvider>,
        downloader: Arc<dyn Downloader>,
        muxer: Arc<dyn Muxer>,
        staging_dir: PathBuf,
    ) -> Self {
        Self {
            provider,
            downloader,
            muxer,
            staging_dir,
        }
    }

    pub async fn plan(
        &self,
        video_id: &VideoId,
        format: OutputFormat,
        quality: Option<&str>,
    ) -> Result<ConvertPlan, ConvertError> {
        let metadata = self.provider.fetch(video_id).await?;
        let request = format.selection_request(quality);
        let selection = select(&metadata.encodings, request).ok_or(ConvertError::NoMatch)?;
        tracing::info!(
            %video_id,
            provider = self.provider.name(),
            encodings = metadata.encodings.len(),
            ?request,
            selection = %describe(&selection),
            "selected output"
        );
        let filename_stem = sanitize_filename_stem(&metadata.details.title);
        Ok(ConvertPlan {
            metadata,
            selection,
            filename_stem,
        })
    }

    /// Runs the whole pipeline. A failed merge falls back to the plan's
    /// combined encoding when there is one.
    pub async fn convert(
        &self,
        video_id: &VideoId,
        format: OutputFormat,
        quality: Option<&str>,
    ) -> Result<OutputStream, ConvertError> {
        let plan = self.plan(video_id, format, quality).await?;
        match &plan.selection {
            Selection::Single(encoding) => {
                self.stream_single(video_id, encoding, &plan.filename_stem)
                    .await
            }
            Selection::Merge {
                video,
                audio,
                fallback,
            } => match self
                .stream_merged(video_id, video, audio, &plan.filename_stem)
                .await
            {
                Ok(output) => Ok(output),
                Err(err) => {
                    let Some(fallback) = fallback else {
                        tracing::error!(%video_id, error = %err, "merge failed without a combined fallback");
                        return Err(err);
                    };
                    tracing::warn!(
                        %video_id,
                        error = %err,
                        fallback = %fallback.format_id,
                        "merge failed, falling back to combined encoding"
                    );
                    self.stream_single(video_id, fallback, &plan.filename_stem)
                        .await
                }
            },
        }
    }

    async fn stream_single(
        &self,
        video_id: &VideoId,
        encoding: &EncodingDescriptor,
        stem: &str,
    ) -> Result<OutputStream, ConvertError> {
        let (content_type, extension) = encoding.content_type();
        let stream = self.downloader.open(video_id, encoding).await?;
        let body = prime(stream).await?;
        Ok(OutputStream {
            content_type,
            filename: format!("{stem}.{extension}"),
            content_length: None,
            body: log_late_errors(body, video_id.clone()),
        })
    }

    async fn stream_merged(
        &self,
        video_id: &VideoId,
        video: &EncodingDescriptor,
        audio: &EncodingDescriptor,
        stem: &str,
    ) -> Result<OutputStream, ConvertError> {
        let mut pair = stage_pair(
            self.downloader.as_ref(),
            &self.staging_dir,
            video_id,
            video,
            audio,
        )
        .await?;
        let mut merged =
            StagedArtifact::reserve(&self.staging_dir, video_id, "merged", MERGED_CONTAINER);

        tracing::info!(%video_id, muxer = self.muxer.name(), output = %merged.path().display(), "merging streams");
        let merge_result = self
            .muxer
            .merge(pair.video.path(), pair.audio.path(), merged.path())
            .await;
        // Inputs are spent either way.
        remove_all(&mut [&mut pair.video, &mut pair.audio]);
        if let Err(err) = merge_result {
            remove_all(&mut [&mut merged]);
            return Err(err);
        }

        let file = match tokio::fs::File::open(merged.path()).await {
            Ok(file) => file,
            Err(err) => {
                remove_all(&mut [&mut merged]);
                return Err(ConvertError::upstream(format!(
                    "opening merged output: {err}"
                )));
            }
        };
        let content_length = file.metadata().await.ok().map(|meta| meta.len());
        let body: ByteStream = Box::pin(ArtifactStream {
            inner: Box::pin(ReaderStream::new(file)),
            _artifact: merged,
        });
        let (content_type, extension) = video_content_type(MERGED_CONTAINER);
        Ok(OutputStream {
            content_type,
            filename: format!("{stem}.{extension}"),
            content_length,
            body: log_late_errors(body, video_id.clone()),
        })
    }
}

fn describe(selection: &Selection) -> String {
    match selection {
        Selection::Single(encoding) => format!("single:{}", encoding.format_id),
        Selection::Merge { video, audio, .. } => {
            format!("merge:{}+{}", video.format_id, audio.format_id)
        }
    }
}

/// Waits for the first chunk so that failures before any byte is produced
/// can still become a proper error response.
async fn prime(mut stream: ByteStream) -> Result<ByteStream, ConvertError> {
    match stream.next().await {
        Some(Ok(first)) => Ok(Box::pin(stream::once(future::ready(Ok(first))).chain(stream))),
        Some(Err(err)) => Err(classify_upstream_message(&err.to_string())),
        None => Err(ConvertError::upstream("download produced no data")),
    }
}

/// Once headers are out the only thing left to do with an error is log it.
fn log_late_errors(stream: ByteStream, video_id: VideoId) -> ByteStream {
    Box::pin(stream.inspect_err(move |err| {
        tracing::error!(%video_id, error = %err, "stream failed after response started");
    }))
}

/// Keeps a staged artifact alive exactly as long as the body reading it.
struct ArtifactStream {
    inner: ByteStream,
    _artifact: StagedArtifact,
}

impl Stream for ArtifactStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}
