//! Encoding descriptors and the decision of which one(s) to deliver.

use serde::{Deserialize, Serialize};

/// Combined streams below this height are considered low quality when the
/// caller asked for at least this much.
pub const HIGH_QUALITY_HEIGHT: u32 = 720;
pub const DEFAULT_MAX_HEIGHT: u32 = 720;

/// One retrievable variant of a video as reported by the metadata provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingDescriptor {
    /// Provider-specific identifier used to fetch the bytes.
    pub format_id: String,
    /// Container extension, e.g. `mp4`, `m4a`, `webm`.
    pub container: String,
    pub has_audio: bool,
    pub has_video: bool,
    pub height: Option<u32>,
    /// Audio bitrate in kbps.
    pub audio_bitrate: Option<f32>,
    /// Direct media URL when the provider exposes one.
    pub url: Option<String>,
}

impl EncodingDescriptor {
    pub fn is_combined(&self) -> bool {
        self.has_audio && self.has_video
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio && !self.has_video
    }

    pub fn is_video_only(&self) -> bool {
        self.has_video && !self.has_audio
    }

    fn height_or_zero(&self) -> u32 {
        self.height.unwrap_or(0)
    }

    fn bitrate_or_zero(&self) -> f32 {
        self.audio_bitrate.unwrap_or(0.0)
    }

    /// MIME type and file extension used when this encoding is delivered as-is.
    pub fn content_type(&self) -> (&'static str, &'static str) {
        if self.has_video {
            video_content_type(&self.container)
        } else {
            audio_content_type(&self.container)
        }
    }
}

/// Output requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRequest {
    AudioOnly,
    Combined { max_height: u32 },
}

/// The chosen delivery plan.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Deliver one encoding unchanged.
    Single(EncodingDescriptor),
    /// Fetch both streams and multiplex them. `fallback` is the combined
    /// encoding to deliver if the merge cannot complete.
    Merge {
        video: EncodingDescriptor,
        audio: EncodingDescriptor,
        fallback: Option<EncodingDescriptor>,
    },
}

/// Output kind named by the `format` field of a convert request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Mp3,
    Mp4,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mp3" | "audio" => Some(Self::Mp3),
            "mp4" | "video" => Some(Self::Mp4),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Mp4 => "mp4",
        }
    }

    /// Builds the selector request. Video quality accepts `720`, `720p`,
    /// `best`/`highest`; anything else falls back to 720 lines. Audio quality
    /// does not constrain the choice.
    pub fn selection_request(self, quality: Option<&str>) -> SelectionRequest {
        match self {
            Self::Mp3 => SelectionRequest::AudioOnly,
            Self::Mp4 => SelectionRequest::Combined {
                max_height: parse_max_height(quality),
            },
        }
    }
}

fn parse_max_height(quality: Option<&str>) -> u32 {
    let Some(raw) = quality.map(|value| value.trim().to_ascii_lowercase()) else {
        return DEFAULT_MAX_HEIGHT;
    };
    if raw == "best" || raw == "highest" {
        return u32::MAX;
    }
    raw.strip_suffix('p')
        .unwrap_or(&raw)
        .parse::<u32>()
        .ok()
        .filter(|height| *height > 0)
        .unwrap_or(DEFAULT_MAX_HEIGHT)
}

/// Picks the encoding(s) to deliver, or `None` when nothing fits.
///
/// Audio: the highest-bitrate audio-only encoding. Combined: the best combined
/// encoding at or below the ceiling; a video-only + audio-only pair when that
/// pair beats a sub-720 combined result and the ceiling is at least 720; the
/// best combined encoding regardless of ceiling; a separate pair when no
/// combined encoding exists; otherwise nothing. Ties keep
/// the first encoding encountered.
pub fn select(encodings: &[EncodingDescriptor], request: SelectionRequest) -> Option<Selection> {
    match request {
        SelectionRequest::AudioOnly => best_audio(encodings).cloned().map(Selection::Single),
        SelectionRequest::Combined { max_height } => select_combined(encodings, max_height),
    }
}

fn select_combined(encodings: &[EncodingDescriptor], max_height: u32) -> Option<Selection> {
    let best_within = first_max_by(
        encodings
            .iter()
            .filter(|e| e.is_combined() && e.height_or_zero() <= max_height),
        |e| e.height_or_zero() as f32,
    );
    let best_overall = first_max_by(encodings.iter().filter(|e| e.is_combined()), |e| {
        e.height_or_zero() as f32
    });

    let within_height = best_within.map_or(0, EncodingDescriptor::height_or_zero);
    if max_height >= HIGH_QUALITY_HEIGHT && within_height < HIGH_QUALITY_HEIGHT {
        let video = first_max_by(
            encodings
                .iter()
                .filter(|e| e.is_video_only() && e.height_or_zero() <= max_height),
            |e| e.height_or_zero() as f32,
        );
        if let (Some(video), Some(audio)) = (video, best_audio(encodings))
            && (best_within.is_none() || video.height_or_zero() > within_height)
        {
            return Some(Selection::Merge {
                video: video.clone(),
                audio: audio.clone(),
                fallback: best_within.or(best_overall).cloned(),
            });
        }
    }

    if let Some(combined) = best_within.or(best_overall) {
        return Some(Selection::Single(combined.clone()));
    }

    // No combined encoding at all: a separate pair is the only way out.
    let video = first_max_by(
        encodings
            .iter()
            .filter(|e| e.is_video_only() && e.height_or_zero() <= max_height),
        |e| e.height_or_zero() as f32,
    )
    .or_else(|| {
        first_max_by(encodings.iter().filter(|e| e.is_video_only()), |e| {
            e.height_or_zero() as f32
        })
    })?;
    let audio = best_audio(encodings)?;
    Some(Selection::Merge {
        video: video.clone(),
        audio: audio.clone(),
        fallback: None,
    })
}

fn best_audio(encodings: &[EncodingDescriptor]) -> Option<&EncodingDescriptor> {
    first_max_by(
        encodings.iter().filter(|e| e.is_audio_only()),
        EncodingDescriptor::bitrate_or_zero,
    )
}

/// Like `Iterator::max_by_key` but keeps the earliest element on ties.
fn first_max_by<'a, I, F>(iter: I, key: F) -> Option<&'a EncodingDescriptor>
where
    I: Iterator<Item = &'a EncodingDescriptor>,
    F: Fn(&EncodingDescriptor) -> f32,
{
    iter.fold(None, |best, candidate| match best {
        Some(current) if key(candidate) <= key(current) => Some(current),
        _ => Some(candidate),
    })
}

/// MIME type and extension for a video container.
pub fn video_content_type(container: &str) -> (&'static str, &'static str) {
    match container {
        "webm" => ("video/webm", "webm"),
        "mkv" => ("video/x-matroska", "mkv"),
        "3gp" => ("video/3gpp", "3gp"),
        _ => ("video/mp4", "mp4"),
    }
}

/// MIME type and extension for an audio-only container.
pub fn audio_content_type(container: &str) -> (&'static str, &'static str) {
    match container {
        "mp3" => ("audio/mpeg", "mp3"),
        "webm" | "weba" => ("audio/webm", "webm"),
        "opus" => ("audio/ogg", "opus"),
        "ogg" => ("audio/ogg", "ogg"),
        _ => ("audio/mp4", "m4a"),
    }
}
