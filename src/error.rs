//! Failure taxonomy shared by every stage of a request.

use axum::http::StatusCode;
use thiserror::Error;

pub const GENERIC_CONVERT_MESSAGE: &str = "Failed to process video. Please try again.";

#[derive(Debug, Error)]
pub enum ConvertError {
    /// Missing or malformed input; the message is shown to the caller.
    #[error("{0}")]
    InvalidInput(String),

    #[error("Video not found")]
    NotFound,

    /// Private, age-gated or sign-in-required videos.
    #[error("This video is private or restricted")]
    Forbidden,

    /// Metadata provider, downloader or remux failure. The detail is logged,
    /// never sent to the caller.
    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("no encoding matches the requested output")]
    NoMatch,

    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl ConvertError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn upstream(detail: impl Into<String>) -> Self {
        Self::Upstream(detail.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Upstream(_) | Self::NoMatch => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Message that is safe to put in the JSON error body.
    pub fn public_message(&self) -> String {
        match self {
            Self::Upstream(_) | Self::NoMatch => GENERIC_CONVERT_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// Classifies yt-dlp style diagnostics. Anything unrecognised is an upstream
/// failure carrying the first meaningful line.
pub fn classify_upstream_message(message: &str) -> ConvertError {
    let lower = message.to_ascii_lowercase();

    // A missing format is a selection problem, not a missing video.
    if lower.contains("requested format is not available") {
        return upstream_first_line(message);
    }

    // Media downloads also fail with HTTP 403 when throttled, so only
    // video-level wording counts as restricted.
    if lower.contains("private video")
        || lower.contains("sign in to confirm")
        || lower.contains("age-restricted")
        || lower.contains("members-only")
        || lower.contains("join this channel")
    {
        return ConvertError::Forbidden;
    }

    if lower.contains("video unavailable")
        || lower.contains("this video is not available")
        || lower.contains("has been removed")
        || lower.contains("does not exist")
        || lower.contains("http error 404")
    {
        return ConvertError::NotFound;
    }

    upstream_first_line(message)
}

fn upstream_first_line(message: &str) -> ConvertError {
    let first_line = message
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("unknown error");
    ConvertError::Upstream(first_line.to_string())
}
