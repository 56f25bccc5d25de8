//! Normalizes the many shapes of a YouTube link into the 11-character video
//! identifier every other stage keys on.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::Serialize;
use url::Url;

/// Path-style links are tried first, in this order.
static PATH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/)([A-Za-z0-9_-]{11})",
    )
    .expect("path pattern compiles")
});

static BARE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("bare pattern compiles"));

/// Canonical identifier of a single video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Watch page URL handed to yt-dlp and the embed-info endpoint.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracts the video identifier from `input`, or `None` when no supported
/// shape matches. Never touches the network.
pub fn extract(input: &str) -> Option<VideoId> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Some(captures) = PATH_PATTERN.captures(input) {
        return Some(VideoId(captures[1].to_string()));
    }

    if BARE_PATTERN.is_match(input) {
        return Some(VideoId(input.to_string()));
    }

    // Query parameter anywhere in the URL, e.g. `watch?feature=share&v=...`.
    let parsed = Url::parse(input).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.into_owned())
        .filter(|value| BARE_PATTERN.is_match(value))
        .map(VideoId)
}
