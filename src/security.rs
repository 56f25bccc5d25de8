#![forbid(unsafe_code)]

//! Process and header hygiene for the backend.

use anyhow::{Result, bail};
use nix::unistd::Uid;

/// Longest filename stem placed in a `Content-Disposition` header.
pub const MAX_FILENAME_STEM: usize = 100;
const FALLBACK_STEM: &str = "video";

/// Fails fast when the backend is started as root. The server spawns yt-dlp
/// and ffmpeg on behalf of remote callers, so it must run unprivileged.
pub fn ensure_not_root(process: &str) -> Result<()> {
    ensure_not_root_for(Uid::current(), process)
}

fn ensure_not_root_for(uid: Uid, process: &str) -> Result<()> {
    if uid.is_root() {
        bail!(
            "{process} must not be run as root; use a regular user or a dedicated service account"
        );
    }
    Ok(())
}

/// Turns a video title into a filename stem that is safe inside a quoted
/// header value: ASCII word characters, spaces and hyphens survive, runs of
/// whitespace become a single underscore, and the result is capped.
pub fn sanitize_filename_stem(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    let joined = kept.split_whitespace().collect::<Vec<_>>().join("_");
    let capped: String = joined.chars().take(MAX_FILENAME_STEM).collect();
    if capped.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        capped
    }
}
