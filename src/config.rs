#![forbid(unsafe_code)]

//! Runtime settings: `.env` file, process environment and CLI overrides.
//!
//! Precedence per key is override > environment > `.env` file > default.

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    net::IpAddr,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_YT_DLP_BIN: &str = "yt-dlp";
pub const DEFAULT_FFMPEG_BIN: &str = "ffmpeg";
pub const DEFAULT_MERGE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 900;
pub const DEFAULT_METADATA_TIMEOUT_SECS: u64 = 60;

/// What `/api/convert` answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertMode {
    /// Binary body produced by the convert pipeline.
    Stream,
    /// JSON with a direct media URL.
    Link,
    /// JSON with third-party converter links; never contacts the video host.
    Services,
}

impl ConvertMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stream" | "direct" => Some(Self::Stream),
            "link" | "url" => Some(Self::Link),
            "services" | "redirect" => Some(Self::Services),
            _ => None,
        }
    }
}

/// Which provider answers `/api/info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoSource {
    YtDlp,
    OEmbed,
}

impl InfoSource {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ytdlp" | "yt-dlp" => Some(Self::YtDlp),
            "oembed" => Some(Self::OEmbed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: IpAddr,
    pub port: u16,
    pub www_root: Option<PathBuf>,
    pub yt_dlp_bin: PathBuf,
    pub ffmpeg_bin: PathBuf,
    pub temp_dir: PathBuf,
    pub cookies_file: Option<PathBuf>,
    pub convert_mode: ConvertMode,
    pub info_source: InfoSource,
    pub merge_timeout: Duration,
    pub fetch_timeout: Duration,
    pub metadata_timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub www_root: Option<PathBuf>,
    pub convert_mode: Option<ConvertMode>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let env_path = overrides
        .env_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(&env_path)?;
    build_settings(&file_vars, env_var_string, overrides)
}

fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Result<Settings> {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);

    let host = match overrides.host {
        Some(host) => host,
        None => {
            let raw = lookup("TUBEGRAB_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
            parse_host(&raw)?
        }
    };
    let port = overrides
        .port
        .or_else(|| lookup("TUBEGRAB_PORT").and_then(|value| value.parse::<u16>().ok()))
        .unwrap_or(DEFAULT_PORT);
    let www_root = overrides
        .www_root
        .or_else(|| lookup("WWW_ROOT").map(PathBuf::from));
    let convert_mode = overrides
        .convert_mode
        .or_else(|| lookup("CONVERT_MODE").and_then(|value| parse_or_warn("CONVERT_MODE", &value, ConvertMode::parse)))
        .unwrap_or(ConvertMode::Stream);
    let info_source = lookup("INFO_PROVIDER")
        .and_then(|value| parse_or_warn("INFO_PROVIDER", &value, InfoSource::parse))
        .unwrap_or(InfoSource::YtDlp);

    Ok(Settings {
        host,
        port,
        www_root,
        yt_dlp_bin: lookup("YT_DLP_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_YT_DLP_BIN)),
        ffmpeg_bin: lookup("FFMPEG_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG_BIN)),
        temp_dir: lookup("TUBEGRAB_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir),
        cookies_file: lookup("COOKIES_FILE").map(PathBuf::from),
        convert_mode,
        info_source,
        merge_timeout: seconds(lookup("MERGE_TIMEOUT_SECS"), DEFAULT_MERGE_TIMEOUT_SECS),
        fetch_timeout: seconds(lookup("FETCH_TIMEOUT_SECS"), DEFAULT_FETCH_TIMEOUT_SECS),
        metadata_timeout: seconds(
            lookup("METADATA_TIMEOUT_SECS"),
            DEFAULT_METADATA_TIMEOUT_SECS,
        ),
    })
}

pub fn parse_host(value: &str) -> Result<IpAddr> {
    value
        .trim()
        .parse::<IpAddr>()
        .with_context(|| format!("expected a valid IPv4 or IPv6 address, got {value:?}"))
}

fn parse_or_warn<T>(key: &str, value: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
    let parsed = parse(value);
    if parsed.is_none() {
        tracing::warn!(key, value, "ignoring unrecognised setting");
    }
    parsed
}

fn seconds(value: Option<String>, default: u64) -> Duration {
    let secs = value
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(default);
    Duration::from_secs(secs)
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(non_blank)
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned().and_then(non_blank))
}

/// Parses a dotenv-style file. A missing file yields no values.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        vars.insert(key.to_string(), unquote(value_raw.trim()).to_string());
    }
    Ok(vars)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .or_else(|| {
            value
                .strip_prefix('\'')
                .and_then(|inner| inner.strip_suffix('\''))
        })
        .unwrap_or(value)
}

/// Makes sure the staging directory exists and is a directory.
pub fn prepare_temp_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("Creating {}", path.display()))?;
    if !path.is_dir() {
        return Err(anyhow!("{} is not a directory", path.display()));
    }
    Ok(())
}
