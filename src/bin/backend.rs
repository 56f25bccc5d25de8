#![forbid(unsafe_code)]

//! HTTP backend: `/api/info`, `/api/convert` and the static front end.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tubegrab::{
    config::{ConvertMode, SettingsOverrides, prepare_temp_dir, resolve_settings},
    security::ensure_not_root,
    server::{AppState, router},
};

const DEFAULT_LOG_FILTER: &str = "tubegrab=info,tower_http=info";

#[derive(Debug, Parser)]
#[command(name = "backend", about = "Video info and conversion API")]
struct BackendArgs {
    /// Address to listen on (overrides TUBEGRAB_HOST)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on (overrides TUBEGRAB_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Directory holding index.html and the browser assets
    #[arg(long)]
    www_root: Option<PathBuf>,

    /// Dotenv-style settings file
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// stream, link or services
    #[arg(long, value_parser = parse_mode_arg)]
    mode: Option<ConvertMode>,
}

impl BackendArgs {
    fn into_overrides(self) -> SettingsOverrides {
        SettingsOverrides {
            host: self.host,
            port: self.port,
            www_root: self.www_root,
            convert_mode: self.mode,
            env_path: self.env_file,
        }
    }
}

fn parse_mode_arg(value: &str) -> Result<ConvertMode> {
    ConvertMode::parse(value).ok_or_else(|| anyhow!("expected stream, link or services"))
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = BackendArgs::parse();
    init_tracing();
    ensure_not_root("backend")?;

    let settings = resolve_settings(args.into_overrides())?;
    prepare_temp_dir(&settings.temp_dir)?;
    if let Some(root) = &settings.www_root
        && !root.join("index.html").is_file()
    {
        tracing::warn!(www_root = %root.display(), "index.html not found; the front end will 404");
    }

    let app = router(AppState::from_settings(&settings));

    let addr = SocketAddr::new(settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!(
        %addr,
        mode = ?settings.convert_mode,
        info = ?settings.info_source,
        temp_dir = %settings.temp_dir.display(),
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    // Only graceful shutdown depends on this; Ctrl+C still terminates.
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
    }
}
