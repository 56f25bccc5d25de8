//! HTTP surface: `/api/info`, `/api/convert` and the static site.
//!
//! Every failure that happens before response headers are sent becomes one
//! JSON `{"error": ...}` body. Once a binary body is streaming, errors are
//! only logged (see the pipeline).

use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use mime_guess::MimeGuess;
use serde::Serialize;
use serde_json::Value;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::{ConvertMode, InfoSource, Settings},
    error::ConvertError,
    fetch::YtDlpDownloader,
    formats::OutputFormat,
    mux::FfmpegMuxer,
    pipeline::{ConvertPipeline, OutputStream},
    provider::{OEMBED_ENDPOINT, OEmbedProvider, SharedProvider, VideoDetails, YtDlpProvider},
    redirect::services_response,
    video_id::{self, VideoId},
};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<ConvertPipeline>,
    info_provider: SharedProvider,
    mode: ConvertMode,
    www_root: Option<Arc<PathBuf>>,
}

impl AppState {
    pub fn new(
        pipeline: ConvertPipeline,
        info_provider: SharedProvider,
        mode: ConvertMode,
        www_root: Option<PathBuf>,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            info_provider,
            mode,
            www_root: www_root.map(Arc::new),
        }
    }

    /// Wires the yt-dlp and ffmpeg backed implementations.
    pub fn from_settings(settings: &Settings) -> Self {
        let ytdlp: SharedProvider = Arc::new(YtDlpProvider::new(
            settings.yt_dlp_bin.clone(),
            settings.cookies_file.clone(),
            settings.metadata_timeout,
        ));
        let info_provider: SharedProvider = match settings.info_source {
            InfoSource::YtDlp => ytdlp.clone(),
            InfoSource::OEmbed => Arc::new(OEmbedProvider::new(
                OEMBED_ENDPOINT,
                settings.metadata_timeout,
            )),
        };
        let downloader = Arc::new(YtDlpDownloader::new(
            settings.yt_dlp_bin.clone(),
            settings.cookies_file.clone(),
            settings.fetch_timeout,
        ));
        let muxer = Arc::new(FfmpegMuxer::new(
            settings.ffmpeg_bin.clone(),
            settings.merge_timeout,
        ));
        let pipeline = ConvertPipeline::new(ytdlp, downloader, muxer, settings.temp_dir.clone());
        Self::new(
            pipeline,
            info_provider,
            settings.convert_mode,
            settings.www_root.clone(),
        )
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ConvertError> for ApiError {
    fn from(err: ConvertError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        } else {
            tracing::info!(%status, error = %err, "request rejected");
        }
        Self {
            status,
            message: err.public_message(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, headers, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Request body shared by both endpoints. Each field is read on its own, so
/// a badly typed `format` does not hide a valid `url`. A body that is not
/// JSON at all is treated as an empty object.
#[derive(Debug, Default)]
struct RequestBody {
    url: Option<String>,
    format: Option<Value>,
    quality: Option<Value>,
}

impl RequestBody {
    fn parse(raw: &[u8]) -> Self {
        let Ok(Value::Object(mut fields)) = serde_json::from_slice::<Value>(raw) else {
            return Self::default();
        };
        let url = match fields.remove("url") {
            Some(Value::String(url)) => Some(url),
            _ => None,
        };
        Self {
            url,
            format: fields.remove("format").filter(|format| !format.is_null()),
            quality: fields.remove("quality"),
        }
    }

    fn video_id(&self) -> Result<VideoId, ConvertError> {
        let url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConvertError::invalid("URL is required"))?;
        video_id::extract(url).ok_or_else(|| ConvertError::invalid("Invalid YouTube URL"))
    }

    fn output_format(&self) -> Result<OutputFormat, ConvertError> {
        match &self.format {
            None => Ok(OutputFormat::Mp4),
            Some(Value::String(raw)) => {
                OutputFormat::parse(raw).ok_or_else(|| ConvertError::invalid("Unsupported format"))
            }
            Some(_) => Err(ConvertError::invalid("Unsupported format")),
        }
    }

    /// Clients send either `"720p"` or `720`.
    fn quality(&self) -> Option<String> {
        match self.quality.as_ref()? {
            Value::String(quality) => Some(quality.clone()),
            Value::Number(quality) => Some(quality.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkResponse {
    success: bool,
    download_url: String,
    filename: String,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(
            "/api/info",
            post(video_info)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/convert",
            post(convert)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .fallback(static_fallback)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> ApiError {
    ConvertError::MethodNotAllowed.into()
}

async fn video_info(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<VideoDetails>> {
    let request = RequestBody::parse(&body);
    let video_id = request.video_id()?;
    tracing::info!(%video_id, provider = state.info_provider.name(), "info request");
    let metadata = state.info_provider.fetch(&video_id).await?;
    Ok(Json(metadata.details))
}

async fn convert(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request = RequestBody::parse(&body);
    let video_id = request.video_id()?;
    let format = request.output_format()?;
    let quality = request.quality();
    tracing::info!(
        %video_id,
        format = format.as_str(),
        quality = quality.as_deref().unwrap_or("default"),
        mode = ?state.mode,
        "convert request"
    );

    match state.mode {
        ConvertMode::Services => Ok(Json(services_response(&video_id, format)).into_response()),
        ConvertMode::Link => {
            let link = direct_link(&state, &video_id, format, quality.as_deref()).await?;
            Ok(Json(link).into_response())
        }
        ConvertMode::Stream => {
            let output = state
                .pipeline
                .convert(&video_id, format, quality.as_deref())
                .await?;
            attachment_response(output)
        }
    }
}

async fn direct_link(
    state: &AppState,
    video_id: &VideoId,
    format: OutputFormat,
    quality: Option<&str>,
) -> Result<LinkResponse, ConvertError> {
    let plan = state.pipeline.plan(video_id, format, quality).await?;
    let encoding = plan
        .single_encoding()
        .ok_or_else(|| ConvertError::upstream("selection needs a merge; no direct link"))?;
    let download_url = encoding
        .url
        .clone()
        .ok_or_else(|| ConvertError::upstream(format!("format {} has no url", encoding.format_id)))?;
    let (_, extension) = encoding.content_type();
    Ok(LinkResponse {
        success: true,
        download_url,
        filename: format!("{}.{extension}", plan.filename_stem),
    })
}

fn attachment_response(output: OutputStream) -> ApiResult<Response> {
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        output.filename
    ))
    .map_err(|err| ApiError::internal(format!("invalid filename header: {err}")))?;

    let mut response = Body::from_stream(output.body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(output.content_type),
    );
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    if let Some(length) = output.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    Ok(response)
}

async fn static_fallback(State(state): State<AppState>, req: Request<Body>) -> Response {
    let path = req.uri().path();
    if path == "/api" || path.starts_with("/api/") {
        return ApiError::not_found("endpoint not found").into_response();
    }
    let Some(root) = state.www_root.as_deref() else {
        return ApiError::not_found("file not found").into_response();
    };

    match serve_www_path(root, path).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn serve_www_path(root: &Path, request_path: &str) -> ApiResult<Response> {
    let target = resolve_www_path(root, request_path)?;
    match tokio::fs::metadata(&target).await {
        Ok(meta) if meta.is_dir() => stream_file(root.join("index.html")).await,
        Ok(_) => stream_file(target).await,
        Err(_) if should_fallback_to_index(request_path) => {
            stream_file(root.join("index.html")).await
        }
        Err(_) => Err(ApiError::not_found("file not found")),
    }
}

fn resolve_www_path(root: &Path, request_path: &str) -> ApiResult<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Ok(root.join("index.html"));
    }
    let candidate = Path::new(trimmed);
    if candidate
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return Err(ApiError::not_found("file not found"));
    }
    Ok(root.join(candidate))
}

// Client-side routes have no extension.
fn should_fallback_to_index(request_path: &str) -> bool {
    Path::new(request_path.trim_start_matches('/'))
        .extension()
        .is_none()
}

async fn stream_file(path: PathBuf) -> ApiResult<Response> {
    let file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;
    let size = file
        .metadata()
        .await
        .map_err(|_| ApiError::not_found("file not found"))?
        .len();

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    if let Some(mime) = MimeGuess::from_path(&path).first()
        && let Ok(value) = HeaderValue::from_str(mime.as_ref())
    {
        headers.insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::EncodingDescriptor;
    use crate::formats::tests::{audio_only, combined, video_only};
    use crate::pipeline::tests::{FakeDownloader, FakeMuxer, FixedProvider};
    use crate::provider::{MetadataProvider, VideoMetadata};
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct MissingProvider;

    #[async_trait]
    impl MetadataProvider for MissingProvider {
        fn name(&self) -> &'static str {
            "missing"
        }

        async fn fetch(&self, _video_id: &VideoId) -> Result<VideoMetadata, ConvertError> {
            Err(ConvertError::NotFound)
        }
    }

    struct TestApp {
        staging: TempDir,
        www: TempDir,
        router: Router,
    }

    fn app_with(
        mode: ConvertMode,
        encodings: Vec<EncodingDescriptor>,
        info_provider: SharedProvider,
    ) -> TestApp {
        let staging = tempfile::tempdir().unwrap();
        let www = tempfile::tempdir().unwrap();
        std::fs::write(www.path().join("index.html"), "<h1>tubegrab</h1>").unwrap();
        std::fs::write(www.path().join("app.js"), "console.log(1);").unwrap();
        let pipeline = ConvertPipeline::new(
            Arc::new(FixedProvider { encodings }),
            Arc::new(FakeDownloader::default()),
            Arc::new(FakeMuxer::default()),
            staging.path().to_path_buf(),
        );
        let state = AppState::new(
            pipeline,
            info_provider,
            mode,
            Some(www.path().to_path_buf()),
        );
        TestApp {
            staging,
            www,
            router: router(state),
        }
    }

    fn app(mode: ConvertMode, encodings: Vec<EncodingDescriptor>) -> TestApp {
        let info: SharedProvider = Arc::new(FixedProvider {
            encodings: encodings.clone(),
        });
        app_with(mode, encodings, info)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body)
    }

    fn json(body: &Bytes) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn api_error_serializes_json() {
        let response = ApiError::not_found("missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(json(&body), serde_json::json!({ "error": "missing" }));
    }

    #[test]
    fn upstream_detail_is_not_exposed() {
        let err: ApiError = ConvertError::upstream("yt-dlp exploded at /tmp/secret").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("secret"));
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_without_upstream_calls() {
        let app = app_with(ConvertMode::Stream, Vec::new(), Arc::new(MissingProvider));
        let (status, _, body) =
            send(&app.router, post_json("/api/convert", r#"{"url":"not a url"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body), serde_json::json!({ "error": "Invalid YouTube URL" }));
    }

    #[tokio::test]
    async fn missing_or_malformed_body_requires_url() {
        let app = app(ConvertMode::Stream, Vec::new());
        for body in ["", "{not json", "{}", r#"{"url":"   "}"#, r#"{"url":42}"#] {
            let (status, _, body) = send(&app.router, post_json("/api/info", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json(&body)["error"], "URL is required");
        }
    }

    #[tokio::test]
    async fn unsupported_format_is_rejected() {
        let app = app(ConvertMode::Stream, Vec::new());
        let (status, _, body) = send(
            &app.router,
            post_json(
                "/api/convert",
                r#"{"url":"https://youtu.be/abcdefghijk","format":"flac"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["error"], "Unsupported format");
    }

    #[tokio::test]
    async fn info_returns_video_details() {
        let app = app(ConvertMode::Stream, vec![combined("18", 360)]);
        let (status, _, body) = send(
            &app.router,
            post_json("/api/info", r#"{"url":"https://www.youtube.com/watch?v=abcdefghijk"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let details = json(&body);
        assert_eq!(details["videoId"], "abcdefghijk");
        assert_eq!(details["title"], "My Video: Part 1/2");
        assert_eq!(details["duration"], 60);
        assert_eq!(details["viewCount"], 0);
    }

    #[tokio::test]
    async fn info_maps_missing_video_to_404() {
        let app = app_with(ConvertMode::Stream, Vec::new(), Arc::new(MissingProvider));
        let (status, _, body) = send(
            &app.router,
            post_json("/api/info", r#"{"url":"abcdefghijk"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body)["error"], "Video not found");
    }

    #[tokio::test]
    async fn non_post_methods_get_json_405() {
        let app = app(ConvertMode::Stream, Vec::new());
        let request = Request::builder()
            .method(Method::GET)
            .uri("/api/convert")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json(&body)["error"], "Method not allowed");
    }

    #[tokio::test]
    async fn options_preflight_is_empty_200_with_cors() {
        let app = app(ConvertMode::Stream, Vec::new());
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/convert")
            .header(header::ORIGIN, "https://elsewhere.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );

        let bare = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/info")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app.router, bare).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn stream_mode_sends_attachment() {
        let app = app(
            ConvertMode::Stream,
            vec![
                audio_only("139", 48.0),
                audio_only("140", 128.0),
                audio_only("251", 160.0),
            ],
        );
        let (status, headers, body) = send(
            &app.router,
            post_json(
                "/api/convert",
                r#"{"url":"https://youtu.be/abcdefghijk","format":"mp3","quality":"256"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "audio/mp4");
        assert_eq!(
            headers.get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"My_Video_Part_12.m4a\""
        );
        assert_eq!(&body[..], b"payload-251");
    }

    #[tokio::test]
    async fn stream_mode_merges_and_leaves_no_staged_files() {
        let app = app(
            ConvertMode::Stream,
            vec![
                combined("18", 360),
                video_only("137", 1080),
                audio_only("140", 128.0),
            ],
        );
        let (status, headers, body) = send(
            &app.router,
            post_json(
                "/api/convert",
                r#"{"url":"abcdefghijk","format":"mp4","quality":1080}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "video/mp4");
        assert_eq!(
            headers.get(header::CONTENT_LENGTH).unwrap(),
            &body.len().to_string()
        );
        assert_eq!(&body[..], b"staged-137+staged-140");
        assert_eq!(std::fs::read_dir(app.staging.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn link_mode_returns_direct_url() {
        let app = app(ConvertMode::Link, vec![combined("18", 360), combined("22", 720)]);
        let (status, _, body) = send(
            &app.router,
            post_json("/api/convert", r#"{"url":"abcdefghijk","format":"mp4"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json(&body),
            serde_json::json!({
                "success": true,
                "downloadUrl": "https://media.example/22",
                "filename": "My_Video_Part_12.mp4",
            })
        );
    }

    #[tokio::test]
    async fn link_mode_without_combined_fallback_is_500() {
        let app = app(
            ConvertMode::Link,
            vec![video_only("137", 1080), audio_only("140", 128.0)],
        );
        let (status, _, body) = send(
            &app.router,
            post_json("/api/convert", r#"{"url":"abcdefghijk"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(&body)["error"], crate::error::GENERIC_CONVERT_MESSAGE);
    }

    #[tokio::test]
    async fn services_mode_never_consults_provider() {
        let app = app_with(ConvertMode::Services, Vec::new(), Arc::new(MissingProvider));
        let (status, _, body) = send(
            &app.router,
            post_json("/api/convert", r#"{"url":"abcdefghijk","format":"mp3"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let payload = json(&body);
        assert_eq!(payload["success"], true);
        assert_eq!(payload["videoId"], "abcdefghijk");
        assert_eq!(payload["format"], "mp3");
        assert_eq!(payload["services"].as_array().unwrap().len(), 3);
        assert_eq!(payload["message"], "Choose a converter service below");
    }

    #[tokio::test]
    async fn unknown_api_path_is_json_404() {
        let app = app(ConvertMode::Stream, Vec::new());
        let request = Request::builder()
            .uri("/api/unknown")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json(&body)["error"], "endpoint not found");
    }

    #[tokio::test]
    async fn static_files_are_served_with_index_fallback() {
        let app = app(ConvertMode::Stream, Vec::new());
        let get = |uri: &str| {
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .unwrap()
        };

        let (status, headers, body) = send(&app.router, get("/app.js")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            headers
                .get(header::CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .contains("javascript")
        );
        assert_eq!(&body[..], b"console.log(1);");

        let (status, _, body) = send(&app.router, get("/some/route")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"<h1>tubegrab</h1>");

        let (status, _, _) = send(&app.router, get("/missing.css")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(app.www.path().join("index.html").exists());
    }

    #[test]
    fn resolve_www_path_rejects_traversal() {
        let root = Path::new("/srv/www");
        assert_eq!(
            resolve_www_path(root, "/").unwrap(),
            PathBuf::from("/srv/www/index.html")
        );
        assert_eq!(
            resolve_www_path(root, "/css/site.css").unwrap(),
            PathBuf::from("/srv/www/css/site.css")
        );
        assert!(resolve_www_path(root, "/../etc/passwd").is_err());
        assert!(resolve_www_path(root, "/a/./b").is_ok());
    }

    #[test]
    fn fields_are_read_independently() {
        let body = RequestBody::parse(br#"{"url":"https://youtu.be/abcdefghijk","format":5}"#);
        assert_eq!(body.video_id().unwrap().as_str(), "abcdefghijk");
        assert!(matches!(
            body.output_format(),
            Err(ConvertError::InvalidInput(message)) if message == "Unsupported format"
        ));

        let body = RequestBody::parse(br#"{"url":"abcdefghijk","format":null}"#);
        assert_eq!(body.output_format().unwrap(), OutputFormat::Mp4);

        let body = RequestBody::parse(b"[1, 2]");
        assert!(body.url.is_none());
    }

    #[tokio::test]
    async fn badly_typed_format_is_unsupported_not_missing_url() {
        let app = app(ConvertMode::Stream, Vec::new());
        let (status, _, body) = send(
            &app.router,
            post_json(
                "/api/convert",
                r#"{"url":"https://youtu.be/abcdefghijk","format":5}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json(&body)["error"], "Unsupported format");
    }

    #[test]
    fn quality_accepts_strings_and_numbers() {
        let body = RequestBody::parse(br#"{"url":"x","quality":"720p"}"#);
        assert_eq!(body.quality().as_deref(), Some("720p"));
        let body = RequestBody::parse(br#"{"url":"x","quality":1080}"#);
        assert_eq!(body.quality().as_deref(), Some("1080"));
        let body = RequestBody::parse(br#"{"url":"x","quality":null}"#);
        assert_eq!(body.quality(), None);
    }
}
