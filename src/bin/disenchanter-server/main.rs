use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info, warn};

mod metrics;

use disenchanter::models::display_name;
use disenchanter::opts::{DEFAULT_LANGUAGE_MODEL, OcrConfig};
use disenchanter::{
    Disenchanter, ErrorKind, JobReport, JobRequest, JobStatus, OcrBackend, TesseractBackend,
    TranscriptionJob,
};

#[derive(Parser, Debug)]
#[command(name = "disenchanter-server")]
#[command(about = "HTTP server for image-to-text transcription")]
struct Params {
    /// Host interface to bind to.
    #[arg(long = "host", default_value = "127.0.0.1")]
    host: String,

    /// TCP port to listen on.
    #[arg(long = "port", default_value_t = 8080)]
    port: u16,

    /// Maximum request body size (bytes).
    #[arg(long = "max-bytes", default_value_t = 25 * 1024 * 1024)]
    max_bytes: usize,

    /// Scratch directory for per-job uploads and artifacts. Defaults to `<tmp>/disenchanter`.
    #[arg(long = "work-dir")]
    work_dir: Option<PathBuf>,

    /// Tesseract language model code(s), `+`-joined.
    #[arg(
        short = 'l',
        long = "lang",
        env = "DISENCHANTER_LANG",
        default_value = DEFAULT_LANGUAGE_MODEL
    )]
    language_model: String,

    /// Path to the `tesseract` executable. Looked up on PATH when omitted.
    #[arg(long = "tesseract", env = "DISENCHANTER_TESSERACT")]
    engine_path: Option<PathBuf>,

    /// Directory holding `.traineddata` language models.
    #[arg(long = "tessdata-dir", env = "DISENCHANTER_TESSDATA_DIR")]
    tessdata_dir: Option<PathBuf>,

    /// Kill the engine if a single job runs longer than this many seconds.
    #[arg(long = "timeout-secs", default_value_t = 120)]
    timeout_secs: u64,
}

impl Params {
    fn ocr_config(&self) -> OcrConfig {
        OcrConfig {
            language_model: self.language_model.clone(),
            engine_path: self.engine_path.clone(),
            tessdata_dir: self.tessdata_dir.clone(),
            timeout: Some(Duration::from_secs(self.timeout_secs)),
        }
    }
}

#[derive(Clone)]
struct AppState {
    disenchanter: Arc<Disenchanter>,
    work_dir: Arc<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    language_model: String,
    languages: Vec<LanguageEntry>,
}

#[derive(Debug, Serialize)]
struct LanguageEntry {
    code: String,
    display_name: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
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

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[tokio::main]
async fn main() {
    disenchanter::init_logging();

    if let Err(err) = run().await {
        error!(error = ?err, "disenchanter-server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let params = Params::parse();

    metrics::init();

    let addr: SocketAddr = format!("{}:{}", params.host, params.port)
        .parse()
        .context("invalid host/port bind address")?;

    let work_dir = params
        .work_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("disenchanter"));
    std::fs::create_dir_all(&work_dir)
        .with_context(|| format!("failed to create work dir: {}", work_dir.display()))?;

    let config = params.ocr_config();
    match TesseractBackend::new().version(&config) {
        Ok(version) => info!(%version, "OCR engine available"),
        Err(err) => warn!(error = %err, "OCR engine check failed; jobs will fail until it is installed"),
    }

    let state = AppState {
        disenchanter: Arc::new(Disenchanter::new(config)),
        work_dir: Arc::new(work_dir),
    };

    let app = Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics::prometheus_metrics))
        .route("/v1/models", get(models))
        .route("/v1/transcribe", post(transcribe))
        .route_layer(from_fn(metrics::track_http_metrics))
        .with_state(state)
        .layer(DefaultBodyLimit::max(params.max_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        );

    let listener = TcpListener::bind(addr).await.context("bind failed")?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn root() -> &'static str {
    "disenchanter-server: POST /v1/transcribe (multipart field: file)"
}

async fn healthz() -> &'static str {
    "ok"
}

async fn models(
    State(state): State<AppState>,
) -> std::result::Result<Json<ModelsResponse>, AppError> {
    let config = state.disenchanter.config().clone();
    let language_model = config.language_model.clone();

    let languages = tokio::task::spawn_blocking(move || {
        state.disenchanter.backend().list_languages(&config)
    })
    .await
    .map_err(|err| AppError::internal(err.to_string()))?
    .map_err(|err| AppError::unavailable(err.to_string()))?;

    Ok(Json(ModelsResponse {
        language_model,
        languages: languages
            .into_iter()
            .map(|code| LanguageEntry {
                display_name: display_name(&code),
                code,
            })
            .collect(),
    }))
}

struct Upload {
    file_name: Option<String>,
    bytes: Bytes,
}

async fn transcribe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> std::result::Result<Response, AppError> {
    // Cheap early rejection; `submit` below is still the authority.
    if state.disenchanter.is_running() {
        metrics::record_rejected();
        return Err(AppError::conflict("a transcription job is already running"));
    }

    let upload = read_upload(&mut multipart).await?;
    let extension = upload_extension(upload.file_name.as_deref());

    let started = Instant::now();
    let disenchanter = state.disenchanter.clone();
    let work_dir = state.work_dir.clone();
    let job = tokio::task::spawn_blocking(move || {
        let _in_flight = metrics::job_started();
        run_upload(&disenchanter, &work_dir, &extension, &upload.bytes)
    })
    .await
    .map_err(|err| AppError::internal(format!("transcription task failed: {err}")))?
    .map_err(|err| AppError::internal(format!("failed to stage upload: {err}")))?;

    let job = match job {
        Ok(job) => job,
        Err(err) if err.kind() == ErrorKind::JobAlreadyRunning => {
            metrics::record_rejected();
            return Err(AppError::conflict(err.to_string()));
        }
        Err(err) => return Err(AppError::internal(err.to_string())),
    };

    metrics::record_job(&job, started.elapsed());
    let status = http_status(job.status(), job.error_kind());

    // The scratch files are gone; the text travels in the body instead.
    let mut report = JobReport::from_job(&job, true);
    report.artifact_path = None;
    report.input_path = PathBuf::from(upload.file_name.as_deref().unwrap_or("upload"));
    Ok((status, Json(report)).into_response())
}

/// Run one uploaded image through the pipeline in a private scratch directory under
/// `work_dir`. The directory, upload and artifact included, is removed before returning.
///
/// The outer error covers staging the upload; the inner result is `submit`'s.
fn run_upload<B: OcrBackend>(
    disenchanter: &Disenchanter<B>,
    work_dir: &Path,
    extension: &str,
    bytes: &[u8],
) -> std::io::Result<disenchanter::Result<TranscriptionJob>> {
    let scratch = tempfile::Builder::new()
        .prefix("job-")
        .tempdir_in(work_dir)?;
    let input = scratch.path().join(format!("upload.{extension}"));
    std::fs::write(&input, bytes)?;

    let request = JobRequest::new(&input).with_destination(scratch.path().join("upload.txt"));
    let submitted = disenchanter.submit(request);

    let scratch_path = scratch.path().to_path_buf();
    if let Err(err) = scratch.close() {
        warn!(error = %err, path = %scratch_path.display(), "failed to remove job scratch dir");
    }
    Ok(submitted)
}

async fn read_upload(multipart: &mut Multipart) -> std::result::Result<Upload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(str::to_owned);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::bad_request(err.to_string()))?;

        if bytes.is_empty() {
            return Err(AppError::bad_request("uploaded file was empty"));
        }
        return Ok(Upload { file_name, bytes });
    }

    Err(AppError::bad_request("missing multipart field 'file'"))
}

/// Extension to store an upload under. The client's file name is untrusted, so only a short
/// alphanumeric extension survives; anything else becomes `bin` and fails input validation.
fn upload_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| std::path::Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_owned())
}

fn http_status(status: JobStatus, kind: Option<ErrorKind>) -> StatusCode {
    match (status, kind) {
        (JobStatus::Succeeded, _) => StatusCode::OK,
        (_, Some(ErrorKind::UnsupportedFormat)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        (_, Some(ErrorKind::NotFound | ErrorKind::DecodeError)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        (_, Some(ErrorKind::EngineNotFound)) => StatusCode::SERVICE_UNAVAILABLE,
        (_, Some(ErrorKind::RecognitionFailed)) => StatusCode::BAD_GATEWAY,
        (_, Some(ErrorKind::JobAlreadyRunning)) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
