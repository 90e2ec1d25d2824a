use std::sync::OnceLock;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::core::Collector;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts as PromOpts, Registry,
    TextEncoder,
};

use disenchanter::TranscriptionJob;

/// Label used for requests that did not match a route, so scanners cannot blow up cardinality.
const UNMATCHED_ROUTE: &str = "unmatched";

/// OCR runs take from well under a second to the server's engine timeout.
const JOB_DURATION_BUCKETS: &[f64] = &[0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

struct Metrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    jobs_total: IntCounterVec,
    job_duration_seconds: HistogramVec,
    jobs_in_flight: IntGauge,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn register<C: Collector + Clone + 'static>(registry: &Registry, collector: C) -> C {
    registry
        .register(Box::new(collector.clone()))
        .expect("metric names are unique");
    collector
}

fn metrics() -> &'static Metrics {
    METRICS.get_or_init(|| {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            PromOpts::new(
                "disenchanter_http_requests_total",
                "HTTP requests served, by route and status.",
            ),
            &["route", "status"],
        )
        .expect("metrics definition must be valid");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "disenchanter_http_request_duration_seconds",
                "HTTP request latency in seconds, by route.",
            ),
            &["route"],
        )
        .expect("metrics definition must be valid");

        let jobs_total = IntCounterVec::new(
            PromOpts::new(
                "disenchanter_jobs_total",
                "Transcription jobs by outcome and error kind.",
            ),
            &["outcome", "error_kind"],
        )
        .expect("metrics definition must be valid");

        let job_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "disenchanter_job_duration_seconds",
                "Wall time of a transcription job, upload staging included.",
            )
            .buckets(JOB_DURATION_BUCKETS.to_vec()),
            &["outcome"],
        )
        .expect("metrics definition must be valid");

        let jobs_in_flight = IntGauge::new(
            "disenchanter_jobs_in_flight",
            "Transcription jobs currently running (0 or 1).",
        )
        .expect("metrics definition must be valid");

        Metrics {
            http_requests_total: register(&registry, http_requests_total),
            http_request_duration_seconds: register(&registry, http_request_duration_seconds),
            jobs_total: register(&registry, jobs_total),
            job_duration_seconds: register(&registry, job_duration_seconds),
            jobs_in_flight: register(&registry, jobs_in_flight),
            registry,
        }
    })
}

pub fn init() {
    let _ = metrics();
}

/// Marks a job as running until dropped.
pub struct JobInFlight(());

impl Drop for JobInFlight {
    fn drop(&mut self) {
        metrics().jobs_in_flight.dec();
    }
}

pub fn job_started() -> JobInFlight {
    metrics().jobs_in_flight.inc();
    JobInFlight(())
}

/// Count a finished job under its terminal status and, for failures, its error kind.
pub fn record_job(job: &TranscriptionJob, elapsed: Duration) {
    let outcome = job.status().to_string();
    let error_kind = job.error_kind().map_or("none", |kind| kind.as_str());

    let m = metrics();
    m.jobs_total
        .with_label_values(&[outcome.as_str(), error_kind])
        .inc();
    m.job_duration_seconds
        .with_label_values(&[outcome.as_str()])
        .observe(elapsed.as_secs_f64());
}

/// Count a trigger turned away because another job was running.
pub fn record_rejected() {
    metrics()
        .jobs_total
        .with_label_values(&["rejected", "job_already_running"])
        .inc();
}

pub async fn prometheus_metrics() -> Response {
    let families = metrics().registry.gather();
    let mut buf = Vec::new();
    if TextEncoder::new().encode(&families, &mut buf).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to encode metrics",
        )
            .into_response();
    }

    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
        )],
        buf,
    )
        .into_response()
}

pub async fn track_http_metrics(req: Request<Body>, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED_ROUTE, |path| path.as_str())
        .to_owned();

    if route == "/metrics" || route == "/healthz" {
        return next.run(req).await;
    }

    let start = Instant::now();
    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    let m = metrics();
    m.http_requests_total
        .with_label_values(&[route.as_str(), status.as_str()])
        .inc();
    m.http_request_duration_seconds
        .with_label_values(&[route.as_str()])
        .observe(start.elapsed().as_secs_f64());

    response
}
