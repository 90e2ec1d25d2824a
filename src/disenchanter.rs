//! High-level API for running transcription jobs.
//!
//! We expose a single entry point (`Disenchanter`) that wires the three pipeline stages
//! together:
//! - an [`ImageResolver`] validates the input
//! - an [`OcrBackend`] recognizes the text
//! - an [`ArtifactWriter`] persists it
//!
//! Each stage is reached through its capability trait only, so front ends and tests can swap
//! any of them. The orchestrator owns the job state machine and is the single place where stage
//! errors are turned into a job's user-facing status.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::OcrBackend;
use crate::backends::tesseract::TesseractBackend;
use crate::error::{EngineError, Error, InputError, OutputError, Result};
use crate::input::{FsImageResolver, ImageResolver};
use crate::job::{JobRequest, TranscriptionJob};
use crate::opts::OcrConfig;
use crate::output::{ArtifactWriter, FsArtifactWriter};

/// The main transcription entry point.
///
/// Typical usage:
/// - Construct once with the engine configuration.
/// - Call [`Disenchanter::submit`] for each user action.
///
/// Only one job runs at a time; `submit` takes `&self` so an instance can be shared across
/// threads (e.g. behind an `Arc` in a server) and concurrent triggers are rejected rather
/// than queued.
pub struct Disenchanter<
    B: OcrBackend = TesseractBackend,
    R: ImageResolver = FsImageResolver,
    W: ArtifactWriter = FsArtifactWriter,
> {
    resolver: R,
    backend: B,
    writer: W,
    config: OcrConfig,
    running: AtomicBool,
}

impl Disenchanter<TesseractBackend> {
    /// Create an orchestrator using the Tesseract CLI and the local filesystem.
    pub fn new(config: OcrConfig) -> Self {
        Self::with_backend(TesseractBackend::new(), config)
    }
}

impl<B: OcrBackend> Disenchanter<B> {
    /// Create an orchestrator with a custom OCR backend and the filesystem resolver/writer.
    pub fn with_backend(backend: B, config: OcrConfig) -> Self {
        Self::with_components(FsImageResolver, backend, FsArtifactWriter, config)
    }
}

impl<B: OcrBackend, R: ImageResolver, W: ArtifactWriter> Disenchanter<B, R, W> {
    /// Create an orchestrator from explicit components.
    pub fn with_components(resolver: R, backend: B, writer: W, config: OcrConfig) -> Self {
        Self {
            resolver,
            backend,
            writer,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Run one job to completion.
    ///
    /// Returns the job in a terminal state (`Succeeded` or `Failed`); stage failures are
    /// recorded on the job, never returned. The only error is [`Error::JobAlreadyRunning`],
    /// returned without creating a job when another `submit` is still in flight.
    pub fn submit(&self, request: JobRequest) -> Result<TranscriptionJob> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::warn!(input = %request.input.display(), "rejected: job already running");
            return Err(Error::JobAlreadyRunning);
        };

        let mut job = TranscriptionJob::new(request);
        let span = tracing::info_span!("job", id = %job.id());
        let _enter = span.enter();

        tracing::info!(
            input = %job.input_path().display(),
            destination = %job.destination().display(),
            lang = %self.config.language_model,
            "job started"
        );
        job.start();

        match self.run_stages(&job) {
            Ok(text) => {
                tracing::info!(artifact = %job.destination().display(), "job succeeded");
                job.succeed(text);
            }
            Err(err) => {
                tracing::warn!(kind = ?err.kind(), error = %err, "job failed");
                job.fail(&err);
            }
        }

        Ok(job)
    }

    /// Resolve → recognize → write, stopping at the first failure.
    ///
    /// A panic inside any stage is contained and reported as that stage's failure, so a
    /// misbehaving decoder, engine binding or writer cannot take the caller down.
    fn run_stages(&self, job: &TranscriptionJob) -> Result<String> {
        let input = job.input_path();
        let image = contain(
            || self.resolver.resolve(input),
            || InputError::DecodeError {
                path: input.to_path_buf(),
                reason: "image decoder panicked".into(),
            },
        )?;
        tracing::debug!(
            format = ?image.format(),
            width = image.width(),
            height = image.height(),
            "input resolved"
        );

        let text = contain(
            || self.backend.recognize(&image, &self.config),
            || EngineError::recognition("OCR backend panicked"),
        )?;

        let destination = job.destination();
        contain(
            || self.writer.write(&text, destination),
            || OutputError::IoFailure {
                path: destination.to_path_buf(),
                source: std::io::Error::other("artifact writer panicked"),
            },
        )?;
        Ok(text)
    }

    /// Whether a job is currently in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The engine configuration every job runs with.
    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Access the configured backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// Run one stage, turning a panic into the stage's own error.
fn contain<T, E>(
    stage: impl FnOnce() -> std::result::Result<T, E>,
    on_panic: impl FnOnce() -> E,
) -> std::result::Result<T, E> {
    catch_unwind(AssertUnwindSafe(stage)).unwrap_or_else(|_| {
        tracing::error!("pipeline stage panicked");
        Err(on_panic())
    })
}

/// Holds the single-job slot; releasing happens on drop so a panic cannot wedge the
/// orchestrator in the running state.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
