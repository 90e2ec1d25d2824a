//! `disenchanter` — turn images into text files with the Tesseract OCR engine.
//!
//! This crate provides:
//! - Input validation for image files (existence, supported format, decodability)
//! - A pluggable OCR backend, with a built-in one that drives the `tesseract` CLI
//! - Atomic artifact writing with the default `<input>.txt` naming rule
//! - A job orchestrator that sequences the three and reports a terminal job status
//!
//! Front ends (the bundled CLI and HTTP server, or a GUI) stay thin: they build an
//! [`OcrConfig`], call [`Disenchanter::submit`], and show the job's status, error message
//! and artifact path.

// High-level API (most consumers should start here).
pub mod disenchanter;
pub mod job;
pub mod opts;

// Pipeline stages.
pub mod backend;
pub mod backends;
pub mod input;
pub mod output;

// Language model catalogue.
pub mod models;

// Rendering finished jobs for front ends.
pub mod report;

pub mod error;

// Logging configuration for binaries.
#[cfg(feature = "logging")]
pub mod logging;

pub use backend::OcrBackend;
pub use backends::tesseract::TesseractBackend;
pub use disenchanter::Disenchanter;
pub use error::{EngineError, Error, ErrorKind, InputError, OutputError, Result};
pub use input::{FsImageResolver, ImageFormat, ImageResolver, ValidatedImage};
pub use job::{JobRequest, JobStatus, TranscriptionJob};
pub use opts::OcrConfig;
pub use output::{ArtifactWriter, FsArtifactWriter};
pub use report::{JobReport, ReportFormat};

#[cfg(feature = "logging")]
pub use logging::init as init_logging;
