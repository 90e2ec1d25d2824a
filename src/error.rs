use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Disenchanter's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Disenchanter's crate-wide error type.
///
/// Each pipeline stage has its own error enum; this type wraps them so callers that do not care
/// which stage failed can use a single `?`.
///
/// This is intentionally decoupled from `anyhow` so downstream libraries aren't forced to
/// adopt `anyhow` in their own public APIs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("OCR engine error: {0}")]
    OcrEngine(#[from] EngineError),

    #[error("output error: {0}")]
    Output(#[from] OutputError),

    #[error("a transcription job is already running")]
    JobAlreadyRunning,
}

/// Failures raised while validating an input image.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("image not found at '{}': {reason}", path.display())]
    NotFound { path: PathBuf, reason: String },

    #[error("failed to decode image '{}': {reason}", path.display())]
    DecodeError { path: PathBuf, reason: String },

    #[error("unsupported format for '{}': {reason}", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },
}

/// Failures raised by an OCR backend.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("OCR engine not found: {detail}")]
    EngineNotFound { detail: String },

    #[error("recognition failed: {detail}")]
    RecognitionFailed { detail: String },
}

impl EngineError {
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::EngineNotFound {
            detail: detail.into(),
        }
    }

    pub fn recognition(detail: impl Into<String>) -> Self {
        Self::RecognitionFailed {
            detail: detail.into(),
        }
    }
}

/// Failures raised while persisting an artifact.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("permission denied writing '{}': {source}", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write '{}': {source}", path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OutputError {
    /// Classify an I/O failure for `path`.
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::ReadOnlyFilesystem => {
                Self::PermissionDenied { path, source }
            }
            _ => Self::IoFailure { path, source },
        }
    }
}

/// Flat, copyable classification of every [`Error`] case.
///
/// Jobs carry this instead of the error itself so finished jobs stay `Clone` and serializable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    DecodeError,
    UnsupportedFormat,
    EngineNotFound,
    RecognitionFailed,
    PermissionDenied,
    IoFailure,
    JobAlreadyRunning,
}

impl ErrorKind {
    /// The pipeline stage this kind belongs to.
    pub fn stage(self) -> &'static str {
        match self {
            Self::NotFound | Self::DecodeError | Self::UnsupportedFormat => "input",
            Self::EngineNotFound | Self::RecognitionFailed => "ocr",
            Self::PermissionDenied | Self::IoFailure => "output",
            Self::JobAlreadyRunning => "job",
        }
    }

    /// Stable snake_case name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::DecodeError => "decode_error",
            Self::UnsupportedFormat => "unsupported_format",
            Self::EngineNotFound => "engine_not_found",
            Self::RecognitionFailed => "recognition_failed",
            Self::PermissionDenied => "permission_denied",
            Self::IoFailure => "io_failure",
            Self::JobAlreadyRunning => "job_already_running",
        }
    }

    pub fn is_input(self) -> bool {
        self.stage() == "input"
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(InputError::NotFound { .. }) => ErrorKind::NotFound,
            Self::InvalidInput(InputError::DecodeError { .. }) => ErrorKind::DecodeError,
            Self::InvalidInput(InputError::UnsupportedFormat { .. }) => {
                ErrorKind::UnsupportedFormat
            }
            Self::OcrEngine(EngineError::EngineNotFound { .. }) => ErrorKind::EngineNotFound,
            Self::OcrEngine(EngineError::RecognitionFailed { .. }) => {
                ErrorKind::RecognitionFailed
            }
            Self::Output(OutputError::PermissionDenied { .. }) => ErrorKind::PermissionDenied,
            Self::Output(OutputError::IoFailure { .. }) => ErrorKind::IoFailure,
            Self::JobAlreadyRunning => ErrorKind::JobAlreadyRunning,
        }
    }

    /// One-line, user-facing description naming the failed stage and the reason.
    pub fn user_message(&self) -> String {
        one_line(&format!("{} failed: {self}", self.kind().stage()))
    }
}

/// Collapse multi-line text (engine stderr, nested io errors) onto a single line.
pub(crate) fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_names_stage_and_reason() {
        let err = Error::from(InputError::NotFound {
            path: PathBuf::from("/scans/missing.jpg"),
            reason: "no such file".into(),
        });
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let msg = err.user_message();
        assert!(msg.starts_with("input failed:"), "{msg}");
        assert!(msg.contains("not found"), "{msg}");
    }

    #[test]
    fn user_message_is_single_line() {
        let err = Error::from(EngineError::recognition("line one\nline two\r\n  line three"));
        assert_eq!(
            err.user_message(),
            "ocr failed: OCR engine error: recognition failed: line one line two line three"
        );
    }

    #[test]
    fn output_errors_classify_permission_denied() {
        let err = OutputError::from_io(
            "/ro/out.txt",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, OutputError::PermissionDenied { .. }));

        let err = OutputError::from_io("/x/out.txt", std::io::Error::other("disk full"));
        assert!(matches!(err, OutputError::IoFailure { .. }));
    }

    #[test]
    fn kinds_map_to_stages() {
        assert_eq!(ErrorKind::UnsupportedFormat.stage(), "input");
        assert_eq!(ErrorKind::EngineNotFound.stage(), "ocr");
        assert_eq!(ErrorKind::IoFailure.stage(), "output");
        assert_eq!(Error::JobAlreadyRunning.kind().stage(), "job");
        assert!(ErrorKind::DecodeError.is_input());
        assert!(!ErrorKind::RecognitionFailed.is_input());
    }

    #[test]
    fn kind_serializes_as_snake_case() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::to_string(&ErrorKind::EngineNotFound)?,
            "\"engine_not_found\""
        );
        for kind in [ErrorKind::DecodeError, ErrorKind::IoFailure, ErrorKind::JobAlreadyRunning] {
            assert_eq!(serde_json::to_string(&kind)?, format!("\"{}\"", kind.as_str()));
        }
        Ok(())
    }
}
