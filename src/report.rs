use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::job::{JobStatus, TranscriptionJob};

/// How front ends render a finished job.
///
/// `ValueEnum` lets the CLI use this enum directly as a flag when the `cli` feature is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ReportFormat {
    /// One human-readable line.
    #[default]
    Text,

    /// A single JSON object.
    Json,
}

/// Serializable snapshot of a job: the observables front ends are allowed to see.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub id: Uuid,
    pub status: JobStatus,
    pub input_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl JobReport {
    /// Snapshot `job`; the recognized text is only included when `include_text` is set.
    pub fn from_job(job: &TranscriptionJob, include_text: bool) -> Self {
        Self {
            id: job.id(),
            status: job.status(),
            input_path: job.input_path().to_path_buf(),
            artifact_path: job.artifact_path().map(|p| p.to_path_buf()),
            error_kind: job.error_kind(),
            error_message: job.error_message().map(str::to_owned),
            text: include_text
                .then(|| job.result_text().map(str::to_owned))
                .flatten(),
        }
    }

    /// Render into `w` followed by a newline.
    pub fn render<W: Write>(&self, format: ReportFormat, mut w: W) -> std::io::Result<()> {
        match format {
            ReportFormat::Json => {
                let json = serde_json::to_string(self)?;
                writeln!(w, "{json}")?;
            }
            ReportFormat::Text => {
                match (&self.artifact_path, &self.error_message) {
                    (Some(artifact), _) => {
                        writeln!(w, "{}: {}", self.status, artifact.display())?
                    }
                    (None, Some(message)) => writeln!(w, "{}: {message}", self.status)?,
                    (None, None) => writeln!(w, "{}", self.status)?,
                }
                if let Some(text) = &self.text {
                    write!(w, "{text}")?;
                }
            }
        }
        w.flush()
    }
}
