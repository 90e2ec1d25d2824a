//! The transcription job and its state machine.

use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, ErrorKind};
use crate::output::derive_output_path;

/// Lifecycle of a job: `Pending → Running → {Succeeded | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// What a front end asks for: an input image and, optionally, where to put the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub input: PathBuf,

    /// Explicit artifact path. When `None`, the input path with a `.txt` extension is used.
    pub destination: Option<PathBuf>,
}

impl JobRequest {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            destination: None,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }
}

/// One user-initiated transcription.
///
/// Jobs are created by [`crate::Disenchanter::submit`] and handed back in a terminal state.
/// `result_text` and `artifact_path` are only set once the job has `Succeeded`;
/// `error_message` and `error_kind` only once it has `Failed`.
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    id: Uuid,
    input_path: PathBuf,
    destination: PathBuf,
    status: JobStatus,
    result_text: Option<String>,
    error_message: Option<String>,
    error_kind: Option<ErrorKind>,
    artifact_path: Option<PathBuf>,
}

impl TranscriptionJob {
    pub(crate) fn new(request: JobRequest) -> Self {
        let input_path = absolute(&request.input);
        let destination = match request.destination {
            Some(dest) => absolute(&dest),
            None => derive_output_path(&input_path),
        };

        Self {
            id: Uuid::new_v4(),
            input_path,
            destination,
            status: JobStatus::Pending,
            result_text: None,
            error_message: None,
            error_kind: None,
            artifact_path: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Where the artifact is (or would be) written.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn result_text(&self) -> Option<&str> {
        self.result_text.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path.as_deref()
    }

    pub fn into_result_text(self) -> Option<String> {
        self.result_text
    }

    pub(crate) fn start(&mut self) {
        self.advance(JobStatus::Running);
    }

    pub(crate) fn succeed(&mut self, text: String) {
        if self.advance(JobStatus::Succeeded) {
            self.result_text = Some(text);
            self.artifact_path = Some(self.destination.clone());
        }
    }

    pub(crate) fn fail(&mut self, err: &Error) {
        if self.advance(JobStatus::Failed) {
            self.error_kind = Some(err.kind());
            self.error_message = Some(err.user_message());
        }
    }

    /// Move to `next` if the state machine allows it. Statuses never move backwards.
    fn advance(&mut self, next: JobStatus) -> bool {
        let allowed = self.status.can_advance_to(next);
        debug_assert!(allowed, "illegal job transition {} -> {next}", self.status);
        if allowed {
            self.status = next;
        }
        allowed
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputError;

    #[test]
    fn new_job_is_pending_with_derived_destination() {
        let job = TranscriptionJob::new(JobRequest::new("/scans/scan001.jpg"));
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.input_path(), Path::new("/scans/scan001.jpg"));
        assert_eq!(job.destination(), Path::new("/scans/scan001.txt"));
        assert!(job.result_text().is_none());
        assert!(job.error_message().is_none());
        assert!(job.artifact_path().is_none());
    }

    #[test]
    fn explicit_destination_overrides_derivation() {
        let job = TranscriptionJob::new(
            JobRequest::new("/scans/scan001.jpg").with_destination("/out/result.txt"),
        );
        assert_eq!(job.destination(), Path::new("/out/result.txt"));
    }

    #[test]
    fn relative_input_is_made_absolute() -> anyhow::Result<()> {
        let job = TranscriptionJob::new(JobRequest::new("scan001.png"));
        assert!(job.input_path().is_absolute());
        assert_eq!(
            job.input_path(),
            std::env::current_dir()?.join("scan001.png")
        );
        Ok(())
    }

    #[test]
    fn success_populates_text_and_artifact() {
        let mut job = TranscriptionJob::new(JobRequest::new("/scans/a.png"));
        job.start();
        assert_eq!(job.status(), JobStatus::Running);

        job.succeed("Hello World\n".into());
        assert_eq!(job.status(), JobStatus::Succeeded);
        assert!(job.status().is_terminal());
        assert_eq!(job.result_text(), Some("Hello World\n"));
        assert_eq!(job.artifact_path(), Some(Path::new("/scans/a.txt")));
        assert!(job.error_message().is_none());
        assert!(job.error_kind().is_none());
    }

    #[test]
    fn failure_populates_message_and_kind_only() {
        let mut job = TranscriptionJob::new(JobRequest::new("/scans/missing.jpg"));
        job.start();
        job.fail(&Error::from(InputError::NotFound {
            path: "/scans/missing.jpg".into(),
            reason: "No such file or directory".into(),
        }));

        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.error_kind(), Some(ErrorKind::NotFound));
        assert!(job.error_message().is_some_and(|m| m.contains("not found")));
        assert!(job.result_text().is_none());
        assert!(job.artifact_path().is_none());
    }

    #[test]
    fn transitions_are_monotonic() {
        assert!(JobStatus::Pending.can_advance_to(JobStatus::Running));
        assert!(JobStatus::Running.can_advance_to(JobStatus::Failed));
        assert!(!JobStatus::Running.can_advance_to(JobStatus::Pending));
        assert!(!JobStatus::Succeeded.can_advance_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_advance_to(JobStatus::Running));
        assert!(!JobStatus::Pending.can_advance_to(JobStatus::Succeeded));
    }

    #[test]
    fn job_ids_are_unique() {
        let a = TranscriptionJob::new(JobRequest::new("/a.png"));
        let b = TranscriptionJob::new(JobRequest::new("/a.png"));
        assert_ne!(a.id(), b.id());
    }
}
