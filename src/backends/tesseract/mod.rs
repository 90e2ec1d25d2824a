//! Backend that shells out to the `tesseract` command-line engine.

mod process;

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Output;

use crate::backend::{OcrBackend, normalize_newlines};
use crate::error::{EngineError, one_line};
use crate::input::ValidatedImage;
use crate::models::{is_valid_language_code, model_path};
use crate::opts::OcrConfig;

use process::RunError;

/// Built-in backend powered by the Tesseract CLI.
///
/// The backend is stateless: the executable, language model and tessdata directory all come
/// from the [`OcrConfig`] passed with each call, so one instance can serve any configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct TesseractBackend;

impl TesseractBackend {
    pub fn new() -> Self {
        Self
    }

    /// Find the engine executable, either the configured path or `tesseract` on `PATH`.
    pub fn locate(&self, config: &OcrConfig) -> Result<PathBuf, EngineError> {
        let program = config.engine_program();
        which::which(&program).map_err(|err| {
            EngineError::not_found(format!(
                "'{}' is not installed or not on PATH ({err})",
                program.display()
            ))
        })
    }

    /// The engine's version line (e.g. `tesseract 5.3.0`).
    pub fn version(&self, config: &OcrConfig) -> Result<String, EngineError> {
        let out = self.execute(config, vec!["--version".into()])?;
        // Older releases print the banner on stderr.
        String::from_utf8_lossy(&out.stdout)
            .lines()
            .chain(String::from_utf8_lossy(&out.stderr).lines())
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| EngineError::recognition("engine printed no version information"))
    }

    /// Language codes the engine can load under `config` (honors `tessdata_dir`).
    pub fn list_languages(&self, config: &OcrConfig) -> Result<Vec<String>, EngineError> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(dir) = &config.tessdata_dir {
            args.push("--tessdata-dir".into());
            args.push(dir.into());
        }
        args.push("--list-langs".into());

        let out = self.execute(config, args)?;
        let listing = if out.stdout.is_empty() {
            &out.stderr
        } else {
            &out.stdout
        };

        let mut langs: Vec<String> = String::from_utf8_lossy(listing)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.ends_with(':'))
            .map(str::to_owned)
            .collect();
        langs.sort();
        Ok(langs)
    }

    fn recognition_args(image: &ValidatedImage, config: &OcrConfig) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            image.path().into(),
            "stdout".into(),
            "-l".into(),
            config.language_model.clone().into(),
        ];
        if let Some(dir) = &config.tessdata_dir {
            args.push("--tessdata-dir".into());
            args.push(dir.into());
        }
        args
    }

    /// Validate the requested language codes and, with a tessdata directory configured, make
    /// sure every model file is present before paying for a process spawn.
    fn check_models(config: &OcrConfig) -> Result<(), EngineError> {
        let mut codes = config.languages().peekable();
        if codes.peek().is_none() {
            return Err(EngineError::recognition("no language model configured"));
        }

        for code in codes {
            if !is_valid_language_code(code) {
                return Err(EngineError::recognition(format!(
                    "invalid language model code '{code}'"
                )));
            }
            if let Some(dir) = &config.tessdata_dir {
                let path = model_path(dir, code);
                if !path.is_file() {
                    return Err(EngineError::recognition(format!(
                        "language model '{code}' not found at '{}'",
                        path.display()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Locate the engine, run it with `args`, and turn spawn failures and non-zero exits into
    /// [`EngineError`]s.
    fn execute(&self, config: &OcrConfig, args: Vec<OsString>) -> Result<Output, EngineError> {
        let program = self.locate(config)?;

        let out = process::run(&program, &args, config.timeout).map_err(|err| match err {
            RunError::Spawn(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
                ) =>
            {
                EngineError::not_found(format!("failed to start '{}': {e}", program.display()))
            }
            RunError::Spawn(e) => {
                EngineError::recognition(format!("failed to start '{}': {e}", program.display()))
            }
            RunError::Wait(e) => EngineError::recognition(format!("failed to wait for engine: {e}")),
            RunError::TimedOut(limit) => EngineError::recognition(format!(
                "engine timed out after {:.1}s",
                limit.as_secs_f64()
            )),
        })?;

        if !out.status.success() {
            let stderr = one_line(&String::from_utf8_lossy(&out.stderr));
            let detail = if stderr.is_empty() {
                format!("engine exited with {}", out.status)
            } else {
                format!("engine exited with {}: {stderr}", out.status)
            };
            return Err(EngineError::recognition(detail));
        }

        Ok(out)
    }
}

impl OcrBackend for TesseractBackend {
    fn recognize(&self, image: &ValidatedImage, config: &OcrConfig) -> Result<String, EngineError> {
        let _span = tracing::info_span!(
            "backend.tesseract",
            lang = %config.language_model,
            path = %image.path().display()
        )
        .entered();

        Self::check_models(config)?;

        let out = self.execute(config, Self::recognition_args(image, config))?;

        let stderr = String::from_utf8_lossy(&out.stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!(stderr = %one_line(&stderr), "engine diagnostics");
        }

        let text = normalize_newlines(&String::from_utf8_lossy(&out.stdout));
        tracing::debug!(chars = text.chars().count(), "recognition finished");
        Ok(text)
    }
}
