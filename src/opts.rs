use std::path::PathBuf;
use std::time::Duration;

/// Language model used when the caller does not pick one.
pub const DEFAULT_LANGUAGE_MODEL: &str = "eng";

/// Executable name looked up on `PATH` when no engine path is configured.
pub const DEFAULT_ENGINE_PROGRAM: &str = "tesseract";

/// Options that control how the OCR engine is invoked.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// The CLI and server map user input into this type so that:
/// - the library remains reusable outside of a CLI context
/// - tests can construct a configuration pointing at a substitute engine
///
/// The value is handed to the backend on every call; nothing about the engine is
/// stored process-wide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    /// Tesseract language code(s), `+`-joined for combinations (e.g. `"eng+deu"`).
    pub language_model: String,

    /// Override for the engine executable. When `None`, `tesseract` is looked up on `PATH`.
    pub engine_path: Option<PathBuf>,

    /// Directory holding `<code>.traineddata` files, passed to the engine as `--tessdata-dir`.
    ///
    /// When `None`, the engine uses its own default (usually `TESSDATA_PREFIX`).
    pub tessdata_dir: Option<PathBuf>,

    /// Wall-clock limit for a single engine run.
    ///
    /// `None` blocks until the engine returns.
    pub timeout: Option<Duration>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language_model: DEFAULT_LANGUAGE_MODEL.to_owned(),
            engine_path: None,
            tessdata_dir: None,
            timeout: None,
        }
    }
}

impl OcrConfig {
    pub fn with_language_model(mut self, language_model: impl Into<String>) -> Self {
        self.language_model = language_model.into();
        self
    }

    pub fn with_engine_path(mut self, engine_path: impl Into<PathBuf>) -> Self {
        self.engine_path = Some(engine_path.into());
        self
    }

    pub fn with_tessdata_dir(mut self, tessdata_dir: impl Into<PathBuf>) -> Self {
        self.tessdata_dir = Some(tessdata_dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The program the backend should spawn: the configured path, or the bare default name.
    pub fn engine_program(&self) -> PathBuf {
        self.engine_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENGINE_PROGRAM))
    }

    /// Individual language codes in `language_model`, empty segments dropped.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.language_model
            .split('+')
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}
