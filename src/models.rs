//! Tesseract language models (`<code>.traineddata`): naming, discovery, and download sources.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// File extension of Tesseract language models.
pub const MODEL_EXTENSION: &str = "traineddata";

/// Default directory for downloaded models, relative to the working directory.
pub const DEFAULT_MODELS_DIR: &str = "./models";

/// Which upstream tessdata repository a model is fetched from.
///
/// The three repositories trade speed for accuracy; all of them use the same file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ModelVariant {
    /// `tesseract-ocr/tessdata`: legacy + LSTM models.
    #[default]
    Standard,

    /// `tesseract-ocr/tessdata_fast`: integer LSTM models.
    Fast,

    /// `tesseract-ocr/tessdata_best`: float LSTM models.
    Best,
}

impl ModelVariant {
    fn repository(self) -> &'static str {
        match self {
            Self::Standard => "tessdata",
            Self::Fast => "tessdata_fast",
            Self::Best => "tessdata_best",
        }
    }
}

/// An installed model found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledModel {
    pub code: String,
    pub display_name: String,
    pub path: PathBuf,
}

/// Known codes and the names shown to users.
static DISPLAY_NAMES: &[(&str, &str)] = &[
    ("ara", "Arabic"),
    ("chi_sim", "Chinese Simplified"),
    ("chi_sim_vert", "Chinese Simplified (Vertical)"),
    ("chi_tra", "Chinese Traditional"),
    ("chi_tra_vert", "Chinese Traditional (Vertical)"),
    ("dan", "Danish"),
    ("dan_frak", "Danish Fraktur"),
    ("deu", "German"),
    ("deu_frak", "German Fraktur"),
    ("deu_latf", "German (Latinf)"),
    ("eng", "English"),
    ("fra", "French"),
    ("heb", "Hebrew"),
    ("ita", "Italian"),
    ("ita_old", "Italian (Old)"),
    ("jpn", "Japanese"),
    ("jpn_vert", "Japanese (Vertical)"),
    ("lat", "Latin"),
    ("nld", "Dutch"),
    ("nor", "Norwegian"),
    ("osd", "Orientation and script detection"),
    ("spa", "Spanish"),
    ("spa_old", "Spanish (Old)"),
    ("swe", "Swedish"),
    ("swe_frak", "Swedish Fraktur"),
];

/// Human-readable label for a model code: `"German Fraktur (deu_frak)"`, or the bare code when
/// the code is not in the catalogue.
pub fn display_name(code: &str) -> String {
    DISPLAY_NAMES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, pretty)| format!("{pretty} ({code})"))
        .unwrap_or_else(|| code.to_owned())
}

/// Whether `code` is safe to use as a single model code (and as a file stem).
///
/// Custom models often carry dots and dashes in their names (`frak2021-0.905`), so those are
/// allowed. Script models live one directory down (`script/Latin`), so `/`-separated segments are
/// accepted as long as each one is a plain name; `+`, `..`, and absolute paths are not.
pub fn is_valid_language_code(code: &str) -> bool {
    !code.is_empty() && code.split('/').all(is_plain_segment)
}

fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('.')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

pub fn model_file_name(code: &str) -> String {
    format!("{code}.{MODEL_EXTENSION}")
}

pub fn model_path(dir: &Path, code: &str) -> PathBuf {
    dir.join(model_file_name(code))
}

/// Download URL for `code` in the given upstream repository.
pub fn model_url(variant: ModelVariant, code: &str) -> String {
    format!(
        "https://github.com/tesseract-ocr/{}/raw/main/{}",
        variant.repository(),
        model_file_name(code)
    )
}

/// Subdirectory of a tessdata directory that holds per-script models.
pub const SCRIPT_DIR: &str = "script";

/// List the models installed in `dir` (and its `script/` subdirectory), sorted by code.
pub fn installed_models(dir: &Path) -> std::io::Result<Vec<InstalledModel>> {
    let mut models = Vec::new();
    collect_models(dir, "", &mut models)?;

    let script_dir = dir.join(SCRIPT_DIR);
    if script_dir.is_dir() {
        collect_models(&script_dir, "script/", &mut models)?;
    }

    models.sort_by(|a, b| a.code.cmp(&b.code));
    Ok(models)
}

fn collect_models(dir: &Path, prefix: &str, models: &mut Vec<InstalledModel>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(MODEL_EXTENSION) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let code = format!("{prefix}{stem}");
        models.push(InstalledModel {
            display_name: display_name(&code),
            code,
            path: path.clone(),
        });
    }
    Ok(())
}
