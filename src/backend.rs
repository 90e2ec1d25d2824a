use crate::error::EngineError;
use crate::input::ValidatedImage;
use crate::opts::OcrConfig;

/// Pluggable OCR backend used by [`crate::Disenchanter`].
///
/// Capability: "can recognize text". A backend turns a validated image into plain text under
/// the [`OcrConfig`] supplied with each call. Backends block the calling thread until the
/// engine returns.
///
/// Any closure with the matching signature is a backend too, which makes substituting the
/// engine in tests a one-liner:
///
/// ```
/// use disenchanter::{EngineError, OcrConfig, ValidatedImage};
///
/// let fake = |_: &ValidatedImage, _: &OcrConfig| Ok::<_, EngineError>("Hello World\n".to_owned());
/// let _ = disenchanter::Disenchanter::with_backend(fake, OcrConfig::default());
/// ```
pub trait OcrBackend {
    /// Recognize the text in `image`.
    ///
    /// Implementations return newline-normalized text (`\n` line endings) and perform no other
    /// post-processing.
    fn recognize(&self, image: &ValidatedImage, config: &OcrConfig) -> Result<String, EngineError>;
}

impl<F> OcrBackend for F
where
    F: Fn(&ValidatedImage, &OcrConfig) -> Result<String, EngineError>,
{
    fn recognize(&self, image: &ValidatedImage, config: &OcrConfig) -> Result<String, EngineError> {
        self(image, config)
    }
}

/// Normalize engine output line endings: `\r\n` and lone `\r` become `\n`, form-feed page
/// separators are dropped.
pub fn normalize_newlines(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{000C}', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_newlines_unifies_line_endings() {
        assert_eq!(normalize_newlines("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn normalize_newlines_drops_page_separators() {
        assert_eq!(normalize_newlines("Hello World\n\u{000C}"), "Hello World\n");
        assert_eq!(normalize_newlines("p1\n\u{000C}p2\n\u{000C}"), "p1\np2\n");
    }

    #[test]
    fn normalize_newlines_keeps_plain_text() {
        assert_eq!(normalize_newlines("no endings"), "no endings");
        assert_eq!(normalize_newlines(""), "");
    }
}
