//! Input validation: turn a caller-supplied path into an image the OCR engine can read.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageReader;
use serde::Serialize;

use crate::error::InputError;

/// Image formats the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Bmp,
    Tiff,
}

impl ImageFormat {
    /// Every accepted file extension (lowercase).
    pub const EXTENSIONS: &'static [&'static str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

    /// Map a file extension (case-insensitive) to a supported format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    fn from_decoder(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(Self::Jpeg),
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Bmp => Some(Self::Bmp),
            image::ImageFormat::Tiff => Some(Self::Tiff),
            _ => None,
        }
    }
}

/// An image that exists, has a supported extension and decodes cleanly.
///
/// The path is the handle backends read from; the metadata comes from the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedImage {
    path: PathBuf,
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl ValidatedImage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format detected from the file content (which may differ from the extension).
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Capability: "can resolve image".
pub trait ImageResolver {
    fn resolve(&self, path: &Path) -> Result<ValidatedImage, InputError>;
}

/// Resolver backed by the local filesystem and the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsImageResolver;

impl ImageResolver for FsImageResolver {
    fn resolve(&self, path: &Path) -> Result<ValidatedImage, InputError> {
        resolve(path)
    }
}

/// Validate `path` and decode it far enough to read its dimensions.
///
/// Checks run cheapest first: existence, regular file, extension, then a full decode so corrupt
/// files are caught here instead of inside the engine.
pub fn resolve(path: &Path) -> Result<ValidatedImage, InputError> {
    let _span = tracing::debug_span!("input.resolve", path = %path.display()).entered();

    let metadata = std::fs::metadata(path).map_err(|err| InputError::NotFound {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    if !metadata.is_file() {
        return Err(InputError::NotFound {
            path: path.to_path_buf(),
            reason: "not a regular file".into(),
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ImageFormat::from_extension(&extension).is_none() {
        let reason = match extension.as_str() {
            "" => "file has no extension".to_owned(),
            "pdf" => "PDF input is not supported".to_owned(),
            other => format!(
                "'.{other}' is not one of {}",
                ImageFormat::EXTENSIONS.join(", ")
            ),
        };
        return Err(InputError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason,
        });
    }

    let decode_err = |reason: String| InputError::DecodeError {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = std::fs::read(path).map_err(|e| decode_err(e.to_string()))?;
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?;

    let format = reader
        .format()
        .and_then(ImageFormat::from_decoder)
        .ok_or_else(|| decode_err("content is not a supported image".into()))?;

    let img = reader.decode().map_err(|e| decode_err(e.to_string()))?;

    tracing::debug!(?format, width = img.width(), height = img.height(), "image resolved");

    Ok(ValidatedImage {
        path: path.to_path_buf(),
        format,
        width: img.width(),
        height: img.height(),
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
        let path = dir.join(name);
        image::RgbImage::from_pixel(8, 4, image::Rgb([255, 255, 255]))
            .save_with_format(&path, image::ImageFormat::Png)?;
        Ok(path)
    }

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(ImageFormat::from_extension("JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("Tif"), Some(ImageFormat::Tiff));
        assert_eq!(ImageFormat::from_extension("pdf"), None);
        assert_eq!(ImageFormat::from_extension(""), None);
    }

    #[test]
    fn resolves_png_with_dimensions() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_png(dir.path(), "page.png")?;

        let image = resolve(&path)?;
        assert_eq!(image.path(), path.as_path());
        assert_eq!(image.format(), ImageFormat::Png);
        assert_eq!((image.width(), image.height()), (8, 4));
        Ok(())
    }

    #[test]
    fn reports_content_format_over_extension() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // PNG bytes behind a .jpg name still decode; the sniffed format wins.
        let path = write_png(dir.path(), "mislabeled.png")?;
        let renamed = dir.path().join("mislabeled.jpg");
        std::fs::rename(&path, &renamed)?;

        assert_eq!(resolve(&renamed)?.format(), ImageFormat::Png);
        Ok(())
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve(Path::new("/nonexistent/missing.jpg")).unwrap_err();
        assert!(matches!(err, InputError::NotFound { .. }));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn directory_is_not_found() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let fake = dir.path().join("folder.png");
        std::fs::create_dir(&fake)?;

        match resolve(&fake) {
            Err(InputError::NotFound { reason, .. }) => {
                assert_eq!(reason, "not a regular file");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn pdf_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.5")?;

        match resolve(&path) {
            Err(InputError::UnsupportedFormat { reason, .. }) => {
                assert!(reason.contains("PDF"));
            }
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn unknown_extension_lists_supported_set() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("notes.docx");
        std::fs::write(&path, b"PK")?;

        let err = resolve(&path).unwrap_err();
        assert!(matches!(err, InputError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("jpg, jpeg, png"));
        Ok(())
    }

    #[test]
    fn corrupt_image_is_decode_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not valid image data")?;

        let err = resolve(&path).unwrap_err();
        assert!(matches!(err, InputError::DecodeError { .. }));
        Ok(())
    }

    #[test]
    fn truncated_png_is_decode_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_png(dir.path(), "whole.png")?;
        let bytes = std::fs::read(&path)?;
        let truncated = dir.path().join("truncated.png");
        std::fs::write(&truncated, &bytes[..bytes.len() / 2])?;

        assert!(matches!(
            resolve(&truncated),
            Err(InputError::DecodeError { .. })
        ));
        Ok(())
    }
}
