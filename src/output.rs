//! Artifact persistence.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};

use crate::error::OutputError;

/// Extension given to derived artifact paths.
pub const ARTIFACT_EXTENSION: &str = "txt";

/// Capability: "can write output".
pub trait ArtifactWriter {
    fn write(&self, text: &str, destination: &Path) -> Result<(), OutputError>;
}

/// Writer backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactWriter;

impl ArtifactWriter for FsArtifactWriter {
    fn write(&self, text: &str, destination: &Path) -> Result<(), OutputError> {
        write(text, destination)
    }
}

/// Default artifact location: same directory and stem as `input`, extension replaced by `.txt`.
pub fn derive_output_path(input: &Path) -> PathBuf {
    input.with_extension(ARTIFACT_EXTENSION)
}

/// Write `text` to `destination` as UTF-8, silently replacing any existing file.
///
/// The text lands in a temporary file in the destination directory first and is renamed into
/// place, so readers see either the old artifact or the complete new one. A replaced artifact
/// keeps its permissions; a new one gets the same mode a plain file create would give it.
pub fn write(text: &str, destination: &Path) -> Result<(), OutputError> {
    let _span = tracing::debug_span!("output.write", path = %destination.display()).entered();

    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = temp_file_in(dir).map_err(|e| OutputError::from_io(dir, e))?;
    tmp.write_all(text.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| OutputError::from_io(tmp.path(), e))?;

    if let Ok(existing) = std::fs::metadata(destination) {
        tmp.as_file()
            .set_permissions(existing.permissions())
            .map_err(|e| OutputError::from_io(tmp.path(), e))?;
    }

    // On failure the temp file is dropped (and removed) together with the error.
    tmp.persist(destination)
        .map_err(|e| OutputError::from_io(destination, e.error))?;

    tracing::debug!(bytes = text.len(), "artifact written");
    Ok(())
}

/// Temp files default to owner-only; ask for 0666 so the process umask decides, as it would
/// for `File::create`.
fn temp_file_in(dir: &Path) -> std::io::Result<NamedTempFile> {
    #[cfg_attr(not(unix), allow(unused_mut))]
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_output_path_replaces_extension() {
        assert_eq!(
            derive_output_path(Path::new("/scans/scan001.jpg")),
            PathBuf::from("/scans/scan001.txt")
        );
        assert_eq!(
            derive_output_path(Path::new("/scans/page.v2.TIFF")),
            PathBuf::from("/scans/page.v2.txt")
        );
        assert_eq!(
            derive_output_path(Path::new("relative/img")),
            PathBuf::from("relative/img.txt")
        );
    }

    #[test]
    fn writes_utf8_text() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("out.txt");

        write("Grüße aus Köln\n", &dest)?;
        assert_eq!(std::fs::read_to_string(&dest)?, "Grüße aus Köln\n");
        Ok(())
    }

    #[test]
    fn overwrites_existing_artifact() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("out.txt");

        write("first run, longer text\n", &dest)?;
        write("second\n", &dest)?;
        assert_eq!(std::fs::read_to_string(&dest)?, "second\n");
        Ok(())
    }

    #[test]
    fn leaves_no_temp_files_behind() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write("text", &dir.path().join("out.txt"))?;

        let names: Vec<_> = std::fs::read_dir(dir.path())?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect::<Result<_, _>>()?;
        assert_eq!(names, vec![std::ffi::OsString::from("out.txt")]);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn artifact_mode_follows_umask_then_existing_file() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let mode = |path: &Path| -> std::io::Result<u32> {
            Ok(std::fs::metadata(path)?.permissions().mode() & 0o777)
        };

        let dir = tempfile::tempdir()?;
        let plain = dir.path().join("plain.txt");
        std::fs::write(&plain, "x")?;

        let dest = dir.path().join("scan001.txt");
        write("first\n", &dest)?;
        assert_eq!(mode(&dest)?, mode(&plain)?);

        std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o640))?;
        write("second\n", &dest)?;
        assert_eq!(mode(&dest)?, 0o640);
        assert_eq!(std::fs::read_to_string(&dest)?, "second\n");
        Ok(())
    }

    #[test]
    fn missing_directory_is_io_failure() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("does/not/exist/out.txt");

        let err = write("text", &dest).unwrap_err();
        assert!(matches!(err, OutputError::IoFailure { .. }));
        assert!(!dest.exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn read_only_directory_is_permission_denied() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked)?;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555))?;

        // Root ignores directory permissions, so only assert when the write is actually refused.
        let res = write("text", &locked.join("out.txt"));
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755))?;

        if let Err(err) = res {
            assert!(matches!(err, OutputError::PermissionDenied { .. }));
        }
        Ok(())
    }
}
