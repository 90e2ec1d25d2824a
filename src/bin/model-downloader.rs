// A small CLI utility to download Tesseract language models (`.traineddata`)
// into a target directory.

use anyhow::{Context, Result, ensure};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use disenchanter::models::{
    DEFAULT_MODELS_DIR, ModelVariant, installed_models, is_valid_language_code, model_path,
    model_url,
};

#[derive(Parser, Debug)]
#[command(name = "model-downloader")]
#[command(about = "Download Tesseract language models for Disenchanter", long_about = None)]
struct Args {
    /// List models installed in the target directory and exit.
    #[arg(long)]
    list: bool,

    /// Language model code(s) to fetch (examples: eng, deu_frak, script/Latin).
    #[arg(long = "lang", required_unless_present = "list", num_args = 1..)]
    langs: Vec<String>,

    /// Upstream repository to fetch from.
    #[arg(long, value_enum, default_value_t = ModelVariant::Standard)]
    variant: ModelVariant,

    /// Target directory to store models (created if missing).
    #[arg(long, default_value = DEFAULT_MODELS_DIR)]
    dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list {
        print!("{}", model_list_string(&args.dir)?);
        return Ok(());
    }

    for lang in &args.langs {
        ensure!(
            is_valid_language_code(lang),
            "invalid language model code '{lang}'"
        );
    }

    fs::create_dir_all(&args.dir)
        .with_context(|| format!("failed to create target dir: {}", args.dir.display()))?;

    let client = Client::builder()
        .user_agent("disenchanter-model-downloader")
        .build()
        .context("failed to build HTTP client")?;

    for lang in &args.langs {
        let dest_path = model_path(&args.dir, lang);

        if dest_path.exists() {
            println!("✅ already exists: {}", dest_path.display());
            continue;
        }

        // Script models (`script/Latin`) live in a subdirectory.
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create model dir: {}", parent.display()))?;
        }

        let url = model_url(args.variant, lang);
        println!("⬇️  downloading {lang} ({:?})", args.variant);
        println!("    {url}");

        download_to_path(&client, &url, &dest_path)?;

        println!("✅ saved: {}", dest_path.display());
    }

    Ok(())
}

fn model_list_string(dir: &Path) -> Result<String> {
    let models = installed_models(dir)
        .with_context(|| format!("failed to read model dir: {}", dir.display()))?;

    let mut out = format!("Installed models in {}:\n", dir.display());
    if models.is_empty() {
        out.push_str("  (none)\n");
    }
    for m in models {
        out.push_str("  - ");
        out.push_str(&m.display_name);
        out.push('\n');
    }

    Ok(out)
}

/// Download a URL into `dest_path` safely:
/// - download to `dest_path.part`
/// - fsync + rename to final path
fn download_to_path(client: &Client, url: &str, dest_path: &Path) -> Result<()> {
    let resp = client
        .get(url)
        .send()
        .with_context(|| format!("request failed: {url}"))?
        .error_for_status()
        .with_context(|| format!("download failed (bad status): {url}"))?;

    let total = resp.content_length();
    download_to_path_with_reader(resp, total, dest_path)
}

fn download_to_path_with_reader<R: Read>(
    mut reader: R,
    total_bytes: Option<u64>,
    dest_path: &Path,
) -> Result<()> {
    let total = total_bytes.unwrap_or(0);

    let pb = if total > 0 {
        ProgressBar::new(total)
    } else {
        ProgressBar::new_spinner()
    };

    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} {bytes}/{total_bytes} {bar:40.cyan/blue} {eta}",
        )
        .context("invalid progress template")?
        .progress_chars("#>-"),
    );

    let tmp_path = PathBuf::from(format!("{}.part", dest_path.display()));

    let result = (|| -> Result<()> {
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n])?;
            pb.inc(n as u64);
        }

        file.sync_all()?;
        pb.finish_and_clear();

        fs::rename(&tmp_path, dest_path)
            .with_context(|| format!("failed to move into place: {}", dest_path.display()))?;

        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
        pb.finish_and_clear();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_list_string_shows_display_names() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("deu_frak.traineddata"), b"x")?;
        fs::write(dir.path().join("custom.traineddata"), b"x")?;

        let list = model_list_string(dir.path())?;
        assert!(list.starts_with("Installed models in "));
        assert!(list.contains("  - custom\n"));
        assert!(list.contains("  - German Fraktur (deu_frak)\n"));
        Ok(())
    }

    #[test]
    fn model_list_string_marks_empty_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(model_list_string(dir.path())?.contains("(none)"));
        Ok(())
    }

    #[test]
    fn args_parse_requires_lang_unless_list() {
        let err = Args::try_parse_from(["model-downloader"])
            .err()
            .expect("expected missing-args error");
        assert!(err.to_string().contains("--lang"));

        let args =
            Args::try_parse_from(["model-downloader", "--list"]).expect("parse list params");
        assert!(args.list);
        assert!(args.langs.is_empty());
        assert_eq!(args.dir, PathBuf::from("./models"));
    }

    #[test]
    fn args_parse_accepts_several_langs_and_variant() {
        let args = Args::try_parse_from([
            "model-downloader",
            "--lang",
            "eng",
            "deu_frak",
            "--variant",
            "best",
        ])
        .expect("parse download params");
        assert_eq!(args.langs, vec!["eng", "deu_frak"]);
        assert_eq!(args.variant, ModelVariant::Best);
    }

    #[test]
    fn download_to_path_with_reader_writes_and_renames() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let dest_path = dir.path().join("eng.traineddata");
        let tmp_path = PathBuf::from(format!("{}.part", dest_path.display()));

        let bytes = b"abc123".to_vec();
        download_to_path_with_reader(
            std::io::Cursor::new(bytes.clone()),
            Some(bytes.len() as u64),
            &dest_path,
        )?;

        assert!(dest_path.exists());
        assert!(!tmp_path.exists());
        assert_eq!(std::fs::read(&dest_path)?, bytes);
        Ok(())
    }

    struct ErrorAfterNBytes {
        bytes: Vec<u8>,
        fail_at: usize,
        pos: usize,
    }

    impl Read for ErrorAfterNBytes {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.fail_at {
                return Err(std::io::Error::other("simulated read failure"));
            }

            let remaining = &self.bytes[self.pos..];
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn download_to_path_with_reader_cleans_up_part_file_on_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let dest_path = dir.path().join("eng.traineddata");
        let tmp_path = PathBuf::from(format!("{}.part", dest_path.display()));

        let reader = ErrorAfterNBytes {
            bytes: b"abc123".to_vec(),
            fail_at: 1,
            pos: 0,
        };

        let err = download_to_path_with_reader(reader, Some(6), &dest_path).unwrap_err();
        assert!(err.to_string().contains("simulated read failure"));
        assert!(!dest_path.exists());
        assert!(!tmp_path.exists());
        Ok(())
    }
}
