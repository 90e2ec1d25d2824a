use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use disenchanter::opts::{DEFAULT_LANGUAGE_MODEL, OcrConfig};
use disenchanter::{Disenchanter, JobReport, JobRequest, JobStatus, ReportFormat};

fn main() -> ExitCode {
    disenchanter::init_logging();

    match run(Params::parse()) {
        Ok(JobStatus::Succeeded) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(params: Params) -> Result<JobStatus> {
    let config = params.ocr_config();
    let disenchanter = Disenchanter::new(config);

    let mut request = JobRequest::new(&params.image_path);
    if let Some(output) = &params.output_path {
        request = request.with_destination(output);
    }

    let job = disenchanter
        .submit(request)
        .context("failed to start transcription job")?;

    JobReport::from_job(&job, params.print_text)
        .render(params.report, io::stdout().lock())
        .context("failed to write report")?;

    Ok(job.status())
}

#[derive(Parser, Debug)]
#[command(name = "disenchanter")]
#[command(about = "Transcribe an image to a text file with Tesseract OCR")]
struct Params {
    /// Image to transcribe (jpg, jpeg, png, bmp, tif, tiff).
    #[arg(short = 'i', long = "image")]
    pub image_path: PathBuf,

    /// Where to write the text. Defaults to the image path with a `.txt` extension.
    #[arg(short = 'o', long = "output")]
    pub output_path: Option<PathBuf>,

    /// Tesseract language model code(s), `+`-joined (e.g. `eng+deu`).
    #[arg(
        short = 'l',
        long = "lang",
        env = "DISENCHANTER_LANG",
        default_value = DEFAULT_LANGUAGE_MODEL
    )]
    pub language_model: String,

    /// Path to the `tesseract` executable. Looked up on PATH when omitted.
    #[arg(long = "tesseract", env = "DISENCHANTER_TESSERACT")]
    pub engine_path: Option<PathBuf>,

    /// Directory holding `.traineddata` language models.
    #[arg(long = "tessdata-dir", env = "DISENCHANTER_TESSDATA_DIR")]
    pub tessdata_dir: Option<PathBuf>,

    /// Kill the engine if it runs longer than this many seconds.
    #[arg(long = "timeout-secs")]
    pub timeout_secs: Option<u64>,

    /// How to print the job outcome.
    #[arg(
        short = 'r',
        long = "report",
        value_enum,
        default_value_t = ReportFormat::Text
    )]
    pub report: ReportFormat,

    /// Also print the recognized text after the report.
    #[arg(long = "print-text", default_value_t = false)]
    pub print_text: bool,
}

impl Params {
    fn ocr_config(&self) -> OcrConfig {
        OcrConfig {
            language_model: self.language_model.clone(),
            engine_path: self.engine_path.clone(),
            tessdata_dir: self.tessdata_dir.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}
