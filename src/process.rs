//! Batch processing.
//!
//! Drives every resolved input through the selected mode and records a
//! [`FileReport`] for each one:
//!
//! ```text
//! input ──▶ capabilities ──▶ decode ──▶ search (in memory) ──▶ write once ──▶ report
//! ```
//!
//! ## Modes
//!
//! | Mode | What is searched | Pixels change |
//! |------|------------------|---------------|
//! | [`Mode::Size`] | quality | yes (re-encoded) |
//! | [`Mode::AutoDpi`] | DPI, then quality if DPI alone misses | yes (re-encoded) |
//! | [`Mode::FixedDpi`] | nothing | no (metadata only where possible) |
//!
//! Files are processed one at a time. A failure on one file is recorded as
//! [`FileStatus::Failed`] and the batch moves on; only setting up the
//! output directory can abort the whole run.
//!
//! ## Progress events
//!
//! When the caller passes a [`Sender`], a [`ProcessEvent`] is sent before and
//! after every file. The CLI renders them on a separate printer thread; the
//! processing itself stays on the calling thread. A dropped receiver is
//! ignored.

use crate::config::ToolConfig;
use crate::imaging::{
    Codec, CodecError, Dpi, OutputFormat, RustBackend, apply_fixed_dpi, fit_dpi, fit_quality,
};
use crate::naming::resolve_output_path;
use crate::report::{BatchSummary, FileReport, FileStatus};
use crate::search::{DpiDomain, QualityDomain, SearchError, SizeTarget};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unsupported format for {path}: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Search error: {0}")]
    Search(#[from] SearchError),
}

/// What to do with each file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Search quality to hit the target size.
    Size,
    /// Search DPI (then quality) to hit the target size.
    AutoDpi,
    /// Set this DPI and nothing else.
    FixedDpi(Dpi),
}

impl Mode {
    pub fn name(self) -> &'static str {
        match self {
            Mode::Size => "size",
            Mode::AutoDpi => "auto-dpi",
            Mode::FixedDpi(_) => "fixed-dpi",
        }
    }
}

/// Everything the processor needs, already merged from config and CLI.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub mode: Mode,
    pub target: SizeTarget,
    /// Write outputs here instead of next to each input.
    pub output_dir: Option<PathBuf>,
    pub suffix: String,
    pub auto_increment: bool,
    pub jpeg_quality: Option<QualityDomain>,
    pub webp_quality: Option<QualityDomain>,
    pub dpi_domain: DpiDomain,
}

impl ProcessConfig {
    /// Build from loaded config. `config` has already been validated.
    pub fn from_tool_config(config: &ToolConfig, mode: Mode, target: SizeTarget) -> Self {
        let quality = |format: OutputFormat| {
            config
                .quality_domain(format)
                .or(format.capabilities().quality_domain)
        };
        Self {
            mode,
            target,
            output_dir: None,
            suffix: config.output.suffix.clone(),
            auto_increment: config.output.auto_increment,
            jpeg_quality: quality(OutputFormat::Jpeg),
            webp_quality: quality(OutputFormat::WebP),
            dpi_domain: config.dpi_domain(),
        }
    }

    /// Quality range for `format`, `None` when it has no quality setting.
    pub fn quality_domain(&self, format: OutputFormat) -> Option<QualityDomain> {
        match format {
            OutputFormat::Jpeg => self.jpeg_quality,
            OutputFormat::WebP => self.webp_quality,
            OutputFormat::Png | OutputFormat::Tiff => None,
        }
    }
}

/// Progress notifications sent to the caller.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// About to start on `input` (`index` is 1-based).
    FileStarted {
        index: usize,
        total: usize,
        input: PathBuf,
    },
    FileFinished {
        index: usize,
        total: usize,
        report: FileReport,
    },
}

/// Process `inputs` with the production codec.
pub fn process(
    inputs: &[PathBuf],
    config: &ProcessConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<BatchSummary, ProcessError> {
    let codec = RustBackend::new();
    process_with_codec(&codec, inputs, config, events)
}

/// Process `inputs` with a specific codec (allows testing with mock).
pub fn process_with_codec(
    codec: &impl Codec,
    inputs: &[PathBuf],
    config: &ProcessConfig,
    events: Option<Sender<ProcessEvent>>,
) -> Result<BatchSummary, ProcessError> {
    if let Some(dir) = &config.output_dir {
        fs::create_dir_all(dir)?;
    }

    let send = |event: ProcessEvent| {
        if let Some(tx) = &events {
            tx.send(event).ok();
        }
    };

    let total = inputs.len();
    let mut summary = BatchSummary::default();

    for (i, input) in inputs.iter().enumerate() {
        let index = i + 1;
        send(ProcessEvent::FileStarted {
            index,
            total,
            input: input.clone(),
        });

        let report = match process_file(codec, input, config) {
            Ok(report) => report,
            Err(err) => {
                warn!(input = %input.display(), error = %err, "file failed");
                FileReport::failed(
                    input.clone(),
                    config.mode.name(),
                    config.target.bytes(),
                    err.to_string(),
                )
            }
        };

        send(ProcessEvent::FileFinished {
            index,
            total,
            report: report.clone(),
        });
        summary.record(report);
    }

    Ok(summary)
}

/// Bytes and settings produced by one mode run, before anything is written.
struct ModeOutput {
    bytes: Vec<u8>,
    quality: Option<u32>,
    dpi: Option<u32>,
    succeeded: bool,
    trials_used: u32,
}

fn process_file(
    codec: &impl Codec,
    input: &Path,
    config: &ProcessConfig,
) -> Result<FileReport, ProcessError> {
    let unsupported = |reason: String| ProcessError::UnsupportedFormat {
        path: input.to_path_buf(),
        reason,
    };
    let format = OutputFormat::from_path(input)
        .ok_or_else(|| unsupported("unrecognised extension".into()))?;
    let capabilities = format.capabilities();
    let input_bytes = fs::metadata(input)?.len();
    let target = &config.target;

    let result = match config.mode {
        Mode::Size => {
            let domain = config.quality_domain(format).ok_or_else(|| {
                unsupported(format!(
                    "{format} has no quality setting; use `sizefit dpi` instead"
                ))
            })?;
            let source = codec.decode(input)?;
            let fitted = fit_quality(codec, &source.pixels, format, target, domain, source.dpi)?;
            ModeOutput {
                bytes: fitted.bytes,
                quality: fitted.quality.map(|q| q.value()),
                dpi: fitted.dpi.map(|d| d.x),
                succeeded: fitted.succeeded,
                trials_used: fitted.trials_used,
            }
        }
        Mode::AutoDpi => {
            if !capabilities.supports_dpi {
                return Err(unsupported(format!("{format} cannot store DPI")));
            }
            let source = codec.decode(input)?;
            let fitted = fit_dpi(
                codec,
                &source.pixels,
                format,
                target,
                config.dpi_domain,
                config.quality_domain(format),
            )?;
            ModeOutput {
                bytes: fitted.bytes,
                quality: fitted.quality.map(|q| q.value()),
                dpi: fitted.dpi.map(|d| d.x),
                succeeded: fitted.succeeded,
                trials_used: fitted.trials_used,
            }
        }
        Mode::FixedDpi(dpi) => {
            if !capabilities.supports_dpi {
                return Err(unsupported(format!("{format} cannot store DPI")));
            }
            let data = fs::read(input)?;
            ModeOutput {
                bytes: apply_fixed_dpi(codec, &data, format, dpi)?,
                quality: None,
                dpi: Some(dpi.x),
                succeeded: true,
                trials_used: 0,
            }
        }
    };

    let output = resolve_output_path(
        input,
        config.output_dir.as_deref(),
        &config.suffix,
        config.auto_increment,
    );
    fs::write(&output, &result.bytes)?;

    let status = if result.succeeded {
        FileStatus::Succeeded
    } else {
        FileStatus::Fallback
    };
    let output_bytes = result.bytes.len() as u64;
    match status {
        FileStatus::Fallback => warn!(
            input = %input.display(),
            target = target.bytes(),
            achieved = output_bytes,
            trials = result.trials_used,
            "target not reachable, wrote closest result"
        ),
        _ => info!(
            input = %input.display(),
            output = %output.display(),
            achieved = output_bytes,
            trials = result.trials_used,
            "file done"
        ),
    }

    Ok(FileReport {
        input: input.to_path_buf(),
        output: Some(output),
        format: Some(format),
        mode: config.mode.name().to_string(),
        target_bytes: target.bytes(),
        input_bytes,
        output_bytes,
        quality: result.quality,
        dpi: result.dpi,
        trials_used: result.trials_used,
        status,
        message: None,
    })
}
