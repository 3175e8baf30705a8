//! Per-file results and the batch summary.
//!
//! The processor records one [`FileReport`] per input into a
//! [`BatchSummary`]. Nothing here formats for the terminal (see
//! [`output`](crate::output)); both types serialize to JSON for `--report`.

use crate::imaging::OutputFormat;
use serde::Serialize;
use std::path::PathBuf;

/// How a file ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Output is inside the tolerance band (or fixed DPI was applied).
    Succeeded,
    /// No trial fit; the closest one was written.
    Fallback,
    /// Nothing was written.
    Failed,
}

/// Outcome for a single input file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    /// `size`, `auto-dpi` or `fixed-dpi`.
    pub mode: String,
    pub target_bytes: u64,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub quality: Option<u32>,
    pub dpi: Option<u32>,
    pub trials_used: u32,
    pub status: FileStatus,
    pub message: Option<String>,
}

impl FileReport {
    /// Report for a file that failed before anything was written.
    pub fn failed(
        input: PathBuf,
        mode: impl Into<String>,
        target_bytes: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            input,
            output: None,
            format: None,
            mode: mode.into(),
            target_bytes,
            input_bytes: 0,
            output_bytes: 0,
            quality: None,
            dpi: None,
            trials_used: 0,
            status: FileStatus::Failed,
            message: Some(message.into()),
        }
    }

    /// Signed deviation of the output from the target, as a percentage.
    pub fn deviation_percent(&self) -> f64 {
        if self.target_bytes == 0 {
            return 0.0;
        }
        (self.output_bytes as f64 - self.target_bytes as f64) / self.target_bytes as f64 * 100.0
    }
}

/// Aggregated results for a batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub fallback: usize,
    pub failed: usize,
    pub total_trials: u64,
    pub total_input_bytes: u64,
    pub total_output_bytes: u64,
    pub files: Vec<FileReport>,
}

impl BatchSummary {
    pub fn record(&mut self, report: FileReport) {
        match report.status {
            FileStatus::Succeeded => self.succeeded += 1,
            FileStatus::Fallback => self.fallback += 1,
            FileStatus::Failed => self.failed += 1,
        }
        self.total_trials += u64::from(report.trials_used);
        if report.status != FileStatus::Failed {
            self.total_input_bytes += report.input_bytes;
            self.total_output_bytes += report.output_bytes;
        }
        self.files.push(report);
    }

    /// Files that produced an output (succeeded or fallback).
    pub fn written(&self) -> usize {
        self.succeeded + self.fallback
    }

    pub fn processed(&self) -> usize {
        self.files.len()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Share of processed files inside tolerance, 0–100.
    pub fn success_rate(&self) -> f64 {
        if self.files.is_empty() {
            return 0.0;
        }
        self.succeeded as f64 / self.files.len() as f64 * 100.0
    }

    /// Size reduction over written files, 0–100 (negative when outputs grew).
    pub fn reduction_percent(&self) -> f64 {
        if self.total_input_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.total_output_bytes as f64 / self.total_input_bytes as f64) * 100.0
    }
}
