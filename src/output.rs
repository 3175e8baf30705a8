//! CLI output formatting.
//!
//! Every processed file gets a header line (positional index, file name and
//! where the output went) followed by indented detail lines:
//!
//! ```text
//! 001 beach.jpg → out/beach.jpg
//!     2.4 MB → 497.1 KB (target 500.0 KB, -0.6%)
//!     quality 83, 7 trials
//! 002 scan.tiff → scan_1.tiff
//!     9.1 MB → 1.2 MB (target 1.0 MB, +20.0%)
//!     600 DPI, 12 trials
//!     fallback: closest result written
//! 003 notes.png
//!     failed: Unsupported format for notes.png: PNG has no quality setting
//! ```
//!
//! The batch ends with a summary block:
//!
//! ```text
//! Processed 3 files: 1 succeeded, 1 fallback, 1 failed
//!     Success rate: 33.3%
//!     Trials: 19
//!     Size: 11.5 MB → 1.7 MB (85.6% smaller)
//! ```
//!
//! Each `format_*` function returns `Vec<String>` for testability and has a
//! `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::process::ProcessEvent;
use crate::report::{BatchSummary, FileReport, FileStatus};
use crate::size_spec::format_bytes;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Render an integer with thousands separators: `1234567` → `1,234,567`.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn plural(n: u64, word: &str) -> String {
    if n == 1 {
        format!("{} {word}", format_count(n))
    } else {
        format!("{} {word}s", format_count(n))
    }
}

/// `quality 83`, `300 DPI`, `quality 70 @ 150 DPI`, or empty.
fn format_setting(report: &FileReport) -> String {
    match (report.quality, report.dpi) {
        (Some(q), Some(d)) => format!("quality {q} @ {d} DPI"),
        (Some(q), None) => format!("quality {q}"),
        (None, Some(d)) => format!("{d} DPI"),
        (None, None) => String::new(),
    }
}

// ============================================================================
// Per-file lines
// ============================================================================

/// Lines for one finished file.
pub fn format_file_line(index: usize, report: &FileReport) -> Vec<String> {
    let name = file_name(&report.input);
    let mut lines = Vec::new();

    let Some(output) = &report.output else {
        lines.push(format!("{} {}", format_index(index), name));
        let message = report.message.as_deref().unwrap_or("unknown error");
        lines.push(format!("    failed: {message}"));
        return lines;
    };

    let shown = if output.parent() == report.input.parent() {
        file_name(output)
    } else {
        output.display().to_string()
    };
    lines.push(format!("{} {} → {}", format_index(index), name, shown));
    lines.push(format!(
        "    {} → {} (target {}, {:+.1}%)",
        format_bytes(report.input_bytes),
        format_bytes(report.output_bytes),
        format_bytes(report.target_bytes),
        report.deviation_percent()
    ));

    let setting = format_setting(report);
    let trials = plural(u64::from(report.trials_used), "trial");
    lines.push(if setting.is_empty() {
        format!("    {trials}")
    } else {
        format!("    {setting}, {trials}")
    });

    if report.status == FileStatus::Fallback {
        lines.push("    fallback: closest result written".to_string());
    }
    lines
}

/// Lines for a progress event; only finished files produce output.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::FileStarted { .. } => Vec::new(),
        ProcessEvent::FileFinished { index, report, .. } => format_file_line(*index, report),
    }
}

// ============================================================================
// Batch summary
// ============================================================================

pub fn format_summary(summary: &BatchSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Processed {}: {} succeeded, {} fallback, {} failed",
        plural(summary.processed() as u64, "file"),
        summary.succeeded,
        summary.fallback,
        summary.failed
    )];
    if summary.processed() == 0 {
        return lines;
    }

    lines.push(format!("    Success rate: {:.1}%", summary.success_rate()));
    lines.push(format!("    Trials: {}", format_count(summary.total_trials)));

    if summary.written() > 0 {
        let reduction = summary.reduction_percent();
        let direction = if reduction >= 0.0 { "smaller" } else { "larger" };
        lines.push(format!(
            "    Size: {} → {} ({:.1}% {direction})",
            format_bytes(summary.total_input_bytes),
            format_bytes(summary.total_output_bytes),
            reduction.abs()
        ));
    }
    lines
}

pub fn print_summary(summary: &BatchSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}
