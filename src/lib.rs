//! # sizefit
//!
//! Shrink (or grow) image files to a target byte size.
//!
//! Given a size such as `500KB`, sizefit binary-searches one encoder setting
//! until the encoded file lands within a tolerance band around the target:
//!
//! ```text
//! size mode      quality ∈ [1, 95]      ──▶  largest quality that fits
//! dpi mode       DPI ∈ [72, 600]        ──▶  largest DPI that fits (then quality)
//! dpi --dpi N    no search              ──▶  resolution metadata rewritten
//! ```
//!
//! Every trial encode happens in memory. Only the chosen result is written,
//! once, next to the input or into `--output`.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`search`] | Codec-agnostic bounded binary search over an integer setting |
//! | [`size_spec`] | `500KB`-style size strings to byte counts and back |
//! | [`imaging`] | Codec trait, pure-Rust encoders, DPI metadata, fitting operations |
//! | [`scan`] | Expands CLI inputs (files, directories) into the list of images |
//! | [`naming`] | Output path resolution with suffix and auto-increment |
//! | [`config`] | `sizefit.toml` loading, merging over defaults, validation |
//! | [`process`] | Batch driver: one file at a time, progress events, reports |
//! | [`report`] | Per-file reports and the batch summary (JSON via serde) |
//! | [`output`] | Terminal formatting for reports and summaries |
//!
//! # Design Decisions
//!
//! ## Search, Not Prediction
//!
//! File size is a function of image content, not just settings, so there is
//! no formula to invert. The search assumes size grows with the setting and
//! caps itself at `⌈log2(N)⌉ + 2` probes for a domain of `N` settings. Codecs
//! that break monotonicity still produce a sensible result because the
//! closest trial seen is always kept.
//!
//! ## The Engine Knows Nothing About Images
//!
//! [`search::search_setting`] takes a domain, a target and a closure that
//! returns a byte count. Quality search, DPI search and the tests all drive
//! the same function, which makes the termination and tie-break rules
//! testable without a codec.
//!
//! ## Pure Rust Where Possible
//!
//! JPEG, PNG and TIFF go through the `image`, `png` and `tiff` crates; lossy
//! WebP goes through `webp` (libwebp). There are no external binaries to
//! install.

pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod process;
pub mod report;
pub mod scan;
pub mod search;
pub mod size_spec;

#[cfg(test)]
pub(crate) mod test_helpers;
