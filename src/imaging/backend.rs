//! Codec trait and shared types.
//!
//! The [`Codec`] trait is the only place pixels turn into bytes. It defines
//! three operations the search and batch layers need:
//!
//! - `decode`: read a file into pixels plus whatever DPI it already declares
//! - `encode`: produce a complete in-memory file for one format/settings pair
//! - `rewrite_dpi`: change resolution metadata on an already-encoded stream
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests use the recording
//! [`MockCodec`](tests::MockCodec), whose output size is a linear function
//! of the requested setting.

use super::format::OutputFormat;
use super::params::{Dpi, EncodeSettings};
use image::DynamicImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Metadata rewrite failed: {0}")]
    Metadata(String),
}

/// A decoded input file.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub pixels: DynamicImage,
    /// Resolution declared by the input file, if any.
    pub dpi: Option<Dpi>,
}

impl SourceImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Trait for codec backends.
///
/// Every encode returns a complete file image in memory; nothing is written
/// to disk here. Encoding must be deterministic: the same pixels and settings
/// always produce the same bytes, which lets the batch layer re-encode the
/// chosen setting instead of holding every trial's output.
pub trait Codec {
    /// Decode a file and read its declared DPI.
    fn decode(&self, path: &Path) -> Result<SourceImage, CodecError>;

    /// Encode pixels to `format` with the given settings.
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        settings: &EncodeSettings,
    ) -> Result<Vec<u8>, CodecError>;

    /// Set DPI on an encoded stream, leaving pixel data identical.
    fn rewrite_dpi(
        &self,
        source: &[u8],
        format: OutputFormat,
        dpi: Dpi,
    ) -> Result<Vec<u8>, CodecError>;
}
