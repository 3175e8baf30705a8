//! Image codecs and fitting: pure Rust plus libwebp.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` |
//! | **Encode JPEG** | `image` JPEG encoder, JFIF density |
//! | **Encode WebP** | `webp` (lossy), EXIF resolution chunk |
//! | **Encode PNG / TIFF** | `png` / `tiff` encoders with native resolution fields |
//! | **DPI metadata** | custom parser/writer (JFIF, pHYs, TIFF IFD, WebP EXIF) |
//!
//! The module is split into:
//! - **Format**: Capability table (quality range, DPI support) per output format
//! - **Parameters**: Data structures describing one encode
//! - **Backend**: [`Codec`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining the search engine + codec

pub mod backend;
pub mod dpi_metadata;
pub mod format;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{Codec, CodecError, SourceImage};
pub use format::{Capabilities, OutputFormat};
pub use operations::{FittedImage, apply_fixed_dpi, fit_dpi, fit_quality, pixel_digest};
pub use params::{Dpi, EncodeSettings, Quality};
pub use rust_backend::RustBackend;
