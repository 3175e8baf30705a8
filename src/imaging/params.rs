//! Parameter types for encode operations.
//!
//! These structs describe *what* an encode should look like, not *how* it is
//! produced. They are the interface between the search-driving
//! [`operations`](super::operations) module and the [`backend`](super::backend)
//! that turns pixels into bytes, so a mock codec can stand in during tests.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`Dpi`]: Horizontal and vertical resolution in dots per inch.
//! - [`EncodeSettings`]: Optional quality plus optional DPI for a single encode.

use serde::Serialize;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Resolution metadata in dots per inch.
///
/// Changing DPI never resamples pixels; it only changes the header fields
/// that tell printers and layout software how large the image is physically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dpi {
    pub x: u32,
    pub y: u32,
}

impl Dpi {
    /// Same resolution on both axes, clamped to at least 1.
    pub fn uniform(value: u32) -> Self {
        let value = value.max(1);
        Self { x: value, y: value }
    }

    /// Both axes clamped into the 16-bit range used by JFIF density fields.
    pub fn as_u16_pair(self) -> (u16, u16) {
        let clamp = |v: u32| v.clamp(1, u32::from(u16::MAX)) as u16;
        (clamp(self.x), clamp(self.y))
    }

    /// Pixels per metre, as stored in PNG `pHYs`.
    pub fn as_pixels_per_metre(self) -> (u32, u32) {
        let convert = |v: u32| (f64::from(v) / METRES_PER_INCH).round() as u32;
        (convert(self.x), convert(self.y))
    }

    /// Inverse of [`as_pixels_per_metre`](Self::as_pixels_per_metre).
    pub fn from_pixels_per_metre(x: u32, y: u32) -> Self {
        let convert = |v: u32| (f64::from(v) * METRES_PER_INCH).round() as u32;
        Self {
            x: convert(x),
            y: convert(y),
        }
    }

    /// Dots per centimetre converted to DPI.
    pub fn from_dots_per_cm(x: f64, y: f64) -> Self {
        Self {
            x: (x * CM_PER_INCH).round() as u32,
            y: (y * CM_PER_INCH).round() as u32,
        }
    }
}

impl std::fmt::Display for Dpi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.x == self.y {
            write!(f, "{} DPI", self.x)
        } else {
            write!(f, "{}x{} DPI", self.x, self.y)
        }
    }
}

const METRES_PER_INCH: f64 = 0.0254;
const CM_PER_INCH: f64 = 2.54;

/// Settings for one encode call.
///
/// `quality` is ignored by lossless formats; `dpi: None` writes no
/// resolution metadata at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeSettings {
    pub quality: Option<Quality>,
    pub dpi: Option<Dpi>,
}

impl EncodeSettings {
    pub fn quality(quality: u32) -> Self {
        Self {
            quality: Some(Quality::new(quality)),
            dpi: None,
        }
    }

    pub fn with_dpi(mut self, dpi: Dpi) -> Self {
        self.dpi = Some(dpi);
        self
    }
}
