//! Output formats and what each one can be tuned with.
//!
//! The capability table answers two questions per format: does it have a
//! lossy quality knob, and can it carry DPI metadata? Size mode requires the
//! former, DPI modes the latter. Formats and extensions outside this table
//! are rejected before any decode happens.
//!
//! | Format | Extensions      | Quality | Quality range | DPI carrier        |
//! |--------|-----------------|---------|---------------|--------------------|
//! | JPEG   | `jpg`, `jpeg`   | yes     | 1–95          | JFIF APP0 density  |
//! | WebP   | `webp`          | yes     | 1–100         | EXIF in VP8X       |
//! | PNG    | `png`           | no      |               | `pHYs` chunk       |
//! | TIFF   | `tif`, `tiff`   | no      |               | IFD resolution tags|

use crate::search::{QualityDomain, SettingDomain};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Tiff,
}

/// What a format can be tuned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Default lossy quality range; `None` for lossless formats.
    pub quality_domain: Option<QualityDomain>,
    pub supports_dpi: bool,
}

impl Capabilities {
    pub fn supports_quality(&self) -> bool {
        self.quality_domain.is_some()
    }
}

const EXTENSIONS: &[(&str, OutputFormat)] = &[
    ("jpg", OutputFormat::Jpeg),
    ("jpeg", OutputFormat::Jpeg),
    ("png", OutputFormat::Png),
    ("webp", OutputFormat::WebP),
    ("tif", OutputFormat::Tiff),
    ("tiff", OutputFormat::Tiff),
];

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::WebP,
        OutputFormat::Tiff,
    ];

    /// Case-insensitive extension lookup.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, format)| *format)
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
            OutputFormat::WebP => "WebP",
            OutputFormat::Tiff => "TIFF",
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            OutputFormat::Jpeg => Capabilities {
                quality_domain: Some(SettingDomain::from_bounds(1, 95)),
                supports_dpi: true,
            },
            OutputFormat::WebP => Capabilities {
                quality_domain: Some(SettingDomain::from_bounds(1, 100)),
                supports_dpi: true,
            },
            OutputFormat::Png | OutputFormat::Tiff => Capabilities {
                quality_domain: None,
                supports_dpi: true,
            },
        }
    }

    /// Map from the `image` crate's content sniffing.
    pub fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
            image::ImageFormat::Png => Some(OutputFormat::Png),
            image::ImageFormat::WebP => Some(OutputFormat::WebP),
            image::ImageFormat::Tiff => Some(OutputFormat::Tiff),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Every extension accepted as input, lowercase.
pub fn supported_extensions() -> impl Iterator<Item = &'static str> {
    EXTENSIONS.iter().map(|(ext, _)| *ext)
}

/// Whether a path has an extension from the capability table.
pub fn is_supported_path(path: &Path) -> bool {
    OutputFormat::from_path(path).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(OutputFormat::from_extension("JPG"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_extension("Jpeg"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_extension("TIF"), Some(OutputFormat::Tiff));
        assert_eq!(OutputFormat::from_extension("webp"), Some(OutputFormat::WebP));
    }

    #[test]
    fn unknown_extensions_rejected() {
        assert_eq!(OutputFormat::from_extension("gif"), None);
        assert_eq!(OutputFormat::from_extension("avif"), None);
        assert_eq!(OutputFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn from_path_uses_last_extension() {
        assert_eq!(
            OutputFormat::from_path(Path::new("/photos/archive.tar.png")),
            Some(OutputFormat::Png)
        );
    }

    #[test]
    fn lossy_formats_have_quality_domains() {
        let jpeg = OutputFormat::Jpeg.capabilities().quality_domain.unwrap();
        assert_eq!((jpeg.min(), jpeg.max()), (1, 95));
        let webp = OutputFormat::WebP.capabilities().quality_domain.unwrap();
        assert_eq!((webp.min(), webp.max()), (1, 100));
    }

    #[test]
    fn lossless_formats_only_support_dpi() {
        for format in [OutputFormat::Png, OutputFormat::Tiff] {
            let caps = format.capabilities();
            assert!(!caps.supports_quality());
            assert!(caps.supports_dpi);
        }
    }

    #[test]
    fn every_format_carries_dpi() {
        assert!(OutputFormat::ALL.iter().all(|f| f.capabilities().supports_dpi));
    }

    #[test]
    fn supported_extensions_cover_table() {
        let exts: Vec<_> = supported_extensions().collect();
        assert_eq!(exts, ["jpg", "jpeg", "png", "webp", "tif", "tiff"]);
    }
}
