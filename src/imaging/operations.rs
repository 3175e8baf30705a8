//! High-level fitting operations.
//!
//! These functions combine the [`search`](crate::search) engine with codec
//! execution. They take a decoded image and a target, drive trial encodes
//! through the codec, and return the final in-memory output.
//!
//! | Operation | Searches | Fallback |
//! |---|---|---|
//! | [`fit_quality`] | quality at fixed (or no) DPI | closest trial |
//! | [`fit_dpi`] | DPI at top quality, then quality at that DPI | closest of both |
//! | [`apply_fixed_dpi`] | none | n/a |

use super::backend::{Codec, CodecError};
use super::format::OutputFormat;
use super::params::{Dpi, EncodeSettings, Quality};
use crate::search::{
    DpiDomain, QualityDomain, SearchError, SearchOutcome, SizeTarget, search_setting,
};
use image::DynamicImage;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Result type for fitting operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Final output of a fitting run.
#[derive(Debug, Clone)]
pub struct FittedImage {
    pub bytes: Vec<u8>,
    pub quality: Option<Quality>,
    pub dpi: Option<Dpi>,
    /// `true` when the output is inside the tolerance band.
    pub succeeded: bool,
    /// Trial encodes across every search that ran, excluding the final encode.
    pub trials_used: u32,
}

fn encode_len(
    codec: &impl Codec,
    image: &DynamicImage,
    format: OutputFormat,
    settings: &EncodeSettings,
    setting: u32,
) -> Result<u64> {
    let bytes = codec
        .encode(image, format, settings)
        .map_err(|source| SearchError::Codec { setting, source })?;
    debug!(
        format = %format,
        setting,
        bytes = bytes.len(),
        "trial encode"
    );
    Ok(bytes.len() as u64)
}

/// Binary-search quality for `target`, optionally with DPI metadata attached.
pub fn search_quality(
    codec: &impl Codec,
    image: &DynamicImage,
    format: OutputFormat,
    target: &SizeTarget,
    domain: QualityDomain,
    dpi: Option<Dpi>,
) -> Result<SearchOutcome> {
    search_setting(domain, target, |quality| {
        let settings = EncodeSettings {
            quality: Some(Quality::new(quality)),
            dpi,
        };
        encode_len(codec, image, format, &settings, quality)
    })
}

/// Binary-search DPI for `target`, encoding every trial at `quality`.
pub fn search_dpi(
    codec: &impl Codec,
    image: &DynamicImage,
    format: OutputFormat,
    target: &SizeTarget,
    domain: DpiDomain,
    quality: Option<Quality>,
) -> Result<SearchOutcome> {
    search_setting(domain, target, |dpi| {
        let settings = EncodeSettings {
            quality,
            dpi: Some(Dpi::uniform(dpi)),
        };
        encode_len(codec, image, format, &settings, dpi)
    })
}

fn final_encode(
    codec: &impl Codec,
    image: &DynamicImage,
    format: OutputFormat,
    settings: &EncodeSettings,
) -> Result<Vec<u8>> {
    let setting = settings
        .quality
        .map(Quality::value)
        .or(settings.dpi.map(|d| d.x))
        .unwrap_or_default();
    codec
        .encode(image, format, settings)
        .map_err(|source| SearchError::Codec { setting, source })
}

/// Size-mode fit: search quality, then encode the chosen setting once more.
pub fn fit_quality(
    codec: &impl Codec,
    image: &DynamicImage,
    format: OutputFormat,
    target: &SizeTarget,
    domain: QualityDomain,
    dpi: Option<Dpi>,
) -> Result<FittedImage> {
    let outcome = search_quality(codec, image, format, target, domain, dpi)?;
    let quality = Quality::new(outcome.final_setting);
    let bytes = final_encode(
        codec,
        image,
        format,
        &EncodeSettings {
            quality: Some(quality),
            dpi,
        },
    )?;

    Ok(FittedImage {
        bytes,
        quality: Some(quality),
        dpi,
        succeeded: outcome.succeeded,
        trials_used: outcome.trials_used,
    })
}

/// Auto-DPI fit.
///
/// Every DPI trial encodes at the top of `quality_domain` (lossy formats) or
/// losslessly. When no DPI lands inside the band and the format has a
/// quality knob, a quality search runs at the chosen DPI; whichever of the
/// two searches ended closer to the target wins.
pub fn fit_dpi(
    codec: &impl Codec,
    image: &DynamicImage,
    format: OutputFormat,
    target: &SizeTarget,
    dpi_domain: DpiDomain,
    quality_domain: Option<QualityDomain>,
) -> Result<FittedImage> {
    let top_quality = quality_domain.map(|d| Quality::new(d.max()));
    let dpi_outcome = search_dpi(codec, image, format, target, dpi_domain, top_quality)?;
    let dpi = Dpi::uniform(dpi_outcome.final_setting);

    let quality_outcome = match quality_domain {
        Some(domain) if !dpi_outcome.succeeded => {
            debug!(
                format = %format,
                dpi = dpi.x,
                closest = dpi_outcome.final_bytes,
                "DPI alone missed the target, searching quality"
            );
            Some(search_quality(
                codec,
                image,
                format,
                target,
                domain,
                Some(dpi),
            )?)
        }
        _ => None,
    };
    let trials_used =
        dpi_outcome.trials_used + quality_outcome.as_ref().map_or(0, |o| o.trials_used);

    let (quality, succeeded) = match quality_outcome {
        Some(outcome)
            if outcome.succeeded
                || target.distance(outcome.final_bytes)
                    < target.distance(dpi_outcome.final_bytes) =>
        {
            (Some(Quality::new(outcome.final_setting)), outcome.succeeded)
        }
        _ => (top_quality, dpi_outcome.succeeded),
    };

    let settings = EncodeSettings {
        quality,
        dpi: Some(dpi),
    };
    let bytes = final_encode(codec, image, format, &settings)?;
    Ok(FittedImage {
        bytes,
        quality,
        dpi: Some(dpi),
        succeeded,
        trials_used,
    })
}

/// Fixed-DPI mode: set resolution metadata without changing pixels.
pub fn apply_fixed_dpi(
    codec: &impl Codec,
    source: &[u8],
    format: OutputFormat,
    dpi: Dpi,
) -> std::result::Result<Vec<u8>, CodecError> {
    codec.rewrite_dpi(source, format, dpi)
}

/// SHA-256 of an image's dimensions and RGBA pixels, as lowercase hex.
///
/// Two images with the same digest render identically; container metadata
/// such as DPI does not contribute.
pub fn pixel_digest(image: &DynamicImage) -> String {
    let rgba = image.to_rgba8();
    let mut hasher = Sha256::new();
    hasher.update(rgba.width().to_le_bytes());
    hasher.update(rgba.height().to_le_bytes());
    hasher.update(rgba.as_raw());
    format!("{:x}", hasher.finalize())
}
