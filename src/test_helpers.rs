//! Shared test utilities: synthetic images and fixture files.
//!
//! Real photos compress in a wide, smooth size range; flat test images do
//! not. [`noisy_image`] gives the codecs something with texture so size
//! searches behave like they would on camera output.

use crate::imaging::Dpi;
use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::{DynamicImage, ExtendedColorType, Rgb, RgbImage};
use std::path::Path;

/// Deterministic pseudo-random RGB image (xorshift, seeded).
pub fn noisy_image(width: u32, height: u32, seed: u64) -> DynamicImage {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    let img = RgbImage::from_fn(width, height, |x, y| {
        let n = next();
        // Blend noise with a gradient so there is some structure too.
        let base = ((x + y) * 255 / (width + height).max(1)) as u8;
        Rgb([
            base.wrapping_add((n & 0x3f) as u8),
            base.wrapping_add(((n >> 8) & 0x3f) as u8),
            (n >> 16) as u8,
        ])
    });
    DynamicImage::ImageRgb8(img)
}

/// Smooth diagonal gradient.
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    DynamicImage::ImageRgb8(img)
}

/// Write `image` as a JPEG fixture, optionally with a JFIF density.
pub fn write_jpeg(path: &Path, image: &DynamicImage, quality: u8, dpi: Option<Dpi>) {
    let rgb = image.to_rgb8();
    let mut buf = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        if let Some(dpi) = dpi {
            encoder.set_pixel_density(PixelDensity::dpi(dpi.as_u16_pair().0));
        }
        encoder
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
            .unwrap();
    }
    std::fs::write(path, buf).unwrap();
}
