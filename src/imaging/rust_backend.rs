//! Pure Rust codec backend.
//!
//! Everything is statically linked into the binary; no libvips, no
//! ImageMagick.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::load_from_memory` |
//! | Read DPI | custom [`dpi_metadata`](super::dpi_metadata) (JFIF, pHYs, IFD, EXIF) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` with JFIF pixel density |
//! | Encode → WebP (lossy) | `webp::Encoder` (libwebp), EXIF chunk for DPI |
//! | Encode → PNG | `png::Encoder`, `pHYs` via `set_pixel_dims` |
//! | Encode → TIFF | `tiff::encoder::TiffEncoder`, Deflate, resolution tags |
//! | Fixed DPI | byte-level header patch in [`dpi_metadata`](super::dpi_metadata), pixels untouched |
//!
//! The `image` crate's own WebP encoder is lossless-only, so lossy WebP goes
//! through the `webp` crate. PNG and TIFF encodes keep the source's channel
//! layout and bit depth (8 or 16), so a 16-bit greyscale scan stays one.

use super::backend::{Codec, CodecError, SourceImage};
use super::dpi_metadata;
use super::format::OutputFormat;
use super::params::{Dpi, EncodeSettings, Quality};
use image::codecs::jpeg::{JpegEncoder, PixelDensity, PixelDensityUnit};
use image::{DynamicImage, ExtendedColorType};
use std::io::Cursor;
use std::path::Path;

/// Encoder entry in the per-format dispatch table.
type EncodeFn = fn(&DynamicImage, &EncodeSettings) -> Result<Vec<u8>, CodecError>;

fn encoder_for(format: OutputFormat) -> EncodeFn {
    match format {
        OutputFormat::Jpeg => encode_jpeg,
        OutputFormat::WebP => encode_webp,
        OutputFormat::Png => encode_png,
        OutputFormat::Tiff => encode_tiff,
    }
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Quality used when a lossy format is encoded without an explicit setting.
fn default_quality(format: OutputFormat) -> Quality {
    format
        .capabilities()
        .quality_domain
        .map_or_else(Quality::default, |domain| Quality::new(domain.max()))
}

fn encode_jpeg(image: &DynamicImage, settings: &EncodeSettings) -> Result<Vec<u8>, CodecError> {
    let quality = settings
        .quality
        .unwrap_or_else(|| default_quality(OutputFormat::Jpeg));
    let rgb = image.to_rgb8();

    let mut buf = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
        if let Some(dpi) = settings.dpi {
            encoder.set_pixel_density(PixelDensity {
                density: dpi.as_u16_pair(),
                unit: PixelDensityUnit::Inches,
            });
        }
        encoder
            .encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                ExtendedColorType::Rgb8,
            )
            .map_err(|e| CodecError::Encode(format!("JPEG encode failed: {e}")))?;
    }
    Ok(buf)
}

fn encode_webp(image: &DynamicImage, settings: &EncodeSettings) -> Result<Vec<u8>, CodecError> {
    let quality = settings
        .quality
        .unwrap_or_else(|| default_quality(OutputFormat::WebP));
    let (width, height) = (image.width(), image.height());

    let memory = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height)
            .encode_simple(false, quality.value() as f32)
    } else {
        let rgb = image.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height)
            .encode_simple(false, quality.value() as f32)
    }
    .map_err(|e| CodecError::Encode(format!("WebP encode failed: {e:?}")))?;

    match settings.dpi {
        Some(dpi) => dpi_metadata::write_webp_dpi(&memory, dpi),
        None => Ok(memory.to_vec()),
    }
}

fn encode_png(image: &DynamicImage, settings: &EncodeSettings) -> Result<Vec<u8>, CodecError> {
    let (color, depth, pixels) = png_layout(image);
    let png_err = |e: png::EncodingError| CodecError::Encode(format!("PNG encode failed: {e}"));

    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, image.width(), image.height());
        encoder.set_color(color);
        encoder.set_depth(depth);
        encoder.set_compression(png::Compression::Best);
        if let Some(dpi) = settings.dpi {
            let (xppu, yppu) = dpi.as_pixels_per_metre();
            encoder.set_pixel_dims(Some(png::PixelDimensions {
                xppu,
                yppu,
                unit: png::Unit::Meter,
            }));
        }
        let mut writer = encoder.write_header().map_err(png_err)?;
        writer.write_image_data(&pixels).map_err(png_err)?;
        writer.finish().map_err(png_err)?;
    }
    Ok(buf)
}

/// PNG color type, bit depth and raw scanline samples for `image`.
///
/// 16-bit samples go out big-endian. Float images are stored as 16-bit.
fn png_layout(image: &DynamicImage) -> (png::ColorType, png::BitDepth, Vec<u8>) {
    use png::BitDepth::{Eight, Sixteen};
    use png::ColorType::{Grayscale, GrayscaleAlpha, Rgb, Rgba};

    match image {
        DynamicImage::ImageLuma8(buf) => (Grayscale, Eight, buf.to_vec()),
        DynamicImage::ImageLumaA8(buf) => (GrayscaleAlpha, Eight, buf.to_vec()),
        DynamicImage::ImageRgb8(buf) => (Rgb, Eight, buf.to_vec()),
        DynamicImage::ImageRgba8(buf) => (Rgba, Eight, buf.to_vec()),
        DynamicImage::ImageLuma16(buf) => (Grayscale, Sixteen, big_endian(buf)),
        DynamicImage::ImageLumaA16(buf) => (GrayscaleAlpha, Sixteen, big_endian(buf)),
        DynamicImage::ImageRgb16(buf) => (Rgb, Sixteen, big_endian(buf)),
        DynamicImage::ImageRgba16(buf) => (Rgba, Sixteen, big_endian(buf)),
        other if other.color().has_alpha() => (Rgba, Sixteen, big_endian(&other.to_rgba16())),
        other => (Rgb, Sixteen, big_endian(&other.to_rgb16())),
    }
}

fn big_endian(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}

fn encode_tiff(image: &DynamicImage, settings: &EncodeSettings) -> Result<Vec<u8>, CodecError> {
    use tiff::encoder::colortype::{Gray8, Gray16, RGB8, RGB16, RGBA8, RGBA16};

    let (width, height, dpi) = (image.width(), image.height(), settings.dpi);
    match image {
        DynamicImage::ImageLuma8(buf) => write_tiff::<Gray8>(buf, width, height, dpi),
        DynamicImage::ImageRgb8(buf) => write_tiff::<RGB8>(buf, width, height, dpi),
        DynamicImage::ImageRgba8(buf) => write_tiff::<RGBA8>(buf, width, height, dpi),
        DynamicImage::ImageLuma16(buf) => write_tiff::<Gray16>(buf, width, height, dpi),
        DynamicImage::ImageRgb16(buf) => write_tiff::<RGB16>(buf, width, height, dpi),
        DynamicImage::ImageRgba16(buf) => write_tiff::<RGBA16>(buf, width, height, dpi),
        // The TIFF encoder has no grey + alpha layout.
        DynamicImage::ImageLumaA8(_) => {
            write_tiff::<RGBA8>(&image.to_rgba8(), width, height, dpi)
        }
        other if other.color().has_alpha() => {
            write_tiff::<RGBA16>(&other.to_rgba16(), width, height, dpi)
        }
        other => write_tiff::<RGB16>(&other.to_rgb16(), width, height, dpi),
    }
}

fn write_tiff<C>(
    pixels: &[C::Inner],
    width: u32,
    height: u32,
    dpi: Option<Dpi>,
) -> Result<Vec<u8>, CodecError>
where
    C: tiff::encoder::colortype::ColorType,
    [C::Inner]: tiff::encoder::TiffValue,
{
    use tiff::encoder::{Rational, TiffEncoder, compression::Deflate};
    use tiff::tags::ResolutionUnit;

    let tiff_err = |e: tiff::TiffError| CodecError::Encode(format!("TIFF encode failed: {e}"));

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor).map_err(tiff_err)?;
        let mut tiff_image = encoder
            .new_image_with_compression::<C, _>(width, height, Deflate::default())
            .map_err(tiff_err)?;
        if let Some(dpi) = dpi {
            tiff_image.resolution_unit(ResolutionUnit::Inch);
            tiff_image.x_resolution(Rational { n: dpi.x, d: 1 });
            tiff_image.y_resolution(Rational { n: dpi.y, d: 1 });
        }
        tiff_image.write_data(pixels).map_err(tiff_err)?;
    }
    Ok(cursor.into_inner())
}

fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    image::load_from_memory(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

impl Codec for RustBackend {
    fn decode(&self, path: &Path) -> Result<SourceImage, CodecError> {
        let bytes = std::fs::read(path)?;
        let pixels = decode_bytes(&bytes)
            .map_err(|e| CodecError::Decode(format!("{}: {e}", path.display())))?;
        Ok(SourceImage {
            pixels,
            dpi: dpi_metadata::read_dpi(&bytes),
        })
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        settings: &EncodeSettings,
    ) -> Result<Vec<u8>, CodecError> {
        encoder_for(format)(image, settings)
    }

    fn rewrite_dpi(
        &self,
        source: &[u8],
        format: OutputFormat,
        dpi: Dpi,
    ) -> Result<Vec<u8>, CodecError> {
        let actual = image::guess_format(source)
            .ok()
            .and_then(OutputFormat::from_image_format);

        match (format, actual) {
            (OutputFormat::Jpeg, Some(OutputFormat::Jpeg)) => {
                dpi_metadata::write_jpeg_dpi(source, dpi)
            }
            (OutputFormat::WebP, Some(OutputFormat::WebP)) => {
                dpi_metadata::write_webp_dpi(source, dpi)
            }
            (OutputFormat::Png, Some(OutputFormat::Png)) => dpi_metadata::write_png_dpi(source, dpi),
            (OutputFormat::Tiff, Some(OutputFormat::Tiff)) => {
                dpi_metadata::write_tiff_dpi(source, dpi)
            }
            // Container mismatch (say, PNG bytes behind a .jpg name)
            _ => {
                let pixels = decode_bytes(source)?;
                let settings = EncodeSettings {
                    quality: format
                        .capabilities()
                        .supports_quality()
                        .then(|| default_quality(format)),
                    dpi: Some(dpi),
                };
                self.encode(&pixels, format, &settings)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::operations::pixel_digest;
    use crate::test_helpers::{gradient_image, noisy_image, write_jpeg};
    use image::{ImageBuffer, Luma, Rgb, Rgba};

    fn encode(image: &DynamicImage, format: OutputFormat, settings: EncodeSettings) -> Vec<u8> {
        RustBackend::new().encode(image, format, &settings).unwrap()
    }

    // =========================================================================
    // Encode
    // =========================================================================

    #[test]
    fn every_format_decodes_back_to_same_dimensions() {
        let image = noisy_image(48, 32, 7);
        for format in OutputFormat::ALL {
            let bytes = encode(&image, format, EncodeSettings::default());
            let decoded = decode_bytes(&bytes).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (48, 32), "{format}");
        }
    }

    #[test]
    fn jpeg_size_grows_with_quality() {
        let image = noisy_image(96, 96, 1);
        let low = encode(&image, OutputFormat::Jpeg, EncodeSettings::quality(10)).len();
        let high = encode(&image, OutputFormat::Jpeg, EncodeSettings::quality(90)).len();
        assert!(low < high, "q10={low} q90={high}");
    }

    #[test]
    fn webp_size_grows_with_quality() {
        let image = noisy_image(96, 96, 2);
        let low = encode(&image, OutputFormat::WebP, EncodeSettings::quality(10)).len();
        let high = encode(&image, OutputFormat::WebP, EncodeSettings::quality(90)).len();
        assert!(low < high, "q10={low} q90={high}");
    }

    #[test]
    fn encoding_is_deterministic() {
        let image = noisy_image(64, 64, 3);
        for format in OutputFormat::ALL {
            let settings = EncodeSettings::quality(60).with_dpi(Dpi::uniform(150));
            assert_eq!(
                encode(&image, format, settings),
                encode(&image, format, settings),
                "{format}"
            );
        }
    }

    #[test]
    fn encode_with_dpi_is_readable_for_every_format() {
        let image = gradient_image(40, 30);
        for format in OutputFormat::ALL {
            let settings = EncodeSettings::default().with_dpi(Dpi::uniform(300));
            let bytes = encode(&image, format, settings);
            assert_eq!(
                dpi_metadata::read_dpi(&bytes),
                Some(Dpi::uniform(300)),
                "{format}"
            );
        }
    }

    #[test]
    fn png_and_tiff_are_lossless() {
        let image = noisy_image(32, 32, 4);
        for format in [OutputFormat::Png, OutputFormat::Tiff] {
            let decoded = decode_bytes(&encode(&image, format, EncodeSettings::default())).unwrap();
            assert_eq!(pixel_digest(&decoded), pixel_digest(&image), "{format}");
        }
    }

    // =========================================================================
    // Decode
    // =========================================================================

    #[test]
    fn decode_reads_declared_dpi() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("photo.jpg");
        write_jpeg(&path, &gradient_image(20, 20), 80, Some(Dpi::uniform(96)));

        let source = RustBackend::new().decode(&path).unwrap();
        assert_eq!((source.width(), source.height()), (20, 20));
        assert_eq!(source.dpi, Some(Dpi::uniform(96)));
    }

    #[test]
    fn decode_nonexistent_file_is_io_error() {
        let result = RustBackend::new().decode(Path::new("/nonexistent/image.jpg"));
        assert!(matches!(result, Err(CodecError::Io(_))));
    }

    #[test]
    fn decode_garbage_is_decode_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let result = RustBackend::new().decode(&path);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    // =========================================================================
    // Fixed DPI rewrite
    // =========================================================================

    #[test]
    fn jpeg_rewrite_keeps_pixels_identical() {
        let image = noisy_image(50, 40, 5);
        let original = encode(&image, OutputFormat::Jpeg, EncodeSettings::quality(75));
        let backend = RustBackend::new();

        let rewritten = backend
            .rewrite_dpi(&original, OutputFormat::Jpeg, Dpi::uniform(300))
            .unwrap();
        assert_eq!(dpi_metadata::read_dpi(&rewritten), Some(Dpi::uniform(300)));
        assert_eq!(
            pixel_digest(&decode_bytes(&rewritten).unwrap()),
            pixel_digest(&decode_bytes(&original).unwrap())
        );
    }

    #[test]
    fn webp_rewrite_keeps_pixels_identical() {
        let image = noisy_image(50, 40, 6);
        let original = encode(&image, OutputFormat::WebP, EncodeSettings::quality(70));
        let backend = RustBackend::new();

        let rewritten = backend
            .rewrite_dpi(&original, OutputFormat::WebP, Dpi::uniform(200))
            .unwrap();
        assert_eq!(dpi_metadata::read_dpi(&rewritten), Some(Dpi::uniform(200)));
        assert_eq!(
            pixel_digest(&decode_bytes(&rewritten).unwrap()),
            pixel_digest(&decode_bytes(&original).unwrap())
        );
    }

    /// 8- and 16-bit images in every channel layout both lossless encoders take.
    fn layered_images() -> Vec<DynamicImage> {
        let wide = |x: u32, y: u32, k: u32| ((x * 4001 + y * 173 + k * 12345) % 65536) as u16;
        vec![
            DynamicImage::ImageRgb16(ImageBuffer::from_fn(16, 12, |x, y| {
                Rgb([wide(x, y, 0), wide(x, y, 1), wide(x, y, 2)])
            })),
            DynamicImage::ImageRgba16(ImageBuffer::from_fn(16, 12, |x, y| {
                Rgba([wide(x, y, 3), wide(x, y, 4), wide(x, y, 5), wide(x, y, 6)])
            })),
            DynamicImage::ImageLuma16(ImageBuffer::from_fn(16, 12, |x, y| {
                Luma([wide(x, y, 7)])
            })),
            DynamicImage::ImageLuma8(noisy_image(16, 12, 9).to_luma8()),
            DynamicImage::ImageRgba8(noisy_image(16, 12, 10).to_rgba8()),
        ]
    }

    fn assert_same_samples(left: &DynamicImage, right: &DynamicImage, context: &str) {
        assert_eq!(left.color(), right.color(), "{context}");
        assert_eq!(left.as_bytes(), right.as_bytes(), "{context}");
    }

    #[test]
    fn lossless_encode_keeps_color_type_and_bit_depth() {
        let mut images = layered_images();
        images.push(DynamicImage::ImageLumaA8(noisy_image(16, 12, 11).to_luma_alpha8()));
        let settings = EncodeSettings::default().with_dpi(Dpi::uniform(300));

        for image in &images {
            let png = decode_bytes(&encode(image, OutputFormat::Png, settings)).unwrap();
            assert_same_samples(&png, image, &format!("PNG {:?}", image.color()));
        }
        for image in &layered_images() {
            let tiff = decode_bytes(&encode(image, OutputFormat::Tiff, settings)).unwrap();
            assert_same_samples(&tiff, image, &format!("TIFF {:?}", image.color()));
        }
    }

    #[test]
    fn png_rewrite_only_adds_phys_chunk() {
        let backend = RustBackend::new();
        for image in layered_images() {
            let original = encode(&image, OutputFormat::Png, EncodeSettings::default());
            let rewritten = backend
                .rewrite_dpi(&original, OutputFormat::Png, Dpi::uniform(600))
                .unwrap();

            assert_eq!(rewritten.len(), original.len() + 21);
            assert_eq!(dpi_metadata::read_dpi(&rewritten), Some(Dpi::uniform(600)));
            assert_same_samples(
                &decode_bytes(&rewritten).unwrap(),
                &decode_bytes(&original).unwrap(),
                &format!("{:?}", image.color()),
            );
        }
    }

    #[test]
    fn tiff_rewrite_leaves_strips_in_place() {
        let backend = RustBackend::new();
        for image in layered_images() {
            for settings in [
                EncodeSettings::default(),
                EncodeSettings::default().with_dpi(Dpi::uniform(72)),
            ] {
                let original = encode(&image, OutputFormat::Tiff, settings);
                let rewritten = backend
                    .rewrite_dpi(&original, OutputFormat::Tiff, Dpi::uniform(600))
                    .unwrap();

                // Existing tags are patched in place; missing ones grow the file.
                assert!(rewritten.len() >= original.len());
                if settings.dpi.is_some() {
                    assert_eq!(rewritten.len(), original.len());
                }
                assert_eq!(dpi_metadata::read_dpi(&rewritten), Some(Dpi::uniform(600)));
                assert_same_samples(
                    &decode_bytes(&rewritten).unwrap(),
                    &decode_bytes(&original).unwrap(),
                    &format!("{:?}", image.color()),
                );
            }
        }
    }

    #[test]
    fn palette_png_rewrite_stays_indexed() {
        let mut original = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut original, 4, 2);
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_palette(vec![255, 0, 0, 0, 255, 0, 0, 0, 255]);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0, 1, 2, 0, 2, 1, 0, 1]).unwrap();
        }

        let rewritten = RustBackend::new()
            .rewrite_dpi(&original, OutputFormat::Png, Dpi::uniform(300))
            .unwrap();

        // IHDR color type byte: 3 = indexed.
        assert_eq!(rewritten[25], 3);
        assert_eq!(dpi_metadata::read_dpi(&rewritten), Some(Dpi::uniform(300)));
        assert_same_samples(
            &decode_bytes(&rewritten).unwrap(),
            &decode_bytes(&original).unwrap(),
            "indexed",
        );
    }

    #[test]
    fn mismatched_container_is_reencoded_to_requested_format() {
        let image = gradient_image(16, 16);
        let png_bytes = encode(&image, OutputFormat::Png, EncodeSettings::default());
        let rewritten = RustBackend::new()
            .rewrite_dpi(&png_bytes, OutputFormat::Jpeg, Dpi::uniform(72))
            .unwrap();

        assert_eq!(image::guess_format(&rewritten).unwrap(), image::ImageFormat::Jpeg);
        assert_eq!(dpi_metadata::read_dpi(&rewritten), Some(Dpi::uniform(72)));
    }
}
