// src/engine/decoder.rs
//
// Decoder operations: PNG through zune-png, everything else through the
// image crate. The RGBA conversion the core expects happens here.

use crate::engine::common::run_with_panic_policy;
use crate::engine::firewall::FirewallConfig;
use crate::engine::raster::RasterImage;
use crate::error::{Result, StampcutError};
use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageFormat, ImageReader, RgbImage, RgbaImage};
use std::io::Cursor;
use tracing::debug;
use zune_core::bytestream::ZCursor;
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_png::PngDecoder;

use crate::engine::MAX_DIMENSION;

/// Decode non-PNG formats using the image crate under the global panic policy.
pub fn decode_with_image_crate(data: &[u8]) -> Result<DynamicImage> {
    run_with_panic_policy("decode:image", || {
        let img = image::load_from_memory(data)
            .map_err(|e| StampcutError::decode_failed(format!("decode failed: {e}")))?;
        check_dimensions(img.width(), img.height())?;
        Ok(img)
    })
}

/// Decode PNG using zune-png. 16-bit input is stripped to 8-bit.
pub fn decode_png_zune(data: &[u8]) -> Result<DynamicImage> {
    run_with_panic_policy("decode:png", || {
        let options = DecoderOptions::default().png_set_strip_to_8bit(true);
        let mut decoder = PngDecoder::new_with_options(ZCursor::new(data), options);
        let pixels = decoder
            .decode()
            .map_err(|e| StampcutError::decode_failed(format!("png: decode failed: {e:?}")))?;

        let info = decoder
            .info()
            .ok_or_else(|| StampcutError::decode_failed("png: missing header info"))?;
        let width = info.width as u32;
        let height = info.height as u32;
        check_dimensions(width, height)?;

        let buf = match pixels {
            zune_core::result::DecodingResult::U8(v) => v,
            _ => return Err(StampcutError::decode_failed("png: unexpected non-U8 pixel buffer")),
        };

        let colorspace = decoder
            .colorspace()
            .ok_or_else(|| StampcutError::decode_failed("png: missing colorspace"))?;

        let img = match colorspace {
            ColorSpace::RGB => RgbImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| StampcutError::decode_failed("png: failed to build RGB image"))?,
            ColorSpace::RGBA => RgbaImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgba8)
                .ok_or_else(|| StampcutError::decode_failed("png: failed to build RGBA image"))?,
            ColorSpace::Luma => GrayImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| StampcutError::decode_failed("png: failed to build Luma image"))?,
            ColorSpace::LumaA => GrayAlphaImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLumaA8)
                .ok_or_else(|| StampcutError::decode_failed("png: failed to build LumaA image"))?,
            other => {
                return Err(StampcutError::decode_failed(format!(
                    "png: unsupported colorspace {other:?}"
                )))
            }
        };
        Ok(img)
    })
}

/// Detect input format using magic bytes. Returns None if unknown.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb).
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    use super::MAX_PIXELS;
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(StampcutError::dimension_exceeds_limit(width.max(height), MAX_DIMENSION));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(StampcutError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Header dimensions, if the container can be read without decoding.
pub fn peek_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Inspect encoded bytes and ensure the image dimensions are safe before decoding.
pub fn ensure_dimensions_safe(bytes: &[u8]) -> Result<()> {
    match peek_dimensions(bytes) {
        Some((width, height)) => check_dimensions(width, height),
        None => Ok(()),
    }
}

/// Decode any supported container into the RGBA raster the core works on.
///
/// The firewall sees the byte length first, then the header dimensions,
/// so oversized inputs are rejected before any pixel buffer is allocated.
pub fn decode_rgba(bytes: &[u8], firewall: &FirewallConfig) -> Result<RasterImage> {
    firewall.enforce_source_len(bytes.len())?;
    let format = detect_format(bytes);
    if let Some((width, height)) = peek_dimensions(bytes) {
        check_dimensions(width, height)?;
        firewall.enforce_pixels(width, height)?;
    }

    let img = match format {
        Some(ImageFormat::Png) => decode_png_zune(bytes)?,
        Some(ImageFormat::Jpeg) | Some(ImageFormat::WebP) => decode_with_image_crate(bytes)?,
        Some(other) => return Err(StampcutError::unsupported_format(format!("{other:?}"))),
        None => return Err(StampcutError::unsupported_format("unknown")),
    };
    firewall.enforce_pixels(img.width(), img.height())?;
    debug!(
        format = ?format,
        width = img.width(),
        height = img.height(),
        color = ?img.color(),
        "decoded"
    );

    match img {
        DynamicImage::ImageRgba8(rgba) => RasterImage::from_rgba(rgba),
        other => RasterImage::from_rgba(other.into_rgba8()),
    }
}
