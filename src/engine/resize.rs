// src/engine/resize.rs
//
// Lanczos3 resize of RGBA rasters through fast_image_resize, with the
// `image` crate as fallback.

use crate::engine::raster::RasterImage;
use crate::error::{Result, StampcutError};
use fast_image_resize::{self as fir, ImageBufferError, MulDiv, PixelType, ResizeOptions};
use image::imageops::FilterType;
use tracing::debug;

fn default_resize_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3))
}

/// Resize to exactly `dst_width`×`dst_height` (no aspect handling).
pub fn resize_exact(img: &RasterImage, dst_width: u32, dst_height: u32) -> Result<RasterImage> {
    let (src_width, src_height) = img.dimensions();
    if dst_width == 0 || dst_height == 0 {
        return Err(StampcutError::resize_failed(
            (src_width, src_height),
            (dst_width, dst_height),
            "invalid dimensions for resize",
        ));
    }
    if (src_width, src_height) == (dst_width, dst_height) {
        return Ok(img.clone());
    }

    let mut src_pixels = img.as_raw().to_vec();
    let primary = match fir::images::Image::from_slice_u8(
        src_width,
        src_height,
        src_pixels.as_mut_slice(),
        PixelType::U8x4,
    ) {
        Ok(src_image) => resize_with_source_image(src_image, dst_width, dst_height),
        Err(ImageBufferError::InvalidBufferAlignment) => {
            let mut aligned = fir::images::Image::new(src_width, src_height, PixelType::U8x4);
            aligned.buffer_mut().copy_from_slice(img.as_raw());
            resize_with_source_image(aligned, dst_width, dst_height)
        }
        Err(other) => Err(format!("fir source image error: {other:?}")),
    };

    match primary {
        Ok(pixels) => RasterImage::from_raw(dst_width, dst_height, pixels),
        Err(err) => {
            debug!(error = %err, "fir resize failed, using image crate fallback");
            let resized = image::imageops::resize(img.as_rgba(), dst_width, dst_height, FilterType::Lanczos3);
            RasterImage::from_rgba(resized).map_err(|fallback| {
                StampcutError::resize_failed(
                    (src_width, src_height),
                    (dst_width, dst_height),
                    format!("{err}; image crate fallback failed: {fallback}"),
                )
            })
        }
    }
}

fn resize_with_source_image(
    mut src_image: fir::images::Image<'_>,
    dst_width: u32,
    dst_height: u32,
) -> std::result::Result<Vec<u8>, String> {
    let mut dst_image = fir::images::Image::new(dst_width, dst_height, PixelType::U8x4);
    let mul_div = MulDiv::default();
    mul_div
        .multiply_alpha_inplace(&mut src_image)
        .map_err(|e| format!("failed to premultiply alpha: {e}"))?;

    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &default_resize_options())
        .map_err(|e| format!("fir resize error: {e:?}"))?;

    mul_div
        .divide_alpha_inplace(&mut dst_image)
        .map_err(|e| format!("failed to unpremultiply alpha: {e}"))?;
    Ok(dst_image.into_vec())
}

/// Largest size with the source aspect ratio that fits inside
/// `max_width`×`max_height`. Never enlarges; each side is at least 1.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let scale = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_width.max(1));
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_height.max(1));
    (w, h)
}

/// Shrink-only aspect-preserving resize.
pub fn thumbnail(img: &RasterImage, max_width: u32, max_height: u32) -> Result<RasterImage> {
    let (w, h) = fit_within(img.width(), img.height(), max_width, max_height);
    resize_exact(img, w, h)
}
