// src/engine/encoder.rs
//
// PNG emission: image crate encode, then lossless oxipng recompression.

use crate::engine::common::run_with_panic_policy;
use crate::engine::raster::RasterImage;
use crate::error::{Result, StampcutError};
use image::ImageFormat;
use std::io::Cursor;
use tracing::debug;

/// oxipng preset used for sticker artifacts.
pub const DEFAULT_PNG_PRESET: u8 = 2;
/// Highest preset oxipng accepts.
pub const MAX_PNG_PRESET: u8 = 6;

/// Plain PNG encode without optimization.
pub fn encode_png_raw(img: &RasterImage) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        let mut buf = Vec::new();
        img.as_rgba()
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| StampcutError::encode_failed("png", format!("PNG encode failed: {e}")))?;
        Ok(buf)
    })
}

/// Encode and optimize with oxipng at `preset` (0..=6). Chunks are kept.
pub fn encode_png(img: &RasterImage, preset: u8) -> Result<Vec<u8>> {
    if preset > MAX_PNG_PRESET {
        return Err(StampcutError::invalid_config(
            "png_preset",
            preset.to_string(),
            format!("must be between 0 and {MAX_PNG_PRESET}"),
        ));
    }
    let buf = encode_png_raw(img)?;
    run_with_panic_policy("encode:oxipng", || {
        let mut options = oxipng::Options::from_preset(preset);
        options.strip = oxipng::StripChunks::None;
        let optimized = oxipng::optimize_from_memory(&buf, &options).map_err(|e| {
            StampcutError::encode_failed("png", format!("oxipng optimization failed: {e}"))
        })?;
        debug!(raw = buf.len(), optimized = optimized.len(), preset, "png encoded");
        Ok(optimized)
    })
}
