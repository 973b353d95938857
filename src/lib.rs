// lib.rs
//
// stampcut: background removal, artifact repair and quality control for
// AI-generated messaging stickers.
//
// Design goals:
// - Deterministic: the same raster and config always give the same output
// - Only border-connected background is removed
// - Quality failures are report values, never errors
// - Cells of a grid are independent and run in parallel

pub mod config;
pub mod engine;
pub mod error;
pub mod ops;

use error::StampcutError;
use image::ImageReader;
use std::io::{BufRead, BufReader, Cursor, Seek};

pub use config::{BackgroundConfig, QualityConfig, Settings};
pub use engine::{Color, QualityReport, RasterImage, StickerPipeline};
pub use error::{ErrorCategory, Result};
pub use ops::{RepairPasses, StickerFormat};

/// Header-only view of an encoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
}

fn read_inspect_metadata<R: BufRead + Seek>(reader: R) -> Result<InspectMetadata> {
    let reader = ImageReader::new(reader)
        .with_guessed_format()
        .map_err(|e| StampcutError::decode_failed(format!("failed to read image header: {e}")))?;

    let format = reader.format().map(|f| format!("{:?}", f).to_lowercase());
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| StampcutError::decode_failed(format!("failed to read dimensions: {e}")))?;
    Ok(InspectMetadata {
        width,
        height,
        format,
    })
}

/// Read dimensions and format without decoding pixels.
pub fn inspect_header_from_bytes(data: &[u8]) -> Result<InspectMetadata> {
    read_inspect_metadata(Cursor::new(data))
}

pub fn inspect_header_from_path(path: &str) -> Result<InspectMetadata> {
    use std::fs::File;
    let file = File::open(path).map_err(|e| StampcutError::file_read_failed(path.to_string(), e))?;
    read_inspect_metadata(BufReader::new(file))
}

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Supported input formats
pub fn supported_input_formats() -> &'static [&'static str] {
    &["png", "jpeg", "jpg", "webp"]
}
