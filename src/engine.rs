// src/engine.rs
//
// The core of stampcut. A deterministic pixel pipeline that:
// 1. Estimates a synthetic background color from a border band
// 2. Removes it with a border-connected flood fill
// 3. Repairs residual artifacts in a fixed pass order
// 4. Optionally draws an outline, then reports quality
//
// This file is a facade over the modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Larger inputs are rejected at decode to prevent decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

pub mod background;
pub mod common;
pub mod decoder;
pub mod encoder;
pub mod firewall;
pub mod flood;
pub mod grid;
pub mod io;
pub mod layout;
pub mod mask;
pub mod outline;
pub mod palette;
pub mod pipeline;
pub mod pool;
pub mod quality;
pub mod raster;
pub mod repair;
pub mod resize;
pub mod retry;

pub use background::{estimate_background, BackgroundEstimate, BackgroundSource};
pub use decoder::{check_dimensions, decode_rgba, detect_format};
pub use encoder::{encode_png, DEFAULT_PNG_PRESET};
pub use firewall::{FirewallConfig, FirewallPolicy};
pub use flood::{remove_background, FloodStats};
pub use grid::{select_layout, split_grid, GridLayout, GridRequest, GridSplit};
pub use io::{read_image, write_atomic, write_png, InputMode, Source};
pub use layout::{content_bounds, fit_to_canvas, main_image, measure_min_margin, tab_image, Bounds};
pub use mask::{Edge, Mask};
pub use outline::{add_outline, OutlineSpec};
pub use palette::{dominant_colors, select_chroma_key, ChromaKey};
pub use pipeline::{ProcessedGrid, ProcessedSticker, StickerPipeline};
pub use pool::get_pool;
pub use quality::{evaluate_quality, Issue, MetricValue, QualityCheck, QualityReport};
pub use raster::{Color, RasterImage};
pub use repair::{repair_artifacts, RepairSummary};
pub use retry::{run_with_retry, CompositeSource, RetryOutcome, RetryPolicy};
