// src/engine/pipeline.rs
//
// The strict sticker pipeline: estimate, pin, flood fill, residual sweep,
// artifact repair, optional outline, PNG emission and quality evaluation.
// Each run owns its raster; nothing is shared between runs.

use crate::config::{BackgroundConfig, QualityConfig};
use crate::engine::background::{estimate_background, BackgroundEstimate, BackgroundSource};
use crate::engine::encoder::{encode_png, DEFAULT_PNG_PRESET, MAX_PNG_PRESET};
use crate::engine::flood::{remove_background, FloodStats};
use crate::engine::grid::{split_grid, GridLayout, GridRequest};
use crate::engine::outline::{add_outline, OutlineSpec};
use crate::engine::pool::get_pool;
use crate::engine::quality::{evaluate_quality, QualityReport};
use crate::engine::raster::{Color, RasterImage};
use crate::engine::repair::{repair_artifacts, sweep_residual_background, PassOutcome, RepairSummary};
use crate::engine::resize::thumbnail;
use crate::error::{Result, StampcutError};
use crate::ops::{RepairPasses, StickerFormat};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Name the residual sweep is recorded under in [`RepairSummary`].
pub const RESIDUAL_SWEEP: &str = "residual_sweep";

/// Everything one pipeline run produced.
#[derive(Clone, Debug)]
pub struct ProcessedSticker {
    pub image: RasterImage,
    /// Estimate actually used for flood fill (pinned unless disabled)
    pub background: BackgroundEstimate,
    pub flood: FloodStats,
    pub repair: RepairSummary,
    /// Ring pixels painted by the outline compositor
    pub outline_ring: Option<usize>,
    pub report: QualityReport,
    /// Optimized PNG the report's file-size check was run against
    pub png: Vec<u8>,
}

impl ProcessedSticker {
    pub fn ok(&self) -> bool {
        self.report.ok()
    }

    pub fn background_color(&self) -> Color {
        self.background.primary()
    }

    pub fn summary(&self) -> StickerSummary<'_> {
        StickerSummary {
            ok: self.report.ok(),
            width: self.image.width(),
            height: self.image.height(),
            png_bytes: self.png.len(),
            background: &self.background,
            flood: self.flood,
            repair: &self.repair,
            report: &self.report,
        }
    }
}

/// Serializable view of a [`ProcessedSticker`] without pixel data.
#[derive(Debug, Serialize)]
pub struct StickerSummary<'a> {
    pub ok: bool,
    pub width: u32,
    pub height: u32,
    pub png_bytes: usize,
    pub background: &'a BackgroundEstimate,
    pub flood: FloodStats,
    pub repair: &'a RepairSummary,
    pub report: &'a QualityReport,
}

/// Result of running the pipeline over every cell of a composite.
#[derive(Debug)]
pub struct ProcessedGrid {
    pub layout: GridLayout,
    /// Row-major; a failing cell does not abort the others
    pub stickers: Vec<Result<ProcessedSticker>>,
}

impl ProcessedGrid {
    pub fn passed(&self) -> usize {
        self.stickers
            .iter()
            .filter(|s| s.as_ref().is_ok_and(|s| s.ok()))
            .count()
    }
}

#[derive(Clone, Debug)]
pub struct StickerPipeline {
    background: BackgroundConfig,
    quality: QualityConfig,
    passes: RepairPasses,
    outline: Option<OutlineSpec>,
    pin_background: bool,
    format: StickerFormat,
    fit_to_format: bool,
    png_preset: u8,
}

impl StickerPipeline {
    /// Validates both configs up front.
    pub fn new(background: BackgroundConfig, quality: QualityConfig) -> Result<Self> {
        background.validate()?;
        quality.validate()?;
        Ok(Self {
            background,
            quality,
            passes: RepairPasses::STRICT,
            outline: None,
            pin_background: true,
            format: StickerFormat::stamp(),
            fit_to_format: false,
            png_preset: DEFAULT_PNG_PRESET,
        })
    }

    /// Default background settings with the strict quality profile.
    pub fn strict() -> Self {
        Self {
            background: BackgroundConfig::default(),
            quality: QualityConfig::strict(),
            passes: RepairPasses::STRICT,
            outline: None,
            pin_background: true,
            format: StickerFormat::stamp(),
            fit_to_format: false,
            png_preset: DEFAULT_PNG_PRESET,
        }
    }

    pub fn with_passes(mut self, passes: RepairPasses) -> Self {
        self.passes = passes;
        self
    }

    pub fn with_outline(mut self, outline: Option<OutlineSpec>) -> Self {
        self.outline = outline;
        self
    }

    /// `false` keeps every sampled candidate and seeds flood fill from the band.
    pub fn with_pinned_background(mut self, pin: bool) -> Self {
        self.pin_background = pin;
        self
    }

    /// Also moves the quality size limits to the format.
    pub fn with_format(mut self, format: StickerFormat) -> Self {
        self.quality = self.quality.with_format(&format);
        self.format = format;
        self
    }

    /// Shrink oversized inputs to fit the format before processing.
    pub fn with_fit_to_format(mut self, fit: bool) -> Self {
        self.fit_to_format = fit;
        self
    }

    pub fn with_fixed_background(mut self, color: Color) -> Self {
        self.background = self.background.with_fixed_color(color);
        self
    }

    pub fn with_png_preset(mut self, preset: u8) -> Result<Self> {
        if preset > MAX_PNG_PRESET {
            return Err(StampcutError::invalid_config(
                "png_preset",
                preset.to_string(),
                format!("must be between 0 and {MAX_PNG_PRESET}"),
            ));
        }
        self.png_preset = preset;
        Ok(self)
    }

    pub fn background_config(&self) -> &BackgroundConfig {
        &self.background
    }

    pub fn quality_config(&self) -> &QualityConfig {
        &self.quality
    }

    pub fn passes(&self) -> RepairPasses {
        self.passes
    }

    pub fn outline(&self) -> Option<&OutlineSpec> {
        self.outline.as_ref()
    }

    pub fn format(&self) -> StickerFormat {
        self.format
    }

    pub fn png_preset(&self) -> u8 {
        self.png_preset
    }

    /// Grid request matching this pipeline's format.
    pub fn grid_request(&self, rows: u32, cols: u32) -> GridRequest {
        GridRequest::new(rows, cols).with_format(&self.format)
    }

    /// Background estimate the pipeline would flood with.
    pub fn estimate(&self, img: &RasterImage) -> Result<BackgroundEstimate> {
        let estimate = estimate_background(img, &self.background)?;
        if self.pin_background && estimate.source() != BackgroundSource::Fixed {
            return Ok(estimate.pinned());
        }
        Ok(estimate)
    }

    /// Pixel stages only: flood fill, sweep, repair, outline.
    ///
    /// Returns the estimate used, flood stats, the repair summary (sweep first)
    /// and the outline ring size.
    pub fn clean(
        &self,
        img: &mut RasterImage,
    ) -> Result<(BackgroundEstimate, FloodStats, RepairSummary, Option<usize>)> {
        let estimate = self.estimate(img)?;
        let bg = estimate.primary();
        let flood = remove_background(img, &estimate, &self.background);

        let swept = sweep_residual_background(img, bg, &self.quality);
        let mut repair = repair_artifacts(img, &self.quality, self.passes);
        repair.passes.insert(
            0,
            PassOutcome {
                pass: RESIDUAL_SWEEP.to_string(),
                changed: swept,
            },
        );

        let outline_ring = self.outline.as_ref().map(|spec| add_outline(img, bg, spec));
        debug!(
            background = %bg,
            removed = flood.background_pixels,
            swept,
            repaired = repair.total_changed(),
            "pixel stages done"
        );
        Ok((estimate, flood, repair, outline_ring))
    }

    /// Run the full pipeline on one raster.
    pub fn process(&self, img: RasterImage) -> Result<ProcessedSticker> {
        let mut img = if self.fit_to_format {
            thumbnail(&img, self.format.width, self.format.height)?
        } else {
            img
        };

        let (background, flood, repair, outline_ring) = self.clean(&mut img)?;
        let png = encode_png(&img, self.png_preset)?;
        let report = self.evaluate(&img, background.primary(), Some(png.len()));

        if report.ok() {
            info!(
                width = img.width(),
                height = img.height(),
                bytes = png.len(),
                warnings = report.warnings().len(),
                "sticker processed"
            );
        } else {
            warn!(
                errors = report.errors().len(),
                first = %report.errors().first().map(|e| e.to_string()).unwrap_or_default(),
                "sticker failed quality checks"
            );
        }

        Ok(ProcessedSticker {
            image: img,
            background,
            flood,
            repair,
            outline_ring,
            report,
            png,
        })
    }

    /// Quality report for a finished artifact.
    pub fn evaluate(&self, img: &RasterImage, bg: Color, encoded_len: Option<usize>) -> QualityReport {
        evaluate_quality(img, bg, &self.quality, encoded_len)
    }

    /// Process independent rasters on the global pool, keeping input order.
    pub fn process_batch(&self, images: Vec<RasterImage>) -> Vec<Result<ProcessedSticker>> {
        if images.is_empty() {
            warn!("empty batch");
            return Vec::new();
        }
        let run = || {
            images
                .into_par_iter()
                .map(|img| self.process(img))
                .collect::<Vec<_>>()
        };
        match get_pool() {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    /// Split a composite and process every cell.
    pub fn process_grid(&self, composite: &RasterImage, req: &GridRequest) -> Result<ProcessedGrid> {
        let split = split_grid(composite, req, &self.quality)?;
        let stickers = self.process_batch(split.cells);
        let grid = ProcessedGrid {
            layout: split.layout,
            stickers,
        };
        info!(
            cells = grid.stickers.len(),
            passed = grid.passed(),
            swapped = grid.layout.swapped,
            "grid processed"
        );
        Ok(grid)
    }
}

impl Default for StickerPipeline {
    fn default() -> Self {
        Self::strict()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::quality::QualityCheck;

    const GREEN: [u8; 4] = [0, 255, 0, 255];
    const RED: [u8; 4] = [210, 40, 40, 255];
    const WHITE: [u8; 4] = [255, 255, 255, 255];

    /// Green canvas with a white-rimmed red block in the middle.
    fn create_test_cell(width: u32, height: u32) -> RasterImage {
        let (x0, y0) = (width / 4, height / 4);
        let (x1, y1) = (width - width / 4, height - height / 4);
        RasterImage::from_fn(width, height, |x, y| {
            if x < x0 || x >= x1 || y < y0 || y >= y1 {
                GREEN
            } else if x < x0 + 4 || x >= x1 - 4 || y < y0 + 4 || y >= y1 - 4 {
                WHITE
            } else {
                RED
            }
        })
        .unwrap()
    }

    mod builder_tests {
        use super::*;

        #[test]
        fn test_new_validates_configs() {
            let bad = BackgroundConfig {
                quantize_step: 0,
                ..Default::default()
            };
            assert!(matches!(
                StickerPipeline::new(bad, QualityConfig::strict()),
                Err(StampcutError::InvalidConfig { .. })
            ));
        }

        #[test]
        fn test_with_format_moves_limits() {
            let p = StickerPipeline::strict().with_format(StickerFormat::emoji());
            assert_eq!(p.quality_config().max_width, 180);
            assert_eq!(p.format().name, "emoji");
            assert!((p.grid_request(3, 4).target_aspect - 1.0).abs() < 1e-9);
        }

        #[test]
        fn test_png_preset_range() {
            assert!(StickerPipeline::strict().with_png_preset(6).is_ok());
            assert!(StickerPipeline::strict().with_png_preset(9).is_err());
        }
    }

    mod process_tests {
        use super::*;

        #[test]
        fn test_process_clean_cell_passes() {
            let out = StickerPipeline::strict().process(create_test_cell(200, 160)).unwrap();
            assert!(out.ok(), "errors: {:?}", out.report.errors());
            assert_eq!(out.background_color(), Color::GREEN);
            assert_eq!(out.background.source(), BackgroundSource::Fixed);
            assert_eq!(out.image.alpha(0, 0), 0);
            assert_eq!(out.image.rgba(100, 80), RED);
            assert_eq!(out.repair.passes[0].pass, RESIDUAL_SWEEP);
            assert!(!out.png.is_empty());
        }

        #[test]
        fn test_unpinned_keeps_band_seeding() {
            let p = StickerPipeline::strict().with_pinned_background(false);
            let est = p.estimate(&create_test_cell(100, 100)).unwrap();
            assert_eq!(est.source(), BackgroundSource::Sampled);
            assert!(est.band() >= 2);
        }

        #[test]
        fn test_oversized_cell_reports_dimension_error() {
            let out = StickerPipeline::strict().process(create_test_cell(400, 200)).unwrap();
            assert!(!out.ok());
            assert!(out.report.has_error(QualityCheck::Dimensions));
        }

        #[test]
        fn test_fit_to_format_shrinks_first() {
            let p = StickerPipeline::strict().with_fit_to_format(true);
            let out = p.process(create_test_cell(740, 400)).unwrap();
            assert_eq!(out.image.dimensions(), (370, 200));
            assert!(!out.report.has_error(QualityCheck::Dimensions));
        }

        #[test]
        fn test_outline_adds_ring() {
            let p = StickerPipeline::strict().with_outline(Some(OutlineSpec::default()));
            let out = p.process(create_test_cell(100, 100)).unwrap();
            assert!(out.outline_ring.unwrap_or(0) > 0);
        }
    }

    mod batch_tests {
        use super::*;

        #[test]
        fn test_batch_keeps_order() {
            let images: Vec<_> = (0..6).map(|i| create_test_cell(80 + i * 10, 80)).collect();
            let results = StickerPipeline::strict().process_batch(images);
            assert_eq!(results.len(), 6);
            for (i, r) in results.iter().enumerate() {
                assert_eq!(r.as_ref().unwrap().image.width(), 80 + i as u32 * 10);
            }
            assert!(StickerPipeline::strict().process_batch(Vec::new()).is_empty());
        }

        #[test]
        fn test_process_grid() {
            let tile = create_test_cell(100, 100);
            let composite = RasterImage::from_fn(400, 300, |x, y| tile.rgba(x % 100, y % 100)).unwrap();
            let p = StickerPipeline::strict();
            let grid = p.process_grid(&composite, &p.grid_request(3, 4)).unwrap();
            assert_eq!(grid.stickers.len(), 12);
            assert!(!grid.layout.swapped);
            assert_eq!(grid.passed(), 12);
        }
    }
}
