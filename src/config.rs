// src/config.rs
//
// Background and quality thresholds, named profiles, and the TOML settings
// file. The pipeline only ever sees fully-resolved, validated structs.

use crate::engine::{Color, OutlineSpec, StickerPipeline};
use crate::error::{Result, StampcutError};
use crate::ops::{RepairPasses, StickerFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

const STRICT_PROFILE: &str = "strict";
const LENIENT_PROFILE: &str = "lenient";

/// Border sampling and flood-fill settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackgroundConfig {
    /// Border band width as a fraction of the shorter side
    pub band_ratio: f64,
    /// Absolute cap on the band width (px)
    pub max_band: u32,
    /// Histogram bucket size per channel
    pub quantize_step: u8,
    /// Max Euclidean distance to a candidate to count as background
    pub tolerance: u32,
    /// Alpha at or below this counts as already transparent
    pub alpha_threshold: u8,
    /// Minimum frequency of a secondary candidate relative to the mode
    pub candidate_ratio: f64,
    pub max_candidates: usize,
    /// Bypass sampling entirely
    pub fixed_colors: Option<Vec<Color>>,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            band_ratio: 0.08,
            max_band: 24,
            quantize_step: 6,
            tolerance: 40,
            alpha_threshold: 8,
            candidate_ratio: 0.5,
            max_candidates: 3,
            fixed_colors: None,
        }
    }
}

impl BackgroundConfig {
    pub fn with_fixed_color(mut self, color: Color) -> Self {
        self.fixed_colors = Some(vec![color]);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tolerance == 0 {
            return Err(StampcutError::invalid_config(
                "background.tolerance",
                "0",
                "tolerance must be greater than 0",
            ));
        }
        if self.quantize_step == 0 {
            return Err(StampcutError::invalid_config(
                "background.quantize_step",
                "0",
                "quantize_step must be greater than 0",
            ));
        }
        if !self.band_ratio.is_finite() || self.band_ratio < 0.0 {
            return Err(StampcutError::invalid_config(
                "background.band_ratio",
                self.band_ratio.to_string(),
                "band_ratio must be a finite, non-negative fraction",
            ));
        }
        if !(0.0..=1.0).contains(&self.candidate_ratio) {
            return Err(StampcutError::invalid_config(
                "background.candidate_ratio",
                self.candidate_ratio.to_string(),
                "candidate_ratio must be within 0..=1",
            ));
        }
        if self.max_candidates == 0 {
            return Err(StampcutError::invalid_config(
                "background.max_candidates",
                "0",
                "at least one candidate color is required",
            ));
        }
        if matches!(&self.fixed_colors, Some(colors) if colors.is_empty()) {
            return Err(StampcutError::invalid_config(
                "background.fixed_colors",
                "[]",
                "fixed_colors must name at least one color when set",
            ));
        }
        Ok(())
    }
}

/// Every threshold used by the repair passes and the quality evaluator.
///
/// Defaults are the strict profile. The numbers are calibration constants
/// tuned against generator output, not derived values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// L1 distance to the background that still counts as residue
    pub bg_tol: u32,
    /// Alpha binarization cut for the residual sweep
    pub alpha_cut: u8,
    pub bottom_band: u32,
    pub green_min: u8,
    pub green_gap: u8,
    pub fringe_green_min: u8,
    pub fringe_green_gap: u8,
    pub outline_thickness: u32,
    pub white_min: u8,
    pub top_strip: u32,
    pub degreen_min: u8,
    pub degreen_gap: u8,
    pub outline_white_min_ratio: f64,
    pub interior_green_max_pct: f64,
    pub interior_ghost_max_pct: f64,
    pub min_margin_px: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub min_width: u32,
    pub min_height: u32,
    pub max_file_size_bytes: u64,
    pub edge_band_px: u32,
    pub edge_white_min: u8,
    pub edge_white_max_ratio: f64,

    // border seam cleaner
    pub seam_layers: u32,
    pub seam_uniform_ratio: f64,
    pub seam_edge_tol: u32,
    pub seam_bg_tol: u32,
    pub seam_quantize_step: u8,
    pub seam_band_ratio: f64,
    pub seam_max_band: u32,

    // edge white-line stripper
    pub edge_strip_layers: u32,
    pub edge_strip_ratio: f64,

    pub ghost_erosion_px: u32,
    pub fringe_iterations: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self::strict()
    }
}

impl QualityConfig {
    pub fn strict() -> Self {
        Self {
            bg_tol: 30,
            alpha_cut: 8,
            bottom_band: 4,
            green_min: 200,
            green_gap: 120,
            fringe_green_min: 150,
            fringe_green_gap: 30,
            outline_thickness: 4,
            white_min: 245,
            top_strip: 6,
            degreen_min: 200,
            degreen_gap: 5,
            outline_white_min_ratio: 0.98,
            interior_green_max_pct: 0.1,
            interior_ghost_max_pct: 0.0,
            min_margin_px: 5,
            max_width: 370,
            max_height: 320,
            min_width: 50,
            min_height: 50,
            max_file_size_bytes: 1024 * 1024,
            edge_band_px: 3,
            edge_white_min: 240,
            edge_white_max_ratio: 0.3,
            seam_layers: 2,
            seam_uniform_ratio: 0.98,
            seam_edge_tol: 6,
            seam_bg_tol: 12,
            seam_quantize_step: 8,
            seam_band_ratio: 0.08,
            seam_max_band: 24,
            edge_strip_layers: 2,
            edge_strip_ratio: 0.15,
            ghost_erosion_px: 3,
            fringe_iterations: 10,
        }
    }

    /// Looser caps for hand-drawn or already-cleaned artwork.
    pub fn lenient() -> Self {
        Self {
            interior_green_max_pct: 0.5,
            interior_ghost_max_pct: 0.5,
            min_margin_px: 2,
            edge_white_max_ratio: 0.5,
            ..Self::strict()
        }
    }

    pub fn from_profile(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            STRICT_PROFILE => Ok(Self::strict()),
            LENIENT_PROFILE => Ok(Self::lenient()),
            _ => Err(StampcutError::invalid_profile(name.to_string())),
        }
    }

    /// Apply a max-size limit from an output format.
    pub fn with_format(mut self, format: &StickerFormat) -> Self {
        self.max_width = format.width;
        self.max_height = format.height;
        self.min_width = self.min_width.min(format.width);
        self.min_height = self.min_height.min(format.height);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let ratios = [
            ("quality.outline_white_min_ratio", self.outline_white_min_ratio),
            ("quality.edge_white_max_ratio", self.edge_white_max_ratio),
            ("quality.seam_uniform_ratio", self.seam_uniform_ratio),
            ("quality.edge_strip_ratio", self.edge_strip_ratio),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(StampcutError::invalid_config(
                    name,
                    value.to_string(),
                    "ratio must be within 0..=1",
                ));
            }
        }
        if self.seam_quantize_step == 0 {
            return Err(StampcutError::invalid_config(
                "quality.seam_quantize_step",
                "0",
                "quantize step must be greater than 0",
            ));
        }
        if self.min_width > self.max_width || self.min_height > self.max_height {
            return Err(StampcutError::invalid_config(
                "quality.min_width/min_height",
                format!("{}x{}", self.min_width, self.min_height),
                format!(
                    "minimum size exceeds maximum {}x{}",
                    self.max_width, self.max_height
                ),
            ));
        }
        Ok(())
    }
}

/// On-disk settings (`stampcut.toml`).
///
/// ```toml
/// profile = "strict"
/// format = "stamp"
/// passes = ["border_seams", "bottom_green_line", "interior_cavities"]
///
/// [background]
/// tolerance = 48
///
/// [quality]
/// min_margin_px = 8
/// ```
///
/// `[quality]` keys override the chosen profile one by one.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub profile: Option<String>,
    pub format: Option<String>,
    pub passes: Option<Vec<String>>,
    pub pin_background: Option<bool>,
    pub background: BackgroundConfig,
    pub quality: Option<toml::Table>,
    pub outline: Option<OutlineSpec>,
}

impl Settings {
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| StampcutError::config_parse_failed(origin.to_string(), e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StampcutError::file_not_found(display.clone())
            } else {
                StampcutError::file_read_failed(display.clone(), e)
            }
        })?;
        Self::from_toml_str(&text, &display)
    }

    /// Resolve the profile plus per-key overrides into one QualityConfig.
    pub fn quality_config(&self) -> Result<QualityConfig> {
        let base = QualityConfig::from_profile(self.profile.as_deref().unwrap_or(STRICT_PROFILE))?;
        let mut quality = match &self.quality {
            None => base,
            Some(overrides) => {
                let mut merged = match toml::Value::try_from(&base) {
                    Ok(toml::Value::Table(table)) => table,
                    Ok(other) => {
                        return Err(StampcutError::config_parse_failed(
                            "quality",
                            format!("expected a table, got {}", other.type_str()),
                        ))
                    }
                    Err(e) => {
                        return Err(StampcutError::config_parse_failed(
                            "quality",
                            e.to_string(),
                        ))
                    }
                };
                for (key, value) in overrides {
                    merged.insert(key.clone(), value.clone());
                }
                toml::Value::Table(merged)
                    .try_into()
                    .map_err(|e: toml::de::Error| {
                        StampcutError::config_parse_failed("quality", e.to_string())
                    })?
            }
        };
        if let Some(format) = self.sticker_format()? {
            quality = quality.with_format(&format);
        }
        quality.validate()?;
        Ok(quality)
    }

    pub fn sticker_format(&self) -> Result<Option<StickerFormat>> {
        self.format
            .as_deref()
            .map(|name| {
                StickerFormat::get(name)
                    .ok_or_else(|| StampcutError::invalid_format(name.to_string()))
            })
            .transpose()
    }

    pub fn repair_passes(&self) -> Result<RepairPasses> {
        match &self.passes {
            None => Ok(RepairPasses::STRICT),
            Some(names) => RepairPasses::from_names(names.iter().map(String::as_str)),
        }
    }

    pub fn build_pipeline(&self) -> Result<StickerPipeline> {
        let mut pipeline = StickerPipeline::new(self.background.clone(), self.quality_config()?)?
            .with_passes(self.repair_passes()?)
            .with_outline(self.outline.clone());
        if let Some(pin) = self.pin_background {
            pipeline = pipeline.with_pinned_background(pin);
        }
        if let Some(format) = self.sticker_format()? {
            pipeline = pipeline.with_format(format);
        }
        Ok(pipeline)
    }
}
