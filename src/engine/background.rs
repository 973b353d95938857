// src/engine/background.rs
//
// Background estimation from a border band sample.

use crate::config::BackgroundConfig;
use crate::engine::raster::{Color, RasterImage};
use crate::error::Result;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Where the candidate list came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundSource {
    /// Histogram of the border band
    Sampled,
    /// `fixed_colors` from the config, or a pinned primary candidate
    Fixed,
    /// No opaque pixel in the band; the center pixel was used
    CenterFallback,
}

/// Ordered background candidates plus the band width used to find them.
///
/// Always holds at least one candidate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BackgroundEstimate {
    candidates: Vec<Color>,
    band: u32,
    source: BackgroundSource,
}

impl BackgroundEstimate {
    pub fn fixed(colors: Vec<Color>) -> Option<Self> {
        if colors.is_empty() {
            return None;
        }
        Some(Self {
            candidates: colors,
            band: 0,
            source: BackgroundSource::Fixed,
        })
    }

    pub fn primary(&self) -> Color {
        self.candidates[0]
    }

    pub fn candidates(&self) -> &[Color] {
        &self.candidates
    }

    /// Band width in pixels; 0 for fixed colors.
    pub fn band(&self) -> u32 {
        self.band
    }

    pub fn source(&self) -> BackgroundSource {
        self.source
    }

    /// Seed flood fill from the single-pixel outer ring instead of the band.
    pub fn seeds_from_ring(&self) -> bool {
        self.source == BackgroundSource::Fixed
    }

    /// Keep only the primary candidate and treat it as a fixed color.
    pub fn pinned(self) -> Self {
        Self {
            candidates: vec![self.primary()],
            band: 0,
            source: BackgroundSource::Fixed,
        }
    }
}

/// `min(max(2, floor(min(w, h) * band_ratio)), max_band)`
pub fn band_width(width: u32, height: u32, band_ratio: f64, max_band: u32) -> u32 {
    let sampled = (width.min(height) as f64 * band_ratio) as u32;
    sampled.max(2).min(max_band)
}

/// True when (x, y) lies inside the `band`-wide border frame that starts
/// `skip` pixels in from the image edge.
#[inline]
pub(crate) fn in_band(x: u32, y: u32, width: u32, height: u32, skip: u32, band: u32) -> bool {
    let inside_skip = x >= skip
        && y >= skip
        && x < width.saturating_sub(skip)
        && y < height.saturating_sub(skip);
    if !inside_skip {
        return false;
    }
    let inner = skip.saturating_add(band);
    x < inner || y < inner || x >= width.saturating_sub(inner) || y >= height.saturating_sub(inner)
}

/// Frequency histogram that remembers first-seen order, so ties resolve to
/// the color encountered first in row-major scan order.
#[derive(Default)]
struct Histogram {
    slots: HashMap<Color, usize>,
    entries: Vec<(Color, usize)>,
}

impl Histogram {
    fn add(&mut self, color: Color) {
        match self.slots.get(&color) {
            Some(&slot) => self.entries[slot].1 += 1,
            None => {
                self.slots.insert(color, self.entries.len());
                self.entries.push((color, 1));
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries by descending count; stable for equal counts.
    fn ranked(mut self) -> Vec<(Color, usize)> {
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
        self.entries
    }
}

fn band_histogram(
    img: &RasterImage,
    skip: u32,
    band: u32,
    quantize_step: u8,
    alpha_threshold: u8,
) -> Histogram {
    let (w, h) = img.dimensions();
    let mut hist = Histogram::default();
    for y in 0..h {
        for x in 0..w {
            if !in_band(x, y, w, h, skip, band) {
                continue;
            }
            let px = img.rgba(x, y);
            if px[3] <= alpha_threshold {
                continue;
            }
            hist.add(Color::from_rgba(px).quantize(quantize_step));
        }
    }
    hist
}

fn center_color(img: &RasterImage) -> Color {
    img.color(img.width() / 2, img.height() / 2)
}

/// Sample the border band and rank quantized colors.
///
/// `fixed_colors` short-circuits sampling. An all-transparent band falls back
/// to the center pixel, which is logged but not an error.
pub fn estimate_background(img: &RasterImage, cfg: &BackgroundConfig) -> Result<BackgroundEstimate> {
    cfg.validate()?;

    if let Some(estimate) = cfg.fixed_colors.clone().and_then(BackgroundEstimate::fixed) {
        return Ok(estimate);
    }

    let (w, h) = img.dimensions();
    let band = band_width(w, h, cfg.band_ratio, cfg.max_band);
    let hist = band_histogram(img, 0, band, cfg.quantize_step, cfg.alpha_threshold);

    if hist.is_empty() {
        let fallback = center_color(img);
        warn!(
            width = w,
            height = h,
            band,
            color = %fallback,
            "no opaque pixels in border band, using center pixel as background"
        );
        return Ok(BackgroundEstimate {
            candidates: vec![fallback],
            band,
            source: BackgroundSource::CenterFallback,
        });
    }

    let ranked = hist.ranked();
    let mode_count = ranked[0].1;
    let min_count = ((mode_count as f64 * cfg.candidate_ratio) as usize).max(1);
    let candidates: Vec<Color> = ranked
        .into_iter()
        .take(cfg.max_candidates)
        .filter(|(_, count)| *count >= min_count)
        .map(|(color, _)| color)
        .collect();

    debug!(band, candidates = ?candidates, "sampled background candidates");
    Ok(BackgroundEstimate {
        candidates,
        band,
        source: BackgroundSource::Sampled,
    })
}

/// Most frequent quantized color in the band just inside `skip` border
/// layers, or the center pixel. Used by the border seam cleaner.
pub(crate) fn dominant_in_band(
    img: &RasterImage,
    skip: u32,
    band: u32,
    quantize_step: u8,
    alpha_threshold: u8,
) -> Color {
    band_histogram(img, skip, band, quantize_step, alpha_threshold)
        .ranked()
        .first()
        .map(|(color, _)| *color)
        .unwrap_or_else(|| center_color(img))
}
