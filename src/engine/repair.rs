// src/engine/repair.rs
//
// Artifact repair passes run after flood fill.
//
// Every pass mutates in place and only lowers alpha or repaints RGB; none
// moves content. Each returns the number of pixels it changed.

use crate::config::QualityConfig;
use crate::engine::background::{band_width, dominant_in_band};
use crate::engine::mask::{exterior_transparent, Edge, Mask};
use crate::engine::raster::{Color, RasterImage};
use crate::ops::RepairPasses;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Pixels at or below this alpha are ignored by the seam cleaner.
const SEAM_ALPHA_THRESHOLD: u8 = 8;
/// A seam line needs at least this share of opaque pixels to be considered.
const SEAM_MIN_OPAQUE_SHARE: f64 = 0.5;
/// Unconditional "obvious green" rule of the fringe stripper.
const OBVIOUS_GREEN_MIN: u8 = 180;
const OBVIOUS_GREEN_GAP: u8 = 80;
/// Chebyshev reach of the fringe stripper's boundary test.
const FRINGE_REACH: i64 = 2;

/// Pixels changed by one pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PassOutcome {
    pub pass: String,
    pub changed: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepairSummary {
    pub passes: Vec<PassOutcome>,
}

impl RepairSummary {
    pub fn total_changed(&self) -> usize {
        self.passes.iter().map(|p| p.changed).sum()
    }

    pub fn changed(&self, pass: RepairPasses) -> Option<usize> {
        let name = pass.names().into_iter().next()?;
        self.passes
            .iter()
            .find(|p| p.pass == name)
            .map(|p| p.changed)
    }
}

#[inline]
fn clear(img: &mut RasterImage, x: u32, y: u32) -> bool {
    if img.alpha(x, y) == 0 {
        return false;
    }
    img.set_alpha(x, y, 0);
    true
}

#[inline]
fn repaint(img: &mut RasterImage, x: u32, y: u32, color: Color) -> bool {
    if img.color(x, y) == color {
        return false;
    }
    img.set_color(x, y, color);
    true
}

/// Clear visible pixels within `bg_tol` (L1) of the background, then
/// binarize every remaining alpha at `alpha_cut`.
pub fn sweep_residual_background(img: &mut RasterImage, bg: Color, cfg: &QualityConfig) -> usize {
    let (w, h) = img.dimensions();
    let mut changed = 0;
    for y in 0..h {
        for x in 0..w {
            let px = img.rgba(x, y);
            if px[3] == 0 {
                continue;
            }
            let alpha = if Color::from_rgba(px).l1(bg) <= cfg.bg_tol || px[3] <= cfg.alpha_cut {
                0
            } else {
                255
            };
            if alpha != px[3] {
                img.set_alpha(x, y, alpha);
                changed += 1;
            }
        }
    }
    changed
}

/// Dominant quantized color of a line and the share of its opaque pixels
/// within `seam_edge_tol` of it. None when the line is mostly transparent.
fn line_uniformity(img: &RasterImage, line: &[(u32, u32)], cfg: &QualityConfig) -> Option<(Color, f64)> {
    let opaque: Vec<Color> = line
        .iter()
        .map(|&(x, y)| img.rgba(x, y))
        .filter(|px| px[3] > SEAM_ALPHA_THRESHOLD)
        .map(Color::from_rgba)
        .collect();
    let needed = ((line.len() as f64 * SEAM_MIN_OPAQUE_SHARE) as usize).max(1);
    if opaque.len() < needed {
        return None;
    }

    let mut order: Vec<Color> = Vec::new();
    let mut counts: HashMap<Color, usize> = HashMap::new();
    for c in &opaque {
        let q = c.quantize(cfg.seam_quantize_step);
        let count = counts.entry(q).or_insert(0);
        if *count == 0 {
            order.push(q);
        }
        *count += 1;
    }
    // first seen wins ties
    let mut dominant = order[0];
    for c in &order {
        if counts[c] > counts[&dominant] {
            dominant = *c;
        }
    }

    let good = opaque
        .iter()
        .filter(|c| c.l1(dominant) <= cfg.seam_edge_tol)
        .count();
    Some((dominant, good as f64 / opaque.len() as f64))
}

/// Repaint near-uniform outer lines (grid seams, white frames) with the
/// background found just inside them.
pub fn clean_border_seams(img: &mut RasterImage, cfg: &QualityConfig) -> usize {
    let (w, h) = img.dimensions();
    let band = band_width(w, h, cfg.seam_band_ratio, cfg.seam_max_band);
    let mut changed = 0;

    for layer in 0..cfg.seam_layers {
        let local_bg = dominant_in_band(
            img,
            layer + 1,
            band,
            cfg.seam_quantize_step,
            SEAM_ALPHA_THRESHOLD,
        );
        // all four lines are judged before any is repainted
        let verdicts: Vec<(Vec<(u32, u32)>, bool)> = Edge::ALL
            .iter()
            .map(|edge| {
                let line = edge.line(w, h, layer);
                let repaint_line = match line_uniformity(img, &line, cfg) {
                    Some((dominant, ratio)) => {
                        ratio >= cfg.seam_uniform_ratio
                            && (dominant.min_channel() >= cfg.white_min
                                || dominant.l1(local_bg) > cfg.seam_bg_tol)
                    }
                    None => false,
                };
                (line, repaint_line)
            })
            .collect();

        for (line, repaint_line) in verdicts {
            if !repaint_line {
                continue;
            }
            for (x, y) in line {
                if repaint(img, x, y, local_bg) {
                    changed += 1;
                }
            }
        }
    }
    changed
}

/// Clear green-dominant pixels in the bottom `bottom_band` rows.
pub fn strip_bottom_green_line(img: &mut RasterImage, cfg: &QualityConfig) -> usize {
    let (w, h) = img.dimensions();
    let mut changed = 0;
    for y in h.saturating_sub(cfg.bottom_band)..h {
        for x in 0..w {
            if img.color(x, y).is_green_dominant(cfg.green_min, cfg.green_gap) && clear(img, x, y) {
                changed += 1;
            }
        }
    }
    changed
}

/// Repaint the outer silhouette band pure white, alpha unchanged. Opaque
/// pixels around enclosed holes keep their color.
pub fn whiten_outline_band(img: &mut RasterImage, cfg: &QualityConfig) -> usize {
    let band = Mask::opaque(img).silhouette_band(&exterior_transparent(img), cfg.outline_thickness);
    let mut changed = 0;
    for (x, y) in band.iter_set() {
        if repaint(img, x, y, Color::WHITE) {
            changed += 1;
        }
    }
    changed
}

/// Repaint green-tinted near-white pixels pure white.
pub fn degreen_white(img: &mut RasterImage, cfg: &QualityConfig) -> usize {
    let (w, h) = img.dimensions();
    let mut changed = 0;
    for y in 0..h {
        for x in 0..w {
            if img.alpha(x, y) == 0 {
                continue;
            }
            let c = img.color(x, y);
            if c.is_near_white(cfg.degreen_min)
                && c.is_green_dominant(cfg.degreen_min, cfg.degreen_gap)
                && repaint(img, x, y, Color::WHITE)
            {
                changed += 1;
            }
        }
    }
    changed
}

fn near_transparent(opaque: &Mask, x: u32, y: u32) -> bool {
    let (w, h) = (opaque.width() as i64, opaque.height() as i64);
    for dy in -FRINGE_REACH..=FRINGE_REACH {
        for dx in -FRINGE_REACH..=FRINGE_REACH {
            if dx == 0 && dy == 0 {
                continue;
            }
            let (nx, ny) = (x as i64 + dx, y as i64 + dy);
            if nx < 0 || ny < 0 || nx >= w || ny >= h {
                continue;
            }
            if !opaque.get(nx as u32, ny as u32) {
                return true;
            }
        }
    }
    false
}

/// Clear obvious green everywhere, then peel green fringe off the
/// silhouette boundary until a round removes nothing.
///
/// Can remove legitimately green character pixels, so it is not in
/// [`RepairPasses::STRICT`].
pub fn strip_green_fringe(img: &mut RasterImage, cfg: &QualityConfig) -> usize {
    let (w, h) = img.dimensions();
    let mut changed = 0;
    for y in 0..h {
        for x in 0..w {
            if img.color(x, y).is_green_dominant(OBVIOUS_GREEN_MIN, OBVIOUS_GREEN_GAP) && clear(img, x, y) {
                changed += 1;
            }
        }
    }

    for round in 0..cfg.fringe_iterations {
        let opaque = Mask::opaque(img);
        let targets: Vec<(u32, u32)> = opaque
            .iter_set()
            .filter(|&(x, y)| {
                img.color(x, y)
                    .is_green_dominant(cfg.fringe_green_min, cfg.fringe_green_gap)
                    && near_transparent(&opaque, x, y)
            })
            .collect();
        if targets.is_empty() {
            debug!(round, "green fringe converged");
            break;
        }
        for (x, y) in targets {
            img.set_alpha(x, y, 0);
            changed += 1;
        }
    }
    changed
}

/// Clear green-dominant pixels that the border flood fill could not reach.
pub fn fill_interior_cavities(img: &mut RasterImage, cfg: &QualityConfig) -> usize {
    let exterior = exterior_transparent(img);
    let (w, h) = img.dimensions();
    let mut changed = 0;
    for y in 0..h {
        for x in 0..w {
            if exterior.get(x, y) {
                continue;
            }
            if img.color(x, y).is_green_dominant(cfg.green_min, cfg.green_gap) && clear(img, x, y) {
                changed += 1;
            }
        }
    }
    changed
}

/// Clear near-white pixels in the top strip with nothing opaque in the two
/// rows below them.
pub fn strip_top_stray_white(img: &mut RasterImage, cfg: &QualityConfig) -> usize {
    let (w, h) = img.dimensions();
    let top = cfg.top_strip.min(h.saturating_sub(1));
    let mut changed = 0;
    for y in 0..top {
        for x in 0..w {
            let px = img.rgba(x, y);
            if px[3] == 0 || !Color::from_rgba(px).is_near_white(cfg.white_min) {
                continue;
            }
            let supported = (1..=2).any(|dy| y + dy < h && img.alpha(x, y + dy) > 0);
            if !supported && clear(img, x, y) {
                changed += 1;
            }
        }
    }
    changed
}

/// Clear white seam remnants on the outer layers, then any white left on the
/// outermost ring.
pub fn strip_edge_white_lines(img: &mut RasterImage, cfg: &QualityConfig) -> usize {
    let (w, h) = img.dimensions();
    let white_min = cfg.edge_white_min;
    let is_white = |px: [u8; 4]| px[3] > 0 && Color::from_rgba(px).is_near_white(white_min);
    let mut changed = 0;

    for layer in 0..cfg.edge_strip_layers {
        for edge in Edge::ALL {
            let line = edge.line(w, h, layer);
            let visible = line.iter().filter(|&&(x, y)| img.alpha(x, y) > 0).count();
            if visible == 0 {
                continue;
            }
            let white: Vec<(u32, u32)> = line
                .into_iter()
                .filter(|&(x, y)| is_white(img.rgba(x, y)))
                .collect();
            if white.len() as f64 / visible as f64 > cfg.edge_strip_ratio {
                for (x, y) in white {
                    img.set_alpha(x, y, 0);
                    changed += 1;
                }
            }
        }
    }

    for edge in Edge::ALL {
        for (x, y) in edge.line(w, h, 0) {
            if is_white(img.rgba(x, y)) {
                img.set_alpha(x, y, 0);
                changed += 1;
            }
        }
    }
    changed
}

type PassFn = fn(&mut RasterImage, &QualityConfig) -> usize;

const PASS_TABLE: [(RepairPasses, PassFn); 8] = [
    (RepairPasses::BORDER_SEAMS, clean_border_seams),
    (RepairPasses::BOTTOM_GREEN_LINE, strip_bottom_green_line),
    (RepairPasses::OUTLINE_WHITEN, whiten_outline_band),
    (RepairPasses::DEGREEN_WHITE, degreen_white),
    (RepairPasses::GREEN_FRINGE, strip_green_fringe),
    (RepairPasses::INTERIOR_CAVITIES, fill_interior_cavities),
    (RepairPasses::TOP_STRAY_WHITE, strip_top_stray_white),
    (RepairPasses::EDGE_WHITE_LINES, strip_edge_white_lines),
];

/// Run the selected passes in their fixed order.
pub fn repair_artifacts(img: &mut RasterImage, cfg: &QualityConfig, passes: RepairPasses) -> RepairSummary {
    let mut summary = RepairSummary::default();
    for (flag, pass) in PASS_TABLE {
        if !passes.contains(flag) {
            continue;
        }
        let changed = pass(img, cfg);
        let name = flag.names().into_iter().next().unwrap_or_default();
        debug!(pass = %name, changed, "repair pass");
        summary.passes.push(PassOutcome { pass: name, changed });
    }
    summary
}
