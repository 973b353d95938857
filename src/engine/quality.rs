// src/engine/quality.rs
//
// Quality evaluator: per-image metrics and a fatal/warning verdict.
//
// Quality failures are report values, never errors.

use crate::config::QualityConfig;
use crate::engine::mask::{exterior_transparent, Edge, Mask};
use crate::engine::raster::{Color, RasterImage};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Residue and bottom-line percentages above this are fatal.
const FATAL_PCT: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCheck {
    BackgroundResidue,
    InteriorGreen,
    BottomGreenLine,
    Dimensions,
    FileSize,
    EdgeWhiteLine,
    SemiTransparent,
    InteriorGhost,
    StrayTopWhite,
    EdgeTouching,
    Margin,
}

impl QualityCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityCheck::BackgroundResidue => "background_residue",
            QualityCheck::InteriorGreen => "interior_green",
            QualityCheck::BottomGreenLine => "bottom_green_line",
            QualityCheck::Dimensions => "dimensions",
            QualityCheck::FileSize => "file_size",
            QualityCheck::EdgeWhiteLine => "edge_white_line",
            QualityCheck::SemiTransparent => "semi_transparent",
            QualityCheck::InteriorGhost => "interior_ghost",
            QualityCheck::StrayTopWhite => "stray_top_white",
            QualityCheck::EdgeTouching => "edge_touching",
            QualityCheck::Margin => "margin",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Issue {
    pub check: QualityCheck,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.check.as_str(), self.message)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Bool(bool),
    Count(u64),
    Percent(f64),
}

impl MetricValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            MetricValue::Bool(b) => f64::from(u8::from(*b)),
            MetricValue::Count(n) => *n as f64,
            MetricValue::Percent(p) => *p,
        }
    }
}

/// Immutable result of one evaluation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QualityReport {
    ok: bool,
    metrics: BTreeMap<String, MetricValue>,
    errors: Vec<Issue>,
    warnings: Vec<Issue>,
}

impl QualityReport {
    /// True iff there are no fatal errors.
    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn metrics(&self) -> &BTreeMap<String, MetricValue> {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name)
    }

    pub fn errors(&self) -> &[Issue] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Issue] {
        &self.warnings
    }

    pub fn has_error(&self, check: QualityCheck) -> bool {
        self.errors.iter().any(|i| i.check == check)
    }

    pub fn has_warning(&self, check: QualityCheck) -> bool {
        self.warnings.iter().any(|i| i.check == check)
    }
}

#[derive(Default)]
struct ReportBuilder {
    metrics: BTreeMap<String, MetricValue>,
    errors: Vec<Issue>,
    warnings: Vec<Issue>,
}

impl ReportBuilder {
    fn count(&mut self, name: &str, value: usize) {
        self.metrics.insert(name.to_string(), MetricValue::Count(value as u64));
    }

    fn pct(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), MetricValue::Percent(value));
    }

    fn flag(&mut self, name: &str, value: bool) {
        self.metrics.insert(name.to_string(), MetricValue::Bool(value));
    }

    fn error(&mut self, check: QualityCheck, message: String) {
        self.errors.push(Issue { check, message });
    }

    fn warning(&mut self, check: QualityCheck, message: String) {
        self.warnings.push(Issue { check, message });
    }

    fn finish(self) -> QualityReport {
        QualityReport {
            ok: self.errors.is_empty(),
            metrics: self.metrics,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

struct BaseStats {
    visible: usize,
    semi: usize,
    bg_remain: usize,
    bottom_green: usize,
    green_fringe: usize,
}

fn base_stats(img: &RasterImage, bg: Color, cfg: &QualityConfig) -> BaseStats {
    let (w, h) = img.dimensions();
    let bottom_start = h.saturating_sub(cfg.bottom_band);
    let mut stats = BaseStats {
        visible: 0,
        semi: 0,
        bg_remain: 0,
        bottom_green: 0,
        green_fringe: 0,
    };
    for y in 0..h {
        for x in 0..w {
            let px = img.rgba(x, y);
            if px[3] == 0 {
                continue;
            }
            let c = Color::from_rgba(px);
            stats.visible += 1;
            if px[3] < 255 {
                stats.semi += 1;
            }
            if c.l1(bg) <= cfg.bg_tol {
                stats.bg_remain += 1;
            }
            if y >= bottom_start && c.is_green_dominant(cfg.green_min, cfg.green_gap) {
                stats.bottom_green += 1;
            }
            if c.is_green_dominant(cfg.fringe_green_min, cfg.fringe_green_gap) {
                stats.green_fringe += 1;
            }
        }
    }
    stats
}

fn stray_top_white(img: &RasterImage, cfg: &QualityConfig) -> usize {
    let (w, h) = img.dimensions();
    let top = cfg.top_strip.min(h.saturating_sub(1));
    let mut stray = 0;
    for y in 0..top {
        for x in 0..w {
            let px = img.rgba(x, y);
            if px[3] == 0 || !Color::from_rgba(px).is_near_white(cfg.white_min) {
                continue;
            }
            if !(1..=2).any(|dy| y + dy < h && img.alpha(x, y + dy) > 0) {
                stray += 1;
            }
        }
    }
    stray
}

fn outline_white_pct(img: &RasterImage, cfg: &QualityConfig) -> f64 {
    let band = Mask::opaque(img).silhouette_band(&exterior_transparent(img), cfg.outline_thickness);
    let mut total = 0;
    let mut white = 0;
    for (x, y) in band.iter_set() {
        total += 1;
        if img.color(x, y).is_near_white(cfg.white_min) {
            white += 1;
        }
    }
    if total == 0 {
        100.0
    } else {
        pct(white, total)
    }
}

/// Green-dominant pixels among everything not reachable from the border
/// through transparency. Transparent interior pixels count toward the total.
fn interior_green(img: &RasterImage, cfg: &QualityConfig) -> (usize, f64) {
    let exterior = exterior_transparent(img);
    let (w, h) = img.dimensions();
    let mut green = 0;
    let mut total = 0;
    for y in 0..h {
        for x in 0..w {
            if exterior.get(x, y) {
                continue;
            }
            total += 1;
            let px = img.rgba(x, y);
            if px[3] > 0 && Color::from_rgba(px).is_green_dominant(cfg.green_min, cfg.green_gap) {
                green += 1;
            }
        }
    }
    (green, pct(green, total))
}

/// Semi-transparent share of visible pixels at least `ghost_erosion_px`
/// away from every edge.
fn interior_ghost(img: &RasterImage, cfg: &QualityConfig) -> (usize, f64) {
    let (w, h) = img.dimensions();
    let e = cfg.ghost_erosion_px;
    let mut semi = 0;
    let mut total = 0;
    for y in e..h.saturating_sub(e) {
        for x in e..w.saturating_sub(e) {
            let a = img.alpha(x, y);
            if a == 0 {
                continue;
            }
            total += 1;
            if a < 255 {
                semi += 1;
            }
        }
    }
    (semi, pct(semi, total))
}

struct Clipping {
    touching: Vec<Edge>,
    min_margin: u32,
}

fn clipping(img: &RasterImage) -> Clipping {
    let (w, h) = img.dimensions();
    let touching = Edge::ALL
        .into_iter()
        .filter(|edge| edge.line(w, h, 0).into_iter().any(|(x, y)| img.alpha(x, y) > 0))
        .collect();

    let (mut top, mut bottom, mut left, mut right) = (h, h, w, w);
    for y in 0..h {
        for x in 0..w {
            if img.alpha(x, y) > 0 {
                top = top.min(y);
                bottom = bottom.min(h - 1 - y);
                left = left.min(x);
                right = right.min(w - 1 - x);
            }
        }
    }
    Clipping {
        touching,
        min_margin: top.min(bottom).min(left).min(right),
    }
}

/// Per-edge (white, visible) counts inside an `edge_band_px` strip.
fn edge_white_counts(img: &RasterImage, cfg: &QualityConfig) -> Vec<(Edge, usize, usize)> {
    let (w, h) = img.dimensions();
    let band = cfg.edge_band_px;
    Edge::ALL
        .into_iter()
        .map(|edge| {
            let mut white = 0;
            let mut visible = 0;
            for layer in 0..band {
                for (x, y) in edge.line(w, h, layer) {
                    let px = img.rgba(x, y);
                    if px[3] == 0 {
                        continue;
                    }
                    visible += 1;
                    if Color::from_rgba(px).is_near_white(cfg.edge_white_min) {
                        white += 1;
                    }
                }
            }
            (edge, white, visible)
        })
        .collect()
}

/// Evaluate a finished sticker against `cfg`.
///
/// `encoded_len` is the byte size of the artifact as it will be persisted;
/// when `None` the file-size check is skipped.
pub fn evaluate_quality(
    img: &RasterImage,
    bg: Color,
    cfg: &QualityConfig,
    encoded_len: Option<usize>,
) -> QualityReport {
    let (w, h) = img.dimensions();
    let mut report = ReportBuilder::default();

    let base = base_stats(img, bg, cfg);
    let bg_remain_pct = pct(base.bg_remain, base.visible);
    let semi_pct = pct(base.semi, img.pixel_count());
    let bottom_green_pct = pct(base.bottom_green, cfg.bottom_band as usize * w as usize);
    let stray = stray_top_white(img, cfg);
    let (green_px, green_pct) = interior_green(img, cfg);
    let (ghost_px, ghost_pct) = interior_ghost(img, cfg);
    let clip = clipping(img);
    let edges = edge_white_counts(img, cfg);

    report.count("visible_px", base.visible);
    report.pct("bg_remain_pct", bg_remain_pct);
    report.pct("semi_pct", semi_pct);
    report.pct("bottom_green_pct", bottom_green_pct);
    report.count("stray_top_white_px", stray);
    report.pct("outline_white_pct", outline_white_pct(img, cfg));
    report.count("green_fringe_px", base.green_fringe);
    report.count("interior_green_px", green_px);
    report.pct("interior_green_pct", green_pct);
    report.count("interior_ghost_px", ghost_px);
    report.pct("interior_ghost_pct", ghost_pct);
    report.count("min_margin_px", clip.min_margin as usize);
    report.flag("edge_touching", !clip.touching.is_empty());
    report.count("width", w as usize);
    report.count("height", h as usize);
    if let Some(len) = encoded_len {
        report.count("file_size_bytes", len);
    }
    for (edge, white, visible) in &edges {
        report.pct(&format!("edge_white_pct_{}", edge.as_str()), pct(*white, *visible));
    }

    // fatal
    if bg_remain_pct > FATAL_PCT {
        report.error(
            QualityCheck::BackgroundResidue,
            format!("background residue {:.2}%", bg_remain_pct),
        );
    }
    if green_pct > cfg.interior_green_max_pct {
        report.error(
            QualityCheck::InteriorGreen,
            format!(
                "green left in interior cavities: {}px ({:.3}%, cap {:.3}%)",
                green_px, green_pct, cfg.interior_green_max_pct
            ),
        );
    }
    if bottom_green_pct > FATAL_PCT {
        report.error(
            QualityCheck::BottomGreenLine,
            format!("bottom green line {:.2}%", bottom_green_pct),
        );
    }
    if w > cfg.max_width || h > cfg.max_height {
        report.error(
            QualityCheck::Dimensions,
            format!("size {}x{} exceeds {}x{}", w, h, cfg.max_width, cfg.max_height),
        );
    }
    if w < cfg.min_width || h < cfg.min_height {
        report.error(
            QualityCheck::Dimensions,
            format!("size {}x{} below {}x{}", w, h, cfg.min_width, cfg.min_height),
        );
    }
    if let Some(len) = encoded_len {
        if len as u64 > cfg.max_file_size_bytes {
            report.error(
                QualityCheck::FileSize,
                format!("file size {} bytes exceeds {} bytes", len, cfg.max_file_size_bytes),
            );
        }
    }
    let white_edges: Vec<String> = edges
        .iter()
        .filter(|(_, white, visible)| *visible > 0 && *white as f64 / *visible as f64 > cfg.edge_white_max_ratio)
        .map(|(edge, white, visible)| format!("{}({:.0}%)", edge.as_str(), pct(*white, *visible)))
        .collect();
    if !white_edges.is_empty() {
        report.error(
            QualityCheck::EdgeWhiteLine,
            format!("white seam lines on edges: {}", white_edges.join(", ")),
        );
    }

    // cosmetic
    if bg_remain_pct > 0.0 && bg_remain_pct <= FATAL_PCT {
        report.warning(
            QualityCheck::BackgroundResidue,
            format!("slight background residue {:.2}%", bg_remain_pct),
        );
    }
    if bottom_green_pct > 0.0 && bottom_green_pct <= FATAL_PCT {
        report.warning(
            QualityCheck::BottomGreenLine,
            format!("slight bottom green line {:.2}%", bottom_green_pct),
        );
    }
    if semi_pct > 0.0 {
        report.warning(
            QualityCheck::SemiTransparent,
            format!("semi-transparent pixels {:.2}%", semi_pct),
        );
    }
    if ghost_pct > cfg.interior_ghost_max_pct {
        report.warning(
            QualityCheck::InteriorGhost,
            format!("semi-transparent interior: {}px ({:.3}%)", ghost_px, ghost_pct),
        );
    }
    if stray > 0 {
        report.warning(
            QualityCheck::StrayTopWhite,
            format!("stray white pixels at the top: {}px", stray),
        );
    }
    if !clip.touching.is_empty() {
        let sides: Vec<&str> = clip.touching.iter().map(Edge::as_str).collect();
        report.warning(
            QualityCheck::EdgeTouching,
            format!("content touches the {} edge", sides.join(", ")),
        );
    }
    if clip.min_margin < cfg.min_margin_px {
        report.warning(
            QualityCheck::Margin,
            format!("margin {}px below {}px", clip.min_margin, cfg.min_margin_px),
        );
    }

    report.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAR: [u8; 4] = [0, 0, 0, 0];
    const RED: [u8; 4] = [220, 30, 30, 255];
    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];

    /// Red block with a 4px white band, 40px clear of every edge.
    fn create_test_sticker(width: u32, height: u32) -> RasterImage {
        RasterImage::from_fn(width, height, |x, y| {
            let within = |m: u32| x >= m && y >= m && x < width - m && y < height - m;
            if within(44) {
                RED
            } else if within(40) {
                WHITE
            } else {
                CLEAR
            }
        })
        .unwrap()
    }

    fn eval(img: &RasterImage) -> QualityReport {
        evaluate_quality(img, Color::GREEN, &QualityConfig::strict(), Some(10_000))
    }

    mod verdict_tests {
        use super::*;

        #[test]
        fn test_clean_sticker_passes() {
            let report = eval(&create_test_sticker(370, 320));
            assert!(report.ok(), "{:?}", report.errors());
            assert!(report.errors().is_empty());
            assert!(report.warnings().is_empty(), "{:?}", report.warnings());
            assert_eq!(report.metric("outline_white_pct"), Some(&MetricValue::Percent(100.0)));
            assert_eq!(report.metric("min_margin_px"), Some(&MetricValue::Count(40)));
        }

        #[test]
        fn test_hole_rim_is_not_outline() {
            let mut img = create_test_sticker(370, 320);
            for y in 150..170 {
                for x in 175..195 {
                    img.put(x, y, CLEAR);
                }
            }
            let report = eval(&img);
            assert_eq!(report.metric("outline_white_pct"), Some(&MetricValue::Percent(100.0)));
            assert!(report.ok(), "{:?}", report.errors());
        }

        #[test]
        fn test_bottom_green_rows_are_fatal() {
            let mut img = create_test_sticker(370, 320);
            for y in 316..320 {
                for x in 0..370 {
                    img.put(x, y, GREEN);
                }
            }
            let report = eval(&img);
            assert!(!report.ok());
            assert!(report.has_error(QualityCheck::BottomGreenLine));
            assert!(!report.has_warning(QualityCheck::BottomGreenLine));
        }

        #[test]
        fn test_semi_transparency_only_warns() {
            let mut img = create_test_sticker(370, 320);
            img.put(100, 100, [220, 30, 30, 128]);
            let report = eval(&img);
            assert!(report.ok());
            assert!(report.has_warning(QualityCheck::SemiTransparent));
            // strict ghost cap is zero
            assert!(report.has_warning(QualityCheck::InteriorGhost));
        }

        #[test]
        fn test_slight_residue_warns_heavy_residue_fails() {
            let mut img = create_test_sticker(370, 320);
            img.put(100, 100, GREEN);
            let report = eval(&img);
            assert!(report.ok());
            assert!(report.has_warning(QualityCheck::BackgroundResidue));

            for y in 50..150 {
                for x in 50..150 {
                    img.put(x, y, [10, 250, 10, 255]);
                }
            }
            let report = eval(&img);
            assert!(report.has_error(QualityCheck::BackgroundResidue));
            assert!(!report.has_warning(QualityCheck::BackgroundResidue));
        }
    }

    mod limit_tests {
        use super::*;

        #[test]
        fn test_exact_max_dimensions_pass() {
            let report = eval(&create_test_sticker(370, 320));
            assert!(!report.has_error(QualityCheck::Dimensions));
        }

        #[test]
        fn test_one_pixel_over_fails() {
            assert!(eval(&create_test_sticker(371, 320)).has_error(QualityCheck::Dimensions));
            assert!(eval(&create_test_sticker(370, 321)).has_error(QualityCheck::Dimensions));
        }

        #[test]
        fn test_below_minimum_fails() {
            let img = RasterImage::filled(49, 60, CLEAR).unwrap();
            assert!(eval(&img).has_error(QualityCheck::Dimensions));
        }

        #[test]
        fn test_file_size_cap() {
            let img = create_test_sticker(370, 320);
            let cfg = QualityConfig::strict();
            let at_cap = evaluate_quality(&img, Color::GREEN, &cfg, Some(1024 * 1024));
            assert!(at_cap.ok());
            let over = evaluate_quality(&img, Color::GREEN, &cfg, Some(1024 * 1024 + 1));
            assert!(over.has_error(QualityCheck::FileSize));
            let unknown = evaluate_quality(&img, Color::GREEN, &cfg, None);
            assert!(unknown.metric("file_size_bytes").is_none());
        }
    }

    mod artifact_tests {
        use super::*;

        #[test]
        fn test_edge_white_line_is_fatal() {
            let mut img = create_test_sticker(370, 320);
            for x in 0..370 {
                img.put(x, 0, WHITE);
            }
            let report = eval(&img);
            assert!(report.has_error(QualityCheck::EdgeWhiteLine));
            assert!(report.has_warning(QualityCheck::EdgeTouching));
            assert!(report.has_warning(QualityCheck::Margin));
        }

        #[test]
        fn test_interior_green_cavity_is_fatal() {
            let mut img = create_test_sticker(370, 320);
            for y in 150..170 {
                for x in 150..170 {
                    img.put(x, y, GREEN);
                }
            }
            let report = eval(&img);
            assert!(report.has_error(QualityCheck::InteriorGreen));
        }

        #[test]
        fn test_stray_top_white_warns() {
            let mut img = create_test_sticker(370, 320);
            img.put(200, 3, WHITE);
            let report = eval(&img);
            assert!(report.has_warning(QualityCheck::StrayTopWhite));
            assert!(report.ok());
        }

        #[test]
        fn test_empty_image_margin() {
            let img = RasterImage::filled(100, 80, CLEAR).unwrap();
            let report = eval(&img);
            // no visible pixels: margins stay at the full extent
            assert_eq!(report.metric("min_margin_px"), Some(&MetricValue::Count(80)));
            assert_eq!(report.metric("outline_white_pct"), Some(&MetricValue::Percent(100.0)));
            assert!(report.ok());
        }

        #[test]
        fn test_report_serializes_to_json() {
            let report = eval(&create_test_sticker(370, 320));
            let json = serde_json::to_value(&report).unwrap();
            assert_eq!(json["ok"], serde_json::json!(true));
            assert_eq!(json["metrics"]["edge_touching"], serde_json::json!(false));
        }
    }
}
