// src/engine/flood.rs
//
// Border-connected background removal.

use crate::config::BackgroundConfig;
use crate::engine::background::{in_band, BackgroundEstimate};
use crate::engine::mask::Mask;
use crate::engine::raster::{Color, RasterImage};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::debug;

/// What one flood-fill run removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FloodStats {
    /// Band width actually seeded from (1 for ring seeding)
    pub band: u32,
    pub background_pixels: usize,
    pub total_pixels: usize,
}

impl FloodStats {
    pub fn removed_pct(&self) -> f64 {
        if self.total_pixels == 0 {
            return 0.0;
        }
        self.background_pixels as f64 * 100.0 / self.total_pixels as f64
    }
}

#[inline]
fn qualifies(px: [u8; 4], candidates: &[Color], alpha_threshold: u8, tol2: u32) -> bool {
    if px[3] <= alpha_threshold {
        return true;
    }
    let color = Color::from_rgba(px);
    candidates.iter().any(|c| color.dist2(*c) <= tol2)
}

/// Clear every background pixel reachable from the border.
///
/// Seeds are the outer ring for fixed colors, otherwise the whole sampled
/// band. Pixels enclosed by non-qualifying content are never touched; color
/// channels of removed pixels are preserved.
pub fn remove_background(
    img: &mut RasterImage,
    estimate: &BackgroundEstimate,
    cfg: &BackgroundConfig,
) -> FloodStats {
    let (w, h) = img.dimensions();
    let candidates = estimate.candidates();
    let tol2 = cfg.tolerance.saturating_mul(cfg.tolerance);
    let seed_band = if estimate.seeds_from_ring() {
        1
    } else {
        estimate.band().max(1)
    };

    let mut visited = Mask::new(w, h);
    let mut background = Mask::new(w, h);
    let mut queue = VecDeque::new();

    for y in 0..h {
        for x in 0..w {
            if in_band(x, y, w, h, 0, seed_band) {
                visited.set(x, y, true);
                queue.push_back((x, y));
            }
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        if !qualifies(img.rgba(x, y), candidates, cfg.alpha_threshold, tol2) {
            continue;
        }
        background.set(x, y, true);
        for (nx, ny) in visited.neighbors4(x, y) {
            if !visited.get(nx, ny) {
                visited.set(nx, ny, true);
                queue.push_back((nx, ny));
            }
        }
    }

    let mut removed = 0;
    for (x, y) in background.iter_set() {
        img.set_alpha(x, y, 0);
        removed += 1;
    }

    let stats = FloodStats {
        band: seed_band,
        background_pixels: removed,
        total_pixels: img.pixel_count(),
    };
    debug!(
        band = stats.band,
        removed = stats.background_pixels,
        total = stats.total_pixels,
        "flood fill removed background"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::background::estimate_background;

    fn green_with_red_block(hole: bool) -> RasterImage {
        RasterImage::from_fn(40, 40, |x, y| {
            let in_block = (10..30).contains(&x) && (10..30).contains(&y);
            let in_hole = (18..22).contains(&x) && (18..22).contains(&y);
            if in_block && !(hole && in_hole) {
                [220, 30, 30, 255]
            } else {
                [0, 255, 0, 255]
            }
        })
        .unwrap()
    }

    #[test]
    fn test_flat_fixed_color_clears_everything() {
        let mut img = RasterImage::filled(16, 12, [0, 255, 0, 255]).unwrap();
        let cfg = BackgroundConfig::default().with_fixed_color(Color::GREEN);
        let est = estimate_background(&img, &cfg).unwrap();
        let stats = remove_background(&mut img, &est, &cfg);
        assert_eq!(stats.background_pixels, 16 * 12);
        assert!(img.is_fully_transparent());
        // rgb preserved
        assert_eq!(img.rgba(3, 3), [0, 255, 0, 0]);
    }

    #[test]
    fn test_no_matching_pixels_is_noop() {
        let original = RasterImage::filled(20, 20, [200, 10, 10, 255]).unwrap();
        let mut img = original.clone();
        let cfg = BackgroundConfig::default().with_fixed_color(Color::GREEN);
        let est = estimate_background(&img, &cfg).unwrap();
        let stats = remove_background(&mut img, &est, &cfg);
        assert_eq!(stats.background_pixels, 0);
        assert_eq!(img, original);
    }

    #[test]
    fn test_enclosed_background_is_kept() {
        let mut img = green_with_red_block(true);
        let cfg = BackgroundConfig::default();
        let est = estimate_background(&img, &cfg).unwrap();
        remove_background(&mut img, &est, &cfg);
        assert_eq!(img.alpha(0, 0), 0);
        assert_eq!(img.alpha(15, 15), 255);
        // hole is not border connected
        assert_eq!(img.alpha(20, 20), 255);
    }

    #[test]
    fn test_ring_and_band_seeding_agree_on_simple_image() {
        let cfg = BackgroundConfig::default();
        let mut sampled = green_with_red_block(false);
        let est = estimate_background(&sampled, &cfg).unwrap();
        let mut pinned = sampled.clone();
        remove_background(&mut sampled, &est, &cfg);
        remove_background(&mut pinned, &est.clone().pinned(), &cfg);
        assert_eq!(sampled, pinned);
    }

    #[test]
    fn test_transparent_pixels_carry_the_fill() {
        // transparent corridor with a green pocket behind red
        let mut img = RasterImage::from_fn(20, 5, |x, _| match x {
            0..=4 => [0, 0, 0, 0],
            5..=9 => [0, 255, 0, 255],
            _ => [200, 0, 0, 255],
        })
        .unwrap();
        let cfg = BackgroundConfig::default().with_fixed_color(Color::GREEN);
        let est = estimate_background(&img, &cfg).unwrap();
        remove_background(&mut img, &est, &cfg);
        assert_eq!(img.alpha(7, 2), 0);
        assert_eq!(img.alpha(12, 2), 255);
    }
}
