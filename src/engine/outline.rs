// src/engine/outline.rs
//
// Fringe removal and alpha dilation for a solid sticker outline.

use crate::engine::mask::Mask;
use crate::engine::raster::{Color, RasterImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutlineSpec {
    pub color: Color,
    /// Dilation radius in pixels
    pub radius: u32,
    /// Euclidean distance to the background that counts as fringe
    pub fringe_tol: u32,
}

impl Default for OutlineSpec {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            radius: 2,
            fringe_tol: 60,
        }
    }
}

/// Clear the blended halo left around a silhouette: semi-transparent pixels
/// near the background, then fully opaque pixels near the background that
/// touch a fully transparent 4-neighbor.
pub fn remove_fringe(img: &mut RasterImage, bg: Color, fringe_tol: u32) -> usize {
    let (w, h) = img.dimensions();
    let tol2 = fringe_tol.saturating_mul(fringe_tol);
    let near_bg = |c: Color| c.dist2(bg) < tol2;
    let mut changed = 0;

    for y in 0..h {
        for x in 0..w {
            let px = img.rgba(x, y);
            if px[3] > 0 && px[3] < 255 && near_bg(Color::from_rgba(px)) {
                img.set_alpha(x, y, 0);
                changed += 1;
            }
        }
    }

    let transparent = Mask::from_pixels(img, |px| px[3] == 0);
    let halo: Vec<(u32, u32)> = Mask::from_pixels(img, |px| px[3] == 255 && near_bg(Color::from_rgba(px)))
        .iter_set()
        .filter(|&(x, y)| transparent.neighbors4(x, y).any(|(nx, ny)| transparent.get(nx, ny)))
        .collect();
    for &(x, y) in &halo {
        img.set_alpha(x, y, 0);
    }
    changed + halo.len()
}

/// Square max filter of size `2 * radius + 1` over the alpha plane.
///
/// Separable: a horizontal pass then a vertical pass.
pub fn dilate_alpha(alpha: &[u8], width: u32, height: u32, radius: u32) -> Vec<u8> {
    let (w, h, r) = (width as usize, height as usize, radius as usize);
    if r == 0 {
        return alpha.to_vec();
    }
    let mut horizontal = vec![0u8; alpha.len()];
    for y in 0..h {
        let row = &alpha[y * w..(y + 1) * w];
        for x in 0..w {
            let lo = x.saturating_sub(r);
            let hi = (x + r).min(w - 1);
            horizontal[y * w + x] = row[lo..=hi].iter().copied().max().unwrap_or(0);
        }
    }
    let mut out = vec![0u8; alpha.len()];
    for x in 0..w {
        for y in 0..h {
            let lo = y.saturating_sub(r);
            let hi = (y + r).min(h - 1);
            out[y * w + x] = (lo..=hi).map(|yy| horizontal[yy * w + x]).max().unwrap_or(0);
        }
    }
    out
}

/// Remove fringe, then paint the newly covered ring in `spec.color`.
///
/// The original pixels end up composited over the ring; since the ring
/// only exists where the original alpha is 0, it is written directly.
pub fn add_outline(img: &mut RasterImage, bg: Color, spec: &OutlineSpec) -> usize {
    let fringe = remove_fringe(img, bg, spec.fringe_tol);
    let (w, h) = img.dimensions();
    let alpha = img.alpha_plane();
    let expanded = dilate_alpha(&alpha, w, h, spec.radius);

    let mut ring = 0;
    for y in 0..h {
        for x in 0..w {
            let i = img.index(x, y);
            if alpha[i] == 0 && expanded[i] > 0 {
                img.put(x, y, spec.color.to_rgba(expanded[i]));
                ring += 1;
            }
        }
    }
    debug!(fringe, ring, radius = spec.radius, "outline added");
    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_dot() -> RasterImage {
        RasterImage::from_fn(11, 11, |x, y| {
            if x == 5 && y == 5 {
                [200, 0, 0, 255]
            } else {
                [0, 255, 0, 0]
            }
        })
        .unwrap()
    }

    #[test]
    fn test_dilate_square_window() {
        let img = create_test_dot();
        let out = dilate_alpha(&img.alpha_plane(), 11, 11, 2);
        assert_eq!(out.iter().filter(|&&a| a == 255).count(), 25);
        assert_eq!(out[3 * 11 + 3], 255);
        assert_eq!(out[2 * 11 + 5], 0);
    }

    #[test]
    fn test_add_outline_paints_ring_only() {
        let mut img = create_test_dot();
        let ring = add_outline(&mut img, Color::GREEN, &OutlineSpec::default());
        assert_eq!(ring, 24);
        assert_eq!(img.rgba(5, 5), [200, 0, 0, 255]);
        assert_eq!(img.rgba(3, 7), [255, 255, 255, 255]);
        assert_eq!(img.alpha(2, 5), 0);
    }

    #[test]
    fn test_fringe_removal() {
        let mut img = RasterImage::from_fn(5, 1, |x, _| match x {
            0 => [0, 0, 0, 0],
            1 => [10, 240, 10, 255],
            2 => [20, 230, 20, 128],
            3 => [10, 240, 10, 255],
            _ => [200, 0, 0, 255],
        })
        .unwrap();
        let changed = remove_fringe(&mut img, Color::GREEN, 60);
        // 2 is semi, 1 touches transparent; 3 only touches 2 after the first
        // step, which counts as transparent too
        assert_eq!(changed, 3);
        assert_eq!(img.alpha_plane(), vec![0, 0, 0, 0, 255]);
    }

    #[test]
    fn test_outline_color_and_partial_alpha() {
        let mut img = RasterImage::from_fn(7, 1, |x, _| {
            if x == 3 {
                [10, 10, 200, 128]
            } else {
                [0, 0, 0, 0]
            }
        })
        .unwrap();
        let spec = OutlineSpec {
            color: Color::BLACK,
            radius: 1,
            ..Default::default()
        };
        add_outline(&mut img, Color::WHITE, &spec);
        assert_eq!(img.rgba(2, 0), [0, 0, 0, 128]);
        assert_eq!(img.rgba(3, 0), [10, 10, 200, 128]);
        assert_eq!(img.alpha(1, 0), 0);
    }
}
