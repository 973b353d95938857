// src/engine/palette.rs
//
// Character palette and chroma-key selection, so the generator can be told
// which background color will not collide with the character.

use crate::engine::raster::{Color, RasterImage};
use crate::engine::resize::resize_exact;
use crate::error::Result;
use serde::Serialize;
use std::collections::HashMap;

/// Square the center crop is resampled to before bucketing.
const SAMPLE_SIDE: u32 = 100;
const BUCKET: u8 = 32;
/// Minimum Euclidean distance between green and every dominant color.
pub const SAFE_KEY_DISTANCE: f64 = 150.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChromaKey {
    Green,
    Magenta,
}

impl ChromaKey {
    pub fn color(&self) -> Color {
        match self {
            ChromaKey::Green => Color::GREEN,
            ChromaKey::Magenta => Color::MAGENTA,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChromaKey::Green => "green",
            ChromaKey::Magenta => "magenta",
        }
    }

    /// Prompt snippet, e.g. `green #00FF00`.
    pub fn describe(&self) -> String {
        format!("{} {}", self.name(), self.color())
    }
}

#[inline]
fn bucket_center(v: u8) -> u8 {
    ((v / BUCKET) as u16 * BUCKET as u16 + BUCKET as u16 / 2).min(255) as u8
}

/// Top `n` bucketed colors of the central 60% of a character image.
/// Alpha is ignored.
pub fn dominant_colors(img: &RasterImage, n: usize) -> Result<Vec<Color>> {
    let (w, h) = img.dimensions();
    let (mx, my) = ((w as f64 * 0.2) as u32, (h as f64 * 0.2) as u32);
    let center = img.crop(mx, my, (w - 2 * mx).max(1), (h - 2 * my).max(1))?;
    let sample = resize_exact(&center, SAMPLE_SIDE, SAMPLE_SIDE)?;

    let mut order: Vec<Color> = Vec::new();
    let mut counts: HashMap<Color, usize> = HashMap::new();
    for px in sample.as_raw().chunks_exact(4) {
        let c = Color::new(bucket_center(px[0]), bucket_center(px[1]), bucket_center(px[2]));
        let count = counts.entry(c).or_insert(0);
        if *count == 0 {
            order.push(c);
        }
        *count += 1;
    }
    // stable: equal counts keep first-seen order
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order.truncate(n);
    Ok(order)
}

/// Green unless some dominant color sits within [`SAFE_KEY_DISTANCE`] of it.
pub fn select_chroma_key(dominant: &[Color]) -> ChromaKey {
    let green_distance = dominant
        .iter()
        .map(|c| (c.dist2(Color::GREEN) as f64).sqrt())
        .fold(f64::INFINITY, f64::min);
    if green_distance >= SAFE_KEY_DISTANCE {
        ChromaKey::Green
    } else {
        ChromaKey::Magenta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_center() {
        assert_eq!(bucket_center(0), 16);
        assert_eq!(bucket_center(40), 48);
        assert_eq!(bucket_center(255), 240);
    }

    #[test]
    fn test_dominant_colors_ignore_border() {
        // red frame around a blue center
        let img = RasterImage::from_fn(100, 100, |x, y| {
            if (25..75).contains(&x) && (25..75).contains(&y) {
                [10, 10, 200, 255]
            } else {
                [200, 10, 10, 255]
            }
        })
        .unwrap();
        let colors = dominant_colors(&img, 2).unwrap();
        assert_eq!(colors[0], Color::new(16, 16, 208));
        assert!(colors.len() <= 2);
    }

    #[test]
    fn test_chroma_key_selection() {
        assert_eq!(select_chroma_key(&[]), ChromaKey::Green);
        assert_eq!(select_chroma_key(&[Color::new(240, 200, 180)]), ChromaKey::Green);
        assert_eq!(select_chroma_key(&[Color::new(48, 208, 48)]), ChromaKey::Magenta);
        assert_eq!(ChromaKey::Magenta.describe(), "magenta #FF00FF");
    }
}
