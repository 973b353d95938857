// src/engine/mask.rs
//
// Per-pixel boolean planes: opacity masks, boundary bands and the
// exterior/interior split shared by the repair passes and the evaluator.

use crate::engine::raster::RasterImage;
use std::collections::VecDeque;

/// Row-major width×height bitmap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Pixels satisfying `pred(rgba)`.
    pub fn from_pixels(img: &RasterImage, pred: impl Fn([u8; 4]) -> bool) -> Self {
        let bits = img
            .as_raw()
            .chunks_exact(4)
            .map(|px| pred([px[0], px[1], px[2], px[3]]))
            .collect();
        Self {
            width: img.width(),
            height: img.height(),
            bits,
        }
    }

    /// alpha > 0
    pub fn opaque(img: &RasterImage) -> Self {
        Self::from_pixels(img, |px| px[3] > 0)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn idx(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[self.idx(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let i = self.idx(x, y);
        self.bits[i] = value;
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Set coordinates in row-major order.
    pub fn iter_set(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let w = self.width;
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, &b)| b)
            .map(move |(i, _)| ((i as u32) % w, (i as u32) / w))
    }

    #[inline]
    pub fn is_border(&self, x: u32, y: u32) -> bool {
        x == 0 || y == 0 || x + 1 == self.width || y + 1 == self.height
    }

    /// In-bounds 4-neighbors of (x, y).
    pub fn neighbors4(&self, x: u32, y: u32) -> impl Iterator<Item = (u32, u32)> {
        let (w, h) = (self.width, self.height);
        let left = (x > 0).then(|| (x - 1, y));
        let right = (x + 1 < w).then(|| (x + 1, y));
        let up = (y > 0).then(|| (x, y - 1));
        let down = (y + 1 < h).then(|| (x, y + 1));
        [left, right, up, down].into_iter().flatten()
    }

    /// Pixels of this mask that sit on the image border or next to an unset
    /// 4-neighbor, grown `thickness - 1` rounds inward through the mask.
    ///
    /// Each growth round expands only from the band of the previous round.
    pub fn boundary_band(&self, thickness: u32) -> Mask {
        self.grow_band(thickness, |x, y| {
            self.is_border(x, y) || self.neighbors4(x, y).any(|(nx, ny)| !self.get(nx, ny))
        })
    }

    /// [`Mask::boundary_band`] seeded only from pixels on the image border or
    /// next to `outside`. Rims of enclosed holes are not part of it.
    pub fn silhouette_band(&self, outside: &Mask, thickness: u32) -> Mask {
        self.grow_band(thickness, |x, y| {
            self.is_border(x, y) || self.neighbors4(x, y).any(|(nx, ny)| outside.get(nx, ny))
        })
    }

    fn grow_band(&self, thickness: u32, is_seed: impl Fn(u32, u32) -> bool) -> Mask {
        let mut band = Mask::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) && is_seed(x, y) {
                    band.set(x, y, true);
                }
            }
        }
        for _ in 1..thickness.max(1) {
            let prev = band.clone();
            for y in 0..self.height {
                for x in 0..self.width {
                    if !self.get(x, y) || prev.get(x, y) {
                        continue;
                    }
                    if self.neighbors4(x, y).any(|(nx, ny)| prev.get(nx, ny)) {
                        band.set(x, y, true);
                    }
                }
            }
        }
        band
    }
}

/// One of the four image edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Top, Edge::Bottom, Edge::Left, Edge::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::Top => "top",
            Edge::Bottom => "bottom",
            Edge::Left => "left",
            Edge::Right => "right",
        }
    }

    /// Coordinates of the line `layer` pixels in from this edge. Empty when
    /// the image is too small to have that layer.
    pub fn line(&self, width: u32, height: u32, layer: u32) -> Vec<(u32, u32)> {
        if layer >= width || layer >= height {
            return Vec::new();
        }
        match self {
            Edge::Top => (0..width).map(|x| (x, layer)).collect(),
            Edge::Bottom => (0..width).map(|x| (x, height - 1 - layer)).collect(),
            Edge::Left => (0..height).map(|y| (layer, y)).collect(),
            Edge::Right => (0..height).map(|y| (width - 1 - layer, y)).collect(),
        }
    }
}

/// Fully transparent pixels connected to the image border through other
/// fully transparent pixels. Everything outside this mask is "interior"
/// or opaque.
pub fn exterior_transparent(img: &RasterImage) -> Mask {
    let (w, h) = img.dimensions();
    let mut exterior = Mask::new(w, h);
    let mut queue = VecDeque::new();

    for y in 0..h {
        for x in 0..w {
            if exterior.is_border(x, y) && img.alpha(x, y) == 0 {
                exterior.set(x, y, true);
                queue.push_back((x, y));
            }
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        for (nx, ny) in exterior.neighbors4(x, y) {
            if !exterior.get(nx, ny) && img.alpha(nx, ny) == 0 {
                exterior.set(nx, ny, true);
                queue.push_back((nx, ny));
            }
        }
    }
    exterior
}
