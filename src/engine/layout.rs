// src/engine/layout.rs
//
// Canvas placement: content bounds, margins, and the fixed-size store
// images (main, tab) derived from a finished sticker.

use crate::engine::raster::{Color, RasterImage};
use crate::engine::resize::{resize_exact, thumbnail};
use crate::error::Result;
use crate::ops::StickerFormat;
use serde::Serialize;

/// L1 distance from the corner color that counts as cell content.
const CONTENT_THRESHOLD: u32 = 30;

/// Inclusive-exclusive pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    fn from_extent(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        }
    }

    /// Smallest distance to any of the four edges of a `width`×`height` canvas.
    pub fn min_margin(&self, width: u32, height: u32) -> u32 {
        let right = width - (self.x + self.width);
        let bottom = height - (self.y + self.height);
        self.x.min(self.y).min(right).min(bottom)
    }
}

fn bounds_where(img: &RasterImage, pred: impl Fn([u8; 4]) -> bool) -> Option<Bounds> {
    let (w, h) = img.dimensions();
    let mut extent: Option<(u32, u32, u32, u32)> = None;
    for y in 0..h {
        for x in 0..w {
            if !pred(img.rgba(x, y)) {
                continue;
            }
            extent = Some(match extent {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
    }
    extent.map(|(x0, y0, x1, y1)| Bounds::from_extent(x0, y0, x1, y1))
}

/// Bounding box of every pixel with alpha > 0.
pub fn content_bounds(img: &RasterImage) -> Option<Bounds> {
    bounds_where(img, |px| px[3] > 0)
}

/// Smallest distance from visible content to an edge. An empty image
/// reports half its shorter side.
pub fn measure_min_margin(img: &RasterImage) -> u32 {
    let (w, h) = img.dimensions();
    content_bounds(img).map_or(w.min(h) / 2, |b| b.min_margin(w, h))
}

/// Straight-alpha source-over of `src` onto `dst` at (`ox`, `oy`).
/// Pixels falling outside `dst` are dropped.
pub fn composite_over(dst: &mut RasterImage, src: &RasterImage, ox: u32, oy: u32) {
    let (dw, dh) = dst.dimensions();
    for y in 0..src.height() {
        for x in 0..src.width() {
            let (tx, ty) = (ox + x, oy + y);
            if tx >= dw || ty >= dh {
                continue;
            }
            let s = src.rgba(x, y);
            if s[3] == 0 {
                continue;
            }
            if s[3] == 255 {
                dst.put(tx, ty, s);
                continue;
            }
            let d = dst.rgba(tx, ty);
            let sa = s[3] as f32 / 255.0;
            let da = d[3] as f32 / 255.0;
            let out_a = sa + da * (1.0 - sa);
            let mut out = [0u8; 4];
            for c in 0..3 {
                let v = (s[c] as f32 * sa + d[c] as f32 * da * (1.0 - sa)) / out_a;
                out[c] = v.round().clamp(0.0, 255.0) as u8;
            }
            out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
            dst.put(tx, ty, out);
        }
    }
}

/// Center `img` on a transparent `width`×`height` canvas.
fn center_on_canvas(img: &RasterImage, width: u32, height: u32) -> Result<RasterImage> {
    let mut canvas = RasterImage::filled(width, height, [0, 0, 0, 0])?;
    let ox = width.saturating_sub(img.width()) / 2;
    let oy = height.saturating_sub(img.height()) / 2;
    composite_over(&mut canvas, img, ox, oy);
    Ok(canvas)
}

/// Shrink content until every margin is at least `target_margin`, keeping
/// it centered. Images that already comply, or are empty, come back as-is.
pub fn normalize_margin(img: &RasterImage, target_margin: u32) -> Result<RasterImage> {
    let (w, h) = img.dimensions();
    let Some(bounds) = content_bounds(img) else {
        return Ok(img.clone());
    };
    if bounds.min_margin(w, h) >= target_margin {
        return Ok(img.clone());
    }

    let max_w = w.saturating_sub(2 * target_margin).max(1);
    let max_h = h.saturating_sub(2 * target_margin).max(1);
    let scale = (max_w as f64 / bounds.width as f64).min(max_h as f64 / bounds.height as f64);
    if scale >= 1.0 {
        return Ok(img.clone());
    }

    let content = img.crop(bounds.x, bounds.y, bounds.width, bounds.height)?;
    let new_w = ((bounds.width as f64 * scale) as u32).max(1);
    let new_h = ((bounds.height as f64 * scale) as u32).max(1);
    let resized = resize_exact(&content, new_w, new_h)?;
    center_on_canvas(&resized, w, h)
}

/// Shrink-only fit onto a transparent canvas of the format size.
pub fn fit_to_canvas(img: &RasterImage, format: &StickerFormat) -> Result<RasterImage> {
    let fitted = thumbnail(img, format.width, format.height)?;
    center_on_canvas(&fitted, format.width, format.height)
}

/// Store main image: center square crop resized to the main format.
pub fn main_image(img: &RasterImage) -> Result<RasterImage> {
    let (w, h) = img.dimensions();
    let side = w.min(h);
    let square = img.crop((w - side) / 2, (h - side) / 2, side, side)?;
    let main = StickerFormat::main();
    resize_exact(&square, main.width, main.height)
}

/// Chat tab icon, fitted inside the tab format.
pub fn tab_image(img: &RasterImage) -> Result<RasterImage> {
    fit_to_canvas(img, &StickerFormat::tab())
}

/// Most common corner color; ties go to the first corner in TL, TR, BL, BR.
fn corner_color(img: &RasterImage) -> Color {
    let (w, h) = img.dimensions();
    let corners = [
        img.color(0, 0),
        img.color(w - 1, 0),
        img.color(0, h - 1),
        img.color(w - 1, h - 1),
    ];
    let mut best = corners[0];
    let mut best_count = 0;
    for c in corners {
        let count = corners.iter().filter(|&&o| o == c).count();
        if count > best_count {
            best = c;
            best_count = count;
        }
    }
    best
}

/// Move the content of an unkeyed cell to its center, refilling the rest
/// with the corner background color.
pub fn center_content(cell: &RasterImage) -> Result<RasterImage> {
    let (w, h) = cell.dimensions();
    let bg = corner_color(cell);
    let bounds = bounds_where(cell, |px| Color::from_rgba(px).l1(bg) > CONTENT_THRESHOLD);
    let Some(bounds) = bounds.filter(|b| b.width > 1 && b.height > 1) else {
        return Ok(cell.clone());
    };

    let content = cell.crop(bounds.x, bounds.y, bounds.width, bounds.height)?;
    let mut out = RasterImage::filled(w, h, bg.to_rgba(255))?;
    composite_over(&mut out, &content, (w - bounds.width) / 2, (h - bounds.height) / 2);
    Ok(out)
}
