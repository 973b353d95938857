// src/engine/raster.rs
//
// Owned RGBA raster and color primitives shared by every pipeline stage.

use crate::error::{Result, StampcutError};
use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An 8-bit RGB triple. Background comparisons never use exact equality;
/// see [`Color::dist2`], [`Color::l1`] and [`Color::quantize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(255, 255, 255);
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const GREEN: Color = Color::new(0, 255, 0);
    pub const MAGENTA: Color = Color::new(255, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[inline]
    pub fn from_rgba(px: [u8; 4]) -> Self {
        Self::new(px[0], px[1], px[2])
    }

    #[inline]
    pub fn to_rgba(self, alpha: u8) -> [u8; 4] {
        [self.r, self.g, self.b, alpha]
    }

    /// Squared Euclidean distance in RGB space.
    #[inline]
    pub fn dist2(self, other: Color) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }

    /// Sum of absolute channel differences.
    #[inline]
    pub fn l1(self, other: Color) -> u32 {
        self.r.abs_diff(other.r) as u32
            + self.g.abs_diff(other.g) as u32
            + self.b.abs_diff(other.b) as u32
    }

    /// Round every channel to the nearest multiple of `step`.
    ///
    /// Ties go to the even multiple; results above 255 saturate.
    pub fn quantize(self, step: u8) -> Self {
        Self::new(
            quantize_channel(self.r, step),
            quantize_channel(self.g, step),
            quantize_channel(self.b, step),
        )
    }

    #[inline]
    pub fn min_channel(self) -> u8 {
        self.r.min(self.g).min(self.b)
    }

    /// All three channels at or above `floor`.
    #[inline]
    pub fn is_near_white(self, floor: u8) -> bool {
        self.min_channel() >= floor
    }

    /// Green at or above `floor` and ahead of max(red, blue) by at least `gap`.
    #[inline]
    pub fn is_green_dominant(self, floor: u8, gap: u8) -> bool {
        self.g >= floor && self.g as i32 - self.r.max(self.b) as i32 >= gap as i32
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Find the first `#RRGGBB` literal inside free text, e.g.
    /// `"green #00FF00"`.
    pub fn find_in_text(text: &str) -> Option<Self> {
        let bytes = text.as_bytes();
        bytes.iter().enumerate().find_map(|(i, &b)| {
            if b != b'#' || i + 7 > bytes.len() {
                return None;
            }
            if !bytes[i + 1..i + 7].iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            parse_hex_digits(&text[i + 1..i + 7])
        })
    }
}

fn quantize_channel(value: u8, step: u8) -> u8 {
    if step <= 1 {
        return value;
    }
    let step = step as u32;
    let v = value as u32;
    let mut q = v / step;
    let twice_rem = 2 * (v % step);
    if twice_rem > step || (twice_rem == step && q % 2 == 1) {
        q += 1;
    }
    (q * step).min(255) as u8
}

fn parse_hex_digits(digits: &str) -> Option<Color> {
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some(Color::new(channel(0)?, channel(2)?, channel(4)?))
}

impl FromStr for Color {
    type Err = StampcutError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        trimmed
            .strip_prefix('#')
            .and_then(parse_hex_digits)
            .ok_or_else(|| StampcutError::invalid_color(trimmed.to_string()))
    }
}

impl TryFrom<String> for Color {
    type Error = StampcutError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Owned, non-empty, 8-bit RGBA raster.
///
/// Invariant: width·height > 0 and the buffer holds exactly width·height·4
/// bytes. Alpha is straight (not premultiplied).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    inner: RgbaImage,
}

impl RasterImage {
    /// Wrap a raw RGBA buffer, failing fast on zero area or a length mismatch.
    pub fn from_raw(width: u32, height: u32, buf: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(StampcutError::empty_image(width, height));
        }
        let len = buf.len();
        if len as u64 != width as u64 * height as u64 * 4 {
            return Err(StampcutError::buffer_length_mismatch(width, height, len));
        }
        RgbaImage::from_raw(width, height, buf)
            .map(|inner| Self { inner })
            .ok_or_else(|| StampcutError::buffer_length_mismatch(width, height, len))
    }

    pub fn from_rgba(inner: RgbaImage) -> Result<Self> {
        if inner.width() == 0 || inner.height() == 0 {
            return Err(StampcutError::empty_image(inner.width(), inner.height()));
        }
        Ok(Self { inner })
    }

    /// Accept only 8-bit RGBA. Other layouts are rejected rather than
    /// converted here; format negotiation belongs to the decoder.
    pub fn from_dynamic(img: DynamicImage) -> Result<Self> {
        match img {
            DynamicImage::ImageRgba8(rgba) => Self::from_rgba(rgba),
            other => Err(StampcutError::unsupported_color_layout(format!(
                "{:?}",
                other.color()
            ))),
        }
    }

    pub fn filled(width: u32, height: u32, px: [u8; 4]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(StampcutError::empty_image(width, height));
        }
        Ok(Self {
            inner: RgbaImage::from_pixel(width, height, Rgba(px)),
        })
    }

    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> [u8; 4],
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(StampcutError::empty_image(width, height));
        }
        Ok(Self {
            inner: RgbaImage::from_fn(width, height, |x, y| Rgba(f(x, y))),
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width() as usize + x as usize
    }

    #[inline]
    pub fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        self.inner.get_pixel(x, y).0
    }

    #[inline]
    pub fn color(&self, x: u32, y: u32) -> Color {
        Color::from_rgba(self.rgba(x, y))
    }

    #[inline]
    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        self.inner.get_pixel(x, y).0[3]
    }

    #[inline]
    pub fn put(&mut self, x: u32, y: u32, px: [u8; 4]) {
        self.inner.put_pixel(x, y, Rgba(px));
    }

    #[inline]
    pub fn set_alpha(&mut self, x: u32, y: u32, alpha: u8) {
        self.inner.get_pixel_mut(x, y).0[3] = alpha;
    }

    /// Repaint RGB, keeping alpha.
    #[inline]
    pub fn set_color(&mut self, x: u32, y: u32, color: Color) {
        let px = self.inner.get_pixel_mut(x, y);
        px.0[0] = color.r;
        px.0[1] = color.g;
        px.0[2] = color.b;
    }

    /// Alpha channel in row-major order.
    pub fn alpha_plane(&self) -> Vec<u8> {
        self.inner.as_raw().chunks_exact(4).map(|px| px[3]).collect()
    }

    pub fn visible_pixels(&self) -> usize {
        self.inner.as_raw().chunks_exact(4).filter(|px| px[3] > 0).count()
    }

    pub fn is_fully_transparent(&self) -> bool {
        self.inner.as_raw().chunks_exact(4).all(|px| px[3] == 0)
    }

    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<RasterImage> {
        let (img_w, img_h) = self.dimensions();
        if width == 0
            || height == 0
            || x.checked_add(width).map_or(true, |r| r > img_w)
            || y.checked_add(height).map_or(true, |b| b > img_h)
        {
            return Err(StampcutError::invalid_crop_bounds(
                x, y, width, height, img_w, img_h,
            ));
        }
        let view = image::imageops::crop_imm(&self.inner, x, y, width, height);
        Ok(Self {
            inner: view.to_image(),
        })
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.inner
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.inner
    }

    pub fn as_raw(&self) -> &[u8] {
        self.inner.as_raw()
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.inner.into_raw()
    }

    pub fn into_dynamic(self) -> DynamicImage {
        DynamicImage::ImageRgba8(self.inner)
    }
}
