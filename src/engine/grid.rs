// src/engine/grid.rs
//
// Composite grid splitting with orientation detection.

use crate::config::QualityConfig;
use crate::engine::raster::RasterImage;
use crate::engine::repair::clean_border_seams;
use crate::error::{Result, StampcutError};
use crate::ops::StickerFormat;
use serde::Serialize;
use tracing::{debug, info};

/// Pixels trimmed from each side of a cell to drop seam bleed.
pub const DEFAULT_TRIM: u32 = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct GridRequest {
    pub rows: u32,
    pub cols: u32,
    /// Cell width / height the output format wants
    pub target_aspect: f64,
    pub trim: u32,
    /// Run the border seam cleaner on every cell
    pub clean_edges: bool,
}

impl GridRequest {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self {
            rows,
            cols,
            target_aspect: StickerFormat::stamp().target_aspect(),
            trim: DEFAULT_TRIM,
            clean_edges: true,
        }
    }

    pub fn with_format(mut self, format: &StickerFormat) -> Self {
        self.target_aspect = format.target_aspect();
        self
    }

    pub fn with_trim(mut self, trim: u32) -> Self {
        self.trim = trim;
        self
    }

    pub fn with_clean_edges(mut self, clean_edges: bool) -> Self {
        self.clean_edges = clean_edges;
        self
    }

    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

impl Default for GridRequest {
    fn default() -> Self {
        Self::new(3, 4)
    }
}

/// The partition actually used.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GridLayout {
    pub rows: u32,
    pub cols: u32,
    /// Rows and columns were exchanged relative to the request
    pub swapped: bool,
    pub cell_width: u32,
    pub cell_height: u32,
}

impl GridLayout {
    pub fn cell_aspect(&self) -> f64 {
        self.cell_width as f64 / self.cell_height as f64
    }
}

#[derive(Clone, Debug)]
pub struct GridSplit {
    pub layout: GridLayout,
    /// Row-major
    pub cells: Vec<RasterImage>,
}

/// `round(i * length / count)` for i in 1..count, framed by 0 and `length`.
///
/// Rounding is half-to-even; the sequence is forced non-decreasing.
pub fn grid_bounds(length: u32, count: u32) -> Vec<u32> {
    if count == 0 {
        return vec![0, length];
    }
    let mut bounds = Vec::with_capacity(count as usize + 1);
    bounds.push(0);
    for i in 1..count as u64 {
        let n = i * length as u64;
        let d = count as u64;
        let mut q = n / d;
        let twice_rem = 2 * (n % d);
        if twice_rem > d || (twice_rem == d && q % 2 == 1) {
            q += 1;
        }
        bounds.push(q as u32);
    }
    bounds.push(length);
    for i in 1..bounds.len() {
        if bounds[i] < bounds[i - 1] {
            bounds[i] = bounds[i - 1];
        }
    }
    bounds
}

/// Trimmed cell rectangles `(x, y, w, h)` in row-major order.
fn cell_rects(width: u32, height: u32, rows: u32, cols: u32, trim: u32) -> Result<Vec<(u32, u32, u32, u32)>> {
    let xs = grid_bounds(width, cols);
    let ys = grid_bounds(height, rows);
    let mut rects = Vec::with_capacity(rows as usize * cols as usize);
    for row in 0..rows as usize {
        for col in 0..cols as usize {
            let span_w = xs[col + 1] - xs[col];
            let span_h = ys[row + 1] - ys[row];
            if span_w <= 2 * trim || span_h <= 2 * trim {
                return Err(StampcutError::invalid_grid_layout(
                    rows,
                    cols,
                    format!(
                        "cell {}x{} at ({}, {}) is not larger than the {}px trim border",
                        span_w, span_h, xs[col], ys[row], trim
                    ),
                ));
            }
            rects.push((xs[col] + trim, ys[row] + trim, span_w - 2 * trim, span_h - 2 * trim));
        }
    }
    Ok(rects)
}

fn first_cell_aspect(rects: &[(u32, u32, u32, u32)]) -> f64 {
    rects
        .first()
        .map(|&(_, _, w, h)| w as f64 / h as f64)
        .unwrap_or(0.0)
}

/// Pick between the requested layout and its transpose by first-cell aspect.
///
/// The transpose wins only when strictly closer to the target; a square
/// request never swaps.
pub fn select_layout(width: u32, height: u32, req: &GridRequest) -> Result<GridLayout> {
    if req.rows == 0 || req.cols == 0 {
        return Err(StampcutError::invalid_grid_layout(
            req.rows,
            req.cols,
            "rows and cols must be at least 1",
        ));
    }
    let normal = cell_rects(width, height, req.rows, req.cols, req.trim)?;
    let ratio_normal = first_cell_aspect(&normal);

    let mut chosen = (req.rows, req.cols, false, normal[0]);
    if req.rows != req.cols {
        // an impossible transpose simply loses
        if let Ok(swapped) = cell_rects(width, height, req.cols, req.rows, req.trim) {
            let ratio_swapped = first_cell_aspect(&swapped);
            let diff_normal = (ratio_normal - req.target_aspect).abs();
            let diff_swapped = (ratio_swapped - req.target_aspect).abs();
            debug!(ratio_normal, ratio_swapped, target = req.target_aspect, "grid orientation");
            if diff_swapped < diff_normal {
                chosen = (req.cols, req.rows, true, swapped[0]);
            }
        }
    }

    let (rows, cols, swapped, (_, _, cell_width, cell_height)) = chosen;
    Ok(GridLayout {
        rows,
        cols,
        swapped,
        cell_width,
        cell_height,
    })
}

/// Split a composite into `rows * cols` cells.
///
/// `cfg` supplies the seam-cleaner thresholds when `clean_edges` is set.
pub fn split_grid(img: &RasterImage, req: &GridRequest, cfg: &QualityConfig) -> Result<GridSplit> {
    let (w, h) = img.dimensions();
    let layout = select_layout(w, h, req)?;
    let rects = cell_rects(w, h, layout.rows, layout.cols, req.trim)?;

    let mut cells = Vec::with_capacity(rects.len());
    for (x, y, cw, ch) in rects {
        let mut cell = img.crop(x, y, cw, ch)?;
        if req.clean_edges {
            clean_border_seams(&mut cell, cfg);
        }
        cells.push(cell);
    }

    info!(
        rows = layout.rows,
        cols = layout.cols,
        swapped = layout.swapped,
        cell_width = layout.cell_width,
        cell_height = layout.cell_height,
        "grid split"
    );
    Ok(GridSplit { layout, cells })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_composite(width: u32, height: u32) -> RasterImage {
        RasterImage::from_fn(width, height, |x, y| [(x % 256) as u8, (y % 256) as u8, 0, 255]).unwrap()
    }

    mod bounds_tests {
        use super::*;

        #[test]
        fn test_bounds_cover_full_length() {
            assert_eq!(grid_bounds(1200, 4), vec![0, 300, 600, 900, 1200]);
            assert_eq!(grid_bounds(10, 3), vec![0, 3, 7, 10]);
            assert_eq!(grid_bounds(5, 0), vec![0, 5]);
        }

        #[test]
        fn test_bounds_round_half_to_even() {
            // 5 / 2 = 2.5 -> 2
            assert_eq!(grid_bounds(5, 2), vec![0, 2, 5]);
            // 7 / 2 = 3.5 -> 4
            assert_eq!(grid_bounds(7, 2), vec![0, 4, 7]);
        }

        #[test]
        fn test_bounds_monotonic_when_count_exceeds_length() {
            let b = grid_bounds(2, 5);
            assert!(b.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(*b.last().unwrap(), 2);
        }
    }

    mod layout_tests {
        use super::*;

        #[test]
        fn test_wide_composite_requested_tall_is_swapped() {
            let req = GridRequest::new(4, 3);
            let layout = select_layout(1200, 900, &req).unwrap();
            assert!(layout.swapped);
            assert_eq!((layout.rows, layout.cols), (3, 4));
            assert_eq!((layout.cell_width, layout.cell_height), (296, 296));
        }

        #[test]
        fn test_matching_orientation_is_kept() {
            let req = GridRequest::new(3, 4);
            let layout = select_layout(1480, 960, &req).unwrap();
            assert!(!layout.swapped);
            assert_eq!((layout.cell_width, layout.cell_height), (366, 316));
        }

        #[test]
        fn test_square_request_never_swaps() {
            let req = GridRequest::new(4, 4);
            assert!(!select_layout(1600, 400, &req).unwrap().swapped);
        }

        #[test]
        fn test_rejects_degenerate_requests() {
            assert!(matches!(
                select_layout(100, 100, &GridRequest::new(0, 4)),
                Err(StampcutError::InvalidGridLayout { .. })
            ));
            // 10 px cells cannot survive a 5 px trim on both sides
            let req = GridRequest::new(2, 2).with_trim(5);
            assert!(select_layout(20, 20, &req).is_err());
        }
    }

    mod split_tests {
        use super::*;

        #[test]
        fn test_cells_in_row_major_order() {
            let img = create_test_composite(40, 30);
            let req = GridRequest::new(3, 4).with_clean_edges(false).with_trim(1);
            let split = split_grid(&img, &req, &QualityConfig::strict()).unwrap();
            assert_eq!(split.cells.len(), 12);
            assert!(!split.layout.swapped);
            // second cell starts at x = 10 + trim
            assert_eq!(split.cells[1].rgba(0, 0), [11, 1, 0, 255]);
            // fifth cell starts the second row at y = 10 + trim
            assert_eq!(split.cells[4].rgba(0, 0), [1, 11, 0, 255]);
            assert!(split.cells.iter().all(|c| c.dimensions() == (8, 8)));
        }

        #[test]
        fn test_clean_edges_repaints_seam_lines() {
            // white seam lines every 50 px through a green composite
            let img = RasterImage::from_fn(200, 100, |x, y| {
                if x % 50 < 3 || x % 50 > 47 || y % 50 < 3 || y % 50 > 47 {
                    [255, 255, 255, 255]
                } else {
                    [0, 255, 0, 255]
                }
            })
            .unwrap();
            let req = GridRequest::new(2, 4);
            let split = split_grid(&img, &req, &QualityConfig::strict()).unwrap();
            let cell = &split.cells[0];
            assert_eq!(cell.dimensions(), (46, 46));
            assert_eq!(cell.rgba(0, 0), [0, 255, 0, 255]);
            assert_eq!(cell.rgba(20, 20), [0, 255, 0, 255]);
        }
    }
}
