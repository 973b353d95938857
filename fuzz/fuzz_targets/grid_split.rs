#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use stampcut::config::QualityConfig;
use stampcut::engine::{split_grid, GridRequest, RasterImage};

#[derive(Arbitrary, Debug)]
struct GridSeed {
    width: u16,
    height: u16,
    rows: u8,
    cols: u8,
    trim: u8,
    clean_edges: bool,
    fill: [u8; 4],
}

fuzz_target!(|seed: GridSeed| {
    let width = seed.width as u32 % 512 + 1;
    let height = seed.height as u32 % 512 + 1;
    let Ok(img) = RasterImage::filled(width, height, seed.fill) else {
        return;
    };
    let req = GridRequest::new(seed.rows as u32 % 16, seed.cols as u32 % 16)
        .with_trim(seed.trim as u32 % 8)
        .with_clean_edges(seed.clean_edges);
    if let Ok(split) = split_grid(&img, &req, &QualityConfig::strict()) {
        assert_eq!(split.cells.len(), (split.layout.rows * split.layout.cols) as usize);
    }
});
