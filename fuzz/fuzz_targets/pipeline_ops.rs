#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use stampcut::engine::{decode_rgba, Color, FirewallConfig, OutlineSpec, RasterImage, StickerPipeline};
use stampcut::ops::RepairPasses;

#[derive(Arbitrary, Debug)]
struct PipelineSeed {
    width: u8,
    height: u8,
    passes: u16,
    pin: bool,
    outline_radius: Option<u8>,
    fixed: Option<[u8; 3]>,
}

fn build_image(seed: &PipelineSeed, data: &[u8]) -> Option<RasterImage> {
    if let Ok(img) = decode_rgba(data, &FirewallConfig::strict()) {
        return Some(img);
    }
    let width = seed.width as u32 % 64 + 1;
    let height = seed.height as u32 % 64 + 1;
    let mut buffer = vec![0u8; (width * height * 4) as usize];
    for (i, byte) in buffer.iter_mut().enumerate() {
        *byte = data.get(i % data.len()).copied().unwrap_or(0);
    }
    RasterImage::from_raw(width, height, buffer).ok()
}

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let mut unstructured = Unstructured::new(data);
    let seed = match PipelineSeed::arbitrary(&mut unstructured) {
        Ok(seed) => seed,
        Err(_) => return,
    };
    let Some(img) = build_image(&seed, data) else {
        return;
    };

    let mut pipeline = StickerPipeline::strict()
        .with_passes(RepairPasses::from_bits_truncate(seed.passes))
        .with_pinned_background(seed.pin)
        .with_outline(seed.outline_radius.map(|r| OutlineSpec {
            radius: r as u32 % 16,
            ..OutlineSpec::default()
        }));
    if let Some([r, g, b]) = seed.fixed {
        pipeline = pipeline.with_fixed_background(Color::new(r, g, b));
    }
    let _ = pipeline.process(img);
});
