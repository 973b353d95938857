// tests/property_based.rs
//
// Property-based checks over random rasters and grid geometry.

use proptest::prelude::*;
use stampcut::config::{BackgroundConfig, QualityConfig};
use stampcut::engine::grid::grid_bounds;
use stampcut::engine::repair::sweep_residual_background;
use stampcut::engine::resize::fit_within;
use stampcut::engine::{estimate_background, evaluate_quality, remove_background, repair_artifacts, Color, RasterImage};
use stampcut::ops::RepairPasses;

fn raster_strategy() -> impl Strategy<Value = RasterImage> {
    (1u32..=24, 1u32..=24).prop_flat_map(|(w, h)| {
        prop::collection::vec(any::<[u8; 4]>(), (w * h) as usize).prop_map(move |pixels| {
            RasterImage::from_raw(w, h, pixels.into_iter().flatten().collect()).unwrap()
        })
    })
}

/// Mostly green rasters so flood fill has something to remove.
fn keyed_raster_strategy() -> impl Strategy<Value = RasterImage> {
    let pixel = prop_oneof![
        3 => Just([0u8, 255, 0, 255]),
        1 => any::<[u8; 4]>(),
    ];
    (2u32..=24, 2u32..=24).prop_flat_map(move |(w, h)| {
        prop::collection::vec(pixel.clone(), (w * h) as usize).prop_map(move |pixels| {
            RasterImage::from_raw(w, h, pixels.into_iter().flatten().collect()).unwrap()
        })
    })
}

fn valid_crop_strategy() -> impl Strategy<Value = (u32, u32, u32, u32, u32, u32)> {
    (1u32..=64, 1u32..=64)
        .prop_flat_map(|(img_w, img_h)| (Just(img_w), Just(img_h), 1u32..=img_w, 1u32..=img_h))
        .prop_flat_map(|(img_w, img_h, crop_w, crop_h)| {
            (
                Just(img_w),
                Just(img_h),
                Just(crop_w),
                Just(crop_h),
                0u32..=img_w - crop_w,
                0u32..=img_h - crop_h,
            )
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_grid_bounds_partition_length(length in 0u32..=5000, count in 1u32..=12) {
        let bounds = grid_bounds(length, count);
        prop_assert_eq!(bounds.len(), count as usize + 1);
        prop_assert_eq!(bounds[0], 0);
        prop_assert_eq!(*bounds.last().unwrap(), length);
        prop_assert!(bounds.windows(2).all(|w| w[0] <= w[1]));
        for (i, b) in bounds.iter().enumerate() {
            let exact = i as f64 * length as f64 / count as f64;
            prop_assert!((*b as f64 - exact).abs() <= 0.5 + 1e-9);
        }
    }

    #[test]
    fn prop_flood_only_clears_alpha(img in keyed_raster_strategy()) {
        let cfg = BackgroundConfig::default();
        let estimate = estimate_background(&img, &cfg).unwrap();
        let mut out = img.clone();
        let stats = remove_background(&mut out, &estimate, &cfg);

        let mut cleared = 0;
        for (before, after) in img.as_raw().chunks_exact(4).zip(out.as_raw().chunks_exact(4)) {
            prop_assert_eq!(&before[..3], &after[..3]);
            if before[3] != after[3] {
                prop_assert_eq!(after[3], 0);
            }
            if after[3] == 0 && before[3] != 0 {
                cleared += 1;
            }
        }
        prop_assert!(cleared <= stats.background_pixels);
        prop_assert_eq!(stats.total_pixels, img.pixel_count());
    }

    #[test]
    fn prop_repair_never_raises_alpha(img in raster_strategy()) {
        let mut out = img.clone();
        repair_artifacts(&mut out, &QualityConfig::strict(), RepairPasses::all());
        prop_assert_eq!(out.dimensions(), img.dimensions());
        for (before, after) in img.as_raw().chunks_exact(4).zip(out.as_raw().chunks_exact(4)) {
            prop_assert!(after[3] <= before[3]);
        }
    }

    #[test]
    fn prop_sweep_binarizes_alpha(img in raster_strategy()) {
        let mut out = img.clone();
        sweep_residual_background(&mut out, Color::GREEN, &QualityConfig::strict());
        prop_assert!(out.as_raw().chunks_exact(4).all(|px| px[3] == 0 || px[3] == 255));
    }

    #[test]
    fn prop_report_ok_iff_no_errors(img in raster_strategy(), len in prop::option::of(0usize..=4 << 20)) {
        let report = evaluate_quality(&img, Color::GREEN, &QualityConfig::strict(), len);
        prop_assert_eq!(report.ok(), report.errors().is_empty());
    }

    #[test]
    fn prop_crop_within_bounds_succeeds(params in valid_crop_strategy()) {
        let (img_w, img_h, crop_w, crop_h, x, y) = params;
        let img = RasterImage::from_fn(img_w, img_h, |x, y| [x as u8, y as u8, 7, 255]).unwrap();
        let cropped = img.crop(x, y, crop_w, crop_h).unwrap();
        prop_assert_eq!(cropped.dimensions(), (crop_w, crop_h));
        prop_assert_eq!(cropped.rgba(0, 0), img.rgba(x, y));
    }

    #[test]
    fn prop_fit_within_never_enlarges(
        w in 1u32..=4000,
        h in 1u32..=4000,
        max_w in 1u32..=400,
        max_h in 1u32..=400,
    ) {
        let (fw, fh) = fit_within(w, h, max_w, max_h);
        prop_assert!(fw >= 1 && fh >= 1);
        prop_assert!(fw <= w.max(1) && fh <= h.max(1));
        if w > max_w || h > max_h {
            prop_assert!(fw <= max_w && fh <= max_h);
        } else {
            prop_assert_eq!((fw, fh), (w, h));
        }
    }
}
