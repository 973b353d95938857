// tests/edge_cases.rs
//
// Edge case tests for stampcut
// Tests boundary values, invalid inputs, and error handling

use image::{DynamicImage, RgbImage};
use stampcut::config::{BackgroundConfig, QualityConfig};
use stampcut::engine::grid::{select_layout, GridRequest};
use stampcut::engine::{
    check_dimensions, decode_rgba, encode_png, estimate_background, remove_background, repair_artifacts,
    BackgroundSource, Color, FirewallConfig, RasterImage, StickerPipeline, DEFAULT_PNG_PRESET,
};
use stampcut::error::StampcutError;
use stampcut::ops::RepairPasses;

// Helper function to create test images
fn create_test_image(width: u32, height: u32) -> RasterImage {
    RasterImage::from_fn(width, height, |x, y| [(x % 256) as u8, (y % 256) as u8, 128, 255]).unwrap()
}

mod construction_tests {
    use super::*;

    #[test]
    fn test_zero_area_is_rejected() {
        for (w, h) in [(0, 10), (10, 0), (0, 0)] {
            assert!(matches!(
                RasterImage::filled(w, h, [0, 0, 0, 0]),
                Err(StampcutError::EmptyImage { .. })
            ));
            assert!(matches!(
                RasterImage::from_raw(w, h, Vec::new()),
                Err(StampcutError::EmptyImage { .. })
            ));
        }
    }

    #[test]
    fn test_buffer_length_mismatch() {
        let result = RasterImage::from_raw(4, 4, vec![0u8; 4 * 4 * 4 - 1]);
        assert!(matches!(result, Err(StampcutError::BufferLengthMismatch { .. })));
        // RGB-sized buffer is not RGBA
        let result = RasterImage::from_raw(4, 4, vec![0u8; 4 * 4 * 3]);
        assert!(matches!(result, Err(StampcutError::BufferLengthMismatch { .. })));
    }

    #[test]
    fn test_non_rgba_dynamic_rejected() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        assert!(matches!(
            RasterImage::from_dynamic(rgb),
            Err(StampcutError::UnsupportedColorLayout { .. })
        ));
        let rgba = DynamicImage::ImageRgba8(image::RgbaImage::new(8, 8));
        assert!(RasterImage::from_dynamic(rgba).is_ok());
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let img = create_test_image(10, 10);
        assert!(img.crop(0, 0, 10, 10).is_ok());
        for (x, y, w, h) in [(1, 0, 10, 10), (0, 5, 10, 6), (0, 0, 0, 3), (u32::MAX, 0, 2, 2)] {
            assert!(
                matches!(img.crop(x, y, w, h), Err(StampcutError::InvalidCropBounds { .. })),
                "crop ({x},{y},{w},{h})"
            );
        }
    }
}

mod minimal_image_tests {
    use super::*;

    #[test]
    fn test_1x1_image_through_pipeline() {
        let img = RasterImage::filled(1, 1, [0, 255, 0, 255]).unwrap();
        let out = StickerPipeline::strict().process(img).unwrap();
        assert!(out.image.is_fully_transparent());
        assert_eq!(out.image.dimensions(), (1, 1));
        // far below the minimum size
        assert!(!out.ok());
    }

    #[test]
    fn test_1x1_repair_does_not_panic() {
        let mut img = RasterImage::filled(1, 1, [255, 255, 255, 255]).unwrap();
        repair_artifacts(&mut img, &QualityConfig::strict(), RepairPasses::all());
        assert_eq!(img.dimensions(), (1, 1));
    }

    #[test]
    fn test_single_row_and_column() {
        for (w, h) in [(64, 1), (1, 64)] {
            let img = RasterImage::filled(w, h, [0, 255, 0, 255]).unwrap();
            let out = StickerPipeline::strict().process(img).unwrap();
            assert!(out.image.is_fully_transparent(), "{w}x{h}");
        }
    }
}

mod background_edge_tests {
    use super::*;

    #[test]
    fn test_transparent_border_falls_back_to_center() {
        let img = RasterImage::from_fn(40, 40, |x, y| {
            if (10..30).contains(&x) && (10..30).contains(&y) {
                [200, 50, 50, 255]
            } else {
                [0, 0, 0, 0]
            }
        })
        .unwrap();
        let estimate = estimate_background(&img, &BackgroundConfig::default()).unwrap();
        assert_eq!(estimate.source(), BackgroundSource::CenterFallback);
        assert_eq!(estimate.primary(), Color::new(200, 50, 50));
    }

    #[test]
    fn test_zero_tolerance_rejected() {
        let cfg = BackgroundConfig {
            tolerance: 0,
            ..BackgroundConfig::default()
        };
        let result = estimate_background(&create_test_image(10, 10), &cfg);
        assert!(matches!(result, Err(StampcutError::InvalidConfig { .. })));
    }

    #[test]
    fn test_zero_quantize_step_rejected() {
        let cfg = BackgroundConfig {
            quantize_step: 0,
            ..BackgroundConfig::default()
        };
        assert!(cfg.validate().is_err());
        assert!(StickerPipeline::new(cfg, QualityConfig::strict()).is_err());
    }

    #[test]
    fn test_empty_fixed_colors_rejected() {
        let cfg = BackgroundConfig {
            fixed_colors: Some(Vec::new()),
            ..BackgroundConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(StampcutError::InvalidConfig { .. })));
    }

    #[test]
    fn test_flood_on_already_transparent_image() {
        let mut img = RasterImage::filled(20, 20, [0, 255, 0, 0]).unwrap();
        let cfg = BackgroundConfig::default();
        let estimate = estimate_background(&img, &cfg).unwrap();
        remove_background(&mut img, &estimate, &cfg);
        assert!(img.is_fully_transparent());
    }
}

mod grid_edge_tests {
    use super::*;

    #[test]
    fn test_zero_rows_or_cols() {
        for (rows, cols) in [(0, 4), (3, 0)] {
            assert!(matches!(
                select_layout(1200, 900, &GridRequest::new(rows, cols)),
                Err(StampcutError::InvalidGridLayout { .. })
            ));
        }
    }

    #[test]
    fn test_trim_consuming_whole_cell() {
        // 4 px cells cannot lose 2 px on both sides
        let req = GridRequest::new(2, 2);
        assert!(select_layout(8, 8, &req).is_err());
        assert!(select_layout(10, 10, &req).is_ok());
    }

    #[test]
    fn test_more_cells_than_pixels() {
        assert!(select_layout(3, 3, &GridRequest::new(5, 5)).is_err());
    }
}

mod decode_edge_tests {
    use super::*;

    #[test]
    fn test_check_dimensions_limits() {
        assert!(check_dimensions(32768, 1).is_ok());
        assert!(matches!(
            check_dimensions(32769, 1),
            Err(StampcutError::DimensionExceedsLimit { .. })
        ));
        assert!(matches!(
            check_dimensions(20000, 20000),
            Err(StampcutError::PixelCountExceedsLimit { .. })
        ));
    }

    #[test]
    fn test_garbage_bytes() {
        let result = decode_rgba(b"definitely not an image", &FirewallConfig::disabled());
        assert!(matches!(result, Err(StampcutError::UnsupportedFormat { .. })));
        assert!(decode_rgba(&[], &FirewallConfig::disabled()).is_err());
    }

    #[test]
    fn test_truncated_png() {
        let png = encode_png(&create_test_image(32, 32), DEFAULT_PNG_PRESET).unwrap();
        let truncated = &png[..png.len() / 2];
        assert!(decode_rgba(truncated, &FirewallConfig::disabled()).is_err());
    }

    #[test]
    fn test_firewall_rejects_large_input() {
        let png = encode_png(&create_test_image(64, 64), DEFAULT_PNG_PRESET).unwrap();
        let mut fw = FirewallConfig::custom();
        fw.max_pixels = Some(1000);
        assert!(matches!(
            decode_rgba(&png, &fw),
            Err(StampcutError::FirewallViolation { .. })
        ));

        let mut fw = FirewallConfig::custom();
        fw.max_bytes = Some(16);
        assert!(matches!(
            decode_rgba(&png, &fw),
            Err(StampcutError::FirewallViolation { .. })
        ));
        assert!(decode_rgba(&png, &FirewallConfig::strict()).is_ok());
    }

    #[test]
    fn test_png_preset_out_of_range() {
        assert!(matches!(
            encode_png(&create_test_image(4, 4), 7),
            Err(StampcutError::InvalidConfig { .. })
        ));
    }
}
