// src/error.rs
//
// Unified error handling for stampcut
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy:
// - UserError: Invalid input or configuration, recoverable
// - CodecError: Format/encoding issues
// - ResourceLimit: Memory/dimension/file system limits
// - InternalBug: Library bugs (should not happen)
//
// Quality-check failures are NOT errors. They are reported through
// engine::QualityReport and never surface as StampcutError.

use std::borrow::Cow;
use thiserror::Error;

/// Error taxonomy used by the CLI to pick exit codes and by callers to
/// decide whether a retry with different input makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCategory {
    /// Invalid input, recoverable by user
    UserError,
    /// Format/encoding issues
    CodecError,
    /// Memory/dimension/file system limits
    ResourceLimit,
    /// Library bugs (should not happen)
    InternalBug,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "UserError",
            ErrorCategory::CodecError => "CodecError",
            ErrorCategory::ResourceLimit => "ResourceLimit",
            ErrorCategory::InternalBug => "InternalBug",
        }
    }

    /// Stable STAMPCUT_* code string for this category
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::UserError => "STAMPCUT_USER_ERROR",
            ErrorCategory::CodecError => "STAMPCUT_CODEC_ERROR",
            ErrorCategory::ResourceLimit => "STAMPCUT_RESOURCE_LIMIT",
            ErrorCategory::InternalBug => "STAMPCUT_INTERNAL_BUG",
        }
    }
}

/// stampcut error types
#[derive(Debug, Error)]
pub enum StampcutError {
    // File I/O Errors
    #[error("File not found: {path}")]
    FileNotFound { path: Cow<'static, str> },

    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to memory-map file '{path}': {source}")]
    MmapFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWriteFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    // Decode Errors
    #[error("Unsupported image format: {format}")]
    UnsupportedFormat { format: Cow<'static, str> },

    #[error("Failed to decode image: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    // Size Limit Errors
    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u32, max: u32 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Input firewall blocked the image: {reason}")]
    FirewallViolation { reason: Cow<'static, str> },

    // Raster boundary errors
    #[error("Image has zero area: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    #[error("Pixel buffer length {actual} does not match {width}x{height}x4 = {expected}")]
    BufferLengthMismatch {
        width: u32,
        height: u32,
        expected: u64,
        actual: u64,
    },

    #[error("Unsupported color layout '{layout}': the pipeline only accepts 8-bit RGBA")]
    UnsupportedColorLayout { layout: Cow<'static, str> },

    // Operation Errors
    #[error("Crop bounds ({x}+{width}, {y}+{height}) exceed image dimensions ({img_width}x{img_height})")]
    InvalidCropBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    },

    #[error("Invalid grid layout {rows}x{cols}: {reason}")]
    InvalidGridLayout {
        rows: u32,
        cols: u32,
        reason: Cow<'static, str>,
    },

    #[error("Resize failed ({source_width}x{source_height} -> {target_width}x{target_height}): {message}")]
    ResizeFailed {
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
        message: Cow<'static, str>,
    },

    // Encode Errors
    #[error("Failed to encode as {format}: {message}")]
    EncodeFailed {
        format: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Configuration Errors
    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidConfig {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    #[error("Unknown quality profile: '{name}'. Available: strict, lenient")]
    InvalidProfile { name: Cow<'static, str> },

    #[error("Unknown sticker format: '{name}'. Available: stamp, emoji, main, tab")]
    InvalidFormat { name: Cow<'static, str> },

    #[error("Unknown repair pass: '{name}'")]
    InvalidRepairPass { name: Cow<'static, str> },

    #[error("Invalid color '{value}': expected #RRGGBB")]
    InvalidColor { value: Cow<'static, str> },

    #[error("Failed to parse config '{path}': {message}")]
    ConfigParseFailed {
        path: Cow<'static, str>,
        message: Cow<'static, str>,
    },

    // Internal Errors
    #[error("Internal error: {message}")]
    InternalPanic { message: Cow<'static, str> },

    // Generic Error
    #[error("{message}")]
    Generic { message: Cow<'static, str> },
}

fn clone_io(source: &std::io::Error) -> std::io::Error {
    std::io::Error::new(source.kind(), source.to_string())
}

impl Clone for StampcutError {
    fn clone(&self) -> Self {
        match self {
            Self::FileNotFound { path } => Self::FileNotFound { path: path.clone() },
            Self::FileReadFailed { path, source } => Self::FileReadFailed {
                path: path.clone(),
                source: clone_io(source),
            },
            Self::MmapFailed { path, source } => Self::MmapFailed {
                path: path.clone(),
                source: clone_io(source),
            },
            Self::FileWriteFailed { path, source } => Self::FileWriteFailed {
                path: path.clone(),
                source: clone_io(source),
            },
            Self::UnsupportedFormat { format } => Self::UnsupportedFormat {
                format: format.clone(),
            },
            Self::DecodeFailed { message } => Self::DecodeFailed {
                message: message.clone(),
            },
            Self::DimensionExceedsLimit { dimension, max } => Self::DimensionExceedsLimit {
                dimension: *dimension,
                max: *max,
            },
            Self::PixelCountExceedsLimit { pixels, max } => Self::PixelCountExceedsLimit {
                pixels: *pixels,
                max: *max,
            },
            Self::FirewallViolation { reason } => Self::FirewallViolation {
                reason: reason.clone(),
            },
            Self::EmptyImage { width, height } => Self::EmptyImage {
                width: *width,
                height: *height,
            },
            Self::BufferLengthMismatch {
                width,
                height,
                expected,
                actual,
            } => Self::BufferLengthMismatch {
                width: *width,
                height: *height,
                expected: *expected,
                actual: *actual,
            },
            Self::UnsupportedColorLayout { layout } => Self::UnsupportedColorLayout {
                layout: layout.clone(),
            },
            Self::InvalidCropBounds {
                x,
                y,
                width,
                height,
                img_width,
                img_height,
            } => Self::InvalidCropBounds {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
                img_width: *img_width,
                img_height: *img_height,
            },
            Self::InvalidGridLayout { rows, cols, reason } => Self::InvalidGridLayout {
                rows: *rows,
                cols: *cols,
                reason: reason.clone(),
            },
            Self::ResizeFailed {
                source_width,
                source_height,
                target_width,
                target_height,
                message,
            } => Self::ResizeFailed {
                source_width: *source_width,
                source_height: *source_height,
                target_width: *target_width,
                target_height: *target_height,
                message: message.clone(),
            },
            Self::EncodeFailed { format, message } => Self::EncodeFailed {
                format: format.clone(),
                message: message.clone(),
            },
            Self::InvalidConfig {
                name,
                value,
                reason,
            } => Self::InvalidConfig {
                name: name.clone(),
                value: value.clone(),
                reason: reason.clone(),
            },
            Self::InvalidProfile { name } => Self::InvalidProfile { name: name.clone() },
            Self::InvalidFormat { name } => Self::InvalidFormat { name: name.clone() },
            Self::InvalidRepairPass { name } => Self::InvalidRepairPass { name: name.clone() },
            Self::InvalidColor { value } => Self::InvalidColor {
                value: value.clone(),
            },
            Self::ConfigParseFailed { path, message } => Self::ConfigParseFailed {
                path: path.clone(),
                message: message.clone(),
            },
            Self::InternalPanic { message } => Self::InternalPanic {
                message: message.clone(),
            },
            Self::Generic { message } => Self::Generic {
                message: message.clone(),
            },
        }
    }
}

// Constructor Helpers
impl StampcutError {
    pub fn file_not_found(path: impl Into<Cow<'static, str>>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn mmap_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::MmapFailed {
            path: path.into(),
            source,
        }
    }

    pub fn file_write_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    pub fn unsupported_format(format: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn dimension_exceeds_limit(dimension: u32, max: u32) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn firewall_violation(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::FirewallViolation {
            reason: reason.into(),
        }
    }

    pub fn empty_image(width: u32, height: u32) -> Self {
        Self::EmptyImage { width, height }
    }

    pub fn buffer_length_mismatch(width: u32, height: u32, actual: usize) -> Self {
        Self::BufferLengthMismatch {
            width,
            height,
            expected: width as u64 * height as u64 * 4,
            actual: actual as u64,
        }
    }

    pub fn unsupported_color_layout(layout: impl Into<Cow<'static, str>>) -> Self {
        Self::UnsupportedColorLayout {
            layout: layout.into(),
        }
    }

    pub fn invalid_crop_bounds(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        img_width: u32,
        img_height: u32,
    ) -> Self {
        Self::InvalidCropBounds {
            x,
            y,
            width,
            height,
            img_width,
            img_height,
        }
    }

    pub fn invalid_grid_layout(rows: u32, cols: u32, reason: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidGridLayout {
            rows,
            cols,
            reason: reason.into(),
        }
    }

    pub fn resize_failed(
        source_dims: (u32, u32),
        target_dims: (u32, u32),
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ResizeFailed {
            source_width: source_dims.0,
            source_height: source_dims.1,
            target_width: target_dims.0,
            target_height: target_dims.1,
            message: message.into(),
        }
    }

    pub fn encode_failed(
        format: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn invalid_config(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidConfig {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_profile(name: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidProfile { name: name.into() }
    }

    pub fn invalid_format(name: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidFormat { name: name.into() }
    }

    pub fn invalid_repair_pass(name: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidRepairPass { name: name.into() }
    }

    pub fn invalid_color(value: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidColor {
            value: value.into(),
        }
    }

    pub fn config_parse_failed(
        path: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::ConfigParseFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn internal_panic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InternalPanic {
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (user can fix it)
    ///
    /// Consistent with category(): UserError and ResourceLimit are
    /// recoverable, CodecError and InternalBug are not.
    pub fn is_recoverable(&self) -> bool {
        match self.category() {
            ErrorCategory::UserError | ErrorCategory::ResourceLimit => true,
            ErrorCategory::CodecError | ErrorCategory::InternalBug => false,
        }
    }

    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::FileNotFound { .. }
            | Self::EmptyImage { .. }
            | Self::BufferLengthMismatch { .. }
            | Self::UnsupportedColorLayout { .. }
            | Self::InvalidCropBounds { .. }
            | Self::InvalidGridLayout { .. }
            | Self::InvalidConfig { .. }
            | Self::InvalidProfile { .. }
            | Self::InvalidFormat { .. }
            | Self::InvalidRepairPass { .. }
            | Self::InvalidColor { .. }
            | Self::ConfigParseFailed { .. } => ErrorCategory::UserError,

            // ResizeFailed is a processing failure inside a codec-like
            // transform, grouped with encode/decode.
            Self::UnsupportedFormat { .. }
            | Self::DecodeFailed { .. }
            | Self::EncodeFailed { .. }
            | Self::ResizeFailed { .. } => ErrorCategory::CodecError,

            // File system failures usually mean disk full, permissions or
            // quotas, all fixable by the user.
            Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::FirewallViolation { .. }
            | Self::FileReadFailed { .. }
            | Self::MmapFailed { .. }
            | Self::FileWriteFailed { .. } => ErrorCategory::ResourceLimit,

            Self::InternalPanic { .. } | Self::Generic { .. } => ErrorCategory::InternalBug,
        }
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, StampcutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StampcutError::file_not_found("/path/to/grid_1.png");
        assert!(err.to_string().contains("/path/to/grid_1.png"));

        let err = StampcutError::buffer_length_mismatch(2, 2, 15);
        assert!(err.to_string().contains("16"));
        assert!(err.to_string().contains("15"));
    }

    #[test]
    fn test_error_recoverable() {
        assert!(StampcutError::file_not_found("a.png").is_recoverable());
        assert!(StampcutError::empty_image(0, 10).is_recoverable());
        assert!(StampcutError::invalid_config("tolerance", "0", "must be > 0").is_recoverable());
        assert!(!StampcutError::decode_failed("bad").is_recoverable());
        assert!(!StampcutError::internal_panic("boom").is_recoverable());
    }

    #[test]
    fn test_clone_preserves_io_kind() {
        let err = StampcutError::file_write_failed(
            "out.png",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        match err.clone() {
            StampcutError::FileWriteFailed { path, source } => {
                assert_eq!(path, "out.png");
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected clone result: {other:?}"),
        }
    }

    #[test]
    fn test_error_category_user_error() {
        for err in [
            StampcutError::empty_image(0, 0),
            StampcutError::buffer_length_mismatch(1, 1, 3),
            StampcutError::unsupported_color_layout("rgb8"),
            StampcutError::invalid_crop_bounds(0, 0, 10, 10, 5, 5),
            StampcutError::invalid_grid_layout(0, 4, "rows must be > 0"),
            StampcutError::invalid_profile("ultra"),
            StampcutError::invalid_format("banner"),
            StampcutError::invalid_repair_pass("sparkle"),
            StampcutError::invalid_color("#GG0000"),
            StampcutError::config_parse_failed("stampcut.toml", "expected table"),
        ] {
            assert_eq!(err.category(), ErrorCategory::UserError, "{err}");
        }
    }

    #[test]
    fn test_error_category_codec_error() {
        assert_eq!(
            StampcutError::unsupported_format("gif").category(),
            ErrorCategory::CodecError
        );
        assert_eq!(
            StampcutError::encode_failed("png", "oxipng").category(),
            ErrorCategory::CodecError
        );
        assert_eq!(
            StampcutError::resize_failed((10, 10), (5, 5), "fir").category(),
            ErrorCategory::CodecError
        );
    }

    #[test]
    fn test_error_category_resource_limit() {
        assert_eq!(
            StampcutError::dimension_exceeds_limit(40000, 32768).category(),
            ErrorCategory::ResourceLimit
        );
        assert_eq!(
            StampcutError::firewall_violation("too big").category(),
            ErrorCategory::ResourceLimit
        );
        assert_eq!(
            StampcutError::mmap_failed(
                "grid.png",
                std::io::Error::from(std::io::ErrorKind::NotFound)
            )
            .category(),
            ErrorCategory::ResourceLimit
        );
    }

    #[test]
    fn test_error_category_codes() {
        assert_eq!(ErrorCategory::UserError.code(), "STAMPCUT_USER_ERROR");
        assert_eq!(ErrorCategory::InternalBug.as_str(), "InternalBug");
        assert_eq!(
            StampcutError::generic("x").category(),
            ErrorCategory::InternalBug
        );
    }
}
