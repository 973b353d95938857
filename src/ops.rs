// src/ops.rs
//
// Output format presets and repair pass selection.
// Both are cheap value types; the pixel work happens in engine/.

use crate::error::{Result, StampcutError};
use bitflags::bitflags;
use serde::Serialize;

/// Canvas size required by a distribution target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StickerFormat {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

impl StickerFormat {
    pub const fn new(name: &'static str, width: u32, height: u32) -> Self {
        Self {
            name,
            width,
            height,
        }
    }

    /// Get the built-in format by name
    pub fn get(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "stamp" | "sticker" => Some(Self::stamp()),
            "emoji" => Some(Self::emoji()),
            "main" => Some(Self::main()),
            "tab" => Some(Self::tab()),
            _ => None,
        }
    }

    /// Regular sticker: 370x320 max
    pub const fn stamp() -> Self {
        Self::new("stamp", 370, 320)
    }

    /// Emoji: 180x180
    pub const fn emoji() -> Self {
        Self::new("emoji", 180, 180)
    }

    /// Store main image: 240x240
    pub const fn main() -> Self {
        Self::new("main", 240, 240)
    }

    /// Chat-room tab icon: 96x74
    pub const fn tab() -> Self {
        Self::new("tab", 96, 74)
    }

    /// Cell width / height used for grid orientation detection.
    pub fn target_aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl Default for StickerFormat {
    fn default() -> Self {
        Self::stamp()
    }
}

bitflags! {
    /// Artifact repair passes, applied in declaration order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RepairPasses: u16 {
        const BORDER_SEAMS = 1 << 0;
        const BOTTOM_GREEN_LINE = 1 << 1;
        const OUTLINE_WHITEN = 1 << 2;
        const DEGREEN_WHITE = 1 << 3;
        /// Aggressive; can eat green clothing. Off in STRICT.
        const GREEN_FRINGE = 1 << 4;
        const INTERIOR_CAVITIES = 1 << 5;
        const TOP_STRAY_WHITE = 1 << 6;
        const EDGE_WHITE_LINES = 1 << 7;

        const STRICT = Self::BORDER_SEAMS.bits()
            | Self::BOTTOM_GREEN_LINE.bits()
            | Self::OUTLINE_WHITEN.bits()
            | Self::DEGREEN_WHITE.bits()
            | Self::INTERIOR_CAVITIES.bits()
            | Self::TOP_STRAY_WHITE.bits()
            | Self::EDGE_WHITE_LINES.bits();
    }
}

impl Default for RepairPasses {
    fn default() -> Self {
        Self::STRICT
    }
}

impl RepairPasses {
    /// Parse snake_case pass names (`"border_seams"`, `"interior_cavities"`, ...).
    /// `"strict"` selects the default set and `"none"` selects nothing.
    pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        names.into_iter().try_fold(Self::empty(), |acc, name| {
            let normalized = name.trim().to_uppercase();
            if normalized == "NONE" {
                return Ok(acc);
            }
            Self::from_name(&normalized)
                .map(|flag| acc | flag)
                .ok_or_else(|| StampcutError::invalid_repair_pass(name.to_string()))
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.iter_names()
            .filter(|(name, _)| *name != "STRICT")
            .map(|(name, _)| name.to_lowercase())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_presets() {
        assert_eq!(StickerFormat::get("stamp"), Some(StickerFormat::stamp()));
        assert_eq!(StickerFormat::get("TAB").map(|f| (f.width, f.height)), Some((96, 74)));
        assert_eq!(StickerFormat::get("banner"), None);
        assert!((StickerFormat::stamp().target_aspect() - 1.15625).abs() < 1e-9);
    }

    #[test]
    fn test_strict_excludes_green_fringe() {
        assert!(!RepairPasses::STRICT.contains(RepairPasses::GREEN_FRINGE));
        assert!(RepairPasses::STRICT.contains(RepairPasses::INTERIOR_CAVITIES));
        assert_eq!(RepairPasses::STRICT.iter().count(), 7);
    }

    #[test]
    fn test_from_names() {
        let passes = RepairPasses::from_names(["border_seams", " green_fringe "]).unwrap();
        assert_eq!(passes, RepairPasses::BORDER_SEAMS | RepairPasses::GREEN_FRINGE);
        assert_eq!(RepairPasses::from_names(["strict"]).unwrap(), RepairPasses::STRICT);
        assert_eq!(RepairPasses::from_names(["none"]).unwrap(), RepairPasses::empty());
        assert!(matches!(
            RepairPasses::from_names(["sparkle"]),
            Err(StampcutError::InvalidRepairPass { .. })
        ));
    }

    #[test]
    fn test_names_round_trip() {
        let passes = RepairPasses::OUTLINE_WHITEN | RepairPasses::EDGE_WHITE_LINES;
        let names = passes.names();
        assert_eq!(names, vec!["outline_whiten", "edge_white_lines"]);
        let parsed = RepairPasses::from_names(names.iter().map(String::as_str)).unwrap();
        assert_eq!(parsed, passes);
    }
}
