// src/engine/firewall.rs
//
// Input firewall: byte and pixel caps applied before a file is decoded.

use crate::error::{Result, StampcutError};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const STRICT_MAX_PIXELS: u64 = 40_000_000; // ~8K x 5K
const LENIENT_MAX_PIXELS: u64 = 75_000_000; // below the global MAX_PIXELS
const STRICT_MAX_BYTES: u64 = 32 * 1024 * 1024;
const LENIENT_MAX_BYTES: u64 = 48 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirewallPolicy {
    Disabled,
    Strict,
    Lenient,
    Custom,
}

impl FromStr for FirewallPolicy {
    type Err = StampcutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" | "off" => Ok(FirewallPolicy::Disabled),
            "strict" => Ok(FirewallPolicy::Strict),
            "lenient" => Ok(FirewallPolicy::Lenient),
            "custom" => Ok(FirewallPolicy::Custom),
            other => Err(StampcutError::invalid_config(
                "firewall",
                other.to_string(),
                "expected disabled, strict, lenient or custom",
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirewallConfig {
    pub enabled: bool,
    pub policy: FirewallPolicy,
    pub max_pixels: Option<u64>,
    pub max_bytes: Option<u64>,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl FirewallConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            policy: FirewallPolicy::Disabled,
            max_pixels: None,
            max_bytes: None,
        }
    }

    pub fn strict() -> Self {
        Self {
            enabled: true,
            policy: FirewallPolicy::Strict,
            max_pixels: Some(STRICT_MAX_PIXELS),
            max_bytes: Some(STRICT_MAX_BYTES),
        }
    }

    pub fn lenient() -> Self {
        Self {
            enabled: true,
            policy: FirewallPolicy::Lenient,
            max_pixels: Some(LENIENT_MAX_PIXELS),
            max_bytes: Some(LENIENT_MAX_BYTES),
        }
    }

    /// Enabled with no caps; set `max_pixels` / `max_bytes` afterwards.
    pub fn custom() -> Self {
        Self {
            enabled: true,
            policy: FirewallPolicy::Custom,
            max_pixels: None,
            max_bytes: None,
        }
    }

    pub fn apply_policy(policy: FirewallPolicy) -> Self {
        match policy {
            FirewallPolicy::Disabled => Self::disabled(),
            FirewallPolicy::Strict => Self::strict(),
            FirewallPolicy::Lenient => Self::lenient(),
            FirewallPolicy::Custom => Self::custom(),
        }
    }

    pub fn enforce_source_len(&self, len: usize) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(limit) = self.max_bytes {
            let len = len as u64;
            if len > limit {
                return Err(StampcutError::firewall_violation(format!(
                    "input size {len} bytes exceeds the {:?} limit of {limit} bytes",
                    self.policy
                )));
            }
        }
        Ok(())
    }

    pub fn enforce_pixels(&self, width: u32, height: u32) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(limit) = self.max_pixels {
            let pixels = width as u64 * height as u64;
            if pixels > limit {
                return Err(StampcutError::firewall_violation(format!(
                    "{width}x{height} ({pixels} pixels) exceeds the {:?} limit of {limit} pixels",
                    self.policy
                )));
            }
        }
        Ok(())
    }
}
