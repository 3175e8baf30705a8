//! Tool configuration.
//!
//! Handles loading, validating, and merging `sizefit.toml`. Stock defaults
//! are overridden by a config file (`sizefit.toml` in the working directory,
//! or the path given with `--config`), and command-line flags override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [search]
//! tolerance = 0.05          # Accepted deviation from the target (0 < t <= 1)
//!
//! [quality]
//! jpeg = [1, 95]            # Quality range searched for JPEG
//! webp = [1, 100]           # Quality range searched for WebP
//!
//! [dpi]
//! min = 72                  # Lowest DPI tried in auto-DPI mode
//! max = 600                 # Highest DPI tried in auto-DPI mode
//!
//! [output]
//! suffix = ""               # Appended to output file stems
//! auto_increment = true     # Never overwrite; pick name_1.ext, name_2.ext, ...
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse; override just the values you want:
//!
//! ```toml
//! [quality]
//! jpeg = [20, 90]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::OutputFormat;
use crate::search::{DEFAULT_TOLERANCE, DpiDomain, QualityDomain, SettingDomain};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "sizefit.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from `sizefit.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Search behaviour (tolerance).
    pub search: SearchConfig,
    /// Quality ranges for lossy formats.
    pub quality: QualityConfig,
    /// DPI range for auto-DPI mode.
    pub dpi: DpiConfig,
    /// Output naming.
    pub output: OutputConfig,
}

impl ToolConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tolerance = self.search.tolerance;
        if !(tolerance > 0.0 && tolerance <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "search.tolerance must be in (0, 1], got {tolerance}"
            )));
        }
        for (key, [min, max]) in [("jpeg", self.quality.jpeg), ("webp", self.quality.webp)] {
            if min < 1 || max > 100 || min >= max {
                return Err(ConfigError::Validation(format!(
                    "quality.{key} must be [min, max] with 1 <= min < max <= 100, got [{min}, {max}]"
                )));
            }
        }
        if self.dpi.min < 1 || self.dpi.max > u32::from(u16::MAX) || self.dpi.min >= self.dpi.max
        {
            return Err(ConfigError::Validation(format!(
                "dpi.min/max must satisfy 1 <= min < max <= 65535, got {}/{}",
                self.dpi.min, self.dpi.max
            )));
        }
        Ok(())
    }

    /// Quality range for `format`, or `None` for formats without a quality knob.
    pub fn quality_domain(&self, format: OutputFormat) -> Option<QualityDomain> {
        let [min, max] = match format {
            OutputFormat::Jpeg => self.quality.jpeg,
            OutputFormat::WebP => self.quality.webp,
            OutputFormat::Png | OutputFormat::Tiff => return None,
        };
        SettingDomain::new(min, max).ok()
    }

    pub fn dpi_domain(&self) -> DpiDomain {
        SettingDomain::new(self.dpi.min, self.dpi.max)
            .unwrap_or_else(|_| DpiConfig::default().domain())
    }
}

/// Search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Fraction of the target size an output may deviate by and still count.
    pub tolerance: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// Quality ranges as `[min, max]`, inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    pub jpeg: [u32; 2],
    pub webp: [u32; 2],
}

impl Default for QualityConfig {
    fn default() -> Self {
        let range = |format: OutputFormat| {
            format
                .capabilities()
                .quality_domain
                .map_or([1, 100], |d| [d.min(), d.max()])
        };
        Self {
            jpeg: range(OutputFormat::Jpeg),
            webp: range(OutputFormat::WebP),
        }
    }
}

/// Auto-DPI search range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DpiConfig {
    pub min: u32,
    pub max: u32,
}

impl DpiConfig {
    fn domain(&self) -> DpiDomain {
        SettingDomain::from_bounds(self.min, self.max)
    }
}

impl Default for DpiConfig {
    fn default() -> Self {
        Self { min: 72, max: 600 }
    }
}

/// Output naming settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Appended to every output stem, e.g. `"_web"` → `photo_web.jpg`.
    pub suffix: String,
    /// When true, existing files are never overwritten.
    pub auto_increment: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            suffix: String::new(),
            auto_increment: true,
        }
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ToolConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ToolConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ToolConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective configuration.
///
/// An explicit path must exist. Without one, `sizefit.toml` in `dir` is used
/// when present, and stock defaults otherwise.
pub fn load_config(explicit: Option<&Path>, dir: &Path) -> Result<ToolConfig, ConfigError> {
    let overlay = match explicit {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str(&content)?)
        }
        None => load_raw_config(&dir.join(CONFIG_FILE_NAME))?,
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `sizefit.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sizefit Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# sizefit reads ./sizefit.toml, or the file passed with --config.
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Search
# ---------------------------------------------------------------------------
[search]
# How far the output may be from the target and still count as a hit,
# as a fraction of the target. 0.05 = within 5%. Must be in (0, 1].
tolerance = 0.05

# ---------------------------------------------------------------------------
# Quality ranges (size mode, and the fallback under auto-DPI)
# ---------------------------------------------------------------------------
# [min, max], inclusive, 1-100. Narrow the range to keep output quality
# above a floor even when that means missing the target.
[quality]
jpeg = [1, 95]
webp = [1, 100]

# ---------------------------------------------------------------------------
# Auto-DPI range (dpi mode without --dpi)
# ---------------------------------------------------------------------------
# DPI only changes header metadata, never pixels.
[dpi]
min = 72
max = 600

# ---------------------------------------------------------------------------
# Output naming
# ---------------------------------------------------------------------------
[output]
# Appended to each output file stem: photo.jpg -> photo_web.jpg
suffix = ""
# Never overwrite existing files; write photo_1.jpg, photo_2.jpg, ... instead.
# --overwrite turns this off for a single run.
auto_increment = true
"##
}
