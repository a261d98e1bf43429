//! Tool configuration module.
//!
//! Handles loading, validating, and merging the optional `--config` TOML file.
//! Stock defaults are the base layer; the user file only needs the keys it
//! wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [limits]
//! pixel_limit = 50000000     # Max width*height for source and destination
//! max_file_size = 52428800   # Max input bytes fed to the decoder (50 MiB)
//! max_dimension = 65535      # Max resolved size on either axis
//!
//! [output]
//! jpeg_quality = 75          # Used when -q is absent or outside 1-100
//!
//! [metadata]
//! orientation = true         # Correct rotation from EXIF orientation tags
//!
//! [logging]
//! level = "warn"             # error, warn, info, debug, trace
//! format = "pretty"          # pretty or json
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Limits, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from a TOML file.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    /// Resource ceilings.
    pub limits: LimitsConfig,
    /// Encoder defaults.
    pub output: OutputConfig,
    /// Metadata handling.
    pub metadata: MetadataConfig,
    /// Log level and format.
    pub logging: LoggingConfig,
}

impl ResizeConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.pixel_limit == 0 {
            return Err(ConfigError::Validation(
                "limits.pixel_limit must be greater than 0".into(),
            ));
        }
        if self.limits.max_file_size == 0 {
            return Err(ConfigError::Validation(
                "limits.max_file_size must be greater than 0".into(),
            ));
        }
        if !(1..=65535).contains(&self.limits.max_dimension) {
            return Err(ConfigError::Validation(
                "limits.max_dimension must be 1-65535".into(),
            ));
        }
        if Quality::new(self.output.jpeg_quality as i64).is_none() {
            return Err(ConfigError::Validation(
                "output.jpeg_quality must be 1-100".into(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Validation(format!(
                "logging.format must be \"pretty\" or \"json\", got \"{}\"",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Resource ceilings in the form the resolver and decoder take.
    pub fn limits(&self) -> Limits {
        Limits {
            pixel_limit: self.limits.pixel_limit,
            max_file_size: self.limits.max_file_size,
            max_dimension: self.limits.max_dimension,
        }
    }

    /// Fallback JPEG quality. Validated on load, so the conversion holds.
    pub fn default_quality(&self) -> Quality {
        Quality::new(self.output.jpeg_quality as i64).unwrap_or_default()
    }
}

/// Resource ceilings; every violation aborts the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Max width*height for both the source and the destination.
    pub pixel_limit: u64,
    /// Max number of input bytes read for decoding.
    pub max_file_size: u64,
    /// Max resolved width or height.
    pub max_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            pixel_limit: limits.pixel_limit,
            max_file_size: limits.max_file_size,
            max_dimension: limits.max_dimension,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// JPEG quality used when the requested one is absent or out of range.
    pub jpeg_quality: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: Quality::default().value() as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    /// Read EXIF orientation and rotate the output accordingly.
    pub orientation: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self { orientation: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// `pretty` for humans, `json` for machines.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ResizeConfig::default())?)
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

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ResizeConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ResizeConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the configuration.
///
/// With no path, returns the stock defaults. With a path, the file must
/// exist; its values are merged on top of the defaults, unknown keys are
/// rejected, and the result is validated.
pub fn load_config(path: Option<&Path>) -> Result<ResizeConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by `--print-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# image-resize configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Pass the file with --config <path>. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Resource limits
# ---------------------------------------------------------------------------
[limits]
# Max width*height, checked against the source header and the resolved
# output size.
pixel_limit = 50000000

# Max number of input bytes read for decoding (50 MiB).
max_file_size = 52428800

# Max resolved width or height.
max_dimension = 65535

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# JPEG quality (1-100) used when -q is not given or is out of range.
jpeg_quality = 75

# ---------------------------------------------------------------------------
# Metadata
# ---------------------------------------------------------------------------
[metadata]
# Read the EXIF orientation tag of JPEG input and rotate the output upright.
# Best effort: if the tag is not read by the time decoding finishes, the
# image is written unrotated.
orientation = true

# ---------------------------------------------------------------------------
# Logging (stderr)
# ---------------------------------------------------------------------------
[logging]
# Default level when RUST_LOG is unset: error, warn, info, debug, trace.
# --verbose raises it to debug.
level = "warn"

# "pretty" for humans, "json" for one JSON object per line.
format = "pretty"
"##
}
