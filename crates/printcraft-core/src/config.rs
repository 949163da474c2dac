//! Pipeline configuration.
//!
//! `PipelineConfig::default()` carries production values. Hosts that want
//! to tune limits pass a partial JSON object; missing fields keep their
//! defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mask::SurfaceSettings;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for `{field}`: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

/// Tunables for upload intake, mask authoring and external calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: u64,
    /// Largest accepted decoded image, in pixels (`width * height`).
    pub max_decoded_pixels: u64,
    /// Initial brush radius in display pixels.
    pub default_brush_radius: f64,
    /// Minimum rectangle side in display pixels.
    pub min_selection_size: f64,
    /// Brush coverage above this value counts as selected.
    pub coverage_threshold: u8,
    /// Instruction sent with a masked fill when the user gives none.
    pub default_fill_instruction: String,
    /// Client-side timeout for pixel-transformation calls, in seconds.
    pub service_timeout_secs: u64,
    /// Conversions allowed per client in one window.
    pub rate_limit_max_requests: u32,
    /// Rate-limit window length, in seconds.
    pub rate_limit_window_secs: u64,
    /// Checkerboard cell size for transparent previews, in pixels.
    pub checkerboard_cell: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 40 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            default_brush_radius: 20.0,
            min_selection_size: 10.0,
            coverage_threshold: 8,
            default_fill_instruction:
                "Fill the selected area so it blends naturally with the surrounding image".to_string(),
            service_timeout_secs: 120,
            rate_limit_max_requests: 10,
            rate_limit_window_secs: 3600,
            checkerboard_cell: 16,
        }
    }
}

impl PipelineConfig {
    /// Parse a (possibly partial) JSON object over the defaults and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn out_of_range(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::OutOfRange {
                field,
                reason: reason.into(),
            }
        }

        if self.max_upload_bytes == 0 {
            return Err(out_of_range("max_upload_bytes", "must be positive"));
        }
        if self.max_decoded_pixels == 0 {
            return Err(out_of_range("max_decoded_pixels", "must be positive"));
        }
        if !self.default_brush_radius.is_finite() || self.default_brush_radius <= 0.0 {
            return Err(out_of_range(
                "default_brush_radius",
                format!("{} is not a positive radius", self.default_brush_radius),
            ));
        }
        if !self.min_selection_size.is_finite() || self.min_selection_size < 0.0 {
            return Err(out_of_range(
                "min_selection_size",
                format!("{} is negative or not finite", self.min_selection_size),
            ));
        }
        if self.default_fill_instruction.trim().is_empty() {
            return Err(out_of_range("default_fill_instruction", "must not be blank"));
        }
        if self.service_timeout_secs == 0 {
            return Err(out_of_range("service_timeout_secs", "must be positive"));
        }
        if self.rate_limit_max_requests == 0 {
            return Err(out_of_range("rate_limit_max_requests", "must be positive"));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(out_of_range("rate_limit_window_secs", "must be positive"));
        }
        if self.checkerboard_cell == 0 {
            return Err(out_of_range("checkerboard_cell", "must be positive"));
        }
        Ok(())
    }

    /// Mask surface settings derived from this configuration.
    pub fn surface_settings(&self) -> SurfaceSettings {
        SurfaceSettings {
            brush_radius: self.default_brush_radius,
            min_selection_size: self.min_selection_size,
            coverage_threshold: self.coverage_threshold,
        }
    }

    pub fn service_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.service_timeout_secs)
    }

    pub fn rate_limit_window_ms(&self) -> u64 {
        self.rate_limit_window_secs.saturating_mul(1000)
    }
}
