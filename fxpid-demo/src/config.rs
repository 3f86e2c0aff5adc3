//! Demo configuration
//!
//! Loaded from an optional JSON file; command line flags override it.
//! Gains are written as plain floats and converted to Q16.16 once.

use fxpid::{Fixed32, PidConfig, CONTROL_PERIOD_MS};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors from the demo
#[derive(Error, Debug)]
pub enum DemoError {
    #[error("Failed to read config {path}: {source}")]
    ReadConfig {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    ParseConfig(#[from] serde_json::Error),

    #[error("Invalid setting: {0}")]
    InvalidSetting(&'static str),

    #[error("Controller error: {0}")]
    Control(#[from] fxpid::Error),
}

/// Complete demo configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    // Tuning
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Sampling interval in seconds
    pub dt: f32,
    pub output_min: i32,
    pub output_max: i32,
    /// Symmetric integrator clamp, disabled when absent
    pub integral_limit: Option<f32>,

    // Plant
    pub setpoint_mv: i32,
    pub initial_mv: i32,
    /// ADC conversions averaged per read
    pub nsamples: usize,

    // Loop
    pub period_ms: u64,
    /// Stop after this many ticks, 0 runs until Ctrl-C
    pub ticks: u64,
    /// Derive dt from the measured tick period instead of `dt`
    pub timed: bool,

    // Persistence
    pub eeprom_offset: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            kp: 0.1,
            ki: 0.5,
            kd: 0.01,
            dt: 0.2,
            output_min: -250,
            output_max: 250,
            integral_limit: None,
            setpoint_mv: 2500,
            initial_mv: 1500,
            nsamples: 5,
            period_ms: CONTROL_PERIOD_MS as u64,
            ticks: 0,
            timed: false,
            eeprom_offset: 0,
        }
    }
}

impl DemoConfig {
    /// Load from a JSON file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self, DemoError> {
        let content = std::fs::read_to_string(path).map_err(|source| DemoError::ReadConfig {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Check settings the controller itself does not validate
    pub fn check(&self) -> Result<(), DemoError> {
        if self.period_ms == 0 {
            return Err(DemoError::InvalidSetting("period_ms must be at least 1"));
        }
        if matches!(self.integral_limit, Some(limit) if limit < 0.0) {
            return Err(DemoError::InvalidSetting("integral_limit must not be negative"));
        }
        Ok(())
    }

    /// Controller tuning in Q16.16
    pub fn pid_config(&self) -> PidConfig {
        let config = PidConfig::new(
            Fixed32::from_f32(self.kp),
            Fixed32::from_f32(self.ki),
            Fixed32::from_f32(self.kd),
            Fixed32::from_f32(self.dt),
        )
        .with_output_limits(
            Fixed32::from_int(self.output_min),
            Fixed32::from_int(self.output_max),
        );

        match self.integral_limit {
            Some(limit) => {
                let limit = Fixed32::from_f32(limit);
                config.with_integral_limits(-limit, limit)
            }
            None => config,
        }
    }
}
