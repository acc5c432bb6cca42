//! Configuration for narayana-blink

use crate::error::BlinkError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Closed-eye threshold calibrated for bounding-box-normalized landmarks.
pub const DEFAULT_EAR_THRESHOLD: f64 = 2.75;

/// Blink tracking configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkConfig {
    /// Eyes are considered closed while the combined EAR is below this value.
    /// Calibrated against normalized detector coordinates (2.75, or 2.82 for
    /// the denser contour variant); re-tune it if the coordinate convention changes.
    pub ear_threshold: f64,

    /// Face absence longer than this (seconds) resets the idle estimator
    pub detection_loss_timeout_secs: f64,

    /// Lower bound for an inter-blink sample when timestamps go backwards
    pub min_sample_interval: f64,

    /// Broadcast buffer for adapter events
    pub event_buffer_size: usize,

    /// Adaptive idle estimator settings
    pub idle: IdleConfig,

    /// Detection-rate gauge settings
    pub gauge: GaugeConfig,
}

/// Adaptive idle estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    /// Gate detector invocations with the idle window
    pub enabled: bool,

    /// EMA weight for the inter-blink interval
    pub alpha: f64,

    /// EMA weight for the interval deviation
    pub beta: f64,

    /// Gain applied to the inverse blink rate
    pub gain_k: f64,

    /// Assumed inter-blink gap before the first blink (seconds)
    pub baseline_interval: f64,

    /// Weight of the deviation term in the idle formula
    pub variance_weight: f64,

    /// Lower idle bound (seconds)
    pub min_idle: f64,

    /// Upper idle bound (seconds)
    pub max_idle: f64,
}

/// Detection-rate gauge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaugeConfig {
    /// Counting window length (seconds)
    pub window_secs: f64,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            ear_threshold: DEFAULT_EAR_THRESHOLD,
            detection_loss_timeout_secs: 0.4,
            min_sample_interval: 1e-3,
            event_buffer_size: 256,
            idle: IdleConfig::default(),
            gauge: GaugeConfig::default(),
        }
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            alpha: 0.25,
            beta: 0.25,
            gain_k: 0.25,
            baseline_interval: 4.0,
            variance_weight: 0.02,
            min_idle: 0.3,
            max_idle: 1.0,
        }
    }
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self { window_secs: 1.0 }
    }
}

fn positive(name: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("{} must be a positive finite number, got {}", name, value));
    }
    Ok(())
}

impl BlinkConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        positive("ear_threshold", self.ear_threshold)?;
        positive("detection_loss_timeout_secs", self.detection_loss_timeout_secs)?;
        positive("min_sample_interval", self.min_sample_interval)?;

        if self.event_buffer_size == 0 {
            return Err("event_buffer_size must be > 0".to_string());
        }

        if self.event_buffer_size > 65536 {
            return Err("event_buffer_size too large (max 65536)".to_string());
        }

        self.idle.validate()?;
        self.gauge.validate()?;

        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(input: &str) -> Result<Self, BlinkError> {
        let config: BlinkConfig = toml::from_str(input)?;
        config.validate().map_err(BlinkError::Config)?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(input: &str) -> Result<Self, BlinkError> {
        let config: BlinkConfig = serde_json::from_str(input)?;
        config.validate().map_err(BlinkError::Config)?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BlinkError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            Some("toml") | None => Self::from_toml_str(&contents),
            Some(other) => Err(BlinkError::Config(format!(
                "Unsupported config format '{}' (expected toml or json)",
                other
            ))),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, BlinkError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl IdleConfig {
    /// Validate idle estimator configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(format!("idle.alpha must be in (0, 1], got {}", self.alpha));
        }

        if !(self.beta > 0.0 && self.beta <= 1.0) {
            return Err(format!("idle.beta must be in (0, 1], got {}", self.beta));
        }

        positive("idle.gain_k", self.gain_k)?;
        positive("idle.baseline_interval", self.baseline_interval)?;
        positive("idle.min_idle", self.min_idle)?;
        positive("idle.max_idle", self.max_idle)?;

        if !self.variance_weight.is_finite() || self.variance_weight < 0.0 {
            return Err("idle.variance_weight must be non-negative".to_string());
        }

        if self.min_idle > self.max_idle {
            return Err(format!(
                "idle.min_idle ({}) must not exceed idle.max_idle ({})",
                self.min_idle, self.max_idle
            ));
        }

        Ok(())
    }
}

impl GaugeConfig {
    /// Validate gauge configuration
    pub fn validate(&self) -> Result<(), String> {
        positive("gauge.window_secs", self.window_secs)
    }
}
