//! Error types for narayana-blink

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlinkError {
    #[error("Malformed {eye} eye contour: expected 6 points, got {points}")]
    MalformedContour { eye: &'static str, points: usize },

    #[error("Degenerate contour: {0}")]
    DegenerateContour(String),

    #[error("Non-monotonic timestamp: {current} after {previous}")]
    NonMonotonicTimestamp { previous: f64, current: f64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("Trace error at line {line}: {message}")]
    Trace { line: usize, message: String },

    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl BlinkError {
    /// Whether the fault only affects the current frame.
    ///
    /// Recoverable faults degrade to "no detection" and the stream resumes
    /// once valid frames arrive again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BlinkError::MalformedContour { .. }
                | BlinkError::DegenerateContour(_)
                | BlinkError::NonMonotonicTimestamp { .. }
                | BlinkError::Detector(_)
        )
    }
}
