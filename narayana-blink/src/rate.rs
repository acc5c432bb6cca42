//! Peak detections-per-second gauge
//!
//! Pure observability: nothing in the pipeline reads the gauge back.

use crate::config::GaugeConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Persistent gauge state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionRateState {
    pub window_start: Option<f64>,
    pub count_in_window: u32,
    pub max_per_second: u32,
    pub last_detection_timestamp: Option<f64>,
    pub detection_ongoing: bool,
}

impl DetectionRateState {
    /// Highest completed-window count, or the open window if it is already higher
    pub fn peak(&self) -> u32 {
        self.max_per_second.max(self.count_in_window)
    }
}

/// Rolling window counter over successful detections
#[derive(Debug, Clone)]
pub struct DetectionRateGauge {
    window_secs: f64,
}

impl DetectionRateGauge {
    pub fn new(config: &GaugeConfig) -> Self {
        Self { window_secs: config.window_secs }
    }

    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    /// Record one frame where both eye contours were extracted
    pub fn on_detection(&self, timestamp: f64, state: DetectionRateState) -> DetectionRateState {
        let mut next = state;

        match state.window_start {
            Some(start) if state.detection_ongoing => {
                if timestamp - start > self.window_secs {
                    next.max_per_second = next.max_per_second.max(state.count_in_window);
                    debug!(
                        "Detection window closed with {} detections (peak {})",
                        state.count_in_window, next.max_per_second
                    );
                    next.window_start = Some(timestamp);
                    next.count_in_window = 1;
                } else {
                    next.count_in_window = next.count_in_window.saturating_add(1);
                }
            }
            _ => {
                next.window_start = Some(timestamp);
                next.count_in_window = 1;
            }
        }

        next.last_detection_timestamp = Some(timestamp);
        next.detection_ongoing = true;
        next
    }

    /// Close the open window after a detection loss.
    ///
    /// The partial window still counts toward the peak.
    pub fn on_detection_lost(&self, state: DetectionRateState) -> DetectionRateState {
        DetectionRateState {
            window_start: None,
            count_in_window: 0,
            max_per_second: state.max_per_second.max(state.count_in_window),
            last_detection_timestamp: state.last_detection_timestamp,
            detection_ongoing: false,
        }
    }
}
