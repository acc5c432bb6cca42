//! Edge-triggered open/closed detection

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Persistent blink state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BlinkState {
    pub is_eye_closed: bool,
    /// Only ever incremented on an open -> closed edge
    pub blink_count: u64,
    pub last_blink_timestamp: Option<f64>,
}

/// Direction of an eye-state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeTransition {
    /// Open -> closed; counts as a blink
    Closed,
    /// Closed -> open; no counter effect
    Opened,
}

/// Result of feeding one EAR sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisOutcome {
    pub state: BlinkState,
    pub transition: Option<EyeTransition>,
}

impl HysteresisOutcome {
    pub fn is_blink(&self) -> bool {
        self.transition == Some(EyeTransition::Closed)
    }
}

/// Single-threshold blink detector
#[derive(Debug, Clone, Copy)]
pub struct BlinkHysteresis {
    threshold: f64,
}

impl BlinkHysteresis {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    /// Feed one combined EAR sample.
    ///
    /// Only a crossing changes state. Holding below the threshold for any
    /// number of frames yields exactly one `Closed` transition.
    pub fn observe(&self, ear: f64, timestamp: f64, state: BlinkState) -> HysteresisOutcome {
        let closed_now = ear < self.threshold;
        let mut next = state;

        let transition = match (state.is_eye_closed, closed_now) {
            (false, true) => {
                next.is_eye_closed = true;
                next.blink_count = next.blink_count.saturating_add(1);
                next.last_blink_timestamp = Some(timestamp);
                debug!(
                    "Eyes closed at {:.3}s (ear {:.3}), blink #{}",
                    timestamp, ear, next.blink_count
                );
                Some(EyeTransition::Closed)
            }
            (true, false) => {
                next.is_eye_closed = false;
                debug!("Eyes opened at {:.3}s (ear {:.3})", timestamp, ear);
                Some(EyeTransition::Opened)
            }
            _ => None,
        };

        HysteresisOutcome { state: next, transition }
    }
}
