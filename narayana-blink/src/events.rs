//! Events published to presentation consumers

use crate::hysteresis::EyeTransition;
use crate::tracker::{BlinkSnapshot, FrameOutcome};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Blink stream events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlinkEvent {
    /// Open -> closed edge
    Blink {
        count: u64,
        timestamp: f64,
        ear: f64,
        idle_duration: f64,
    },
    EyeOpened {
        timestamp: f64,
    },
    FaceLost {
        timestamp: f64,
        gap_secs: f64,
    },
    FaceReacquired {
        timestamp: f64,
    },
    /// Committed state after a processed frame
    Snapshot(BlinkSnapshot),
}

impl BlinkEvent {
    /// Events for one processed frame, snapshot last
    pub fn from_outcome(outcome: &FrameOutcome) -> Vec<BlinkEvent> {
        let mut events = Vec::new();

        if outcome.face_reacquired {
            events.push(BlinkEvent::FaceReacquired { timestamp: outcome.timestamp });
        }

        match (outcome.transition, outcome.ear) {
            (Some(EyeTransition::Closed), Some(ear)) => events.push(BlinkEvent::Blink {
                count: outcome.snapshot.blink_count,
                timestamp: outcome.timestamp,
                ear,
                idle_duration: outcome.snapshot.idle_duration,
            }),
            (Some(EyeTransition::Opened), _) => {
                events.push(BlinkEvent::EyeOpened { timestamp: outcome.timestamp })
            }
            _ => {}
        }

        if let Some(gap_secs) = outcome.face_lost_after {
            events.push(BlinkEvent::FaceLost { timestamp: outcome.timestamp, gap_secs });
        }

        events.push(BlinkEvent::Snapshot(outcome.snapshot.clone()));
        events
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlinkEvent::Blink { .. } => "blink",
            BlinkEvent::EyeOpened { .. } => "eye_opened",
            BlinkEvent::FaceLost { .. } => "face_lost",
            BlinkEvent::FaceReacquired { .. } => "face_reacquired",
            BlinkEvent::Snapshot(_) => "snapshot",
        }
    }

    /// JSON payload tagged with the stream session and wall-clock time
    pub fn to_json(&self, session_id: Uuid) -> serde_json::Value {
        let wall_clock = chrono::Utc::now()
            .timestamp_nanos_opt()
            .and_then(|ts| u64::try_from(ts).ok())
            .unwrap_or(0u64);

        json!({
            "source": "blink",
            "session_id": session_id.to_string(),
            "event": self.name(),
            "data": self,
            "wall_clock_ns": wall_clock,
        })
    }
}
