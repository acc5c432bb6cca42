//! Per-frame blink tracking
//!
//! `BlinkTracker` owns every piece of persistent state and runs each
//! observation through EAR -> hysteresis -> idle estimator, with the
//! detection-rate gauge alongside. It is synchronous and O(1) per frame;
//! callers deliver frames one at a time in timestamp order.

use crate::config::BlinkConfig;
use crate::ear::combined_ear;
use crate::error::BlinkError;
use crate::hysteresis::{BlinkHysteresis, BlinkState, EyeTransition};
use crate::idle::{AdaptiveIdleEstimator, IdleEstimatorState};
use crate::landmarks::FrameObservation;
use crate::rate::{DetectionRateGauge, DetectionRateState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Detector admission decision for an incoming frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Process,
    /// Frame falls inside the idle window that ends at `until`
    Skip { until: f64 },
}

impl Admission {
    pub fn should_process(&self) -> bool {
        matches!(self, Admission::Process)
    }
}

/// Recoverable input faults seen on a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameAnomaly {
    MalformedContour,
    DegenerateContour,
    NonMonotonicTimestamp,
}

/// Running anomaly counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnomalyCounters {
    pub malformed_contours: u64,
    pub degenerate_contours: u64,
    pub non_monotonic_timestamps: u64,
}

impl AnomalyCounters {
    pub fn total(&self) -> u64 {
        self.malformed_contours + self.degenerate_contours + self.non_monotonic_timestamps
    }

    fn record(&mut self, anomaly: FrameAnomaly) {
        match anomaly {
            FrameAnomaly::MalformedContour => self.malformed_contours += 1,
            FrameAnomaly::DegenerateContour => self.degenerate_contours += 1,
            FrameAnomaly::NonMonotonicTimestamp => self.non_monotonic_timestamps += 1,
        }
    }
}

/// Committed view of the tracker after a frame
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlinkSnapshot {
    pub blink_count: u64,
    pub max_detections_per_second: u32,
    pub is_eye_closed: bool,
    pub idle_duration: f64,
    pub estimated_interval: f64,
    pub interval_variance: f64,
    pub last_ear: Option<f64>,
    pub last_timestamp: Option<f64>,
    pub face_present: bool,
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub anomalies: AnomalyCounters,
}

/// What happened on one processed frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub timestamp: f64,
    /// Combined EAR, present only when both contours were usable
    pub ear: Option<f64>,
    pub transition: Option<EyeTransition>,
    /// Absence span when this frame triggered the detection-loss reset
    pub face_lost_after: Option<f64>,
    pub face_reacquired: bool,
    pub anomalies: Vec<FrameAnomaly>,
    pub snapshot: BlinkSnapshot,
}

impl FrameOutcome {
    pub fn is_blink(&self) -> bool {
        self.transition == Some(EyeTransition::Closed)
    }
}

/// Streaming blink state machine
pub struct BlinkTracker {
    config: BlinkConfig,
    hysteresis: BlinkHysteresis,
    estimator: AdaptiveIdleEstimator,
    gauge: DetectionRateGauge,
    blink: BlinkState,
    idle: IdleEstimatorState,
    rate: DetectionRateState,
    last_ear: Option<f64>,
    last_timestamp: Option<f64>,
    frames_processed: u64,
    frames_skipped: u64,
    anomalies: AnomalyCounters,
}

impl BlinkTracker {
    /// Create a tracker with validated configuration
    pub fn new(config: BlinkConfig) -> Result<Self, BlinkError> {
        config.validate().map_err(BlinkError::Config)?;

        let hysteresis = BlinkHysteresis::new(config.ear_threshold);
        let estimator = AdaptiveIdleEstimator::new(config.idle.clone(), config.min_sample_interval);
        let gauge = DetectionRateGauge::new(&config.gauge);
        let idle = estimator.initial_state();

        Ok(Self {
            config,
            hysteresis,
            estimator,
            gauge,
            blink: BlinkState::default(),
            idle,
            rate: DetectionRateState::default(),
            last_ear: None,
            last_timestamp: None,
            frames_processed: 0,
            frames_skipped: 0,
            anomalies: AnomalyCounters::default(),
        })
    }

    pub fn config(&self) -> &BlinkConfig {
        &self.config
    }

    pub fn blink_state(&self) -> &BlinkState {
        &self.blink
    }

    pub fn idle_state(&self) -> &IdleEstimatorState {
        &self.idle
    }

    pub fn rate_state(&self) -> &DetectionRateState {
        &self.rate
    }

    /// Retune the closed-eye threshold without touching state
    pub fn set_ear_threshold(&mut self, threshold: f64) -> Result<(), BlinkError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(BlinkError::Config(format!("Invalid EAR threshold {}", threshold)));
        }
        self.config.ear_threshold = threshold;
        self.hysteresis.set_threshold(threshold);
        Ok(())
    }

    /// Pure admission check for a frame at `timestamp`
    pub fn should_process(&self, timestamp: f64) -> bool {
        self.estimator.should_process(timestamp, &self.idle)
    }

    /// Admission check that also counts skipped frames
    pub fn admit(&mut self, timestamp: f64) -> Admission {
        if self.should_process(timestamp) {
            return Admission::Process;
        }

        self.frames_skipped += 1;
        let until = self.idle.idle_until().unwrap_or(timestamp);
        debug!("Skipping frame at {:.3}s, idle until {:.3}s", timestamp, until);
        Admission::Skip { until }
    }

    /// Feed one detector result
    pub fn process(&mut self, observation: &FrameObservation) -> FrameOutcome {
        let timestamp = observation.timestamp();
        let mut outcome = FrameOutcome {
            timestamp,
            ear: None,
            transition: None,
            face_lost_after: None,
            face_reacquired: false,
            anomalies: Vec::new(),
            snapshot: BlinkSnapshot::default(),
        };

        self.frames_processed += 1;
        if !self.check_timestamp(timestamp, &mut outcome) {
            // Out-of-order frames never reach the gauge, hysteresis or estimator.
            outcome.snapshot = self.snapshot();
            return outcome;
        }

        let ear = match observation {
            FrameObservation::Detected { landmarks, .. } => {
                match landmarks.contours().and_then(|(left, right)| combined_ear(&left, &right)) {
                    Ok(ear) => Some(ear),
                    Err(err) => {
                        let anomaly = match err {
                            BlinkError::MalformedContour { .. } => FrameAnomaly::MalformedContour,
                            _ => FrameAnomaly::DegenerateContour,
                        };
                        warn!("Ignoring landmarks at {:.3}s: {}", timestamp, err);
                        self.anomalies.record(anomaly);
                        outcome.anomalies.push(anomaly);
                        None
                    }
                }
            }
            FrameObservation::NotDetected { .. } => None,
        };

        match ear {
            Some(ear) => self.on_face(timestamp, ear, &mut outcome),
            None => self.on_no_face(timestamp, &mut outcome),
        }

        outcome.snapshot = self.snapshot();
        outcome
    }

    /// Explicit external reset of all state, including the blink counter
    pub fn reset(&mut self) {
        info!("Blink tracker reset ({} blinks discarded)", self.blink.blink_count);
        self.blink = BlinkState::default();
        self.idle = self.estimator.initial_state();
        self.rate = DetectionRateState::default();
        self.last_ear = None;
        self.last_timestamp = None;
        self.frames_processed = 0;
        self.frames_skipped = 0;
        self.anomalies = AnomalyCounters::default();
    }

    pub fn snapshot(&self) -> BlinkSnapshot {
        BlinkSnapshot {
            blink_count: self.blink.blink_count,
            max_detections_per_second: self.rate.max_per_second,
            is_eye_closed: self.blink.is_eye_closed,
            idle_duration: self.idle.idle_duration,
            estimated_interval: self.idle.estimated_interval,
            interval_variance: self.idle.interval_variance,
            last_ear: self.last_ear,
            last_timestamp: self.last_timestamp,
            face_present: self.rate.detection_ongoing,
            frames_processed: self.frames_processed,
            frames_skipped: self.frames_skipped,
            anomalies: self.anomalies,
        }
    }

    /// Returns false when the frame is older than the last one seen
    fn check_timestamp(&mut self, timestamp: f64, outcome: &mut FrameOutcome) -> bool {
        match self.last_timestamp {
            Some(previous) if timestamp < previous => {
                warn!(
                    "{}",
                    BlinkError::NonMonotonicTimestamp { previous, current: timestamp }
                );
                self.anomalies.record(FrameAnomaly::NonMonotonicTimestamp);
                outcome.anomalies.push(FrameAnomaly::NonMonotonicTimestamp);
                false
            }
            _ => {
                self.last_timestamp = Some(timestamp);
                true
            }
        }
    }

    fn on_face(&mut self, timestamp: f64, ear: f64, outcome: &mut FrameOutcome) {
        if !self.rate.detection_ongoing && self.rate.last_detection_timestamp.is_some() {
            info!("Face reacquired at {:.3}s", timestamp);
            outcome.face_reacquired = true;
        }

        self.rate = self.gauge.on_detection(timestamp, self.rate);
        self.last_ear = Some(ear);
        outcome.ear = Some(ear);

        let result = self.hysteresis.observe(ear, timestamp, self.blink);
        self.blink = result.state;
        outcome.transition = result.transition;

        if result.is_blink() {
            let update = self.estimator.on_blink_edge(timestamp, self.idle);
            self.idle = update.state;
            info!(
                "Blink #{} at {:.3}s (ear {:.3}, idle {:.3}s)",
                self.blink.blink_count, timestamp, ear, self.idle.idle_duration
            );
        }
    }

    fn on_no_face(&mut self, timestamp: f64, outcome: &mut FrameOutcome) {
        match self.rate.last_detection_timestamp {
            None => {
                // Nothing has ever been detected: keep sampling at full rate.
                self.idle = self.estimator.reset();
            }
            Some(last) if self.rate.detection_ongoing => {
                let gap = timestamp - last;
                if gap > self.config.detection_loss_timeout_secs {
                    info!("Face lost for {:.3}s, resetting idle estimator", gap);
                    self.idle = self.estimator.reset();
                    self.rate = self.gauge.on_detection_lost(self.rate);
                    outcome.face_lost_after = Some(gap);
                }
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{BoundingBox, FaceLandmarks, Point};
    use crate::synthetic::{contour_with_ear, landmarks_with_ear};

    const OPEN: f64 = 3.2;
    const CLOSED: f64 = 2.2;

    fn tracker() -> BlinkTracker {
        BlinkTracker::new(BlinkConfig::default()).unwrap()
    }

    fn face(t: f64, ear: f64) -> FrameObservation {
        FrameObservation::detected(t, landmarks_with_ear(ear))
    }

    #[test]
    fn test_tracker_new() {
        let tracker = tracker();
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.blink_count, 0);
        assert_eq!(snapshot.max_detections_per_second, 0);
        assert!(!snapshot.is_eye_closed);
        assert_eq!(snapshot.idle_duration, 0.0);
        assert!(tracker.should_process(0.0));
    }

    #[test]
    fn test_tracker_rejects_invalid_config() {
        let mut config = BlinkConfig::default();
        config.ear_threshold = -1.0;
        assert!(matches!(BlinkTracker::new(config), Err(BlinkError::Config(_))));
    }

    #[test]
    fn test_single_blink() {
        let mut tracker = tracker();
        assert!(tracker.process(&face(0.0, OPEN)).transition.is_none());
        let outcome = tracker.process(&face(0.033, CLOSED));
        assert!(outcome.is_blink());
        assert_eq!(outcome.snapshot.blink_count, 1);
        assert!(outcome.snapshot.is_eye_closed);
        assert_eq!(tracker.idle_state().previous_blink_timestamp, Some(0.033));
        assert!((tracker.idle_state().idle_duration - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_observation_leaves_state() {
        let mut tracker = tracker();
        tracker.process(&face(0.0, CLOSED));
        let before = *tracker.blink_state();

        let contour = contour_with_ear(OPEN, Point::new(0.3, 0.4));
        let partial = FaceLandmarks::new(contour.points().to_vec(), vec![], BoundingBox::default());
        let outcome = tracker.process(&FrameObservation::detected(0.05, partial));

        assert_eq!(outcome.ear, None);
        assert_eq!(outcome.anomalies, vec![FrameAnomaly::MalformedContour]);
        assert_eq!(*tracker.blink_state(), before);
        assert!(tracker.blink_state().is_eye_closed);
        assert_eq!(outcome.snapshot.anomalies.malformed_contours, 1);
    }

    #[test]
    fn test_missing_frame_is_not_open() {
        let mut tracker = tracker();
        tracker.process(&face(0.0, CLOSED));
        tracker.process(&FrameObservation::not_detected(0.1));
        assert!(tracker.blink_state().is_eye_closed);
        let outcome = tracker.process(&face(0.2, CLOSED));
        assert!(outcome.transition.is_none());
        assert_eq!(tracker.blink_state().blink_count, 1);
    }

    #[test]
    fn test_detection_loss_resets_idle() {
        let mut tracker = tracker();
        tracker.process(&face(0.0, OPEN));
        tracker.process(&face(0.1, CLOSED));
        tracker.process(&face(1.2, OPEN));
        assert!(tracker.idle_state().idle_duration > 0.0);

        let within = tracker.process(&FrameObservation::not_detected(1.5));
        assert!(within.face_lost_after.is_none());
        assert!(tracker.idle_state().previous_blink_timestamp.is_some());

        let lost = tracker.process(&FrameObservation::not_detected(1.7));
        assert!((lost.face_lost_after.unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(tracker.idle_state().estimated_interval, 4.0);
        assert_eq!(tracker.idle_state().interval_variance, 0.0);
        assert_eq!(tracker.idle_state().idle_duration, 0.0);
        assert_eq!(tracker.idle_state().previous_blink_timestamp, None);
        assert!(!lost.snapshot.face_present);
        // The blink counter survives the reset.
        assert_eq!(lost.snapshot.blink_count, 1);

        let back = tracker.process(&face(2.0, OPEN));
        assert!(back.face_reacquired);
    }

    #[test]
    fn test_gate_counts_skips() {
        let mut tracker = tracker();
        tracker.process(&face(0.0, OPEN));
        tracker.process(&face(0.1, CLOSED));
        assert_eq!(tracker.admit(0.5), Admission::Skip { until: 1.1 });
        assert_eq!(tracker.admit(1.1), Admission::Process);
        assert_eq!(tracker.snapshot().frames_skipped, 1);
    }

    #[test]
    fn test_non_monotonic_timestamp_reported() {
        let mut tracker = tracker();
        tracker.process(&face(1.0, OPEN));
        let outcome = tracker.process(&face(0.5, OPEN));
        assert_eq!(outcome.anomalies, vec![FrameAnomaly::NonMonotonicTimestamp]);
        assert_eq!(outcome.snapshot.last_timestamp, Some(1.0));
        assert_eq!(outcome.snapshot.anomalies.total(), 1);
    }

    #[test]
    fn test_stale_frame_does_not_trigger_loss() {
        let mut tracker = tracker();
        tracker.process(&face(10.0, OPEN));
        tracker.process(&face(10.2, CLOSED));
        tracker.process(&face(10.5, OPEN));

        let stale = tracker.process(&face(9.0, CLOSED));
        assert_eq!(stale.anomalies, vec![FrameAnomaly::NonMonotonicTimestamp]);
        assert!(stale.ear.is_none());
        assert!(stale.transition.is_none());
        assert_eq!(stale.snapshot.blink_count, 1);
        assert!(!stale.snapshot.is_eye_closed);

        let outcome = tracker.process(&FrameObservation::not_detected(10.6));
        assert!(outcome.face_lost_after.is_none());
        assert_eq!(tracker.rate_state().last_detection_timestamp, Some(10.5));
        assert_eq!(tracker.idle_state().previous_blink_timestamp, Some(10.2));
        assert!(tracker.idle_state().idle_duration > 0.0);
    }

    #[test]
    fn test_explicit_reset() {
        let mut tracker = tracker();
        tracker.process(&face(0.0, OPEN));
        tracker.process(&face(0.1, CLOSED));
        tracker.reset();
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.blink_count, 0);
        assert!(!snapshot.is_eye_closed);
        assert_eq!(snapshot.frames_processed, 0);
        assert_eq!(tracker.idle_state().previous_blink_timestamp, None);
    }

    #[test]
    fn test_set_ear_threshold() {
        let mut tracker = tracker();
        assert!(tracker.set_ear_threshold(f64::NAN).is_err());
        tracker.set_ear_threshold(2.82).unwrap();
        let outcome = tracker.process(&face(0.0, 2.8));
        assert!(outcome.is_blink());
        assert_eq!(tracker.config().ear_threshold, 2.82);
    }
}
