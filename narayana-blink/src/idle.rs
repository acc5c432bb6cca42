//! Adaptive idle estimator
//!
//! Tracks the inter-blink interval with an exponential moving average (and
//! the mean absolute deviation around it), and turns the resulting blink rate
//! into a bounded idle window. Frames that arrive inside the idle window after
//! the last blink are not sent to the detector at all.

use crate::config::IdleConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Persistent estimator state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdleEstimatorState {
    /// EMA of the inter-blink gap (seconds), never negative
    pub estimated_interval: f64,
    /// EMA of |sample - estimate|, never negative
    pub interval_variance: f64,
    /// Idle window after the previous blink. Zero after a reset, otherwise
    /// within `[min_idle, max_idle]`.
    pub idle_duration: f64,
    pub previous_blink_timestamp: Option<f64>,
}

impl IdleEstimatorState {
    pub fn initial(config: &IdleConfig) -> Self {
        Self {
            estimated_interval: config.baseline_interval,
            interval_variance: 0.0,
            idle_duration: 0.0,
            previous_blink_timestamp: None,
        }
    }

    /// End of the current idle window, if one is open
    pub fn idle_until(&self) -> Option<f64> {
        self.previous_blink_timestamp.map(|t| t + self.idle_duration)
    }
}

impl Default for IdleEstimatorState {
    fn default() -> Self {
        Self::initial(&IdleConfig::default())
    }
}

/// Result of one blink edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleUpdate {
    pub state: IdleEstimatorState,
    /// Inter-blink sample actually used
    pub sample: f64,
    /// The raw sample was below the minimum and got clamped
    pub clamped: bool,
}

/// Alpha-beta style interval tracker driving the detector admission gate
#[derive(Debug, Clone)]
pub struct AdaptiveIdleEstimator {
    config: IdleConfig,
    min_sample_interval: f64,
}

impl AdaptiveIdleEstimator {
    pub fn new(config: IdleConfig, min_sample_interval: f64) -> Self {
        Self { config, min_sample_interval }
    }

    pub fn config(&self) -> &IdleConfig {
        &self.config
    }

    pub fn initial_state(&self) -> IdleEstimatorState {
        IdleEstimatorState::initial(&self.config)
    }

    /// Update the estimate for a closed-eye edge at `timestamp`
    pub fn on_blink_edge(&self, timestamp: f64, state: IdleEstimatorState) -> IdleUpdate {
        let cfg = &self.config;

        // First blink since reset: assume one baseline gap before it.
        let previous = state
            .previous_blink_timestamp
            .unwrap_or(timestamp - cfg.baseline_interval);

        let raw_sample = timestamp - previous;
        let clamped = !(raw_sample >= self.min_sample_interval);
        let sample = if clamped {
            warn!(
                "Inter-blink sample {:.4}s below minimum, clamping to {:.4}s",
                raw_sample, self.min_sample_interval
            );
            self.min_sample_interval
        } else {
            raw_sample
        };

        let estimated_interval = cfg.alpha * sample + (1.0 - cfg.alpha) * state.estimated_interval;
        let interval_variance = cfg.beta * (sample - estimated_interval).abs()
            + (1.0 - cfg.beta) * state.interval_variance;

        let idle_duration = self.idle_for(estimated_interval, interval_variance);

        debug!(
            "Blink edge at {:.3}s: sample {:.3}s, interval {:.3}s, variance {:.3}, idle {:.3}s",
            timestamp, sample, estimated_interval, interval_variance, idle_duration
        );

        IdleUpdate {
            state: IdleEstimatorState {
                estimated_interval,
                interval_variance,
                idle_duration,
                previous_blink_timestamp: Some(timestamp),
            },
            sample,
            clamped,
        }
    }

    /// Bounded idle duration for an interval estimate and its deviation
    pub fn idle_for(&self, estimated_interval: f64, interval_variance: f64) -> f64 {
        let cfg = &self.config;
        let blink_rate = 1.0 / estimated_interval;
        let idle = cfg.gain_k / (blink_rate + cfg.variance_weight * interval_variance);
        if idle.is_finite() {
            idle.clamp(cfg.min_idle, cfg.max_idle)
        } else {
            cfg.max_idle
        }
    }

    /// Idle duration once a perfectly regular blinker has been tracked long enough
    pub fn steady_state_idle(&self, interval: f64) -> f64 {
        self.idle_for(interval, 0.0)
    }

    /// Admission gate: whether a frame at `timestamp` should reach the detector
    pub fn should_process(&self, timestamp: f64, state: &IdleEstimatorState) -> bool {
        if !self.config.enabled {
            return true;
        }
        match state.idle_until() {
            Some(until) => timestamp >= until,
            None => true,
        }
    }

    /// State after a sustained detection loss
    pub fn reset(&self) -> IdleEstimatorState {
        self.initial_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> AdaptiveIdleEstimator {
        AdaptiveIdleEstimator::new(IdleConfig::default(), 1e-3)
    }

    #[test]
    fn test_initial_state() {
        let state = estimator().initial_state();
        assert_eq!(state.estimated_interval, 4.0);
        assert_eq!(state.interval_variance, 0.0);
        assert_eq!(state.idle_duration, 0.0);
        assert_eq!(state.previous_blink_timestamp, None);
    }

    #[test]
    fn test_first_blink_uses_baseline_gap() {
        let est = estimator();
        let update = est.on_blink_edge(10.0, est.initial_state());
        assert_eq!(update.sample, 4.0);
        assert!(!update.clamped);
        assert_eq!(update.state.estimated_interval, 4.0);
        assert_eq!(update.state.interval_variance, 0.0);
        // 0.25 / (1/4) = 1.0, at the upper bound
        assert!((update.state.idle_duration - 1.0).abs() < 1e-12);
        assert_eq!(update.state.previous_blink_timestamp, Some(10.0));
    }

    #[test]
    fn test_second_blink_values() {
        let est = estimator();
        let first = est.on_blink_edge(0.0, est.initial_state()).state;
        let second = est.on_blink_edge(1.0, first).state;
        assert!((second.estimated_interval - 3.25).abs() < 1e-12);
        assert!((second.interval_variance - 0.5625).abs() < 1e-12);
        let expected_idle = 0.25 / (1.0 / 3.25 + 0.02 * 0.5625);
        assert!((second.idle_duration - expected_idle).abs() < 1e-12);
    }

    #[test]
    fn test_idle_is_clamped() {
        let est = estimator();
        assert_eq!(est.idle_for(100.0, 0.0), 1.0);
        assert_eq!(est.idle_for(0.1, 0.0), 0.3);
        assert_eq!(est.steady_state_idle(1.0), 0.3);
        assert!((est.steady_state_idle(2.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_backwards_timestamp_is_clamped() {
        let est = estimator();
        let first = est.on_blink_edge(5.0, est.initial_state()).state;
        let update = est.on_blink_edge(4.0, first);
        assert!(update.clamped);
        assert_eq!(update.sample, 1e-3);
        assert!(update.state.estimated_interval > 0.0);
        assert!(update.state.interval_variance >= 0.0);
        assert!(update.state.idle_duration >= 0.3 && update.state.idle_duration <= 1.0);
    }

    #[test]
    fn test_duplicate_timestamp_is_clamped() {
        let est = estimator();
        let first = est.on_blink_edge(5.0, est.initial_state()).state;
        assert!(est.on_blink_edge(5.0, first).clamped);
    }

    #[test]
    fn test_gate_without_blink_admits() {
        let est = estimator();
        assert!(est.should_process(0.0, &est.initial_state()));
    }

    #[test]
    fn test_gate_window() {
        let est = estimator();
        let state = est.on_blink_edge(10.0, est.initial_state()).state;
        assert_eq!(state.idle_until(), Some(11.0));
        assert!(!est.should_process(10.0, &state));
        assert!(!est.should_process(10.999, &state));
        assert!(est.should_process(11.0, &state));
        assert!(est.should_process(12.0, &state));
    }

    #[test]
    fn test_gate_disabled() {
        let mut config = IdleConfig::default();
        config.enabled = false;
        let est = AdaptiveIdleEstimator::new(config, 1e-3);
        let state = est.on_blink_edge(10.0, est.initial_state()).state;
        assert!(est.should_process(10.1, &state));
    }

    #[test]
    fn test_reset() {
        let est = estimator();
        let mut state = est.initial_state();
        for t in [0.0, 0.7, 1.9, 2.2] {
            state = est.on_blink_edge(t, state).state;
        }
        let reset = est.reset();
        assert_eq!(reset.estimated_interval, 4.0);
        assert_eq!(reset.interval_variance, 0.0);
        assert_eq!(reset.idle_duration, 0.0);
        assert_eq!(reset.previous_blink_timestamp, None);
    }
}
