//! narayana-blink: Blink and drowsiness signals from facial landmarks
//!
//! Turns a per-frame stream of eye contours into a blink count, a peak
//! detections-per-second figure and an adaptive idle duration that tells the
//! host how long it can skip the landmark detector after each blink.
//!
//! The tracker is synchronous and detector-agnostic. `BlinkAdapter` wraps it
//! in a tokio loop for hosts that deliver frames over a channel.

pub mod adapter;
pub mod config;
pub mod detector;
pub mod ear;
pub mod error;
pub mod events;
pub mod hysteresis;
pub mod idle;
pub mod landmarks;
pub mod rate;
pub mod synthetic;
pub mod trace;
pub mod tracker;

pub use adapter::BlinkAdapter;
pub use config::{BlinkConfig, GaugeConfig, IdleConfig, DEFAULT_EAR_THRESHOLD};
pub use detector::{FaceDetector, Frame};
pub use ear::{combined_ear, compute_ear};
pub use error::BlinkError;
pub use events::BlinkEvent;
pub use landmarks::{BoundingBox, EyeContour, FaceLandmarks, FrameObservation, Point};
pub use trace::{replay, ReplaySummary};
pub use tracker::{Admission, BlinkSnapshot, BlinkTracker, FrameOutcome};
