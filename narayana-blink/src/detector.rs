//! Face detector seam
//!
//! The landmark detector itself lives outside this crate. Hosts wrap their
//! vision backend in a `FaceDetector` and hand frames to the adapter.

use crate::error::BlinkError;
use crate::landmarks::FaceLandmarks;
use async_trait::async_trait;
use bytes::Bytes;

/// Captured image frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Capture time in seconds, monotonic non-decreasing
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    /// Pixel data in whatever layout the detector expects
    pub data: Bytes,
}

impl Frame {
    pub fn new(timestamp: f64, width: u32, height: u32, data: Bytes) -> Self {
        Self { timestamp, width, height, data }
    }

    /// Frame without pixel payload, for detectors that look frames up by time
    pub fn empty(timestamp: f64) -> Self {
        Self { timestamp, width: 0, height: 0, data: Bytes::new() }
    }
}

/// External facial-landmark detector
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Detector name for logs
    fn name(&self) -> &'static str;

    /// Landmarks for the face in `frame`, or `None` when no face was found
    async fn detect(&self, frame: &Frame) -> Result<Option<FaceLandmarks>, BlinkError>;
}
