//! Landmark observations delivered by the face detector
//!
//! Coordinates are in the detector's normalized space. No pixel or aspect
//! correction is applied anywhere in this crate; the EAR threshold is
//! calibrated against this convention.

use crate::error::BlinkError;
use serde::{Deserialize, Serialize};

/// Number of points in one eye contour
pub const EYE_CONTOUR_POINTS: usize = 6;

/// 2-D point in normalized detector coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Face bounding box (x, y, width, height), normalized
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Exactly six ordered points of one eye
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeContour {
    points: [Point; EYE_CONTOUR_POINTS],
}

impl EyeContour {
    pub const fn new(points: [Point; EYE_CONTOUR_POINTS]) -> Self {
        Self { points }
    }

    /// Build a contour from a detector point sequence.
    ///
    /// `eye` names the eye in the error message.
    pub fn from_points(eye: &'static str, points: &[Point]) -> Result<Self, BlinkError> {
        let points: [Point; EYE_CONTOUR_POINTS] = points
            .try_into()
            .map_err(|_| BlinkError::MalformedContour { eye, points: points.len() })?;

        if points.iter().any(|p| !p.is_finite()) {
            return Err(BlinkError::DegenerateContour(format!(
                "{} eye contour contains non-finite coordinates",
                eye
            )));
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point; EYE_CONTOUR_POINTS] {
        &self.points
    }

    pub fn point(&self, index: usize) -> Point {
        self.points[index]
    }
}

/// Raw landmarks for one detected face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left_eye: Vec<Point>,
    pub right_eye: Vec<Point>,
    #[serde(default)]
    pub bounding_box: BoundingBox,
}

impl FaceLandmarks {
    pub fn new(left_eye: Vec<Point>, right_eye: Vec<Point>, bounding_box: BoundingBox) -> Self {
        Self { left_eye, right_eye, bounding_box }
    }

    /// Both contours, or the first malformed one as an error
    pub fn contours(&self) -> Result<(EyeContour, EyeContour), BlinkError> {
        let left = EyeContour::from_points("left", &self.left_eye)?;
        let right = EyeContour::from_points("right", &self.right_eye)?;
        Ok((left, right))
    }
}

/// One detector result per incoming frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameObservation {
    Detected { timestamp: f64, landmarks: FaceLandmarks },
    NotDetected { timestamp: f64 },
}

impl FrameObservation {
    pub fn detected(timestamp: f64, landmarks: FaceLandmarks) -> Self {
        FrameObservation::Detected { timestamp, landmarks }
    }

    pub fn not_detected(timestamp: f64) -> Self {
        FrameObservation::NotDetected { timestamp }
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            FrameObservation::Detected { timestamp, .. } => *timestamp,
            FrameObservation::NotDetected { timestamp } => *timestamp,
        }
    }

    pub fn landmarks(&self) -> Option<&FaceLandmarks> {
        match self {
            FrameObservation::Detected { landmarks, .. } => Some(landmarks),
            FrameObservation::NotDetected { .. } => None,
        }
    }
}
