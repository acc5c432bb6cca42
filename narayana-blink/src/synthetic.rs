//! Deterministic synthetic landmark streams
//!
//! Used for tests, benchmarks and the CLI `simulate` command. Contours are
//! built so that their EAR matches the requested value exactly (up to float
//! rounding).

use crate::landmarks::{BoundingBox, EyeContour, FaceLandmarks, FrameObservation, Point};

/// Horizontal span of a synthetic eye in normalized coordinates
const EYE_WIDTH: f64 = 0.06;

/// Default EAR of an open synthetic eye
pub const OPEN_EAR: f64 = 3.2;

/// Default EAR of a closed synthetic eye
pub const CLOSED_EAR: f64 = 2.2;

/// Six-point contour centred on `center` whose EAR equals `ear`
pub fn contour_with_ear(ear: f64, center: Point) -> EyeContour {
    let w = EYE_WIDTH;
    let h = ear.max(0.0) * w / 2.0;

    EyeContour::new([
        Point::new(center.x - w / 2.0, center.y),
        Point::new(center.x + w / 2.0, center.y),
        Point::new(center.x - w / 4.0, center.y - h / 2.0),
        Point::new(center.x + w / 4.0, center.y - h / 2.0),
        Point::new(center.x - w / 4.0, center.y + h / 2.0),
        Point::new(center.x + w / 4.0, center.y + h / 2.0),
    ])
}

/// Both eyes at the same EAR inside a fixed face box
pub fn landmarks_with_ear(ear: f64) -> FaceLandmarks {
    let left = contour_with_ear(ear, Point::new(0.35, 0.4));
    let right = contour_with_ear(ear, Point::new(0.65, 0.4));
    FaceLandmarks::new(
        left.points().to_vec(),
        right.points().to_vec(),
        BoundingBox { x: 0.2, y: 0.15, width: 0.6, height: 0.7 },
    )
}

/// Fixed-rate frame stream with scripted blinks and face absences
#[derive(Debug, Clone)]
pub struct SyntheticStream {
    fps: f64,
    duration: f64,
    blinks: Vec<f64>,
    closed_for: f64,
    open_ear: f64,
    closed_ear: f64,
    absences: Vec<(f64, f64)>,
}

impl SyntheticStream {
    pub fn new(fps: f64, duration: f64) -> Self {
        Self {
            fps,
            duration,
            blinks: Vec::new(),
            closed_for: 0.15,
            open_ear: OPEN_EAR,
            closed_ear: CLOSED_EAR,
            absences: Vec::new(),
        }
    }

    pub fn blink_at(mut self, timestamp: f64) -> Self {
        self.blinks.push(timestamp);
        self
    }

    /// Blink every `period` seconds, first one at `period`
    pub fn blink_every(mut self, period: f64) -> Self {
        if period > 0.0 {
            let mut t = period;
            while t < self.duration {
                self.blinks.push(t);
                t += period;
            }
        }
        self
    }

    pub fn closed_for(mut self, secs: f64) -> Self {
        self.closed_for = secs;
        self
    }

    pub fn with_ears(mut self, open: f64, closed: f64) -> Self {
        self.open_ear = open;
        self.closed_ear = closed;
        self
    }

    /// No face in `[start, end)`
    pub fn absent(mut self, start: f64, end: f64) -> Self {
        self.absences.push((start, end));
        self
    }

    pub fn blink_times(&self) -> &[f64] {
        &self.blinks
    }

    pub fn frame_count(&self) -> usize {
        if !(self.fps > 0.0) || !(self.duration > 0.0) {
            return 0;
        }
        (self.duration * self.fps).ceil() as usize
    }

    pub fn timestamp_of(&self, index: usize) -> f64 {
        index as f64 / self.fps
    }

    pub fn observation_at(&self, index: usize) -> FrameObservation {
        let t = self.timestamp_of(index);

        if self.absences.iter().any(|(start, end)| t >= *start && t < *end) {
            return FrameObservation::not_detected(t);
        }

        let closed = self.blinks.iter().any(|b| t >= *b && t < b + self.closed_for);
        let ear = if closed { self.closed_ear } else { self.open_ear };
        FrameObservation::detected(t, landmarks_with_ear(ear))
    }

    pub fn iter(&self) -> impl Iterator<Item = FrameObservation> + '_ {
        (0..self.frame_count()).map(move |i| self.observation_at(i))
    }

    pub fn observations(&self) -> Vec<FrameObservation> {
        self.iter().collect()
    }
}
