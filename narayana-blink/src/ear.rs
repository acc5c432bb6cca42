//! Eye-aspect-ratio calculation
//!
//! The ratio is computed on detector contour positions remapped to the
//! conventional `p1..p6` labels:
//!
//! ```text
//! p1 p2 p3 p4 p5 p6
//!  1  5  4  0  2  3    <- contour index
//!
//! EAR = (|p2 - p6| + |p3 - p5|) / |p1 - p4|
//! ```
//!
//! Distances stay in normalized detector space, so the resulting values sit
//! well above the ~0.2 seen with pixel-space landmarks.

use crate::error::BlinkError;
use crate::landmarks::{EyeContour, FaceLandmarks, Point};

/// Contour index for each of `p1..p6`
pub const EAR_POINT_ORDER: [usize; 6] = [1, 5, 4, 0, 2, 3];

/// Horizontal spans below this are treated as degenerate
const MIN_HORIZONTAL_SPAN: f64 = 1e-9;

fn labelled(contour: &EyeContour) -> [Point; 6] {
    EAR_POINT_ORDER.map(|index| contour.point(index))
}

/// EAR of a single eye
pub fn compute_ear(contour: &EyeContour) -> Result<f64, BlinkError> {
    let [p1, p2, p3, p4, p5, p6] = labelled(contour);

    let horizontal = p1.distance(&p4);
    if horizontal < MIN_HORIZONTAL_SPAN {
        return Err(BlinkError::DegenerateContour(format!(
            "horizontal span {} is too small",
            horizontal
        )));
    }

    let ear = (p2.distance(&p6) + p3.distance(&p5)) / horizontal;
    if !ear.is_finite() {
        return Err(BlinkError::DegenerateContour("non-finite EAR".to_string()));
    }

    Ok(ear)
}

/// Mean EAR of both eyes
pub fn combined_ear(left: &EyeContour, right: &EyeContour) -> Result<f64, BlinkError> {
    Ok((compute_ear(left)? + compute_ear(right)?) / 2.0)
}

/// Combined EAR straight from detector landmarks.
///
/// Fails when either contour is not exactly six finite points.
pub fn landmarks_ear(landmarks: &FaceLandmarks) -> Result<f64, BlinkError> {
    let (left, right) = landmarks.contours()?;
    combined_ear(&left, &right)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hexagon(radius: f64) -> EyeContour {
        let mut points = [Point::default(); 6];
        for (k, point) in points.iter_mut().enumerate() {
            let angle = std::f64::consts::PI / 3.0 * k as f64;
            *point = Point::new(0.5 + radius * angle.cos(), 0.5 + radius * angle.sin());
        }
        EyeContour::new(points)
    }

    #[test]
    fn test_regular_hexagon_ear() {
        // Adjacent vertices are `r` apart, vertices two steps apart are `r * sqrt(3)`.
        let ear = compute_ear(&hexagon(0.05)).unwrap();
        assert!((ear - 2.0 * 3f64.sqrt()).abs() < 1e-9, "ear = {}", ear);
    }

    #[test]
    fn test_ear_is_scale_invariant() {
        let small = compute_ear(&hexagon(0.01)).unwrap();
        let large = compute_ear(&hexagon(0.2)).unwrap();
        assert!((small - large).abs() < 1e-9);
    }

    #[test]
    fn test_point_order_mapping() {
        let contour = EyeContour::new([
            Point::new(0.0, 0.0),
            Point::new(0.1, 0.0),
            Point::new(0.3, 0.0),
            Point::new(0.5, 0.0),
            Point::new(0.3, 0.02),
            Point::new(0.5, 0.03),
        ]);
        // |c5 - c3| = 0.03, |c4 - c2| = 0.02, |c1 - c0| = 0.1
        let ear = compute_ear(&contour).unwrap();
        assert!((ear - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_contour() {
        let contour = EyeContour::new([Point::new(0.4, 0.4); 6]);
        assert!(matches!(compute_ear(&contour), Err(BlinkError::DegenerateContour(_))));
    }

    #[test]
    fn test_combined_ear_is_mean() {
        let left = hexagon(0.05);
        let right = EyeContour::new([
            Point::new(0.0, 0.0),
            Point::new(0.1, 0.0),
            Point::new(0.3, 0.0),
            Point::new(0.5, 0.0),
            Point::new(0.3, 0.02),
            Point::new(0.5, 0.03),
        ]);
        let combined = combined_ear(&left, &right).unwrap();
        assert!((combined - (2.0 * 3f64.sqrt() + 0.5) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_landmarks_ear_requires_both_eyes() {
        let points = hexagon(0.05).points().to_vec();
        let landmarks =
            FaceLandmarks::new(points.clone(), points[..4].to_vec(), Default::default());
        assert!(landmarks_ear(&landmarks).is_err());

        let landmarks = FaceLandmarks::new(points.clone(), points, Default::default());
        assert!(landmarks_ear(&landmarks).is_ok());
    }
}
