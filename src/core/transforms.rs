//! Tilt estimation and rotation of drop lines.
//!
//! A label's drops come from one linear nozzle array. The line through the
//! two extreme drops (by x) gives the imaging tilt; rotating every drop by
//! the opposite angle lays the array along the x axis so that x' measures
//! position along the nozzle row.

use super::loaders::{Point, PointSet};
use super::{PipelineError, Result};

/// Drops of one label after tilt correction.
#[derive(Debug, Clone)]
pub struct Rotation {
    /// Estimated tilt of the drop line, in radians.
    pub angle_rad: f64,
    /// Rotated points, ordered by their original x coordinate.
    pub points: Vec<Point>,
}

impl Rotation {
    /// Tilt in degrees, for reporting.
    #[inline]
    pub fn angle_deg(&self) -> f64 {
        self.angle_rad.to_degrees()
    }

    /// Coordinates along the nozzle row.
    pub fn along_axis(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }

    /// Coordinates across the nozzle row. Constant for a perfectly straight line.
    pub fn across_axis(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }
}

/// Rotate a point about the origin by `angle` radians (counter-clockwise).
#[inline]
pub fn rotate_point(p: Point, angle: f64) -> Point {
    let (sin_a, cos_a) = angle.sin_cos();
    Point::new(p.x * cos_a - p.y * sin_a, p.x * sin_a + p.y * cos_a)
}

/// Sort points by ascending x. Ties keep their input order.
pub fn sort_by_x(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x));
    sorted
}

/// Angle of the direction from the min-x point to the max-x point.
///
/// Expects `sorted` to be ordered by x. Returns `None` with fewer than two points.
pub fn estimate_tilt(sorted: &[Point]) -> Option<f64> {
    let (first, last) = match sorted {
        [first, .., last] => (first, last),
        _ => return None,
    };
    Some((last.y - first.y).atan2(last.x - first.x))
}

/// Correct the tilt of a drop line so it runs along the x axis.
///
/// Every point of the set is rotated by the negated tilt of its extreme
/// pair, not only the extremes. The result is ordered by original x.
///
/// # Errors
///
/// Returns [`PipelineError::DegeneratePointSet`] when the set has fewer than
/// two points, since no direction can be estimated.
pub fn rotate_to_vertical(set: &PointSet) -> Result<Rotation> {
    let sorted = sort_by_x(set.points());
    let angle_rad = estimate_tilt(&sorted).ok_or(PipelineError::DegeneratePointSet {
        points: sorted.len(),
    })?;

    let points = sorted.into_iter().map(|p| rotate_point(p, -angle_rad)).collect();

    Ok(Rotation { angle_rad, points })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn spread(values: &[f64]) -> f64 {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        max - min
    }

    #[test]
    fn test_rotate_point_quarter_turn() {
        let p = rotate_point(Point::new(1.0, 0.0), FRAC_PI_2);
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_diagonal_line_flattens() {
        let set = PointSet::from_points(
            "A.tif",
            [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (4.0, 4.0)],
        );
        let rotation = rotate_to_vertical(&set).unwrap();

        assert!((rotation.angle_rad - PI / 4.0).abs() < 1e-12);
        for p in &rotation.points {
            assert!(p.y.abs() < 1e-9, "y' = {}", p.y);
        }

        let xs = rotation.along_axis();
        for (k, x) in xs.iter().enumerate() {
            assert!((x - k as f64 * 2f64.sqrt()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_collinear_points_any_angle() {
        for deg in [-30.0f64, -3.0, -0.5, 0.0, 0.7, 5.0, 45.0, 80.0] {
            let theta = deg.to_radians();
            let (sin_t, cos_t) = theta.sin_cos();
            let origin = Point::new(12.5, -4.0);
            let points: Vec<Point> = [0.0, 3.0, 7.5, 9.0, 20.0, 31.0]
                .iter()
                .map(|t| Point::new(origin.x + t * cos_t, origin.y + t * sin_t))
                .collect();
            let set = PointSet::from_points("L", points);

            let rotation = rotate_to_vertical(&set).unwrap();
            assert!((rotation.angle_rad - theta).abs() < 1e-9);
            assert!(
                spread(&rotation.across_axis()) < 1e-9,
                "off-axis spread at {} degrees",
                deg
            );
        }
    }

    #[test]
    fn test_output_sorted_by_original_x() {
        let set = PointSet::from_points("A", [(3.0, 0.1), (1.0, 0.0), (2.0, 0.05)]);
        let rotation = rotate_to_vertical(&set).unwrap();

        let xs = rotation.along_axis();
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_two_points_is_not_an_error() {
        let set = PointSet::from_points("A", [(0.0, 0.0), (10.0, 0.0)]);
        let rotation = rotate_to_vertical(&set).unwrap();

        assert_eq!(rotation.angle_rad, 0.0);
        assert_eq!(rotation.points, vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
    }

    #[test]
    fn test_single_point_is_degenerate() {
        let set = PointSet::from_points("A", [(1.0, 1.0)]);
        let err = rotate_to_vertical(&set).unwrap_err();
        assert!(matches!(err, PipelineError::DegeneratePointSet { points: 1 }));

        let empty = PointSet::new("B");
        assert!(rotate_to_vertical(&empty).is_err());
    }
}
