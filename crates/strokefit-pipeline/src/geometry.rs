//! Geometry primitives shared by every analysis stage.
//!
//! Pure functions over point slices: centroid, perpendicular distance,
//! residual sums, spacing statistics, bounding diameter, and arc-length
//! resampling. Arc-length resampling is the single point-correspondence
//! method used throughout the crate, so symmetry scores and completion
//! spacing are computed on comparable samples.

use geo::BoundingRect;

use crate::types::{AnalysisError, Point};

/// Arithmetic mean of the points.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidInput`] for an empty slice.
pub fn centroid(points: &[Point]) -> Result<Point, AnalysisError> {
    if points.is_empty() {
        return Err(AnalysisError::InvalidInput(
            "cannot take the centroid of zero points".to_string(),
        ));
    }
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let sum = points.iter().fold(Point::ORIGIN, |acc, &p| acc + p);
    Ok(Point::new(sum.x / n, sum.y / n))
}

/// Perpendicular distance from point `p` to the infinite line through `a`
/// and `b`.
///
/// Uses the formula: |cross(b-a, p-a)| / |b-a|.
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
#[must_use]
pub fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        // a and b are the same point.
        return p.distance(a);
    }

    // |cross product| / |line length|
    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}

/// Sum of squared residuals, where `residual` maps each point to its
/// signed or unsigned deviation from a model.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidInput`] for an empty slice.
pub fn sum_squared_residuals<F>(points: &[Point], residual: F) -> Result<f64, AnalysisError>
where
    F: Fn(Point) -> f64,
{
    if points.is_empty() {
        return Err(AnalysisError::InvalidInput(
            "cannot compute residuals of zero points".to_string(),
        ));
    }
    Ok(points
        .iter()
        .map(|&p| {
            let r = residual(p);
            r * r
        })
        .sum())
}

/// Lengths of the consecutive segments `p[i] → p[i + 1]`.
#[must_use]
pub fn segment_lengths(points: &[Point]) -> Vec<f64> {
    points.windows(2).map(|w| w[0].distance(w[1])).collect()
}

/// Total length along the points, optionally including the closing
/// segment from the last point back to the first.
#[must_use]
pub fn arc_length(points: &[Point], closed: bool) -> f64 {
    let open: f64 = segment_lengths(points).iter().sum();
    match (closed, points.first(), points.last()) {
        (true, Some(&first), Some(&last)) => open + last.distance(first),
        _ => open,
    }
}

/// Arithmetic mean, or `None` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / n)
}

/// Median (mean of the two middle values for even lengths), or `None`
/// for an empty slice.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(f64::midpoint(sorted[mid - 1], sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}

/// Diagonal of the axis-aligned bounding box, used as the shape scale
/// when normalizing residuals and symmetry mismatch.
///
/// Returns `0.0` for an empty slice or a single repeated point.
#[must_use]
pub fn bounding_diameter(points: &[Point]) -> f64 {
    let coords: Vec<geo::Coord<f64>> = points.iter().copied().map(geo::Coord::from).collect();
    geo::LineString::new(coords)
        .bounding_rect()
        .map_or(0.0, |rect| rect.width().hypot(rect.height()))
}

/// Resample a stroke to `count` points evenly spaced by arc length.
///
/// Open strokes keep both endpoints: sample `0` is the first point and
/// sample `count - 1` is the last. Closed strokes walk the loop including
/// the closing segment and place `count` samples starting at the first
/// point, so a rotation of the loop by `k / count` of its perimeter is a
/// cyclic shift of `k` samples.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidInput`] when fewer than two points are
/// given, `count < 2`, or the stroke has zero length.
pub fn resample(points: &[Point], count: usize, closed: bool) -> Result<Vec<Point>, AnalysisError> {
    if points.len() < 2 {
        return Err(AnalysisError::InvalidInput(format!(
            "resampling needs at least 2 points, got {}",
            points.len()
        )));
    }
    if count < 2 {
        return Err(AnalysisError::InvalidInput(format!(
            "resample count must be at least 2, got {count}"
        )));
    }

    let mut vertices = points.to_vec();
    if closed {
        vertices.push(points[0]);
    }
    let lengths = segment_lengths(&vertices);
    let total: f64 = lengths.iter().sum();
    if !(total > 0.0 && total.is_finite()) {
        return Err(AnalysisError::InvalidInput(
            "stroke has zero length".to_string(),
        ));
    }

    #[allow(clippy::cast_precision_loss)]
    let step = if closed {
        total / count as f64
    } else {
        total / (count - 1) as f64
    };

    let mut samples = Vec::with_capacity(count);
    let mut seg = 0;
    let mut seg_start = 0.0;
    for k in 0..count {
        #[allow(clippy::cast_precision_loss)]
        let target = (step * k as f64).min(total);
        while seg + 1 < lengths.len() && seg_start + lengths[seg] < target {
            seg_start += lengths[seg];
            seg += 1;
        }
        let len = lengths[seg];
        let t = if len > 0.0 {
            ((target - seg_start) / len).clamp(0.0, 1.0)
        } else {
            0.0
        };
        samples.push(vertices[seg].lerp(vertices[seg + 1], t));
    }
    Ok(samples)
}

/// Golden-section search for the minimum of `f` on `[a, b]`.
///
/// Assumes `f` is unimodal on the interval. Returns `(x_min, f_min)`.
pub fn golden_section_minimize(
    mut f: impl FnMut(f64) -> f64,
    mut a: f64,
    mut b: f64,
    max_evals: usize,
) -> (f64, f64) {
    const PHI: f64 = 1.618_033_988_749_895;
    const RESP: f64 = 2.0 - PHI;

    let mut x1 = RESP.mul_add(b - a, a);
    let mut x2 = RESP.mul_add(-(b - a), b);
    let mut f1 = f(x1);
    let mut f2 = f(x2);
    let mut evals = 2;

    while evals < max_evals && (b - a).abs() > 1e-18 {
        if f1 < f2 {
            b = x2;
            x2 = x1;
            f2 = f1;
            x1 = RESP.mul_add(b - a, a);
            f1 = f(x1);
        } else {
            a = x1;
            x1 = x2;
            f1 = f2;
            x2 = RESP.mul_add(-(b - a), b);
            f2 = f(x2);
        }
        evals += 1;
    }

    if f1 < f2 { (x1, f1) } else { (x2, f2) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ]
    }

    #[test]
    fn centroid_of_square() {
        let c = centroid(&square()).unwrap();
        assert_eq!(c, Point::new(1.0, 1.0));
    }

    #[test]
    fn centroid_of_empty_is_invalid_input() {
        assert!(matches!(centroid(&[]), Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn perpendicular_distance_horizontal_line() {
        let d = perpendicular_distance(
            Point::new(5.0, 3.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
        );
        assert!((d - 3.0).abs() < 1e-12);
    }

    #[test]
    fn perpendicular_distance_beyond_segment_uses_infinite_line() {
        let d = perpendicular_distance(
            Point::new(20.0, -4.0),
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
        );
        assert!((d - 4.0).abs() < 1e-12);
    }

    #[test]
    fn perpendicular_distance_coincident_endpoints() {
        let a = Point::new(1.0, 1.0);
        let d = perpendicular_distance(Point::new(4.0, 5.0), a, a);
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn sum_squared_residuals_sums_squares() {
        let points = [Point::new(1.0, 0.0), Point::new(-2.0, 0.0), Point::new(3.0, 0.0)];
        let s = sum_squared_residuals(&points, |p| p.x).unwrap();
        assert!((s - 14.0).abs() < 1e-12);
        assert!(sum_squared_residuals(&[], |p| p.x).is_err());
    }

    #[test]
    fn arc_length_open_and_closed() {
        let pts = square();
        assert!((arc_length(&pts, false) - 6.0).abs() < 1e-12);
        assert!((arc_length(&pts, true) - 8.0).abs() < 1e-12);
        assert!(arc_length(&[], true).abs() < f64::EPSILON);
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
    }

    #[test]
    fn bounding_diameter_of_3_4_box() {
        let pts = [Point::new(0.0, 0.0), Point::new(3.0, 1.0), Point::new(1.0, 4.0)];
        assert!((bounding_diameter(&pts) - 5.0).abs() < 1e-12);
        assert!(bounding_diameter(&[]).abs() < f64::EPSILON);
    }

    #[test]
    fn resample_open_keeps_endpoints_and_spacing() {
        let pts = [Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(10.0, 0.0)];
        let samples = resample(&pts, 11, false).unwrap();
        assert_eq!(samples.len(), 11);
        for (k, s) in samples.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let expected = Point::new(k as f64, 0.0);
            assert!(s.distance(expected) < 1e-9, "sample {k} = {s:?}");
        }
    }

    #[test]
    fn resample_closed_walks_closing_segment() {
        let samples = resample(&square(), 8, true).unwrap();
        assert_eq!(samples.len(), 8);
        // Perimeter 8, step 1: the last sample sits halfway down the
        // closing edge from (0, 2) to (0, 0).
        assert!(samples[0].distance(Point::new(0.0, 0.0)) < 1e-9);
        assert!(samples[2].distance(Point::new(2.0, 0.0)) < 1e-9);
        assert!(samples[7].distance(Point::new(0.0, 1.0)) < 1e-9);
    }

    #[test]
    fn resample_rejects_degenerate_input() {
        let p = Point::new(1.0, 1.0);
        assert!(resample(&[p], 10, false).is_err());
        assert!(resample(&[p, p, p], 10, false).is_err());
        assert!(resample(&square(), 1, false).is_err());
    }

    #[test]
    fn golden_section_finds_quadratic_min() {
        let (x_min, f_min) = golden_section_minimize(|x| (x - 0.3).powi(2), 0.0, 1.0, 80);
        assert!((x_min - 0.3).abs() < 1e-9, "expected min near 0.3, got {x_min}");
        assert!(f_min < 1e-18);
    }

    #[test]
    fn golden_section_handles_a_v_shaped_minimum() {
        let (x_min, _) = golden_section_minimize(|x: f64| (x + 0.0123).abs(), -0.05, 0.05, 80);
        assert!((x_min + 0.0123).abs() < 1e-12, "got {x_min}");
    }
}
