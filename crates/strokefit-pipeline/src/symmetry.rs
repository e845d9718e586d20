//! Reflective and rotational symmetry detection.
//!
//! The stroke is resampled by arc length to
//! [`resample_count`](AnalysisConfig::resample_count) points, then each
//! candidate transform (a reflection across an axis through the centroid,
//! or a rotation by `360° / n` about it) is applied to the samples and
//! compared with the untransformed samples.
//!
//! The comparison has to tolerate the transform re-ordering the stroke:
//! reflecting an open V-shape across its axis maps the first sample onto
//! the last. Open strokes are therefore compared in direct and reversed
//! order. Closed loops have no natural start, so they are compared under
//! every cyclic shift in both directions.
//!
//! The mismatch of a candidate is the RMS distance between corresponding
//! samples divided by the bounding diameter of the samples. A candidate
//! passes when that ratio is at most
//! [`symmetry_tolerance`](AnalysisConfig::symmetry_tolerance).
//!
//! Reflection axes are swept on a grid of
//! [`axis_steps`](AnalysisConfig::axis_steps) angles and the best one is
//! refined by golden-section search within one grid step, so an axis
//! between grid angles is still found. Each rotational order `n` resamples
//! the stroke to a multiple of `n` points, which makes a rotation by
//! `360° / n` of an `n`-fold loop an exact cyclic shift of the samples.

use std::f64::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

use crate::geometry;
use crate::types::{AnalysisConfig, AnalysisError, Point, Polyline};

/// Which symmetries a stroke has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymmetryKind {
    /// No candidate passed.
    None,
    /// Mirror symmetry across an axis.
    Reflective,
    /// Symmetry under rotation by `360° / n`.
    Rotational,
    /// Both reflective and rotational.
    Both,
}

impl std::fmt::Display for SymmetryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Reflective => f.write_str("reflective"),
            Self::Rotational => f.write_str("rotational"),
            Self::Both => f.write_str("both"),
        }
    }
}

/// An accepted mirror axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReflectiveSymmetry {
    /// Axis direction in radians from the positive x axis, in `[0, π)`.
    /// The axis passes through [`SymmetryReport::centroid`].
    pub axis_angle: f64,
    /// `1 − mismatch`, in `[0, 1]`.
    pub score: f64,
}

/// An accepted rotational order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotationalSymmetry {
    /// Order `n`: the stroke maps onto itself under rotation by `360° / n`.
    pub order: usize,
    /// `1 − mismatch`, in `[0, 1]`.
    pub score: f64,
}

/// Result of [`detect_symmetry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymmetryReport {
    /// Which symmetries passed.
    pub kind: SymmetryKind,
    /// Best mirror axis, when it passed.
    pub reflective: Option<ReflectiveSymmetry>,
    /// Detected rotational order, when any passed.
    pub rotational: Option<RotationalSymmetry>,
    /// Center of the resampled stroke; every axis and rotation uses it.
    pub centroid: Point,
    /// Best passing score, or the best candidate score when nothing
    /// passed, so callers can apply their own threshold.
    pub score: f64,
    /// Whether the stroke was compared as a closed loop.
    pub closed: bool,
}

/// Whether a stroke should be treated as a closed loop: its endpoints are
/// no further apart than `closure_factor` mean segment lengths.
///
/// Strokes with fewer than three points are never closed.
#[must_use]
pub fn is_closed_loop(points: &[Point], closure_factor: f64) -> bool {
    let (Some(&first), Some(&last)) = (points.first(), points.last()) else {
        return false;
    };
    if points.len() < 3 {
        return false;
    }
    geometry::mean(&geometry::segment_lengths(points))
        .is_some_and(|spacing| first.distance(last) <= closure_factor * spacing)
}

/// RMS distance between `candidate[i]` and `reference[σ(i)]`, minimized
/// over the correspondences `σ` allowed for the stroke's topology.
fn mismatch(reference: &[Point], candidate: &[Point], closed: bool) -> f64 {
    let n = reference.len();
    let rms = |sum: f64| {
        #[allow(clippy::cast_precision_loss)]
        let count = n as f64;
        (sum / count).sqrt()
    };
    let sum_with = |map: &dyn Fn(usize) -> usize, limit: f64| {
        let mut sum = 0.0;
        for (i, &c) in candidate.iter().enumerate() {
            sum += c.distance_squared(reference[map(i)]);
            if sum >= limit {
                break;
            }
        }
        sum
    };

    let mut best = f64::INFINITY;
    if closed {
        for shift in 0..n {
            best = best.min(sum_with(&|i| (i + shift) % n, best));
            best = best.min(sum_with(&|i| (shift + n - i) % n, best));
        }
    } else {
        best = best.min(sum_with(&|i| i, best));
        best = best.min(sum_with(&|i| n - 1 - i, best));
    }
    rms(best)
}

/// Golden-section evaluations spent refining the best grid axis.
const AXIS_REFINE_EVALS: usize = 60;

/// Mismatch difference below which two rotational orders count as tied.
const ORDER_TIE: f64 = 1e-9;

/// Normalized mismatch of the stroke against itself rotated by
/// `360° / order`, sampled at the first multiple of `order` that is at
/// least `count`.
fn rotation_mismatch(
    points: &[Point],
    order: usize,
    count: usize,
    closed: bool,
) -> Result<f64, AnalysisError> {
    let samples = geometry::resample(points, order * count.div_ceil(order), closed)?;
    let center = geometry::centroid(&samples)?;
    #[allow(clippy::cast_precision_loss)]
    let angle = TAU / order as f64;
    let rotated: Vec<Point> = samples
        .iter()
        .map(|&p| p.rotate_about(center, angle))
        .collect();
    Ok(mismatch(&samples, &rotated, closed) / geometry::bounding_diameter(&samples))
}

/// Pick the rotational order from per-order mismatches (indexed by order).
///
/// An order is eligible when it and every proper divisor above 1 pass;
/// an `n`-fold shape is also `d`-fold for each divisor `d`. Among eligible
/// orders the lowest mismatch wins, and near-ties go to the larger order.
fn select_order(mismatches: &[f64], tolerance: f64) -> Option<usize> {
    let passes = |n: usize| mismatches.get(n).is_some_and(|&m| m <= tolerance);
    let mut best: Option<usize> = None;
    for n in 2..mismatches.len() {
        let eligible = passes(n) && (2..n).filter(|d| n % d == 0).all(passes);
        if eligible && best.is_none_or(|b| mismatches[n] <= mismatches[b] + ORDER_TIE) {
            best = Some(n);
        }
    }
    best
}

fn score_of(normalized: f64) -> f64 {
    (1.0 - normalized).clamp(0.0, 1.0)
}

/// Detect reflective and rotational symmetry of a stroke.
///
/// Rotational order is chosen among the passing `n` in
/// `2..=max_rotation_order` whose proper divisors also pass, preferring
/// the lowest mismatch and then the larger `n`: a square passes both
/// `n = 2` and `n = 4` and is reported as order 4.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidInput`] for fewer than two points or a
/// stroke with zero length.
///
/// # Examples
///
/// ```
/// use strokefit_pipeline::{AnalysisConfig, Point, Polyline};
/// use strokefit_pipeline::symmetry::{detect_symmetry, SymmetryKind};
///
/// let square = Polyline::new(vec![
///     Point::new(0.0, 0.0),
///     Point::new(1.0, 0.0),
///     Point::new(1.0, 1.0),
///     Point::new(0.0, 1.0),
/// ]);
/// let report = detect_symmetry(&square, &AnalysisConfig::default()).unwrap();
/// assert_eq!(report.kind, SymmetryKind::Both);
/// assert_eq!(report.rotational.unwrap().order, 4);
/// ```
pub fn detect_symmetry(
    polyline: &Polyline,
    config: &AnalysisConfig,
) -> Result<SymmetryReport, AnalysisError> {
    let points = polyline.points();
    let closed = is_closed_loop(points, config.closure_factor);
    let samples = geometry::resample(points, config.resample_count, closed)?;
    let centroid = geometry::centroid(&samples)?;
    let scale = geometry::bounding_diameter(&samples);
    if !(scale > 0.0 && scale.is_finite()) {
        return Err(AnalysisError::InvalidInput(
            "stroke has no spatial extent".to_string(),
        ));
    }

    let mut transformed = Vec::with_capacity(samples.len());
    let mut normalized_mismatch = |transform: &dyn Fn(Point) -> Point| {
        transformed.clear();
        transformed.extend(samples.iter().map(|&p| transform(p)));
        mismatch(&samples, &transformed, closed) / scale
    };

    #[allow(clippy::cast_precision_loss)]
    let step = PI / config.axis_steps as f64;
    #[allow(clippy::cast_precision_loss)]
    let (grid_angle, grid_mismatch) = (0..config.axis_steps)
        .map(|k| {
            let angle = step * k as f64;
            (angle, normalized_mismatch(&|p| p.reflect_across(centroid, angle)))
        })
        .fold((0.0, f64::INFINITY), |best, candidate| {
            if candidate.1 < best.1 { candidate } else { best }
        });
    let (refined_angle, refined_mismatch) = geometry::golden_section_minimize(
        |angle| normalized_mismatch(&|p| p.reflect_across(centroid, angle)),
        grid_angle - step,
        grid_angle + step,
        AXIS_REFINE_EVALS,
    );
    let (axis_angle, axis_mismatch) = if refined_mismatch < grid_mismatch {
        (refined_angle.rem_euclid(PI), refined_mismatch)
    } else {
        (grid_angle, grid_mismatch)
    };
    tracing::trace!(axis_angle, axis_mismatch, closed, "best reflection axis");

    let mut rotation_mismatches = vec![f64::INFINITY; config.max_rotation_order + 1];
    for order in 2..=config.max_rotation_order {
        let m = rotation_mismatch(points, order, config.resample_count, closed)?;
        tracing::trace!(order, mismatch = m, "rotation candidate");
        rotation_mismatches[order] = m;
    }
    let best_rotation = rotation_mismatches.iter().copied().fold(f64::INFINITY, f64::min);
    let rotational = select_order(&rotation_mismatches, config.symmetry_tolerance).map(|order| {
        RotationalSymmetry {
            order,
            score: score_of(rotation_mismatches[order]),
        }
    });

    let reflective = (axis_mismatch <= config.symmetry_tolerance).then(|| ReflectiveSymmetry {
        axis_angle,
        score: score_of(axis_mismatch),
    });

    let kind = match (reflective.is_some(), rotational.is_some()) {
        (true, true) => SymmetryKind::Both,
        (true, false) => SymmetryKind::Reflective,
        (false, true) => SymmetryKind::Rotational,
        (false, false) => SymmetryKind::None,
    };

    let passing = reflective
        .map(|r| r.score)
        .into_iter()
        .chain(rotational.map(|r| r.score))
        .reduce(f64::max);
    let score = passing.unwrap_or_else(|| score_of(axis_mismatch.min(best_rotation)));

    Ok(SymmetryReport {
        kind,
        reflective,
        rotational,
        centroid,
        score,
        closed,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    fn regular_polygon(n: usize, radius: f64, phase: f64, center: Point) -> Polyline {
        (0..n)
            .map(|k| {
                #[allow(clippy::cast_precision_loss)]
                let t = phase + TAU * k as f64 / n as f64;
                Point::new(
                    radius.mul_add(t.cos(), center.x),
                    radius.mul_add(t.sin(), center.y),
                )
            })
            .collect()
    }

    fn detect(polyline: &Polyline) -> SymmetryReport {
        detect_symmetry(polyline, &AnalysisConfig::default()).unwrap()
    }

    /// Angular distance between two axis directions, modulo π.
    fn axis_error(a: f64, b: f64) -> f64 {
        let d = (a - b).rem_euclid(PI);
        d.min(PI - d)
    }

    #[test]
    fn regular_polygons_report_their_order() {
        // 9, 10 and 11 do not divide the default resample count, and each is
        // close to passing as the next order up.
        for n in 3..=12 {
            let polygon = regular_polygon(n, 1.0, 0.3, Point::new(5.0, 2.0));
            let report = detect(&polygon);
            assert!(report.closed, "{n}-gon should be a closed loop");
            assert!(report.rotational.is_some(), "{n}-gon: {report:?}");
            let rotational = report.rotational.unwrap();
            assert_eq!(rotational.order, n, "{n}-gon: {report:?}");
            assert!(rotational.score > 0.99, "{n}-gon score {}", rotational.score);
            assert_eq!(report.kind, SymmetryKind::Both, "{n}-gon: {report:?}");
        }
    }

    #[test]
    fn polygon_centroid_is_its_center() {
        let report = detect(&regular_polygon(5, 2.0, 0.0, Point::new(-3.0, 7.0)));
        assert!(report.centroid.distance(Point::new(-3.0, 7.0)) < 1e-9);
    }

    #[test]
    fn parabola_mirrors_about_vertical_axis() {
        let parabola: Polyline = (-20..=20)
            .map(|i| {
                let x = f64::from(i) / 10.0;
                Point::new(x, x * x)
            })
            .collect();
        let report = detect(&parabola);
        assert!(!report.closed);
        assert_eq!(report.kind, SymmetryKind::Reflective, "{report:?}");
        let axis = report.reflective.unwrap();
        assert!(axis_error(axis.axis_angle, FRAC_PI_2) < 1e-9, "axis {}", axis.axis_angle);
        assert!(axis.score > 0.999);
    }

    /// Kite outline with its mirror axis at `tilt`, starting on the axis.
    fn kite(tilt: f64) -> Polyline {
        let corners: Vec<Point> = [(2.0, 0.0), (0.0, 0.6), (-1.0, 0.0), (0.0, -0.6)]
            .iter()
            .map(|&(x, y)| Point::new(x, y).rotate_about(Point::ORIGIN, tilt))
            .collect();
        (0..4)
            .flat_map(|i| {
                let (a, b) = (corners[i], corners[(i + 1) % 4]);
                (0..10).map(move |k| a.lerp(b, f64::from(k) / 10.0))
            })
            .collect()
    }

    #[test]
    fn kite_axis_is_found_at_its_tilt() {
        let tilt = 30.0_f64.to_radians();
        let report = detect(&kite(tilt));
        assert!(report.closed);
        assert_eq!(report.kind, SymmetryKind::Reflective, "{report:?}");
        let axis = report.reflective.unwrap();
        assert!(axis_error(axis.axis_angle, tilt) < 1e-6, "axis {}", axis.axis_angle);
    }

    #[test]
    fn kite_axis_between_grid_angles_is_refined() {
        for degrees in [30.5, 47.3, 12.7, 179.6] {
            let tilt = f64::to_radians(degrees);
            let report = detect(&kite(tilt));
            assert_eq!(report.kind, SymmetryKind::Reflective, "{degrees}°: {report:?}");
            let axis = report.reflective.unwrap();
            assert!(
                axis_error(axis.axis_angle, tilt) < 1e-6,
                "{degrees}°: axis {}",
                axis.axis_angle.to_degrees()
            );
            assert!((0.0..PI).contains(&axis.axis_angle));
            assert!(axis.score > 0.999, "{degrees}°: score {}", axis.score);
        }
    }

    #[test]
    fn order_needs_its_divisors_and_the_lowest_mismatch() {
        let tol = 0.005;
        let mut m = vec![f64::INFINITY; 13];
        // True 9-fold shape: 3 and 9 exact, 10 near-passing but 2 and 5 fail.
        m[3] = 0.0;
        m[9] = 0.0;
        m[10] = 0.0046;
        m[11] = 0.004;
        assert_eq!(select_order(&m, tol), Some(9));

        // Every order passes exactly: the largest wins the tie.
        let exact = vec![0.0; 9];
        assert_eq!(select_order(&exact, tol), Some(8));

        assert_eq!(select_order(&[f64::INFINITY; 6], tol), None);
    }

    #[test]
    fn s_curve_has_half_turn_symmetry() {
        let s_curve: Polyline = (-15..=15)
            .map(|i| {
                let x = f64::from(i) / 10.0;
                Point::new(x, x.powi(3) - x)
            })
            .collect();
        let report = detect(&s_curve);
        assert_eq!(report.kind, SymmetryKind::Rotational, "{report:?}");
        assert_eq!(report.rotational.unwrap().order, 2);
        assert!(report.reflective.is_none());
    }

    #[test]
    fn spiral_has_no_symmetry_but_reports_best_score() {
        let spiral: Polyline = (0..50)
            .map(|i| {
                let t = f64::from(i) / 10.0;
                let r = 0.3f64.mul_add(t, 1.0);
                Point::new(r * t.cos(), r * t.sin())
            })
            .collect();
        let report = detect(&spiral);
        assert_eq!(report.kind, SymmetryKind::None);
        assert!(report.reflective.is_none());
        assert!(report.rotational.is_none());
        assert!(report.score > 0.0 && report.score < 0.995, "score {}", report.score);
    }

    #[test]
    fn closure_detection() {
        let open = [Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(2.0, 0.0)];
        assert!(!is_closed_loop(&open, 1.5));
        let triangle = [Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.5, 0.8)];
        assert!(is_closed_loop(&triangle, 1.5));
        assert!(!is_closed_loop(&triangle[..2], 1.5));
        assert!(!is_closed_loop(&[], 1.5));
    }

    #[test]
    fn degenerate_strokes_are_invalid_input() {
        let single = Polyline::new(vec![Point::new(1.0, 1.0)]);
        assert!(matches!(
            detect_symmetry(&single, &AnalysisConfig::default()),
            Err(AnalysisError::InvalidInput(_))
        ));
        let stacked = Polyline::new(vec![Point::new(1.0, 1.0); 5]);
        assert!(matches!(
            detect_symmetry(&stacked, &AnalysisConfig::default()),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn detection_is_idempotent() {
        let polygon = regular_polygon(6, 3.0, 0.1, Point::ORIGIN);
        assert_eq!(detect(&polygon), detect(&polygon));
    }
}
