//! Shared types for the strokefit analysis pipeline.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::completion::OcclusionKind;

/// A 2D point in drawing coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl Point {
    /// The origin `(0, 0)`.
    pub const ORIGIN: Self = Self::new(0.0, 0.0);

    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Dot product, treating both points as vectors from the origin.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x.mul_add(other.x, self.y * other.y)
    }

    /// Z component of the 2D cross product `self × other`.
    ///
    /// Positive when `other` lies counter-clockwise of `self`.
    #[must_use]
    pub fn cross(self, other: Self) -> f64 {
        self.x.mul_add(other.y, -(self.y * other.x))
    }

    /// Length of the vector from the origin to this point.
    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a zero vector.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        (len > 0.0 && len.is_finite()).then(|| Self::new(self.x / len, self.y / len))
    }

    /// Linear interpolation: `t = 0` yields `self`, `t = 1` yields `other`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            t.mul_add(other.x - self.x, self.x),
            t.mul_add(other.y - self.y, self.y),
        )
    }

    /// Rotate counter-clockwise by `angle` radians about `center`.
    #[must_use]
    pub fn rotate_about(self, center: Self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        let d = self - center;
        Self::new(
            d.x.mul_add(cos, -(d.y * sin)) + center.x,
            d.x.mul_add(sin, d.y * cos) + center.y,
        )
    }

    /// Mirror across the line through `center` at `axis_angle` radians
    /// from the positive x axis.
    #[must_use]
    pub fn reflect_across(self, center: Self, axis_angle: f64) -> Self {
        let (sin2, cos2) = (2.0 * axis_angle).sin_cos();
        let d = self - center;
        Self::new(
            d.x.mul_add(cos2, d.y * sin2) + center.x,
            d.x.mul_add(sin2, -(d.y * cos2)) + center.y,
        )
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl From<Point> for geo::Coord<f64> {
    fn from(p: Point) -> Self {
        Self { x: p.x, y: p.y }
    }
}

/// An ordered sequence of points forming one continuous stroke fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

impl FromIterator<Point> for Polyline {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One logical stroke: an ordered sequence of polylines.
///
/// A stroke may be split into several disjoint fragments, for example
/// where another object occludes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Path(Vec<Polyline>);

impl Path {
    /// Create a new path from its polylines.
    #[must_use]
    pub const fn new(polylines: Vec<Polyline>) -> Self {
        Self(polylines)
    }

    /// Returns `true` if the path has no polylines.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of polylines in the path.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all polylines.
    #[must_use]
    pub fn polylines(&self) -> &[Polyline] {
        &self.0
    }
}

/// Axis-aligned bounds of a drawing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Smallest x coordinate.
    pub min_x: f64,
    /// Smallest y coordinate.
    pub min_y: f64,
    /// Extent along x.
    pub width: f64,
    /// Extent along y.
    pub height: f64,
}

/// The top-level unit handed to the pipeline: an ordered sequence of paths.
///
/// The pipeline never mutates a drawing; every analysis produces new
/// values owned by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Drawing(Vec<Path>);

impl Drawing {
    /// Create a new drawing from its paths.
    #[must_use]
    pub const fn new(paths: Vec<Path>) -> Self {
        Self(paths)
    }

    /// Returns `true` if the drawing has no paths.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of paths in the drawing.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all paths.
    #[must_use]
    pub fn paths(&self) -> &[Path] {
        &self.0
    }

    /// Iterate over every polyline with its `(path_index, polyline_index)`.
    pub fn polylines(&self) -> impl Iterator<Item = (usize, usize, &Polyline)> {
        self.0.iter().enumerate().flat_map(|(path_idx, path)| {
            path.polylines()
                .iter()
                .enumerate()
                .map(move |(poly_idx, polyline)| (path_idx, poly_idx, polyline))
        })
    }

    /// Total number of polylines across all paths.
    #[must_use]
    pub fn polyline_count(&self) -> usize {
        self.0.iter().map(Path::len).sum()
    }

    /// Total number of points across all polylines.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.polylines().map(|(_, _, pl)| pl.len()).sum()
    }

    /// Axis-aligned bounds of every point, or `None` for a drawing
    /// without points.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        use geo::BoundingRect;

        let coords: Vec<geo::Coord<f64>> = self
            .polylines()
            .flat_map(|(_, _, pl)| pl.points().iter().copied().map(geo::Coord::from))
            .collect();
        let rect = geo::LineString::new(coords).bounding_rect()?;
        Some(Bounds {
            min_x: rect.min().x,
            min_y: rect.min().y,
            width: rect.width(),
            height: rect.height(),
        })
    }
}

/// Configuration for the analysis pipeline.
///
/// All parameters have defaults exposed as `DEFAULT_*` associated
/// constants so front ends can reuse them (e.g. as CLI flag defaults).
/// Call [`validate`](Self::validate) before trusting values that came
/// from user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// How much better (as a ratio of normalized residuals) a circle fit
    /// must be than the line fit before the circle is preferred.
    ///
    /// A nearly straight stroke always fits a huge circle slightly better
    /// than a line; this factor keeps such strokes classified as lines.
    pub circle_preference: f64,

    /// Number of arc-length samples used for symmetry correspondence.
    pub resample_count: usize,

    /// Number of candidate reflection axes, evenly spaced over `[0°, 180°)`.
    pub axis_steps: usize,

    /// Largest rotational order tested.
    pub max_rotation_order: usize,

    /// Maximum RMS mismatch, as a fraction of the bounding diameter, for
    /// a symmetry candidate to be accepted.
    pub symmetry_tolerance: f64,

    /// A stroke whose endpoint gap is at most this many mean segment
    /// lengths is compared as a closed loop.
    pub closure_factor: f64,

    /// Occlusion model used by curve completion.
    pub occlusion: OcclusionKind,

    /// A spacing counts as a gap when it exceeds this many median
    /// segment lengths.
    pub gap_ratio: f64,

    /// Minimum visible points required on each side of a gap.
    pub min_side_points: usize,

    /// Number of trailing points used to estimate a fragment's tangent.
    pub tangent_window: usize,

    /// Whether [`analyze_drawing`](crate::analyze_drawing) fans polylines
    /// out over the rayon thread pool.
    pub parallel: bool,
}

impl AnalysisConfig {
    /// Default [`circle_preference`](Self::circle_preference).
    pub const DEFAULT_CIRCLE_PREFERENCE: f64 = 0.5;
    /// Default [`resample_count`](Self::resample_count).
    ///
    /// Divisible by every order up to 6 plus 8, 10 and 12 so the common
    /// rotations land exactly on samples.
    pub const DEFAULT_RESAMPLE_COUNT: usize = 120;
    /// Default [`axis_steps`](Self::axis_steps) (1° resolution).
    pub const DEFAULT_AXIS_STEPS: usize = 180;
    /// Default [`max_rotation_order`](Self::max_rotation_order).
    pub const DEFAULT_MAX_ROTATION_ORDER: usize = 12;
    /// Default [`symmetry_tolerance`](Self::symmetry_tolerance).
    ///
    /// Tight enough that a regular hexagon does not also pass as 12-fold
    /// (its 30° mismatch is about 0.03).
    pub const DEFAULT_SYMMETRY_TOLERANCE: f64 = 0.005;
    /// Default [`closure_factor`](Self::closure_factor).
    pub const DEFAULT_CLOSURE_FACTOR: f64 = 1.5;
    /// Default [`occlusion`](Self::occlusion).
    pub const DEFAULT_OCCLUSION: OcclusionKind = OcclusionKind::Connected;
    /// Default [`gap_ratio`](Self::gap_ratio).
    pub const DEFAULT_GAP_RATIO: f64 = 2.5;
    /// Default [`min_side_points`](Self::min_side_points).
    pub const DEFAULT_MIN_SIDE_POINTS: usize = 3;
    /// Default [`tangent_window`](Self::tangent_window).
    pub const DEFAULT_TANGENT_WINDOW: usize = 3;

    /// Check every parameter against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let invalid = |msg: &str| -> Result<(), AnalysisError> {
            Err(AnalysisError::InvalidConfig(msg.to_string()))
        };

        if !(self.circle_preference > 0.0 && self.circle_preference <= 1.0) {
            return invalid("circle_preference must be in (0, 1]");
        }
        if self.resample_count < 8 {
            return invalid("resample_count must be at least 8");
        }
        if self.axis_steps == 0 {
            return invalid("axis_steps must be positive");
        }
        if self.max_rotation_order < 2 {
            return invalid("max_rotation_order must be at least 2");
        }
        if !(self.symmetry_tolerance > 0.0 && self.symmetry_tolerance < 1.0) {
            return invalid("symmetry_tolerance must be in (0, 1)");
        }
        if !(self.closure_factor >= 0.0 && self.closure_factor.is_finite()) {
            return invalid("closure_factor must be finite and non-negative");
        }
        if !(self.gap_ratio > 1.0 && self.gap_ratio.is_finite()) {
            return invalid("gap_ratio must be finite and greater than 1");
        }
        if self.min_side_points < 2 {
            return invalid("min_side_points must be at least 2");
        }
        if self.tangent_window < 2 {
            return invalid("tangent_window must be at least 2");
        }
        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            circle_preference: Self::DEFAULT_CIRCLE_PREFERENCE,
            resample_count: Self::DEFAULT_RESAMPLE_COUNT,
            axis_steps: Self::DEFAULT_AXIS_STEPS,
            max_rotation_order: Self::DEFAULT_MAX_ROTATION_ORDER,
            symmetry_tolerance: Self::DEFAULT_SYMMETRY_TOLERANCE,
            closure_factor: Self::DEFAULT_CLOSURE_FACTOR,
            occlusion: Self::DEFAULT_OCCLUSION,
            gap_ratio: Self::DEFAULT_GAP_RATIO,
            min_side_points: Self::DEFAULT_MIN_SIDE_POINTS,
            tangent_window: Self::DEFAULT_TANGENT_WINDOW,
            parallel: true,
        }
    }
}

/// Errors produced by a single analysis of a single polyline.
///
/// These are values, not aborts: the pipeline stores them next to the
/// successful results of the other analyses, so they are cloneable and
/// serializable.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum AnalysisError {
    /// The polyline is empty, too short, or has no spatial extent.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The points do not determine the requested primitive
    /// (e.g. a circle through collinear points).
    #[error("degenerate fit: {0}")]
    DegenerateFit(String),

    /// Too few visible points bracket a gap to estimate a reconstruction.
    #[error(
        "insufficient data: need {needed} points on each side of the gap, found {before} before and {after} after"
    )]
    InsufficientData {
        /// Minimum points required on each side.
        needed: usize,
        /// Points available before the gap.
        before: usize,
        /// Points available after the gap.
        after: usize,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_new() {
        let p = Point::new(3.0, 4.0);
        assert!((p.x - 3.0).abs() < f64::EPSILON);
        assert!((p.y - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!(a.distance(a).abs() < f64::EPSILON);
    }

    #[test]
    fn point_vector_ops() {
        let a = Point::new(1.0, 2.0);
        let b = Point::new(3.0, -1.0);
        assert_eq!(a + b, Point::new(4.0, 1.0));
        assert_eq!(a - b, Point::new(-2.0, 3.0));
        assert_eq!(a * 2.0, Point::new(2.0, 4.0));
        assert!((a.dot(b) - 1.0).abs() < f64::EPSILON);
        assert!((a.cross(b) - (-7.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn normalized_zero_vector_is_none() {
        assert!(Point::ORIGIN.normalized().is_none());
        let unit = Point::new(0.0, 5.0).normalized();
        assert_eq!(unit, Some(Point::new(0.0, 1.0)));
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, -4.0);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Point::new(5.0, -2.0));
    }

    #[test]
    fn rotate_quarter_turn() {
        let p = Point::new(2.0, 1.0)
            .rotate_about(Point::new(1.0, 1.0), std::f64::consts::FRAC_PI_2);
        assert!(p.distance(Point::new(1.0, 2.0)) < 1e-12, "got {p:?}");
    }

    #[test]
    fn reflect_across_vertical_axis() {
        let p = Point::new(3.0, 2.0)
            .reflect_across(Point::new(1.0, 0.0), std::f64::consts::FRAC_PI_2);
        assert!(p.distance(Point::new(-1.0, 2.0)) < 1e-12, "got {p:?}");
    }

    #[test]
    fn reflect_across_diagonal_swaps_coordinates() {
        let p = Point::new(3.0, 1.0).reflect_across(Point::ORIGIN, std::f64::consts::FRAC_PI_4);
        assert!(p.distance(Point::new(1.0, 3.0)) < 1e-12, "got {p:?}");
    }

    // --- Polyline / Path / Drawing tests ---

    #[test]
    fn polyline_accessors() {
        let points = vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0), Point::new(5.0, 6.0)];
        let pl = Polyline::new(points.clone());
        assert_eq!(pl.len(), 3);
        assert!(!pl.is_empty());
        assert_eq!(pl.first(), Some(&Point::new(1.0, 2.0)));
        assert_eq!(pl.last(), Some(&Point::new(5.0, 6.0)));
        assert_eq!(pl.points(), points.as_slice());
        assert_eq!(pl.into_points(), points);
    }

    #[test]
    fn polyline_empty() {
        let pl = Polyline::new(vec![]);
        assert!(pl.is_empty());
        assert!(pl.first().is_none());
        assert!(pl.last().is_none());
    }

    #[test]
    fn drawing_polylines_carry_indices() {
        let a = Polyline::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)]);
        let b = Polyline::new(vec![Point::new(0.0, 1.0), Point::new(1.0, 1.0)]);
        let c = Polyline::new(vec![Point::new(5.0, 5.0)]);
        let drawing = Drawing::new(vec![Path::new(vec![a, b]), Path::new(vec![c])]);

        let indices: Vec<(usize, usize)> = drawing.polylines().map(|(p, q, _)| (p, q)).collect();
        assert_eq!(indices, vec![(0, 0), (0, 1), (1, 0)]);
        assert_eq!(drawing.polyline_count(), 3);
        assert_eq!(drawing.point_count(), 5);
    }

    #[test]
    fn drawing_bounds() {
        let drawing = Drawing::new(vec![Path::new(vec![Polyline::new(vec![
            Point::new(-1.0, 2.0),
            Point::new(3.0, 7.0),
            Point::new(0.0, 4.0),
        ])])]);
        let bounds = drawing.bounds();
        assert_eq!(
            bounds,
            Some(Bounds {
                min_x: -1.0,
                min_y: 2.0,
                width: 4.0,
                height: 5.0,
            })
        );
    }

    #[test]
    fn empty_drawing_has_no_bounds() {
        assert!(Drawing::default().bounds().is_none());
    }

    // --- AnalysisConfig tests ---

    #[test]
    fn default_config_is_valid() {
        assert_eq!(AnalysisConfig::default().validate(), Ok(()));
    }

    #[test]
    fn config_rejects_bad_gap_ratio() {
        let config = AnalysisConfig {
            gap_ratio: 0.5,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::InvalidConfig(msg)) if msg.contains("gap_ratio")
        ));
    }

    #[test]
    fn config_rejects_tiny_resample_count() {
        let config = AnalysisConfig {
            resample_count: 3,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_json_round_trip_fills_missing_fields() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"gap_ratio": 4.0}"#).unwrap();
        assert!((config.gap_ratio - 4.0).abs() < f64::EPSILON);
        assert_eq!(config.resample_count, AnalysisConfig::DEFAULT_RESAMPLE_COUNT);
    }

    #[test]
    fn error_messages_name_the_kind() {
        let err = AnalysisError::InsufficientData {
            needed: 3,
            before: 2,
            after: 9,
        };
        let msg = err.to_string();
        assert!(msg.contains("insufficient data"), "{msg}");
        assert!(msg.contains("found 2 before and 9 after"), "{msg}");
    }
}
