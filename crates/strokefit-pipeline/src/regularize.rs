//! Shape regularization: fit a straight line and a circle to a stroke.
//!
//! Both fits report a residual so callers can decide which primitive
//! describes a stroke better. [`regularize`] runs both and records the
//! winner by normalized residual (residual per point over the squared
//! bounding diameter), which makes the comparison scale-invariant.
//!
//! # Line fit
//!
//! Ordinary least squares on `y = m·x + c`. Strokes whose x-variance is
//! negligible next to their total variance are reported as
//! [`LineForm::Vertical`] instead of an unbounded slope. The residual is
//! the sum of squared *perpendicular* distances so it does not depend on
//! the stroke's orientation.
//!
//! # Circle fit
//!
//! Kåsa algebraic fit: minimize `Σ(x² + y² + D·x + E·y + F)²`, a single
//! 3×3 linear solve. Points are shifted to their centroid and scaled to
//! unit RMS radius before building the normal equations. Near-collinear
//! input is rejected with [`AnalysisError::DegenerateFit`] by two checks:
//! the eigenvalue ratio of the point covariance, and the condition number
//! of the normal matrix.

use nalgebra::{Matrix2, Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry;
use crate::types::{AnalysisConfig, AnalysisError, Point, Polyline};

/// Relative x-variance below which a line is reported as vertical.
pub const VERTICAL_TOLERANCE: f64 = 1e-10;

/// Covariance eigenvalue ratio (minor / major) below which the points
/// are considered collinear for circle fitting.
pub const COLLINEARITY_TOLERANCE: f64 = 1e-9;

/// Largest acceptable condition number of the circle normal equations.
pub const CONDITION_LIMIT: f64 = 1e12;

/// Largest accepted ratio of fitted radius to the stroke's bounding
/// diameter. A circular arc reaches this ratio at a sweep of about 5.7°;
/// flatter strokes are treated as collinear.
pub const MAX_RADIUS_RATIO: f64 = 10.0;

/// Representation of a fitted straight line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LineForm {
    /// `y = slope · x + intercept`.
    SlopeIntercept {
        /// Rise over run.
        slope: f64,
        /// Value of `y` at `x = 0`.
        intercept: f64,
    },
    /// `x = constant`; slope-intercept form is undefined.
    Vertical {
        /// The constant x coordinate.
        x: f64,
    },
}

/// Best-fit straight line through a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedLine {
    /// The line itself.
    pub form: LineForm,
    /// Sum of squared perpendicular distances from the points to the line.
    pub residual: f64,
}

impl FittedLine {
    /// Slope, or `None` for a vertical line.
    #[must_use]
    pub const fn slope(&self) -> Option<f64> {
        match self.form {
            LineForm::SlopeIntercept { slope, .. } => Some(slope),
            LineForm::Vertical { .. } => None,
        }
    }

    /// Intercept, or `None` for a vertical line.
    #[must_use]
    pub const fn intercept(&self) -> Option<f64> {
        match self.form {
            LineForm::SlopeIntercept { intercept, .. } => Some(intercept),
            LineForm::Vertical { .. } => None,
        }
    }

    /// Whether the line was reported in constant-x form.
    #[must_use]
    pub const fn is_vertical(&self) -> bool {
        matches!(self.form, LineForm::Vertical { .. })
    }

    /// A point on the line.
    #[must_use]
    pub const fn anchor(&self) -> Point {
        match self.form {
            LineForm::SlopeIntercept { intercept, .. } => Point::new(0.0, intercept),
            LineForm::Vertical { x } => Point::new(x, 0.0),
        }
    }

    /// Unit direction vector of the line.
    #[must_use]
    pub fn direction(&self) -> Point {
        match self.form {
            LineForm::SlopeIntercept { slope, .. } => {
                let norm = slope.hypot(1.0);
                Point::new(1.0 / norm, slope / norm)
            }
            LineForm::Vertical { .. } => Point::new(0.0, 1.0),
        }
    }

    /// Perpendicular distance from `p` to the line.
    #[must_use]
    pub fn distance_to(&self, p: Point) -> f64 {
        let a = self.anchor();
        geometry::perpendicular_distance(p, a, a + self.direction())
    }

    /// Orthogonal projection of `p` onto the line.
    #[must_use]
    pub fn project(&self, p: Point) -> Point {
        let a = self.anchor();
        let dir = self.direction();
        a + dir * (p - a).dot(dir)
    }
}

/// Best-fit circle through a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedCircle {
    /// Circle center.
    pub center: Point,
    /// Circle radius; never negative.
    pub radius: f64,
    /// Mean squared difference between each point's distance to the
    /// center and the radius.
    pub residual: f64,
}

impl FittedCircle {
    /// Point on the circle at `angle` radians from the positive x axis.
    #[must_use]
    pub fn point_at(&self, angle: f64) -> Point {
        let (sin, cos) = angle.sin_cos();
        Point::new(
            self.radius.mul_add(cos, self.center.x),
            self.radius.mul_add(sin, self.center.y),
        )
    }

    /// Polar angle of `p` around the center, in `(-π, π]`.
    #[must_use]
    pub fn angle_of(&self, p: Point) -> f64 {
        (p.y - self.center.y).atan2(p.x - self.center.x)
    }

    /// Radial distance from `p` to the circle.
    #[must_use]
    pub fn distance_to(&self, p: Point) -> f64 {
        (p.distance(self.center) - self.radius).abs()
    }
}

/// Which primitive describes a stroke better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    /// A straight line.
    Line,
    /// A circle or circular arc.
    Circle,
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Line => f.write_str("line"),
            Self::Circle => f.write_str("circle"),
        }
    }
}

/// A fitted primitive of either kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    /// A fitted line.
    Line(FittedLine),
    /// A fitted circle.
    Circle(FittedCircle),
}

impl Primitive {
    /// The kind of this primitive.
    #[must_use]
    pub const fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Line(_) => PrimitiveKind::Line,
            Self::Circle(_) => PrimitiveKind::Circle,
        }
    }
}

/// Both fits for one stroke plus the preferred primitive.
///
/// Each fit is kept as a result-or-error so a degenerate circle does not
/// hide a perfectly good line (and vice versa).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regularization {
    /// Least-squares line fit.
    pub line: Result<FittedLine, AnalysisError>,
    /// Algebraic circle fit.
    pub circle: Result<FittedCircle, AnalysisError>,
    /// Line residual per point over the squared bounding diameter.
    pub line_score: Option<f64>,
    /// Circle residual over the squared bounding diameter.
    pub circle_score: Option<f64>,
    /// The primitive with the lower normalized residual, if any fit
    /// succeeded.
    pub best: Option<PrimitiveKind>,
}

impl Regularization {
    /// The preferred fitted primitive, if any.
    #[must_use]
    pub fn best_primitive(&self) -> Option<Primitive> {
        match self.best? {
            PrimitiveKind::Line => self.line.as_ref().ok().copied().map(Primitive::Line),
            PrimitiveKind::Circle => self.circle.as_ref().ok().copied().map(Primitive::Circle),
        }
    }

    /// The error that explains why no primitive is available.
    ///
    /// Prefers the line error, since a failed line fit means the input
    /// itself is unusable.
    #[must_use]
    pub fn failure(&self) -> Option<AnalysisError> {
        if self.best.is_some() {
            return None;
        }
        self.line
            .as_ref()
            .err()
            .or_else(|| self.circle.as_ref().err())
            .cloned()
    }
}

/// Running sums of centered second moments.
struct Moments {
    centroid: Point,
    sxx: f64,
    syy: f64,
    sxy: f64,
}

impl Moments {
    fn of(points: &[Point]) -> Result<Self, AnalysisError> {
        let centroid = geometry::centroid(points)?;
        let (sxx, syy, sxy) = points.iter().fold((0.0, 0.0, 0.0), |(sxx, syy, sxy), &p| {
            let d = p - centroid;
            (d.x.mul_add(d.x, sxx), d.y.mul_add(d.y, syy), d.x.mul_add(d.y, sxy))
        });
        Ok(Self {
            centroid,
            sxx,
            syy,
            sxy,
        })
    }

    fn total(&self) -> f64 {
        self.sxx + self.syy
    }
}

fn require_points(polyline: &Polyline, needed: usize, what: &str) -> Result<(), AnalysisError> {
    if polyline.len() < needed {
        return Err(AnalysisError::InvalidInput(format!(
            "{what} needs at least {needed} points, got {}",
            polyline.len()
        )));
    }
    Ok(())
}

/// Fit a straight line by ordinary least squares.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidInput`] for fewer than two points or
/// when every point coincides.
///
/// # Examples
///
/// ```
/// use strokefit_pipeline::{Point, Polyline};
/// use strokefit_pipeline::regularize::fit_line;
///
/// let stroke = Polyline::new(vec![
///     Point::new(0.0, 1.0),
///     Point::new(1.0, 3.0),
///     Point::new(2.0, 5.0),
/// ]);
/// let line = fit_line(&stroke).unwrap();
/// assert!((line.slope().unwrap() - 2.0).abs() < 1e-12);
/// assert!((line.intercept().unwrap() - 1.0).abs() < 1e-12);
/// ```
pub fn fit_line(polyline: &Polyline) -> Result<FittedLine, AnalysisError> {
    require_points(polyline, 2, "line fit")?;
    let points = polyline.points();
    let m = Moments::of(points)?;

    if !(m.total() > 0.0 && m.total().is_finite()) {
        return Err(AnalysisError::InvalidInput(
            "all points coincide; no line is defined".to_string(),
        ));
    }

    let form = if m.sxx <= VERTICAL_TOLERANCE * m.total() {
        LineForm::Vertical { x: m.centroid.x }
    } else {
        let slope = m.sxy / m.sxx;
        LineForm::SlopeIntercept {
            slope,
            intercept: slope.mul_add(-m.centroid.x, m.centroid.y),
        }
    };

    let mut line = FittedLine {
        form,
        residual: 0.0,
    };
    line.residual = geometry::sum_squared_residuals(points, |p| line.distance_to(p))?;
    Ok(line)
}

/// Fit a circle with the Kåsa algebraic method.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidInput`] for fewer than two points or
/// coincident points, and [`AnalysisError::DegenerateFit`] when the points
/// are (near-)collinear, including the two-point case.
///
/// # Examples
///
/// ```
/// use strokefit_pipeline::{AnalysisError, Point, Polyline};
/// use strokefit_pipeline::regularize::fit_circle;
///
/// let arc = Polyline::new(vec![
///     Point::new(2.0, 0.0),
///     Point::new(0.0, 2.0),
///     Point::new(-2.0, 0.0),
/// ]);
/// let circle = fit_circle(&arc).unwrap();
/// assert!((circle.radius - 2.0).abs() < 1e-9);
///
/// let straight = Polyline::new(vec![
///     Point::new(0.0, 0.0),
///     Point::new(1.0, 1.0),
///     Point::new(2.0, 2.0),
/// ]);
/// assert!(matches!(fit_circle(&straight), Err(AnalysisError::DegenerateFit(_))));
/// ```
pub fn fit_circle(polyline: &Polyline) -> Result<FittedCircle, AnalysisError> {
    require_points(polyline, 2, "circle fit")?;
    let points = polyline.points();
    let m = Moments::of(points)?;
    let total = m.total();

    if !(total > 0.0 && total.is_finite()) {
        return Err(AnalysisError::InvalidInput(
            "all points coincide; no circle is defined".to_string(),
        ));
    }
    if points.len() < 3 {
        return Err(AnalysisError::DegenerateFit(
            "a circle needs at least 3 non-collinear points".to_string(),
        ));
    }

    let eigen = Matrix2::new(m.sxx, m.sxy, m.sxy, m.syy).symmetric_eigenvalues();
    let (minor, major) = (eigen.min(), eigen.max());
    if minor <= COLLINEARITY_TOLERANCE * major {
        return Err(AnalysisError::DegenerateFit(format!(
            "points are collinear (covariance ratio {:.3e})",
            minor / major
        )));
    }

    // Centered, unit-RMS coordinates keep the normal matrix well scaled.
    #[allow(clippy::cast_precision_loss)]
    let scale = (points.len() as f64 / total).sqrt();
    let mut normal = Matrix3::<f64>::zeros();
    let mut rhs = Vector3::<f64>::zeros();
    for &p in points {
        let u = (p.x - m.centroid.x) * scale;
        let v = (p.y - m.centroid.y) * scale;
        let row = Vector3::new(u, v, 1.0);
        normal += row * row.transpose();
        rhs -= row * u.mul_add(u, v * v);
    }

    let singular = normal.singular_values();
    let condition = singular.max() / singular.min();
    if !(condition.is_finite() && condition <= CONDITION_LIMIT) {
        return Err(AnalysisError::DegenerateFit(format!(
            "circle normal equations are ill-conditioned (condition number {condition:.3e})"
        )));
    }

    let Some(solution) = normal.lu().solve(&rhs) else {
        tracing::warn!(condition, "circle normal equations passed conditioning but LU failed");
        return Err(AnalysisError::DegenerateFit(
            "circle normal equations are singular".to_string(),
        ));
    };
    let (d, e, f) = (solution[0], solution[1], solution[2]);

    let cu = -d / 2.0;
    let cv = -e / 2.0;
    let r_sq = cu.mul_add(cu, cv * cv) - f;
    if !(r_sq >= 0.0 && r_sq.is_finite()) {
        return Err(AnalysisError::DegenerateFit(format!(
            "algebraic fit produced an imaginary radius (r² = {r_sq:.3e})"
        )));
    }

    let center = Point::new(m.centroid.x + cu / scale, m.centroid.y + cv / scale);
    let radius = r_sq.sqrt() / scale;
    let extent = geometry::bounding_diameter(points);
    if radius > MAX_RADIUS_RATIO * extent {
        return Err(AnalysisError::DegenerateFit(format!(
            "points are nearly collinear (radius {radius:.3e} for extent {extent:.3e})"
        )));
    }
    let mut circle = FittedCircle {
        center,
        radius,
        residual: 0.0,
    };
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    circle.residual =
        geometry::sum_squared_residuals(points, |p| p.distance(center) - radius)? / n;
    Ok(circle)
}

/// Fit both primitives and pick the better one.
///
/// The circle wins only when its normalized residual is below
/// `config.circle_preference` times the line's; ties and degenerate
/// circles go to the line.
#[must_use]
pub fn regularize(polyline: &Polyline, config: &AnalysisConfig) -> Regularization {
    let line = fit_line(polyline);
    let circle = fit_circle(polyline);

    let diameter = geometry::bounding_diameter(polyline.points());
    let scale_sq = diameter * diameter;
    #[allow(clippy::cast_precision_loss)]
    let n = polyline.len().max(1) as f64;
    let normalize = |residual: f64| (scale_sq > 0.0).then(|| residual / scale_sq);

    let line_score = line.as_ref().ok().and_then(|l| normalize(l.residual / n));
    let circle_score = circle.as_ref().ok().and_then(|c| normalize(c.residual));

    let best = match (line_score, circle_score) {
        (Some(l), Some(c)) if c < l * config.circle_preference => Some(PrimitiveKind::Circle),
        (Some(_), _) => Some(PrimitiveKind::Line),
        (None, Some(_)) => Some(PrimitiveKind::Circle),
        (None, None) => None,
    };

    if let Err(e) = &circle {
        tracing::trace!(error = %e, "circle fit rejected");
    }

    Regularization {
        line,
        circle,
        line_score,
        circle_score,
        best,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::f64::consts::{PI, TAU};

    use super::*;

    fn on_line(slope: f64, intercept: f64, xs: &[f64]) -> Polyline {
        xs.iter()
            .map(|&x| Point::new(x, slope.mul_add(x, intercept)))
            .collect()
    }

    fn on_circle(center: Point, radius: f64, from: f64, to: f64, count: usize) -> Polyline {
        (0..count)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = from + (to - from) * i as f64 / (count - 1) as f64;
                Point::new(
                    radius.mul_add(t.cos(), center.x),
                    radius.mul_add(t.sin(), center.y),
                )
            })
            .collect()
    }

    // --- fit_line ---

    #[test]
    fn line_recovers_exact_slope_and_intercept() {
        for &(m0, c0) in &[(2.0, -3.0), (-0.5, 10.0), (0.0, 4.0), (37.5, -1200.0)] {
            let stroke = on_line(m0, c0, &[-3.0, -1.0, 0.5, 2.0, 7.0]);
            let line = fit_line(&stroke).unwrap();
            let m = line.slope().unwrap();
            let c = line.intercept().unwrap();
            assert!((m - m0).abs() < 1e-9, "slope {m} != {m0}");
            assert!((c - c0).abs() < 1e-6, "intercept {c} != {c0}");
            assert!(line.residual < 1e-12, "residual {}", line.residual);
        }
    }

    #[test]
    fn line_from_two_points() {
        let stroke = on_line(1.0, 1.0, &[0.0, 4.0]);
        let line = fit_line(&stroke).unwrap();
        assert!((line.slope().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn vertical_line_uses_constant_x_form() {
        let stroke: Polyline = [0.0, 1.0, 2.5, 9.0]
            .iter()
            .map(|&y| Point::new(3.0, y))
            .collect();
        let line = fit_line(&stroke).unwrap();
        assert!(line.is_vertical());
        assert_eq!(line.form, LineForm::Vertical { x: 3.0 });
        assert!(line.slope().is_none());
        assert!(line.residual < 1e-20);
    }

    #[test]
    fn line_residual_is_perpendicular() {
        // Points at distance 1 above and below y = x: perpendicular
        // residual is 4 * (1/sqrt(2))^2 = 2, vertical residual would be 4.
        let stroke = Polyline::new(vec![
            Point::new(0.0, 1.0),
            Point::new(1.0, 0.0),
            Point::new(4.0, 5.0),
            Point::new(5.0, 4.0),
        ]);
        let line = fit_line(&stroke).unwrap();
        assert!((line.slope().unwrap() - 1.0).abs() < 1e-12);
        assert!((line.residual - 2.0).abs() < 1e-9, "residual {}", line.residual);
    }

    #[test]
    fn line_rejects_short_and_coincident_input() {
        let single = Polyline::new(vec![Point::new(1.0, 1.0)]);
        assert!(matches!(fit_line(&single), Err(AnalysisError::InvalidInput(_))));
        let same = Polyline::new(vec![Point::new(1.0, 1.0); 4]);
        assert!(matches!(fit_line(&same), Err(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn projection_lands_on_line() {
        let line = fit_line(&on_line(0.5, 2.0, &[0.0, 2.0, 4.0])).unwrap();
        let q = line.project(Point::new(3.0, 10.0));
        assert!(line.distance_to(q) < 1e-12);
    }

    // --- fit_circle ---

    #[test]
    fn circle_recovers_center_and_radius() {
        let center = Point::new(12.0, -4.0);
        let stroke = on_circle(center, 7.5, 0.0, TAU * 0.95, 40);
        let circle = fit_circle(&stroke).unwrap();
        assert!(circle.center.distance(center) < 1e-9, "center {:?}", circle.center);
        assert!((circle.radius - 7.5).abs() < 1e-9, "radius {}", circle.radius);
        assert!(circle.residual < 1e-18);
    }

    #[test]
    fn circle_from_short_arc() {
        let center = Point::new(-100.0, 50.0);
        let stroke = on_circle(center, 30.0, 0.2, 0.9, 12);
        let circle = fit_circle(&stroke).unwrap();
        assert!(circle.center.distance(center) < 1e-6);
        assert!((circle.radius - 30.0).abs() < 1e-6);
    }

    #[test]
    fn circle_on_collinear_points_is_degenerate() {
        let stroke = on_line(3.0, -2.0, &[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(matches!(fit_circle(&stroke), Err(AnalysisError::DegenerateFit(_))));
    }

    #[test]
    fn circle_on_nearly_collinear_points_is_degenerate() {
        // Sagitta 0.025 over a length of 10 fits a radius of about 500.
        for sag in [1e-3, 1e-4, 1e-5] {
            let stroke: Polyline = (-5..=5)
                .map(|i| {
                    let x = f64::from(i);
                    Point::new(x, sag * x * x)
                })
                .collect();
            let result = fit_circle(&stroke);
            assert!(
                matches!(result, Err(AnalysisError::DegenerateFit(_))),
                "sag {sag}: {result:?}"
            );
        }
    }

    #[test]
    fn circle_from_ten_degree_arc_is_kept() {
        let center = Point::new(0.0, -50.0);
        let stroke = on_circle(center, 50.0, 85.0_f64.to_radians(), 95.0_f64.to_radians(), 11);
        let circle = fit_circle(&stroke).unwrap();
        assert!((circle.radius - 50.0).abs() < 1e-6, "radius {}", circle.radius);
    }

    #[test]
    fn circle_on_two_points_is_degenerate() {
        let stroke = on_line(1.0, 0.0, &[0.0, 1.0]);
        assert!(matches!(fit_circle(&stroke), Err(AnalysisError::DegenerateFit(_))));
    }

    #[test]
    fn circle_radius_is_never_negative() {
        let stroke = on_circle(Point::ORIGIN, 0.001, 0.0, PI, 9);
        let circle = fit_circle(&stroke).unwrap();
        assert!(circle.radius >= 0.0);
        assert!((circle.radius - 0.001).abs() < 1e-9);
    }

    // --- regularize ---

    #[test]
    fn regularize_prefers_circle_for_arcs() {
        let stroke = on_circle(Point::new(1.0, 1.0), 5.0, 0.0, PI, 20);
        let reg = regularize(&stroke, &AnalysisConfig::default());
        assert_eq!(reg.best, Some(PrimitiveKind::Circle));
        assert!(matches!(reg.best_primitive(), Some(Primitive::Circle(_))));
        assert!(reg.failure().is_none());
    }

    #[test]
    fn regularize_prefers_line_for_straight_strokes() {
        let stroke = on_line(0.25, 3.0, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let reg = regularize(&stroke, &AnalysisConfig::default());
        assert_eq!(reg.best, Some(PrimitiveKind::Line));
        assert!(reg.circle.is_err());
    }

    #[test]
    fn regularize_keeps_line_for_slightly_bent_strokes() {
        // A wiggle far smaller than the stroke length fits a huge circle
        // marginally better than a line; the preference keeps it a line.
        let stroke = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.02),
            Point::new(20.0, -0.01),
            Point::new(30.0, 0.015),
            Point::new(40.0, 0.0),
        ]);
        let reg = regularize(&stroke, &AnalysisConfig::default());
        assert_eq!(reg.best, Some(PrimitiveKind::Line));
    }

    #[test]
    fn regularize_reports_failure_for_unusable_input() {
        let stroke = Polyline::new(vec![Point::new(2.0, 2.0)]);
        let reg = regularize(&stroke, &AnalysisConfig::default());
        assert!(reg.best.is_none());
        assert!(matches!(reg.failure(), Some(AnalysisError::InvalidInput(_))));
    }

    #[test]
    fn fits_are_idempotent() {
        let stroke = on_circle(Point::new(3.0, 4.0), 2.0, 0.3, 4.0, 25);
        assert_eq!(fit_circle(&stroke), fit_circle(&stroke));
        assert_eq!(fit_line(&stroke), fit_line(&stroke));
    }
}
