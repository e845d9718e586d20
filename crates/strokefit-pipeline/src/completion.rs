//! Curve completion: fill the gap an occluder leaves in a stroke.
//!
//! This module defines the [`CurveCompleter`] trait for completion
//! strategies and the [`OcclusionKind`] enum that selects one at runtime.
//!
//! A gap is the widest spacing between consecutive points, and only counts
//! when it is more than [`gap_ratio`](AnalysisConfig::gap_ratio) times the
//! median of the remaining spacings. Strokes without a gap are returned
//! unchanged.

use std::f64::consts::{PI, TAU};
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::geometry;
use crate::regularize::{self, FittedCircle, FittedLine, Primitive, PrimitiveKind, Regularization};
use crate::types::{AnalysisConfig, AnalysisError, Point, Polyline};

/// Number of segments used to estimate the length of a Hermite bridge.
const BRIDGE_LENGTH_SEGMENTS: usize = 64;

/// How the hidden part of a stroke relates to the visible part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcclusionKind {
    /// One shape continues behind the occluder: fill the gap along the
    /// primitive (line or circle) that best fits the visible points.
    #[default]
    Connected,
    /// The visible fragments are only loosely related: bridge them with a
    /// smooth cubic that matches each fragment's end position and tangent.
    Disconnected,
}

impl std::fmt::Display for OcclusionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("disconnected"),
        }
    }
}

/// Trait for curve completion strategies.
///
/// Input: a stroke with at most one occluded gap.
/// Output: the stroke with synthesized points inserted into the gap.
pub trait CurveCompleter {
    /// Complete the given stroke.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidInput`] for fewer than two points,
    /// and [`AnalysisError::InsufficientData`] when a gap is bracketed by
    /// fewer than [`min_side_points`](AnalysisConfig::min_side_points)
    /// points on either side. Connected completion also propagates the fit
    /// error when neither primitive can be fitted.
    fn complete(
        &self,
        polyline: &Polyline,
        config: &AnalysisConfig,
    ) -> Result<CompletedPolyline, AnalysisError>;

    /// Like [`complete`](Self::complete), reusing a [`Regularization`]
    /// already computed for `polyline` with the same `config`.
    ///
    /// # Errors
    ///
    /// As [`complete`](Self::complete).
    fn complete_with_fit(
        &self,
        polyline: &Polyline,
        regularization: &Regularization,
        config: &AnalysisConfig,
    ) -> Result<CompletedPolyline, AnalysisError>;
}

impl CurveCompleter for OcclusionKind {
    fn complete(
        &self,
        polyline: &Polyline,
        config: &AnalysisConfig,
    ) -> Result<CompletedPolyline, AnalysisError> {
        match *self {
            Self::Connected => complete_connected(polyline, None, config),
            Self::Disconnected => complete_disconnected(polyline, config),
        }
    }

    fn complete_with_fit(
        &self,
        polyline: &Polyline,
        regularization: &Regularization,
        config: &AnalysisConfig,
    ) -> Result<CompletedPolyline, AnalysisError> {
        match *self {
            Self::Connected => complete_connected(polyline, Some(regularization), config),
            Self::Disconnected => complete_disconnected(polyline, config),
        }
    }
}

/// Where the filled gap was, in indices of the input polyline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    /// Last visible point before the gap.
    pub before: usize,
    /// First visible point after the gap.
    pub after: usize,
}

impl Gap {
    /// Whether the gap spans the closing segment from the last point back
    /// to the first.
    #[must_use]
    pub const fn wraps(&self) -> bool {
        self.after < self.before
    }
}

/// A stroke after completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedPolyline {
    /// Original points with synthesized points inserted.
    pub polyline: Polyline,
    /// Index ranges into [`polyline`](Self::polyline) holding synthesized
    /// points. Every index outside these ranges is an original point.
    pub synthesized: Vec<Range<usize>>,
    /// Strategy that produced the result.
    pub occlusion: OcclusionKind,
    /// Primitive used for connected completion.
    pub model: Option<PrimitiveKind>,
    /// The gap that was filled, if one was found.
    pub gap: Option<Gap>,
}

impl CompletedPolyline {
    fn unchanged(
        polyline: &Polyline,
        occlusion: OcclusionKind,
        model: Option<PrimitiveKind>,
    ) -> Self {
        Self {
            polyline: polyline.clone(),
            synthesized: Vec::new(),
            occlusion,
            model,
            gap: None,
        }
    }

    /// Total number of synthesized points.
    #[must_use]
    pub fn synthesized_count(&self) -> usize {
        self.synthesized.iter().map(ExactSizeIterator::len).sum()
    }

    /// The synthesized points, in order.
    pub fn synthesized_points(&self) -> impl Iterator<Item = &Point> {
        self.synthesized
            .iter()
            .flat_map(|range| &self.polyline.points()[range.clone()])
    }
}

/// Complete a stroke using the strategy selected by `occlusion`.
///
/// # Errors
///
/// See [`CurveCompleter::complete`].
///
/// # Examples
///
/// ```
/// use strokefit_pipeline::{AnalysisConfig, Point, Polyline};
/// use strokefit_pipeline::completion::{complete_curve, OcclusionKind};
///
/// let stroke: Polyline = [0.0, 1.0, 2.0, 3.0, 8.0, 9.0, 10.0]
///     .iter()
///     .map(|&x| Point::new(x, 0.0))
///     .collect();
/// let done = complete_curve(&stroke, OcclusionKind::Connected, &AnalysisConfig::default())
///     .unwrap();
/// assert_eq!(done.synthesized, vec![4..8]);
/// assert_eq!(done.polyline.len(), 11);
/// ```
pub fn complete_curve(
    polyline: &Polyline,
    occlusion: OcclusionKind,
    config: &AnalysisConfig,
) -> Result<CompletedPolyline, AnalysisError> {
    occlusion.complete(polyline, config)
}

/// [`complete_curve`] with a precomputed [`Regularization`] of `polyline`.
///
/// # Errors
///
/// See [`CurveCompleter::complete`].
pub fn complete_curve_with_fit(
    polyline: &Polyline,
    regularization: &Regularization,
    occlusion: OcclusionKind,
    config: &AnalysisConfig,
) -> Result<CompletedPolyline, AnalysisError> {
    occlusion.complete_with_fit(polyline, regularization, config)
}

/// A detected gap plus the spacing statistics of the visible segments.
struct GapCandidate {
    gap: Gap,
    spacing: f64,
}

/// Find the widest spacing, optionally including the closing span.
fn find_gap(points: &[Point], include_closing: bool, gap_ratio: f64) -> Option<GapCandidate> {
    let n = points.len();
    let mut spans: Vec<(Gap, f64)> = points
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            (
                Gap {
                    before: i,
                    after: i + 1,
                },
                w[0].distance(w[1]),
            )
        })
        .collect();
    if include_closing && n >= 3 {
        spans.push((
            Gap {
                before: n - 1,
                after: 0,
            },
            points[n - 1].distance(points[0]),
        ));
    }

    let widest = spans
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.1.total_cmp(&b.1.1))
        .map(|(i, _)| i)?;
    let (gap, width) = spans.swap_remove(widest);
    let others: Vec<f64> = spans.into_iter().map(|(_, d)| d).collect();

    let median = geometry::median(&others)?;
    let spacing = geometry::mean(&others)?;
    tracing::trace!(width, median, ?gap, "widest span");
    (width > gap_ratio * median && spacing > 0.0).then_some(GapCandidate { gap, spacing })
}

fn check_sides(points: &[Point], gap: Gap, needed: usize) -> Result<(), AnalysisError> {
    let (before, after) = if gap.wraps() {
        (points.len(), points.len())
    } else {
        (gap.before + 1, points.len() - gap.after)
    };
    if before < needed || after < needed {
        return Err(AnalysisError::InsufficientData {
            needed,
            before,
            after,
        });
    }
    Ok(())
}

/// Number of interior points that divide a span of `length` into steps
/// close to `spacing`.
fn interior_count(length: f64, spacing: f64) -> usize {
    let segments = (length / spacing).round();
    if segments.is_finite() && segments >= 2.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let segments = segments as usize;
        segments - 1
    } else {
        0
    }
}

/// Evenly spaced parameters `k / segments` for `k = 1..segments`.
fn interior_params(count: usize) -> impl Iterator<Item = f64> {
    #[allow(clippy::cast_precision_loss)]
    let segments = (count + 1) as f64;
    (1..=count).map(move |k| {
        #[allow(clippy::cast_precision_loss)]
        let k = k as f64;
        k / segments
    })
}

/// Insert `fill` into the gap and record where it went.
fn splice(
    points: &[Point],
    gap: Gap,
    fill: Vec<Point>,
    occlusion: OcclusionKind,
    model: Option<PrimitiveKind>,
) -> CompletedPolyline {
    let start = if gap.wraps() { points.len() } else { gap.after };
    let range = start..start + fill.len();

    let mut out = Vec::with_capacity(points.len() + fill.len());
    out.extend_from_slice(&points[..start]);
    out.extend(fill);
    out.extend_from_slice(&points[start..]);

    CompletedPolyline {
        polyline: Polyline::new(out),
        synthesized: if range.is_empty() { Vec::new() } else { vec![range] },
        occlusion,
        model,
        gap: Some(gap),
    }
}

fn fill_along_line(line: &FittedLine, from: Point, to: Point, spacing: f64) -> Vec<Point> {
    let a = line.project(from);
    let b = line.project(to);
    interior_params(interior_count(a.distance(b), spacing))
        .map(|t| a.lerp(b, t))
        .collect()
}

/// Signed sum of angular steps around the center over every visible span;
/// positive for counter-clockwise strokes.
fn winding(circle: &FittedCircle, points: &[Point], gap: Gap) -> f64 {
    points
        .windows(2)
        .enumerate()
        .filter(|&(i, _)| gap.wraps() || i != gap.before)
        .map(|(_, w)| {
            let d = circle.angle_of(w[1]) - circle.angle_of(w[0]);
            (d + PI).rem_euclid(TAU) - PI
        })
        .sum()
}

fn fill_along_circle(
    circle: &FittedCircle,
    points: &[Point],
    gap: Gap,
    spacing: f64,
) -> Vec<Point> {
    let start = circle.angle_of(points[gap.before]);
    let end = circle.angle_of(points[gap.after]);
    let sweep = if winding(circle, points, gap) >= 0.0 {
        (end - start).rem_euclid(TAU)
    } else {
        -(start - end).rem_euclid(TAU)
    };
    interior_params(interior_count(circle.radius * sweep.abs(), spacing))
        .map(|t| circle.point_at(sweep.mul_add(t, start)))
        .collect()
}

fn complete_connected(
    polyline: &Polyline,
    regularization: Option<&Regularization>,
    config: &AnalysisConfig,
) -> Result<CompletedPolyline, AnalysisError> {
    let points = polyline.points();
    if points.len() < 2 {
        return Err(AnalysisError::InvalidInput(format!(
            "completion needs at least 2 points, got {}",
            points.len()
        )));
    }

    let computed;
    let regularization = match regularization {
        Some(r) => r,
        None => {
            computed = regularize::regularize(polyline, config);
            &computed
        }
    };
    let Some(primitive) = regularization.best_primitive() else {
        return Err(regularization.failure().unwrap_or_else(|| {
            AnalysisError::InvalidInput("no primitive fits the visible points".to_string())
        }));
    };
    let model = Some(primitive.kind());
    let include_closing = primitive.kind() == PrimitiveKind::Circle;

    let Some(GapCandidate { gap, spacing }) = find_gap(points, include_closing, config.gap_ratio)
    else {
        return Ok(CompletedPolyline::unchanged(
            polyline,
            OcclusionKind::Connected,
            model,
        ));
    };
    check_sides(points, gap, config.min_side_points)?;

    let fill = match primitive {
        Primitive::Line(line) => {
            fill_along_line(&line, points[gap.before], points[gap.after], spacing)
        }
        Primitive::Circle(circle) => fill_along_circle(&circle, points, gap, spacing),
    };
    tracing::debug!(
        ?gap,
        model = %primitive.kind(),
        synthesized = fill.len(),
        "connected completion"
    );
    Ok(splice(points, gap, fill, OcclusionKind::Connected, model))
}

/// Unit tangent through the first and last of `points`, if they differ.
fn tangent(points: &[Point]) -> Option<Point> {
    let (&first, &last) = (points.first()?, points.last()?);
    (last - first).normalized()
}

/// Cubic Hermite point for endpoints `p0`, `p1` and tangents `m0`, `m1`.
fn hermite(p0: Point, m0: Point, p1: Point, m1: Point, t: f64) -> Point {
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0f64.mul_add(t3, -3.0 * t2) + 1.0;
    let h10 = 2.0f64.mul_add(-t2, t3) + t;
    let h01 = (-2.0f64).mul_add(t3, 3.0 * t2);
    let h11 = t3 - t2;
    p0 * h00 + m0 * h10 + p1 * h01 + m1 * h11
}

fn complete_disconnected(
    polyline: &Polyline,
    config: &AnalysisConfig,
) -> Result<CompletedPolyline, AnalysisError> {
    let points = polyline.points();
    if points.len() < 2 {
        return Err(AnalysisError::InvalidInput(format!(
            "completion needs at least 2 points, got {}",
            points.len()
        )));
    }

    let Some(GapCandidate { gap, spacing }) = find_gap(points, false, config.gap_ratio) else {
        return Ok(CompletedPolyline::unchanged(
            polyline,
            OcclusionKind::Disconnected,
            None,
        ));
    };
    check_sides(points, gap, config.min_side_points)?;

    let p0 = points[gap.before];
    let p1 = points[gap.after];
    let chord = p1 - p0;
    let reach = chord.length();
    let leading = &points[(gap.before + 1).saturating_sub(config.tangent_window)..=gap.before];
    let trailing = &points[gap.after..points.len().min(gap.after + config.tangent_window)];
    let fallback = chord.normalized().unwrap_or(Point::new(1.0, 0.0));
    let m0 = tangent(leading).unwrap_or(fallback) * reach;
    let m1 = tangent(trailing).unwrap_or(fallback) * reach;

    let mut dense = Vec::with_capacity(BRIDGE_LENGTH_SEGMENTS + 1);
    dense.push(p0);
    dense.extend(interior_params(BRIDGE_LENGTH_SEGMENTS - 1).map(|t| hermite(p0, m0, p1, m1, t)));
    dense.push(p1);
    let length = geometry::arc_length(&dense, false);

    let fill: Vec<Point> = interior_params(interior_count(length, spacing))
        .map(|t| hermite(p0, m0, p1, m1, t))
        .collect();
    tracing::debug!(?gap, length, synthesized = fill.len(), "disconnected completion");
    Ok(splice(points, gap, fill, OcclusionKind::Disconnected, None))
}
