//! SVG export serializer.
//!
//! Converts a [`Drawing`] into an SVG string using the [`svg`] crate for
//! document construction, XML escaping, and path data formatting.
//!
//! Each path becomes a `<g>` group and each of its polylines a `<path>`
//! element using `M` (move to) and `L` (line to) commands. When a
//! [`DrawingAnalysis`] is supplied, overlays are drawn on top:
//!
//! - the best-fit primitive of each polyline (a line segment spanning the
//!   polyline, or the fitted circle),
//! - synthesized completion points and the span they fill,
//! - the reflective symmetry axis through the centroid.
//!
//! Optional [`SvgMetadata`] embeds `<title>` and `<desc>` elements and the
//! serialized analysis configuration.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Circle, Description, Element, Group, Line, Path, Title};
use svg::node::{Node, Text, Value};

use strokefit_pipeline::geometry::bounding_diameter;
use strokefit_pipeline::{
    AnalyzedPolyline, CompletedPolyline, Drawing, DrawingAnalysis, Point, Polyline, Primitive,
    SymmetryReport,
};

/// Margin around the drawing, as a fraction of its larger extent.
const MARGIN_RATIO: f64 = 0.05;

/// Stroke colour of the input polylines.
const STROKE_COLOR: &str = "black";
/// Stroke colour of fitted line overlays.
const LINE_FIT_COLOR: &str = "#1f77b4";
/// Stroke colour of fitted circle overlays.
const CIRCLE_FIT_COLOR: &str = "#d62728";
/// Colour of completion overlays.
const COMPLETION_COLOR: &str = "#2ca02c";
/// Stroke colour of symmetry axis overlays.
const AXIS_COLOR: &str = "#9467bd";

/// Metadata to embed in the SVG document.
///
/// All fields are optional.  When present, a `<title>` and/or `<desc>`
/// element is emitted immediately after the opening `<svg>` tag.
///
/// Text values are XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title: emitted as `<title>`.
    ///
    /// Typically the input filename (without extension).
    pub title: Option<&'a str>,

    /// Document description: emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized analysis configuration: emitted inside a `<metadata>`
    /// element wrapped in a namespaced `<strokefit:analysis>` element, so
    /// exported files carry machine-parseable settings.
    pub config_json: Option<&'a str>,
}

/// Build an SVG path `d` attribute string from a polyline.
///
/// Uses `M` for the first point and `L` for subsequent points.
/// Returns an empty string for polylines with fewer than 2 points.
///
/// Coordinates are formatted by the [`svg`] crate using `f32` precision.
///
/// # Examples
///
/// ```
/// use strokefit_pipeline::{Point, Polyline};
/// use strokefit_export::build_path_data;
///
/// let polyline = Polyline::new(vec![
///     Point::new(10.0, 20.0),
///     Point::new(30.0, 40.0),
/// ]);
/// let d = build_path_data(&polyline);
/// assert_eq!(d, "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(polyline: &Polyline) -> String {
    points_to_data(polyline.points())
}

fn points_to_data(points: &[Point]) -> String {
    let [first, rest @ ..] = points else {
        return String::new();
    };
    if rest.is_empty() {
        return String::new();
    }

    let mut data = Data::new().move_to((first.x, first.y));
    for p in rest {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data))
}

/// A dashed, unfilled overlay stroke that keeps its width when scaled.
fn overlay<T: Node>(mut node: T, color: &str) -> T {
    node.assign("fill", "none");
    node.assign("stroke", color);
    node.assign("stroke-width", 1);
    node.assign("stroke-dasharray", "4 2");
    node.assign("vector-effect", "non-scaling-stroke");
    node
}

/// Line segment along a fitted line, spanning the projections of the
/// polyline's points.
fn line_overlay(line: &strokefit_pipeline::FittedLine, points: &[Point]) -> Option<Line> {
    let anchor = line.project(*points.first()?);
    let dir = line.direction();
    let (lo, hi) = points
        .iter()
        .map(|&p| (p - anchor).dot(dir))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
            (lo.min(t), hi.max(t))
        });
    let a = anchor + dir * lo;
    let b = anchor + dir * hi;
    Some(overlay(
        Line::new()
            .set("x1", a.x)
            .set("y1", a.y)
            .set("x2", b.x)
            .set("y2", b.y)
            .set("class", "fit-line"),
        LINE_FIT_COLOR,
    ))
}

fn primitive_overlay(primitive: Primitive, points: &[Point]) -> Option<Box<dyn Node>> {
    match primitive {
        Primitive::Line(line) => {
            line_overlay(&line, points).map(|l| Box::new(l) as Box<dyn Node>)
        }
        Primitive::Circle(circle) => Some(Box::new(overlay(
            Circle::new()
                .set("cx", circle.center.x)
                .set("cy", circle.center.y)
                .set("r", circle.radius)
                .set("class", "fit-circle"),
            CIRCLE_FIT_COLOR,
        ))),
    }
}

/// The filled span (bracketing original points plus synthesized points)
/// and a dot per synthesized point.
fn completion_overlay(completed: &CompletedPolyline, dot_radius: f64) -> Group {
    let points = completed.polyline.points();
    let mut group = Group::new().set("class", "completion");

    for range in &completed.synthesized {
        let before = range.start.checked_sub(1).and_then(|i| points.get(i));
        let after = points.get(range.end).or_else(|| points.first());
        let span: Vec<Point> = before
            .into_iter()
            .chain(&points[range.clone()])
            .chain(after)
            .copied()
            .collect();
        let d = points_to_data(&span);
        if !d.is_empty() {
            group = group.add(overlay(Path::new().set("d", d), COMPLETION_COLOR));
        }
    }
    for p in completed.synthesized_points() {
        group = group.add(
            Circle::new()
                .set("cx", p.x)
                .set("cy", p.y)
                .set("r", dot_radius)
                .set("fill", COMPLETION_COLOR),
        );
    }
    group
}

fn axis_overlay(report: &SymmetryReport, half_length: f64) -> Option<Line> {
    let axis = report.reflective?;
    let (sin, cos) = axis.axis_angle.sin_cos();
    let offset = Point::new(cos, sin) * half_length;
    let a = report.centroid - offset;
    let b = report.centroid + offset;
    Some(overlay(
        Line::new()
            .set("x1", a.x)
            .set("y1", a.y)
            .set("x2", b.x)
            .set("y2", b.y)
            .set("class", "symmetry-axis"),
        AXIS_COLOR,
    ))
}

/// Every overlay for one analyzed polyline.
fn analysis_overlays(entry: &AnalyzedPolyline, drawing: &Drawing, dot_radius: f64) -> Group {
    let points = drawing
        .paths()
        .get(entry.path_index)
        .and_then(|path| path.polylines().get(entry.polyline_index))
        .map_or(&[][..], Polyline::points);
    let analysis = &entry.analysis;

    let mut group = Group::new()
        .set("class", "analysis")
        .set("data-path", entry.path_index)
        .set("data-polyline", entry.polyline_index);

    if let Some(node) = analysis
        .regularization
        .best_primitive()
        .and_then(|primitive| primitive_overlay(primitive, points))
    {
        group.append(node);
    }
    if let Ok(report) = &analysis.symmetry
        && let Some(axis) = axis_overlay(report, bounding_diameter(points) / 2.0)
    {
        group = group.add(axis);
    }
    if let Ok(completed) = &analysis.completion
        && !completed.synthesized.is_empty()
    {
        group = group.add(completion_overlay(completed, dot_radius));
    }
    group
}

/// Convert a drawing to an SVG document string.
///
/// The `viewBox` covers the drawing's bounds plus a small margin, in the
/// drawing's own coordinates. Polylines with fewer than 2 points are
/// skipped. When `analysis` is given, overlays are drawn in a separate
/// group after all paths.
///
/// # Examples
///
/// ```
/// use strokefit_pipeline::{Drawing, Path, Point, Polyline};
/// use strokefit_export::{to_svg, SvgMetadata};
///
/// let drawing = Drawing::new(vec![Path::new(vec![Polyline::new(vec![
///     Point::new(0.0, 0.0),
///     Point::new(10.0, 10.0),
/// ])])]);
/// let svg = to_svg(&drawing, None, &SvgMetadata::default());
/// assert!(svg.contains(r#"d="M0,0 L10,10""#));
/// ```
#[must_use]
pub fn to_svg(
    drawing: &Drawing,
    analysis: Option<&DrawingAnalysis>,
    metadata: &SvgMetadata<'_>,
) -> String {
    let (min_x, min_y, width, height) = drawing.bounds().map_or((0.0, 0.0, 1.0, 1.0), |b| {
        let margin = (b.width.max(b.height) * MARGIN_RATIO).max(1.0);
        (
            b.min_x - margin,
            b.min_y - margin,
            2.0f64.mul_add(margin, b.width),
            2.0f64.mul_add(margin, b.height),
        )
    });
    let dot_radius = width.max(height) * 0.004;

    let mut doc = Document::new()
        .set("width", width)
        .set("height", height)
        .set("viewBox", (min_x, min_y, width, height));

    // Optional <title> element
    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    // Optional <desc> element
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    // Optional <metadata> element with structured analysis config
    if let Some(config_json) = metadata.config_json {
        let mut analysis_el = Element::new("strokefit:analysis");
        analysis_el.assign("xmlns:strokefit", "https://strokefit.dev/ns/1");
        analysis_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(analysis_el);
        doc = doc.add(metadata_el);
    }

    for (path_index, path) in drawing.paths().iter().enumerate() {
        let mut group = Group::new()
            .set("id", format!("path-{path_index}"))
            .set("fill", "none")
            .set("stroke", STROKE_COLOR)
            .set("stroke-width", 1)
            .set("vector-effect", "non-scaling-stroke");
        for polyline in path.polylines() {
            let d = build_path_data(polyline);
            if d.is_empty() {
                continue;
            }
            group = group.add(Path::new().set("d", d));
        }
        doc = doc.add(group);
    }

    if let Some(analysis) = analysis {
        let mut overlays = Group::new().set("id", "analysis");
        for entry in &analysis.polylines {
            overlays = overlays.add(analysis_overlays(entry, drawing, dot_radius));
        }
        doc = doc.add(overlays);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
