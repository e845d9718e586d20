//! SVG drawing reader.
//!
//! Every `<path>` element becomes one [`Path`] and each of its subpaths
//! (started by a move-to) becomes one [`Polyline`]. Straight commands are
//! taken literally. Bézier curves and elliptical arcs are flattened into
//! [`CURVE_SEGMENTS`] line segments each. A close-path command repeats
//! the subpath's start point.
//!
//! Parsing uses the [`svg`] crate's event reader and path-data parser.
//! Element `transform` attributes are not applied.

use std::f64::consts::TAU;

use svg::node::element::path::{Command, Data, Position};
use svg::node::element::tag;
use svg::parser::Event;

use strokefit_pipeline::{Drawing, Path, Point, Polyline};

use crate::FormatError;

/// Line segments per flattened curve command.
pub const CURVE_SEGMENTS: usize = 16;

/// Which kind of control point the previous command left behind, for the
/// smooth (`S` / `T`) shorthands.
#[derive(Clone, Copy)]
enum Control {
    Cubic(Point),
    Quadratic(Point),
}

/// Walks path commands and accumulates flattened subpaths.
struct Flattener {
    polylines: Vec<Polyline>,
    current: Vec<Point>,
    pen: Point,
    start: Point,
    control: Option<Control>,
}

impl Flattener {
    const fn new() -> Self {
        Self {
            polylines: Vec::new(),
            current: Vec::new(),
            pen: Point::ORIGIN,
            start: Point::ORIGIN,
            control: None,
        }
    }

    fn finish_subpath(&mut self) {
        let points = std::mem::take(&mut self.current);
        if points.len() >= 2 {
            self.polylines.push(Polyline::new(points));
        }
    }

    fn resolve(&self, position: Position, x: f64, y: f64) -> Point {
        match position {
            Position::Absolute => Point::new(x, y),
            Position::Relative => Point::new(self.pen.x + x, self.pen.y + y),
        }
    }

    fn move_to(&mut self, to: Point) {
        self.finish_subpath();
        self.current.push(to);
        self.pen = to;
        self.start = to;
    }

    fn line_to(&mut self, to: Point) {
        if self.current.is_empty() {
            self.current.push(self.pen);
        }
        self.current.push(to);
        self.pen = to;
    }

    fn curve_to(&mut self, eval: impl Fn(f64) -> Point) {
        for k in 1..=CURVE_SEGMENTS {
            #[allow(clippy::cast_precision_loss)]
            let t = k as f64 / CURVE_SEGMENTS as f64;
            self.line_to(eval(t));
        }
    }

    fn cubic(&mut self, c1: Point, c2: Point, to: Point) {
        let from = self.pen;
        self.curve_to(|t| {
            let u = 1.0 - t;
            from * (u * u * u) + c1 * (3.0 * u * u * t) + c2 * (3.0 * u * t * t) + to * (t * t * t)
        });
        self.control = Some(Control::Cubic(c2));
    }

    fn quadratic(&mut self, c: Point, to: Point) {
        let from = self.pen;
        self.curve_to(|t| {
            let u = 1.0 - t;
            from * (u * u) + c * (2.0 * u * t) + to * (t * t)
        });
        self.control = Some(Control::Quadratic(c));
    }

    /// Reflection of the previous control point of the same family, or
    /// the pen position when there is none.
    fn reflected_control(&self, cubic: bool) -> Point {
        match (self.control, cubic) {
            (Some(Control::Cubic(c)), true) | (Some(Control::Quadratic(c)), false) => {
                self.pen * 2.0 - c
            }
            _ => self.pen,
        }
    }

    /// Elliptical arc by endpoint parameterization (SVG 1.1 appendix F.6.5).
    #[allow(clippy::many_single_char_names, clippy::similar_names)]
    fn arc(&mut self, rx: f64, ry: f64, rotation_deg: f64, large: bool, sweep: bool, to: Point) {
        let from = self.pen;
        let (mut rx, mut ry) = (rx.abs(), ry.abs());
        if from == to {
            return;
        }
        if rx == 0.0 || ry == 0.0 {
            self.line_to(to);
            return;
        }

        let (sin, cos) = rotation_deg.to_radians().sin_cos();
        let half = (from - to) * 0.5;
        let x1 = cos.mul_add(half.x, sin * half.y);
        let y1 = (-sin).mul_add(half.x, cos * half.y);

        let lambda = (x1 * x1) / (rx * rx) + (y1 * y1) / (ry * ry);
        if lambda > 1.0 {
            rx *= lambda.sqrt();
            ry *= lambda.sqrt();
        }

        let num = (rx * rx).mul_add(-(y1 * y1), (rx * ry).powi(2)) - (ry * ry) * (x1 * x1);
        let den = (rx * rx).mul_add(y1 * y1, (ry * ry) * (x1 * x1));
        let sign = if large == sweep { -1.0 } else { 1.0 };
        let coef = sign * (num / den).max(0.0).sqrt();
        let cx1 = coef * rx * y1 / ry;
        let cy1 = -coef * ry * x1 / rx;

        let mid = (from + to) * 0.5;
        let center = Point::new(
            cos.mul_add(cx1, -(sin * cy1)) + mid.x,
            sin.mul_add(cx1, cos * cy1) + mid.y,
        );

        let angle = |u: Point, v: Point| u.cross(v).atan2(u.dot(v));
        let u = Point::new((x1 - cx1) / rx, (y1 - cy1) / ry);
        let v = Point::new((-x1 - cx1) / rx, (-y1 - cy1) / ry);
        let theta = angle(Point::new(1.0, 0.0), u);
        let mut delta = angle(u, v);
        if !sweep && delta > 0.0 {
            delta -= TAU;
        } else if sweep && delta < 0.0 {
            delta += TAU;
        }

        self.curve_to(|t| {
            if t >= 1.0 {
                return to;
            }
            let (s, c) = delta.mul_add(t, theta).sin_cos();
            Point::new(
                cos.mul_add(rx * c, -(sin * ry * s)) + center.x,
                sin.mul_add(rx * c, cos * ry * s) + center.y,
            )
        });
    }

    fn close(&mut self) {
        if !self.current.is_empty() {
            let start = self.start;
            self.line_to(start);
        }
        self.finish_subpath();
        self.pen = self.start;
    }

    fn apply(&mut self, command: &Command) -> Result<(), FormatError> {
        let arity = |params: &[f32], n: usize, name: &str| -> Result<Vec<f64>, FormatError> {
            if params.is_empty() || params.len() % n != 0 {
                return Err(FormatError::Svg(format!(
                    "{name} expects a multiple of {n} parameters, got {}",
                    params.len()
                )));
            }
            Ok(params.iter().copied().map(f64::from).collect())
        };

        match command {
            Command::Move(pos, params) => {
                let values = arity(params, 2, "move-to")?;
                for (i, pair) in values.chunks_exact(2).enumerate() {
                    let to = self.resolve(*pos, pair[0], pair[1]);
                    if i == 0 {
                        self.move_to(to);
                    } else {
                        self.line_to(to);
                    }
                }
                self.control = None;
            }
            Command::Line(pos, params) => {
                for pair in arity(params, 2, "line-to")?.chunks_exact(2) {
                    let to = self.resolve(*pos, pair[0], pair[1]);
                    self.line_to(to);
                }
                self.control = None;
            }
            Command::HorizontalLine(pos, params) => {
                for x in arity(params, 1, "horizontal line-to")? {
                    let to = match pos {
                        Position::Absolute => Point::new(x, self.pen.y),
                        Position::Relative => Point::new(self.pen.x + x, self.pen.y),
                    };
                    self.line_to(to);
                }
                self.control = None;
            }
            Command::VerticalLine(pos, params) => {
                for y in arity(params, 1, "vertical line-to")? {
                    let to = match pos {
                        Position::Absolute => Point::new(self.pen.x, y),
                        Position::Relative => Point::new(self.pen.x, self.pen.y + y),
                    };
                    self.line_to(to);
                }
                self.control = None;
            }
            Command::CubicCurve(pos, params) => {
                for p in arity(params, 6, "cubic curve-to")?.chunks_exact(6) {
                    let c1 = self.resolve(*pos, p[0], p[1]);
                    let c2 = self.resolve(*pos, p[2], p[3]);
                    let to = self.resolve(*pos, p[4], p[5]);
                    self.cubic(c1, c2, to);
                }
            }
            Command::SmoothCubicCurve(pos, params) => {
                for p in arity(params, 4, "smooth cubic curve-to")?.chunks_exact(4) {
                    let c1 = self.reflected_control(true);
                    let c2 = self.resolve(*pos, p[0], p[1]);
                    let to = self.resolve(*pos, p[2], p[3]);
                    self.cubic(c1, c2, to);
                }
            }
            Command::QuadraticCurve(pos, params) => {
                for p in arity(params, 4, "quadratic curve-to")?.chunks_exact(4) {
                    let c = self.resolve(*pos, p[0], p[1]);
                    let to = self.resolve(*pos, p[2], p[3]);
                    self.quadratic(c, to);
                }
            }
            Command::SmoothQuadraticCurve(pos, params) => {
                for p in arity(params, 2, "smooth quadratic curve-to")?.chunks_exact(2) {
                    let c = self.reflected_control(false);
                    let to = self.resolve(*pos, p[0], p[1]);
                    self.quadratic(c, to);
                }
            }
            Command::EllipticalArc(pos, params) => {
                for p in arity(params, 7, "elliptical arc")?.chunks_exact(7) {
                    let to = self.resolve(*pos, p[5], p[6]);
                    self.arc(p[0], p[1], p[2], p[3] != 0.0, p[4] != 0.0, to);
                }
                self.control = None;
            }
            Command::Close => {
                self.close();
                self.control = None;
            }
        }
        Ok(())
    }

    fn into_path(mut self) -> Path {
        self.finish_subpath();
        Path::new(self.polylines)
    }
}

/// Flatten one path `d` attribute into a [`Path`].
///
/// # Errors
///
/// Returns [`FormatError::Svg`] when the path data does not parse or a
/// command has the wrong number of parameters.
pub fn parse_path_data(d: &str) -> Result<Path, FormatError> {
    let data = Data::parse(d).map_err(|e| FormatError::Svg(format!("invalid path data: {e}")))?;
    let mut flattener = Flattener::new();
    for command in data.iter() {
        flattener.apply(command)?;
    }
    Ok(flattener.into_path())
}

/// Parse SVG text into a [`Drawing`], one path per `<path>` element.
///
/// `<path>` elements without a `d` attribute or without any drawable
/// subpath are skipped.
///
/// # Errors
///
/// Returns [`FormatError::Svg`] for malformed markup or path data, and
/// [`FormatError::Empty`] when no polyline was found.
///
/// # Examples
///
/// ```
/// use strokefit_export::parse_svg;
///
/// let drawing = parse_svg(r#"<svg xmlns="http://www.w3.org/2000/svg">
///   <path d="M0,0 L10,0 L10,10 M20,20 h5"/>
/// </svg>"#).unwrap();
/// assert_eq!(drawing.len(), 1);
/// assert_eq!(drawing.paths()[0].len(), 2);
/// ```
pub fn parse_svg(text: &str) -> Result<Drawing, FormatError> {
    let parser = svg::read(text).map_err(|e| FormatError::Svg(e.to_string()))?;
    let mut paths = Vec::new();

    for event in parser {
        match event {
            Event::Tag(tag::Path, kind, attributes) if kind != tag::Type::End => {
                let Some(d) = attributes.get("d") else {
                    tracing::debug!("skipping <path> without a d attribute");
                    continue;
                };
                let path = parse_path_data(d)?;
                if !path.is_empty() {
                    paths.push(path);
                }
            }
            Event::Error(e) => return Err(FormatError::Svg(e.to_string())),
            _ => {}
        }
    }

    if paths.is_empty() {
        return Err(FormatError::Empty);
    }
    let drawing = Drawing::new(paths);
    tracing::debug!(
        paths = drawing.len(),
        polylines = drawing.polyline_count(),
        points = drawing.point_count(),
        "parsed SVG drawing"
    );
    Ok(drawing)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn wrap(body: &str) -> String {
        format!(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100">{body}</svg>"#)
    }

    #[test]
    fn straight_commands_are_taken_literally() {
        let path = parse_path_data("M1,2 L3,4 H10 V20 l-1,-1 h-2 v-3").unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(
            path.polylines()[0].points(),
            &[
                Point::new(1.0, 2.0),
                Point::new(3.0, 4.0),
                Point::new(10.0, 4.0),
                Point::new(10.0, 20.0),
                Point::new(9.0, 19.0),
                Point::new(7.0, 19.0),
                Point::new(7.0, 16.0),
            ]
        );
    }

    #[test]
    fn implicit_line_to_after_move() {
        let path = parse_path_data("m 1 1 2 0 0 2").unwrap();
        assert_eq!(
            path.polylines()[0].points(),
            &[Point::new(1.0, 1.0), Point::new(3.0, 1.0), Point::new(3.0, 3.0)]
        );
    }

    #[test]
    fn each_move_starts_a_polyline() {
        let path = parse_path_data("M0,0 L1,0 M5,5 L6,5 L7,5").unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path.polylines()[1].len(), 3);
    }

    #[test]
    fn close_repeats_the_start_point() {
        let path = parse_path_data("M0,0 L4,0 L4,4 Z").unwrap();
        let pl = &path.polylines()[0];
        assert_eq!(pl.len(), 4);
        assert_eq!(pl.last(), Some(&Point::new(0.0, 0.0)));
    }

    #[test]
    fn cubic_is_flattened_and_ends_on_its_endpoint() {
        let path = parse_path_data("M0,0 C0,10 10,10 10,0").unwrap();
        let pl = &path.polylines()[0];
        assert_eq!(pl.len(), CURVE_SEGMENTS + 1);
        assert!(pl.last().unwrap().distance(Point::new(10.0, 0.0)) < 1e-9);
        // Symmetric control polygon: the middle sample is the apex at y = 7.5.
        let mid = pl.points()[CURVE_SEGMENTS / 2];
        assert!(mid.distance(Point::new(5.0, 7.5)) < 1e-9, "{mid:?}");
    }

    #[test]
    fn smooth_cubic_reflects_previous_control() {
        let path = parse_path_data("M0,0 C0,5 5,5 5,0 S10,-5 10,0").unwrap();
        let pl = &path.polylines()[0];
        assert_eq!(pl.len(), 2 * CURVE_SEGMENTS + 1);
        // Point symmetry about (5, 0): sample k and its mirror sum to (10, 0).
        let first = pl.points()[4];
        let mirror = pl.points()[2 * CURVE_SEGMENTS - 4];
        assert!((first + mirror).distance(Point::new(10.0, 0.0)) < 1e-6);
    }

    #[test]
    fn quadratic_and_smooth_quadratic() {
        let path = parse_path_data("M0,0 Q5,10 10,0 T20,0").unwrap();
        let pl = &path.polylines()[0];
        assert_eq!(pl.len(), 2 * CURVE_SEGMENTS + 1);
        let apex = pl.points()[CURVE_SEGMENTS / 2];
        assert!(apex.distance(Point::new(5.0, 5.0)) < 1e-9, "{apex:?}");
        let trough = pl.points()[CURVE_SEGMENTS + CURVE_SEGMENTS / 2];
        assert!(trough.distance(Point::new(15.0, -5.0)) < 1e-9, "{trough:?}");
    }

    #[test]
    fn arc_points_lie_on_the_circle() {
        // Half circle of radius 5 from (0,0) to (10,0), center (5,0).
        let path = parse_path_data("M0,0 A5,5 0 0 1 10,0").unwrap();
        let pl = &path.polylines()[0];
        assert_eq!(pl.len(), CURVE_SEGMENTS + 1);
        for p in pl.points() {
            assert!((p.distance(Point::new(5.0, 0.0)) - 5.0).abs() < 1e-6, "{p:?}");
        }
        assert_eq!(pl.last(), Some(&Point::new(10.0, 0.0)));
    }

    #[test]
    fn wrong_parameter_count_is_an_error() {
        assert!(matches!(parse_path_data("M0,0 C1,1 2,2"), Err(FormatError::Svg(_))));
    }

    #[test]
    fn every_path_element_becomes_a_path() {
        let text = wrap(r#"<path d="M0,0 L1,1"/><g><path d="M2,2 L3,3 M4,4 L5,5"/></g>"#);
        let drawing = parse_svg(&text).unwrap();
        assert_eq!(drawing.len(), 2);
        assert_eq!(drawing.polyline_count(), 3);
    }

    #[test]
    fn lone_move_and_missing_d_are_skipped() {
        let text = wrap(r#"<path/><path d="M3,3"/><path d="M0,0 L1,1"/>"#);
        let drawing = parse_svg(&text).unwrap();
        assert_eq!(drawing.len(), 1);
    }

    #[test]
    fn svg_without_paths_is_empty() {
        assert_eq!(parse_svg(&wrap("<circle r=\"3\"/>")), Err(FormatError::Empty));
    }
}
