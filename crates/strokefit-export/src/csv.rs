//! CSV drawing reader.
//!
//! One point per row: `path_id, polyline_id, x, y`. Ids are numbers and
//! may be written as floats (`0.0000e+00`), as numeric exporters tend to
//! write every column with the same format. All rows sharing a path id
//! form one [`Path`]; within it, all rows sharing a polyline id form one
//! [`Polyline`] with points in row order. Paths and polylines appear in
//! the order their ids are first seen.
//!
//! Blank lines and lines starting with `#` are skipped.

use strokefit_pipeline::{Drawing, Path, Point, Polyline};

use crate::FormatError;

/// Rows of one path, keyed by polyline id.
struct PathRows {
    id: f64,
    polylines: Vec<(f64, Vec<Point>)>,
}

fn field(value: &str, name: &str, line: usize) -> Result<f64, FormatError> {
    let parsed: f64 = value.trim().parse().map_err(|_| FormatError::Csv {
        line,
        message: format!("{name} is not a number: {:?}", value.trim()),
    })?;
    if !parsed.is_finite() {
        return Err(FormatError::Csv {
            line,
            message: format!("{name} must be finite, got {parsed}"),
        });
    }
    Ok(parsed)
}

/// Parse CSV text into a [`Drawing`].
///
/// # Errors
///
/// Returns [`FormatError::Csv`] naming the 1-based line of the first
/// malformed row, or [`FormatError::Empty`] if there are no data rows.
///
/// # Examples
///
/// ```
/// use strokefit_export::parse_csv;
///
/// let drawing = parse_csv("0,0,1.0,2.0\n0,0,3.0,4.0\n1,0,5.0,6.0\n").unwrap();
/// assert_eq!(drawing.len(), 2);
/// assert_eq!(drawing.paths()[0].polylines()[0].len(), 2);
/// ```
pub fn parse_csv(text: &str) -> Result<Drawing, FormatError> {
    let mut paths: Vec<PathRows> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let row = raw.trim();
        if row.is_empty() || row.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = row.split(',').collect();
        let [path_id, polyline_id, x, y] = fields.as_slice() else {
            return Err(FormatError::Csv {
                line,
                message: format!("expected 4 fields, found {}", fields.len()),
            });
        };
        let path_id = field(path_id, "path id", line)?;
        let polyline_id = field(polyline_id, "polyline id", line)?;
        let point = Point::new(field(x, "x", line)?, field(y, "y", line)?);

        let path = if let Some(i) = paths.iter().position(|p| p.id == path_id) {
            &mut paths[i]
        } else {
            paths.push(PathRows {
                id: path_id,
                polylines: Vec::new(),
            });
            let last = paths.len() - 1;
            &mut paths[last]
        };
        if let Some((_, points)) = path.polylines.iter_mut().find(|(id, _)| *id == polyline_id) {
            points.push(point);
        } else {
            path.polylines.push((polyline_id, vec![point]));
        }
    }

    if paths.is_empty() {
        return Err(FormatError::Empty);
    }

    let drawing = Drawing::new(
        paths
            .into_iter()
            .map(|p| {
                Path::new(
                    p.polylines
                        .into_iter()
                        .map(|(_, points)| Polyline::new(points))
                        .collect(),
                )
            })
            .collect(),
    );
    tracing::debug!(
        paths = drawing.len(),
        polylines = drawing.polyline_count(),
        points = drawing.point_count(),
        "parsed CSV drawing"
    );
    Ok(drawing)
}
