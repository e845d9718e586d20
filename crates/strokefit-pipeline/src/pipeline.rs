//! Drawing-level driver: run every analysis on every polyline.
//!
//! Each polyline is an independent unit of work. Failures are captured
//! per analysis and per polyline, so a degenerate stroke never hides the
//! results of its neighbours. With [`AnalysisConfig::parallel`] set, the
//! polylines are fanned out over the rayon thread pool; results are always
//! returned in the drawing's path/polyline order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::completion::{CompletedPolyline, complete_curve_with_fit};
use crate::regularize::{Regularization, regularize};
use crate::symmetry::{SymmetryReport, detect_symmetry};
use crate::types::{AnalysisConfig, AnalysisError, Drawing, Polyline};

/// Every analysis result for one polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolylineAnalysis {
    /// Number of input points.
    pub point_count: usize,
    /// Line and circle fits plus the preferred primitive.
    pub regularization: Regularization,
    /// Symmetry report, or why it could not be computed.
    pub symmetry: Result<SymmetryReport, AnalysisError>,
    /// Completed stroke, or why it could not be completed.
    pub completion: Result<CompletedPolyline, AnalysisError>,
}

impl PolylineAnalysis {
    /// Every error produced for this polyline, in analysis order.
    pub fn errors(&self) -> impl Iterator<Item = &AnalysisError> {
        [
            self.regularization.line.as_ref().err(),
            self.regularization.circle.as_ref().err(),
            self.symmetry.as_ref().err(),
            self.completion.as_ref().err(),
        ]
        .into_iter()
        .flatten()
    }
}

/// A [`PolylineAnalysis`] tagged with where its polyline sits in the
/// drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedPolyline {
    /// Index of the path within the drawing.
    pub path_index: usize,
    /// Index of the polyline within its path.
    pub polyline_index: usize,
    /// The results.
    pub analysis: PolylineAnalysis,
}

/// Results for a whole drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingAnalysis {
    /// Number of paths in the analyzed drawing.
    pub path_count: usize,
    /// One entry per polyline, in drawing order.
    pub polylines: Vec<AnalyzedPolyline>,
}

impl DrawingAnalysis {
    /// The entry for one polyline, if the indices exist.
    #[must_use]
    pub fn get(&self, path_index: usize, polyline_index: usize) -> Option<&AnalyzedPolyline> {
        self.polylines
            .iter()
            .find(|p| p.path_index == path_index && p.polyline_index == polyline_index)
    }

    /// Every entry belonging to one path.
    pub fn path(&self, path_index: usize) -> impl Iterator<Item = &AnalyzedPolyline> {
        self.polylines
            .iter()
            .filter(move |p| p.path_index == path_index)
    }
}

/// Run regularization, symmetry detection and curve completion on one
/// polyline.
///
/// `config` is trusted as given; [`analyze_drawing`] validates it first.
#[must_use]
pub fn analyze_polyline(polyline: &Polyline, config: &AnalysisConfig) -> PolylineAnalysis {
    let regularization = regularize(polyline, config);
    let symmetry = detect_symmetry(polyline, config);
    let completion = complete_curve_with_fit(polyline, &regularization, config.occlusion, config);

    let analysis = PolylineAnalysis {
        point_count: polyline.len(),
        regularization,
        symmetry,
        completion,
    };
    for error in analysis.errors() {
        match error {
            AnalysisError::InvalidInput(_)
            | AnalysisError::DegenerateFit(_)
            | AnalysisError::InsufficientData { .. } => {
                tracing::debug!(%error, points = polyline.len(), "analysis step failed");
            }
            AnalysisError::InvalidConfig(_) => {
                tracing::warn!(%error, "configuration error surfaced during analysis");
            }
        }
    }
    analysis
}

/// Analyze every polyline of a drawing.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidConfig`] if `config` fails
/// [`AnalysisConfig::validate`]. Per-polyline failures are not errors of
/// this function; they are recorded in the returned analysis.
///
/// # Examples
///
/// ```
/// use strokefit_pipeline::{analyze_drawing, AnalysisConfig, Drawing, Path, Point, Polyline};
///
/// let stroke = Polyline::new(vec![
///     Point::new(0.0, 0.0),
///     Point::new(1.0, 1.0),
///     Point::new(2.0, 2.0),
/// ]);
/// let drawing = Drawing::new(vec![Path::new(vec![stroke])]);
/// let analysis = analyze_drawing(&drawing, &AnalysisConfig::default()).unwrap();
/// assert_eq!(analysis.polylines.len(), 1);
/// ```
pub fn analyze_drawing(
    drawing: &Drawing,
    config: &AnalysisConfig,
) -> Result<DrawingAnalysis, AnalysisError> {
    config.validate()?;

    let work: Vec<(usize, usize, &Polyline)> = drawing.polylines().collect();
    tracing::debug!(
        paths = drawing.len(),
        polylines = work.len(),
        parallel = config.parallel,
        "analyzing drawing"
    );

    let analyze = |&(path_index, polyline_index, polyline): &(usize, usize, &Polyline)| {
        let span = tracing::trace_span!("polyline", path_index, polyline_index).entered();
        let analysis = analyze_polyline(polyline, config);
        drop(span);
        AnalyzedPolyline {
            path_index,
            polyline_index,
            analysis,
        }
    };

    let polylines = if config.parallel {
        work.par_iter().map(analyze).collect()
    } else {
        work.iter().map(analyze).collect()
    };

    Ok(DrawingAnalysis {
        path_count: drawing.len(),
        polylines,
    })
}
