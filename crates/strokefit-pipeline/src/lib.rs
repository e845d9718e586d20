//! strokefit-pipeline: Pure geometric analysis of 2D line art (sans-IO).
//!
//! Takes a [`Drawing`] (paths of polylines) and, for every polyline:
//!
//! - fits a straight line and a circle and picks the better primitive
//!   ([`regularize`](mod@regularize)),
//! - detects reflective and rotational symmetry ([`symmetry`]),
//! - fills an occluded gap along the best primitive or with a smooth
//!   bridge ([`completion`]).
//!
//! Every analysis is a pure function of its polyline and the
//! [`AnalysisConfig`]. Failures are values ([`AnalysisError`]) stored next
//! to the successful results, never panics.
//!
//! This crate has **no I/O dependencies**: parsing and serializing
//! drawings lives in `strokefit-export`.

pub mod completion;
pub mod diagnostics;
pub mod geometry;
pub mod pipeline;
pub mod regularize;
pub mod symmetry;
pub mod types;

pub use completion::{
    CompletedPolyline, CurveCompleter, Gap, OcclusionKind, complete_curve, complete_curve_with_fit,
};
pub use diagnostics::AnalysisSummary;
pub use pipeline::{
    AnalyzedPolyline, DrawingAnalysis, PolylineAnalysis, analyze_drawing, analyze_polyline,
};
pub use regularize::{
    FittedCircle, FittedLine, LineForm, Primitive, PrimitiveKind, Regularization, fit_circle,
    fit_line, regularize,
};
pub use symmetry::{
    ReflectiveSymmetry, RotationalSymmetry, SymmetryKind, SymmetryReport, detect_symmetry,
};
pub use types::{AnalysisConfig, AnalysisError, Bounds, Drawing, Path, Point, Polyline};
