//! Analysis diagnostics: counts over a [`DrawingAnalysis`].
//!
//! A summary is derived from the results alone, so it can be rebuilt from
//! a serialized analysis. [`AnalysisSummary::report`] renders it as the
//! plain-text table the CLI prints.

use serde::{Deserialize, Serialize};

use crate::pipeline::DrawingAnalysis;
use crate::regularize::PrimitiveKind;
use crate::symmetry::SymmetryKind;
use crate::types::AnalysisError;

/// Counts of failures by error kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCounts {
    /// [`AnalysisError::InvalidInput`].
    pub invalid_input: usize,
    /// [`AnalysisError::DegenerateFit`].
    pub degenerate_fit: usize,
    /// [`AnalysisError::InsufficientData`].
    pub insufficient_data: usize,
    /// [`AnalysisError::InvalidConfig`].
    pub invalid_config: usize,
}

impl FailureCounts {
    fn record(&mut self, error: &AnalysisError) {
        match error {
            AnalysisError::InvalidInput(_) => self.invalid_input += 1,
            AnalysisError::DegenerateFit(_) => self.degenerate_fit += 1,
            AnalysisError::InsufficientData { .. } => self.insufficient_data += 1,
            AnalysisError::InvalidConfig(_) => self.invalid_config += 1,
        }
    }

    /// Sum over every kind.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.invalid_input + self.degenerate_fit + self.insufficient_data + self.invalid_config
    }
}

/// Counts of symmetry classifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymmetryCounts {
    /// No symmetry passed.
    pub none: usize,
    /// Reflective only.
    pub reflective: usize,
    /// Rotational only.
    pub rotational: usize,
    /// Reflective and rotational.
    pub both: usize,
}

/// Aggregate counts over a drawing analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Paths in the drawing.
    pub path_count: usize,
    /// Polylines analyzed.
    pub polyline_count: usize,
    /// Input points across all polylines.
    pub point_count: usize,
    /// Polylines whose best primitive is a line.
    pub best_line: usize,
    /// Polylines whose best primitive is a circle.
    pub best_circle: usize,
    /// Polylines with neither fit available.
    pub unfitted: usize,
    /// Circle fits rejected as degenerate (near-collinear input).
    pub degenerate_circles: usize,
    /// Symmetry classifications of the polylines where detection succeeded.
    pub symmetry: SymmetryCounts,
    /// Polylines where a gap was found and filled.
    pub completed: usize,
    /// Points synthesized across all completions.
    pub synthesized_points: usize,
    /// Failures across every analysis step.
    pub failures: FailureCounts,
}

impl DrawingAnalysis {
    /// Count fits, symmetries, completions and failures.
    #[must_use]
    pub fn summary(&self) -> AnalysisSummary {
        let mut summary = AnalysisSummary {
            path_count: self.path_count,
            polyline_count: self.polylines.len(),
            ..AnalysisSummary::default()
        };

        for entry in &self.polylines {
            let analysis = &entry.analysis;
            summary.point_count += analysis.point_count;

            match analysis.regularization.best {
                Some(PrimitiveKind::Line) => summary.best_line += 1,
                Some(PrimitiveKind::Circle) => summary.best_circle += 1,
                None => summary.unfitted += 1,
            }
            if matches!(
                analysis.regularization.circle,
                Err(AnalysisError::DegenerateFit(_))
            ) {
                summary.degenerate_circles += 1;
            }

            if let Ok(report) = &analysis.symmetry {
                let counts = &mut summary.symmetry;
                match report.kind {
                    SymmetryKind::None => counts.none += 1,
                    SymmetryKind::Reflective => counts.reflective += 1,
                    SymmetryKind::Rotational => counts.rotational += 1,
                    SymmetryKind::Both => counts.both += 1,
                }
            }

            if let Ok(completed) = &analysis.completion
                && completed.gap.is_some()
            {
                summary.completed += 1;
                summary.synthesized_points += completed.synthesized_count();
            }

            for error in analysis.errors() {
                summary.failures.record(error);
            }
        }
        summary
    }
}

impl AnalysisSummary {
    /// Generate a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Analysis Summary\n{}", "=".repeat(60)));
        lines.push(format!(
            "Drawing: {} paths, {} polylines, {} points",
            self.path_count, self.polyline_count, self.point_count,
        ));
        lines.push(String::new());

        lines.push(format!("{:<28} {:>8}", "Category", "Count"));
        lines.push("-".repeat(40));
        let rows = [
            ("Best fit: line", self.best_line),
            ("Best fit: circle", self.best_circle),
            ("No fit", self.unfitted),
            ("Degenerate circle fits", self.degenerate_circles),
            ("Symmetry: none", self.symmetry.none),
            ("Symmetry: reflective", self.symmetry.reflective),
            ("Symmetry: rotational", self.symmetry.rotational),
            ("Symmetry: both", self.symmetry.both),
            ("Gaps completed", self.completed),
            ("Synthesized points", self.synthesized_points),
        ];
        for (name, count) in rows {
            lines.push(format!("{name:<28} {count:>8}"));
        }

        lines.push(String::new());
        let f = &self.failures;
        lines.push(format!(
            "Failures: {}  (invalid input: {}, degenerate fit: {}, insufficient data: {}, invalid config: {})",
            f.total(),
            f.invalid_input,
            f.degenerate_fit,
            f.insufficient_data,
            f.invalid_config,
        ));

        lines.join("\n")
    }
}
