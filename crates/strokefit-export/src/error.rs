//! Errors produced while reading drawings.

/// Errors from [`parse_csv`](crate::parse_csv) and
/// [`parse_svg`](crate::parse_svg).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// A CSV row could not be parsed.
    #[error("CSV line {line}: {message}")]
    Csv {
        /// 1-based line number of the offending row.
        line: usize,
        /// What was wrong with it.
        message: String,
    },

    /// The SVG document or one of its path `d` attributes is malformed.
    #[error("SVG: {0}")]
    Svg(String),

    /// The input parsed but contains no polylines.
    #[error("input contains no polylines")]
    Empty,
}
