//! strokefit-export: Pure format parsers and serializers (sans-IO)
//!
//! Reads drawings from CSV point rows or SVG path data, and writes a
//! drawing (optionally with its analysis overlaid) back out as SVG.

pub mod csv;
pub mod error;
pub mod svg;
pub mod svg_import;

pub use csv::parse_csv;
pub use error::FormatError;
pub use svg::{SvgMetadata, build_path_data, to_svg};
pub use svg_import::{parse_path_data, parse_svg};
