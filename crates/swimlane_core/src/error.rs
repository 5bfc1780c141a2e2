//! Top-level error type for swimlane loading, rendering and export.

use thiserror::Error;

/// "Current action failed" errors.
///
/// An unmatched filter value is not an error; see [`crate::spec::SpecExportReport`].
#[derive(Debug, Error)]
pub enum SwimlaneError {
    /// Workbook could not be opened or a sheet could not be parsed.
    #[error("Failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),
    /// Dataframe construction or access failed.
    #[error("Dataframe error: {0}")]
    Dataframe(#[from] polars::prelude::PolarsError),
    /// Requested sheet is not part of the workbook.
    #[error("Sheet not found: {sheet:?} (available: {available:?})")]
    SheetNotFound {
        /// Requested sheet name.
        sheet: String,
        /// Sheet names present in the workbook.
        available: Vec<String>,
    },
    /// A role column is not part of the table.
    #[error("Column not found: {0:?}")]
    ColumnNotFound(String),
    /// Source id was never loaded into the session (or was invalidated).
    #[error("Unknown source: {0}")]
    UnknownSource(String),
    /// Option values out of range.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
    /// Generated SVG was rejected by the parser.
    #[error("Failed to parse generated SVG: {0}")]
    Svg(#[from] resvg::usvg::Error),
    /// Pixmap allocation or PNG encoding failed.
    #[error("Raster error: {0}")]
    Raster(String),
    /// Archive/package assembly failed.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// Filesystem or buffer IO failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T, E = SwimlaneError> = std::result::Result<T, E>;
