//! Swimlane layout constants and default preset factories.

use crate::spec::{
    SpecArchiveOptions, SpecDeckOptions, SpecLayoutOptions, SpecRasterOptions,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellGeometry

/// Horizontal inset of an activity box from its cell origin.
pub const N_BOX_INSET_X: f64 = 0.05;
/// Vertical inset of an activity box from its cell origin.
pub const N_BOX_INSET_Y: f64 = 0.1;
/// Activity box width inside a 1x1 cell.
pub const N_BOX_WIDTH: f64 = 0.9;
/// Activity box height inside a 1x1 cell.
pub const N_BOX_HEIGHT: f64 = 0.8;
/// Lane name anchor, in data units left of the first column.
pub const N_LANE_LABEL_OFFSET_X: f64 = -0.3;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Typography

/// Maximum characters per wrapped label line.
pub const N_LABEL_WRAP_CHARS_MAX: usize = 28;
/// Lower bound of the fitted activity font size (points).
pub const N_FONT_SIZE_MIN: f64 = 4.0;
/// Upper bound of the fitted activity font size (points).
pub const N_FONT_SIZE_MAX: f64 = 10.0;
/// Multiplier from line spacing (data units) to font size (points).
pub const N_FONT_SIZE_PER_SPACING: f64 = 10.0;
/// Lane name font size (points).
pub const N_FONT_SIZE_LANE: f64 = 10.0;
/// Sequence tick label font size (points).
pub const N_FONT_SIZE_TICK: f64 = 7.0;
/// Title font size (points).
pub const N_FONT_SIZE_TITLE: f64 = 13.0;
/// Sequence tick label rotation (degrees, counter-clockwise).
pub const N_TICK_ROTATION_DEG: f64 = 45.0;
/// Font family list emitted into SVG text runs.
pub const C_FONT_FAMILY: &str = "DejaVu Sans, Arial, Helvetica, sans-serif";

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Colors

/// Activity box fill when no usable color is supplied.
pub const C_COLOR_BOX_DEFAULT: &str = "#034E2B";
/// Lane band fill.
pub const C_COLOR_LANE_BAND: &str = "#F5F5F5";
/// Lane band edge.
pub const C_COLOR_LANE_EDGE: &str = "#000000";
/// Lane label and title text color.
pub const C_COLOR_TEXT_DARK: &str = "#333333";
/// Activity label text color.
pub const C_COLOR_TEXT_BOX: &str = "#FFFFFF";
/// Canvas background.
pub const C_COLOR_BACKGROUND: &str = "#FFFFFF";
/// Lane band edge width (points).
pub const N_LANE_EDGE_WIDTH: f64 = 0.8;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Canvas

/// Minimum canvas width (inches).
pub const N_CANVAS_WIDTH_MIN: f64 = 12.0;
/// Minimum canvas height (inches).
pub const N_CANVAS_HEIGHT_MIN: f64 = 6.0;
/// Canvas width growth per sequence column (inches).
pub const N_CANVAS_WIDTH_PER_SEQUENCE: f64 = 1.5;
/// Canvas height growth per lane (inches).
pub const N_CANVAS_HEIGHT_PER_LANE: f64 = 0.9;
/// Points per inch.
pub const N_POINTS_PER_INCH: f64 = 72.0;
/// Default raster resolution.
pub const N_DPI_DEFAULT: f64 = 300.0;
/// Padding added around the tight bounding box (inches).
pub const N_TIGHT_PAD_INCHES: f64 = 0.1;
/// Largest pixmap side accepted by the rasterizer.
pub const N_RASTER_SIDE_PX_MAX: u32 = 32_767;

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Document

/// EMU per inch in OOXML drawing coordinates.
pub const N_EMU_PER_INCH: i64 = 914_400;
/// Default slide width (inches, 4:3).
pub const N_SLIDE_WIDTH_IN: f64 = 10.0;
/// Default slide height (inches, 4:3).
pub const N_SLIDE_HEIGHT_IN: f64 = 7.5;

/// Suggested file name for a single diagram (`{}` is the sanitized filter value).
pub const C_FILE_STEM_SINGLE: &str = "swimlane_diagram";
/// Suggested file name for the slide deck.
pub const C_FILE_NAME_DECK: &str = "swimlane_diagrams.pptx";
/// Suggested file name for the PNG archive.
pub const C_FILE_NAME_ARCHIVE: &str = "swimlane_diagrams.zip";

/// MIME type of a rendered diagram.
pub const C_MIME_PNG: &str = "image/png";
/// MIME type of the slide deck.
pub const C_MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
/// MIME type of the PNG archive.
pub const C_MIME_ZIP: &str = "application/zip";

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Presets

/// Build default layout options.
pub fn derive_default_layout_options() -> SpecLayoutOptions {
    SpecLayoutOptions::default()
}

/// Build default raster options.
pub fn derive_default_raster_options() -> SpecRasterOptions {
    SpecRasterOptions::default()
}

/// Build default slide deck options.
pub fn derive_default_deck_options() -> SpecDeckOptions {
    SpecDeckOptions::default()
}

/// Build default archive options.
pub fn derive_default_archive_options() -> SpecArchiveOptions {
    SpecArchiveOptions::default()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
