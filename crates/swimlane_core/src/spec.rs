//! Shared swimlane specification models.

use std::collections::HashMap;

use crate::conf::{
    C_COLOR_BOX_DEFAULT, N_BOX_HEIGHT, N_BOX_WIDTH, N_DPI_DEFAULT, N_FONT_SIZE_MAX,
    N_FONT_SIZE_MIN, N_LABEL_WRAP_CHARS_MAX, N_SLIDE_HEIGHT_IN, N_SLIDE_WIDTH_IN,
    N_TIGHT_PAD_INCHES,
};

////////////////////////////////////////////////////////////////////////////////
// #region TableModels

/// Mapping from table columns to semantic roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecColumnRoles {
    /// Column holding the lane (organizational role).
    pub col_lane: String,
    /// Column holding the activity description.
    pub col_label: String,
    /// Column holding the sequence key.
    pub col_order: String,
    /// Column whose distinct values scope one diagram each.
    pub col_filter: String,
    /// Optional column holding hex fill colors.
    pub col_color: Option<String>,
}

impl SpecColumnRoles {
    /// Columns the Layout Engine requires, in projection order.
    pub fn required_columns(&self) -> [&str; 3] {
        [&self.col_lane, &self.col_label, &self.col_order]
    }
}

/// One complete row of a filtered table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecActivityRecord {
    /// Lane name.
    pub lane: String,
    /// Free-text activity description.
    pub label: String,
    /// Sequence key, already coerced to text.
    pub order: String,
    /// Optional fill color as written in the source.
    pub color_hex: Option<String>,
}

/// Header and leading rows of a table, as display text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecTablePreview {
    /// Column names.
    pub columns: Vec<String>,
    /// Row cells; missing values are empty strings.
    pub rows: Vec<Vec<String>>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region LayoutOptions

/// Rounding applied when deriving a font size from line spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumFontSizeRounding {
    /// Drop the fractional part (default).
    #[default]
    Truncate,
    /// Round half away from zero.
    Round,
}

/// Result of fitting one label into a fixed box.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecTextFit {
    /// Wrapped lines, top to bottom.
    pub lines: Vec<String>,
    /// Font size in points.
    pub font_size: f64,
    /// Vertical distance between line centers (data units).
    pub line_spacing: f64,
}

/// Layout Engine options.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecLayoutOptions {
    /// Maximum characters per wrapped line.
    pub wrap_chars_max: usize,
    /// Activity box width inside a unit cell.
    pub box_width: f64,
    /// Activity box height inside a unit cell.
    pub box_height: f64,
    /// Fitted font size floor.
    pub font_size_min: f64,
    /// Fitted font size ceiling.
    pub font_size_max: f64,
    /// Rounding rule for fitted font sizes.
    pub rule_font_rounding: EnumFontSizeRounding,
    /// Fill used when a record carries no usable color.
    pub color_box_default: String,
    /// Leading text of the diagram title.
    pub title_prefix: String,
    /// Draw rotated sequence labels under the lanes.
    pub if_show_sequence_ticks: bool,
}

impl Default for SpecLayoutOptions {
    fn default() -> Self {
        Self {
            wrap_chars_max: N_LABEL_WRAP_CHARS_MAX,
            box_width: N_BOX_WIDTH,
            box_height: N_BOX_HEIGHT,
            font_size_min: N_FONT_SIZE_MIN,
            font_size_max: N_FONT_SIZE_MAX,
            rule_font_rounding: EnumFontSizeRounding::Truncate,
            color_box_default: C_COLOR_BOX_DEFAULT.to_string(),
            title_prefix: "Swimlane Diagram".to_string(),
            if_show_sequence_ticks: true,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DrawingInstructions

/// Horizontal text anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumTextAnchor {
    /// Text starts at the anchor.
    Start,
    /// Text is centered on the anchor.
    Middle,
    /// Text ends at the anchor.
    End,
}

/// Vertical text alignment relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumTextBaseline {
    /// Anchor sits on the text's top edge.
    Top,
    /// Anchor sits on the text's vertical center.
    Center,
    /// Anchor sits on the text's bottom edge.
    Bottom,
}

/// Filled rectangle in data coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecRect {
    /// Left edge.
    pub x: f64,
    /// Bottom edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Fill color.
    pub fill: String,
    /// Edge color; `None` strokes with the fill.
    pub edge: Option<String>,
    /// Edge width in points.
    pub edge_width: f64,
}

/// One text run anchored in data coordinates, shifted by a point offset.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecTextRun {
    /// Anchor x (data units).
    pub x: f64,
    /// Anchor y (data units).
    pub y: f64,
    /// Extra offset in points, `+x` right and `+y` down.
    pub offset_pt: (f64, f64),
    /// Text content.
    pub text: String,
    /// Font size in points.
    pub font_size: f64,
    /// Text color.
    pub color: String,
    /// Bold weight.
    pub bold: bool,
    /// Horizontal anchor.
    pub anchor: EnumTextAnchor,
    /// Vertical alignment.
    pub baseline: EnumTextBaseline,
    /// Counter-clockwise rotation in degrees around the anchor.
    pub rotation_deg: f64,
}

/// Abstract drawing instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumDrawOp {
    /// Filled rectangle.
    Rect(SpecRect),
    /// Text run.
    Text(SpecTextRun),
}

/// Distinct keys of one diagram axis with their grid positions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecAxisPlan {
    /// Keys in planning order (first-seen lanes, sorted sequences).
    pub keys: Vec<String>,
    /// Grid position of each key.
    pub positions: HashMap<String, usize>,
}

impl SpecAxisPlan {
    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the axis has no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Grid position of `key`.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.positions.get(key).copied()
    }
}

/// Fully laid out diagram for one filter value.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecDiagram {
    /// Title line.
    pub title: String,
    /// Plot area width (inches).
    pub width_in: f64,
    /// Plot area height (inches).
    pub height_in: f64,
    /// Visible data range on the x axis.
    pub x_lim: (f64, f64),
    /// Visible data range on the y axis.
    pub y_lim: (f64, f64),
    /// Lanes, in first-seen order.
    pub lanes: Vec<String>,
    /// Sequence keys, in sorted order.
    pub sequences: Vec<String>,
    /// Drawing instructions, back to front.
    pub ops: Vec<EnumDrawOp>,
    /// Non-fatal layout warnings (e.g. unusable colors).
    pub warnings: Vec<String>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RasterOptions

/// Rasterizer options.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecRasterOptions {
    /// Output resolution (dots per inch).
    pub dpi: f64,
    /// Padding around the tight bounding box (inches).
    pub tight_pad_inches: f64,
    /// Load system fonts into the text shaper.
    pub if_load_system_fonts: bool,
}

impl Default for SpecRasterOptions {
    fn default() -> Self {
        Self {
            dpi: N_DPI_DEFAULT,
            tight_pad_inches: N_TIGHT_PAD_INCHES,
            if_load_system_fonts: true,
        }
    }
}

/// PNG-encoded diagram with its pixel size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRenderedImage {
    /// PNG bytes.
    pub png: Vec<u8>,
    /// Pixel width.
    pub width_px: u32,
    /// Pixel height.
    pub height_px: u32,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportOptions

/// Slide deck geometry (inches unless noted).
#[derive(Debug, Clone, PartialEq)]
pub struct SpecDeckOptions {
    /// Slide width.
    pub slide_width_in: f64,
    /// Slide height.
    pub slide_height_in: f64,
    /// Title shape left edge.
    pub title_left_in: f64,
    /// Title shape top edge.
    pub title_top_in: f64,
    /// Title shape width.
    pub title_width_in: f64,
    /// Title shape height.
    pub title_height_in: f64,
    /// Title font size (points).
    pub title_font_size_pt: f64,
    /// Title shape fill (`RRGGBB`); `None` leaves it unfilled.
    pub title_fill: Option<String>,
    /// Picture left edge.
    pub image_left_in: f64,
    /// Picture top edge.
    pub image_top_in: f64,
    /// Picture width; height follows the image aspect ratio.
    pub image_width_in: f64,
}

impl Default for SpecDeckOptions {
    fn default() -> Self {
        Self {
            slide_width_in: N_SLIDE_WIDTH_IN,
            slide_height_in: N_SLIDE_HEIGHT_IN,
            title_left_in: 0.5,
            title_top_in: 0.2,
            title_width_in: 9.0,
            title_height_in: 0.5,
            title_font_size_pt: 20.0,
            title_fill: Some("4472C4".to_string()),
            image_left_in: 0.5,
            image_top_in: 0.9,
            image_width_in: 9.0,
        }
    }
}

/// PNG archive options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecArchiveOptions {
    /// Deflate entries instead of storing them.
    pub if_compress: bool,
}

/// Output form selected for one export call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumExportSink {
    /// Only the given filter value, as a raw PNG.
    Single(String),
    /// One slide per non-empty filter value.
    Document,
    /// One PNG entry per non-empty filter value.
    Archive,
}

/// Bytes produced by an export, with download hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecExportArtifact {
    /// Suggested file name.
    pub file_name: String,
    /// MIME type.
    pub mime: &'static str,
    /// Encoded payload.
    pub bytes: Vec<u8>,
}

/// Per-export report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecExportReport {
    /// Filter values that produced a diagram, in output order.
    pub values_rendered: Vec<String>,
    /// Filter values skipped because no row matched.
    pub values_skipped: Vec<String>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecExportReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

/// Export result: an artifact unless the call was aborted with a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecExportOutcome {
    /// Produced artifact, `None` when nothing was rendered for a single value.
    pub artifact: Option<SpecExportArtifact>,
    /// Rendered/skipped values and warnings.
    pub report: SpecExportReport,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
