//! `swimlane_core` v1:
//! Swimlane diagram kernel: workbook loading, layout, rendering, export.
//!
//! Module layout:
//! - `conf`    : constants and default presets
//! - `spec`    : specs/models/options
//! - `error`   : crate error type
//! - `util`    : pure helper functions (wrapping, text fitting, naming)
//! - `table`   : workbook reading and role projection
//! - `session` : per-session source/sheet cache
//! - `layout`  : lane/sequence planning and drawing instructions
//! - `render`  : SVG emission and PNG rasterization
//! - `pptx`    : slide deck writer
//! - `export`  : batch export driver
pub mod conf;
pub mod error;
pub mod export;
pub mod layout;
pub mod pptx;
pub mod render;
pub mod session;
pub mod spec;
pub mod table;
pub mod util;

pub use conf::{
    C_FILE_NAME_ARCHIVE, C_FILE_NAME_DECK, C_MIME_PNG, C_MIME_PPTX, C_MIME_ZIP,
    derive_default_archive_options, derive_default_deck_options, derive_default_layout_options,
    derive_default_raster_options,
};
pub use error::{Result, SwimlaneError};
pub use export::{BatchExporter, derive_archive_entry_name, derive_single_file_name};
pub use layout::{
    calculate_canvas_size, derive_diagram_title, layout_diagram, layout_filtered_table,
    plan_lanes, plan_sequences, validate_layout_options,
};
pub use pptx::{DeckBuilder, validate_deck_options};
pub use render::{DiagramRenderer, render_svg, validate_raster_options};
pub use session::{SourceId, SwimlaneSession};
pub use spec::{
    EnumDrawOp, EnumExportSink, EnumFontSizeRounding, EnumTextAnchor, EnumTextBaseline,
    SpecActivityRecord, SpecArchiveOptions, SpecAxisPlan, SpecColumnRoles, SpecDeckOptions,
    SpecDiagram, SpecExportArtifact, SpecExportOutcome, SpecExportReport, SpecLayoutOptions,
    SpecRasterOptions, SpecRect, SpecRenderedImage, SpecTablePreview, SpecTextFit, SpecTextRun,
};
pub use table::{
    derive_filter_values, derive_table_preview, extract_activity_records, filter_rows_by_value,
    list_sheet_names, read_sheet, validate_column_roles,
};
pub use util::{fit_text, sanitize_file_stem, wrap_text};
