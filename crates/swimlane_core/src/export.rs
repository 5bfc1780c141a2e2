//! Batch export driver: one diagram per filter value, routed into a sink.

use std::collections::BTreeSet;
use std::io::{Cursor, Write};

use polars::prelude::DataFrame;
use zip::ZipWriter;

use crate::conf::{
    C_FILE_NAME_ARCHIVE, C_FILE_NAME_DECK, C_FILE_STEM_SINGLE, C_MIME_PNG, C_MIME_PPTX,
    C_MIME_ZIP,
};
use crate::error::{Result, SwimlaneError};
use crate::layout::validate_layout_options;
use crate::pptx::{DeckBuilder, validate_deck_options};
use crate::render::DiagramRenderer;
use crate::spec::{
    EnumExportSink, SpecArchiveOptions, SpecColumnRoles, SpecDeckOptions, SpecExportArtifact,
    SpecExportOutcome, SpecExportReport, SpecLayoutOptions, SpecRasterOptions,
    SpecRenderedImage,
};
use crate::table::{derive_filter_values, filter_rows_by_value, validate_column_roles};
use crate::util::{derive_zip_entry_options, sanitize_file_stem};

/// Character substituted for anything outside `[alnum, space, _, -]` in file names.
const C_FILE_NAME_REPLACEMENT: char = '_';

/// Archive entry name for a filter value.
pub fn derive_archive_entry_name(value: &str) -> String {
    format!("{}.png", sanitize_file_stem(value, C_FILE_NAME_REPLACEMENT))
}

/// Download name for a single rendered value.
pub fn derive_single_file_name(value: &str) -> String {
    format!(
        "{C_FILE_STEM_SINGLE}_{}.png",
        sanitize_file_stem(value, C_FILE_NAME_REPLACEMENT)
    )
}

////////////////////////////////////////////////////////////////////////////////
// #region Sinks

/// Flat PNG archive being assembled in memory.
struct ArchiveSink {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SpecArchiveOptions,
    set_entry_names: BTreeSet<String>,
}

impl ArchiveSink {
    fn new(options: SpecArchiveOptions) -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options,
            set_entry_names: BTreeSet::new(),
        }
    }

    /// Add one PNG; names colliding after sanitizing get a numeric suffix.
    fn add(
        &mut self,
        value: &str,
        image: &SpecRenderedImage,
        report: &mut SpecExportReport,
    ) -> Result<()> {
        let c_name_base = derive_archive_entry_name(value);
        let c_name = self.derive_unique_entry_name(&c_name_base);
        if c_name != c_name_base {
            let msg = format!(
                "Archive entry {c_name_base:?} already used; value {value:?} written as {c_name:?}."
            );
            tracing::warn!("{msg}");
            report.warn(msg);
        }

        self.writer
            .start_file(c_name, derive_zip_entry_options(self.options.if_compress))?;
        self.writer.write_all(&image.png)?;
        Ok(())
    }

    fn derive_unique_entry_name(&mut self, name: &str) -> String {
        if !self.set_entry_names.contains(name) {
            self.set_entry_names.insert(name.to_string());
            return name.to_string();
        }

        let c_stem = name.strip_suffix(".png").unwrap_or(name);
        let mut n_idx = 2usize;
        loop {
            let candidate = format!("{c_stem}_{n_idx}.png");
            if !self.set_entry_names.contains(&candidate) {
                self.set_entry_names.insert(candidate.clone());
                return candidate;
            }
            n_idx += 1;
        }
    }

    fn finish(self) -> Result<Vec<u8>> {
        Ok(self.writer.finish()?.into_inner())
    }
}

enum EnumBatchSink {
    Document(DeckBuilder),
    Archive(ArchiveSink),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region BatchExporter

/// Renders filtered subsets of one table and packages the images.
pub struct BatchExporter {
    roles: SpecColumnRoles,
    layout_options: SpecLayoutOptions,
    deck_options: SpecDeckOptions,
    archive_options: SpecArchiveOptions,
    renderer: DiagramRenderer,
}

impl BatchExporter {
    /// Create an exporter; raster options are validated and fonts loaded here.
    pub fn new(roles: SpecColumnRoles, raster_options: SpecRasterOptions) -> Result<Self> {
        Ok(Self {
            roles,
            layout_options: SpecLayoutOptions::default(),
            deck_options: SpecDeckOptions::default(),
            archive_options: SpecArchiveOptions::default(),
            renderer: DiagramRenderer::new(raster_options)?,
        })
    }

    pub fn with_layout_options(mut self, options: SpecLayoutOptions) -> Self {
        self.layout_options = options;
        self
    }

    pub fn with_deck_options(mut self, options: SpecDeckOptions) -> Self {
        self.deck_options = options;
        self
    }

    pub fn with_archive_options(mut self, options: SpecArchiveOptions) -> Self {
        self.archive_options = options;
        self
    }

    pub fn roles(&self) -> &SpecColumnRoles {
        &self.roles
    }

    /// Export into `sink`.
    ///
    /// Document and Archive iterate every distinct filter value in sorted
    /// order. Values without matching rows are skipped and reported.
    pub fn export(&self, df: &DataFrame, sink: &EnumExportSink) -> Result<SpecExportOutcome> {
        self.validate(df, sink)?;
        match sink {
            EnumExportSink::Single(value) => self.export_single(df, value),
            EnumExportSink::Document | EnumExportSink::Archive => {
                let l_values = derive_filter_values(df, &self.roles.col_filter)?;
                self.export_batch(df, &l_values, sink)
            }
        }
    }

    /// Export a caller-chosen list of filter values, in the given order.
    pub fn export_values(
        &self,
        df: &DataFrame,
        l_values: &[String],
        sink: &EnumExportSink,
    ) -> Result<SpecExportOutcome> {
        self.validate(df, sink)?;
        match sink {
            EnumExportSink::Single(_) => Err(SwimlaneError::InvalidOptions(
                "export_values needs a Document or Archive sink".to_string(),
            )),
            EnumExportSink::Document | EnumExportSink::Archive => {
                self.export_batch(df, l_values, sink)
            }
        }
    }

    fn validate(&self, df: &DataFrame, sink: &EnumExportSink) -> Result<()> {
        validate_column_roles(df, &self.roles)?;
        validate_layout_options(&self.layout_options)?;
        if matches!(sink, EnumExportSink::Document) {
            validate_deck_options(&self.deck_options)?;
        }
        Ok(())
    }

    fn export_single(&self, df: &DataFrame, value: &str) -> Result<SpecExportOutcome> {
        let mut report = SpecExportReport::default();
        let Some(image) = self.render_value(df, value, &mut report)? else {
            let msg = format!(
                "No rows where {} = {value:?}; nothing rendered.",
                self.roles.col_filter
            );
            tracing::warn!("{msg}");
            report.warn(msg);
            return Ok(SpecExportOutcome {
                artifact: None,
                report,
            });
        };

        tracing::info!(value, n_bytes = image.png.len(), "single diagram exported");
        Ok(SpecExportOutcome {
            artifact: Some(SpecExportArtifact {
                file_name: derive_single_file_name(value),
                mime: C_MIME_PNG,
                bytes: image.png,
            }),
            report,
        })
    }

    fn export_batch(
        &self,
        df: &DataFrame,
        l_values: &[String],
        sink: &EnumExportSink,
    ) -> Result<SpecExportOutcome> {
        let mut report = SpecExportReport::default();
        let mut sink_batch = match sink {
            EnumExportSink::Archive => {
                EnumBatchSink::Archive(ArchiveSink::new(self.archive_options.clone()))
            }
            _ => EnumBatchSink::Document(DeckBuilder::new(self.deck_options.clone())),
        };

        for value in l_values {
            let Some(image) = self.render_value(df, value, &mut report)? else {
                continue;
            };
            match &mut sink_batch {
                EnumBatchSink::Document(deck) => deck.add_slide(value.as_str(), image),
                EnumBatchSink::Archive(archive) => archive.add(value, &image, &mut report)?,
            }
        }

        let artifact = match sink_batch {
            EnumBatchSink::Document(deck) => SpecExportArtifact {
                file_name: C_FILE_NAME_DECK.to_string(),
                mime: C_MIME_PPTX,
                bytes: deck.finish()?,
            },
            EnumBatchSink::Archive(archive) => SpecExportArtifact {
                file_name: C_FILE_NAME_ARCHIVE.to_string(),
                mime: C_MIME_ZIP,
                bytes: archive.finish()?,
            },
        };

        tracing::info!(
            file_name = %artifact.file_name,
            n_rendered = report.values_rendered.len(),
            n_skipped = report.values_skipped.len(),
            n_bytes = artifact.bytes.len(),
            "batch export finished"
        );
        Ok(SpecExportOutcome {
            artifact: Some(artifact),
            report,
        })
    }

    /// Render one filter value; `None` when no row matches.
    fn render_value(
        &self,
        df: &DataFrame,
        value: &str,
        report: &mut SpecExportReport,
    ) -> Result<Option<SpecRenderedImage>> {
        let df_filtered = filter_rows_by_value(df, &self.roles.col_filter, value)?;
        if df_filtered.height() == 0 {
            tracing::warn!(value, "no matching rows; value skipped");
            report.values_skipped.push(value.to_string());
            return Ok(None);
        }

        let (image, diagram) =
            self.renderer
                .render_table(&df_filtered, &self.roles, value, &self.layout_options)?;
        for msg in diagram.warnings {
            report.warn(msg);
        }
        report.values_rendered.push(value.to_string());
        Ok(Some(image))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::io::Read;

    use polars::prelude::Column;
    use zip::ZipArchive;

    use super::*;

    fn create_roles() -> SpecColumnRoles {
        SpecColumnRoles {
            col_lane: "Role".to_string(),
            col_label: "Step".to_string(),
            col_order: "Seq".to_string(),
            col_filter: "Flow".to_string(),
            col_color: None,
        }
    }

    fn create_table() -> DataFrame {
        DataFrame::new(vec![
            Column::new("Role".into(), vec!["Clerk", "Manager", "Clerk", "Clerk"]),
            Column::new("Step".into(), vec!["Receive", "Approve", "Ship", "Bill"]),
            Column::new("Seq".into(), vec![1i64, 2, 1, 2]),
            Column::new("Flow".into(), vec!["Buy", "Buy", "A/B: C", "A:B: C"]),
        ])
        .expect("dataframe")
    }

    fn create_exporter() -> BatchExporter {
        let raster_options = SpecRasterOptions {
            dpi: 24.0,
            tight_pad_inches: 0.1,
            if_load_system_fonts: false,
        };
        BatchExporter::new(create_roles(), raster_options).expect("exporter")
    }

    #[test]
    fn test_derive_names_replace_unsafe_chars() {
        assert_eq!(derive_archive_entry_name("A/B: C"), "A_B_ C.png");
        assert_eq!(
            derive_single_file_name("Buy-1 now"),
            "swimlane_diagram_Buy-1 now.png"
        );
    }

    #[test]
    fn test_export_single_returns_png() {
        let outcome = create_exporter()
            .export(&create_table(), &EnumExportSink::Single("Buy".to_string()))
            .expect("export");
        let artifact = outcome.artifact.expect("artifact");
        assert_eq!(artifact.file_name, "swimlane_diagram_Buy.png");
        assert_eq!(artifact.mime, "image/png");
        assert_eq!(&artifact.bytes[1..4], b"PNG");
        assert_eq!(outcome.report.values_rendered, vec!["Buy"]);
        assert!(outcome.report.warnings.is_empty());
    }

    #[test]
    fn test_export_single_without_rows_warns() {
        let outcome = create_exporter()
            .export(&create_table(), &EnumExportSink::Single("Sell".to_string()))
            .expect("export");
        assert!(outcome.artifact.is_none());
        assert_eq!(outcome.report.values_skipped, vec!["Sell"]);
        assert_eq!(outcome.report.warnings.len(), 1);
    }

    #[test]
    fn test_export_archive_writes_sanitized_entries_and_dedupes() {
        let outcome = create_exporter()
            .export(&create_table(), &EnumExportSink::Archive)
            .expect("export");
        let artifact = outcome.artifact.expect("artifact");
        assert_eq!(artifact.file_name, "swimlane_diagrams.zip");

        let mut archive = ZipArchive::new(Cursor::new(artifact.bytes)).expect("zip");
        let mut l_names: Vec<String> = archive.file_names().map(ToString::to_string).collect();
        l_names.sort();
        assert_eq!(l_names, vec!["A_B_ C.png", "A_B_ C_2.png", "Buy.png"]);
        assert_eq!(outcome.report.values_rendered, vec!["A/B: C", "A:B: C", "Buy"]);
        assert_eq!(outcome.report.warnings.len(), 1);

        let mut v_png = Vec::new();
        archive
            .by_name("Buy.png")
            .expect("entry")
            .read_to_end(&mut v_png)
            .expect("read");
        assert_eq!(&v_png[1..4], b"PNG");
    }

    #[test]
    fn test_export_values_skips_empty_subsets() {
        let l_values = vec!["Buy".to_string(), "Sell".to_string()];
        let outcome = create_exporter()
            .export_values(&create_table(), &l_values, &EnumExportSink::Document)
            .expect("export");
        assert_eq!(outcome.report.values_rendered, vec!["Buy"]);
        assert_eq!(outcome.report.values_skipped, vec!["Sell"]);

        let artifact = outcome.artifact.expect("artifact");
        assert_eq!(artifact.file_name, "swimlane_diagrams.pptx");
        let mut archive = ZipArchive::new(Cursor::new(artifact.bytes)).expect("zip");
        assert!(archive.by_name("ppt/slides/slide1.xml").is_ok());
        assert!(archive.by_name("ppt/slides/slide2.xml").is_err());
    }

    #[test]
    fn test_export_values_rejects_single_sink() {
        let result = create_exporter().export_values(
            &create_table(),
            &[],
            &EnumExportSink::Single("Buy".to_string()),
        );
        assert!(matches!(result, Err(SwimlaneError::InvalidOptions(_))));
    }

    #[test]
    fn test_export_reports_missing_role_column() {
        let exporter = BatchExporter {
            roles: SpecColumnRoles {
                col_lane: "Lane".to_string(),
                ..create_roles()
            },
            ..create_exporter()
        };
        let result = exporter.export(&create_table(), &EnumExportSink::Document);
        assert!(matches!(result, Err(SwimlaneError::ColumnNotFound(col)) if col == "Lane"));
    }
}
