use std::path::PathBuf;

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;
use swimlane_core::conf::derive_default_raster_options;
use swimlane_core::spec::{
    EnumExportSink, EnumFontSizeRounding, SpecArchiveOptions, SpecColumnRoles,
    SpecExportOutcome, SpecLayoutOptions,
};
use swimlane_core::table::{derive_filter_values, derive_table_preview};
use swimlane_core::{BatchExporter, SourceId, SwimlaneError, SwimlaneSession};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "swimlane.session.v1";
const C_BRIDGE_TRANSPORT: &str = "bytes";

#[pyclass(name = "ExportResult", frozen)]
struct PyExportResult {
    v_data: Option<Vec<u8>>,
    #[pyo3(get)]
    file_name: Option<String>,
    #[pyo3(get)]
    mime: Option<String>,
    #[pyo3(get)]
    values_rendered: Vec<String>,
    #[pyo3(get)]
    values_skipped: Vec<String>,
    #[pyo3(get)]
    warnings: Vec<String>,
}

#[pymethods]
impl PyExportResult {
    #[getter]
    fn data<'py>(&self, py: Python<'py>) -> Option<Bound<'py, PyBytes>> {
        self.v_data.as_deref().map(|v_bytes| PyBytes::new(py, v_bytes))
    }

    fn __repr__(&self) -> String {
        format!(
            "ExportResult(file_name={:?}, n_bytes={}, values_rendered={}, values_skipped={}, warnings={})",
            self.file_name,
            self.v_data.as_ref().map_or(0, Vec::len),
            self.values_rendered.len(),
            self.values_skipped.len(),
            self.warnings.len()
        )
    }
}

impl From<SpecExportOutcome> for PyExportResult {
    fn from(outcome: SpecExportOutcome) -> Self {
        let (v_data, file_name, mime) = match outcome.artifact {
            Some(artifact) => (
                Some(artifact.bytes),
                Some(artifact.file_name),
                Some(artifact.mime.to_string()),
            ),
            None => (None, None, None),
        };
        Self {
            v_data,
            file_name,
            mime,
            values_rendered: outcome.report.values_rendered,
            values_skipped: outcome.report.values_skipped,
            warnings: outcome.report.warnings,
        }
    }
}

#[pyclass(name = "SwimlaneSession", unsendable)]
struct PySwimlaneSession {
    inner: SwimlaneSession,
}

#[pymethods]
impl PySwimlaneSession {
    #[new]
    fn new() -> Self {
        Self {
            inner: SwimlaneSession::new(),
        }
    }

    fn load_source(&mut self, name: &str, data: &[u8]) -> PyResult<String> {
        let source_id = self
            .inner
            .load_source(name, data.to_vec())
            .map_err(convert_error)?;
        Ok(source_id.to_string())
    }

    fn load_source_file(&mut self, path: PathBuf) -> PyResult<String> {
        let source_id = self.inner.load_source_file(&path).map_err(convert_error)?;
        Ok(source_id.to_string())
    }

    fn sheet_names(&self, source_id: &str) -> PyResult<Vec<String>> {
        let l_names = self
            .inner
            .sheet_names(&SourceId::from(source_id))
            .map_err(convert_error)?;
        Ok(l_names.to_vec())
    }

    #[pyo3(signature = (source_id, sheet_name, n_rows = 10))]
    fn preview(
        &mut self,
        source_id: &str,
        sheet_name: &str,
        n_rows: usize,
    ) -> PyResult<(Vec<String>, Vec<Vec<String>>)> {
        let df = self
            .inner
            .sheet(&SourceId::from(source_id), sheet_name)
            .map_err(convert_error)?;
        let preview = derive_table_preview(df, n_rows).map_err(convert_error)?;
        Ok((preview.columns, preview.rows))
    }

    fn filter_values(
        &mut self,
        source_id: &str,
        sheet_name: &str,
        col_filter: &str,
    ) -> PyResult<Vec<String>> {
        let df = self
            .inner
            .sheet(&SourceId::from(source_id), sheet_name)
            .map_err(convert_error)?;
        derive_filter_values(df, col_filter).map_err(convert_error)
    }

    #[pyo3(signature = (
        source_id,
        sheet_name,
        col_lane,
        col_label,
        col_order,
        col_filter,
        sink,
        value = None,
        col_color = None,
        dpi = None,
        title_prefix = None,
        rule_font_rounding = None,
        if_compress = false
    ))]
    #[allow(clippy::too_many_arguments)]
    fn export(
        &mut self,
        source_id: &str,
        sheet_name: &str,
        col_lane: &str,
        col_label: &str,
        col_order: &str,
        col_filter: &str,
        sink: &str,
        value: Option<String>,
        col_color: Option<String>,
        dpi: Option<f64>,
        title_prefix: Option<String>,
        rule_font_rounding: Option<&str>,
        if_compress: bool,
    ) -> PyResult<PyExportResult> {
        let sink = parse_export_sink(sink, value)?;
        let roles = SpecColumnRoles {
            col_lane: col_lane.to_string(),
            col_label: col_label.to_string(),
            col_order: col_order.to_string(),
            col_filter: col_filter.to_string(),
            col_color,
        };

        let mut cfg_layout = SpecLayoutOptions::default();
        if let Some(prefix) = title_prefix {
            cfg_layout.title_prefix = prefix;
        }
        if let Some(rule) = rule_font_rounding {
            cfg_layout.rule_font_rounding = parse_rule_font_rounding(rule)?;
        }
        let mut cfg_raster = derive_default_raster_options();
        if let Some(n_dpi) = dpi {
            cfg_raster.dpi = n_dpi;
        }

        let exporter = BatchExporter::new(roles, cfg_raster)
            .map_err(convert_error)?
            .with_layout_options(cfg_layout)
            .with_archive_options(SpecArchiveOptions { if_compress });
        let df = self
            .inner
            .sheet(&SourceId::from(source_id), sheet_name)
            .map_err(convert_error)?;
        let outcome = exporter.export(df, &sink).map_err(convert_error)?;
        Ok(PyExportResult::from(outcome))
    }

    /// Drop a source and its parsed sheets. Returns whether it was loaded.
    fn invalidate(&mut self, source_id: &str) -> bool {
        self.inner.invalidate(&SourceId::from(source_id))
    }

    fn clear(&mut self) {
        self.inner.clear();
    }

    fn sheet_parse_count(&self) -> usize {
        self.inner.sheet_parse_count()
    }
}

fn parse_export_sink(sink: &str, value: Option<String>) -> PyResult<EnumExportSink> {
    match (sink, value) {
        ("single", Some(value)) => Ok(EnumExportSink::Single(value)),
        ("single", None) => Err(PyValueError::new_err(
            "sink='single' requires a filter value.",
        )),
        ("document", _) => Ok(EnumExportSink::Document),
        ("archive", _) => Ok(EnumExportSink::Archive),
        (other, _) => Err(PyValueError::new_err(format!(
            "Invalid sink: {other:?}. Expected 'single', 'document' or 'archive'."
        ))),
    }
}

fn parse_rule_font_rounding(value: &str) -> PyResult<EnumFontSizeRounding> {
    match value {
        "truncate" => Ok(EnumFontSizeRounding::Truncate),
        "round" => Ok(EnumFontSizeRounding::Round),
        _ => Err(PyValueError::new_err(
            "Invalid rule_font_rounding. Expected 'truncate' or 'round'.",
        )),
    }
}

fn convert_error(err: SwimlaneError) -> PyErr {
    match err {
        SwimlaneError::SheetNotFound { .. }
        | SwimlaneError::ColumnNotFound(_)
        | SwimlaneError::UnknownSource(_)
        | SwimlaneError::InvalidOptions(_)
        | SwimlaneError::Workbook(_) => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

#[pymodule]
fn _swimlane_rs(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PySwimlaneSession>()?;
    module.add_class::<PyExportResult>()?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}

