//! Per-session cache of loaded workbooks and parsed sheets.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::path::Path;

use polars::prelude::DataFrame;

use crate::error::{Result, SwimlaneError};
use crate::table::{WorkbookSource, list_sheet_names, open_workbook_from_bytes, read_sheet};

/// Content-derived identity of a loaded workbook (BLAKE3 of its bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(String);

impl SourceId {
    /// Derive the identity of `v_bytes`.
    pub fn from_bytes(v_bytes: &[u8]) -> Self {
        Self(blake3::hash(v_bytes).to_hex().to_string())
    }

    /// Hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

struct SpecLoadedSource {
    name: String,
    workbook: WorkbookSource,
    sheet_names: Vec<String>,
}

/// Loaded sources and parsed sheets for one interactive session.
///
/// Sheets are keyed by `(source, sheet name)`; selecting the same pair again
/// returns the cached dataframe without re-parsing.
#[derive(Default)]
pub struct SwimlaneSession {
    dict_sources: HashMap<SourceId, SpecLoadedSource>,
    dict_sheets: HashMap<(SourceId, String), DataFrame>,
    n_sheet_parses: usize,
}

impl SwimlaneSession {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register workbook bytes under a display `name`.
    ///
    /// Loading identical bytes again is a cache hit and keeps parsed sheets.
    pub fn load_source(&mut self, name: &str, v_bytes: Vec<u8>) -> Result<SourceId> {
        let source_id = SourceId::from_bytes(&v_bytes);
        if self.dict_sources.contains_key(&source_id) {
            tracing::debug!(%source_id, name, "workbook cache hit");
            return Ok(source_id);
        }

        let workbook = open_workbook_from_bytes(v_bytes)?;
        let sheet_names = list_sheet_names(&workbook);
        tracing::debug!(%source_id, name, n_sheets = sheet_names.len(), "workbook loaded");
        self.dict_sources.insert(
            source_id.clone(),
            SpecLoadedSource {
                name: name.to_string(),
                workbook,
                sheet_names,
            },
        );
        Ok(source_id)
    }

    /// Read a workbook file and register it under its file name.
    pub fn load_source_file(&mut self, path: &Path) -> Result<SourceId> {
        let v_bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|val| val.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        self.load_source(&name, v_bytes)
    }

    /// Display name given when the source was loaded.
    pub fn source_name(&self, source_id: &SourceId) -> Result<&str> {
        Ok(self.get_source(source_id)?.name.as_str())
    }

    /// Sheet names of a loaded source, in workbook order.
    pub fn sheet_names(&self, source_id: &SourceId) -> Result<&[String]> {
        Ok(&self.get_source(source_id)?.sheet_names)
    }

    /// Parsed sheet, reading it on first access.
    pub fn sheet(&mut self, source_id: &SourceId, sheet_name: &str) -> Result<&DataFrame> {
        match self
            .dict_sheets
            .entry((source_id.clone(), sheet_name.to_string()))
        {
            Entry::Occupied(entry) => {
                tracing::debug!(%source_id, sheet_name, "sheet cache hit");
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let source = self
                    .dict_sources
                    .get_mut(source_id)
                    .ok_or_else(|| SwimlaneError::UnknownSource(source_id.to_string()))?;
                let df = read_sheet(&mut source.workbook, sheet_name)?;
                self.n_sheet_parses += 1;
                tracing::debug!(
                    %source_id,
                    sheet_name,
                    n_rows = df.height(),
                    n_cols = df.width(),
                    "sheet parsed"
                );
                Ok(entry.insert(df))
            }
        }
    }

    /// Drop a source and every sheet parsed from it. Returns whether it was loaded.
    pub fn invalidate(&mut self, source_id: &SourceId) -> bool {
        self.dict_sheets.retain(|(id, _), _| id != source_id);
        self.dict_sources.remove(source_id).is_some()
    }

    /// Drop every cached source and sheet.
    pub fn clear(&mut self) {
        self.dict_sheets.clear();
        self.dict_sources.clear();
    }

    /// Number of sheet parses performed so far (cache misses).
    pub fn sheet_parse_count(&self) -> usize {
        self.n_sheet_parses
    }

    fn get_source(&self, source_id: &SourceId) -> Result<&SpecLoadedSource> {
        self.dict_sources
            .get(source_id)
            .ok_or_else(|| SwimlaneError::UnknownSource(source_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_workbook_bytes(role: &str) -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Steps").expect("sheet name");
        worksheet.write(0, 0, "Role").expect("header");
        worksheet.write(0, 1, "Seq").expect("header");
        worksheet.write(1, 0, role).expect("cell");
        worksheet.write(1, 1, 1).expect("cell");
        workbook.add_worksheet().set_name("Notes").expect("sheet name");
        workbook.save_to_buffer().expect("xlsx bytes")
    }

    #[test]
    fn test_sheet_is_parsed_once_per_source_and_name() {
        let mut session = SwimlaneSession::new();
        let source_id = session
            .load_source("steps.xlsx", create_workbook_bytes("Clerk"))
            .expect("load");

        assert_eq!(
            session.sheet_names(&source_id).expect("names"),
            &["Steps".to_string(), "Notes".to_string()]
        );
        assert_eq!(session.sheet(&source_id, "Steps").expect("sheet").height(), 1);
        assert_eq!(session.sheet(&source_id, "Steps").expect("sheet").height(), 1);
        assert_eq!(session.sheet_parse_count(), 1);

        let source_id_again = session
            .load_source("renamed.xlsx", create_workbook_bytes("Clerk"))
            .expect("load");
        assert_eq!(source_id_again, source_id);
        session.sheet(&source_id, "Steps").expect("sheet");
        assert_eq!(session.sheet_parse_count(), 1);
        assert_eq!(session.source_name(&source_id).expect("name"), "steps.xlsx");
    }

    #[test]
    fn test_invalidate_forces_reparse() {
        let mut session = SwimlaneSession::new();
        let v_bytes = create_workbook_bytes("Clerk");
        let source_id = session.load_source("a.xlsx", v_bytes.clone()).expect("load");
        session.sheet(&source_id, "Steps").expect("sheet");

        assert!(session.invalidate(&source_id));
        assert!(!session.invalidate(&source_id));
        assert!(matches!(
            session.sheet(&source_id, "Steps"),
            Err(SwimlaneError::UnknownSource(_))
        ));

        let source_id = session.load_source("a.xlsx", v_bytes).expect("load");
        session.sheet(&source_id, "Steps").expect("sheet");
        assert_eq!(session.sheet_parse_count(), 2);
    }

    #[test]
    fn test_distinct_bytes_are_distinct_sources() {
        let mut session = SwimlaneSession::new();
        let id_a = session
            .load_source("a.xlsx", create_workbook_bytes("Clerk"))
            .expect("load");
        let id_b = session
            .load_source("b.xlsx", create_workbook_bytes("Manager"))
            .expect("load");
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn test_unknown_sheet_is_reported() {
        let mut session = SwimlaneSession::new();
        let source_id = session
            .load_source("a.xlsx", create_workbook_bytes("Clerk"))
            .expect("load");
        let err = session.sheet(&source_id, "Missing").expect_err("must fail");
        assert!(matches!(err, SwimlaneError::SheetNotFound { sheet, .. } if sheet == "Missing"));
        assert_eq!(session.sheet_parse_count(), 0);
    }
}
