//! Workbook reading and table projection onto swimlane roles.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

use calamine::{Data, ExcelDateTime, Range, Reader, Sheets, open_workbook_auto_from_rs};
use chrono::{NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use polars::prelude::{AnyValue, BooleanChunked, Column, DataFrame, NewChunkedArray, PlSmallStr};

use crate::error::{Result, SwimlaneError};
use crate::spec::{SpecActivityRecord, SpecColumnRoles, SpecTablePreview};

/// Opened in-memory workbook.
pub type WorkbookSource = Sheets<Cursor<Vec<u8>>>;

////////////////////////////////////////////////////////////////////////////////
// #region WorkbookReading

/// Open a workbook (`xlsx`, `xlsm`, `xlsb`, `xls`, `ods`) from raw bytes.
pub fn open_workbook_from_bytes(v_bytes: Vec<u8>) -> Result<WorkbookSource> {
    Ok(open_workbook_auto_from_rs(Cursor::new(v_bytes))?)
}

/// Sheet names in workbook order.
pub fn list_sheet_names(workbook: &WorkbookSource) -> Vec<String> {
    workbook.sheet_names()
}

/// Read one sheet into a dataframe; the first row is the header.
pub fn read_sheet(workbook: &mut WorkbookSource, sheet_name: &str) -> Result<DataFrame> {
    let l_sheet_names = workbook.sheet_names();
    if !l_sheet_names.iter().any(|name| name == sheet_name) {
        return Err(SwimlaneError::SheetNotFound {
            sheet: sheet_name.to_string(),
            available: l_sheet_names,
        });
    }
    let range = workbook.worksheet_range(sheet_name)?;
    derive_dataframe_from_range(&range)
}

/// Cell scalar after workbook decoding.
#[derive(Debug, Clone, PartialEq)]
enum EnumCellScalar {
    Missing,
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Duration(TimeDelta),
    Text(String),
}

fn derive_cell_scalar(cell: &Data) -> EnumCellScalar {
    match cell {
        Data::Empty | Data::Error(_) => EnumCellScalar::Missing,
        Data::String(val) if val.is_empty() => EnumCellScalar::Missing,
        Data::String(val) => EnumCellScalar::Text(val.clone()),
        Data::Int(val) => EnumCellScalar::Int(*val),
        Data::Float(val) if val.is_nan() => EnumCellScalar::Missing,
        Data::Float(val) => EnumCellScalar::Float(*val),
        Data::Bool(val) => EnumCellScalar::Bool(*val),
        Data::DateTime(val) => derive_datetime_scalar(val),
        Data::DateTimeIso(val) | Data::DurationIso(val) => EnumCellScalar::Text(val.clone()),
    }
}

fn derive_datetime_scalar(value: &ExcelDateTime) -> EnumCellScalar {
    let scalar = if value.is_duration() {
        value.as_duration().map(EnumCellScalar::Duration)
    } else {
        value.as_datetime().map(EnumCellScalar::DateTime)
    };
    scalar.unwrap_or_else(|| EnumCellScalar::Float(value.as_f64()))
}

/// Convert a decoded sheet range into a typed dataframe.
///
/// Column dtypes follow the cells: integral numbers without gaps become
/// Int64, other numeric columns Float64, pure booleans Boolean and anything
/// else String. Date cells are stored as text; a column of dates that all
/// fall on midnight prints as `YYYY-MM-DD`.
pub fn derive_dataframe_from_range(range: &Range<Data>) -> Result<DataFrame> {
    let mut it_rows = range.rows();
    let Some(l_header_cells) = it_rows.next() else {
        return Ok(DataFrame::empty());
    };

    let l_colnames = derive_unique_column_names(l_header_cells);
    let mut l_cells_by_col: Vec<Vec<EnumCellScalar>> = vec![Vec::new(); l_colnames.len()];
    for row in it_rows {
        for (n_idx_col, l_cells) in l_cells_by_col.iter_mut().enumerate() {
            let scalar = row
                .get(n_idx_col)
                .map_or(EnumCellScalar::Missing, derive_cell_scalar);
            l_cells.push(scalar);
        }
    }

    let l_columns = l_colnames
        .iter()
        .zip(l_cells_by_col)
        .map(|(name, l_cells)| derive_typed_column(name, l_cells))
        .collect::<Vec<_>>();

    Ok(DataFrame::new(l_columns)?)
}

fn derive_unique_column_names(l_header_cells: &[Data]) -> Vec<String> {
    let mut dict_seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut l_names = Vec::with_capacity(l_header_cells.len());

    for (n_idx, cell) in l_header_cells.iter().enumerate() {
        let c_name = match derive_cell_scalar(cell) {
            EnumCellScalar::Missing => format!("Unnamed: {n_idx}"),
            scalar => derive_scalar_text(&scalar).unwrap_or_default(),
        };

        let n_seen = dict_seen.entry(c_name.clone()).or_insert(0);
        if *n_seen == 0 {
            l_names.push(c_name);
        } else {
            l_names.push(format!("{c_name}.{n_seen}"));
        }
        *n_seen += 1;
    }

    l_names
}

fn derive_typed_column(name: &str, l_cells: Vec<EnumCellScalar>) -> Column {
    let col_name = PlSmallStr::from(name);
    let l_present = l_cells
        .iter()
        .filter(|cell| !matches!(cell, EnumCellScalar::Missing))
        .collect::<Vec<_>>();
    let if_has_missing = l_present.len() < l_cells.len();

    let if_all_numeric = !l_present.is_empty()
        && l_present
            .iter()
            .all(|cell| matches!(cell, EnumCellScalar::Int(_) | EnumCellScalar::Float(_)));
    let if_all_bool = !l_present.is_empty()
        && l_present
            .iter()
            .all(|cell| matches!(cell, EnumCellScalar::Bool(_)));

    if if_all_numeric {
        let if_all_integral = l_present.iter().all(|cell| match cell {
            EnumCellScalar::Int(_) => true,
            EnumCellScalar::Float(val) => val.fract() == 0.0 && val.abs() < 9.0e15,
            _ => false,
        });
        if if_all_integral && !if_has_missing {
            let l_values: Vec<Option<i64>> = l_cells
                .iter()
                .map(|cell| match cell {
                    EnumCellScalar::Int(val) => Some(*val),
                    EnumCellScalar::Float(val) => Some(*val as i64),
                    _ => None,
                })
                .collect();
            return Column::new(col_name, l_values);
        }
        let l_values: Vec<Option<f64>> = l_cells
            .iter()
            .map(|cell| match cell {
                EnumCellScalar::Int(val) => Some(*val as f64),
                EnumCellScalar::Float(val) => Some(*val),
                _ => None,
            })
            .collect();
        return Column::new(col_name, l_values);
    }

    let if_all_dates_only = !l_present.is_empty()
        && l_present.iter().all(|cell| match cell {
            EnumCellScalar::DateTime(val) => val.time() == NaiveTime::MIN,
            _ => false,
        });
    if if_all_dates_only {
        let l_values: Vec<Option<String>> = l_cells
            .iter()
            .map(|cell| match cell {
                EnumCellScalar::DateTime(val) => Some(val.format("%Y-%m-%d").to_string()),
                _ => None,
            })
            .collect();
        return Column::new(col_name, l_values);
    }

    if if_all_bool {
        let l_values: Vec<Option<bool>> = l_cells
            .iter()
            .map(|cell| match cell {
                EnumCellScalar::Bool(val) => Some(*val),
                _ => None,
            })
            .collect();
        return Column::new(col_name, l_values);
    }

    let l_values: Vec<Option<String>> = l_cells.iter().map(derive_scalar_text).collect();
    Column::new(col_name, l_values)
}

fn derive_scalar_text(scalar: &EnumCellScalar) -> Option<String> {
    match scalar {
        EnumCellScalar::Missing => None,
        EnumCellScalar::Int(val) => Some(val.to_string()),
        EnumCellScalar::Float(val) if val.fract() == 0.0 && val.abs() < 9.0e15 => {
            Some((*val as i64).to_string())
        }
        EnumCellScalar::Float(val) => derive_float_text(*val),
        EnumCellScalar::Bool(val) => Some(derive_bool_text(*val).to_string()),
        EnumCellScalar::DateTime(val) => Some(derive_datetime_text(val)),
        EnumCellScalar::Duration(val) => Some(derive_duration_text(val)),
        EnumCellScalar::Text(val) => Some(val.clone()),
    }
}

/// `YYYY-MM-DD HH:MM:SS`, with `.ffffff` only when there are sub-second digits.
fn derive_datetime_text(value: &NaiveDateTime) -> String {
    let c_text = value.format("%Y-%m-%d %H:%M:%S").to_string();
    match value.nanosecond() / 1_000 {
        0 => c_text,
        n_micros => format!("{c_text}.{n_micros:06}"),
    }
}

/// `{days} days HH:MM:SS[.ffffff]`; negative spans keep a positive clock part.
fn derive_duration_text(value: &TimeDelta) -> String {
    const N_MICROS_PER_DAY: i64 = 86_400_000_000;
    let n_total = value.num_microseconds().unwrap_or(i64::MAX);
    let n_days = n_total.div_euclid(N_MICROS_PER_DAY);
    let n_rest = n_total.rem_euclid(N_MICROS_PER_DAY);
    let n_secs = n_rest / 1_000_000;
    let n_micros = n_rest % 1_000_000;

    let c_sign = if n_days < 0 { "+" } else { "" };
    let mut c_text = format!(
        "{n_days} days {c_sign}{:02}:{:02}:{:02}",
        n_secs / 3_600,
        n_secs / 60 % 60,
        n_secs % 60
    );
    if n_micros > 0 {
        c_text.push_str(&format!(".{n_micros:06}"));
    }
    c_text
}

fn derive_bool_text(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TextCoercion

/// Coerce one dataframe cell to the text used for comparison and ordering.
///
/// Integers print as digits, floats keep a trailing `.0` when integral
/// (`1.0`), booleans print as `True`/`False`. Nulls and NaN yield `None`.
pub fn derive_text_from_any_value(value: AnyValue<'_>) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(val) => Some(val.to_string()),
        AnyValue::StringOwned(val) => Some(val.to_string()),
        AnyValue::Boolean(val) => Some(derive_bool_text(val).to_string()),
        AnyValue::UInt8(val) => Some(val.to_string()),
        AnyValue::UInt16(val) => Some(val.to_string()),
        AnyValue::UInt32(val) => Some(val.to_string()),
        AnyValue::UInt64(val) => Some(val.to_string()),
        AnyValue::Int8(val) => Some(val.to_string()),
        AnyValue::Int16(val) => Some(val.to_string()),
        AnyValue::Int32(val) => Some(val.to_string()),
        AnyValue::Int64(val) => Some(val.to_string()),
        AnyValue::Float32(val) => derive_float_text(val as f64),
        AnyValue::Float64(val) => derive_float_text(val),
        other => Some(other.to_string()),
    }
}

/// Shortest round-trip text; exponent form below `1e-4` and from `1e16` on
/// (`1e+16`, `1.5e-07`), plain decimals with `.0` otherwise.
fn derive_float_text(value: f64) -> Option<String> {
    if value.is_nan() {
        return None;
    }
    if !value.is_finite() || value == 0.0 {
        return Some(format!("{value:?}"));
    }

    let c_sci = format!("{value:e}");
    let (c_mantissa, c_exp) = c_sci.split_once('e')?;
    let n_exp: i32 = c_exp.parse().ok()?;
    if (-4..16).contains(&n_exp) {
        return Some(format!("{value:?}"));
    }
    let c_sign = if n_exp < 0 { '-' } else { '+' };
    Some(format!("{c_mantissa}e{c_sign}{:02}", n_exp.unsigned_abs()))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Projection

fn get_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| SwimlaneError::ColumnNotFound(name.to_string()))
}

fn derive_column_texts(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = get_column(df, name)?;
    let mut l_texts = Vec::with_capacity(df.height());
    for n_idx_row in 0..df.height() {
        l_texts.push(derive_text_from_any_value(col.get(n_idx_row)?));
    }
    Ok(l_texts)
}

/// Validate that every role column is present in `df`.
pub fn validate_column_roles(df: &DataFrame, roles: &SpecColumnRoles) -> Result<()> {
    let l_required = roles
        .required_columns()
        .into_iter()
        .chain(std::iter::once(roles.col_filter.as_str()))
        .chain(roles.col_color.as_deref());
    for name in l_required {
        get_column(df, name)?;
    }
    Ok(())
}

/// Distinct non-null values of `col_filter`, as text, sorted.
pub fn derive_filter_values(df: &DataFrame, col_filter: &str) -> Result<Vec<String>> {
    let set_values: BTreeSet<String> = derive_column_texts(df, col_filter)?
        .into_iter()
        .flatten()
        .collect();
    Ok(set_values.into_iter().collect())
}

/// Rows whose `col_filter` text equals `value`.
pub fn filter_rows_by_value(df: &DataFrame, col_filter: &str, value: &str) -> Result<DataFrame> {
    let l_mask: Vec<bool> = derive_column_texts(df, col_filter)?
        .iter()
        .map(|text| text.as_deref() == Some(value))
        .collect();
    let mask = BooleanChunked::from_slice(PlSmallStr::from_static("mask"), &l_mask);
    Ok(df.filter(&mask)?)
}

/// Project rows onto activity records, dropping rows missing lane, label or order.
///
/// A missing color keeps the row; the renderer falls back to the default fill.
pub fn extract_activity_records(
    df: &DataFrame,
    roles: &SpecColumnRoles,
) -> Result<Vec<SpecActivityRecord>> {
    let l_lanes = derive_column_texts(df, &roles.col_lane)?;
    let l_labels = derive_column_texts(df, &roles.col_label)?;
    let l_orders = derive_column_texts(df, &roles.col_order)?;
    let l_colors = match &roles.col_color {
        Some(col_color) => derive_column_texts(df, col_color)?,
        None => vec![None; df.height()],
    };

    let l_records: Vec<SpecActivityRecord> = l_lanes
        .into_iter()
        .zip(l_labels)
        .zip(l_orders)
        .zip(l_colors)
        .filter_map(|(((lane, label), order), color_hex)| {
            Some(SpecActivityRecord {
                lane: lane?,
                label: label?,
                order: order?,
                color_hex,
            })
        })
        .collect();

    let n_dropped = df.height() - l_records.len();
    if n_dropped > 0 {
        tracing::debug!(n_dropped, "dropped incomplete rows before layout");
    }
    Ok(l_records)
}

/// Header plus the first `n_rows` rows as display text (nulls as empty strings).
pub fn derive_table_preview(df: &DataFrame, n_rows: usize) -> Result<SpecTablePreview> {
    let columns: Vec<String> = df
        .get_column_names_str()
        .into_iter()
        .map(ToString::to_string)
        .collect();
    let n_height = usize::min(n_rows, df.height());

    let mut rows = vec![Vec::with_capacity(columns.len()); n_height];
    for col in df.get_columns() {
        for (n_idx_row, row) in rows.iter_mut().enumerate() {
            row.push(derive_text_from_any_value(col.get(n_idx_row)?).unwrap_or_default());
        }
    }

    Ok(SpecTablePreview { columns, rows })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn create_steps_dataframe() -> DataFrame {
        DataFrame::new(vec![
            Column::new(
                "Role".into(),
                vec![Some("Clerk"), Some("Manager"), None, Some("Clerk")],
            ),
            Column::new(
                "Step".into(),
                vec![Some("Receive"), Some("Approve"), Some("Archive"), Some("File")],
            ),
            Column::new("Seq".into(), vec![Some(1i64), Some(10), Some(2), Some(2)]),
            Column::new(
                "Flow".into(),
                vec![Some("Buy"), Some("Buy"), Some("Buy"), Some("Sell")],
            ),
            Column::new(
                "Color".into(),
                vec![Some("#112233"), None, Some("#445566"), None],
            ),
        ])
        .expect("dataframe")
    }

    fn create_roles() -> SpecColumnRoles {
        SpecColumnRoles {
            col_lane: "Role".to_string(),
            col_label: "Step".to_string(),
            col_order: "Seq".to_string(),
            col_filter: "Flow".to_string(),
            col_color: Some("Color".to_string()),
        }
    }

    #[test]
    fn test_derive_text_from_any_value_matches_text_coercion() {
        assert_eq!(derive_text_from_any_value(AnyValue::Null), None);
        assert_eq!(
            derive_text_from_any_value(AnyValue::Int64(10)),
            Some("10".to_string())
        );
        assert_eq!(
            derive_text_from_any_value(AnyValue::Float64(1.0)),
            Some("1.0".to_string())
        );
        assert_eq!(
            derive_text_from_any_value(AnyValue::Float64(2.5)),
            Some("2.5".to_string())
        );
        assert_eq!(derive_text_from_any_value(AnyValue::Float64(f64::NAN)), None);
        assert_eq!(
            derive_text_from_any_value(AnyValue::Boolean(true)),
            Some("True".to_string())
        );
    }

    #[test]
    fn test_derive_filter_values_sorted_distinct_non_null() {
        let df = create_steps_dataframe();
        assert_eq!(
            derive_filter_values(&df, "Flow").expect("values"),
            vec!["Buy".to_string(), "Sell".to_string()]
        );
        assert_eq!(
            derive_filter_values(&df, "Role").expect("values"),
            vec!["Clerk".to_string(), "Manager".to_string()]
        );
    }

    #[test]
    fn test_filter_rows_by_value_matches_coerced_text() {
        let df = create_steps_dataframe();
        assert_eq!(filter_rows_by_value(&df, "Flow", "Buy").expect("filter").height(), 3);
        assert_eq!(filter_rows_by_value(&df, "Seq", "2").expect("filter").height(), 2);
        assert_eq!(filter_rows_by_value(&df, "Flow", "None").expect("filter").height(), 0);
    }

    #[test]
    fn test_extract_activity_records_drops_incomplete_rows_only() {
        let df = create_steps_dataframe();
        let l_records = extract_activity_records(&df, &create_roles()).expect("records");

        assert_eq!(l_records.len(), 3);
        assert_eq!(l_records[0].order, "1");
        assert_eq!(l_records[0].color_hex.as_deref(), Some("#112233"));
        assert_eq!(l_records[1].color_hex, None);
        assert!(l_records.iter().all(|record| record.label != "Archive"));
    }

    #[test]
    fn test_validate_column_roles_reports_missing_column() {
        let df = create_steps_dataframe();
        let mut roles = create_roles();
        assert!(validate_column_roles(&df, &roles).is_ok());

        roles.col_color = Some("Colour".to_string());
        let err = validate_column_roles(&df, &roles).expect_err("must fail");
        assert!(matches!(err, SwimlaneError::ColumnNotFound(name) if name == "Colour"));
    }

    #[test]
    fn test_derive_unique_column_names_fills_blank_and_duplicate_headers() {
        let l_header = vec![
            Data::String("Step".to_string()),
            Data::Empty,
            Data::String("Step".to_string()),
            Data::Float(3.0),
        ];
        assert_eq!(
            derive_unique_column_names(&l_header),
            vec![
                "Step".to_string(),
                "Unnamed: 1".to_string(),
                "Step.1".to_string(),
                "3".to_string()
            ]
        );
    }

    #[test]
    fn test_derive_typed_column_infers_dtypes() {
        let col = derive_typed_column(
            "n",
            vec![EnumCellScalar::Float(1.0), EnumCellScalar::Int(2)],
        );
        assert_eq!(
            derive_text_from_any_value(col.get(0).expect("cell")),
            Some("1".to_string())
        );

        let col = derive_typed_column(
            "n",
            vec![EnumCellScalar::Float(1.0), EnumCellScalar::Missing],
        );
        assert_eq!(
            derive_text_from_any_value(col.get(0).expect("cell")),
            Some("1.0".to_string())
        );

        let col = derive_typed_column(
            "mixed",
            vec![EnumCellScalar::Float(3.0), EnumCellScalar::Text("x".to_string())],
        );
        assert_eq!(
            derive_text_from_any_value(col.get(0).expect("cell")),
            Some("3".to_string())
        );
    }

    #[test]
    fn test_derive_float_text_uses_exponent_outside_plain_range() {
        assert_eq!(derive_float_text(1e16), Some("1e+16".to_string()));
        assert_eq!(derive_float_text(1.5e-7), Some("1.5e-07".to_string()));
        assert_eq!(derive_float_text(-2.5e20), Some("-2.5e+20".to_string()));
        assert_eq!(derive_float_text(1e-5), Some("1e-05".to_string()));
        assert_eq!(derive_float_text(0.0001), Some("0.0001".to_string()));
        assert_eq!(derive_float_text(1e15), Some("1000000000000000.0".to_string()));
        assert_eq!(derive_float_text(0.0), Some("0.0".to_string()));
        assert_eq!(derive_float_text(f64::INFINITY), Some("inf".to_string()));
    }

    #[test]
    fn test_derive_typed_column_prints_dates_as_text() {
        let dt_midnight =
            NaiveDateTime::parse_from_str("2024-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").expect("datetime");
        let dt_noon =
            NaiveDateTime::parse_from_str("2024-01-02 12:30:00", "%Y-%m-%d %H:%M:%S").expect("datetime");

        let col = derive_typed_column(
            "When",
            vec![EnumCellScalar::DateTime(dt_midnight), EnumCellScalar::Missing],
        );
        assert_eq!(
            derive_text_from_any_value(col.get(0).expect("cell")),
            Some("2024-01-01".to_string())
        );

        let col = derive_typed_column(
            "When",
            vec![EnumCellScalar::DateTime(dt_midnight), EnumCellScalar::DateTime(dt_noon)],
        );
        assert_eq!(
            derive_text_from_any_value(col.get(0).expect("cell")),
            Some("2024-01-01 00:00:00".to_string())
        );
        assert_eq!(
            derive_text_from_any_value(col.get(1).expect("cell")),
            Some("2024-01-02 12:30:00".to_string())
        );

        let col = derive_typed_column(
            "Mixed",
            vec![
                EnumCellScalar::DateTime(dt_midnight),
                EnumCellScalar::Text("later".to_string()),
            ],
        );
        assert_eq!(
            derive_text_from_any_value(col.get(0).expect("cell")),
            Some("2024-01-01 00:00:00".to_string())
        );
    }

    #[test]
    fn test_derive_duration_text_counts_days() {
        assert_eq!(
            derive_duration_text(&TimeDelta::minutes(90)),
            "0 days 01:30:00"
        );
        assert_eq!(
            derive_duration_text(&(TimeDelta::days(2) + TimeDelta::milliseconds(500))),
            "2 days 00:00:00.500000"
        );
        assert_eq!(
            derive_duration_text(&TimeDelta::hours(-1)),
            "-1 days +23:00:00"
        );
    }

    #[test]
    fn test_derive_table_preview_limits_rows() {
        let df = create_steps_dataframe();
        let preview = derive_table_preview(&df, 2).expect("preview");
        assert_eq!(preview.columns.len(), 5);
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(preview.rows[1][0], "Manager");
        assert_eq!(preview.rows[1][4], "");
    }
}
