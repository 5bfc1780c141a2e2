use std::io::{Cursor, Read};

use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use swimlane_core::spec::{
    EnumExportSink, SpecColumnRoles, SpecExportOutcome, SpecLayoutOptions, SpecRasterOptions,
};
use swimlane_core::{
    BatchExporter, SwimlaneSession, derive_filter_values, filter_rows_by_value,
    layout_filtered_table,
};
use zip::ZipArchive;

const V_PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Rows: (lane, label, seq, flow, color); empty strings stay blank cells.
const L_ROWS: [(&str, &str, f64, &str, &str); 6] = [
    ("Clerk", "Receive the purchase order", 1.0, "Buy", "#1F77B4"),
    ("Manager", "Approve purchase", 2.0, "Buy", ""),
    ("Clerk", "Pay invoice", 10.0, "Buy", "#zzz"),
    ("", "Orphan step", 3.0, "Buy", ""),
    ("Clerk", "Ship", 1.0, "A/B: C", ""),
    ("Clerk", "Unfiled note", 4.0, "", ""),
];

fn create_workbook_bytes() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Steps").expect("sheet name");
    for (n_col, header) in ["Role", "Step", "Seq", "Flow", "Hex"].iter().enumerate() {
        worksheet.write(0, n_col as u16, *header).expect("header");
    }
    for (n_idx, (lane, label, seq, flow, color)) in L_ROWS.iter().enumerate() {
        let n_row = n_idx as u32 + 1;
        for (n_col, text) in [(0u16, lane), (1, label), (3, flow), (4, color)] {
            if !text.is_empty() {
                worksheet.write(n_row, n_col, *text).expect("cell");
            }
        }
        worksheet.write(n_row, 2, *seq).expect("cell");
    }
    workbook.add_worksheet().set_name("Notes").expect("sheet name");
    workbook.save_to_buffer().expect("xlsx bytes")
}

fn create_roles() -> SpecColumnRoles {
    SpecColumnRoles {
        col_lane: "Role".to_string(),
        col_label: "Step".to_string(),
        col_order: "Seq".to_string(),
        col_filter: "Flow".to_string(),
        col_color: Some("Hex".to_string()),
    }
}

fn create_exporter() -> BatchExporter {
    let raster_options = SpecRasterOptions {
        dpi: 24.0,
        tight_pad_inches: 0.1,
        if_load_system_fonts: false,
    };
    BatchExporter::new(create_roles(), raster_options).expect("exporter")
}

fn read_archive(outcome: SpecExportOutcome) -> ZipArchive<Cursor<Vec<u8>>> {
    let artifact = outcome.artifact.expect("artifact");
    ZipArchive::new(Cursor::new(artifact.bytes)).expect("zip")
}

fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, c_name: &str) -> Vec<u8> {
    let mut v_out = Vec::new();
    archive
        .by_name(c_name)
        .expect("entry")
        .read_to_end(&mut v_out)
        .expect("read");
    v_out
}

#[test]
fn test_workbook_to_layout_keeps_complete_rows_only() {
    let mut session = SwimlaneSession::new();
    let source_id = session
        .load_source("steps.xlsx", create_workbook_bytes())
        .expect("load");
    assert_eq!(
        session.sheet_names(&source_id).expect("names"),
        &["Steps".to_string(), "Notes".to_string()]
    );

    let df = session.sheet(&source_id, "Steps").expect("sheet");
    assert_eq!(
        derive_filter_values(df, "Flow").expect("values"),
        vec!["A/B: C", "Buy"]
    );

    let df_buy = filter_rows_by_value(df, "Flow", "Buy").expect("filter");
    assert_eq!(df_buy.height(), 4);
    let diagram = layout_filtered_table(&df_buy, &create_roles(), "Buy", &SpecLayoutOptions::default())
        .expect("layout");
    assert_eq!(diagram.lanes, vec!["Clerk", "Manager"]);
    assert_eq!(diagram.sequences, vec!["1", "10", "2"]);
    assert_eq!(diagram.title, "Swimlane Diagram \u{2013} Flow = Buy");
    assert_eq!(diagram.warnings.len(), 1);
}

#[test]
fn test_archive_export_has_one_sanitized_entry_per_value() {
    let mut session = SwimlaneSession::new();
    let source_id = session
        .load_source("steps.xlsx", create_workbook_bytes())
        .expect("load");
    let df = session.sheet(&source_id, "Steps").expect("sheet");

    let outcome = create_exporter()
        .export(df, &EnumExportSink::Archive)
        .expect("export");
    assert_eq!(outcome.report.values_rendered, vec!["A/B: C", "Buy"]);
    assert!(outcome.report.values_skipped.is_empty());
    assert_eq!(outcome.report.warnings.len(), 1);

    let mut archive = read_archive(outcome);
    let mut l_names: Vec<String> = archive.file_names().map(ToString::to_string).collect();
    l_names.sort();
    assert_eq!(l_names, vec!["A_B_ C.png", "Buy.png"]);
    assert_eq!(&read_entry(&mut archive, "A_B_ C.png")[..8], &V_PNG_SIGNATURE);
}

#[test]
fn test_document_export_has_one_slide_per_value_in_sorted_order() {
    let mut session = SwimlaneSession::new();
    let source_id = session
        .load_source("steps.xlsx", create_workbook_bytes())
        .expect("load");
    let df = session.sheet(&source_id, "Steps").expect("sheet");

    let outcome = create_exporter()
        .export(df, &EnumExportSink::Document)
        .expect("export");
    let artifact = outcome.artifact.clone().expect("artifact");
    assert_eq!(artifact.file_name, "swimlane_diagrams.pptx");

    let mut archive = read_archive(outcome);
    let c_slide1 = String::from_utf8(read_entry(&mut archive, "ppt/slides/slide1.xml")).expect("utf-8");
    let c_slide2 = String::from_utf8(read_entry(&mut archive, "ppt/slides/slide2.xml")).expect("utf-8");
    assert!(c_slide1.contains("<a:t>A/B: C</a:t>"));
    assert!(c_slide2.contains("<a:t>Buy</a:t>"));
    assert!(archive.by_name("ppt/slides/slide3.xml").is_err());
    assert_eq!(
        &read_entry(&mut archive, "ppt/media/image2.png")[..8],
        &V_PNG_SIGNATURE
    );
}

#[test]
fn test_unmatched_values_are_skipped_or_warned() {
    let mut session = SwimlaneSession::new();
    let source_id = session
        .load_source("steps.xlsx", create_workbook_bytes())
        .expect("load");
    let df = session.sheet(&source_id, "Steps").expect("sheet");
    let exporter = create_exporter();

    let l_values = vec!["Buy".to_string(), "Sell".to_string()];
    let outcome = exporter
        .export_values(df, &l_values, &EnumExportSink::Archive)
        .expect("export");
    assert_eq!(outcome.report.values_skipped, vec!["Sell"]);
    assert_eq!(read_archive(outcome).len(), 1);

    let outcome = exporter
        .export(df, &EnumExportSink::Single("Sell".to_string()))
        .expect("export");
    assert!(outcome.artifact.is_none());
    assert!(!outcome.report.warnings.is_empty());

    let outcome = exporter
        .export(df, &EnumExportSink::Single("A/B: C".to_string()))
        .expect("export");
    let artifact = outcome.artifact.expect("artifact");
    assert_eq!(artifact.file_name, "swimlane_diagram_A_B_ C.png");
    assert_eq!(&artifact.bytes[..8], &V_PNG_SIGNATURE);
}

fn create_dated_workbook_bytes() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Dated").expect("sheet name");
    for (n_col, header) in ["Role", "Step", "When", "Stamp"].iter().enumerate() {
        worksheet.write(0, n_col as u16, *header).expect("header");
    }

    let format_date = Format::new().set_num_format("yyyy-mm-dd");
    let format_stamp = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");
    let dt_day1 = ExcelDateTime::from_ymd(2024, 1, 1).expect("date");
    let dt_day2 = ExcelDateTime::from_ymd(2024, 1, 2).expect("date");
    let dt_noon = ExcelDateTime::from_ymd(2024, 1, 2)
        .and_then(|dt| dt.and_hms(12, 30, 0))
        .expect("datetime");

    for (n_row, (lane, label, dt_when, dt_stamp)) in [
        ("Clerk", "Open", &dt_day1, &dt_day1),
        ("Clerk", "Close", &dt_day2, &dt_noon),
    ]
    .into_iter()
    .enumerate()
    {
        let n_row = n_row as u32 + 1;
        worksheet.write(n_row, 0, lane).expect("cell");
        worksheet.write(n_row, 1, label).expect("cell");
        worksheet
            .write_datetime_with_format(n_row, 2, dt_when, &format_date)
            .expect("cell");
        worksheet
            .write_datetime_with_format(n_row, 3, dt_stamp, &format_stamp)
            .expect("cell");
    }
    workbook.save_to_buffer().expect("xlsx bytes")
}

#[test]
fn test_date_cells_read_as_calendar_text() {
    let mut session = SwimlaneSession::new();
    let source_id = session
        .load_source("dated.xlsx", create_dated_workbook_bytes())
        .expect("load");
    let df = session.sheet(&source_id, "Dated").expect("sheet");

    assert_eq!(
        derive_filter_values(df, "When").expect("values"),
        vec!["2024-01-01", "2024-01-02"]
    );
    assert_eq!(
        derive_filter_values(df, "Stamp").expect("values"),
        vec!["2024-01-01 00:00:00", "2024-01-02 12:30:00"]
    );

    let roles = SpecColumnRoles {
        col_lane: "Role".to_string(),
        col_label: "Step".to_string(),
        col_order: "When".to_string(),
        col_filter: "Role".to_string(),
        col_color: None,
    };
    let diagram = layout_filtered_table(df, &roles, "Clerk", &SpecLayoutOptions::default())
        .expect("layout");
    assert_eq!(diagram.sequences, vec!["2024-01-01", "2024-01-02"]);
}
