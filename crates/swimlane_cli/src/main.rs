//! `swimlane`: render swimlane diagrams from a workbook on the command line.

mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use swimlane_core::conf::N_DPI_DEFAULT;
use swimlane_core::spec::{
    EnumExportSink, EnumFontSizeRounding, SpecArchiveOptions, SpecColumnRoles, SpecLayoutOptions,
    SpecRasterOptions,
};
use swimlane_core::table::{derive_filter_values, derive_table_preview, filter_rows_by_value};
use swimlane_core::{
    BatchExporter, SourceId, SwimlaneError, SwimlaneSession, layout_filtered_table, render_svg,
};

/// Swimlane diagram generator
#[derive(Parser, Debug)]
#[command(name = "swimlane")]
#[command(version, about = "Render swimlane diagrams from spreadsheet process steps")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the sheets of a workbook
    Sheets {
        /// Workbook path (.xlsx, .xlsm, .xls, .ods)
        workbook: PathBuf,
    },

    /// Print the header and first rows of a sheet
    Preview {
        #[command(flatten)]
        source: SourceArgs,
        /// Number of rows to print
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },

    /// List the distinct values of the filter column
    Values {
        #[command(flatten)]
        source: SourceArgs,
        /// Filter column
        #[arg(long)]
        filter: String,
    },

    /// Render the diagram of one filter value to PNG
    Render {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        roles: RoleArgs,
        #[command(flatten)]
        style: StyleArgs,
        /// Filter value to render
        #[arg(long)]
        value: String,
        /// Output path (default: suggested file name in the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Also write the diagram as SVG
        #[arg(long)]
        svg: Option<PathBuf>,
    },

    /// Render every filter value into one slide deck
    Deck {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        roles: RoleArgs,
        #[command(flatten)]
        style: StyleArgs,
        /// Output path (default: suggested file name in the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Render every filter value into a zip archive of PNGs
    Archive {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        roles: RoleArgs,
        #[command(flatten)]
        style: StyleArgs,
        /// Output path (default: suggested file name in the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Deflate archive entries instead of storing them
        #[arg(long)]
        compress: bool,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Workbook path (.xlsx, .xlsm, .xls, .ods)
    workbook: PathBuf,
    /// Sheet name (default: first sheet)
    #[arg(long)]
    sheet: Option<String>,
}

#[derive(Args, Debug)]
struct RoleArgs {
    /// Lane column
    #[arg(long)]
    lane: String,
    /// Activity label column
    #[arg(long)]
    label: String,
    /// Sequence column
    #[arg(long)]
    order: String,
    /// Filter column (one diagram per distinct value)
    #[arg(long)]
    filter: String,
    /// Optional hex fill color column
    #[arg(long)]
    color: Option<String>,
}

impl From<RoleArgs> for SpecColumnRoles {
    fn from(args: RoleArgs) -> Self {
        Self {
            col_lane: args.lane,
            col_label: args.label,
            col_order: args.order,
            col_filter: args.filter,
            col_color: args.color,
        }
    }
}

#[derive(Args, Debug)]
struct StyleArgs {
    /// Output resolution
    #[arg(long, default_value_t = N_DPI_DEFAULT)]
    dpi: f64,
    /// Leading text of each diagram title
    #[arg(long)]
    title_prefix: Option<String>,
    /// Rounding applied to fitted label font sizes
    #[arg(long, value_enum, default_value_t = EnumCliFontRounding::Truncate)]
    font_rounding: EnumCliFontRounding,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum EnumCliFontRounding {
    Truncate,
    Round,
}

impl StyleArgs {
    fn layout_options(&self) -> SpecLayoutOptions {
        let mut cfg_layout = SpecLayoutOptions {
            rule_font_rounding: match self.font_rounding {
                EnumCliFontRounding::Truncate => EnumFontSizeRounding::Truncate,
                EnumCliFontRounding::Round => EnumFontSizeRounding::Round,
            },
            ..SpecLayoutOptions::default()
        };
        if let Some(prefix) = &self.title_prefix {
            cfg_layout.title_prefix = prefix.clone();
        }
        cfg_layout
    }

    fn raster_options(&self) -> SpecRasterOptions {
        SpecRasterOptions {
            dpi: self.dpi,
            ..SpecRasterOptions::default()
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SwimlaneError> {
    let mut session = SwimlaneSession::new();
    match cli.command {
        Commands::Sheets { workbook } => {
            let source_id = session.load_source_file(&workbook)?;
            for name in session.sheet_names(&source_id)? {
                println!("{name}");
            }
        }
        Commands::Preview { source, rows } => {
            let (source_id, sheet_name) = load_sheet(&mut session, &source)?;
            let df = session.sheet(&source_id, &sheet_name)?;
            let preview = derive_table_preview(df, rows)?;
            println!("{}", preview.columns.join("\t"));
            for row in preview.rows {
                println!("{}", row.join("\t"));
            }
        }
        Commands::Values { source, filter } => {
            let (source_id, sheet_name) = load_sheet(&mut session, &source)?;
            let df = session.sheet(&source_id, &sheet_name)?;
            for value in derive_filter_values(df, &filter)? {
                println!("{value}");
            }
        }
        Commands::Render {
            source,
            roles,
            style,
            value,
            out,
            svg,
        } => {
            let (source_id, sheet_name) = load_sheet(&mut session, &source)?;
            let df = session.sheet(&source_id, &sheet_name)?;
            let roles = SpecColumnRoles::from(roles);
            if let Some(path_svg) = svg {
                let df_filtered = filter_rows_by_value(df, &roles.col_filter, &value)?;
                if df_filtered.height() > 0 {
                    let cfg_layout = style.layout_options();
                    let diagram = layout_filtered_table(&df_filtered, &roles, &value, &cfg_layout)?;
                    std::fs::write(&path_svg, render_svg(&diagram, &style.raster_options()))?;
                    println!("wrote {}", path_svg.display());
                }
            }
            let exporter = BatchExporter::new(roles, style.raster_options())?
                .with_layout_options(style.layout_options());
            let outcome = exporter.export(df, &EnumExportSink::Single(value))?;
            write_outcome(outcome, out.as_deref())?;
        }
        Commands::Deck {
            source,
            roles,
            style,
            out,
        } => {
            let (source_id, sheet_name) = load_sheet(&mut session, &source)?;
            let df = session.sheet(&source_id, &sheet_name)?;
            let exporter = BatchExporter::new(SpecColumnRoles::from(roles), style.raster_options())?
                .with_layout_options(style.layout_options());
            let outcome = exporter.export(df, &EnumExportSink::Document)?;
            write_outcome(outcome, out.as_deref())?;
        }
        Commands::Archive {
            source,
            roles,
            style,
            out,
            compress,
        } => {
            let (source_id, sheet_name) = load_sheet(&mut session, &source)?;
            let df = session.sheet(&source_id, &sheet_name)?;
            let exporter = BatchExporter::new(SpecColumnRoles::from(roles), style.raster_options())?
                .with_layout_options(style.layout_options())
                .with_archive_options(SpecArchiveOptions {
                    if_compress: compress,
                });
            let outcome = exporter.export(df, &EnumExportSink::Archive)?;
            write_outcome(outcome, out.as_deref())?;
        }
    }
    Ok(())
}

/// Load the workbook and resolve the sheet name (first sheet when omitted).
fn load_sheet(
    session: &mut SwimlaneSession,
    source: &SourceArgs,
) -> Result<(SourceId, String), SwimlaneError> {
    let source_id = session.load_source_file(&source.workbook)?;
    let sheet_name = match &source.sheet {
        Some(name) => name.clone(),
        None => session
            .sheet_names(&source_id)?
            .first()
            .cloned()
            .ok_or_else(|| SwimlaneError::SheetNotFound {
                sheet: String::new(),
                available: Vec::new(),
            })?,
    };
    tracing::debug!(
        workbook = %source.workbook.display(),
        sheet = %sheet_name,
        %source_id,
        "sheet selected"
    );
    Ok((source_id, sheet_name))
}

fn write_outcome(
    outcome: swimlane_core::SpecExportOutcome,
    out: Option<&Path>,
) -> Result<(), SwimlaneError> {
    for msg in &outcome.report.warnings {
        eprintln!("warning: {msg}");
    }
    let Some(artifact) = outcome.artifact else {
        return Ok(());
    };
    let path_out = out.map_or_else(|| PathBuf::from(&artifact.file_name), Path::to_path_buf);
    std::fs::write(&path_out, &artifact.bytes)?;
    println!(
        "wrote {} ({} rendered, {} skipped)",
        path_out.display(),
        outcome.report.values_rendered.len(),
        outcome.report.values_skipped.len()
    );
    Ok(())
}
