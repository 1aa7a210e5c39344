//! sheetsync CLI - report synchronization and inspection tool

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sheetsync::prelude::*;
use sheetsync::{column_values, extract_cells, load_group_values, open_workbook, row_values};

#[derive(Parser)]
#[command(name = "sheetsync")]
#[command(
    author,
    version,
    about = "Synchronize dated tag samples into spreadsheet reports"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum GroupBy {
    Rows,
    Columns,
}

#[derive(Clone, Copy, ValueEnum)]
enum Header {
    None,
    Letter,
    Index,
}

impl From<Header> for HeaderMode {
    fn from(h: Header) -> Self {
        match h {
            Header::None => HeaderMode::None,
            Header::Letter => HeaderMode::Letter,
            Header::Index => HeaderMode::Index,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write group values into a point's yearly reports
    Sync {
        /// Directory holding report_<point>.json files
        #[arg(long)]
        config_dir: PathBuf,

        /// Monitoring point id
        #[arg(long)]
        point: String,

        /// JSON file with an array of group values
        #[arg(long)]
        values: PathBuf,

        /// Environment selecting the output root (default: $SHEETSYNC_ENV or production)
        #[arg(long)]
        env: Option<String>,

        /// Directory of shared fallback templates (default: the config dir)
        #[arg(long)]
        template_root: Option<PathBuf>,

        /// Number of trailing years to keep
        #[arg(long, default_value_t = 5)]
        window: u32,

        /// Decimal places numbers are rounded to when read
        #[arg(long, default_value_t = 3)]
        decimals: u32,
    },

    /// Print the values of a range as JSON groups
    Extract {
        /// Input spreadsheet file (xlsx, xlsm, xls)
        input: PathBuf,

        /// Range such as A1:D20
        #[arg(short, long)]
        range: String,

        /// Sheet name or 0-based index (default: 0)
        #[arg(short, long, default_value = "0")]
        sheet: SheetId,

        /// Group by rows or by columns
        #[arg(long, value_enum, default_value = "rows")]
        by: GroupBy,

        /// Key of row members
        #[arg(long, value_enum, default_value = "letter")]
        header: Header,
    },

    /// List all sheets in a workbook
    Sheets {
        /// Input spreadsheet file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            config_dir,
            point,
            values,
            env,
            template_root,
            window,
            decimals,
        } => {
            let mut loader = ConfigLoader::new(config_dir);
            if let Some(env) = env {
                loader = loader.with_environment(env);
            }
            if let Some(root) = template_root {
                loader = loader.with_template_root(root);
            }
            let options = SyncOptions {
                window,
                classify: ClassifyOptions {
                    decimals: Some(decimals),
                },
                ..SyncOptions::default()
            };
            sync(&loader, options, &point, &values)
        }
        Commands::Extract {
            input,
            range,
            sheet,
            by,
            header,
        } => extract(&input, &range, &sheet, by, header.into()),
        Commands::Sheets { input } => list_sheets(&input),
    }
}

fn sync(loader: &ConfigLoader, options: SyncOptions, point: &str, values: &Path) -> Result<()> {
    let values = load_group_values(values)?;
    tracing::info!(point, periods = values.len(), "loaded group values");

    let synchronizer = ReportSynchronizer::new(loader, options);
    let report = synchronizer
        .synchronize(point, &values)
        .with_context(|| format!("Failed to synchronize point '{}'", point))?;

    for result in &report.results {
        println!(
            "{}\t{}\t{} dates\t{} cells",
            result.report_year,
            result.result_path.display(),
            result.report_dates.len(),
            result.written_cells
        );
        for reason in &result.skipped {
            eprintln!("  skipped {}", reason);
        }
    }
    for failure in &report.failures {
        eprintln!("{}: {}", failure.year, failure.error);
    }

    if !report.failures.is_empty() {
        bail!("{} year bucket(s) failed", report.failures.len());
    }
    Ok(())
}

fn extract(
    input: &Path,
    range: &str,
    sheet: &SheetId,
    by: GroupBy,
    header: HeaderMode,
) -> Result<()> {
    let workbook = open_workbook(Source::Path(input.to_path_buf()))
        .with_context(|| format!("Failed to open '{}'", input.display()))?;
    let sheet = workbook
        .sheet(sheet)
        .with_context(|| format!("Sheet {} not found", sheet))?;

    let cells = extract_cells(sheet, range, &IterOptions::default())
        .with_context(|| format!("Failed to read range '{}'", range))?;
    let groups = match by {
        GroupBy::Rows => row_values(&cells, header, &ColumnKeys::new()),
        GroupBy::Columns => column_values(&cells),
    };

    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &groups).context("Failed to write JSON")?;
    writeln!(stdout).context("Failed to write to stdout")?;
    Ok(())
}

fn list_sheets(input: &Path) -> Result<()> {
    let workbook = open_workbook(Source::Path(input.to_path_buf()))
        .with_context(|| format!("Failed to open '{}'", input.display()))?;

    for (i, name) in workbook.sheet_names().iter().enumerate() {
        println!("{}\t{}", i, name);
    }

    Ok(())
}
