use clap::{Parser, Subcommand};
use colored::Colorize;
use mis_reviewer::cli;
use mis_reviewer::error::ReviewResult;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "misrev")]
#[command(about = "Monthly MIS checker for client billing sheets.")]
#[command(long_about = "MIS Reviewer - recompute, reconcile, record
Checks every derived column of a monthly billing sheet against its client
format, then punches the month's totals into the P&L and appends the rows
to the dump.

COMMANDS:
  formats  - List known formats and the sheets they review
  sheets   - List a workbook's sheets and their formats
  check    - Review one month of a sheet (read only)
  punch    - Write the month's totals into the P&L ledger
  clear    - Blank the month's totals in the P&L ledger
  dump     - Append the month's rows to the dump

EXAMPLES:
  misrev sheets MIS.xlsx
  misrev check MIS.xlsx --sheet \"Airtel Center\" --month jan-24
  misrev punch MIS.xlsx --sheet \"Airtel Center\" --ledger P&L.xlsx
  misrev dump MIS.xlsx --sheet \"Airtel Center\" --dump Dump.xlsx

LOGGING:
  RUST_LOG=debug misrev check ...   (or --verbose)")]
#[command(version)]
struct Cli {
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory of extra format YAML files (override built-ins by name)
    #[arg(long, global = true, env = "MISREV_FORMATS")]
    formats: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List known formats and their sheets
    Formats,

    /// List the sheets of a workbook
    Sheets {
        /// Path to the MIS workbook (.xlsx)
        workbook: PathBuf,
    },

    #[command(long_about = "Review one month of a sheet.

Recomputes every derived column from the row's recorded inputs and reports
each cell that differs, then prints the format's totals, the price pivot and
any listings (expenses, value issues).

Nothing is written unless --output is given.

EXAMPLES:
  misrev check MIS.xlsx --sheet \"Airtel Center\"
  misrev check MIS.xlsx --sheet \"Airtel Center\" --month feb-24 --json
  misrev check MIS.xlsx --sheet \"Airtel Center\" --output review.xlsx")]
    /// Review one month of a sheet (read only)
    Check {
        /// Path to the MIS workbook (.xlsx)
        workbook: PathBuf,

        /// Sheet name, exactly as in the workbook
        #[arg(short, long)]
        sheet: String,

        /// Month to review (default: first month in the sheet)
        #[arg(short, long)]
        month: Option<String>,

        /// Print the review as JSON
        #[arg(long)]
        json: bool,

        /// Also write the review to this workbook
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    #[command(long_about = "Punch the month's totals into the P&L ledger.

Rows are matched on cost centre and month. Every key must already have a
ledger row; if any is missing nothing is written. Totals with no
contributing rows leave the ledger value as it was.")]
    /// Write the month's totals into the P&L ledger
    Punch {
        /// Path to the MIS workbook (.xlsx)
        workbook: PathBuf,

        #[arg(short, long)]
        sheet: String,

        #[arg(short, long)]
        month: Option<String>,

        /// P&L ledger workbook
        #[arg(long, env = "MISREV_LEDGER")]
        ledger: PathBuf,
    },

    /// Blank the month's totals in the P&L ledger
    Clear {
        /// Path to the MIS workbook (.xlsx)
        workbook: PathBuf,

        #[arg(short, long)]
        sheet: String,

        #[arg(short, long)]
        month: Option<String>,

        /// P&L ledger workbook
        #[arg(long, env = "MISREV_LEDGER")]
        ledger: PathBuf,
    },

    /// Append the month's rows to the dump
    Dump {
        /// Path to the MIS workbook (.xlsx)
        workbook: PathBuf,

        #[arg(short, long)]
        sheet: String,

        #[arg(short, long)]
        month: Option<String>,

        /// Dump workbook
        #[arg(long, env = "MISREV_DUMP")]
        dump: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "mis_reviewer=debug" } else { "mis_reviewer=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> ReviewResult<()> {
    let formats = cli.formats;
    match cli.command {
        Commands::Formats => cli::formats(formats),
        Commands::Sheets { workbook } => cli::sheets(workbook, formats),
        Commands::Check {
            workbook,
            sheet,
            month,
            json,
            output,
        } => cli::check(workbook, sheet, month, json, output, formats),
        Commands::Punch {
            workbook,
            sheet,
            month,
            ledger,
        } => cli::punch(workbook, sheet, month, ledger, formats),
        Commands::Clear {
            workbook,
            sheet,
            month,
            ledger,
        } => cli::clear(workbook, sheet, month, ledger, formats),
        Commands::Dump {
            workbook,
            sheet,
            month,
            dump,
        } => cli::dump(workbook, sheet, month, dump, formats),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "❌ Error:".bold().red(), e);
        std::process::exit(1);
    }
}
