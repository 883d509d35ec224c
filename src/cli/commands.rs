use crate::audit;
use crate::error::{ReviewError, ReviewResult};
use crate::excel::{ExcelExporter, ExcelImporter};
use crate::ledger::{self, ChangedRow};
use crate::review::{self, Review};
use crate::rules::{Format, FormatRegistry};
use crate::types::{format_display, CellValue, Sheet};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// A sheet narrowed to one month, plus the format that reviews it
struct Selection {
    registry: FormatRegistry,
    sheet: Sheet,
    month: String,
}

impl Selection {
    fn load(
        workbook: &Path,
        sheet_name: &str,
        month: Option<&str>,
        formats: Option<&Path>,
    ) -> ReviewResult<Self> {
        let registry = FormatRegistry::load(formats)?;
        // fail on an unknown sheet before reading the workbook
        registry.resolve(sheet_name)?;

        let full = ExcelImporter::new(workbook).read_sheet(sheet_name)?;
        let available = full.months();
        let (sheet, month) = review::select_month(&full, month)?;

        println!("   Sheet: {}", sheet_name.bright_blue().bold());
        println!(
            "   Month: {} (of {})",
            month.bright_yellow().bold(),
            available.join(", ")
        );
        println!("   Rows:  {}", sheet.row_count());

        Ok(Self {
            registry,
            sheet,
            month,
        })
    }

    fn format(&self) -> ReviewResult<&Format> {
        self.registry.resolve(&self.sheet.name)
    }
}

/// List every format and the sheets it claims
pub fn formats(formats: Option<PathBuf>) -> ReviewResult<()> {
    let registry = FormatRegistry::load(formats.as_deref())?;

    println!("{}", "📋 MIS Reviewer - Formats".bold().green());
    println!();
    for format in registry.formats() {
        println!("   {} {}", format.name.bright_blue().bold(), format.title.dimmed());
        for sheet in &format.sheets {
            println!("      - {}", sheet);
        }
    }
    println!();
    println!("   {} formats", registry.len());
    Ok(())
}

/// List a workbook's sheets with the format each one maps to
pub fn sheets(workbook: PathBuf, formats: Option<PathBuf>) -> ReviewResult<()> {
    let registry = FormatRegistry::load(formats.as_deref())?;
    let names = ExcelImporter::new(&workbook).sheet_names()?;

    println!("{}", "📋 MIS Reviewer - Sheets".bold().green());
    println!("   Workbook: {}", workbook.display());
    println!();
    for name in names {
        match registry.resolve(&name) {
            Ok(format) => println!("   ✅ {} → {}", name, format.name.bright_blue()),
            Err(_) => println!("   {} {}", "·".dimmed(), name.dimmed()),
        }
    }
    Ok(())
}

/// Review one month of a sheet without writing anything
pub fn check(
    workbook: PathBuf,
    sheet: String,
    month: Option<String>,
    json: bool,
    output: Option<PathBuf>,
    formats: Option<PathBuf>,
) -> ReviewResult<()> {
    if json {
        // keep stdout machine readable
        let registry = FormatRegistry::load(formats.as_deref())?;
        let format = registry.resolve(&sheet)?;
        let full = ExcelImporter::new(&workbook).read_sheet(&sheet)?;
        let (selected, month) = review::select_month(&full, month.as_deref())?;
        let report = review::review(&selected, &month, format);
        if let Some(path) = &output {
            ExcelExporter::new().export_review(&report, path)?;
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "🔍 MIS Reviewer - Checking sheet".bold().green());
    println!("   Workbook: {}", workbook.display());
    let selection = Selection::load(&workbook, &sheet, month.as_deref(), formats.as_deref())?;
    let format = selection.format()?;
    println!("   Format: {} ({})", format.title.bright_blue(), format.name);
    println!();

    let report = review::review(&selection.sheet, &selection.month, format);
    print_review(&report);

    if let Some(path) = output {
        ExcelExporter::new().export_review(&report, &path)?;
        println!();
        println!("{}", format!("💾 Report written to {}", path.display()).green());
    }
    Ok(())
}

fn print_review(report: &Review) {
    for note in &report.notes {
        println!("   {} {}", "ℹ️ ".cyan(), note);
    }
    if !report.notes.is_empty() {
        println!();
    }

    let evaluation = &report.evaluation;
    if evaluation.is_clean() {
        println!("{}", "✅ All derived columns match".bold().green());
    } else {
        println!(
            "{}",
            format!(
                "❌ {} mismatches, {} row errors",
                evaluation.mismatches.len(),
                evaluation.row_errors.len()
            )
            .bold()
            .red()
        );
        for m in &evaluation.mismatches {
            println!(
                "   Row {} ({}): {} expected {}, recorded {}",
                m.row_number.to_string().bold(),
                m.row_date,
                m.column.yellow(),
                format_display(&m.expected).green(),
                format_display(&m.actual).red()
            );
        }
        for e in &evaluation.row_errors {
            println!("   Row {}: {}", e.row_number.to_string().bold(), e.message.red());
        }
    }
    println!();

    println!("{}", "📊 Totals".bold().cyan());
    for line in &report.aggregates {
        println!(
            "   {:<40} {}",
            line.label,
            format_display(&CellValue::Number(line.value)).bold()
        );
    }

    if !report.pivot.is_empty() {
        println!();
        println!("{}", "📊 Prices".bold().cyan());
        println!("   {} | days", report.pivot_columns.join(" | ").dimmed());
        for row in &report.pivot {
            println!("   {} | {}", row.values.join(" | "), row.days);
        }
    }

    for listing in &report.listings {
        println!();
        println!(
            "{}",
            format!("📋 {} ({})", listing.name, listing.rows.len()).bold().cyan()
        );
        if listing.rows.is_empty() {
            println!("   {}", "none".dimmed());
            continue;
        }
        println!("   row | {}", listing.columns.join(" | ").dimmed());
        for row in &listing.rows {
            let values: Vec<String> = row.values.iter().map(format_display).collect();
            println!("   {} | {}", row.row_number, values.join(" | "));
        }
    }
}

/// Write the month's aggregates into the P&L ledger
pub fn punch(
    workbook: PathBuf,
    sheet: String,
    month: Option<String>,
    ledger_path: PathBuf,
    formats: Option<PathBuf>,
) -> ReviewResult<()> {
    println!("{}", "🧾 MIS Reviewer - Punching P&L".bold().green());
    println!("   Ledger: {}", ledger_path.display());
    let selection = Selection::load(&workbook, &sheet, month.as_deref(), formats.as_deref())?;
    let format = selection.format()?;
    require_ledger(format)?;
    println!();

    let updates = review::ledger_updates(&selection.sheet, format);
    let changes = ledger::punch(&ledger_path, &updates, &format.ledger)?;

    println!(
        "{}",
        format!("✅ {} keys punched, {} rows changed", updates.len(), changes.len())
            .bold()
            .green()
    );
    print_changes(&changes);
    Ok(())
}

fn require_ledger(format: &Format) -> ReviewResult<()> {
    if format.ledger.is_empty() {
        return Err(ReviewError::Config(format!(
            "format '{}' has no ledger columns",
            format.name
        )));
    }
    Ok(())
}

/// Blank the month's tracked ledger columns
pub fn clear(
    workbook: PathBuf,
    sheet: String,
    month: Option<String>,
    ledger_path: PathBuf,
    formats: Option<PathBuf>,
) -> ReviewResult<()> {
    println!("{}", "🧹 MIS Reviewer - Clearing P&L".bold().green());
    println!("   Ledger: {}", ledger_path.display());
    let selection = Selection::load(&workbook, &sheet, month.as_deref(), formats.as_deref())?;
    let format = selection.format()?;
    require_ledger(format)?;
    println!();

    let keys: Vec<_> = review::ledger_updates(&selection.sheet, format)
        .into_keys()
        .collect();
    let changes = ledger::clear_in(&ledger_path, &keys, &format.ledger)?;

    println!(
        "{}",
        format!("✅ {} keys cleared", keys.len()).bold().green()
    );
    print_changes(&changes);
    Ok(())
}

fn print_changes(changes: &[ChangedRow]) {
    for change in changes {
        println!(
            "   {} {} {}",
            change.cost_centre.to_string().bright_blue().bold(),
            change.month,
            change.site_name.to_string().dimmed()
        );
        for (column, value) in &change.updated {
            println!("      {} = {}", column.cyan(), format_display(value));
        }
    }
}

/// Append the month's rows to the dump
pub fn dump(
    workbook: PathBuf,
    sheet: String,
    month: Option<String>,
    dump_path: PathBuf,
    formats: Option<PathBuf>,
) -> ReviewResult<()> {
    println!("{}", "📦 MIS Reviewer - Appending to dump".bold().green());
    println!("   Dump: {}", dump_path.display());
    let selection = Selection::load(&workbook, &sheet, month.as_deref(), formats.as_deref())?;
    let format = selection.format()?;
    println!();

    let outcome = audit::append_to(&dump_path, &selection.sheet, &format.dump, &selection.month)?;

    if let Some(last) = &outcome.last_row {
        println!("   Previous last row ({}):", last.row_number);
        let values: Vec<String> = last
            .values
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(c, v)| format!("{}={}", c, format_display(v)))
            .collect();
        println!("      {}", values.join(", ").dimmed());
    }
    if let Some(fee) = outcome.management_fee {
        println!(
            "   Management fee row: {}",
            format_display(&CellValue::Number(fee)).bold()
        );
    }
    println!(
        "{}",
        format!("✅ {} rows appended", outcome.appended).bold().green()
    );
    Ok(())
}
