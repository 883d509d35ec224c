//! Workbook fixtures shared by the integration tests

#![allow(dead_code)]

use chrono::NaiveDate;
use mis_reviewer::excel::{date_to_excel_serial, ExcelExporter};
use mis_reviewer::{CellValue, Table};
use rust_xlsxwriter::{Format, Workbook};
use std::path::{Path, PathBuf};

pub const SODEXO_SHEET: &str = "Schneider Sodexo Card.";

pub const SODEXO_COLUMNS: [&str; 12] = [
    "Date",
    "Month",
    "Day",
    "Cost Centre",
    "Site Name",
    "Order Type",
    "Rate",
    "Quantity",
    "Selling Amount",
    "Commission",
    "Buying Amt AI",
    "Buying Amount",
];

pub enum Cell {
    Date(u32, u32, u32),
    Text(&'static str),
    Num(f64),
}

fn sodexo_row(date: (u32, u32), month: &'static str, day: &'static str, rate: f64, qty: f64, selling: f64) -> Vec<Cell> {
    let commission = selling * 0.1;
    let buying_ai = selling - commission;
    vec![
        Cell::Date(2024, date.0, date.1),
        Cell::Text(month),
        Cell::Text(day),
        Cell::Text("SCH01"),
        Cell::Text("Schneider Bangalore"),
        Cell::Text("Regular"),
        Cell::Num(rate),
        Cell::Num(qty),
        Cell::Num(selling),
        Cell::Num(commission),
        Cell::Num(buying_ai),
        Cell::Num(buying_ai * 100.0 / 105.0),
    ]
}

/// Three rows: two in Jan-24 (the second bills 35 for 10 x 5), one in Feb-24
pub fn sodexo_rows() -> Vec<Vec<Cell>> {
    vec![
        sodexo_row((1, 1), "Jan-24", "Mon", 35.0, 10.0, 350.0),
        sodexo_row((1, 2), "Jan-24", "Tue", 10.0, 5.0, 35.0),
        sodexo_row((2, 1), "Feb-24", "Thu", 35.0, 10.0, 350.0),
    ]
}

/// MIS workbook: a title on row 1, headers on row 2, data below
pub fn write_mis(path: &Path, sheet: &str, columns: &[&str], rows: &[Vec<Cell>]) {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("dd-mm-yyyy");

    workbook.add_worksheet().set_name("Summary").unwrap();
    let ws = workbook.add_worksheet();
    ws.set_name(sheet).unwrap();
    ws.write_string(0, 0, "Monthly MIS").unwrap();
    for (c, name) in columns.iter().enumerate() {
        ws.write_string(1, c as u16, *name).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        let r = r as u32 + 2;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                Cell::Date(y, m, d) => {
                    let date = NaiveDate::from_ymd_opt(*y as i32, *m, *d).unwrap();
                    ws.write_number_with_format(r, c, date_to_excel_serial(date), &date_format)
                        .unwrap();
                }
                Cell::Text(s) => {
                    ws.write_string(r, c, *s).unwrap();
                }
                Cell::Num(n) => {
                    ws.write_number(r, c, *n).unwrap();
                }
            }
        }
    }
    workbook.save(path).unwrap();
}

pub fn sodexo_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("MIS.xlsx");
    write_mis(&path, SODEXO_SHEET, &SODEXO_COLUMNS, &sodexo_rows());
    path
}

/// P&L ledger with rows for SCH01 in Jan-24 and Feb-24 plus an unrelated site
pub fn ledger_table() -> Table {
    let mut table = Table::new(
        "P&L",
        vec![
            "cost centre".into(),
            "month".into(),
            "site name".into(),
            "days".into(),
            "regular buying".into(),
            "selling -gmv".into(),
            "remarks".into(),
        ],
    );
    table.rows.push(vec![
        "SCH01".into(),
        "Jan-24".into(),
        "Schneider Bangalore".into(),
        CellValue::Number(1.0),
        CellValue::Number(2.0),
        CellValue::Number(3.0),
        "keep".into(),
    ]);
    table.rows.push(vec![
        "SCH01".into(),
        "Feb-24".into(),
        "Schneider Bangalore".into(),
        CellValue::Empty,
        CellValue::Empty,
        CellValue::Number(9.0),
        CellValue::Empty,
    ]);
    table.rows.push(vec![
        "AIR01".into(),
        "Jan-24".into(),
        "Airtel Center".into(),
        CellValue::Number(20.0),
        CellValue::Number(1000.0),
        CellValue::Number(1200.0),
        CellValue::Empty,
    ]);
    table
}

pub fn write_table(path: &Path, table: &Table) {
    ExcelExporter::new().write_table(table, path).unwrap();
}

pub fn ledger_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("P&L.xlsx");
    write_table(&path, &ledger_table());
    path
}

/// Dump with one earlier row
pub fn dump_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("Dump.xlsx");
    let mut table = Table::new(
        "Dump",
        vec![
            "date".into(),
            "month".into(),
            "day".into(),
            "site name".into(),
            "order type".into(),
            "buying amt ai".into(),
            "selling amount".into(),
            "commission".into(),
            "remarks".into(),
        ],
    );
    table.rows.push(vec![
        CellValue::Date(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()),
        "dec-23".into(),
        "sun".into(),
        "schneider bangalore".into(),
        "regular".into(),
        CellValue::Number(90.0),
        CellValue::Number(100.0),
        CellValue::Number(10.0),
        "old".into(),
    ]);
    write_table(&path, &table);
    path
}
