//! Excel workbook access
//!
//! - Import: billing sheets (header on row 2) and whole tables (header on row 1)
//! - Export: tables written back in place, and the review report

mod exporter;
mod importer;

pub use exporter::{sheet_name, ExcelExporter, REPORT_SHEETS};
pub use importer::{
    cell_value, date_to_excel_serial, excel_serial_to_date, ExcelImporter, SHEET_HEADER_ROW,
};
