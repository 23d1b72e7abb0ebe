//! Spreadsheet export of one analysed invoice.
//!
//! The workbook has a single sheet: a header row with the record's field
//! names in model order and one data row beneath it.

use crate::error::AnalyzerError;
use crate::record::InvoiceRecord;
use rust_xlsxwriter::{Color, Format, Workbook, Worksheet, XlsxError};
use serde_json::Value;
use tracing::debug;

/// Filename offered to the browser.
pub const EXPORT_FILENAME: &str = "analisis_factura.xlsx";

/// MIME type of the download.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const SHEET_NAME: &str = "Factura";

/// Excel refuses cell strings longer than this.
const MAX_CELL_CHARS: usize = 32_767;

/// Render `record` as an in-memory `.xlsx` file.
pub fn record_to_xlsx(record: &InvoiceRecord) -> Result<Vec<u8>, AnalyzerError> {
    build_workbook(record).map_err(|e| AnalyzerError::Export(e.to_string()))
}

fn build_workbook(record: &InvoiceRecord) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x2563EB))
        .set_font_color(Color::RGB(0xFFFFFF));
    let text_format = Format::new().set_text_wrap();

    for (col, (key, value)) in record.iter().enumerate() {
        let col = col as u16;
        worksheet.write_string_with_format(0, col, clip(key), &header_format)?;
        write_value(worksheet, 1, col, value, &text_format)?;
        let width = key.chars().count().clamp(12, 60) as f64;
        worksheet.set_column_width(col, width)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    let bytes = workbook.save_to_buffer()?;
    debug!(columns = record.len(), bytes = bytes.len(), "Spreadsheet built");
    Ok(bytes)
}

fn write_value(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
    text_format: &Format,
) -> Result<(), XlsxError> {
    match value {
        Value::Null => {}
        Value::Bool(b) => {
            worksheet.write_boolean(row, col, *b)?;
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() => {
                worksheet.write_number(row, col, f)?;
            }
            _ => {
                worksheet.write_string_with_format(row, col, clip(&n.to_string()), text_format)?;
            }
        },
        Value::String(s) => {
            worksheet.write_string_with_format(row, col, clip(s), text_format)?;
        }
        nested => {
            worksheet.write_string_with_format(row, col, clip(&nested.to_string()), text_format)?;
        }
    }
    Ok(())
}

fn clip(s: &str) -> &str {
    match s.char_indices().nth(MAX_CELL_CHARS) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
