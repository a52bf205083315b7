use calamine::{open_workbook_auto, Data, DataType, Reader};
use chrono::{DateTime, Local};
use edit_xlsx::Write;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet, XlsxError};
use std::fmt::Display;
use std::io::{Read, Write as IoWrite};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::read::ZipArchive;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::SheetError;
use crate::types::{ExtractedDocument, FieldSchema, Quantity};

/// Sheet name of new output workbooks.
pub const OUTPUT_SHEET: &str = "Sheet1";

/// Column index to Excel letter (0→A, 1→B, 25→Z, 26→AA).
pub(crate) fn col_index_to_letter(index: u32) -> String {
    let mut n = index;
    let mut s = String::new();
    loop {
        let r = (n % 26) as u8;
        s.insert(0, (b'A' + r) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    s
}

pub(crate) fn open_error(e: impl Display) -> SheetError {
    let msg = e.to_string();
    if msg.contains("Could not open") || msg.contains("permission") || msg.contains("Permission") {
        SheetError::Open("Please close the file in Excel first.".to_string())
    } else {
        SheetError::Open(format!("Could not open Excel file: {}", msg))
    }
}

pub(crate) fn save_error(e: impl Display) -> SheetError {
    let msg = e.to_string();
    if msg.contains("Permission denied") || msg.contains("being used") {
        SheetError::Write("Please close the file in Excel first.".to_string())
    } else {
        SheetError::Write(format!("Cannot write to file: {}", msg))
    }
}

fn write_err(e: impl Display) -> SheetError {
    SheetError::Write(e.to_string())
}

/// `<prefix>_<YYYYmmdd_HHMMSS>.xlsx`
pub fn timestamped_file_name(prefix: &str, now: DateTime<Local>) -> String {
    format!("{}_{}.xlsx", prefix, now.format("%Y%m%d_%H%M%S"))
}

/// Fresh output path in `dir` for documents of schema `F`. Adds `_2`, `_3`, ... if the name is taken.
pub fn default_output_path<F: FieldSchema>(dir: &Path) -> PathBuf {
    let now = Local::now();
    let mut p = dir.join(timestamped_file_name(F::FILE_PREFIX, now));
    let mut counter = 2u32;
    while p.exists() {
        p = dir.join(format!(
            "{}_{}_{}.xlsx",
            F::FILE_PREFIX,
            now.format("%Y%m%d_%H%M%S"),
            counter
        ));
        counter += 1;
    }
    p
}

/// Find the last 1-based row index that contains any data in the sheet, scanning from header_row downward.
/// Stops after 100 consecutive empty rows. Returns 0 if the sheet is empty.
pub fn find_last_data_row(path: &Path, sheet_name: &str, header_row: u32) -> Result<u32, SheetError> {
    let mut workbook = open_workbook_auto(path).map_err(open_error)?;
    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|e| SheetError::Open(format!("Sheet not found: {}", e)))?;
    let start_row_0 = header_row.saturating_sub(1) as usize;
    // calamine ranges start at the first used cell, not at A1.
    let offset = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    let mut last_data_row_0: Option<usize> = None;
    let mut empty_count = 0u32;
    for (row_idx, row) in range.rows().enumerate() {
        let abs_row = row_idx + offset;
        if abs_row < start_row_0 {
            continue;
        }
        let has_data = row.iter().any(|c| !c.is_empty());
        if has_data {
            last_data_row_0 = Some(abs_row);
            empty_count = 0;
        } else {
            empty_count += 1;
            if empty_count >= 100 {
                break;
            }
        }
    }
    Ok(last_data_row_0.map(|r| (r + 1) as u32).unwrap_or(0))
}

/// Name of the first sheet in the workbook.
pub fn first_sheet_name(path: &Path) -> Result<String, SheetError> {
    let workbook = open_workbook_auto(path).map_err(open_error)?;
    workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(SheetError::NoWorksheet)
}

static REL_DRAWING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<Relationship[^>]*drawing[^>]*/>"#).expect("rel drawing regex"));
static CT_DRAWING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<Override\s+PartName="/xl/drawings/[^"]*"[^>]*/>"#).expect("ct drawing regex")
});
static CT_MEDIA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<Override\s+PartName="/xl/media/[^"]*"[^>]*/>"#).expect("ct media regex")
});

/// Strip drawing and image parts from an xlsx (zip) file so Excel won't
/// show "Repairs to ... Removed Part: Drawing shape" when opening.
/// Worksheet XML is copied unchanged.
pub(crate) fn strip_drawings_from_xlsx(path: &Path) -> Result<(), SheetError> {
    use std::fs::File;

    let strip_err = |e: String| SheetError::Write(format!("Could not strip drawings: {}", e));

    let file = File::open(path).map_err(|e| strip_err(format!("Could not open for strip: {}", e)))?;
    let mut archive = ZipArchive::new(file).map_err(|e| strip_err(format!("Invalid zip: {}", e)))?;

    let temp_path = path.with_extension("strip.xlsx");
    let out_file =
        File::create(&temp_path).map_err(|e| strip_err(format!("Could not create temp: {}", e)))?;
    let mut zip_writer = ZipWriter::new(out_file);
    let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| strip_err(format!("Entry {}: {}", i, e)))?;
        let name = entry.name().replace('\\', "/");
        if name.starts_with("xl/drawings/") || name.starts_with("xl/media/") {
            continue;
        }
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| strip_err(format!("Read {}: {}", name, e)))?;

        let out: Vec<u8> = if name == "[Content_Types].xml" {
            let s = String::from_utf8_lossy(&data);
            let out = CT_DRAWING_RE.replace_all(&s, "");
            CT_MEDIA_RE.replace_all(&out, "").into_owned().into_bytes()
        } else if name.contains("worksheets/_rels/") && name.ends_with(".rels") {
            let s = String::from_utf8_lossy(&data);
            REL_DRAWING_RE.replace_all(&s, "").into_owned().into_bytes()
        } else {
            data
        };
        zip_writer
            .start_file(name.as_str(), opts)
            .map_err(|e| strip_err(e.to_string()))?;
        zip_writer.write_all(&out).map_err(|e| strip_err(e.to_string()))?;
    }
    zip_writer.finish().map_err(|e| strip_err(e.to_string()))?;
    std::fs::rename(&temp_path, path).map_err(|e| strip_err(format!("Replace file: {}", e)))?;
    Ok(())
}

/// Drop characters that are not allowed in sheet XML and cause "unreadable content".
/// Tab, newline and CR are kept. XML escaping is left to the writers.
pub(crate) fn sanitize_cell(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            let u = c as u32;
            matches!(c, '\t' | '\n' | '\r') || !(u < 0x20 || u == 0x7F || u == 0xFFFE || u == 0xFFFF)
        })
        .collect()
}

/// Numeric value of a cell as written by the extractors, e.g. `1,250` or `12.50`.
fn parse_number(value: &str) -> Option<f64> {
    value.replace(',', "").replace(' ', "").trim().parse::<f64>().ok()
}

/// Write text cell with sanitized value (always write, use empty string if sanitized is empty).
fn write_text_cell_safe(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    text: &str,
    format: &Format,
) -> Result<(), XlsxError> {
    let cleaned = sanitize_cell(text);
    worksheet.write_string_with_format(row, col, &cleaned, format).map(|_| ())
}

/// Write number cell: parse as f64 and write number, or write sanitized text on parse failure.
fn write_number_cell_safe(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &str,
    number_format: &Format,
    text_format: &Format,
) -> Result<(), XlsxError> {
    match parse_number(value) {
        Some(num) => worksheet.write_number_with_format(row, col, num, number_format).map(|_| ()),
        None => {
            let text = sanitize_cell(value);
            worksheet.write_string_with_format(row, col, &text, text_format).map(|_| ())
        }
    }
}

/// Estimate column width from text length (char count × 1.2, clamped 10–50).
fn estimate_text_width(text: &str) -> f64 {
    let w = text.chars().count() as f64 * 1.2;
    w.clamp(10.0, 50.0)
}

/// Per-column widths: max of header width and cell widths; numeric columns fixed at 14.
fn calculate_export_column_widths<F: FieldSchema>(documents: &[ExtractedDocument<F>]) -> Vec<f64> {
    const NUMBER_WIDTH: f64 = 14.0;
    let mut max_widths: Vec<f64> = F::ALL.iter().map(|f| estimate_text_width(f.label())).collect();
    for doc in documents {
        for (field, value) in doc.iter() {
            let w = estimate_text_width(value.unwrap_or(""));
            if w > max_widths[field.index()] {
                max_widths[field.index()] = w;
            }
        }
    }
    for field in F::ALL.iter().filter(|f| f.is_numeric()) {
        max_widths[field.index()] = NUMBER_WIDTH;
    }
    max_widths
}

/// Create a new workbook at `path`: header row, then one row per document in column order.
pub fn export_documents_to_new_excel<F: FieldSchema>(
    documents: &[ExtractedDocument<F>],
    path: &Path,
) -> Result<(), SheetError> {
    let xlsx_err = |e: XlsxError| SheetError::Write(e.to_string());

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(OUTPUT_SHEET).map_err(xlsx_err)?;

    let header_format = Format::new()
        .set_bold()
        .set_background_color(rust_xlsxwriter::Color::RGB(0x2563EB))
        .set_font_color(rust_xlsxwriter::Color::RGB(0xFFFFFF));
    let text_format_wrap = Format::new().set_text_wrap();
    let number_format = Format::new()
        .set_num_format("#,##0.##")
        .set_align(FormatAlign::Right)
        .set_text_wrap();

    let col_widths = calculate_export_column_widths(documents);
    for (col, &w) in col_widths.iter().enumerate() {
        worksheet.set_column_width(col as u16, w).map_err(xlsx_err)?;
    }

    for field in F::ALL {
        write_text_cell_safe(worksheet, 0, field.index() as u16, field.label(), &header_format)
            .map_err(xlsx_err)?;
    }

    for (row_idx, doc) in documents.iter().enumerate() {
        let row = (row_idx + 1) as u32;
        let mut max_text_len = 0usize;
        for (field, value) in doc.iter() {
            let col = field.index() as u16;
            let value = value.unwrap_or("");
            if field.is_numeric() {
                write_number_cell_safe(worksheet, row, col, value, &number_format, &text_format_wrap)
                    .map_err(xlsx_err)?;
            } else {
                max_text_len = max_text_len.max(value.chars().count());
                write_text_cell_safe(worksheet, row, col, value, &text_format_wrap).map_err(xlsx_err)?;
            }
        }
        // Taller rows for long wrapped text.
        let row_height = if max_text_len > 80 {
            ((max_text_len as f64 / 50.0).ceil() * 15.0).min(100.0)
        } else if max_text_len > 40 {
            30.0
        } else {
            15.0
        };
        let _ = worksheet.set_row_height(row, row_height);
    }

    let _ = worksheet.set_freeze_panes(1, 0);
    workbook.save(path).map_err(save_error)?;
    info!(
        path = %path.display(),
        rows = documents.len(),
        document = F::DOCUMENT,
        "Workbook written"
    );
    Ok(())
}

/// Append document rows below the last data row of an existing workbook.
/// Writes the header row first if the sheet is empty. No deduplication.
/// Returns the 1-based row of the first appended document.
pub fn append_documents_to_existing_excel<F: FieldSchema>(
    path: &Path,
    sheet_name: Option<&str>,
    documents: &[ExtractedDocument<F>],
) -> Result<u32, SheetError> {
    const HEADER_ROW: u32 = 1;

    if !path.exists() {
        return Err(SheetError::Open(format!("File not found: {}", path.display())));
    }
    let sheet_name = match sheet_name {
        Some(name) => name.to_string(),
        None => first_sheet_name(path)?,
    };
    let last_row = find_last_data_row(path, &sheet_name, HEADER_ROW)?;
    let mut next_row = last_row + 1;

    let mut workbook = edit_xlsx::Workbook::from_path(path).map_err(open_error)?;
    let worksheet = workbook
        .get_worksheet_mut_by_name(&sheet_name)
        .map_err(|_| SheetError::Open(format!("Sheet '{}' not found.", sheet_name)))?;

    if last_row < HEADER_ROW {
        debug!(sheet = %sheet_name, "Sheet is empty, writing header row");
        for field in F::ALL {
            let cell_ref = format!("{}{}", col_index_to_letter(field.index() as u32), HEADER_ROW);
            worksheet
                .write_string(&cell_ref, sanitize_cell(field.label()))
                .map_err(write_err)?;
        }
        next_row = HEADER_ROW + 1;
    }

    let first_row = next_row;
    for doc in documents {
        for (field, value) in doc.iter() {
            let Some(value) = value else {
                continue;
            };
            let cell_ref = format!("{}{}", col_index_to_letter(field.index() as u32), next_row);
            match parse_number(value).filter(|_| field.is_numeric()) {
                Some(num) => worksheet.write_number(&cell_ref, num).map_err(write_err)?,
                None => worksheet
                    .write_string(&cell_ref, sanitize_cell(value))
                    .map_err(write_err)?,
            }
        }
        next_row += 1;
    }

    workbook.save_as(path).map_err(save_error)?;
    strip_drawings_from_xlsx(path)?;

    info!(
        path = %path.display(),
        sheet = %sheet_name,
        first_row,
        rows = documents.len(),
        "Rows appended"
    );
    Ok(first_row)
}

/// Cell text as it reads back: integral numbers without a fraction.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Int(i) => i.to_string(),
        Data::Float(n) => Quantity::Number(*n).to_string(),
        other => other.as_string().unwrap_or_default(),
    }
}

/// Read documents back from a workbook written by [`export_documents_to_new_excel`]
/// or [`append_documents_to_existing_excel`]. Header cells that are not field
/// labels of `F` are ignored.
pub fn read_documents<F: FieldSchema>(
    path: &Path,
    sheet_name: Option<&str>,
) -> Result<Vec<ExtractedDocument<F>>, SheetError> {
    let sheet_name = match sheet_name {
        Some(name) => name.to_string(),
        None => first_sheet_name(path)?,
    };
    let mut workbook = open_workbook_auto(path).map_err(open_error)?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| SheetError::Open(format!("Sheet not found: {}", e)))?;

    let mut rows = range.rows();
    let columns: Vec<Option<F>> = rows
        .next()
        .map(|header| header.iter().map(|c| F::from_label(&cell_text(c))).collect())
        .unwrap_or_default();
    if columns.iter().all(Option::is_none) {
        return Err(SheetError::MissingColumn(format!(
            "no {} columns in sheet '{}'",
            F::DOCUMENT,
            sheet_name
        )));
    }

    let documents = rows
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .map(|row| {
            ExtractedDocument::from_pairs(
                columns
                    .iter()
                    .zip(row.iter())
                    .filter_map(|(field, cell)| field.map(|f| (f, cell_text(cell)))),
            )
        })
        .collect();
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PoField, ReportField};
    use chrono::TimeZone;

    #[test]
    fn column_letters() {
        assert_eq!(col_index_to_letter(0), "A");
        assert_eq!(col_index_to_letter(25), "Z");
        assert_eq!(col_index_to_letter(26), "AA");
        assert_eq!(col_index_to_letter(27), "AB");
        assert_eq!(col_index_to_letter(701), "ZZ");
    }

    #[test]
    fn sanitize_drops_control_chars_only() {
        assert_eq!(sanitize_cell("a\u{1}b\tc\u{7f}"), "ab\tc");
        assert_eq!(sanitize_cell("R&D <x>"), "R&D <x>");
    }

    #[test]
    fn numbers_tolerate_thousands_separators() {
        assert_eq!(parse_number("1,250"), Some(1250.0));
        assert_eq!(parse_number(" 12.50 "), Some(12.5));
        assert_eq!(parse_number("12 pcs"), None);
    }

    #[test]
    fn file_names_carry_the_schema_prefix() {
        let now = Local.with_ymd_and_hms(2024, 3, 12, 9, 5, 7).unwrap();
        assert_eq!(
            timestamped_file_name(PoField::FILE_PREFIX, now),
            "purchase_order_20240312_090507.xlsx"
        );
        assert_eq!(
            timestamped_file_name(ReportField::FILE_PREFIX, now),
            "technical_reports_combined_20240312_090507.xlsx"
        );
    }

    #[test]
    fn numeric_columns_get_a_fixed_width() {
        let docs = vec![ExtractedDocument::from_pairs([
            (PoField::Description, "x".repeat(100)),
            (PoField::PoQty, "1".repeat(40)),
        ])];
        let widths = calculate_export_column_widths(&docs);
        assert_eq!(widths.len(), 16);
        assert_eq!(widths[PoField::Description.index()], 50.0);
        assert_eq!(widths[PoField::PoQty.index()], 14.0);
        assert_eq!(widths[PoField::Vas.index()], 10.0);
    }
}
