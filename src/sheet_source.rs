//! Reads the PO export sheet: label codes with their quantities, plus the PO number.
//!
//! The export arrives as xlsx, legacy xls, or an HTML table saved with a
//! spreadsheet extension; the content decides which reader runs.

use calamine::{open_workbook_from_rs, Data, DataType, Range, Reader, Xls, Xlsx};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

use crate::error::SheetError;
use crate::types::{LabelQuantityEntry, Quantity};

static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)LABEL\s+([A-Z]-?\d+|[A-Z]\d+|[A-Z]\s?\d+)").expect("label code regex")
});

const PO_NUMBER_HEADER: &str = "Po No";

static EMPTY_CELL: SheetCell = SheetCell::Empty;

/// Parsed PO export: the order it belongs to and one entry per label found.
#[derive(Debug, Clone, Serialize)]
pub struct LabelSheet {
    pub po_number: String,
    pub entries: Vec<LabelQuantityEntry>,
}

/// One cell of the PO export, typed as far as the source format allows.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetCell {
    Empty,
    Number(f64),
    Text(String),
}

impl SheetCell {
    fn is_blank(&self) -> bool {
        match self {
            SheetCell::Empty => true,
            SheetCell::Number(_) => false,
            SheetCell::Text(s) => s.trim().is_empty(),
        }
    }

    fn to_quantity(&self) -> Quantity {
        match self {
            SheetCell::Number(n) => Quantity::Number(*n),
            SheetCell::Text(s) => Quantity::Text(s.trim().to_string()),
            SheetCell::Empty => Quantity::Text(String::new()),
        }
    }
}

impl fmt::Display for SheetCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetCell::Empty => Ok(()),
            SheetCell::Number(n) => fmt::Display::fmt(&Quantity::Number(*n), f),
            SheetCell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&Data> for SheetCell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty => SheetCell::Empty,
            Data::Int(i) => SheetCell::Number(*i as f64),
            Data::Float(n) => SheetCell::Number(*n),
            other => SheetCell::Text(other.as_string().unwrap_or_default()),
        }
    }
}

/// A header row and the data rows under it.
#[derive(Debug, Clone, Default)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<SheetCell>>,
}

impl SheetTable {
    /// First column whose header contains `needle`, ignoring case.
    pub fn find_column(&self, needle: &str) -> Option<usize> {
        let needle = needle.to_lowercase();
        self.headers
            .iter()
            .position(|h| h.to_lowercase().contains(&needle))
    }

    fn cell(&self, row: usize, col: usize) -> &SheetCell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
}

pub fn read_label_sheet(path: &Path) -> Result<LabelSheet, SheetError> {
    let bytes = fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let sheet = parse_label_sheet(&bytes, &file_name)?;
    info!(
        file = %file_name,
        po_number = %sheet.po_number,
        labels = sheet.entries.len(),
        "PO sheet read"
    );
    Ok(sheet)
}

pub fn parse_label_sheet(bytes: &[u8], file_name: &str) -> Result<LabelSheet, SheetError> {
    let table = load_table(bytes, file_name)?;
    label_sheet_from_table(&table)
}

/// Picks the reader from the leading bytes, then from the file extension.
pub fn load_table(bytes: &[u8], file_name: &str) -> Result<SheetTable, SheetError> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(10)]).to_string();
    if head.starts_with("<!DOCTYPE") || head.starts_with("<html") {
        debug!(file = file_name, "PO sheet is an HTML table");
        return html_table(&String::from_utf8_lossy(bytes));
    }

    let cursor = Cursor::new(bytes.to_vec());
    let range = if file_name.to_lowercase().ends_with(".xls") {
        let mut workbook: Xls<_> = open_workbook_from_rs(cursor)
            .map_err(|e| SheetError::Open(format!("Failed to read file: {}", e)))?;
        first_range(&mut workbook)?
    } else {
        let mut workbook: Xlsx<_> = open_workbook_from_rs(cursor)
            .map_err(|e| SheetError::Open(format!("Failed to read file: {}", e)))?;
        first_range(&mut workbook)?
    };
    Ok(table_from_range(&range))
}

fn first_range<R: Reader<Cursor<Vec<u8>>>>(workbook: &mut R) -> Result<Range<Data>, SheetError>
where
    R::Error: fmt::Display,
{
    workbook
        .worksheet_range_at(0)
        .ok_or(SheetError::NoWorksheet)?
        .map_err(|e| SheetError::Open(e.to_string()))
}

fn table_from_range(range: &Range<Data>) -> SheetTable {
    let mut rows = range.rows();
    let headers = rows
        .next()
        .map(|r| r.iter().map(|c| c.as_string().unwrap_or_default().trim().to_string()).collect())
        .unwrap_or_default();
    let rows = rows.map(|r| r.iter().map(SheetCell::from).collect()).collect();
    SheetTable { headers, rows }
}

/// First `<table>` of the document; its first row is the header.
fn html_table(html: &str) -> Result<SheetTable, SheetError> {
    let table_sel = Selector::parse("table").map_err(|e| SheetError::Html(e.to_string()))?;
    let row_sel = Selector::parse("tr").map_err(|e| SheetError::Html(e.to_string()))?;
    let cell_sel = Selector::parse("th, td").map_err(|e| SheetError::Html(e.to_string()))?;

    let document = Html::parse_document(html);
    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| SheetError::Html("no <table> element found".to_string()))?;

    let mut rows = table.select(&row_sel).map(|tr| {
        tr.select(&cell_sel)
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect::<Vec<String>>()
    });
    let headers = rows.next().unwrap_or_default();
    let rows = rows
        .map(|r| r.into_iter().map(html_cell).collect())
        .collect();
    Ok(SheetTable { headers, rows })
}

fn html_cell(text: String) -> SheetCell {
    if text.is_empty() {
        return SheetCell::Empty;
    }
    match text.parse::<f64>() {
        Ok(n) => SheetCell::Number(n),
        Err(_) => SheetCell::Text(text),
    }
}

/// Every label code in a name cell.
pub fn label_codes(name: &str) -> Vec<String> {
    LABEL_RE
        .captures_iter(name)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

pub fn label_sheet_from_table(table: &SheetTable) -> Result<LabelSheet, SheetError> {
    let (Some(name_col), Some(qty_col)) = (table.find_column("name"), table.find_column("qty"))
    else {
        return Err(SheetError::MissingColumn(
            "Required columns not found in PO file".to_string(),
        ));
    };

    let mut entries = Vec::new();
    for row in 0..table.rows.len() {
        let name = table.cell(row, name_col).to_string();
        for label in label_codes(&name) {
            entries.push(LabelQuantityEntry {
                label,
                quantity: table.cell(row, qty_col).to_quantity(),
            });
        }
    }

    let po_number = table
        .headers
        .iter()
        .position(|h| h == PO_NUMBER_HEADER)
        .map(|col| table.cell(0, col))
        .filter(|cell| !cell.is_blank())
        .map(|cell| cell.to_string().trim().to_string())
        .ok_or_else(|| SheetError::MissingColumn("Could not find PO number in file".to_string()))?;

    Ok(LabelSheet { po_number, entries })
}
