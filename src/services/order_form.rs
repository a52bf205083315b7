//! Order-form reconciliation: find the "Main Labels" section of the form and
//! fill it from the PO label sheet (1-based row/col, as edit-xlsx addresses cells).

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::NaiveDate;
use edit_xlsx::Write;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::activation::Capability;
use crate::error::SheetError;
use crate::excel::{open_error, sanitize_cell, save_error, strip_drawings_from_xlsx};
use crate::models::{CellValue, CellWrite, ReconcileOutcome, TargetSection};
use crate::types::{LabelQuantityEntry, Quantity};

const MAIN_LABELS: &str = "Main Labels";
const PO_NUMBER_LABEL: &str = "PO NUMBER:";
const ORDER_DATE_LABEL: &str = "Order Date : ";
const ITEM_HEADER: &str = "Item#";
const QUANTITY_HEADER: &str = "Quantity";

const INPUT_DATE_FORMAT: &str = "%d/%m/%Y";
const OUTPUT_DATE_FORMAT: &str = "%d-%b-%Y";

/// Read-only snapshot of the text cells of one sheet.
#[derive(Debug, Clone, Default)]
pub struct CellGrid {
    cells: HashMap<(u32, u32), String>,
    max_row: u32,
    max_column: u32,
}

impl CellGrid {
    /// Grid from rows of optional text; row 0 of `rows` is sheet row 1.
    pub fn from_rows(rows: &[Vec<Option<&str>>]) -> Self {
        let mut grid = Self::default();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if let Some(value) = value {
                    grid.insert(r as u32 + 1, c as u32 + 1, value.to_string());
                }
            }
        }
        grid
    }

    /// Grid from a calamine range. Only string cells are kept.
    pub fn from_range(range: &Range<Data>) -> Self {
        let mut grid = Self::default();
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        for (r, c, value) in range.used_cells() {
            if let Data::String(s) = value {
                grid.insert(start_row + r as u32 + 1, start_col + c as u32 + 1, s.clone());
            }
        }
        if let Some((end_row, end_col)) = range.end() {
            grid.max_row = grid.max_row.max(end_row + 1);
            grid.max_column = grid.max_column.max(end_col + 1);
        }
        grid
    }

    fn insert(&mut self, row: u32, col: u32, value: String) {
        self.max_row = self.max_row.max(row);
        self.max_column = self.max_column.max(col);
        self.cells.insert((row, col), value);
    }

    pub fn text(&self, row: u32, col: u32) -> Option<&str> {
        self.cells.get(&(row, col)).map(String::as_str)
    }

    pub fn max_row(&self) -> u32 {
        self.max_row
    }

    pub fn max_column(&self) -> u32 {
        self.max_column
    }

    /// First cell in `row` whose text equals `label` exactly.
    fn find_in_row(&self, row: u32, label: &str) -> Option<u32> {
        (1..=self.max_column).find(|&col| self.text(row, col) == Some(label))
    }
}

/// Locates the label section, the header columns, and the two scalar cells.
pub fn locate_section(grid: &CellGrid) -> Result<TargetSection, SheetError> {
    let mut main_labels_row = None;
    let mut po_number_cell = None;
    let mut order_date_cell = None;

    for row in 1..=grid.max_row() {
        let Some(first) = grid.text(row, 1) else {
            continue;
        };
        if first.contains(MAIN_LABELS) {
            main_labels_row = Some(row);
        } else if first.contains(PO_NUMBER_LABEL) {
            po_number_cell = grid.find_in_row(row, PO_NUMBER_LABEL).map(|col| (row, col));
        } else if first.contains(ORDER_DATE_LABEL) {
            order_date_cell = grid.find_in_row(row, ORDER_DATE_LABEL).map(|col| (row, col));
        }
        if main_labels_row.is_some() && po_number_cell.is_some() && order_date_cell.is_some() {
            break;
        }
    }

    let main_labels_row = main_labels_row.ok_or_else(|| {
        SheetError::SectionNotFound("Main Labels section not found in order form".to_string())
    })?;
    let po_number_cell = po_number_cell.ok_or_else(|| {
        SheetError::SectionNotFound(format!("'{}' cell not found in order form", PO_NUMBER_LABEL))
    })?;
    let order_date_cell = order_date_cell.ok_or_else(|| {
        SheetError::SectionNotFound(format!(
            "'{}' cell not found in order form",
            ORDER_DATE_LABEL.trim()
        ))
    })?;

    let header_row = main_labels_row + 1;
    let mut item_col = None;
    let mut qty_col = None;
    for col in 1..=grid.max_column() {
        let Some(header) = grid.text(header_row, col) else {
            continue;
        };
        if header.contains(ITEM_HEADER) {
            item_col = Some(col);
        } else if header.contains(QUANTITY_HEADER) {
            qty_col = Some(col);
        }
    }
    let (Some(item_col), Some(qty_col)) = (item_col, qty_col) else {
        return Err(SheetError::SectionNotFound(
            "Could not find Item# or Quantity columns".to_string(),
        ));
    };

    Ok(TargetSection {
        header_row,
        item_col,
        qty_col,
        po_number_cell,
        order_date_cell,
    })
}

/// `DD/MM/YYYY` to `DD-Mon-YYYY`.
pub fn format_order_date(date: &str) -> Result<String, SheetError> {
    NaiveDate::parse_from_str(date.trim(), INPUT_DATE_FORMAT)
        .map(|d| d.format(OUTPUT_DATE_FORMAT).to_string())
        .map_err(|_| SheetError::FormatMismatch(date.to_string()))
}

/// Every write of the run, in order. Label `i` goes to `header_row + 1 + i`.
pub fn plan_writes(
    section: &TargetSection,
    entries: &[LabelQuantityEntry],
    po_number: &str,
    formatted_date: &str,
) -> Vec<CellWrite> {
    let mut writes = Vec::with_capacity(entries.len() * 2 + 2);
    for (i, entry) in entries.iter().enumerate() {
        let row = section.header_row + 1 + i as u32;
        writes.push(CellWrite::text(row, section.item_col + 1, entry.label.as_str()));
        let quantity = match &entry.quantity {
            Quantity::Number(n) => CellValue::Number(*n),
            Quantity::Text(s) => CellValue::Text(s.clone()),
        };
        writes.push(CellWrite {
            row,
            col: section.qty_col + 1,
            value: quantity,
        });
    }
    let (po_row, po_col) = section.po_number_cell;
    writes.push(CellWrite::text(po_row, po_col + 1, po_number));
    let (date_row, date_col) = section.order_date_cell;
    writes.push(CellWrite::text(date_row, date_col + 1, formatted_date));
    writes
}

/// Applies planned writes to an in-memory grid. Numbers land as their display text.
pub fn apply_to_grid(grid: &mut CellGrid, writes: &[CellWrite]) {
    for w in writes {
        let text = match &w.value {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => Quantity::Number(*n).to_string(),
        };
        grid.insert(w.row, w.col, text);
    }
}

/// Input of one reconciliation run.
#[derive(Debug, Clone)]
pub struct OrderFormJob<'a> {
    pub form_path: &'a Path,
    pub output_path: &'a Path,
    pub entries: &'a [LabelQuantityEntry],
    pub po_number: &'a str,
    /// `DD/MM/YYYY`.
    pub order_date: &'a str,
}

/// Fills the order form and saves it to `job.output_path`.
///
/// Everything is located and planned before the workbook is touched; the result
/// is written to a temporary file next to the destination and renamed over it.
/// On any error the destination is left as it was.
pub fn reconcile_order_form(
    _capability: &Capability,
    job: &OrderFormJob<'_>,
) -> Result<ReconcileOutcome, SheetError> {
    let (sheet_name, grid) = read_first_sheet(job.form_path)?;
    let section = locate_section(&grid)?;
    debug!(?section, "Order form section located");

    let order_date = format_order_date(job.order_date)?;
    let writes = plan_writes(&section, job.entries, job.po_number, &order_date);

    let temp_path = temp_path_for(job.output_path);
    if let Err(e) = write_workbook(job.form_path, &temp_path, &sheet_name, &writes) {
        if temp_path.exists() {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                warn!(path = %temp_path.display(), error = %cleanup, "Could not remove temporary file");
            }
        }
        return Err(e);
    }
    fs::rename(&temp_path, job.output_path)
        .map_err(|e| SheetError::Write(format!("Replace file: {}", e)))?;

    info!(
        output = %job.output_path.display(),
        labels = job.entries.len(),
        po_number = job.po_number,
        "Order form filled"
    );
    Ok(ReconcileOutcome {
        output_path: job.output_path.to_path_buf(),
        section,
        po_number: job.po_number.to_string(),
        order_date,
        cells_written: writes.len(),
    })
}

/// Name and text snapshot of the first (active) sheet.
fn read_first_sheet(path: &Path) -> Result<(String, CellGrid), SheetError> {
    if !path.exists() {
        return Err(SheetError::Open(format!("File not found: {}", path.display())));
    }
    let mut workbook =
        open_workbook_auto(path).map_err(|e| SheetError::Open(format!("Could not open Excel file: {}", e)))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(SheetError::NoWorksheet)?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| SheetError::Open(format!("Sheet not found: {}", e)))?;
    Ok((sheet_name, CellGrid::from_range(&range)))
}

fn temp_path_for(output: &Path) -> PathBuf {
    output.with_extension("tmp.xlsx")
}

fn write_workbook(
    form_path: &Path,
    temp_path: &Path,
    sheet_name: &str,
    writes: &[CellWrite],
) -> Result<(), SheetError> {
    let mut workbook = edit_xlsx::Workbook::from_path(form_path).map_err(open_error)?;
    let worksheet = workbook
        .get_worksheet_mut_by_name(sheet_name)
        .map_err(|_| SheetError::Open(format!("Sheet '{}' not found.", sheet_name)))?;

    for w in writes {
        let cell_ref = w.cell_ref();
        match &w.value {
            CellValue::Text(s) => worksheet.write_string(&cell_ref, sanitize_cell(s)),
            CellValue::Number(n) => worksheet.write_number(&cell_ref, *n),
        }
        .map_err(|e| SheetError::Write(format!("{}: {}", cell_ref, e)))?;
    }

    workbook.save_as(temp_path).map_err(save_error)?;
    strip_drawings_from_xlsx(temp_path)?;
    Ok(())
}
