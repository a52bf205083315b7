use serde::Serialize;
use std::path::PathBuf;

use crate::excel::col_index_to_letter;

/// 1-based (row, column) of a sheet cell, as edit-xlsx addresses it.
pub type CellPos = (u32, u32);

/// Where the order form wants its values. Located once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSection {
    /// Row holding the `Item#` / `Quantity` headers.
    pub header_row: u32,
    pub item_col: u32,
    pub qty_col: u32,
    /// The `PO NUMBER:` label cell; the value goes one column right.
    pub po_number_cell: CellPos,
    /// The `Order Date : ` label cell; the value goes one column right.
    pub order_date_cell: CellPos,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

/// One planned write, 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellWrite {
    pub row: u32,
    pub col: u32,
    pub value: CellValue,
}

impl CellWrite {
    pub fn text(row: u32, col: u32, value: impl Into<String>) -> Self {
        Self {
            row,
            col,
            value: CellValue::Text(value.into()),
        }
    }

    /// A1-style reference, e.g. `C7`.
    pub fn cell_ref(&self) -> String {
        format!("{}{}", col_index_to_letter(self.col - 1), self.row)
    }
}

/// What a reconciliation run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub output_path: PathBuf,
    pub section: TargetSection,
    pub po_number: String,
    pub order_date: String,
    pub cells_written: usize,
}
