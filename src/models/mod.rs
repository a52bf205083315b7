pub mod order_form;

pub use order_form::{CellValue, CellWrite, ReconcileOutcome, TargetSection};
