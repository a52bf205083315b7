pub mod labels;
pub mod purchase_order;
pub mod segments;
pub mod technical_report;

use crate::error::ExtractError;
use crate::pdf::DecodedPdf;
use crate::types::{ExtractedDocument, FieldSchema};

pub use purchase_order::PurchaseOrderExtractor;
pub use technical_report::TechnicalReportExtractor;

/// A field extractor for one document type.
pub trait Extractor: Sync {
    type Field: FieldSchema;

    fn extract(&self, pdf: &DecodedPdf) -> Result<ExtractedDocument<Self::Field>, ExtractError>;
}
