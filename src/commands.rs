use chrono::Local;
use serde::Serialize;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread;
use tracing::{info, warn};

use crate::activation::Capability;
use crate::config::Config;
use crate::error::{AppError, DecodeError, DocumentError};
use crate::excel;
use crate::extractors::{Extractor, PurchaseOrderExtractor, TechnicalReportExtractor};
use crate::models::ReconcileOutcome;
use crate::pdf::{LopdfDecoder, PdfDecoder};
use crate::services::order_form::{reconcile_order_form, OrderFormJob};
use crate::sheet_source::{read_label_sheet, LabelSheet};
use crate::types::{
    AggregatedResult, ExtractedDocument, FailedDocument, FieldSchema, PoField, ReportField,
    SourcedDocument,
};

const MAX_DOCUMENT_BYTES: u64 = 50 * 1024 * 1024;

/// Checks that `path` exists, is not oversized, and starts with a PDF header.
pub fn validate_document_file(path: &Path) -> Result<(), DecodeError> {
    if !path.exists() {
        return Err(DecodeError::Invalid("File not found.".to_string()));
    }
    let metadata = fs::metadata(path)?;
    if metadata.len() > MAX_DOCUMENT_BYTES {
        return Err(DecodeError::Invalid("File too large (max 50MB).".to_string()));
    }
    let mut f = fs::File::open(path)?;
    let mut header = [0u8; 8];
    if f.read(&mut header).unwrap_or(0) < 5 {
        return Err(DecodeError::Invalid(
            "Not a valid PDF (could not read header).".to_string(),
        ));
    }
    if !header.starts_with(b"%PDF-") {
        return Err(DecodeError::Invalid("Not a valid PDF file.".to_string()));
    }
    Ok(())
}

/// Decodes and extracts one file.
pub fn extract_document<E: Extractor, D: PdfDecoder>(
    extractor: &E,
    decoder: &D,
    path: &Path,
) -> Result<ExtractedDocument<E::Field>, DocumentError> {
    validate_document_file(path)?;
    let bytes = fs::read(path).map_err(DecodeError::from)?;
    let pdf = decoder.decode(&bytes)?;
    Ok(extractor.extract(&pdf)?)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|o| o.to_str())
        .unwrap_or("")
        .to_string()
}

/// Runs `extractor` over `paths`, `concurrency` files at a time.
///
/// Results keep input order. A failing file is recorded and logged; the rest continue.
pub fn batch_extract<E: Extractor, D: PdfDecoder>(
    extractor: &E,
    decoder: &D,
    paths: &[PathBuf],
    concurrency: usize,
) -> AggregatedResult<E::Field> {
    let mut successes = Vec::new();
    let mut failures = Vec::new();

    for chunk in paths.chunks(concurrency.max(1)) {
        let outcomes: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|path| scope.spawn(move || extract_document(extractor, decoder, path)))
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });

        for (path, outcome) in chunk.iter().zip(outcomes) {
            let file_name = file_name_of(path);
            let error = match outcome {
                Ok(Ok(document)) => {
                    info!(file = %file_name, filled = document.filled(), "Extracted");
                    successes.push(SourcedDocument {
                        file_path: path.clone(),
                        document,
                    });
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => "Extraction thread panicked".to_string(),
            };
            warn!(file = %file_name, error = %error, "Extraction failed");
            failures.push(FailedDocument {
                file_path: path.clone(),
                file_name,
                error,
            });
        }
    }

    AggregatedResult {
        successes,
        failures,
    }
}

/// Where the extracted rows go.
#[derive(Debug, Clone, Default)]
pub struct ExtractRequest {
    pub inputs: Vec<PathBuf>,
    /// Explicit path of a new workbook.
    pub output: Option<PathBuf>,
    /// Existing workbook to append to instead of creating one.
    pub append_to: Option<PathBuf>,
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(bound = "")]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport<F: FieldSchema> {
    pub workbook: PathBuf,
    pub appended: bool,
    #[serde(flatten)]
    pub result: AggregatedResult<F>,
}

fn extract_to_workbook<E: Extractor>(
    extractor: &E,
    config: &Config,
    request: &ExtractRequest,
) -> Result<ExtractionReport<E::Field>, AppError> {
    let result = batch_extract(extractor, &LopdfDecoder, &request.inputs, config.concurrency);
    if result.successes.is_empty() {
        return Err(AppError::NoDocuments(request.inputs.len()));
    }
    let documents: Vec<ExtractedDocument<E::Field>> = result.documents().cloned().collect();

    let (workbook, appended) = match &request.append_to {
        Some(path) => {
            excel::append_documents_to_existing_excel(path, request.sheet.as_deref(), &documents)?;
            (path.clone(), true)
        }
        None => {
            let path = match &request.output {
                Some(p) => p.clone(),
                None => excel::default_output_path::<E::Field>(&output_dir(config, &request.inputs)),
            };
            excel::export_documents_to_new_excel(&documents, &path)?;
            (path, false)
        }
    };

    info!(
        document = <E::Field as FieldSchema>::DOCUMENT,
        extracted = result.successes.len(),
        failed = result.failures.len(),
        workbook = %workbook.display(),
        "Batch finished"
    );
    Ok(ExtractionReport {
        workbook,
        appended,
        result,
    })
}

/// Configured output directory, else the directory of the first input.
fn output_dir(config: &Config, inputs: &[PathBuf]) -> PathBuf {
    config
        .output_dir
        .clone()
        .or_else(|| {
            inputs
                .first()
                .and_then(|p| p.parent())
                .map(Path::to_path_buf)
        })
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn extract_purchase_orders(
    capability: &Capability,
    config: &Config,
    request: &ExtractRequest,
) -> Result<ExtractionReport<PoField>, AppError> {
    extract_to_workbook(&PurchaseOrderExtractor::new(capability), config, request)
}

pub fn extract_technical_reports(
    capability: &Capability,
    config: &Config,
    request: &ExtractRequest,
) -> Result<ExtractionReport<ReportField>, AppError> {
    extract_to_workbook(&TechnicalReportExtractor::new(capability), config, request)
}

#[derive(Debug, Clone, Default)]
pub struct OrderFormRequest {
    pub po_sheet: PathBuf,
    pub order_form: PathBuf,
    pub output: Option<PathBuf>,
    pub in_place: bool,
    /// `DD/MM/YYYY`; today when absent.
    pub order_date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFormReport {
    pub sheet: LabelSheet,
    pub outcome: ReconcileOutcome,
}

/// Default location of a filled form: next to the original, timestamped.
pub fn order_form_output_path(order_form: &Path) -> PathBuf {
    let name = format!(
        "product_order_output_{}.xlsx",
        Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    order_form
        .parent()
        .map(|dir| dir.join(&name))
        .unwrap_or_else(|| PathBuf::from(name))
}

pub fn fill_order_form(
    capability: &Capability,
    request: &OrderFormRequest,
) -> Result<OrderFormReport, AppError> {
    let sheet = read_label_sheet(&request.po_sheet)?;
    if sheet.entries.is_empty() {
        warn!(file = %request.po_sheet.display(), "No label codes found in PO sheet");
    }

    let output_path = if request.in_place {
        request.order_form.clone()
    } else {
        request
            .output
            .clone()
            .unwrap_or_else(|| order_form_output_path(&request.order_form))
    };
    let order_date = request
        .order_date
        .clone()
        .unwrap_or_else(|| Local::now().format("%d/%m/%Y").to_string());

    let outcome = reconcile_order_form(
        capability,
        &OrderFormJob {
            form_path: &request.order_form,
            output_path: &output_path,
            entries: &sheet.entries,
            po_number: &sheet.po_number,
            order_date: &order_date,
        },
    )?;
    Ok(OrderFormReport { sheet, outcome })
}
