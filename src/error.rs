use thiserror::Error;

/// Failures of the purchase-order text extractor. Fatal for the document being parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Required anchor '{0}' not found in document text")]
    StructuralAnchorMissing(&'static str),

    #[error("Item row is malformed: {0}")]
    MalformedItemRow(String),
}

/// Failures of the PDF decode collaborator.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Could not read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Invalid(String),

    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("PDF has no text layer (image-only pages need OCR)")]
    ImageOnly,
}

/// Failures while reading, locating, or writing spreadsheet cells.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Could not open spreadsheet: {0}")]
    Open(String),

    #[error("Could not parse HTML table: {0}")]
    Html(String),

    #[error("Spreadsheet has no worksheet")]
    NoWorksheet,

    #[error("Required column not found: {0}")]
    MissingColumn(String),

    #[error("Section anchor not found: {0}")]
    SectionNotFound(String),

    #[error("Invalid date format. Expected dd/mm/yyyy, got: {0}")]
    FormatMismatch(String),

    #[error("Cannot write to spreadsheet: {0}")]
    Write(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-document failure inside a batch.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Activation failed: {0}")]
    Activation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet error: {0}")]
    Sheet(#[from] SheetError),

    #[error("No data could be extracted from any of the {0} input file(s)")]
    NoDocuments(usize),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
