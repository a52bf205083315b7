use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;

/// Fixed, ordered set of field names a document type yields. The order is the output column order.
pub trait FieldSchema: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Human-readable document type, used in logs.
    const DOCUMENT: &'static str;
    /// File name prefix of new output workbooks.
    const FILE_PREFIX: &'static str;
    const ALL: &'static [Self];

    fn label(self) -> &'static str;

    /// Position in [`FieldSchema::ALL`].
    fn index(self) -> usize;

    /// Written as a number when the value parses as one.
    fn is_numeric(self) -> bool {
        false
    }

    fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.iter().copied().find(|f| f.label() == label)
    }

    fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.label()).collect()
    }
}

/// Purchase-order fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoField {
    PoNumber,
    StyleNumber,
    Description,
    PoRelDate,
    UnitPrice,
    PoQty,
    HodDate,
    FfcCode,
    Seller,
    SourcingType,
    PoHeaderText,
    Country,
    Vas,
    PlantCode,
    Season,
    Brand,
}

impl FieldSchema for PoField {
    const DOCUMENT: &'static str = "purchase order";
    const FILE_PREFIX: &'static str = "purchase_order";
    const ALL: &'static [Self] = &[
        PoField::PoNumber,
        PoField::StyleNumber,
        PoField::Description,
        PoField::PoRelDate,
        PoField::UnitPrice,
        PoField::PoQty,
        PoField::HodDate,
        PoField::FfcCode,
        PoField::Seller,
        PoField::SourcingType,
        PoField::PoHeaderText,
        PoField::Country,
        PoField::Vas,
        PoField::PlantCode,
        PoField::Season,
        PoField::Brand,
    ];

    fn label(self) -> &'static str {
        match self {
            PoField::PoNumber => "PO Number",
            PoField::StyleNumber => "Style Number",
            PoField::Description => "Description",
            PoField::PoRelDate => "PO Rel Date",
            PoField::UnitPrice => "Unit Price",
            PoField::PoQty => "PO Qty",
            PoField::HodDate => "HOD Date",
            PoField::FfcCode => "FFC Code",
            PoField::Seller => "Seller",
            PoField::SourcingType => "Sourcing Type",
            PoField::PoHeaderText => "PO Header Text",
            PoField::Country => "Country",
            PoField::Vas => "VAS",
            PoField::PlantCode => "Plant Code",
            PoField::Season => "Season",
            PoField::Brand => "Brand",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn is_numeric(self) -> bool {
        matches!(self, PoField::PoQty | PoField::UnitPrice)
    }
}

/// Technical-report fields. Labels double as the literal text searched for in the PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportField {
    TechnicalReport,
    ReportedDate,
    TestType,
    ProductCode,
    FinishName,
    Season,
    FfcLookCode,
    EndUse,
    MillStyle,
    FabricType,
    FiberContent,
    GarmentFinishDetail,
}

impl FieldSchema for ReportField {
    const DOCUMENT: &'static str = "technical report";
    const FILE_PREFIX: &'static str = "technical_reports_combined";
    const ALL: &'static [Self] = &[
        ReportField::TechnicalReport,
        ReportField::ReportedDate,
        ReportField::TestType,
        ReportField::ProductCode,
        ReportField::FinishName,
        ReportField::Season,
        ReportField::FfcLookCode,
        ReportField::EndUse,
        ReportField::MillStyle,
        ReportField::FabricType,
        ReportField::FiberContent,
        ReportField::GarmentFinishDetail,
    ];

    fn label(self) -> &'static str {
        match self {
            ReportField::TechnicalReport => "TECHNICAL REPORT",
            ReportField::ReportedDate => "Reported Date",
            ReportField::TestType => "TEST TYPE",
            ReportField::ProductCode => "PRODUCT CODE",
            ReportField::FinishName => "FINISH NAME/LOOK NAME",
            ReportField::Season => "SEASON",
            ReportField::FfcLookCode => "FFC (5 DIGIT)/LOOK CODE",
            ReportField::EndUse => "END USE",
            ReportField::MillStyle => "MILL STYLE / SAMPLE STYLE",
            ReportField::FabricType => "FABRIC TYPE",
            ReportField::FiberContent => "FIBER CONTENT",
            ReportField::GarmentFinishDetail => "GARMENT FINISH DETAIL",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Field values for one document, keyed by the schema `F`.
///
/// Only schema members can be keys, so the "every key belongs to the schema"
/// invariant holds by construction. Blank values are never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtractedDocument<F: FieldSchema> {
    values: Vec<Option<String>>,
    _schema: PhantomData<F>,
}

impl<F: FieldSchema> Default for ExtractedDocument<F> {
    fn default() -> Self {
        Self {
            values: vec![None; F::ALL.len()],
            _schema: PhantomData,
        }
    }
}

impl<F: FieldSchema> ExtractedDocument<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a document from already-known values (e.g. rows read back from a workbook).
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (F, S)>,
        S: Into<String>,
    {
        let mut doc = Self::new();
        for (field, value) in pairs {
            doc.set(field, value);
        }
        doc
    }

    pub fn get(&self, field: F) -> Option<&str> {
        self.values[field.index()].as_deref()
    }

    pub fn is_set(&self, field: F) -> bool {
        self.values[field.index()].is_some()
    }

    /// Stores `value`, replacing any previous one. Blank values are ignored.
    pub(crate) fn set(&mut self, field: F, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            return;
        }
        self.values[field.index()] = Some(value);
    }

    /// Stores `value` only when the field is still unset. Returns whether it was stored.
    pub(crate) fn set_if_absent(&mut self, field: F, value: impl Into<String>) -> bool {
        if self.is_set(field) {
            return false;
        }
        self.set(field, value);
        self.is_set(field)
    }

    /// Removes and returns the value of `field`.
    pub(crate) fn take(&mut self, field: F) -> Option<String> {
        self.values[field.index()].take()
    }

    pub fn iter(&self) -> impl Iterator<Item = (F, Option<&str>)> + '_ {
        F::ALL
            .iter()
            .copied()
            .map(move |f| (f, self.values[f.index()].as_deref()))
    }

    /// Values in column order.
    pub fn row(&self) -> Vec<Option<&str>> {
        self.values.iter().map(|v| v.as_deref()).collect()
    }

    pub fn filled(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

impl<F: FieldSchema> fmt::Debug for ExtractedDocument<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(field, value)| (field.label(), value)))
            .finish()
    }
}

impl<F: FieldSchema> Serialize for ExtractedDocument<F> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(F::ALL.len()))?;
        for (field, value) in self.iter() {
            map.serialize_entry(field.label(), &value)?;
        }
        map.end()
    }
}

/// Quantity cell from a PO sheet: numeric when the source cell was, text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Quantity {
    Number(f64),
    Text(String),
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Quantity::Number(n) => write!(f, "{}", n),
            Quantity::Text(s) => f.write_str(s),
        }
    }
}

/// A label code and the quantity ordered for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelQuantityEntry {
    pub label: String,
    pub quantity: Quantity,
}

/// One successfully extracted document with the file it came from.
#[derive(Debug, Clone, Serialize)]
#[serde(bound = "")]
pub struct SourcedDocument<F: FieldSchema> {
    pub file_path: PathBuf,
    pub document: ExtractedDocument<F>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedDocument {
    pub file_path: PathBuf,
    pub file_name: String,
    pub error: String,
}

/// Batch outcome in input order: documents that extracted, and files that did not.
#[derive(Debug, Clone, Serialize)]
#[serde(bound = "")]
pub struct AggregatedResult<F: FieldSchema> {
    pub successes: Vec<SourcedDocument<F>>,
    pub failures: Vec<FailedDocument>,
}

impl<F: FieldSchema> AggregatedResult<F> {
    pub fn documents(&self) -> impl Iterator<Item = &ExtractedDocument<F>> {
        self.successes.iter().map(|s| &s.document)
    }
}
