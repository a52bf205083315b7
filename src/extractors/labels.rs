//! Label vocabulary for technical-report tables.

use crate::types::{FieldSchema, ReportField};

/// How a table cell is recognised as the label of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMatcher {
    /// The cell contains this literal.
    Contains(&'static str),
}

impl LabelMatcher {
    pub fn matches(self, cell: &str) -> bool {
        match self {
            LabelMatcher::Contains(needle) => cell.contains(needle),
        }
    }

    /// Literal removed from values the label leaked into.
    pub fn needle(self) -> &'static str {
        match self {
            LabelMatcher::Contains(needle) => needle,
        }
    }
}

/// Matching order for the table scans: schema order, one rule per field.
pub const LABEL_RULES: &[(ReportField, LabelMatcher)] = &[
    (ReportField::TechnicalReport, LabelMatcher::Contains("TECHNICAL REPORT")),
    (ReportField::ReportedDate, LabelMatcher::Contains("Reported Date")),
    (ReportField::TestType, LabelMatcher::Contains("TEST TYPE")),
    (ReportField::ProductCode, LabelMatcher::Contains("PRODUCT CODE")),
    (ReportField::FinishName, LabelMatcher::Contains("FINISH NAME/LOOK NAME")),
    (ReportField::Season, LabelMatcher::Contains("SEASON")),
    (ReportField::FfcLookCode, LabelMatcher::Contains("FFC (5 DIGIT)/LOOK CODE")),
    (ReportField::EndUse, LabelMatcher::Contains("END USE")),
    (ReportField::MillStyle, LabelMatcher::Contains("MILL STYLE / SAMPLE STYLE")),
    (ReportField::FabricType, LabelMatcher::Contains("FABRIC TYPE")),
    (ReportField::FiberContent, LabelMatcher::Contains("FIBER CONTENT")),
    (ReportField::GarmentFinishDetail, LabelMatcher::Contains("GARMENT FINISH DETAIL")),
];

/// True when `text` carries any field label.
pub fn contains_any_label(text: &str) -> bool {
    LABEL_RULES.iter().any(|(_, m)| m.matches(text))
}

/// Removes labels of fields other than `field` from `value`, trimming after each removal.
pub fn strip_foreign_labels(field: ReportField, value: &str) -> String {
    let mut value = value.to_string();
    for &(other, matcher) in LABEL_RULES {
        if other != field && matcher.matches(&value) {
            value = value.replace(matcher.needle(), "").trim().to_string();
        }
    }
    value
}
