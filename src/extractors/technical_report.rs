//! Technical-report extraction: labels in table cells with the value one row below.

use tracing::debug;

use super::labels::{contains_any_label, strip_foreign_labels, LABEL_RULES};
use super::Extractor;
use crate::activation::Capability;
use crate::error::ExtractError;
use crate::pdf::{DecodedPdf, Table};
use crate::types::{ExtractedDocument, FieldSchema, ReportField};

/// Lines searched for the report number.
const REPORT_NUMBER_WINDOW: usize = 10;
const TEST_TYPE_CUT: &str = "Deni";

#[derive(Debug, Clone)]
pub struct TechnicalReportExtractor {
    _capability: Capability,
}

impl TechnicalReportExtractor {
    pub fn new(capability: &Capability) -> Self {
        Self {
            _capability: capability.clone(),
        }
    }

    /// Extracts from text lines and table grids. Missing fields stay unset.
    pub fn extract_parts(&self, lines: &[String], tables: &[Table]) -> ExtractedDocument<ReportField> {
        let mut doc = ExtractedDocument::new();
        if let Some(number) = report_number(lines) {
            doc.set(ReportField::TechnicalReport, number);
        }

        let mut primary = primary_pass(tables);
        if let Some(date) = reported_date(lines) {
            primary.set(ReportField::ReportedDate, date);
        }
        if let Some(test_type) = primary.take(ReportField::TestType) {
            let cleaned = match test_type.split_once(TEST_TYPE_CUT) {
                Some((head, _)) => head.trim().to_string(),
                None => test_type,
            };
            primary.set(ReportField::TestType, cleaned);
        }
        for (field, value) in primary.iter() {
            if let Some(value) = value {
                doc.set(field, value);
            }
        }

        backup_pass(tables, &mut doc);

        if !doc.is_set(ReportField::ProductCode) {
            if let Some(code) = product_code_from_lines(lines) {
                doc.set(ReportField::ProductCode, code);
            }
        }

        debug!(
            filled = doc.filled(),
            of = ReportField::ALL.len(),
            "Technical report extracted"
        );
        doc
    }
}

impl Extractor for TechnicalReportExtractor {
    type Field = ReportField;

    fn extract(&self, pdf: &DecodedPdf) -> Result<ExtractedDocument<ReportField>, ExtractError> {
        Ok(self.extract_parts(&pdf.lines(), &pdf.tables()))
    }
}

fn report_number(lines: &[String]) -> Option<String> {
    let label = ReportField::TechnicalReport.label();
    let (idx, line) = lines
        .iter()
        .take(REPORT_NUMBER_WINDOW)
        .enumerate()
        .find(|(_, line)| line.contains(label))?;

    let after = line.split(label).nth(1).unwrap_or_default();
    let number = after.trim().trim_matches('#').trim();
    if !number.is_empty() {
        return Some(number.to_string());
    }

    let next = lines.get(idx + 1)?.trim();
    if next.starts_with('#') {
        let number = next.trim_matches('#').trim();
        if !number.is_empty() {
            return Some(number.to_string());
        }
    }
    None
}

fn reported_date(lines: &[String]) -> Option<String> {
    let label = ReportField::ReportedDate.label();
    let idx = lines.iter().position(|line| line.contains(label))?;
    let line = &lines[idx];

    if let Some((_, after)) = line.rsplit_once(':') {
        let value = after.trim();
        return (!value.is_empty()).then(|| value.to_string());
    }

    let next = lines.get(idx + 1)?.trim();
    (!next.is_empty() && !contains_any_label(next)).then(|| next.to_string())
}

/// Cell text as the scans see it: absent cells read as empty.
fn cell(row: &[Option<String>], col: usize) -> &str {
    row.get(col).and_then(|c| c.as_deref()).unwrap_or_default()
}

/// Raw value one row below `(row_idx, col)`, trimmed. `None` when nothing usable is there.
fn value_below(table: &Table, row_idx: usize, col: usize) -> Option<String> {
    let raw = cell(table.get(row_idx + 1)?, col);
    let value = raw.trim();
    (!value.is_empty() && value != "None").then(|| value.to_string())
}

fn finish_detail_below(table: &Table, row_idx: usize, col: usize, first: String) -> String {
    let mut details = vec![first];
    for row in table.iter().skip(row_idx + 2) {
        let value = cell(row, col).trim();
        if value.is_empty() || contains_any_label(value) {
            break;
        }
        details.push(value.to_string());
    }
    details.join("\n")
}

fn primary_pass(tables: &[Table]) -> ExtractedDocument<ReportField> {
    let mut found = ExtractedDocument::new();
    for table in tables {
        for (row_idx, row) in table.iter().enumerate() {
            if row.is_empty() {
                continue;
            }
            let cleaned: Vec<&str> = row
                .iter()
                .map(|c| c.as_deref().unwrap_or_default().trim())
                .collect();
            for &(field, matcher) in LABEL_RULES {
                for (col, text) in cleaned.iter().enumerate() {
                    if !matcher.matches(text) {
                        continue;
                    }
                    let Some(value) = value_below(table, row_idx, col) else {
                        continue;
                    };
                    let value = if field == ReportField::GarmentFinishDetail {
                        finish_detail_below(table, row_idx, col, value)
                    } else {
                        let first_line = value.lines().next().unwrap_or_default();
                        strip_foreign_labels(field, first_line)
                    };
                    found.set(field, value);
                }
            }
        }
    }
    found
}

fn backup_pass(tables: &[Table], doc: &mut ExtractedDocument<ReportField>) {
    for table in tables {
        for (row_idx, row) in table.iter().enumerate() {
            for (col, text) in row.iter().enumerate() {
                let text = text.as_deref().unwrap_or_default().trim();
                for &(field, matcher) in LABEL_RULES {
                    if doc.is_set(field) || !matcher.matches(text) {
                        continue;
                    }
                    if let Some(value) = value_below(table, row_idx, col) {
                        doc.set_if_absent(field, value);
                    }
                }
            }
        }
    }
}

fn product_code_from_lines(lines: &[String]) -> Option<String> {
    let label = ReportField::ProductCode.label();
    lines
        .iter()
        .filter(|line| line.to_uppercase().contains(label))
        .find_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            (tokens.len() > 2).then(|| tokens[tokens.len() - 1].to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> TechnicalReportExtractor {
        TechnicalReportExtractor::new(&Capability::offline())
    }

    fn lines(text: &str) -> Vec<String> {
        text.split('\n').map(str::to_string).collect()
    }

    fn table(rows: &[&[&str]]) -> Table {
        rows.iter()
            .map(|r| {
                r.iter()
                    .map(|c| if c.is_empty() { None } else { Some(c.to_string()) })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn reads_values_one_row_below_labels() {
        let tables = vec![table(&[
            &["TEST TYPE", "SEASON", "END USE"],
            &["Bulk Denim", "SS24", "Outerwear"],
        ])];
        let doc = extractor().extract_parts(&lines("TECHNICAL REPORT # TR-001\nbody"), &tables);

        assert_eq!(doc.get(ReportField::TechnicalReport), Some("TR-001"));
        assert_eq!(doc.get(ReportField::TestType), Some("Bulk"));
        assert_eq!(doc.get(ReportField::Season), Some("SS24"));
        assert_eq!(doc.get(ReportField::EndUse), Some("Outerwear"));
        assert!(!doc.is_set(ReportField::FiberContent));
    }

    #[test]
    fn empty_input_yields_an_empty_document() {
        let doc = extractor().extract_parts(&[], &[]);
        assert_eq!(doc.filled(), 0);
    }

    #[test]
    fn report_number_falls_back_to_a_hash_line() {
        let text = lines("header\nTECHNICAL REPORT\n# 2024-117\nmore");
        assert_eq!(report_number(&text), Some("2024-117".to_string()));
        assert_eq!(report_number(&lines("TECHNICAL REPORT\nnot a number")), None);
    }

    #[test]
    fn report_number_only_looks_at_the_first_lines() {
        let mut text = vec![String::new(); 10];
        text.push("TECHNICAL REPORT 55".to_string());
        assert_eq!(report_number(&text), None);
    }

    #[test]
    fn reported_date_after_colon_or_on_next_line() {
        assert_eq!(
            reported_date(&lines("Reported Date: 12/03/2024")),
            Some("12/03/2024".to_string())
        );
        assert_eq!(
            reported_date(&lines("Reported Date\n  12/03/2024 \n")),
            Some("12/03/2024".to_string())
        );
        assert_eq!(reported_date(&lines("Reported Date\nSEASON SS24")), None);
    }

    #[test]
    fn finish_detail_aggregates_until_blank_or_label() {
        let tables = vec![table(&[
            &["GARMENT FINISH DETAIL", "x"],
            &["Enzyme wash", "y"],
            &["Soft hand", ""],
            &["Tint", ""],
            &["", ""],
            &["Ignored", ""],
        ])];
        let doc = extractor().extract_parts(&[], &tables);
        assert_eq!(
            doc.get(ReportField::GarmentFinishDetail),
            Some("Enzyme wash\nSoft hand\nTint")
        );

        let tables = vec![table(&[
            &["GARMENT FINISH DETAIL"],
            &["Rinse"],
            &["FIBER CONTENT"],
            &["98% Cotton"],
        ])];
        let doc = extractor().extract_parts(&[], &tables);
        assert_eq!(doc.get(ReportField::GarmentFinishDetail), Some("Rinse"));
        assert_eq!(doc.get(ReportField::FiberContent), Some("98% Cotton"));
    }

    #[test]
    fn later_matches_replace_earlier_ones() {
        let tables = vec![
            table(&[&["SEASON"], &["SS23"]]),
            table(&[&["SEASON"], &["SS24"]]),
        ];
        let doc = extractor().extract_parts(&[], &tables);
        assert_eq!(doc.get(ReportField::Season), Some("SS24"));
    }

    #[test]
    fn primary_values_override_the_report_number_scan() {
        let tables = vec![table(&[&["TECHNICAL REPORT"], &["TR-9"]])];
        let doc = extractor().extract_parts(&lines("TECHNICAL REPORT 1"), &tables);
        assert_eq!(doc.get(ReportField::TechnicalReport), Some("TR-9"));
    }

    #[test]
    fn backup_pass_keeps_raw_multiline_value() {
        // "END USE" leaks into the first line, leaving nothing after stripping.
        let tables = vec![table(&[&["FABRIC TYPE"], &["END USE\nTwill"]])];
        let doc = extractor().extract_parts(&[], &tables);
        assert_eq!(doc.get(ReportField::FabricType), Some("END USE\nTwill"));
    }

    #[test]
    fn product_code_from_text_when_tables_lack_it() {
        let text = lines("Product Code\nproduct code : PC-77\nPRODUCT CODE X Y");
        let doc = extractor().extract_parts(&text, &[]);
        assert_eq!(doc.get(ReportField::ProductCode), Some("PC-77"));
    }

    #[test]
    fn decoded_pdf_goes_through_tables_and_lines() {
        let pdf = DecodedPdf::from_page_texts([
            "TECHNICAL REPORT #A-17\nFIBER CONTENT    MILL STYLE / SAMPLE STYLE\n100% Cotton    MS-4\n",
        ]);
        let doc = extractor().extract(&pdf).unwrap();
        assert_eq!(doc.get(ReportField::TechnicalReport), Some("A-17"));
        assert_eq!(doc.get(ReportField::FiberContent), Some("100% Cotton"));
        assert_eq!(doc.get(ReportField::MillStyle), Some("MS-4"));
    }
}
