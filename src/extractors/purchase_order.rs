//! Purchase-order extraction: anchored patterns over the full text, then
//! positional reads from the item row.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::segments::{ItemRow, PoSegments, LINE_ITEM};
use super::Extractor;
use crate::activation::Capability;
use crate::error::ExtractError;
use crate::pdf::DecodedPdf;
use crate::types::{ExtractedDocument, FieldSchema, PoField};

/// Fields read straight from the text, first match, capture group 1 trimmed.
static ANCHORED_PATTERNS: Lazy<Vec<(PoField, Regex)>> = Lazy::new(|| {
    [
        (PoField::PoNumber, r"Purchase Order#\s*(\d+)"),
        (
            PoField::PoHeaderText,
            r"PO Header Text\s*-\s*([^\n]*?)Purchase Order Item Details",
        ),
        (PoField::FfcCode, r"FFC Code\s*([A-Z0-9]+)"),
        (PoField::Country, r"Manufacturing Country of Origin[ \t]*:?[ \t]*([^\n]*)"),
        (PoField::SourcingType, r"Sourcing Type\s*-\s*([^\n]+)"),
        (PoField::Vas, r"Line Item VAS\s*Line Item Text\n([\s\S]+?)\nItem#"),
        (PoField::Season, r"Season\s*(\w+)"),
        (PoField::Brand, r"Brand\s*(\w+)"),
        (PoField::PoRelDate, r"PO Rel Date\s*(\d{2}\.\d{2}\.\d{4})"),
    ]
    .into_iter()
    .map(|(field, pattern)| {
        let re = Regex::new(&format!("(?i){pattern}")).expect("anchored PO pattern");
        (field, re)
    })
    .collect()
});

/// Trailing number of an address-like line; the text before it is kept.
static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.*?)\s*(\d+)").expect("address regex"));

/// Lowercase needle in the company segment and the seller it identifies.
const SELLERS: &[(&str, &str)] = &[
    ("arka", "Arka Global"),
    ("akhtar", "Akhtar Textile Industries Pvt Ltd"),
];

#[derive(Debug, Clone)]
pub struct PurchaseOrderExtractor {
    _capability: Capability,
}

impl PurchaseOrderExtractor {
    pub fn new(capability: &Capability) -> Self {
        Self {
            _capability: capability.clone(),
        }
    }

    /// Extracts the 16 PO fields from the document's full text.
    pub fn extract_text(&self, text: &str) -> Result<ExtractedDocument<PoField>, ExtractError> {
        let segments = PoSegments::cut(text)?;
        let row = ItemRow::parse(segments.item_row)?;

        let mut doc = ExtractedDocument::new();
        for (field, re) in ANCHORED_PATTERNS.iter() {
            if let Some(value) = re.captures(text).and_then(|c| c.get(1)) {
                doc.set(*field, value.as_str().trim());
            }
        }
        if let Some(vas) = doc.take(PoField::Vas) {
            let rest: Vec<&str> = vas.split_whitespace().skip(1).collect();
            doc.set(PoField::Vas, rest.join(" "));
        }

        doc.set(PoField::HodDate, row.hod_date());
        doc.set(PoField::PlantCode, row.plant_code());
        doc.set(PoField::StyleNumber, row.style_number());
        doc.set(PoField::PoQty, row.quantity());
        doc.set(PoField::UnitPrice, row.unit_price());
        doc.set(PoField::Description, description(&row, segments.header_block));

        // The regex value only stands in when the ship-to block yields nothing.
        if let Some(country) = country_from_header(segments.header_block) {
            doc.set(PoField::Country, country);
        }

        if let Some(seller) = company_segment(text).and_then(seller_for) {
            doc.set(PoField::Seller, seller);
        }

        debug!(
            po_number = doc.get(PoField::PoNumber).unwrap_or("-"),
            filled = doc.filled(),
            of = PoField::ALL.len(),
            "Purchase order extracted"
        );
        Ok(doc)
    }
}

impl Extractor for PurchaseOrderExtractor {
    type Field = PoField;

    fn extract(&self, pdf: &DecodedPdf) -> Result<ExtractedDocument<PoField>, ExtractError> {
        self.extract_text(&pdf.full_text())
    }
}

/// Item-row description plus its continuation from the header block.
fn description(row: &ItemRow<'_>, header_block: &str) -> String {
    let row_text = row.text.split(LINE_ITEM).next().unwrap_or_default();
    let first = row_text
        .split(row.style_number())
        .nth(1)
        .map(|seg| seg.split(row.hod_date()).next().unwrap_or_default().trim())
        .unwrap_or_default();

    let second = header_block
        .split(row.last_token())
        .nth(1)
        .map(|seg| seg.trim().lines().next().unwrap_or_default().trim())
        .map(address_text)
        .unwrap_or_default();

    format!("{first} {second}").trim().to_string()
}

/// Text before the first number of an address line; the whole line when it has no number.
fn address_text(line: &str) -> &str {
    ADDRESS_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(line.trim())
}

fn country_from_header(header_block: &str) -> Option<&str> {
    let last = header_block.split_whitespace().last()?;
    let country = last.split(',').last().unwrap_or_default().trim();
    (!country.is_empty()).then_some(country)
}

/// Text from the first "Company" up to the next "Sourcing" or "-".
fn company_segment(text: &str) -> Option<&str> {
    let start = text.find("Company")?;
    let rest = &text[start..];
    let end = [rest.find("Sourcing"), rest.find('-')]
        .into_iter()
        .flatten()
        .min()?;
    Some(&rest[..end])
}

fn seller_for(segment: &str) -> Option<&'static str> {
    let lower = segment.to_lowercase();
    SELLERS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, seller)| *seller)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Purchase Order# 4500123456\n\
        PO Rel Date 01.02.2024\n\
        Company Arka Global Pvt Ltd, Lahore\n\
        Sourcing Type - Direct\n\
        PO Header Text - Spring delivery Purchase Order Item Details\n\
        Season SS24\n\
        Brand Levis\n\
        FFC Code AB123\n\
        Item Total Value\n\
        6250.00 Stretch Twill 98 Cotton\n\
        Ship To Warehouse Karachi,Pakistan\n\
        Line Item Material Description HOD Date\n\
        10 STYLE99 Denim Jacket Blue 12.03.2024 EA P100 500 EA 12.50 6250.00\n\
        Line Item VAS Line Item Text\n\
        VAS01 Hang tag required\n\
        Item# 10\n";

    fn extract(text: &str) -> Result<ExtractedDocument<PoField>, ExtractError> {
        PurchaseOrderExtractor::new(&Capability::offline()).extract_text(text)
    }

    #[test]
    fn extracts_a_well_formed_order() {
        let doc = extract(SAMPLE).unwrap();
        assert_eq!(doc.get(PoField::PoNumber), Some("4500123456"));
        assert_eq!(doc.get(PoField::PoRelDate), Some("01.02.2024"));
        assert_eq!(doc.get(PoField::SourcingType), Some("Direct"));
        assert_eq!(doc.get(PoField::PoHeaderText), Some("Spring delivery"));
        assert_eq!(doc.get(PoField::Season), Some("SS24"));
        assert_eq!(doc.get(PoField::Brand), Some("Levis"));
        assert_eq!(doc.get(PoField::FfcCode), Some("AB123"));
        assert_eq!(doc.get(PoField::StyleNumber), Some("STYLE99"));
        assert_eq!(doc.get(PoField::HodDate), Some("12.03.2024"));
        assert_eq!(doc.get(PoField::PlantCode), Some("P100"));
        assert_eq!(doc.get(PoField::PoQty), Some("500"));
        assert_eq!(doc.get(PoField::UnitPrice), Some("12.50"));
        assert_eq!(doc.get(PoField::Country), Some("Pakistan"));
        assert_eq!(doc.get(PoField::Seller), Some("Arka Global"));
        assert_eq!(doc.get(PoField::Vas), Some("Hang tag required"));
        assert_eq!(
            doc.get(PoField::Description),
            Some("Denim Jacket Blue Stretch Twill")
        );
    }

    #[test]
    fn minimal_row_reads_fixed_offsets() {
        let text = "Item Total Value\nHeader Karachi,Pakistan Line Item No Date\n\
                    12.03.2024 STYLE99 P7 5 EA 10.50 52.50\n";
        let doc = extract(text).unwrap();
        assert_eq!(doc.get(PoField::HodDate), Some("12.03.2024"));
        assert_eq!(doc.get(PoField::StyleNumber), Some("STYLE99"));
        assert_eq!(doc.get(PoField::PlantCode), Some("P7"));
        assert_eq!(doc.get(PoField::PoQty), Some("5"));
        assert_eq!(doc.get(PoField::UnitPrice), Some("10.50"));
        assert!(!doc.is_set(PoField::Vas));
        assert!(!doc.is_set(PoField::Seller));
    }

    #[test]
    fn vas_with_only_the_label_echo_stays_unset() {
        let text = "Item Total Value\nHeader Karachi,Pakistan Line Item No Date\n\
                    12.03.2024 STYLE99 P7 5 EA 10.50 52.50\n\
                    Line Item VAS Line Item Text\nVAS01\nItem# 10\n";
        let doc = extract(text).unwrap();
        assert!(!doc.is_set(PoField::Vas));
        assert_eq!(doc.get(PoField::StyleNumber), Some("STYLE99"));
    }

    #[test]
    fn missing_line_item_aborts_the_document() {
        let text = "Item Total Value\nShip To Somewhere\nDate\n10 S 01.01.2024 EA P1 1 EA 1 1\n";
        assert_eq!(
            extract(text),
            Err(ExtractError::StructuralAnchorMissing("Line Item"))
        );
    }

    #[test]
    fn row_without_date_is_malformed() {
        let text = "Item Total Value\nblock Line Item Date\n10 STYLE1 Denim EA P1 5 EA 2 10\n";
        assert!(matches!(extract(text), Err(ExtractError::MalformedItemRow(_))));
    }

    #[test]
    fn country_regex_fills_in_when_header_block_is_blank() {
        let text = "Manufacturing Country of Origin: Bangladesh\n\
                    Item Total Value Line Item Date\n\
                    10 S1 01.01.2024 EA P1 1 EA 1 1\n";
        let doc = extract(text).unwrap();
        assert_eq!(doc.get(PoField::Country), Some("Bangladesh"));
    }

    #[test]
    fn seller_identities() {
        assert_eq!(seller_for("Company AKHTAR Textiles "), Some("Akhtar Textile Industries Pvt Ltd"));
        assert_eq!(seller_for("Company Someone Else "), None);
        assert_eq!(
            company_segment("x Company Arka - Sourcing"),
            Some("Company Arka ")
        );
        assert_eq!(company_segment("Company without terminator"), None);
    }

    #[test]
    fn address_parsing_keeps_the_text_part() {
        assert_eq!(address_text("Stretch Twill 98 Cotton"), "Stretch Twill");
        assert_eq!(address_text(" no digits "), "no digits");
    }

    #[test]
    fn description_parts_are_lenient() {
        let row = ItemRow::parse("10 STYLE1 Denim 01.01.2024 EA P1 5 EA 2 10").unwrap();
        assert_eq!(description(&row, "\nnothing to find\n"), "Denim");
    }

    #[test]
    fn description_keeps_a_continuation_without_numbers() {
        let row =
            ItemRow::parse("10 STYLE99 Denim 12.03.2024 EA P100 500 EA 12.50 6250.00").unwrap();
        let header_block = "\n6250.00 Stretch Twill Cotton\nShip To Warehouse Karachi,Pakistan\n";
        assert_eq!(description(&row, header_block), "Denim Stretch Twill Cotton");
    }
}
