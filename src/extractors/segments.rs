//! Anchor cut points for purchase-order text.
//!
//! Each cut consumes the output of the previous one, so every stage can be
//! checked on its own and a missing anchor stops the chain with the name of
//! the anchor that was not there.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ExtractError;

pub const ITEM_TOTAL_VALUE: &str = "Item Total Value";
pub const LINE_ITEM: &str = "Line Item";
pub const DATE: &str = "Date";

static HOD_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}\.\d{2}\.\d{4}$").expect("HOD date regex"));

/// Named sub-segments of a purchase-order text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoSegments<'a> {
    /// Text between the first and second "Item Total Value".
    pub after_total: &'a str,
    /// `after_total` up to the first "Line Item": ship-to / company block.
    pub header_block: &'a str,
    /// The line right after the first "Date" in `after_total`, trimmed.
    pub item_row: &'a str,
}

impl<'a> PoSegments<'a> {
    pub fn cut(text: &'a str) -> Result<Self, ExtractError> {
        let after_total = cut_after_total(text)?;
        let header_block = cut_header_block(after_total)?;
        let item_row = cut_item_row(after_total)?;
        Ok(Self {
            after_total,
            header_block,
            item_row,
        })
    }
}

pub fn cut_after_total(text: &str) -> Result<&str, ExtractError> {
    text.split(ITEM_TOTAL_VALUE)
        .nth(1)
        .ok_or(ExtractError::StructuralAnchorMissing(ITEM_TOTAL_VALUE))
}

pub fn cut_header_block(after_total: &str) -> Result<&str, ExtractError> {
    if !after_total.contains(LINE_ITEM) {
        return Err(ExtractError::StructuralAnchorMissing(LINE_ITEM));
    }
    Ok(after_total.split(LINE_ITEM).next().unwrap_or_default())
}

pub fn cut_item_row(after_total: &str) -> Result<&str, ExtractError> {
    after_total
        .split(DATE)
        .nth(1)
        .and_then(|segment| segment.split('\n').nth(1))
        .map(str::trim)
        .ok_or(ExtractError::StructuralAnchorMissing(DATE))
}

pub fn is_hod_date(token: &str) -> bool {
    HOD_DATE_RE.is_match(token)
}

/// Whitespace tokens of the item row with the positions the PO fields are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow<'a> {
    pub text: &'a str,
    pub tokens: Vec<&'a str>,
    hod_index: usize,
}

impl<'a> ItemRow<'a> {
    pub fn parse(text: &'a str) -> Result<Self, ExtractError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() < 4 {
            return Err(ExtractError::MalformedItemRow(format!(
                "expected at least 4 tokens, found {}",
                tokens.len()
            )));
        }
        let hod_index = tokens
            .iter()
            .position(|t| is_hod_date(t))
            .ok_or_else(|| ExtractError::MalformedItemRow("no DD.MM.YYYY date token".to_string()))?;
        if hod_index + 2 >= tokens.len() {
            return Err(ExtractError::MalformedItemRow(
                "no plant code after the HOD date".to_string(),
            ));
        }
        Ok(Self {
            text,
            tokens,
            hod_index,
        })
    }

    pub fn hod_date(&self) -> &'a str {
        self.tokens[self.hod_index]
    }

    pub fn plant_code(&self) -> &'a str {
        self.tokens[self.hod_index + 2]
    }

    pub fn style_number(&self) -> &'a str {
        self.tokens[1]
    }

    pub fn quantity(&self) -> &'a str {
        self.tokens[self.tokens.len() - 4]
    }

    pub fn unit_price(&self) -> &'a str {
        self.tokens[self.tokens.len() - 2]
    }

    pub fn last_token(&self) -> &'a str {
        self.tokens[self.tokens.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn after_total_stops_at_a_repeated_anchor() {
        let text = "head Item Total Value middle Item Total Value tail";
        assert_eq!(cut_after_total(text).unwrap(), " middle ");
    }

    #[test]
    fn each_cut_names_its_missing_anchor() {
        assert_eq!(
            cut_after_total("no anchors here"),
            Err(ExtractError::StructuralAnchorMissing(ITEM_TOTAL_VALUE))
        );
        assert_eq!(
            cut_header_block("\nship to block only\n"),
            Err(ExtractError::StructuralAnchorMissing(LINE_ITEM))
        );
        assert_eq!(
            cut_item_row("Line Item without the other anchor"),
            Err(ExtractError::StructuralAnchorMissing(DATE))
        );
    }

    #[test]
    fn item_row_is_the_line_after_date() {
        let after = "\nblock Line Item HOD Date\n  10 STYLE1 x 01.01.2024 EA P1 5 EA 2.00 10.00  \nmore";
        assert_eq!(
            cut_item_row(after).unwrap(),
            "10 STYLE1 x 01.01.2024 EA P1 5 EA 2.00 10.00"
        );
    }

    #[test]
    fn date_at_the_very_end_has_no_row() {
        assert!(cut_item_row("Line Item Date").is_err());
    }

    #[test]
    fn row_offsets() {
        let row = ItemRow::parse("10 STYLE99 Denim 12.03.2024 EA P100 500 EA 12.50 6250.00").unwrap();
        assert_eq!(row.hod_date(), "12.03.2024");
        assert_eq!(row.plant_code(), "P100");
        assert_eq!(row.style_number(), "STYLE99");
        assert_eq!(row.quantity(), "500");
        assert_eq!(row.unit_price(), "12.50");
        assert_eq!(row.last_token(), "6250.00");
    }

    #[test]
    fn row_needs_a_date_and_a_plant_code() {
        assert!(matches!(
            ItemRow::parse("a b c d"),
            Err(ExtractError::MalformedItemRow(_))
        ));
        assert!(matches!(
            ItemRow::parse("a b c 01.02.2024 x"),
            Err(ExtractError::MalformedItemRow(_))
        ));
        assert!(matches!(ItemRow::parse("a b"), Err(ExtractError::MalformedItemRow(_))));
    }

    #[test]
    fn hod_date_shape() {
        assert!(is_hod_date("05.09.2024"));
        assert!(!is_hod_date("5.9.2024"));
        assert!(!is_hod_date("05/09/2024"));
    }
}
