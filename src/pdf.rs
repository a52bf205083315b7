//! PDF decode collaborator: bytes in, per-page text and table grids out.
//!
//! The extractors never see PDF bytes; they work on [`DecodedPdf`].

use lopdf::Document;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::DecodeError;

/// Row-major cell grid. `None` marks an absent cell.
pub type Table = Vec<Vec<Option<String>>>;

/// Below this many non-whitespace characters the document is treated as image-only.
const MIN_TEXT_CHARS: usize = 30;

static CELL_GAP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\t+|\s{2,}").expect("cell gap regex"));

#[derive(Debug, Clone, Default)]
pub struct PdfPage {
    pub text: String,
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, Default)]
pub struct DecodedPdf {
    pub pages: Vec<PdfPage>,
}

impl DecodedPdf {
    /// Builds pages from plain text, rebuilding tables from the text layout.
    pub fn from_page_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = texts
            .into_iter()
            .map(|t| {
                let text = t.into();
                let tables = tables_from_text(&text);
                PdfPage { text, tables }
            })
            .collect();
        Self { pages }
    }

    /// All page texts joined with newlines.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Text lines across all pages, each page terminated by a line break.
    pub fn lines(&self) -> Vec<String> {
        let mut text = String::new();
        for page in &self.pages {
            text.push_str(&page.text);
            text.push('\n');
        }
        text.split('\n').map(str::to_string).collect()
    }

    pub fn tables(&self) -> Vec<Table> {
        self.pages.iter().flat_map(|p| p.tables.iter().cloned()).collect()
    }
}

/// Anything that turns PDF bytes into text and tables.
pub trait PdfDecoder: Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedPdf, DecodeError>;
}

/// Default decoder: `lopdf` page by page, `pdf-extract` when lopdf yields no usable text.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfDecoder;

impl PdfDecoder for LopdfDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedPdf, DecodeError> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| DecodeError::Parse(e.to_string()))?;

        let mut texts = Vec::new();
        for page_num in doc.get_pages().keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(text) => texts.push(text),
                Err(e) => {
                    warn!(page = page_num, error = %e, "lopdf could not extract page text");
                    texts.push(String::new());
                }
            }
        }

        if meaningful_chars(&texts) < MIN_TEXT_CHARS {
            debug!("lopdf text too short, retrying with pdf-extract");
            match pdf_extract::extract_text_from_mem(bytes) {
                Ok(text) => texts = vec![text],
                Err(e) => warn!(error = %e, "pdf-extract failed"),
            }
        }

        let chars = meaningful_chars(&texts);
        if chars < MIN_TEXT_CHARS {
            info!(chars, "Extracted text too short, treating as scanned");
            return Err(DecodeError::ImageOnly);
        }

        debug!(pages = texts.len(), chars, "Text extracted");
        Ok(DecodedPdf::from_page_texts(texts))
    }
}

fn meaningful_chars(texts: &[String]) -> usize {
    texts
        .iter()
        .map(|t| t.chars().filter(|c| !c.is_whitespace()).count())
        .sum()
}

/// Rebuilds table grids from laid-out text.
///
/// A line that splits into two or more cells on tabs or runs of 2+ spaces is a
/// table row; consecutive rows form one table. Any other line ends the table.
pub fn tables_from_text(text: &str) -> Vec<Table> {
    let mut tables = Vec::new();
    let mut current: Table = Vec::new();

    for line in text.lines() {
        let cells: Vec<&str> = CELL_GAP_RE
            .split(line.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if cells.len() >= 2 {
            current.push(cells.into_iter().map(|c| Some(c.to_string())).collect());
        } else if !current.is_empty() {
            if current.len() >= 2 {
                tables.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.len() >= 2 {
        tables.push(current);
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_fail_to_parse() {
        let result = LopdfDecoder.decode(b"this is not a pdf");
        assert!(matches!(result, Err(DecodeError::Parse(_))));
    }

    #[test]
    fn rebuilds_tables_from_column_gaps() {
        let text = "Title line\nSEASON    END USE\nSS24      Outerwear\n\nFooter";
        let tables = tables_from_text(text);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0][0], vec![Some("SEASON".into()), Some("END USE".into())]);
        assert_eq!(tables[0][1], vec![Some("SS24".into()), Some("Outerwear".into())]);
    }

    #[test]
    fn single_row_blocks_are_not_tables() {
        assert!(tables_from_text("A  B\nplain\nC  D").is_empty());
    }

    #[test]
    fn lines_and_full_text_span_pages() {
        let pdf = DecodedPdf::from_page_texts(["page one", "page two"]);
        assert_eq!(pdf.full_text(), "page one\npage two");
        assert_eq!(pdf.lines()[..2], ["page one".to_string(), "page two".to_string()]);
    }
}
