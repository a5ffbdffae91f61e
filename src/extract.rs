//! Page-by-page text extraction for PDF documents.
//!
//! Extraction never panics into the caller: a parser panic on a malformed
//! file is caught and reported as [`ExtractError::Pdf`], and the loader
//! falls back to reading the file as raw text.

use std::panic::{catch_unwind, AssertUnwindSafe};

use thiserror::Error;

/// Extraction error. The loader treats every variant as "try raw text".
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}

/// Extracts the text of each page, in page order.
///
/// Pages are returned verbatim (untrimmed, possibly empty) so that page
/// numbers line up with the document.
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    match catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    })) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("parser panicked".to_string())),
    }
}

/// True when `path` has a `.pdf` extension (case-insensitive).
pub fn is_pdf(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
