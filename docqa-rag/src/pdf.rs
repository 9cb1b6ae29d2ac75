//! Text extraction from PDF uploads.
//!
//! This module is only available when the `pdf` feature is enabled.

use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{DocQaError, Result};
use crate::source::{SourceFile, TextExtractor};

/// Extracts the text layer of `.pdf` files, one page after another.
///
/// Page texts are joined with `\n`. Pages whose text cannot be decoded are
/// skipped with a warning; a file with no text at all (a scan, say) is an
/// ingestion failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    /// Create a PDF extractor.
    pub fn new() -> Self {
        Self
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, file: &SourceFile) -> Result<Document> {
        let fail = |message: String| DocQaError::Ingestion { document: file.name.clone(), message };

        if file.extension().as_deref() != Some("pdf") {
            return Err(fail(format!("unsupported file type for {}", file.name)));
        }

        let pdf = lopdf::Document::load_mem(&file.bytes)
            .map_err(|e| fail(format!("failed to parse PDF: {e}")))?;

        let pages = pdf.get_pages();
        let mut texts = Vec::with_capacity(pages.len());
        for page in pages.keys() {
            match pdf.extract_text(&[*page]) {
                Ok(text) if !text.trim().is_empty() => texts.push(text.trim_end().to_string()),
                Ok(_) => {}
                Err(e) => warn!(document = %file.name, page, error = %e, "skipping unreadable page"),
            }
        }

        let text = texts.join("\n");
        if text.trim().is_empty() {
            return Err(fail(format!("no text could be extracted from {}", file.name)));
        }

        debug!(
            document = %file.name,
            pages = pages.len(),
            chars = text.chars().count(),
            "extracted PDF text"
        );
        Ok(Document::new(file.name.clone(), text))
    }
}
