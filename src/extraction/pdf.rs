use super::{ExtractionError, FileKind, PdfTextSource};
use lopdf::Document;

/// Reads the text layer of a PDF with `lopdf`, one page at a time.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfTextSource;

impl LopdfTextSource {
    /// Create a new PDF text source.
    pub const fn new() -> Self {
        Self
    }
}

impl PdfTextSource for LopdfTextSource {
    fn page_texts(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        let document =
            Document::load_mem(bytes).map_err(|error| ExtractionError::MalformedDocument {
                kind: FileKind::Pdf,
                reason: error.to_string(),
            })?;

        // get_pages is keyed by 1-based page number, so iteration follows document order.
        let pages = document.get_pages();
        let mut texts = Vec::with_capacity(pages.len());
        for page_number in pages.keys() {
            match document.extract_text(&[*page_number]) {
                Ok(text) => texts.push(text),
                Err(error) => {
                    tracing::warn!(page = page_number, error = %error, "Skipping unreadable PDF page");
                    texts.push(String::new());
                }
            }
        }
        Ok(texts)
    }
}
