//! Text extraction from uploaded documents.
//!
//! The upload kind is decided from the declared file name and content type only; the payload
//! bytes are never sniffed. PDFs go through a [`PdfTextSource`], images are decoded and handed to
//! an [`OcrEngine`]. Both CPU-heavy steps run on the blocking pool.

mod ocr;
mod pdf;

pub use ocr::TesseractOcr;
pub use pdf::LopdfTextSource;

use async_trait::async_trait;
use image::DynamicImage;
use std::sync::Arc;
use thiserror::Error;

/// Errors produced while turning an upload into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Neither a PDF file name nor an image content type.
    #[error("Unsupported file type")]
    UnsupportedFileType,
    /// The payload could not be parsed as the declared kind.
    #[error("Malformed {kind} document: {reason}")]
    MalformedDocument {
        /// Declared kind that failed to parse.
        kind: FileKind,
        /// Parser diagnostic.
        reason: String,
    },
    /// The OCR engine could not be run or reported a failure.
    #[error("OCR engine failed: {0}")]
    Ocr(String),
    /// A blocking extraction task panicked or was cancelled.
    #[error("Extraction task failed: {0}")]
    Task(String),
}

impl ExtractionError {
    /// Whether the upload itself is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFileType | Self::MalformedDocument { .. }
        )
    }
}

/// Raw upload handed to the extractor.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original file name supplied by the client.
    pub file_name: String,
    /// Declared content type, if any.
    pub content_type: Option<String>,
    /// Fully buffered payload.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Kind derived from the declared name and content type.
    pub fn kind(&self) -> FileKind {
        FileKind::classify(&self.file_name, self.content_type.as_deref())
    }
}

/// Declared media kind of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// File name ends in `.pdf`.
    Pdf,
    /// Content type starts with `image/`.
    Image,
    /// Anything else.
    Other,
}

impl FileKind {
    /// Classify an upload; the PDF suffix takes precedence over the content type.
    pub fn classify(file_name: &str, content_type: Option<&str>) -> Self {
        if file_name.to_ascii_lowercase().ends_with(".pdf") {
            return Self::Pdf;
        }
        match content_type {
            Some(value) if value.trim().to_ascii_lowercase().starts_with("image/") => Self::Image,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pdf => "PDF",
            Self::Image => "image",
            Self::Other => "unknown",
        })
    }
}

/// Source of per-page text for PDF documents.
pub trait PdfTextSource: Send + Sync {
    /// Return the text of every page in document order.
    fn page_texts(&self, bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Optical character recognition over a decoded image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize the text contained in `image`.
    async fn recognize(&self, image: DynamicImage) -> Result<String, ExtractionError>;
}

/// Dispatches uploads to the PDF or OCR backend.
#[derive(Clone)]
pub struct TextExtractor {
    pdf: Arc<dyn PdfTextSource>,
    ocr: Arc<dyn OcrEngine>,
}

impl TextExtractor {
    /// Build an extractor over the given backends.
    pub fn new(pdf: Arc<dyn PdfTextSource>, ocr: Arc<dyn OcrEngine>) -> Self {
        Self { pdf, ocr }
    }

    /// Extract plain text from `file`. Empty output is not an error here.
    pub async fn extract(&self, file: UploadedFile) -> Result<String, ExtractionError> {
        let kind = file.kind();
        tracing::debug!(
            file_name = %file.file_name,
            content_type = ?file.content_type,
            bytes = file.bytes.len(),
            %kind,
            "Extracting text"
        );
        match kind {
            FileKind::Pdf => {
                let pdf = Arc::clone(&self.pdf);
                let pages = tokio::task::spawn_blocking(move || pdf.page_texts(&file.bytes))
                    .await
                    .map_err(|error| ExtractionError::Task(error.to_string()))??;
                tracing::debug!(pages = pages.len(), "PDF text extracted");
                Ok(pages.join(" "))
            }
            FileKind::Image => {
                let image = tokio::task::spawn_blocking(move || {
                    image::load_from_memory(&file.bytes)
                })
                .await
                .map_err(|error| ExtractionError::Task(error.to_string()))?
                .map_err(|error| ExtractionError::MalformedDocument {
                    kind: FileKind::Image,
                    reason: error.to_string(),
                })?;
                self.ocr.recognize(image).await
            }
            FileKind::Other => Err(ExtractionError::UnsupportedFileType),
        }
    }
}
