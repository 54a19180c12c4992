//! Text extraction strategies, keyed by content type.
//!
//! The registry is built once at startup and immutable afterwards. Lookup
//! normalizes the content type (substring before `;`, trimmed,
//! lower-cased); an unregistered type is an unsupported-media failure.

use std::collections::HashMap;
use std::sync::Arc;

use arclink_core::{normalize_content_type, ArchiveError, ArchiveResult};

use crate::{ooxml, pdf};

/// MIME type of a DOCX package.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
/// MIME type of an XLSX package.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
/// MIME type of a PPTX package.
pub const PPTX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// One extraction strategy.
pub trait TextExtractor: Send + Sync {
    /// Extracts searchable text from component bytes.
    fn extract_text(&self, data: &[u8]) -> ArchiveResult<String>;
}

/// Passes plain text through, replacing invalid UTF-8.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, data: &[u8]) -> ArchiveResult<String> {
        Ok(String::from_utf8_lossy(data).into_owned())
    }
}

/// PDF page text.
#[derive(Debug, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract_text(&self, data: &[u8]) -> ArchiveResult<String> {
        pdf::pdf_text(data)
    }
}

/// DOCX paragraph text.
#[derive(Debug, Default)]
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn extract_text(&self, data: &[u8]) -> ArchiveResult<String> {
        ooxml::docx_text(data)
    }
}

/// XLSX cell text.
#[derive(Debug, Default)]
pub struct XlsxExtractor;

impl TextExtractor for XlsxExtractor {
    fn extract_text(&self, data: &[u8]) -> ArchiveResult<String> {
        ooxml::xlsx_text(data)
    }
}

/// PPTX slide text.
#[derive(Debug, Default)]
pub struct PptxExtractor;

impl TextExtractor for PptxExtractor {
    fn extract_text(&self, data: &[u8]) -> ArchiveResult<String> {
        ooxml::pptx_text(data)
    }
}

/// Content-type-keyed map of extraction strategies.
pub struct ExtractorRegistry {
    strategies: HashMap<String, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Builds the registry with the built-in strategies.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::builder()
            .register("text/plain", Arc::new(PlainTextExtractor))
            .register("text/csv", Arc::new(PlainTextExtractor))
            .register("application/pdf", Arc::new(PdfExtractor))
            .register(DOCX_MIME, Arc::new(DocxExtractor))
            .register(XLSX_MIME, Arc::new(XlsxExtractor))
            .register(PPTX_MIME, Arc::new(PptxExtractor))
            .build()
    }

    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> ExtractorRegistryBuilder {
        ExtractorRegistryBuilder {
            strategies: HashMap::new(),
        }
    }

    /// Looks up the strategy for a (possibly parameterized) content type.
    #[must_use]
    pub fn get(&self, content_type: &str) -> Option<&Arc<dyn TextExtractor>> {
        self.strategies.get(&normalize_content_type(content_type))
    }

    /// Extracts text, failing for an unregistered content type.
    ///
    /// # Errors
    ///
    /// Returns an unsupported-media error when no strategy is registered,
    /// or the strategy's own error.
    pub fn extract(&self, content_type: &str, data: &[u8]) -> ArchiveResult<String> {
        let extractor = self.get(content_type).ok_or_else(|| {
            ArchiveError::unsupported_media(format!(
                "No text extraction support for content type: {content_type}"
            ))
        })?;
        extractor.extract_text(data)
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("content_types", &self.strategies.keys())
            .finish()
    }
}

/// Builder for [`ExtractorRegistry`].
pub struct ExtractorRegistryBuilder {
    strategies: HashMap<String, Arc<dyn TextExtractor>>,
}

impl ExtractorRegistryBuilder {
    /// Registers a strategy under a content type.
    #[must_use]
    pub fn register(mut self, content_type: &str, strategy: Arc<dyn TextExtractor>) -> Self {
        self.strategies
            .insert(normalize_content_type(content_type), strategy);
        self
    }

    /// Finishes the registry.
    #[must_use]
    pub fn build(self) -> ExtractorRegistry {
        ExtractorRegistry {
            strategies: self.strategies,
        }
    }
}
