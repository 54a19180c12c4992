//! Document append strategies, keyed by content type.
//!
//! An appender merges an existing component's bytes with uploaded bytes of
//! the same format and returns the merged document. The registry mirrors
//! the extractor registry's shape; the documented difference is the miss
//! behavior, a 404 "Unsupported content type".

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use arclink_core::{normalize_content_type, ArchiveError, ArchiveResult};

use crate::extract::{DOCX_MIME, PPTX_MIME, XLSX_MIME};
use crate::{ooxml, pdf};

/// One append strategy.
#[async_trait]
pub trait DocumentAppender: Send + Sync {
    /// Merges `addition` after `base`, both in this strategy's format.
    async fn append(&self, base: &[u8], addition: &[u8]) -> ArchiveResult<Vec<u8>>;
}

/// Concatenates text, inserting a newline when the base lacks one.
#[derive(Debug, Default)]
pub struct PlainTextAppender;

#[async_trait]
impl DocumentAppender for PlainTextAppender {
    async fn append(&self, base: &[u8], addition: &[u8]) -> ArchiveResult<Vec<u8>> {
        let mut merged = Vec::with_capacity(base.len() + addition.len() + 1);
        merged.extend_from_slice(base);
        if !base.is_empty() && !base.ends_with(b"\n") {
            merged.push(b'\n');
        }
        merged.extend_from_slice(addition);
        Ok(merged)
    }
}

/// Appends PDF pages.
#[derive(Debug, Default)]
pub struct PdfAppender;

#[async_trait]
impl DocumentAppender for PdfAppender {
    async fn append(&self, base: &[u8], addition: &[u8]) -> ArchiveResult<Vec<u8>> {
        pdf::pdf_append(base, addition)
    }
}

/// Appends DOCX body content.
#[derive(Debug, Default)]
pub struct DocxAppender;

#[async_trait]
impl DocumentAppender for DocxAppender {
    async fn append(&self, base: &[u8], addition: &[u8]) -> ArchiveResult<Vec<u8>> {
        ooxml::docx_append(base, addition)
    }
}

/// Appends XLSX worksheet rows.
#[derive(Debug, Default)]
pub struct XlsxAppender;

#[async_trait]
impl DocumentAppender for XlsxAppender {
    async fn append(&self, base: &[u8], addition: &[u8]) -> ArchiveResult<Vec<u8>> {
        ooxml::xlsx_append(base, addition)
    }
}

/// Appends PPTX slides.
#[derive(Debug, Default)]
pub struct PptxAppender;

#[async_trait]
impl DocumentAppender for PptxAppender {
    async fn append(&self, base: &[u8], addition: &[u8]) -> ArchiveResult<Vec<u8>> {
        ooxml::pptx_append(base, addition)
    }
}

/// Content-type-keyed map of append strategies.
pub struct AppenderRegistry {
    strategies: HashMap<String, Arc<dyn DocumentAppender>>,
}

impl AppenderRegistry {
    /// Builds the registry with the built-in strategies.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::builder()
            .register("text/plain", Arc::new(PlainTextAppender))
            .register("text/csv", Arc::new(PlainTextAppender))
            .register("application/pdf", Arc::new(PdfAppender))
            .register(DOCX_MIME, Arc::new(DocxAppender))
            .register(XLSX_MIME, Arc::new(XlsxAppender))
            .register(PPTX_MIME, Arc::new(PptxAppender))
            .build()
    }

    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> AppenderRegistryBuilder {
        AppenderRegistryBuilder {
            strategies: HashMap::new(),
        }
    }

    /// Looks up the strategy for a (possibly parameterized) content type.
    #[must_use]
    pub fn get(&self, content_type: &str) -> Option<&Arc<dyn DocumentAppender>> {
        self.strategies.get(&normalize_content_type(content_type))
    }

    /// Merges, failing with 404 for an unregistered content type.
    ///
    /// # Errors
    ///
    /// Returns a not-found error when no strategy is registered, or the
    /// strategy's own error.
    pub async fn append(
        &self,
        content_type: &str,
        base: &[u8],
        addition: &[u8],
    ) -> ArchiveResult<Vec<u8>> {
        let appender = self.get(content_type).ok_or_else(|| {
            ArchiveError::not_found(format!("Unsupported content type: {content_type}"))
        })?;
        appender.append(base, addition).await
    }
}

impl std::fmt::Debug for AppenderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppenderRegistry")
            .field("content_types", &self.strategies.keys())
            .finish()
    }
}

/// Builder for [`AppenderRegistry`].
pub struct AppenderRegistryBuilder {
    strategies: HashMap<String, Arc<dyn DocumentAppender>>,
}

impl AppenderRegistryBuilder {
    /// Registers a strategy under a content type.
    #[must_use]
    pub fn register(mut self, content_type: &str, strategy: Arc<dyn DocumentAppender>) -> Self {
        self.strategies
            .insert(normalize_content_type(content_type), strategy);
        self
    }

    /// Finishes the registry.
    #[must_use]
    pub fn build(self) -> AppenderRegistry {
        AppenderRegistry {
            strategies: self.strategies,
        }
    }
}
