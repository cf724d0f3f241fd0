use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ExtractedImage;
use crate::config::DEFAULT_SKIP_PAGES;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract page content: {0}")]
    ExtractionError(String),
    #[error("failed to decode image {index} on page {page}: {reason}")]
    DecodeError {
        /// 0-based page index.
        page: usize,
        /// 0-based image index within the page.
        index: usize,
        reason: String,
    },
}

/// What to do when an embedded image cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeErrorPolicy {
    /// Abort the extraction with [`BackendError::DecodeError`].
    #[default]
    Fail,
    /// Log a warning and leave the image out.
    Skip,
}

/// Knobs for a single extraction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Number of leading pages that are never inspected.
    pub skip_pages: usize,
    pub on_decode_error: DecodeErrorPolicy,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            skip_pages: DEFAULT_SKIP_PAGES,
            on_decode_error: DecodeErrorPolicy::Fail,
        }
    }
}

/// Trait for PDF image extraction backends.
///
/// Implementors open the document and hand back every embedded raster image
/// on the qualifying pages, in page order then in-page order. Classification,
/// filtering and saving live in this crate and never touch the PDF directly.
pub trait PdfBackend: Send + Sync {
    /// Extract the embedded images of a PDF file together with their page text.
    fn extract_images(
        &self,
        path: &Path,
        options: &ExtractOptions,
    ) -> Result<Vec<ExtractedImage>, BackendError>;
}
