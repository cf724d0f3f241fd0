use std::path::PathBuf;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod backend;
pub mod category;
pub mod config;
pub mod config_file;
pub mod filter;
pub mod pipeline;
pub mod save;
pub mod select;

// Re-export for convenience
pub use backend::{BackendError, DecodeErrorPolicy, ExtractOptions, PdfBackend};
pub use category::{Category, CategoryTable, DEFAULT_CATEGORIES, UNCATEGORIZED};
pub use config::{DEFAULT_PDF_PATH, SurveyConfig, SurveyConfigBuilder};
pub use filter::{PhotoFilter, PhotoVerdict, is_real_photo};
pub use pipeline::{RunReport, run};
pub use save::{OverwritePolicy, SaveReport, SavedImage, save_images};
pub use select::{RankedImage, TopImage, collect_ranked, filter_and_save_top_images};

/// Source encoding of an embedded image, as reported by the extractor.
///
/// DCT streams are reported as JPEG. Everything that decodes to raw samples
/// (no filter, Flate) is reported as PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    Jpeg,
    Png,
}

impl ImageEncoding {
    /// File extension used when the image is saved in its source encoding.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "jpeg",
            ImageEncoding::Png => "png",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            ImageEncoding::Jpeg => ImageFormat::Jpeg,
            ImageEncoding::Png => ImageFormat::Png,
        }
    }
}

/// An embedded image pulled out of a PDF page, paired with the full text of
/// that page.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    /// 0-based page index in the document.
    pub page_index: usize,
    /// 0-based position of the image among the page's embedded images.
    pub image_index: usize,
    pub image: DynamicImage,
    pub encoding: ImageEncoding,
    /// Plain text of the whole owning page, shared by every image on it.
    pub page_text: Arc<str>,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("PDF backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("refusing to overwrite existing file {0}")]
    FileExists(PathBuf),
    #[error("invalid category table: {0}")]
    InvalidCategories(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        CoreError::Image {
            path: path.into(),
            source,
        }
    }
}
