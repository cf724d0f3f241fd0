use std::path::{Path, PathBuf};

use crate::CoreError;
use crate::backend::{DecodeErrorPolicy, ExtractOptions};
use crate::category::{Category, CategoryTable};
use crate::filter::PhotoFilter;
use crate::save::OverwritePolicy;
use crate::select::{DEFAULT_TOP_N, TOP_DIR_NAME};

/// Report processed when no PDF path is given.
pub const DEFAULT_PDF_PATH: &str = "SiteSurvey_GLI_RIY0023_PA20230329000100_71583.pdf";

/// Output root used when none is given.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Leading pages that hold the cover and summary, never photos.
pub const DEFAULT_SKIP_PAGES: usize = 2;

/// Fully resolved settings for one pipeline run.
///
/// The defaults reproduce the fixed behavior: the bundled report path,
/// `output/`, two skipped pages, 100×100 minimum, top 10, the built-in
/// category table, overwrite on rerun and abort on undecodable images.
#[derive(Debug, Clone)]
pub struct SurveyConfig {
    pub pdf_path: PathBuf,
    pub output_dir: PathBuf,
    pub top_dir: PathBuf,
    pub skip_pages: usize,
    pub top_n: usize,
    pub filter: PhotoFilter,
    pub categories: CategoryTable,
    pub overwrite: OverwritePolicy,
    pub on_decode_error: DecodeErrorPolicy,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        let output_dir = PathBuf::from(DEFAULT_OUTPUT_DIR);
        Self {
            pdf_path: PathBuf::from(DEFAULT_PDF_PATH),
            top_dir: output_dir.join(TOP_DIR_NAME),
            output_dir,
            skip_pages: DEFAULT_SKIP_PAGES,
            top_n: DEFAULT_TOP_N,
            filter: PhotoFilter::default(),
            categories: CategoryTable::default(),
            overwrite: OverwritePolicy::default(),
            on_decode_error: DecodeErrorPolicy::default(),
        }
    }
}

impl SurveyConfig {
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            skip_pages: self.skip_pages,
            on_decode_error: self.on_decode_error,
        }
    }
}

/// Builder for [`SurveyConfig`].
///
/// Unset fields fall back to the defaults. A top-folder path left unset
/// follows the output root (`<output_dir>/high_resolution_images`).
/// [`build()`](Self::build) validates custom categories and thresholds.
#[derive(Debug, Clone, Default)]
pub struct SurveyConfigBuilder {
    pdf_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    top_dir: Option<PathBuf>,
    skip_pages: Option<usize>,
    top_n: Option<usize>,
    min_width: Option<u32>,
    min_height: Option<u32>,
    categories: Option<Vec<Category>>,
    overwrite: Option<OverwritePolicy>,
    on_decode_error: Option<DecodeErrorPolicy>,
}

impl SurveyConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pdf_path(mut self, path: impl AsRef<Path>) -> Self {
        self.pdf_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn output_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.output_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn top_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.top_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn skip_pages(mut self, pages: usize) -> Self {
        self.skip_pages = Some(pages);
        self
    }

    pub fn top_n(mut self, n: usize) -> Self {
        self.top_n = Some(n);
        self
    }

    pub fn min_width(mut self, px: u32) -> Self {
        self.min_width = Some(px);
        self
    }

    pub fn min_height(mut self, px: u32) -> Self {
        self.min_height = Some(px);
        self
    }

    /// Replace the whole category table.
    pub fn categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite = Some(policy);
        self
    }

    pub fn on_decode_error(mut self, policy: DecodeErrorPolicy) -> Self {
        self.on_decode_error = Some(policy);
        self
    }

    pub fn build(self) -> Result<SurveyConfig, CoreError> {
        let defaults = SurveyConfig::default();

        let output_dir = self.output_dir.unwrap_or(defaults.output_dir);
        let top_dir = self
            .top_dir
            .unwrap_or_else(|| output_dir.join(TOP_DIR_NAME));

        let categories = match self.categories {
            Some(custom) => CategoryTable::new(custom)?,
            None => defaults.categories,
        };

        let filter = PhotoFilter::new(
            self.min_width.unwrap_or(defaults.filter.min_width),
            self.min_height.unwrap_or(defaults.filter.min_height),
        );
        if filter.min_width == 0 || filter.min_height == 0 {
            return Err(CoreError::Config(
                "minimum photo width and height must be at least 1".into(),
            ));
        }

        Ok(SurveyConfig {
            pdf_path: self.pdf_path.unwrap_or(defaults.pdf_path),
            output_dir,
            top_dir,
            skip_pages: self.skip_pages.unwrap_or(defaults.skip_pages),
            top_n: self.top_n.unwrap_or(defaults.top_n),
            filter,
            categories,
            overwrite: self.overwrite.unwrap_or(defaults.overwrite),
            on_decode_error: self.on_decode_error.unwrap_or(defaults.on_decode_error),
        })
    }
}
