use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::backend::PdfBackend;
use crate::config::SurveyConfig;
use crate::save::{SavedImage, save_images};
use crate::select::{TopImage, filter_and_save_top_images};
use crate::CoreError;

/// Summary of one end-to-end run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub pdf: PathBuf,
    pub output_dir: PathBuf,
    pub top_dir: PathBuf,
    /// Embedded images pulled out of the qualifying pages.
    pub extracted: usize,
    pub saved: Vec<SavedImage>,
    pub rejected_too_small: usize,
    pub rejected_black: usize,
    pub kept_existing: usize,
    pub top: Vec<TopImage>,
}

impl RunReport {
    /// Saved image count per category, in label order.
    pub fn per_category(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for saved in &self.saved {
            *counts.entry(saved.category.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// Extract, classify, save and select top images for `config.pdf_path`.
///
/// Stages run strictly one after the other. Every decoded image of the
/// document is held in memory before the first one is written.
pub fn run(config: &SurveyConfig, backend: &dyn PdfBackend) -> Result<RunReport, CoreError> {
    tracing::info!(pdf = %config.pdf_path.display(), skip_pages = config.skip_pages, "extracting images");
    let images = backend.extract_images(&config.pdf_path, &config.extract_options())?;
    tracing::info!(count = images.len(), "extraction complete");

    let saved = save_images(
        &images,
        &config.output_dir,
        &config.categories,
        &config.filter,
        config.overwrite,
    )?;
    tracing::info!(
        saved = saved.saved.len(),
        too_small = saved.rejected_too_small,
        black = saved.rejected_black,
        "images saved"
    );
    let extracted = images.len();
    drop(images);

    let top = filter_and_save_top_images(
        &config.output_dir,
        &config.top_dir,
        config.top_n,
        config.overwrite,
    )?;
    tracing::info!(count = top.len(), dest = %config.top_dir.display(), "top images saved");

    Ok(RunReport {
        pdf: config.pdf_path.clone(),
        output_dir: config.output_dir.clone(),
        top_dir: config.top_dir.clone(),
        extracted,
        saved: saved.saved,
        rejected_too_small: saved.rejected_too_small,
        rejected_black: saved.rejected_black,
        kept_existing: saved.kept_existing,
        top,
    })
}
