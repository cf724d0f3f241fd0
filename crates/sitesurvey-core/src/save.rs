use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::category::CategoryTable;
use crate::filter::{PhotoFilter, PhotoVerdict};
use crate::{CoreError, ExtractedImage};

/// How to treat a target file that already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Replace the file. Reruns produce the same file set.
    #[default]
    Overwrite,
    /// Leave the existing file alone.
    Keep,
    /// Stop with [`CoreError::FileExists`].
    Fail,
}

impl std::str::FromStr for OverwritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(OverwritePolicy::Overwrite),
            "keep" => Ok(OverwritePolicy::Keep),
            "fail" => Ok(OverwritePolicy::Fail),
            other => Err(format!(
                "unknown overwrite policy \"{other}\" (expected overwrite, keep or fail)"
            )),
        }
    }
}

/// One image written under a category folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedImage {
    pub path: PathBuf,
    pub category: String,
    /// 1-based page number, as it appears in the file name.
    pub page: usize,
    /// 1-based image number within the page.
    pub image: usize,
    pub width: u32,
    pub height: u32,
}

/// Outcome of the save stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    pub saved: Vec<SavedImage>,
    pub rejected_too_small: usize,
    pub rejected_black: usize,
    /// Files left untouched under [`OverwritePolicy::Keep`].
    pub kept_existing: usize,
}

/// File name for an image: `page_<page+1>_img_<index+1>.<ext>`.
pub fn image_file_name(page_index: usize, image_index: usize, extension: &str) -> String {
    format!("page_{}_img_{}.{}", page_index + 1, image_index + 1, extension)
}

/// Create `dir` and all of its parents.
pub(crate) fn ensure_dir(dir: &Path) -> Result<(), CoreError> {
    std::fs::create_dir_all(dir).map_err(|e| CoreError::io(dir, e))
}

/// Decide whether `path` should be written under `policy`.
/// Returns `Ok(false)` when an existing file is to be kept.
pub(crate) fn should_write(path: &Path, policy: OverwritePolicy) -> Result<bool, CoreError> {
    if !path.exists() {
        return Ok(true);
    }
    match policy {
        OverwritePolicy::Overwrite => Ok(true),
        OverwritePolicy::Keep => Ok(false),
        OverwritePolicy::Fail => Err(CoreError::FileExists(path.to_path_buf())),
    }
}

/// Write `image` to `path` in `format`, converting pixel layouts the encoder
/// does not take.
pub(crate) fn write_image(
    image: &DynamicImage,
    path: &Path,
    format: ImageFormat,
) -> Result<(), CoreError> {
    let converted = encodable(image, format);
    converted
        .as_ref()
        .unwrap_or(image)
        .save_with_format(path, format)
        .map_err(|e| CoreError::image(path, e))
}

fn encodable(image: &DynamicImage, format: ImageFormat) -> Option<DynamicImage> {
    match (format, image) {
        (ImageFormat::Jpeg, DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_)) => None,
        (ImageFormat::Jpeg, _) => Some(DynamicImage::ImageRgb8(image.to_rgb8())),
        (ImageFormat::Png, DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_)) => {
            Some(DynamicImage::ImageRgba16(image.to_rgba16()))
        }
        _ => None,
    }
}

/// Filter, classify and write extracted images under `output_root`.
///
/// Each accepted image lands in
/// `<output_root>/<category>/page_<page+1>_img_<index+1>.<ext>` in its
/// source encoding. `output_root` is created even if nothing is accepted.
pub fn save_images(
    images: &[ExtractedImage],
    output_root: &Path,
    table: &CategoryTable,
    filter: &PhotoFilter,
    policy: OverwritePolicy,
) -> Result<SaveReport, CoreError> {
    ensure_dir(output_root)?;

    let mut report = SaveReport::default();

    for extracted in images {
        match filter.inspect(&extracted.image) {
            PhotoVerdict::Accept => {}
            PhotoVerdict::TooSmall => {
                tracing::debug!(
                    page = extracted.page_index + 1,
                    index = extracted.image_index + 1,
                    "rejected: too small"
                );
                report.rejected_too_small += 1;
                continue;
            }
            PhotoVerdict::AllBlack => {
                tracing::debug!(
                    page = extracted.page_index + 1,
                    index = extracted.image_index + 1,
                    "rejected: all black"
                );
                report.rejected_black += 1;
                continue;
            }
        }

        let category = table.classify(&extracted.page_text);
        let category_dir = output_root.join(category);
        ensure_dir(&category_dir)?;

        let path = category_dir.join(image_file_name(
            extracted.page_index,
            extracted.image_index,
            extracted.encoding.extension(),
        ));

        if !should_write(&path, policy)? {
            tracing::debug!(path = %path.display(), "keeping existing file");
            report.kept_existing += 1;
            continue;
        }

        write_image(&extracted.image, &path, extracted.encoding.image_format())?;

        let (width, height) = extracted.image.dimensions();
        tracing::debug!(category, path = %path.display(), width, height, "saved image");
        report.saved.push(SavedImage {
            path,
            category: category.to_string(),
            page: extracted.page_index + 1,
            image: extracted.image_index + 1,
            width,
            height,
        });
    }

    Ok(report)
}
