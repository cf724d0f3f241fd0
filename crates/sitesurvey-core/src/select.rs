//! Top-N selection of the highest-resolution saved images.

use std::path::{Path, PathBuf};

use image::ImageFormat;
use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::save::{OverwritePolicy, ensure_dir, should_write, write_image};

/// Number of images kept in the summary folder by default.
pub const DEFAULT_TOP_N: usize = 10;

/// Folder name of the summary set, relative to the output root.
pub const TOP_DIR_NAME: &str = "high_resolution_images";

/// A saved image and its pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl RankedImage {
    /// Width × height, the ranking score.
    pub fn resolution(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// One image copied into the summary folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopImage {
    /// 1-based rank.
    pub rank: usize,
    pub source: PathBuf,
    pub path: PathBuf,
    pub resolution: u64,
    /// The file at `path` was left over from an earlier run under
    /// [`OverwritePolicy::Keep`] and may not be a copy of `source`.
    #[serde(default)]
    pub kept: bool,
}

/// File name of the summary image at `rank`.
pub fn top_image_file_name(rank: usize) -> String {
    format!("high_res_image_{rank}.png")
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
    let mut paths = std::fs::read_dir(dir)
        .map_err(|e| CoreError::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CoreError::io(dir, e))?;
    paths.sort();
    Ok(paths)
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Open every file in every immediate subfolder of `base` and rank them by
/// resolution, highest first. Equal resolutions keep ascending path order.
///
/// `exclude` names a subfolder to leave out of the scan (the summary folder
/// itself when it lives under `base`).
pub fn collect_ranked(base: &Path, exclude: Option<&Path>) -> Result<Vec<RankedImage>, CoreError> {
    let mut ranked = Vec::new();

    for category_dir in sorted_entries(base)? {
        if !category_dir.is_dir() {
            continue;
        }
        if exclude.is_some_and(|ex| same_dir(&category_dir, ex)) {
            tracing::debug!(path = %category_dir.display(), "skipping summary folder");
            continue;
        }

        for path in sorted_entries(&category_dir)? {
            if !path.is_file() {
                continue;
            }
            let (width, height) =
                image::image_dimensions(&path).map_err(|e| CoreError::image(&path, e))?;
            ranked.push(RankedImage {
                path,
                width,
                height,
            });
        }
    }

    // stable: ties stay in path order
    ranked.sort_by(|a, b| b.resolution().cmp(&a.resolution()));
    Ok(ranked)
}

/// Copy the `top_n` highest-resolution images under `base` into `dest` as
/// `high_res_image_<rank>.png`.
///
/// Fewer candidates than `top_n` is not an error; an empty `base` yields an
/// empty `dest`.
pub fn filter_and_save_top_images(
    base: &Path,
    dest: &Path,
    top_n: usize,
    policy: OverwritePolicy,
) -> Result<Vec<TopImage>, CoreError> {
    let ranked = collect_ranked(base, Some(dest))?;
    tracing::info!(candidates = ranked.len(), top_n, "ranked saved images");

    ensure_dir(dest)?;

    let mut top = Vec::with_capacity(top_n.min(ranked.len()));
    for (i, candidate) in ranked.into_iter().take(top_n).enumerate() {
        let rank = i + 1;
        let path = dest.join(top_image_file_name(rank));

        let kept = !should_write(&path, policy)?;
        if !kept {
            let img = image::open(&candidate.path).map_err(|e| CoreError::image(&candidate.path, e))?;
            write_image(&img, &path, ImageFormat::Png)?;
            tracing::debug!(
                rank,
                source = %candidate.path.display(),
                resolution = candidate.resolution(),
                "copied top image"
            );
        } else {
            tracing::debug!(path = %path.display(), "keeping existing top image");
        }

        top.push(TopImage {
            rank,
            resolution: candidate.resolution(),
            source: candidate.path,
            path,
            kept,
        });
    }

    Ok(top)
}
