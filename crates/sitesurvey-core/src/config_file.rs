use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::backend::DecodeErrorPolicy;
use crate::category::Category;
use crate::config::SurveyConfigBuilder;
use crate::save::OverwritePolicy;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub paths: Option<PathsConfig>,
    pub extraction: Option<ExtractionConfig>,
    pub filter: Option<FilterConfig>,
    pub selection: Option<SelectionConfig>,
    pub output: Option<OutputConfig>,
    /// When present, replaces the built-in table entirely. Order matters.
    pub categories: Option<Vec<Category>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    pub pdf: Option<String>,
    pub output_dir: Option<String>,
    pub top_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub skip_pages: Option<usize>,
    pub skip_undecodable: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    pub min_width: Option<u32>,
    pub min_height: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    pub top_n: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub overwrite: Option<OverwritePolicy>,
}

/// Platform config directory path: `<config_dir>/sitesurvey/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sitesurvey").join("config.toml"))
}

/// Load config by cascading CWD `.sitesurvey.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".sitesurvey.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config");
            None
        }
    }
}

/// Load a config the user asked for explicitly. Unlike [`load_from_path`],
/// a missing or malformed file is an error.
pub fn read_config(path: &Path) -> Result<ConfigFile, CoreError> {
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
    toml::from_str(&content)
        .map_err(|e| CoreError::Config(format!("{}: {}", path.display(), e)))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        paths: Some(PathsConfig {
            pdf: overlay
                .paths
                .as_ref()
                .and_then(|p| p.pdf.clone())
                .or_else(|| base.paths.as_ref().and_then(|p| p.pdf.clone())),
            output_dir: overlay
                .paths
                .as_ref()
                .and_then(|p| p.output_dir.clone())
                .or_else(|| base.paths.as_ref().and_then(|p| p.output_dir.clone())),
            top_dir: overlay
                .paths
                .as_ref()
                .and_then(|p| p.top_dir.clone())
                .or_else(|| base.paths.as_ref().and_then(|p| p.top_dir.clone())),
        }),
        extraction: Some(ExtractionConfig {
            skip_pages: overlay
                .extraction
                .as_ref()
                .and_then(|e| e.skip_pages)
                .or_else(|| base.extraction.as_ref().and_then(|e| e.skip_pages)),
            skip_undecodable: overlay
                .extraction
                .as_ref()
                .and_then(|e| e.skip_undecodable)
                .or_else(|| base.extraction.as_ref().and_then(|e| e.skip_undecodable)),
        }),
        filter: Some(FilterConfig {
            min_width: overlay
                .filter
                .as_ref()
                .and_then(|f| f.min_width)
                .or_else(|| base.filter.as_ref().and_then(|f| f.min_width)),
            min_height: overlay
                .filter
                .as_ref()
                .and_then(|f| f.min_height)
                .or_else(|| base.filter.as_ref().and_then(|f| f.min_height)),
        }),
        selection: Some(SelectionConfig {
            top_n: overlay
                .selection
                .as_ref()
                .and_then(|s| s.top_n)
                .or_else(|| base.selection.as_ref().and_then(|s| s.top_n)),
        }),
        output: Some(OutputConfig {
            overwrite: overlay
                .output
                .as_ref()
                .and_then(|o| o.overwrite)
                .or_else(|| base.output.as_ref().and_then(|o| o.overwrite)),
        }),
        // tables are not merged key by key: the overlay's table wins whole
        categories: overlay.categories.or(base.categories),
    }
}

impl ConfigFile {
    /// Seed a builder with every value this file sets.
    pub fn apply(&self, mut builder: SurveyConfigBuilder) -> SurveyConfigBuilder {
        if let Some(paths) = &self.paths {
            if let Some(pdf) = &paths.pdf {
                builder = builder.pdf_path(pdf);
            }
            if let Some(dir) = &paths.output_dir {
                builder = builder.output_dir(dir);
            }
            if let Some(dir) = &paths.top_dir {
                builder = builder.top_dir(dir);
            }
        }
        if let Some(extraction) = &self.extraction {
            if let Some(n) = extraction.skip_pages {
                builder = builder.skip_pages(n);
            }
            if let Some(skip) = extraction.skip_undecodable {
                builder = builder.on_decode_error(if skip {
                    DecodeErrorPolicy::Skip
                } else {
                    DecodeErrorPolicy::Fail
                });
            }
        }
        if let Some(filter) = &self.filter {
            if let Some(px) = filter.min_width {
                builder = builder.min_width(px);
            }
            if let Some(px) = filter.min_height {
                builder = builder.min_height(px);
            }
        }
        if let Some(n) = self.selection.as_ref().and_then(|s| s.top_n) {
            builder = builder.top_n(n);
        }
        if let Some(policy) = self.output.as_ref().and_then(|o| o.overwrite) {
            builder = builder.overwrite(policy);
        }
        if let Some(categories) = &self.categories {
            builder = builder.categories(categories.clone());
        }
        builder
    }
}
