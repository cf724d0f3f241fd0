//! Keyword-driven classification of page text into survey categories.
//!
//! The table is an ordered priority list: categories are tried in
//! declaration order and, within a category, keywords in declaration order.
//! The first keyword found anywhere in the lower-cased page text wins, so
//! "Building Height" must stay ahead of "Building" and "Tower Structure"
//! ahead of anything mentioning a tower.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::select::TOP_DIR_NAME;

/// Label returned when no keyword of any category matches.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Built-in category table, in precedence order.
pub const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    ("Site ID", &["site id", "site identification", "site number"]),
    ("Shelter", &["shelter"]),
    ("Tower Structure", &["tower structure", "tower"]),
    ("Panorama", &["panorama"]),
    ("Access Road", &["access road"]),
    ("Site Road Type", &["site road type"]),
    ("Obstacles", &["obstacles"]),
    ("Surrounding Garbage", &["surrounding garbage", "garbage"]),
    ("Risks", &["risks"]),
    ("Building Height", &["building height"]),
    ("Building", &["building"]),
    ("Cabinets", &["cabinets"]),
    ("Indoor Equipment", &["indoor equipment", "equipment"]),
    (
        "Photo for the site from outside",
        &["photo for the site from outside", "site from outside"],
    ),
];

/// A named category and the keywords that select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub keywords: Vec<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered, validated category table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    categories: Vec<Category>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        let categories = DEFAULT_CATEGORIES
            .iter()
            .map(|(name, keywords)| Category::new(*name, keywords.iter().copied()))
            .collect();
        Self { categories }
    }
}

impl CategoryTable {
    /// Build a table from custom categories.
    ///
    /// Keywords are lower-cased. Category names end up as directory names, so
    /// they must be a single non-empty path component; they must also be
    /// unique and distinct from [`UNCATEGORIZED`] and the summary folder name.
    pub fn new(categories: Vec<Category>) -> Result<Self, CoreError> {
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(categories.len());

        for category in categories {
            let name = category.name.trim().to_string();
            if name.is_empty() {
                return Err(CoreError::InvalidCategories(
                    "category name must not be empty".into(),
                ));
            }
            if name == UNCATEGORIZED {
                return Err(CoreError::InvalidCategories(format!(
                    "\"{UNCATEGORIZED}\" is reserved for unmatched text"
                )));
            }
            if name == TOP_DIR_NAME {
                return Err(CoreError::InvalidCategories(format!(
                    "\"{TOP_DIR_NAME}\" is reserved for the summary folder"
                )));
            }
            if name == "." || name == ".." || name.contains(['/', '\\']) {
                return Err(CoreError::InvalidCategories(format!(
                    "category name \"{name}\" is not a valid folder name"
                )));
            }
            if !seen.insert(name.clone()) {
                return Err(CoreError::InvalidCategories(format!(
                    "duplicate category \"{name}\""
                )));
            }
            if category.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(CoreError::InvalidCategories(format!(
                    "category \"{name}\" has an empty keyword"
                )));
            }

            let keywords = category
                .keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect();
            normalized.push(Category { name, keywords });
        }

        Ok(Self {
            categories: normalized,
        })
    }

    /// Return the label of the first category with a keyword occurring in
    /// `text`, or [`UNCATEGORIZED`].
    pub fn classify(&self, text: &str) -> &str {
        let text = text.to_lowercase();
        self.categories
            .iter()
            .find(|c| c.keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|c| c.name.as_str())
            .unwrap_or(UNCATEGORIZED)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Every label the table can produce, fallback last.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.categories
            .iter()
            .map(|c| c.name.as_str())
            .chain(std::iter::once(UNCATEGORIZED))
    }
}
