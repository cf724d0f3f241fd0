use std::path::Path;

use mupdf::{Document, TextPageFlags};

use sitesurvey_core::BackendError;

/// Plain text of every page, in page order.
///
/// The first `skip_pages` entries are left empty without building their
/// text pages. Lines are emitted block by block, each ending in a newline.
pub fn page_texts(path: &Path, skip_pages: usize) -> Result<Vec<String>, BackendError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| BackendError::OpenError("invalid path encoding".into()))?;

    let document =
        Document::open(path_str).map_err(|e| BackendError::OpenError(e.to_string()))?;

    let mut pages_text = Vec::new();

    for (index, page_result) in document
        .pages()
        .map_err(|e| BackendError::ExtractionError(e.to_string()))?
        .enumerate()
    {
        if index < skip_pages {
            pages_text.push(String::new());
            continue;
        }

        let page = page_result.map_err(|e| BackendError::ExtractionError(e.to_string()))?;
        let text_page = page
            .to_text_page(TextPageFlags::empty())
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?;

        let mut page_text = String::new();
        for block in text_page.blocks() {
            for line in block.lines() {
                let line_text: String = line
                    .chars()
                    .map(|c| c.char().unwrap_or('\u{FFFD}'))
                    .collect();
                page_text.push_str(&line_text);
                page_text.push('\n');
            }
        }
        pages_text.push(page_text);
    }

    Ok(pages_text)
}
