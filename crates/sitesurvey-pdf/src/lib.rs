use std::path::Path;
use std::sync::Arc;

use lopdf::Document;

use sitesurvey_core::{
    BackendError, DecodeErrorPolicy, ExtractOptions, ExtractedImage, PdfBackend,
};

pub mod decode;
pub mod images;
pub mod text;

/// PDF backend pairing MuPDF page text with lopdf image XObjects.
///
/// Page text comes from MuPDF. Embedded images are read straight from the
/// page resources with lopdf and decoded with the `image` crate; no page is
/// ever rendered.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfImageBackend;

impl PdfImageBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfBackend for PdfImageBackend {
    fn extract_images(
        &self,
        path: &Path,
        options: &ExtractOptions,
    ) -> Result<Vec<ExtractedImage>, BackendError> {
        if !path.exists() {
            return Err(BackendError::OpenError(format!(
                "file not found: {}",
                path.display()
            )));
        }

        let texts = text::page_texts(path, options.skip_pages)?;
        let document = Document::load(path).map_err(|e| BackendError::OpenError(e.to_string()))?;
        let pages = document.get_pages();

        if pages.len() != texts.len() {
            tracing::warn!(
                lopdf_pages = pages.len(),
                mupdf_pages = texts.len(),
                "page counts disagree, pages without text are matched against empty text"
            );
        }

        let mut extracted = Vec::new();

        for (page_index, (_, &page_id)) in pages.iter().enumerate().skip(options.skip_pages) {
            let page_text: Arc<str> = Arc::from(texts.get(page_index).map_or("", String::as_str));
            let image_ids = images::page_image_ids(&document, page_id);
            tracing::debug!(page = page_index + 1, images = image_ids.len(), "scanning page");

            for (image_index, id) in image_ids.into_iter().enumerate() {
                let decoded = document
                    .get_object(id)
                    .and_then(|o| o.as_stream())
                    .map_err(|e| e.to_string())
                    .and_then(|stream| decode::decode_image(&document, stream));

                match decoded {
                    Ok((image, encoding)) => extracted.push(ExtractedImage {
                        page_index,
                        image_index,
                        image,
                        encoding,
                        page_text: Arc::clone(&page_text),
                    }),
                    Err(reason) => match options.on_decode_error {
                        DecodeErrorPolicy::Fail => {
                            return Err(BackendError::DecodeError {
                                page: page_index,
                                index: image_index,
                                reason,
                            });
                        }
                        DecodeErrorPolicy::Skip => {
                            tracing::warn!(
                                page = page_index + 1,
                                index = image_index + 1,
                                object = ?id,
                                %reason,
                                "skipping undecodable image"
                            );
                        }
                    },
                }
            }
        }

        Ok(extracted)
    }
}
