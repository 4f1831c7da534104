//! PDF adapter
//!
//! Text comes from `pdf-extract`, page by page so a page that fails to
//! decode costs only that page. The parser can panic on hostile input, so
//! every call runs under `catch_unwind`.

use super::{split_paragraphs, Extracted, PlainTextExtractor};
use log::debug;
use std::panic::{self, AssertUnwindSafe};

pub struct PdfAdapter;

fn guarded<T>(what: &str, f: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("PDF parser crashed during {}: {}", what, msg))
        }
    }
}

impl PlainTextExtractor for PdfAdapter {
    fn extract(&self, bytes: &[u8]) -> Result<Extracted, String> {
        let mut warnings = Vec::new();

        let by_pages = guarded("page extraction", || {
            pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| e.to_string())
        });

        let pages = match by_pages {
            Ok(pages) => pages,
            Err(reason) => {
                // Whole-document extraction is more forgiving about
                // broken page trees
                warnings.push(reason);
                let text = guarded("text extraction", || {
                    pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string())
                })?;
                vec![text]
            }
        };

        debug!("PDF yielded {} pages of text", pages.len());

        let paragraphs = pages
            .iter()
            .flat_map(|page| split_paragraphs(page))
            .collect();

        Ok(Extracted {
            paragraphs,
            warnings,
        })
    }
}
