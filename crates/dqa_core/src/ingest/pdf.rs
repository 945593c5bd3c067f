use std::path::Path;

use crate::domain::Document;
use crate::error::AppError;

/// One record per page. Pages are separated by form feeds in the extracted text.
#[cfg(feature = "pdf")]
pub fn load(path: &Path) -> Result<Vec<Document>, AppError> {
    use crate::domain::{DocumentKind, SourceMetadata};

    let text = pdf_extract::extract_text(path).map_err(|e| {
        AppError::new("LOADER_ERROR", "Failed to extract PDF text")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    let source = path.display().to_string();
    Ok(text
        .split('\u{c}')
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| {
            let page_no = u32::try_from(i + 1).unwrap_or(u32::MAX);
            Document::text(
                page.to_string(),
                SourceMetadata::new(source.clone(), DocumentKind::Pdf).with_page(page_no),
            )
        })
        .collect())
}

#[cfg(not(feature = "pdf"))]
pub fn load(path: &Path) -> Result<Vec<Document>, AppError> {
    Err(
        AppError::new("LOADER_ERROR", "PDF support is not enabled in this build")
            .with_details(format!("path={}; enable the `pdf` feature", path.display())),
    )
}
