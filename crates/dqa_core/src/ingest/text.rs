use std::path::Path;

use crate::domain::{Document, DocumentKind, SourceMetadata};
use crate::error::AppError;

pub fn load(path: &Path) -> Result<Vec<Document>, AppError> {
    let text = super::read_source(path)?;
    Ok(vec![Document::text(
        text,
        SourceMetadata::new(path.display().to_string(), DocumentKind::Text),
    )])
}
