use std::path::Path;

use crate::domain::{Document, DocumentKind, SourceMetadata};
use crate::error::AppError;

/// One record per data row; each field becomes a `header: value` line.
pub fn load(path: &Path) -> Result<Vec<Document>, AppError> {
    let raw = super::read_source(path)?;
    parse(&raw, &path.display().to_string())
}

pub fn parse(csv_text: &str, source: &str) -> Result<Vec<Document>, AppError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| {
            AppError::new("LOADER_ERROR", "Failed to read CSV headers")
                .with_details(format!("source={source}; err={e}"))
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();

    let mut out = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let row = result.map_err(|e| {
            AppError::new("LOADER_ERROR", "Failed to parse CSV row")
                .with_details(format!("source={source}; row={}; err={e}", idx + 1))
        })?;
        let lines = row
            .iter()
            .enumerate()
            .map(|(i, value)| match headers.get(i) {
                Some(h) if !h.is_empty() => format!("{h}: {}", value.trim()),
                _ => value.trim().to_string(),
            })
            .collect::<Vec<_>>();
        let line = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        out.push(Document::lines(
            lines,
            SourceMetadata::new(source, DocumentKind::Csv).with_line(line),
        ));
    }
    Ok(out)
}
