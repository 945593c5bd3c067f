use std::path::Path;

use serde_json::Value;

use crate::domain::{Document, DocumentKind, SourceMetadata};
use crate::error::AppError;

pub fn load(path: &Path) -> Result<Vec<Document>, AppError> {
    let raw = super::read_source(path)?;
    parse(&raw, &path.display().to_string())
}

/// A top-level string is plain text; otherwise every string leaf, in document order, is one line.
pub fn parse(json_text: &str, source: &str) -> Result<Vec<Document>, AppError> {
    let value: Value = serde_json::from_str(json_text).map_err(|e| {
        AppError::new("LOADER_ERROR", "Failed to parse JSON source")
            .with_details(format!("source={source}; err={e}"))
    })?;

    let metadata = SourceMetadata::new(source, DocumentKind::Json);
    if let Value::String(s) = value {
        return Ok(vec![Document::text(s, metadata)]);
    }

    let mut lines = Vec::new();
    collect_strings(&value, &mut lines);
    if lines.is_empty() {
        return Err(AppError::new(
            "DOC_CONTENT_UNSUPPORTED",
            "JSON source has no string content",
        )
        .with_details(format!("source={source}")));
    }
    Ok(vec![Document::lines(lines, metadata)])
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
