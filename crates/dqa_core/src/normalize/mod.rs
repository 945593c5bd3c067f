use crate::domain::{Document, DocumentContent};

/// Flatten a record's content into one string. Plain text is returned unchanged; line lists are
/// joined with `\n`.
pub fn normalize_document(doc: &Document) -> String {
    match &doc.content {
        DocumentContent::Text(text) => text.clone(),
        DocumentContent::Lines(lines) => lines.join("\n"),
    }
}

/// One normalized string per record, same order, no holes.
pub fn normalize_documents(docs: &[Document]) -> Vec<String> {
    docs.iter().map(normalize_document).collect()
}
