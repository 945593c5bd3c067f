use serde::{Deserialize, Serialize};

/// File family a record was loaded from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Text,
    Csv,
    Json,
    Pdf,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(Self::Text),
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Where a record came from.
///
/// `line` is the 1-based data row for CSV records; `page` is the 1-based page for PDF records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceMetadata {
    pub source: String,
    pub kind: DocumentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl SourceMetadata {
    pub fn new(source: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            source: source.into(),
            kind,
            line: None,
            page: None,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }
}

/// Content of a loaded record. Only these two shapes exist; anything else is rejected at load time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DocumentContent {
    Text(String),
    Lines(Vec<String>),
}

/// A loaded source record. Immutable once produced by the loader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub content: DocumentContent,
    pub metadata: SourceMetadata,
}

impl Document {
    pub fn text(text: impl Into<String>, metadata: SourceMetadata) -> Self {
        Self {
            content: DocumentContent::Text(text.into()),
            metadata,
        }
    }

    pub fn lines(lines: Vec<String>, metadata: SourceMetadata) -> Self {
        Self {
            content: DocumentContent::Lines(lines),
            metadata,
        }
    }

    pub fn source(&self) -> &str {
        &self.metadata.source
    }
}
