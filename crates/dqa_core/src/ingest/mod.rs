use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::domain::{Document, DocumentKind};
use crate::error::AppError;

pub mod csv_rows;
pub mod json_strings;
pub mod pdf;
pub mod text;

/// A source file that could not be turned into records. The rest of the directory still loads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadFailure {
    pub path: String,
    pub error: AppError,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub failures: Vec<LoadFailure>,
    pub skipped_unsupported: Vec<String>,
}

impl LoadReport {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Load every supported file under `dir`, recursively, in file-name order.
pub fn load_directory(dir: &Path) -> Result<LoadReport, AppError> {
    if !dir.is_dir() {
        return Err(
            AppError::new("LOADER_DIR_MISSING", "Documents directory does not exist")
                .with_details(format!("path={}", dir.display())),
        );
    }

    let mut report = LoadReport::default();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            AppError::new("LOADER_DIR_MISSING", "Failed to walk documents directory")
                .with_details(format!("path={}; err={}", dir.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let kind = path
            .extension()
            .and_then(|s| s.to_str())
            .and_then(DocumentKind::from_extension);
        let Some(kind) = kind else {
            warn!(path = %path.display(), "skipping file with unsupported extension");
            report.skipped_unsupported.push(path.display().to_string());
            continue;
        };

        match load_file(path, kind) {
            Ok(mut docs) => report.documents.append(&mut docs),
            Err(error) => {
                warn!(path = %path.display(), code = %error.code, "failed to load source file");
                report.failures.push(LoadFailure {
                    path: path.display().to_string(),
                    error,
                });
            }
        }
    }

    info!(
        documents = report.documents.len(),
        failures = report.failures.len(),
        "loaded documents from {}",
        dir.display()
    );
    Ok(report)
}

pub fn load_file(path: &Path, kind: DocumentKind) -> Result<Vec<Document>, AppError> {
    match kind {
        DocumentKind::Text => text::load(path),
        DocumentKind::Csv => csv_rows::load(path),
        DocumentKind::Json => json_strings::load(path),
        DocumentKind::Pdf => pdf::load(path),
    }
}

pub(crate) fn read_source(path: &Path) -> Result<String, AppError> {
    std::fs::read_to_string(path).map_err(|e| {
        AppError::new("LOADER_ERROR", "Failed to read source file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}
