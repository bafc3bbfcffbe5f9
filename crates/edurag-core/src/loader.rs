//! Directory loader for course material.
//!
//! PDFs are loaded first, then plain-text files, each group sorted by path. A
//! file that fails to load is recorded in the report and skipped; it never stops
//! the remaining files from loading.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Text,
}

impl FileKind {
    pub const ALL: [FileKind; 2] = [FileKind::Pdf, FileKind::Text];

    pub fn extension(self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Text => "txt",
        }
    }

    fn load(self, path: &Path) -> std::result::Result<String, String> {
        match self {
            FileKind::Pdf => read_pdf(path),
            FileKind::Text => read_text(path).map_err(|e| e.to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    /// One `Error::Ingestion` per file that could not be loaded.
    pub failures: Vec<Error>,
}

/// Load every supported file under `dir`, recursively.
///
/// Fails only when `dir` is not a directory; per-file problems end up in
/// `LoadReport::failures`.
pub fn load_documents(dir: &Path) -> Result<LoadReport> {
    if !dir.is_dir() {
        return Err(Error::Configuration(format!("Directory {} does not exist", dir.display())));
    }
    let mut report = LoadReport::default();
    for kind in FileKind::ALL {
        let files = list_files(dir, kind.extension());
        let before = report.documents.len();
        for path in files {
            let source = path.to_string_lossy().to_string();
            match kind.load(&path) {
                Ok(content) => report.documents.push(Document::new(content, source)),
                Err(reason) => {
                    warn!(path = %source, %reason, "failed to load file");
                    report.failures.push(Error::Ingestion { path: source, reason });
                }
            }
        }
        info!(kind = kind.extension(), loaded = report.documents.len() - before, "loaded documents");
    }
    Ok(report)
}

/// All files under `root` with the given extension, sorted.
pub fn list_files(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some(extension) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}

fn read_text(path: &Path) -> std::io::Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
    }
}

fn read_pdf(path: &Path) -> std::result::Result<String, String> {
    // pdf-extract can panic on malformed input; keep that inside this file's failure.
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text(path))
        .map_err(|_| "PDF parser panicked".to_string())?
        .map_err(|e| format!("PDF extraction error: {}", e))?;
    if extracted.trim().is_empty() {
        return Err("PDF contains no extractable text".to_string());
    }
    Ok(extracted)
}
