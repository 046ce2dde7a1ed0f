//! Report mode: run every markdown document under a list of repositories and
//! tabulate the results per document.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::RunConfig;
use crate::diagnostics::DocrunError;
use crate::results::RunResults;
use crate::runner::DocRunner;

pub const DEFAULT_MANIFEST: &str = "manifest.txt";

const DOCUMENT_EXTENSION: &str = "md";

/// Results of one document, as they appear in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReportRow {
    pub path: String,
    pub success_other: usize,
    pub success_trivial: usize,
    pub failure_other: usize,
    pub failure_missing: usize,
}

impl ReportRow {
    pub fn new(path: impl Into<String>, results: &RunResults) -> Self {
        Self {
            path: path.into(),
            success_other: results.count_success - results.count_trivial,
            success_trivial: results.count_trivial,
            failure_other: results.failures() - results.count_missing,
            failure_missing: results.count_missing,
        }
    }
}

/// Repository paths listed in the manifest, one per line; blank lines are skipped.
pub fn read_manifest(path: &Path) -> Result<Vec<String>, DocrunError> {
    let text = fs::read_to_string(path).map_err(|e| DocrunError::io(path, e))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Markdown documents under `dir`, in a deterministic order.
pub fn discover_documents(dir: &Path) -> Result<Vec<PathBuf>, DocrunError> {
    let mut documents = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| DocrunError::io(dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) == Some(DOCUMENT_EXTENSION) {
            documents.push(entry.into_path());
        }
    }
    Ok(documents)
}

/// Runs every document of one repository; documents without cases are left out.
pub fn walk_repository(
    config: &RunConfig,
    root: &Path,
    repository: &str,
) -> Result<Vec<ReportRow>, DocrunError> {
    let dir = root.join(repository);
    info!(repository, "walking repository");
    let mut rows = Vec::new();
    for document in discover_documents(&dir)? {
        let run = DocRunner::run_document(config, &document)?;
        if run.results.is_empty() {
            debug!(path = %document.display(), "no cases, omitted from report");
            continue;
        }
        rows.push(ReportRow::new(relative_path(root, &document), &run.results));
    }
    Ok(rows)
}

pub fn create_report(
    config: &RunConfig,
    root: &Path,
    manifest: &Path,
) -> Result<Vec<ReportRow>, DocrunError> {
    let mut rows = Vec::new();
    for repository in read_manifest(manifest)? {
        rows.extend(walk_repository(config, root, &repository)?);
    }
    Ok(rows)
}

/// Pretty JSON array of rows.
pub fn render(rows: &[ReportRow]) -> Result<String, DocrunError> {
    serde_json::to_string_pretty(rows).map_err(|e| DocrunError::Io {
        message: format!("rendering report: {}", e),
        source: e.into(),
    })
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
